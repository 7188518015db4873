//! Settings come from a TOML file chosen by build profile or `--settings`,
//! overridden by `CATALOG_*` environment variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
