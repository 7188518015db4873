use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Music catalog auth API")]
pub struct Cli {
    /// Path to a TOML settings file.
    #[arg(long)]
    pub settings: Option<String>,
}
