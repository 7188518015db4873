use crate::application_port::AuthError;

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        return db.code().as_deref() == Some("23505"); // unique_violation
    }

    false
}

pub fn upstream(err: sqlx::Error) -> AuthError {
    AuthError::UpstreamUnavailable(err.to_string())
}
