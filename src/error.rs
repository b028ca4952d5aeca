use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The privilege check failed or could not be answered. Carries no detail
    /// about the object so that existence is never revealed.
    #[error("access denied: missing required privileges")]
    AccessDenied,

    #[error("row estimation failed: {0}")]
    EstimationFailure(String),

    #[error("invalid dialect: {0}")]
    InvalidDialect(String),

    #[error("empty or unreadable input: {0}")]
    EmptyOrUnreadableInput(String),

    /// Engine failure text, passed through unmodified.
    #[error("{0}")]
    Execution(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("cannot grant privileges to the namespace owner")]
    OwnerGrant,

    #[error("invalid privilege: {0}")]
    InvalidPrivilege(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
