use thiserror::Error;

/// Main error type for reqsmith operations
#[derive(Error, Debug)]
pub enum ReqsmithError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Signature catalog error: {0}")]
    Catalog(String),

    #[error("Syntax error in {path} at line {line}")]
    Syntax { path: String, line: usize },
}

pub type Result<T> = std::result::Result<T, ReqsmithError>;
