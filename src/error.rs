use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse int error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
    #[error("parse float error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error("lexer error: {message}")]
    Lexer { message: String },
    #[error("syntax error: {message}")]
    Syntax { message: String },
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn lexer_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Lexer {
        message: message.into(),
    })
}

pub fn syntax_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Syntax {
        message: message.into(),
    })
}

pub fn runtime_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Runtime {
        message: message.into(),
    })
}
