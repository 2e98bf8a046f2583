use thiserror::Error;

pub type Result<T, E = ParseError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command code: {0}")]
    UnknownCode(i8),
}
