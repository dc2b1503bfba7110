use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid key range: {0}")]
    InvalidKeyRange(String),
    #[error("malformed fractional index: {0}")]
    MalformedKey(String),
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("unknown cell: {0}")]
    UnknownCell(String),
}
