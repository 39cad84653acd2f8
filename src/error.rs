use thiserror::Error;

use crate::storage::encdec::DecodingError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage was opened read-only")]
    ReadOnly,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("token amount overflow while summing {0}")]
    AmountOverflow(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn invalid_record(msg: impl ToString) -> Error {
        Error::InvalidRecord(msg.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Custom(format!("io error: {err}"))
    }
}
