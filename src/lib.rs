pub mod codec;
pub mod error;
pub mod ledger;
pub mod query;
pub mod serve;
pub mod shutdown;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use storage::encdec::{DecodingError, DecodingResult};
