//! Read side of the tracker.
//!
//! Every request starts from [`TokenTracker::start_query`], which reads the processed height once.
//! All the operations of a request are methods on the returned [`QueryContext`] and are bounded
//! by that single watermark, so one response never mixes two indexing moments.

use std::sync::Arc;

use tracing::debug;

use crate::{
    codec::AddressCodec,
    error::Error,
    ledger::watermark::{Watermark, WatermarkSource},
    storage::kv_store::{Reader, StorageHandler},
};

pub mod balance;
pub mod catalog;
pub mod history;
pub mod pagination;
pub mod state_hash;
pub mod supply;
pub mod tokens;
pub mod utxos;

pub use catalog::{TokenCatalog, TokenView};
pub use pagination::Pagination;

pub struct TokenTracker {
    storage: StorageHandler,
    codec: Arc<dyn AddressCodec>,
    catalog: TokenCatalog,
}

impl TokenTracker {
    pub fn new(
        storage: StorageHandler,
        codec: Arc<dyn AddressCodec>,
        catalog_cache_entries: u64,
    ) -> Self {
        Self {
            storage,
            codec,
            catalog: TokenCatalog::new(catalog_cache_entries),
        }
    }

    pub fn storage(&self) -> &StorageHandler {
        &self.storage
    }

    /// Catches up with the ingestion process (when following it as a secondary) and captures the
    /// watermark for the whole request.
    pub fn start_query(&self) -> Result<QueryContext<'_>, Error> {
        self.storage.try_refresh_read_only_data()?;

        let reader = self.storage.reader();
        let watermark = reader.current_processed_height()?;

        debug!(?watermark, "starting query");

        Ok(QueryContext {
            reader,
            watermark,
            codec: self.codec.as_ref(),
            catalog: &self.catalog,
        })
    }
}

/// Request-scoped view of the ledger.
pub struct QueryContext<'a> {
    reader: Reader,
    watermark: Watermark,
    codec: &'a dyn AddressCodec,
    catalog: &'a TokenCatalog,
}

impl QueryContext<'_> {
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn codec(&self) -> &dyn AddressCodec {
        self.codec
    }
}
