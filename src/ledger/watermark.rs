use crate::{
    error::Error,
    storage::kv_store::{Reader, WriteTask},
};

use super::tables::ProcessedHeightKV;

/// Highest block height the ingestion process guarantees is fully reflected in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// No block has been processed yet, so no height-bounded data is safe to return.
    Unbootstrapped,
    Height(u64),
}

impl Watermark {
    pub fn height(&self) -> Option<u64> {
        match self {
            Watermark::Unbootstrapped => None,
            Watermark::Height(h) => Some(*h),
        }
    }

    /// Whether a record produced at `height` is visible at this watermark
    pub fn covers(&self, height: u64) -> bool {
        self.height().is_some_and(|h| height <= h)
    }
}

pub trait WatermarkSource {
    fn current_processed_height(&self) -> Result<Watermark, Error>;
}

impl WatermarkSource for Reader {
    fn current_processed_height(&self) -> Result<Watermark, Error> {
        Ok(self
            .get::<ProcessedHeightKV>(&())?
            .map_or(Watermark::Unbootstrapped, Watermark::Height))
    }
}

impl ProcessedHeightKV {
    /// Moves the watermark forward. The watermark never moves backwards.
    pub fn advance(task: &mut WriteTask, height: u64) -> Result<(), Error> {
        if let Some(current) = task.get::<Self>(&())? {
            if height < current {
                return Err(Error::invalid_record(format!(
                    "processed height cannot move back from {current} to {height}"
                )));
            }
        }

        task.set::<Self>((), height);

        Ok(())
    }
}
