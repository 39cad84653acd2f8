use tracing::warn;

use crate::{
    error::Error,
    ledger::{tables::TxOutByRefKV, types::TxHash},
    storage::table::Table,
};

use super::QueryContext;

/// Maximum number of contract outputs a transaction can carry
pub const MAX_CONTRACT_OUTPUTS: usize = 5;

/// Width of every state hash vector: the transaction level root followed by one entry per
/// contract output.
pub const STATE_HASH_VECTOR_LEN: usize = MAX_CONTRACT_OUTPUTS + 1;

impl QueryContext<'_> {
    /// State hashes of the outputs of a transaction by output index, right padded with empty
    /// strings to exactly [`STATE_HASH_VECTOR_LEN`] entries. Element 0 is the transaction level
    /// root.
    pub fn state_hash_vector(&self, txid: &TxHash) -> Result<Vec<String>, Error> {
        let range = TxOutByRefKV::prefix_range(txid);

        let mut hashes = self
            .reader
            .iter_kvs::<TxOutByRefKV>(range, false)?
            .map(|kv| kv.map(|(_, txo)| hex::encode(txo.state_hash)))
            .collect::<Result<Vec<_>, _>>()?;

        if hashes.len() > STATE_HASH_VECTOR_LEN {
            warn!(
                txid = %hex::encode(txid),
                outputs = hashes.len(),
                "transaction has more outputs than state hash slots"
            );
        }

        hashes.resize(STATE_HASH_VECTOR_LEN, String::new());

        Ok(hashes)
    }
}
