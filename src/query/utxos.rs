use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    error::Error,
    ledger::{
        tables::{TxOutByRefKV, UtxosByOwnerKV, UtxosByOwnerTokenKV},
        types::{OwnerHash, TxOut, TxoRef, XOnlyKey},
    },
    storage::table::Table,
};

use super::{Pagination, QueryContext};

/// Owner and optional token filter resolved from caller input.
pub(crate) type OwnerFilter = (OwnerHash, Option<XOnlyKey>);

impl QueryContext<'_> {
    /// Resolves an owner address and an optional token identifier. `None` when either one does
    /// not resolve, in which case callers answer with their empty shape.
    pub(crate) fn resolve_owner(
        &self,
        address: &str,
        token: Option<&str>,
    ) -> Result<Option<OwnerFilter>, Error> {
        let Some(owner) = self.codec.owner_address_to_hash(address) else {
            debug!(address, "unable to resolve owner address");
            return Ok(None);
        };

        let token_key = match token {
            Some(identifier) => match self.resolve(identifier)? {
                Some(info) => Some(info.token_pubkey),
                None => return Ok(None),
            },
            None => None,
        };

        Ok(Some((owner, token_key)))
    }

    /// References of the outputs of an owner unspent at the watermark, largest amount first (ties
    /// by outpoint).
    fn owner_utxo_refs(
        &self,
        owner: &OwnerHash,
        token: Option<&XOnlyKey>,
    ) -> Result<Vec<TxoRef>, Error> {
        let Some(height) = self.watermark.height() else {
            debug!("unbootstrapped, no utxos visible");
            return Ok(vec![]);
        };

        match token {
            Some(token) => {
                let range = UtxosByOwnerTokenKV::prefix_range(&(owner, token));

                self.reader
                    .iter_kvs::<UtxosByOwnerTokenKV>(range, false)?
                    .filter_map_ok(|(key, span)| span.unspent_at(height).then_some(key.txo_ref))
                    .collect()
            }
            None => {
                let range = UtxosByOwnerKV::prefix_range(owner);

                self.reader
                    .iter_kvs::<UtxosByOwnerKV>(range, false)?
                    .filter_map_ok(|(key, span)| span.unspent_at(height).then_some(key.txo_ref))
                    .collect()
            }
        }
    }

    /// Fetches the outputs for the given references in one batch, keeping the order and the ones
    /// unspent at the watermark.
    pub(crate) fn load_unspent(&self, refs: Vec<TxoRef>) -> Result<Vec<TxOut>, Error> {
        let Some(height) = self.watermark.height() else {
            return Ok(vec![]);
        };

        let mut out = Vec::with_capacity(refs.len());

        for (txo_ref, txo) in self.reader.multi_get::<TxOutByRefKV>(refs)? {
            match txo {
                Some(txo) if txo.is_unspent_at(height) => out.push(txo),
                Some(_) => (),
                None => warn!(
                    tx_hash = %hex::encode(txo_ref.tx_hash),
                    txo_index = txo_ref.txo_index,
                    "indexed utxo has no output row"
                ),
            }
        }

        Ok(out)
    }

    pub fn utxos_by_owner(
        &self,
        owner: &OwnerHash,
        token: Option<&XOnlyKey>,
        page: Pagination,
    ) -> Result<Vec<TxOut>, Error> {
        let refs = self.owner_utxo_refs(owner, token)?;

        self.load_unspent(page.page(refs).collect())
    }

    /// Full unspent set of an owner, used for balances
    pub fn all_utxos_by_owner(
        &self,
        owner: &OwnerHash,
        token: Option<&XOnlyKey>,
    ) -> Result<Vec<TxOut>, Error> {
        let refs = self.owner_utxo_refs(owner, token)?;

        self.load_unspent(refs)
    }

    pub fn utxo_count_by_owner(
        &self,
        owner: &OwnerHash,
        token: Option<&XOnlyKey>,
    ) -> Result<usize, Error> {
        Ok(self.owner_utxo_refs(owner, token)?.len())
    }

    pub fn utxos_by_owner_address(
        &self,
        address: &str,
        token: Option<&str>,
        page: Pagination,
    ) -> Result<Vec<TxOut>, Error> {
        match self.resolve_owner(address, token)? {
            Some((owner, token)) => self.utxos_by_owner(&owner, token.as_ref(), page),
            None => Ok(vec![]),
        }
    }

    pub fn utxo_count_by_owner_address(
        &self,
        address: &str,
        token: Option<&str>,
    ) -> Result<usize, Error> {
        match self.resolve_owner(address, token)? {
            Some((owner, token)) => self.utxo_count_by_owner(&owner, token.as_ref()),
            None => Ok(0),
        }
    }
}
