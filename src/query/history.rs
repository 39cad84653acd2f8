use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    error::Error,
    ledger::{
        tables::{OutputsByOwnerTokenKV, TxOutByRefKV},
        types::{OwnerHash, TxHash, XOnlyKey},
    },
    storage::table::Table,
};

use super::{Pagination, QueryContext};

impl QueryContext<'_> {
    /// Transactions which produced or consumed an output of the owner and token, each at the
    /// highest height it touched them, newest first.
    fn touched_transactions(
        &self,
        owner: &OwnerHash,
        token_pubkey: &XOnlyKey,
    ) -> Result<Vec<TxHash>, Error> {
        let Some(height) = self.watermark.height() else {
            return Ok(vec![]);
        };

        let range = OutputsByOwnerTokenKV::prefix_range(&(owner, token_pubkey));

        let refs = self
            .reader
            .iter_kvs::<OutputsByOwnerTokenKV>(range, false)?
            .filter_map_ok(|(key, produced)| (produced <= height).then_some(key.txo_ref))
            .collect::<Result<Vec<_>, _>>()?;

        let mut touched = HashMap::<TxHash, u64>::new();

        let mut touch = |txid: TxHash, at: u64| {
            let entry = touched.entry(txid).or_insert(at);
            *entry = (*entry).max(at);
        };

        for (_, txo) in self.reader.multi_get::<TxOutByRefKV>(refs)? {
            let Some(txo) = txo else { continue };

            touch(txo.txid, txo.block_height);

            if let Some(spend) = txo.spend.filter(|s| self.watermark.covers(s.height)) {
                touch(spend.txid, spend.height);
            }
        }

        Ok(touched
            .into_iter()
            .sorted_by(|(a_tx, a_height), (b_tx, b_height)| {
                b_height.cmp(a_height).then_with(|| a_tx.cmp(b_tx))
            })
            .map(|(txid, _)| txid)
            .collect())
    }

    pub fn history_of(
        &self,
        owner: &OwnerHash,
        token_pubkey: &XOnlyKey,
        page: Pagination,
    ) -> Result<Vec<TxHash>, Error> {
        Ok(page
            .page(self.touched_transactions(owner, token_pubkey)?)
            .collect())
    }

    pub fn history_count(&self, owner: &OwnerHash, token_pubkey: &XOnlyKey) -> Result<usize, Error> {
        Ok(self.touched_transactions(owner, token_pubkey)?.len())
    }

    pub fn history_by_owner_address(
        &self,
        address: &str,
        token: &str,
        page: Pagination,
    ) -> Result<Vec<TxHash>, Error> {
        match self.resolve_owner(address, Some(token))? {
            Some((owner, Some(token_pubkey))) => self.history_of(&owner, &token_pubkey, page),
            _ => Ok(vec![]),
        }
    }

    pub fn history_count_by_owner_address(&self, address: &str, token: &str) -> Result<usize, Error> {
        match self.resolve_owner(address, Some(token))? {
            Some((owner, Some(token_pubkey))) => self.history_count(&owner, &token_pubkey),
            _ => Ok(0),
        }
    }
}
