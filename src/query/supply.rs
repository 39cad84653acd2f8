use itertools::Itertools;

use crate::{
    error::Error,
    ledger::{
        tables::{MintsByTokenKV, UtxosByTokenKV},
        types::{Amount, TxoRef, XOnlyKey},
    },
    storage::table::Table,
};

use super::QueryContext;

impl QueryContext<'_> {
    /// Cumulative minted amount of a token. Burns and unspendable outputs do not reduce it.
    pub fn minted_amount(&self, token_pubkey: &XOnlyKey) -> Result<Amount, Error> {
        let Some(height) = self.watermark.height() else {
            return Ok(0);
        };

        let range = MintsByTokenKV::prefix_range(token_pubkey);

        self.reader
            .iter_kvs::<MintsByTokenKV>(range, false)?
            .filter_ok(|(_, mint)| mint.block_height <= height)
            .try_fold(0u128, |total, kv| {
                let (_, mint) = kv?;

                total
                    .checked_add(mint.token_amount)
                    .ok_or(Error::AmountOverflow("supply"))
            })
    }

    /// Total supply of a token given by id or address. `None` when the token does not resolve,
    /// zero when it has no mints.
    pub fn total_supply(&self, identifier: &str) -> Result<Option<Amount>, Error> {
        match self.resolve(identifier)? {
            Some(info) => Ok(Some(self.minted_amount(&info.token_pubkey)?)),
            None => Ok(None),
        }
    }

    /// Outputs of a token unspent at the watermark, with their owner
    fn token_utxo_refs(&self, token_pubkey: &XOnlyKey) -> Result<Vec<(Vec<u8>, TxoRef)>, Error> {
        let Some(height) = self.watermark.height() else {
            return Ok(vec![]);
        };

        let range = UtxosByTokenKV::prefix_range(token_pubkey);

        self.reader
            .iter_kvs::<UtxosByTokenKV>(range, false)?
            .filter_map_ok(|(key, span)| {
                span.unspent_at(height).then_some((key.owner, key.txo_ref))
            })
            .collect()
    }

    /// Number of distinct owners among the unspent outputs of a token
    pub fn holder_count(&self, token_pubkey: &XOnlyKey) -> Result<u64, Error> {
        // entries are grouped by owner, so distinct owners are consecutive
        let holders = self
            .token_utxo_refs(token_pubkey)?
            .into_iter()
            .map(|(owner, _)| owner)
            .dedup()
            .count();

        Ok(holders as u64)
    }

    /// Sum of the unspent amounts of a token. Differs from the minted amount once tokens are
    /// burned.
    pub fn circulating_supply(&self, token_pubkey: &XOnlyKey) -> Result<Amount, Error> {
        let refs = self
            .token_utxo_refs(token_pubkey)?
            .into_iter()
            .map(|(_, txo_ref)| txo_ref)
            .collect();

        self.load_unspent(refs)?
            .iter()
            .filter_map(|u| u.token_amount())
            .try_fold(0u128, |total, amount| {
                total
                    .checked_add(amount)
                    .ok_or(Error::AmountOverflow("circulating supply"))
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ledger::{
            tables::{MintsByTokenKV, TokenInfoByIdKV, TxOutByRefKV},
            types::Spend,
        },
        testing::{TestLedger, hash},
    };

    #[test]
    fn supply_counts_mints_not_circulation() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 1);
        let minted = ledger.token_output(20, 0, 1, &info, 1000, 2);
        let minted_ref = minted.txo_ref();

        ledger.write(|task| {
            TokenInfoByIdKV::insert(task, info.clone())?;
            MintsByTokenKV::record(task, ledger.mint(&info, 20, 1000, 2))?;
            TxOutByRefKV::insert(task, minted)
        });

        // the minted output is burned: spent without creating new token outputs
        ledger.write(|task| {
            TxOutByRefKV::mark_spent(
                task,
                minted_ref,
                Spend {
                    txid: hash(21),
                    height: 3,
                },
            )
        });
        ledger.set_height(3);

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        assert_eq!(ctx.total_supply(&info.token_id).unwrap(), Some(1000));
        assert_eq!(ctx.circulating_supply(&info.token_pubkey).unwrap(), 0);
        assert_eq!(ctx.holder_count(&info.token_pubkey).unwrap(), 0);
    }

    #[test]
    fn supply_is_zero_without_mints_and_none_for_unknown_tokens() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 1);

        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));
        ledger.set_height(1);

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        assert_eq!(ctx.total_supply(&info.token_id).unwrap(), Some(0));
        assert_eq!(ctx.total_supply("unknown_0").unwrap(), None);
        assert_eq!(ctx.total_supply("not an address").unwrap(), None);
    }

    #[test]
    fn supply_and_holders_respect_the_watermark() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 1);

        ledger.write(|task| {
            TokenInfoByIdKV::insert(task, info.clone())?;
            MintsByTokenKV::record(task, ledger.mint(&info, 10, 60, 2))?;
            MintsByTokenKV::record(task, ledger.mint(&info, 11, 40, 4))?;
            TxOutByRefKV::insert(task, ledger.token_output(10, 0, 1, &info, 30, 2))?;
            TxOutByRefKV::insert(task, ledger.token_output(10, 1, 1, &info, 30, 2))?;
            TxOutByRefKV::insert(task, ledger.token_output(11, 0, 2, &info, 40, 4))
        });

        let tracker = ledger.tracker();

        let ctx = tracker.start_query().unwrap();
        assert_eq!(ctx.total_supply(&info.token_id).unwrap(), Some(0));

        ledger.set_height(3);
        let ctx = tracker.start_query().unwrap();
        assert_eq!(ctx.total_supply(&info.token_id).unwrap(), Some(60));
        assert_eq!(ctx.holder_count(&info.token_pubkey).unwrap(), 1);

        ledger.set_height(4);
        let ctx = tracker.start_query().unwrap();
        assert_eq!(ctx.total_supply(&info.token_id).unwrap(), Some(100));
        assert_eq!(ctx.circulating_supply(&info.token_pubkey).unwrap(), 100);
        assert_eq!(ctx.holder_count(&info.token_pubkey).unwrap(), 2);
    }
}
