//! Write side of the ledger tables.
//!
//! Every record is written together with the index entries derived from it inside one
//! [`WriteTask`], so readers never observe an index entry without its row (or the reverse).
//! These operations are used by the ingestion process which owns the primary database.

use chrono::Utc;
use tracing::trace;

use crate::{error::Error, storage::kv_store::WriteTask};

use super::{
    tables::{
        HoldersRankKey, MintKey, MintsByTokenKV, OutputsByOwnerTokenKV, OwnerTokenOutputKey,
        OwnerTokenUtxoKey, OwnerUtxoKey, TokenCountKV, TokenIdByPubKeyKV, TokenIdBySeqKV,
        OutputSpan, TokenInfoByIdKV, TokenSeqEntry, TokenStatisticsByIdKV, TokenUtxoKey,
        TokensByHoldersKV, TxOutByRefKV, UtxosByOwnerKV, UtxosByOwnerTokenKV, UtxosByTokenKV,
    },
    types::{
        MintEvent, Spend, TokenInfo, TokenState, TokenStatistics, TxOut, TxoRef, is_token_id,
    },
};

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

impl TokenInfoByIdKV {
    /// Registers a new token. Token metadata is immutable, so an id or key which is already known
    /// is rejected.
    pub fn insert(task: &mut WriteTask, mut info: TokenInfo) -> Result<(), Error> {
        if !is_token_id(&info.token_id) {
            return Err(Error::invalid_record(format!(
                "malformed token id '{}'",
                info.token_id
            )));
        }

        if task.get::<Self>(&info.token_id)?.is_some() {
            return Err(Error::invalid_record(format!(
                "token {} already exists",
                info.token_id
            )));
        }

        if task.get::<TokenIdByPubKeyKV>(&info.token_pubkey)?.is_some() {
            return Err(Error::invalid_record(format!(
                "token key {} already registered",
                hex::encode(info.token_pubkey)
            )));
        }

        let seq = task.get::<TokenCountKV>(&())?.unwrap_or_default();

        let now = unix_now();
        info.created_at = now;
        info.updated_at = now;

        trace!(token_id = %info.token_id, seq, "inserting token");

        task.set::<TokenIdByPubKeyKV>(info.token_pubkey, info.token_id.clone());
        task.set::<TokenIdBySeqKV>(
            seq,
            TokenSeqEntry {
                token_id: info.token_id.clone(),
                reveal_height: info.reveal_height,
            },
        );
        task.set::<TokenCountKV>((), seq + 1);
        task.set::<Self>(info.token_id.clone(), info);

        Ok(())
    }
}

impl TxOutByRefKV {
    /// Records a newly observed output. Outputs carrying token state are also added to the owner
    /// and token indexes.
    pub fn insert(task: &mut WriteTask, txo: TxOut) -> Result<(), Error> {
        let txo_ref = txo.txo_ref();

        if txo.spend.is_some() {
            return Err(Error::invalid_record(format!(
                "output {}:{} inserted as already spent",
                hex::encode(txo_ref.tx_hash),
                txo_ref.txo_index
            )));
        }

        if task.get::<Self>(&txo_ref)?.is_some() {
            return Err(Error::invalid_record(format!(
                "output {}:{} already exists",
                hex::encode(txo_ref.tx_hash),
                txo_ref.txo_index
            )));
        }

        if let Some(token) = &txo.token {
            let height = txo.block_height;

            set_unspent_indexes(task, token, txo_ref, OutputSpan::unspent_from(height));
            task.set::<OutputsByOwnerTokenKV>(
                OwnerTokenOutputKey {
                    owner: token.owner.clone(),
                    token_pubkey: token.token_pubkey,
                    txo_ref,
                },
                height,
            );
        }

        task.set::<Self>(txo_ref, txo);

        Ok(())
    }

    /// Marks an output as consumed. An output can only be spent once.
    pub fn mark_spent(task: &mut WriteTask, txo_ref: TxoRef, spend: Spend) -> Result<(), Error> {
        let Some(mut txo) = task.get::<Self>(&txo_ref)? else {
            return Err(Error::invalid_record(format!(
                "spent output {}:{} is unknown",
                hex::encode(txo_ref.tx_hash),
                txo_ref.txo_index
            )));
        };

        if let Some(existing) = txo.spend {
            return Err(Error::invalid_record(format!(
                "output {}:{} already spent by {}",
                hex::encode(txo_ref.tx_hash),
                txo_ref.txo_index,
                hex::encode(existing.txid)
            )));
        }

        if spend.height < txo.block_height {
            return Err(Error::invalid_record(format!(
                "output {}:{} spent at {} before being produced at {}",
                hex::encode(txo_ref.tx_hash),
                txo_ref.txo_index,
                spend.height,
                txo.block_height
            )));
        }

        // entries stay indexed: readers behind the spend height still see the output unspent
        if let Some(token) = &txo.token {
            let span = OutputSpan {
                produced: txo.block_height,
                spent: Some(spend.height),
            };

            set_unspent_indexes(task, token, txo_ref, span);
        }

        txo.spend = Some(spend);
        task.set::<Self>(txo_ref, txo);

        Ok(())
    }
}

fn set_unspent_indexes(
    task: &mut WriteTask,
    token: &TokenState,
    txo_ref: TxoRef,
    span: OutputSpan,
) {
    task.set::<UtxosByOwnerKV>(OwnerUtxoKey::new(&token.owner, token.amount, txo_ref), span);
    task.set::<UtxosByOwnerTokenKV>(
        OwnerTokenUtxoKey::new(&token.owner, token.token_pubkey, token.amount, txo_ref),
        span,
    );
    task.set::<UtxosByTokenKV>(
        TokenUtxoKey {
            token_pubkey: token.token_pubkey,
            owner: token.owner.clone(),
            txo_ref,
        },
        span,
    );
}

impl MintsByTokenKV {
    /// Appends a mint event. Mint events are never revised.
    pub fn record(task: &mut WriteTask, event: MintEvent) -> Result<(), Error> {
        let key = MintKey {
            token_pubkey: event.token_pubkey,
            txid: event.txid,
        };

        if task.get::<Self>(&key)?.is_some() {
            return Err(Error::invalid_record(format!(
                "mint {} already recorded",
                hex::encode(event.txid)
            )));
        }

        task.set::<Self>(key, event);

        Ok(())
    }
}

impl TokenStatisticsByIdKV {
    /// Replaces the statistics of a token, moving its holders ranking entry along.
    pub fn update(task: &mut WriteTask, stats: TokenStatistics) -> Result<(), Error> {
        if let Some(previous) = task.get::<Self>(&stats.token_id)? {
            task.delete::<TokensByHoldersKV>(HoldersRankKey::new(&previous));
        }

        task.set::<TokensByHoldersKV>(HoldersRankKey::new(&stats), ());
        task.set::<Self>(stats.token_id.clone(), stats);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::tables::AmountRank,
        storage::table::Table,
        testing::{TestLedger, hash, owner},
    };

    #[test]
    fn token_insert_rejects_duplicates_and_malformed_ids() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);

        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));

        let mut task = ledger.storage.begin_task().unwrap();
        assert!(TokenInfoByIdKV::insert(&mut task, info.clone()).is_err());

        let mut same_key = ledger.token_info(2, 5);
        same_key.token_pubkey = info.token_pubkey;
        assert!(TokenInfoByIdKV::insert(&mut task, same_key).is_err());

        let mut bad_id = ledger.token_info(3, 5);
        bad_id.token_id = "nodelimiter".into();
        assert!(TokenInfoByIdKV::insert(&mut task, bad_id).is_err());

        let reader = ledger.storage.reader();
        let stored = reader.get::<TokenInfoByIdKV>(&info.token_id).unwrap().unwrap();
        assert!(stored.created_at > 0);
        assert_eq!(reader.get::<TokenCountKV>(&()).unwrap(), Some(1));
    }

    #[test]
    fn spending_records_spend_height_in_every_index() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);
        let txo = ledger.token_output(10, 0, 1, &info, 100, 5);
        let txo_ref = txo.txo_ref();

        ledger.write(|task| TxOutByRefKV::insert(task, txo.clone()));

        let reader = ledger.storage.reader();
        let owner_spans = || {
            reader
                .iter_kvs::<UtxosByOwnerKV>(UtxosByOwnerKV::prefix_range(&owner(1)), false)
                .unwrap()
                .map(|kv| kv.map(|(_, span)| span))
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        };
        assert_eq!(owner_spans(), vec![OutputSpan::unspent_from(5)]);

        let spend = Spend {
            txid: hash(11),
            height: 6,
        };
        ledger.write(|task| TxOutByRefKV::mark_spent(task, txo_ref, spend));

        let mut task = ledger.storage.begin_task().unwrap();
        assert!(TxOutByRefKV::mark_spent(&mut task, txo_ref, spend).is_err());
        assert!(TxOutByRefKV::insert(&mut task, txo.clone()).is_err());

        let stored = reader.get::<TxOutByRefKV>(&txo_ref).unwrap().unwrap();
        assert_eq!(stored.spend, Some(spend));

        let spans = owner_spans();
        assert_eq!(
            spans,
            vec![OutputSpan {
                produced: 5,
                spent: Some(6)
            }]
        );
        assert!(spans[0].unspent_at(5));
        assert!(!spans[0].unspent_at(6));

        let by_token = reader
            .iter_kvs::<UtxosByTokenKV>(UtxosByTokenKV::prefix_range(&info.token_pubkey), false)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(by_token[0].1, spans[0]);

        let history = reader
            .iter_kvs::<OutputsByOwnerTokenKV>(
                OutputsByOwnerTokenKV::prefix_range(&(owner(1), info.token_pubkey)),
                false,
            )
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0.txo_ref, txo_ref);
        assert_eq!(AmountRank::from_amount(100).amount(), 100);
    }

    #[test]
    fn spend_cannot_precede_production() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);
        let txo = ledger.token_output(10, 0, 1, &info, 100, 5);
        let txo_ref = txo.txo_ref();

        ledger.write(|task| TxOutByRefKV::insert(task, txo));

        let mut task = ledger.storage.begin_task().unwrap();
        let early = Spend {
            txid: hash(11),
            height: 4,
        };
        assert!(TxOutByRefKV::mark_spent(&mut task, txo_ref, early).is_err());
    }

    #[test]
    fn statistics_update_moves_ranking_entry() {
        let ledger = TestLedger::new();

        let stats = |holders| TokenStatistics {
            token_id: "a_0".into(),
            holders,
            minted: 10,
        };

        ledger.write(|task| TokenStatisticsByIdKV::update(task, stats(3)));
        ledger.write(|task| TokenStatisticsByIdKV::update(task, stats(8)));

        let ranked = ledger
            .storage
            .reader()
            .iter_kvs::<TokensByHoldersKV>(TokensByHoldersKV::encode_range(None::<&()>, None::<&()>), false)
            .unwrap()
            .map(|kv| kv.map(|(k, _)| k.holders()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(ranked, vec![8]);
    }

    #[test]
    fn mints_are_append_only() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);

        ledger.write(|task| MintsByTokenKV::record(task, ledger.mint(&info, 20, 40, 5)));

        let mut task = ledger.storage.begin_task().unwrap();
        assert!(MintsByTokenKV::record(&mut task, ledger.mint(&info, 20, 1, 5)).is_err());
    }
}
