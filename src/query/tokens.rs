use itertools::Itertools;
use tracing::warn;

use crate::{
    error::Error,
    ledger::{
        tables::{TokenIdBySeqKV, TokenStatisticsByIdKV, TokensByHoldersKV},
        types::{Amount, TokenInfo},
    },
    storage::table::Table,
};

use super::{Pagination, QueryContext};

/// Token with live figures computed at the request watermark
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSummary {
    pub info: TokenInfo,
    pub supply: Amount,
    pub holders: u64,
}

/// Token with figures taken from the statistics rollup
#[derive(Debug, Clone, PartialEq)]
pub struct RankedToken {
    pub token_id: String,
    pub holders: u64,
    pub minted: Amount,
    pub info: Option<TokenInfo>,
}

impl QueryContext<'_> {
    /// Ids of the tokens revealed at or below the watermark, in creation order
    fn visible_token_ids(&self) -> Result<Vec<String>, Error> {
        let Some(height) = self.watermark.height() else {
            return Ok(vec![]);
        };

        let range = TokenIdBySeqKV::encode_range(None::<&()>, None::<&()>);

        self.reader
            .iter_kvs::<TokenIdBySeqKV>(range, false)?
            .filter_map_ok(|(_, entry)| (entry.reveal_height <= height).then_some(entry.token_id))
            .collect()
    }

    /// Tokens in creation order, with supply and holders computed live for the page.
    pub fn all_tokens(&self, page: Pagination) -> Result<Vec<TokenSummary>, Error> {
        let ids = page.page(self.visible_token_ids()?).collect::<Vec<_>>();
        let mut infos = self.info_batch(&ids)?;

        let mut out = Vec::with_capacity(ids.len());

        for token_id in ids {
            let Some(info) = infos.remove(&token_id) else {
                warn!(%token_id, "token sequence entry without token info");
                continue;
            };

            let supply = self.minted_amount(&info.token_pubkey)?;
            let holders = self.holder_count(&info.token_pubkey)?;

            out.push(TokenSummary {
                info,
                supply,
                holders,
            });
        }

        Ok(out)
    }

    pub fn token_count(&self) -> Result<usize, Error> {
        Ok(self.visible_token_ids()?.len())
    }

    /// Tokens ordered by holders (most first) according to the statistics rollup, joined with
    /// their metadata through a single batched lookup.
    pub fn ranked_tokens(&self, page: Pagination) -> Result<Vec<RankedToken>, Error> {
        let range = TokensByHoldersKV::encode_range(None::<&()>, None::<&()>);

        let ranked = self
            .reader
            .iter_kvs::<TokensByHoldersKV>(range, false)?
            .map_ok(|(key, _)| key.token_id)
            .collect::<Result<Vec<_>, _>>()?;

        let ids = page.page(ranked).collect::<Vec<_>>();

        let stats = self.reader.multi_get::<TokenStatisticsByIdKV>(ids.clone())?;
        let mut infos = self.info_batch(&ids)?;

        let mut out = Vec::with_capacity(stats.len());

        for (token_id, stats) in stats {
            let Some(stats) = stats else {
                warn!(%token_id, "ranking entry without statistics row");
                continue;
            };

            out.push(RankedToken {
                info: infos.remove(&token_id),
                token_id,
                holders: stats.holders,
                minted: stats.minted,
            });
        }

        Ok(out)
    }

    pub fn ranked_token_count(&self) -> Result<usize, Error> {
        let range = TokensByHoldersKV::encode_range(None::<&()>, None::<&()>);

        self.reader
            .iter_kvs::<TokensByHoldersKV>(range, false)?
            .try_fold(0, |count, kv| kv.map(|_| count + 1))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        define_ledger_table,
        ledger::{
            tables::{
                LedgerTables, MintsByTokenKV, TokenInfoByIdKV, TokenStatisticsByIdKV, TxOutByRefKV,
            },
            types::TokenStatistics,
        },
        query::Pagination,
        testing::TestLedger,
    };

    #[test]
    fn all_tokens_in_creation_order_with_live_figures() {
        let ledger = TestLedger::new();
        let tokens = [
            ledger.token_info(3, 1),
            ledger.token_info(1, 2),
            ledger.token_info(2, 9),
        ];

        ledger.write(|task| {
            for info in &tokens {
                TokenInfoByIdKV::insert(task, info.clone())?;
            }
            MintsByTokenKV::record(task, ledger.mint(&tokens[0], 40, 500, 2))?;
            TxOutByRefKV::insert(task, ledger.token_output(40, 0, 1, &tokens[0], 200, 2))?;
            TxOutByRefKV::insert(task, ledger.token_output(40, 1, 2, &tokens[0], 300, 2))
        });
        ledger.set_height(5);

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let all = ctx.all_tokens(Pagination::default()).unwrap();

        // the third token is revealed above the watermark
        assert_eq!(ctx.token_count().unwrap(), 2);
        assert_eq!(
            all.iter().map(|t| t.info.token_id.clone()).collect::<Vec<_>>(),
            vec![tokens[0].token_id.clone(), tokens[1].token_id.clone()]
        );
        assert_eq!((all[0].supply, all[0].holders), (500, 2));
        assert_eq!((all[1].supply, all[1].holders), (0, 0));

        let second_page = ctx.all_tokens(Pagination::new(Some(1), Some(1))).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].info.token_id, tokens[1].token_id);
    }

    #[test]
    fn all_tokens_is_empty_before_bootstrap() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 0);
        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        assert!(ctx.all_tokens(Pagination::default()).unwrap().is_empty());
        assert_eq!(ctx.token_count().unwrap(), 0);
    }

    #[test]
    fn ranked_tokens_follow_the_rollup() {
        let ledger = TestLedger::new();
        let a = ledger.token_info(1, 1);
        let b = ledger.token_info(2, 1);

        ledger.write(|task| {
            TokenInfoByIdKV::insert(task, a.clone())?;
            TokenInfoByIdKV::insert(task, b.clone())?;

            for (token_id, holders, minted) in [
                (a.token_id.clone(), 5, 100),
                (b.token_id.clone(), 9, 7),
                ("orphan_0".to_string(), 1, 1),
            ] {
                TokenStatisticsByIdKV::update(
                    task,
                    TokenStatistics {
                        token_id,
                        holders,
                        minted,
                    },
                )?;
            }
            Ok(())
        });

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let ranked = ctx.ranked_tokens(Pagination::default()).unwrap();

        let order = ranked
            .iter()
            .map(|r| (r.token_id.clone(), r.holders))
            .collect::<Vec<_>>();

        assert_eq!(
            order,
            vec![
                (b.token_id.clone(), 9),
                (a.token_id.clone(), 5),
                ("orphan_0".to_string(), 1)
            ]
        );

        assert_eq!(ranked[0].minted, 7);
        assert_eq!(ranked[0].info.as_ref().unwrap().name, b.name);

        // rollup rows survive even when the token metadata is missing
        assert!(ranked[2].info.is_none());

        assert_eq!(ctx.ranked_token_count().unwrap(), 3);
        assert_eq!(ctx.ranked_tokens(Pagination::new(Some(2), Some(5))).unwrap().len(), 1);
    }

    #[test]
    fn ranking_ties_list_shorter_ids_first_then_bytewise() {
        let ledger = TestLedger::new();

        ledger.write(|task| {
            for (token_id, holders) in [("bb_1", 4), ("a_10", 4), ("c_2", 4), ("z_0", 6)] {
                TokenStatisticsByIdKV::update(
                    task,
                    TokenStatistics {
                        token_id: token_id.to_string(),
                        holders,
                        minted: 1,
                    },
                )?;
            }
            Ok(())
        });

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let order = ctx
            .ranked_tokens(Pagination::default())
            .unwrap()
            .into_iter()
            .map(|r| r.token_id)
            .collect::<Vec<_>>();

        assert_eq!(order, vec!["z_0", "c_2", "a_10", "bb_1"]);
    }

    #[test]
    fn undecodable_ranking_entry_fails_even_outside_the_page() {
        let ledger = TestLedger::new();

        ledger.write(|task| {
            TokenStatisticsByIdKV::update(
                task,
                TokenStatistics {
                    token_id: "a_0".into(),
                    holders: 3,
                    minted: 1,
                },
            )
        });

        // same table, with a token id which is not valid UTF-8, ranked above the real entry
        define_ledger_table! {
            name: RawRankKV,
            key_type: (u64, Vec<u8>),
            value_type: (),
            table: LedgerTables::TokensByHolders
        }

        ledger.write(|task| {
            task.set::<RawRankKV>((u64::MAX - 9, vec![0xFF]), ());
            Ok(())
        });

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        assert!(ctx.ranked_tokens(Pagination::new(Some(1), Some(1))).is_err());
        assert!(ctx.ranked_token_count().is_err());
    }
}
