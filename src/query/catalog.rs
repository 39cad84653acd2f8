use std::collections::HashMap;

use bitcoin::{Txid, hashes::Hash};
use itertools::Itertools;
use mini_moka::sync::Cache;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::Error,
    ledger::{
        tables::{TokenIdByPubKeyKV, TokenInfoByIdKV},
        types::{TokenInfo, XOnlyKey, is_token_id},
    },
};

use super::QueryContext;

/// Token metadata never changes once written, so positive lookups are kept in memory. Misses are
/// not cached since the token may be created later.
pub struct TokenCatalog {
    by_id: Cache<String, TokenInfo>,
    id_by_key: Cache<XOnlyKey, String>,
}

impl TokenCatalog {
    pub fn new(max_entries: u64) -> Self {
        Self {
            by_id: Cache::new(max_entries),
            id_by_key: Cache::new(max_entries),
        }
    }

    fn remember(&self, info: &TokenInfo) {
        self.id_by_key
            .insert(info.token_pubkey, info.token_id.clone());
        self.by_id.insert(info.token_id.clone(), info.clone());
    }
}

/// Public view of a token, built field by field from the stored record.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TokenView {
    pub token_id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub token_pubkey: String,
    pub token_addr: Option<String>,
    pub minter_pubkey: String,
    pub minter_addr: Option<String>,
    pub genesis_txid: String,
    pub reveal_txid: String,
    pub reveal_height: u64,
    pub info: Value,
}

impl QueryContext<'_> {
    pub fn token_info(&self, token_id: &str) -> Result<Option<TokenInfo>, Error> {
        let token_id = token_id.to_string();

        if let Some(info) = self.catalog.by_id.get(&token_id) {
            return Ok(Some(info));
        }

        let info = self.reader.get::<TokenInfoByIdKV>(&token_id)?;

        if let Some(info) = &info {
            self.catalog.remember(info);
        }

        Ok(info)
    }

    pub fn token_info_by_key(&self, token_pubkey: &XOnlyKey) -> Result<Option<TokenInfo>, Error> {
        let token_id = match self.catalog.id_by_key.get(token_pubkey) {
            Some(id) => id,
            None => match self.reader.get::<TokenIdByPubKeyKV>(token_pubkey)? {
                Some(id) => id,
                None => return Ok(None),
            },
        };

        self.token_info(&token_id)
    }

    /// Looks up a token by id (`<txid>_<vout>`) or by its taproot address.
    pub fn resolve(&self, identifier: &str) -> Result<Option<TokenInfo>, Error> {
        if is_token_id(identifier) {
            return self.token_info(identifier);
        }

        match self.codec.address_to_public_key(identifier) {
            Some(key) => self.token_info_by_key(&key),
            None => {
                debug!(identifier, "unable to resolve token identifier");
                Ok(None)
            }
        }
    }

    /// Fetches the metadata of many tokens with a single storage round trip for the ones not
    /// cached yet. Unknown ids are absent from the result.
    pub fn info_batch(&self, token_ids: &[String]) -> Result<HashMap<String, TokenInfo>, Error> {
        let mut found = HashMap::with_capacity(token_ids.len());
        let mut missing = vec![];

        for token_id in token_ids.iter().unique() {
            match self.catalog.by_id.get(token_id) {
                Some(info) => {
                    found.insert(token_id.clone(), info);
                }
                None => missing.push(token_id.clone()),
            }
        }

        for (token_id, info) in self.reader.multi_get::<TokenInfoByIdKV>(missing)? {
            if let Some(info) = info {
                self.catalog.remember(&info);
                found.insert(token_id, info);
            }
        }

        Ok(found)
    }

    pub fn render(&self, info: Option<&TokenInfo>) -> Option<TokenView> {
        let info = info?;

        let metadata = match serde_json::from_str::<Value>(&info.raw_info) {
            Ok(v) => v,
            Err(_) => Value::String(info.raw_info.clone()),
        };

        let token_addr = self.codec.public_key_to_address(&info.token_pubkey);
        let minter_addr = self.codec.public_key_to_address(&info.minter_pubkey);

        if token_addr.is_none() {
            warn!(token_id = %info.token_id, "token key does not map to an address");
        }

        Some(TokenView {
            token_id: info.token_id.clone(),
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            decimals: info.decimals,
            token_pubkey: hex::encode(info.token_pubkey),
            token_addr,
            minter_pubkey: hex::encode(info.minter_pubkey),
            minter_addr,
            genesis_txid: Txid::from_byte_array(info.genesis_txid).to_string(),
            reveal_txid: Txid::from_byte_array(info.reveal_txid).to_string(),
            reveal_height: info.reveal_height,
            info: metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{ledger::tables::TokenInfoByIdKV, testing::TestLedger};

    #[test]
    fn resolves_by_id_and_by_address() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);
        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let by_id = ctx.resolve(&info.token_id).unwrap().unwrap();
        assert_eq!(by_id.token_pubkey, info.token_pubkey);

        let address = ctx.codec().public_key_to_address(&info.token_pubkey).unwrap();
        let by_address = ctx.resolve(&address).unwrap().unwrap();
        assert_eq!(by_address.token_id, info.token_id);

        assert_eq!(ctx.resolve("bogus").unwrap(), None);
        assert_eq!(ctx.resolve("deadbeef_0").unwrap(), None);
    }

    #[test]
    fn render_derives_addresses_and_hides_bookkeeping() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 5);
        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let stored = ctx.token_info(&info.token_id).unwrap();
        let view = ctx.render(stored.as_ref()).unwrap();

        assert_eq!(
            view.token_addr,
            ctx.codec().public_key_to_address(&info.token_pubkey)
        );
        assert!(view.minter_addr.is_some());
        assert_eq!(view.info["name"], "Token 1");

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("created_at").is_none());
        assert!(json.get("raw_info").is_none());

        assert_eq!(ctx.render(None), None);
    }

    #[test]
    fn non_json_metadata_is_kept_as_text() {
        let ledger = TestLedger::new();
        let mut info = ledger.token_info(1, 5);
        info.raw_info = "plain text".into();
        ledger.write(|task| TokenInfoByIdKV::insert(task, info.clone()));

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        let view = ctx.render(Some(&info)).unwrap();
        assert_eq!(view.info, serde_json::json!("plain text"));
    }

    #[test]
    fn info_batch_returns_known_tokens_only() {
        let ledger = TestLedger::new();
        let a = ledger.token_info(1, 5);
        let b = ledger.token_info(2, 5);
        ledger.write(|task| TokenInfoByIdKV::insert(task, a.clone()));
        ledger.write(|task| TokenInfoByIdKV::insert(task, b.clone()));

        let tracker = ledger.tracker();
        let ctx = tracker.start_query().unwrap();

        // warm the cache for one of them
        ctx.token_info(&a.token_id).unwrap();

        let batch = ctx
            .info_batch(&[
                a.token_id.clone(),
                b.token_id.clone(),
                "missing_0".to_string(),
                a.token_id.clone(),
            ])
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[&b.token_id].name, b.name);
    }
}
