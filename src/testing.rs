//! Fixtures for tests: a throwaway primary database plus builders for ledger records.

use std::sync::Arc;

use axum::response::IntoResponse;
use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};
use tempfile::TempDir;

use crate::{
    codec::{AddressCodec, BitcoinAddressCodec, Network},
    error::Error,
    ledger::{
        tables::ProcessedHeightKV,
        types::{MintEvent, OwnerHash, TokenInfo, TokenState, TxHash, TxOut, XOnlyKey, token_id},
    },
    query::TokenTracker,
    storage::kv_store::{StorageHandler, WriteTask},
};

const OWNER_KEYS: u8 = 1;
const TOKEN_KEYS: u8 = 2;
const MINTER_KEYS: u8 = 3;

pub fn hash(n: u8) -> TxHash {
    [n; 32]
}

/// Valid x-only key, distinct per `(domain, n)`
fn xonly(domain: u8, n: u8) -> XOnlyKey {
    let mut secret = [n.max(1); 32];
    secret[0] = domain;

    let secp = Secp256k1::new();
    let key = SecretKey::from_slice(&secret).unwrap();

    Keypair::from_secret_key(&secp, &key)
        .x_only_public_key()
        .0
        .serialize()
}

/// Owner hash of test owner `n`, the witness program of its taproot address
pub fn owner(n: u8) -> OwnerHash {
    xonly(OWNER_KEYS, n).to_vec()
}

pub struct TestLedger {
    _dir: TempDir,
    pub storage: StorageHandler,
    pub codec: Arc<BitcoinAddressCodec>,
}

impl TestLedger {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let storage = StorageHandler::open_path(dir.path().to_path_buf(), None, 64 * 1024 * 1024)
            .unwrap();

        Self {
            _dir: dir,
            storage,
            codec: Arc::new(BitcoinAddressCodec::new(Network::Regtest)),
        }
    }

    pub fn tracker(&self) -> TokenTracker {
        TokenTracker::new(self.storage.clone(), self.codec.clone(), 1_000)
    }

    /// Applies the writes of `f` as one batch
    pub fn write(&self, f: impl FnOnce(&mut WriteTask) -> Result<(), Error>) {
        let mut task = self.storage.begin_task().unwrap();
        f(&mut task).unwrap();
        self.storage.apply_task(task.finalize()).unwrap();
    }

    pub fn set_height(&self, height: u64) {
        self.write(|task| ProcessedHeightKV::advance(task, height));
    }

    pub fn owner_address(&self, n: u8) -> String {
        self.codec
            .public_key_to_address(&xonly(OWNER_KEYS, n))
            .unwrap()
    }

    pub fn token_info(&self, n: u8, reveal_height: u64) -> TokenInfo {
        TokenInfo {
            token_id: token_id(&hash(n), 0),
            token_pubkey: xonly(TOKEN_KEYS, n),
            minter_pubkey: xonly(MINTER_KEYS, n),
            decimals: 2,
            name: format!("Token {n}"),
            symbol: format!("T{n}"),
            genesis_txid: hash(n),
            reveal_txid: hash(n.wrapping_add(100)),
            reveal_height,
            raw_info: format!(r#"{{"name":"Token {n}","max":"21000000"}}"#),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Output `vout` of transaction `tx` holding `amount` of `token` for owner `owner_n`
    pub fn token_output(
        &self,
        tx: u8,
        vout: u32,
        owner_n: u8,
        token: &TokenInfo,
        amount: u128,
        height: u64,
    ) -> TxOut {
        let owner = owner(owner_n);

        TxOut {
            txid: hash(tx),
            output_index: vout,
            locking_script: [vec![0x51, 0x20], owner.clone()].concat(),
            satoshis: 330,
            block_height: height,
            state_hash: vec![tx, vout as u8],
            token: Some(TokenState {
                owner,
                amount,
                token_pubkey: token.token_pubkey,
            }),
            spend: None,
        }
    }

    pub fn mint(&self, token: &TokenInfo, tx: u8, amount: u128, height: u64) -> MintEvent {
        MintEvent {
            token_pubkey: token.token_pubkey,
            txid: hash(tx),
            token_amount: amount,
            block_height: height,
        }
    }
}

/// Reads the JSON body of a handler response
pub async fn body_json(resp: impl IntoResponse) -> serde_json::Value {
    let body = resp.into_response().into_body();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    serde_json::from_slice(&bytes).unwrap()
}
