use bitcoin::{Txid, hashes::Hash};
use token_tracker_macros::{Decode, Encode};

/// Raw transaction hash, in the byte order of the consensus encoding.
pub type TxHash = [u8; 32];

/// X-only public key, the canonical identifier of tokens and minters.
pub type XOnlyKey = [u8; 32];

/// Owner identifier carried by token outputs: a witness program (20 byte key hash or 32 byte
/// x-only key).
pub type OwnerHash = Vec<u8>;

pub type Amount = u128;

#[derive(Encode, Decode, PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct TxoRef {
    pub tx_hash: TxHash,
    pub txo_index: u32,
}

/// Token metadata, written once at genesis.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    /// `<genesis txid>_<genesis output index>`
    pub token_id: String,
    pub token_pubkey: XOnlyKey,
    pub minter_pubkey: XOnlyKey,
    pub decimals: u8,
    pub name: String,
    pub symbol: String,
    pub genesis_txid: TxHash,
    pub reveal_txid: TxHash,
    pub reveal_height: u64,
    /// Opaque metadata as committed at genesis (JSON text)
    pub raw_info: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Token state carried by an output. Owner and amount only ever exist together.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TokenState {
    pub owner: OwnerHash,
    pub amount: Amount,
    pub token_pubkey: XOnlyKey,
}

#[derive(Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spend {
    pub txid: TxHash,
    pub height: u64,
}

/// Every transaction output ever observed by the ingestion process.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub txid: TxHash,
    pub output_index: u32,
    pub locking_script: Vec<u8>,
    pub satoshis: u64,
    pub block_height: u64,
    pub state_hash: Vec<u8>,
    pub token: Option<TokenState>,
    /// Set exactly once, when a later transaction consumes the output
    pub spend: Option<Spend>,
}

impl TxOut {
    pub fn txo_ref(&self) -> TxoRef {
        TxoRef {
            tx_hash: self.txid,
            txo_index: self.output_index,
        }
    }

    /// Whether the output exists and is not yet consumed as of `height`
    pub fn is_unspent_at(&self, height: u64) -> bool {
        self.block_height <= height && self.spend.is_none_or(|spend| spend.height > height)
    }

    pub fn token_amount(&self) -> Option<Amount> {
        self.token.as_ref().map(|t| t.amount)
    }
}

/// A single mint operation, append-only.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct MintEvent {
    pub token_pubkey: XOnlyKey,
    pub txid: TxHash,
    pub token_amount: Amount,
    pub block_height: u64,
}

/// Rollup recomputed out-of-band, eventually consistent with outputs and mints.
#[derive(Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct TokenStatistics {
    pub token_id: String,
    pub holders: u64,
    pub minted: Amount,
}

/// Token ids are built from the genesis outpoint and always contain this delimiter, which never
/// appears in an address.
pub const TOKEN_ID_DELIMITER: char = '_';

pub fn is_token_id(identifier: &str) -> bool {
    identifier.contains(TOKEN_ID_DELIMITER)
}

pub fn token_id(genesis_txid: &TxHash, output_index: u32) -> String {
    format!(
        "{}{TOKEN_ID_DELIMITER}{output_index}",
        Txid::from_byte_array(*genesis_txid)
    )
}
