use token_tracker_macros::{Decode, Encode};

use crate::{define_core_table, define_ledger_table};

use super::types::{
    Amount, MintEvent, OwnerHash, TokenInfo, TokenStatistics, TxOut, TxoRef, XOnlyKey,
};

/// Unique u8 for each table, used in the key encodings. Do not modify, only add new variants.
#[repr(u8)]
pub enum CoreTables {
    ProcessedHeight = 0,
    TokenCount = 1,
}

#[repr(u8)]
pub enum LedgerTables {
    TokenInfoById = 0,
    TokenIdByPubKey = 1,
    TokenIdBySeq = 2,
    TxOutByRef = 3,
    UtxosByOwner = 4,
    UtxosByOwnerToken = 5,
    UtxosByToken = 6,
    OutputsByOwnerToken = 7,
    MintsByToken = 8,
    TokenStatisticsById = 9,
    TokensByHolders = 10,
}

// --- core

// Highest block height fully reflected in storage, absent until the first block is processed
define_core_table! {
    name: ProcessedHeightKV,
    key_type: (),
    value_type: u64,
    table: CoreTables::ProcessedHeight
}

// Number of tokens ever created, the next creation sequence number
define_core_table! {
    name: TokenCountKV,
    key_type: (),
    value_type: u64,
    table: CoreTables::TokenCount
}

// --- tokens

define_ledger_table! {
    name: TokenInfoByIdKV,
    key_type: String,
    value_type: TokenInfo,
    table: LedgerTables::TokenInfoById
}

define_ledger_table! {
    name: TokenIdByPubKeyKV,
    key_type: XOnlyKey,
    value_type: String,
    table: LedgerTables::TokenIdByPubKey
}

// Tokens in creation order
define_ledger_table! {
    name: TokenIdBySeqKV,
    key_type: u64,
    value_type: TokenSeqEntry,
    table: LedgerTables::TokenIdBySeq
}

// --- outputs

define_ledger_table! {
    name: TxOutByRefKV,
    key_type: TxoRef,
    value_type: TxOut,
    table: LedgerTables::TxOutByRef
}

// Token outputs of an owner, largest amount first. Spent entries stay with their spend height so
// a reader at an older watermark still sees them as unspent.
define_ledger_table! {
    name: UtxosByOwnerKV,
    key_type: OwnerUtxoKey,
    value_type: OutputSpan,
    table: LedgerTables::UtxosByOwner
}

// Outputs of an owner for a single token, largest amount first.
define_ledger_table! {
    name: UtxosByOwnerTokenKV,
    key_type: OwnerTokenUtxoKey,
    value_type: OutputSpan,
    table: LedgerTables::UtxosByOwnerToken
}

// Outputs of a token grouped by owner, for holder counting.
define_ledger_table! {
    name: UtxosByTokenKV,
    key_type: TokenUtxoKey,
    value_type: OutputSpan,
    table: LedgerTables::UtxosByToken
}

// Every output (spent or not) an owner ever received for a token. Value is the produced height.
define_ledger_table! {
    name: OutputsByOwnerTokenKV,
    key_type: OwnerTokenOutputKey,
    value_type: u64,
    table: LedgerTables::OutputsByOwnerToken
}

// --- mints and statistics

define_ledger_table! {
    name: MintsByTokenKV,
    key_type: MintKey,
    value_type: MintEvent,
    table: LedgerTables::MintsByToken
}

define_ledger_table! {
    name: TokenStatisticsByIdKV,
    key_type: String,
    value_type: TokenStatistics,
    table: LedgerTables::TokenStatisticsById
}

// Statistics rows ordered by holders, most first
define_ledger_table! {
    name: TokensByHoldersKV,
    key_type: HoldersRankKey,
    value_type: (),
    table: LedgerTables::TokensByHolders
}

// ---

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct TokenSeqEntry {
    pub token_id: String,
    pub reveal_height: u64,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct OwnerUtxoKey {
    pub owner: OwnerHash,
    pub rank: AmountRank,
    pub txo_ref: TxoRef,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct OwnerTokenUtxoKey {
    pub owner: OwnerHash,
    pub token_pubkey: XOnlyKey,
    pub rank: AmountRank,
    pub txo_ref: TxoRef,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct TokenUtxoKey {
    pub token_pubkey: XOnlyKey,
    pub owner: OwnerHash,
    pub txo_ref: TxoRef,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct OwnerTokenOutputKey {
    pub owner: OwnerHash,
    pub token_pubkey: XOnlyKey,
    pub txo_ref: TxoRef,
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct MintKey {
    pub token_pubkey: XOnlyKey,
    pub txid: [u8; 32],
}

#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct HoldersRankKey {
    pub rank: u64,
    pub token_id: String,
}

/// Heights at which an indexed output was produced and, once known, spent.
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpan {
    pub produced: u64,
    pub spent: Option<u64>,
}

impl OutputSpan {
    pub fn unspent_from(produced: u64) -> Self {
        Self {
            produced,
            spent: None,
        }
    }

    /// Whether the output exists and is not yet consumed as of `height`
    pub fn unspent_at(&self, height: u64) -> bool {
        self.produced <= height && self.spent.is_none_or(|spent| spent > height)
    }
}

/// Amount stored as `u128::MAX - amount`, so ascending key order is descending amount order.
#[derive(Encode, Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmountRank(pub u128);

impl AmountRank {
    pub fn from_amount(amount: Amount) -> Self {
        AmountRank(u128::MAX - amount)
    }

    pub fn amount(self) -> Amount {
        u128::MAX - self.0
    }
}

impl HoldersRankKey {
    pub fn new(stats: &TokenStatistics) -> Self {
        Self {
            rank: u64::MAX - stats.holders,
            token_id: stats.token_id.clone(),
        }
    }

    pub fn holders(&self) -> u64 {
        u64::MAX - self.rank
    }
}

impl OwnerUtxoKey {
    pub fn new(owner: &OwnerHash, amount: Amount, txo_ref: TxoRef) -> Self {
        Self {
            owner: owner.clone(),
            rank: AmountRank::from_amount(amount),
            txo_ref,
        }
    }
}

impl OwnerTokenUtxoKey {
    pub fn new(owner: &OwnerHash, token_pubkey: XOnlyKey, amount: Amount, txo_ref: TxoRef) -> Self {
        Self {
            owner: owner.clone(),
            token_pubkey,
            rank: AmountRank::from_amount(amount),
            txo_ref,
        }
    }
}
