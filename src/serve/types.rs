use bitcoin::{Txid, hashes::Hash};
use serde::{Deserialize, Serialize};

use crate::{
    ledger::{
        types::{Amount, TxHash, TxOut},
        watermark::Watermark,
    },
    query::{
        Pagination, QueryContext, TokenView,
        tokens::{RankedToken, TokenSummary},
    },
};

// -- core types

#[derive(Debug, Clone, Serialize)]
pub struct ServeResponse<T> {
    pub data: T,
    pub indexer_info: IndexerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    /// Number of items across all pages
    pub total: usize,
    pub indexer_info: IndexerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexerInfo {
    /// Highest block fully reflected in the answer, null until the indexer processed a block
    pub processed_height: Option<u64>,
}

impl From<Watermark> for IndexerInfo {
    fn from(watermark: Watermark) -> Self {
        Self {
            processed_height: watermark.height(),
        }
    }
}

impl<T> ServeResponse<T> {
    pub fn new(data: T, ctx: &QueryContext) -> Self {
        Self {
            data,
            indexer_info: ctx.watermark().into(),
        }
    }
}

impl<T> PagedResponse<T> {
    pub fn new(data: Vec<T>, total: usize, ctx: &QueryContext) -> Self {
        Self {
            data,
            total,
            indexer_info: ctx.watermark().into(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UtxoParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Restrict to a single token, given by id or address
    pub token: Option<String>,
}

impl From<&PageParams> for Pagination {
    fn from(params: &PageParams) -> Self {
        Pagination::new(params.offset, params.limit)
    }
}

impl From<&UtxoParams> for Pagination {
    fn from(params: &UtxoParams) -> Self {
        Pagination::new(params.offset, params.limit)
    }
}

// -- endpoint types

#[derive(Serialize, Debug)]
pub struct TokenSummaryView {
    #[serde(flatten)]
    pub token: Option<TokenView>,
    pub supply: String,
    pub holders: u64,
}

impl TokenSummaryView {
    pub fn new(ctx: &QueryContext, summary: &TokenSummary) -> Self {
        Self {
            token: ctx.render(Some(&summary.info)),
            supply: summary.supply.to_string(),
            holders: summary.holders,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RankedTokenView {
    pub token_id: String,
    pub holders: u64,
    pub minted: String,
    pub token: Option<TokenView>,
}

impl RankedTokenView {
    pub fn new(ctx: &QueryContext, ranked: &RankedToken) -> Self {
        Self {
            token_id: ranked.token_id.clone(),
            holders: ranked.holders,
            minted: ranked.minted.to_string(),
            token: ctx.render(ranked.info.as_ref()),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SupplyView {
    pub token_id: String,
    /// Everything ever minted
    pub total_supply: String,
    /// Sum of the currently unspent outputs
    pub circulating_supply: String,
    pub decimals: u8,
}

#[derive(Serialize, Debug)]
pub struct UtxoView {
    pub txid: String,
    pub output_index: u32,
    pub block_height: u64,
    pub satoshis: String,
    pub locking_script: String,
    pub state_hash: String,
    pub token_pubkey: Option<String>,
    pub token_addr: Option<String>,
    pub amount: Option<String>,
}

impl UtxoView {
    pub fn new(ctx: &QueryContext, txo: &TxOut) -> Self {
        Self {
            txid: display_txid(&txo.txid),
            output_index: txo.output_index,
            block_height: txo.block_height,
            satoshis: txo.satoshis.to_string(),
            locking_script: hex::encode(&txo.locking_script),
            state_hash: hex::encode(&txo.state_hash),
            token_pubkey: txo.token.as_ref().map(|t| hex::encode(t.token_pubkey)),
            token_addr: txo
                .token
                .as_ref()
                .and_then(|t| ctx.codec().public_key_to_address(&t.token_pubkey)),
            amount: txo.token_amount().map(|a| a.to_string()),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct BalanceView {
    pub token_id: Option<String>,
    pub token_addr: Option<String>,
    pub amount: String,
    /// Amount with the token decimals applied, when the token is known
    pub display_amount: Option<String>,
}

pub fn display_txid(txid: &TxHash) -> String {
    Txid::from_byte_array(*txid).to_string()
}

/// Places the decimal point `decimals` digits from the right
pub fn decimal(amount: Amount, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (int, frac) = padded.split_at(padded.len() - decimals);

    format!("{int}.{frac}")
}
