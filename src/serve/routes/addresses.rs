use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::{
    query::Pagination,
    serve::{
        AppState,
        error::ServeError,
        types::{
            BalanceView, PageParams, PagedResponse, ServeResponse, UtxoParams, UtxoView, decimal,
            display_txid,
        },
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{address}/utxos", get(addresses_utxos))
        .route("/{address}/balances", get(addresses_balances))
        .route("/{address}/balances/{token}", get(addresses_token_balance))
        .route("/{address}/history/{token}", get(addresses_token_history))
}

/// UTxOs by Address
///
/// Unspent token outputs owned by the address, largest amount first. Optionally restricted to
/// one token with the `token` query parameter.
pub async fn addresses_utxos(
    State(state): State<AppState>,
    Query(params): Query<UtxoParams>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;
    let token = params.token.as_deref();

    let utxos = ctx.utxos_by_owner_address(&address, token, Pagination::from(&params))?;
    let total = ctx.utxo_count_by_owner_address(&address, token)?;

    let data = utxos.iter().map(|u| UtxoView::new(&ctx, u)).collect();

    Ok((StatusCode::OK, Json(PagedResponse::new(data, total, &ctx))))
}

/// Balances by Address
///
/// Balance of every token held by the address.
pub async fn addresses_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let mut data = vec![];

    for (token_pubkey, amount) in ctx.balances_by_owner_address(&address)? {
        let info = ctx.token_info_by_key(&token_pubkey)?;

        data.push(BalanceView {
            token_id: info.as_ref().map(|i| i.token_id.clone()),
            token_addr: ctx.codec().public_key_to_address(&token_pubkey),
            amount: amount.to_string(),
            display_amount: info.as_ref().map(|i| decimal(amount, i.decimals)),
        });
    }

    Ok((StatusCode::OK, Json(ServeResponse::new(data, &ctx))))
}

/// Token Balance by Address
///
/// Balance of a single token held by the address, "0" when the address holds none of it or
/// when either input does not resolve.
pub async fn addresses_token_balance(
    State(state): State<AppState>,
    Path((address, token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let data = ctx.balance_by_owner_address(&address, &token)?.to_string();

    Ok((StatusCode::OK, Json(ServeResponse::new(data, &ctx))))
}

/// Token History by Address
///
/// Transactions in which the address received or spent the token, newest first.
pub async fn addresses_token_history(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Path((address, token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let txids = ctx.history_by_owner_address(&address, &token, Pagination::from(&params))?;
    let total = ctx.history_count_by_owner_address(&address, &token)?;

    let data = txids.iter().map(display_txid).collect();

    Ok((StatusCode::OK, Json(PagedResponse::new(data, total, &ctx))))
}
