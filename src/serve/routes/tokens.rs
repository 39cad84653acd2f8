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
            PageParams, PagedResponse, RankedTokenView, ServeResponse, SupplyView,
            TokenSummaryView,
        },
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tokens_all))
        .route("/{token}", get(tokens_info))
        .route("/{token}/supply", get(tokens_supply))
}

/// All Tokens
///
/// Tokens revealed at or below the processed height, in creation order, with live supply and
/// holder figures.
pub async fn tokens_all(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let tokens = ctx.all_tokens(Pagination::from(&params))?;
    let total = ctx.token_count()?;

    let data = tokens
        .iter()
        .map(|t| TokenSummaryView::new(&ctx, t))
        .collect();

    Ok((StatusCode::OK, Json(PagedResponse::new(data, total, &ctx))))
}

/// Token Info
///
/// Token metadata by token id or token address, null when the token is unknown.
pub async fn tokens_info(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let info = ctx.resolve(&token)?;
    let data = ctx.render(info.as_ref());

    Ok((StatusCode::OK, Json(ServeResponse::new(data, &ctx))))
}

/// Token Supply
///
/// Total minted supply next to the circulating supply of a token, null when the token is unknown.
pub async fn tokens_supply(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let data = match ctx.resolve(&token)? {
        Some(info) => Some(SupplyView {
            total_supply: ctx.minted_amount(&info.token_pubkey)?.to_string(),
            circulating_supply: ctx.circulating_supply(&info.token_pubkey)?.to_string(),
            decimals: info.decimals,
            token_id: info.token_id,
        }),
        None => None,
    };

    Ok((StatusCode::OK, Json(ServeResponse::new(data, &ctx))))
}

/// Token Rankings
///
/// Tokens ordered by number of holders, as of the last statistics refresh.
pub async fn tokens_rankings(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ServeError> {
    let ctx = state.start_query()?;

    let ranked = ctx.ranked_tokens(Pagination::from(&params))?;
    let total = ctx.ranked_token_count()?;

    let data = ranked
        .iter()
        .map(|r| RankedTokenView::new(&ctx, r))
        .collect();

    Ok((StatusCode::OK, Json(PagedResponse::new(data, total, &ctx))))
}
