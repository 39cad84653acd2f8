use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use bitcoin::{Txid, hashes::Hash};

use crate::serve::{AppState, error::ServeError, types::ServeResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/{txid}/state_hashes", get(transactions_state_hashes))
}

/// State Hashes by Transaction
///
/// Fixed width vector of hex encoded state hashes: the transaction level root followed by one
/// entry per contract output, padded with empty strings.
pub async fn transactions_state_hashes(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<impl IntoResponse, ServeError> {
    let txid = Txid::from_str(&txid)
        .map_err(|_| ServeError::malformed_request("invalid txid"))?
        .to_byte_array();

    let ctx = state.start_query()?;

    let data = ctx.state_hash_vector(&txid)?;

    Ok((StatusCode::OK, Json(ServeResponse::new(data, &ctx))))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::IntoResponse;

    use super::*;
    use crate::{
        ledger::tables::TxOutByRefKV,
        query::state_hash::STATE_HASH_VECTOR_LEN,
        serve::types::display_txid,
        testing::{TestLedger, body_json, hash},
    };

    #[tokio::test]
    async fn state_hashes_are_padded() {
        let ledger = TestLedger::new();
        let info = ledger.token_info(1, 1);
        ledger.write(|task| TxOutByRefKV::insert(task, ledger.token_output(9, 0, 1, &info, 1, 1)));

        let state = Arc::new(ledger.tracker());

        let resp = transactions_state_hashes(State(state), Path(display_txid(&hash(9))))
            .await
            .unwrap();
        let json = body_json(resp).await;

        let hashes = json["data"].as_array().unwrap();
        assert_eq!(hashes.len(), STATE_HASH_VECTOR_LEN);
        assert_eq!(hashes[0], "0900");
        assert_eq!(hashes[1], "");
        assert!(json["indexer_info"]["processed_height"].is_null());
    }

    #[tokio::test]
    async fn malformed_txid_is_a_bad_request() {
        let ledger = TestLedger::new();
        let state = Arc::new(ledger.tracker());

        let err = transactions_state_hashes(State(state), Path("xyz".to_string()))
            .await
            .err()
            .unwrap();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
