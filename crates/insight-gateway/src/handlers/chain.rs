//! OP_RETURN lookup, UTXO set summary and the phone-number directory.

use super::AppState;
use crate::domain::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

/// `GET /opreturn/:opreturnHash`
pub async fn op_return(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<Value>> {
    let data = state.rpc_call("getopreturn", vec![json!(hash)]).await?;
    Ok(Json(data))
}

/// `GET /outstanding`
pub async fn outstanding(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let info = state.rpc_call("gettxoutsetinfo", vec![]).await?;
    Ok(Json(info))
}

/// `GET /phonenumber/:phoneNumber`
///
/// The directory body is passed through: 200 when its `status` is `"ok"`,
/// 404 otherwise.
pub async fn phone_number(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    match state.phone.lookup(&phone).await {
        Ok(body) if body["status"] == "ok" => Ok((StatusCode::OK, Json(body))),
        Ok(body) => Ok((StatusCode::NOT_FOUND, Json(body))),
        Err(error) => {
            warn!(error = %error, "phone lookup failed");
            Err(ApiError::upstream(StatusCode::NOT_FOUND))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{state, MockNode, StaticPhone};
    use crate::rpc::RpcError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_outstanding_passthrough() {
        let node = Arc::new(MockNode::default());
        node.returns("gettxoutsetinfo", json!({ "height": 170, "total_amount": 8500.0 }));
        let Json(body) = outstanding(State(state(node))).await.unwrap();
        assert_eq!(body["height"], 170);
    }

    #[tokio::test]
    async fn test_op_return_failure_is_upstream() {
        let err = op_return(State(state(Arc::new(MockNode::default()))), Path("ab".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::NOT_FOUND);
        assert_eq!(err.to_body("/opreturn/ab"), json!({ "status": "error" }));
    }

    #[tokio::test]
    async fn test_phone_number_statuses() {
        let mut s = state(Arc::new(MockNode::default()));

        let (status, Json(body)) = phone_number(State(s.clone()), Path("+15550100".into()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        s.phone = Arc::new(StaticPhone(Ok(json!({ "status": "unknown" }))));
        let (status, Json(body)) = phone_number(State(s.clone()), Path("+15550100".into()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "unknown");

        s.phone = Arc::new(StaticPhone(Err(RpcError::Unavailable("down".into()))));
        let err = phone_number(State(s), Path("+15550100".into()))
            .await
            .unwrap_err();
        assert_eq!(err.http_status, StatusCode::NOT_FOUND);
    }
}
