//! `MsgPack` RPC endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use piscola_core::messages::ERROR_CODE_BAD_REQUEST;
use piscola_core::Message;
use tracing::{error, warn};

use super::{request_id, status_for_code, AppState};
use crate::service::CallerOrigin;

pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

/// Handles `POST /rpc` requests with `MsgPack`-encoded `Message` bodies.
///
/// Every request is answered with exactly one `MsgPack` `Message`: the
/// operation's response on success, or an `ERROR` whose code matches the
/// HTTP status.
pub async fn rpc_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let msg = match Message::from_msgpack(&body) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "undecodable rpc body");
            return msgpack_response(
                StatusCode::BAD_REQUEST,
                &Message::error(ERROR_CODE_BAD_REQUEST, format!("invalid message: {e}")),
            );
        }
    };

    match state
        .dispatch(msg, CallerOrigin::Rpc, request_id(&headers))
        .await
    {
        Ok(resp) => msgpack_response(StatusCode::OK, &resp.into()),
        Err(err) => {
            let msg = err.to_message();
            if let Message::Error { payload } = &msg {
                if !payload.is_client_error() {
                    warn!(code = payload.code, message = %payload.message, "rpc request failed");
                }
            }
            msgpack_response(status_for_code(err.code()), &msg)
        }
    }
}

fn msgpack_response(status: StatusCode, msg: &Message) -> Response {
    match msg.to_msgpack() {
        Ok(bytes) => (status, [(CONTENT_TYPE, MSGPACK_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode rpc response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
