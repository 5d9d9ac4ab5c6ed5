//! Axum adapter for gateway notifications.
//!
//! The gateway POSTs a JSON field set to the merchant's notification URL whenever a payment
//! changes state, and keeps redelivering until it gets `200` with the body `OK`.
//!
//! ```text
//! POST {endpoint}
//!   ├─ peer address (ConnectInfo) + JSON body
//!   ├─ GatewayClient::verify_request()
//!   │    └─ rejected → 403, reason logged
//!   └─ accepted → body sent on the channel
//!        ├─ sent        → 200 "OK"
//!        └─ channel gone → 500 (gateway retries)
//! ```
//!
//! The server must be started with `into_make_service_with_connect_info::<SocketAddr>()` so
//! the peer address is available.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use tokio::sync::mpsc;

use crate::client::GatewayClient;
use crate::notification::NotificationRequest;
use crate::params::ParameterSet;

/// Acknowledgement body the gateway expects.
pub const ACK_BODY: &str = "OK";

/// State for the notification handler
#[derive(Clone)]
pub struct WebhookState {
    /// Client holding the terminal credential
    pub client: GatewayClient,
    /// Channel receiving verified notification bodies
    pub sender: mpsc::Sender<ParameterSet>,
}

async fn handle_notification(
    State(state): State<WebhookState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<ParameterSet>,
) -> Response {
    let request = NotificationRequest {
        source_ip: peer.ip().to_string(),
        body,
    };

    let verdict = state.client.verify_request(&request);
    if !verdict.accepted {
        tracing::warn!(
            source_ip = %request.source_ip,
            reason = verdict.reason.as_deref().unwrap_or_default(),
            "Rejected gateway notification"
        );
        return (StatusCode::FORBIDDEN, "Notification rejected").into_response();
    }

    let order_id = request.body.get("OrderId").map(ToString::to_string).unwrap_or_default();
    let status = request.body.get("Status").map(ToString::to_string).unwrap_or_default();
    tracing::debug!(order_id = %order_id, status = %status, "Received gateway notification");

    if let Err(e) = state.sender.send(request.body).await {
        tracing::error!("Failed to forward gateway notification: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (StatusCode::OK, ACK_BODY).into_response()
}

/// Create a router serving gateway notifications at `endpoint`.
///
/// Verified notification bodies are forwarded to `sender`.
pub fn router(endpoint: &str, client: GatewayClient, sender: mpsc::Sender<ParameterSet>) -> Router {
    let state = WebhookState { client, sender };

    Router::new().route(endpoint, post(handle_notification)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamValue, TOKEN, parameter_set};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    const ENDPOINT: &str = "/payments/notification";

    fn client() -> GatewayClient {
        GatewayClient::new("TestTerminal", "secret")
    }

    fn signed_body() -> ParameterSet {
        client().sign_params(&parameter_set([
            ("OrderId", ParamValue::from("21090")),
            ("Amount", ParamValue::from(100000)),
            ("Status", ParamValue::from("CONFIRMED")),
            ("Success", ParamValue::from(true)),
            ("PaymentId", ParamValue::from(13660)),
        ]))
    }

    fn notification(peer: &str, body: &ParameterSet) -> Request<Body> {
        let peer: SocketAddr = peer.parse().unwrap();
        let mut request = Request::builder()
            .method("POST")
            .uri(ENDPOINT)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_accepts_and_forwards_notification() {
        let (tx, mut rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let response = app.oneshot(notification("91.194.226.20:443", &signed_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");

        let forwarded = rx.recv().await.expect("notification should be forwarded");
        assert_eq!(forwarded.get("Status"), Some(&ParamValue::from("CONFIRMED")));
        assert_eq!(forwarded.get("Success"), Some(&ParamValue::Bool(true)));
    }

    #[test_log::test(tokio::test)]
    async fn test_accepts_ipv4_mapped_peer() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let response = app.oneshot(notification("[::ffff:91.194.226.20]:443", &signed_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test_log::test(tokio::test)]
    async fn test_rejects_foreign_peer() {
        let (tx, mut rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let response = app.oneshot(notification("203.0.113.5:443", &signed_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(rx.try_recv().is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_rejects_tampered_body() {
        let (tx, mut rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let mut body = signed_body();
        body.insert("Amount".to_string(), ParamValue::from(1));
        let response = app.oneshot(notification("91.194.226.20:443", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(rx.try_recv().is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_rejects_unsigned_body() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let mut body = signed_body();
        body.remove(TOKEN);
        let response = app.oneshot(notification("91.194.226.20:443", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_closed_channel_asks_for_redelivery() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let app = router(ENDPOINT, client(), tx);

        let response = app.oneshot(notification("91.194.226.20:443", &signed_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_json_is_client_error() {
        let (tx, _rx) = mpsc::channel(1);
        let app = router(ENDPOINT, client(), tx);

        let mut request = Request::builder()
            .method("POST")
            .uri(ENDPOINT)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        request.extensions_mut().insert(ConnectInfo("91.194.226.20:443".parse::<SocketAddr>().unwrap()));

        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }
}
