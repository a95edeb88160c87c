//! # Sui JSON-RPC Client
//!
//! Read-only akses ke full node Sui lewat JSON-RPC 2.0.
//!
//! | Method | Dipakai untuk |
//! |--------|---------------|
//! | `sui_getObject` | detail satu campaign |
//! | `sui_multiGetObjects` | daftar campaign |
//! | `suix_queryEvents` | event `CampaignCreated` / `DonationReceived` |
//! | `suix_getBalance` | saldo coin wallet |
//!
//! ## Klasifikasi error
//!
//! - HTTP 429 atau pesan JSON-RPC yang menyebut rate limit → `RateLimited`
//! - connect error, timeout, HTTP 5xx → `Network`
//! - JSON-RPC error lain dan HTTP 4xx → `Rpc`
//! - body tidak sesuai bentuk → `Decode`
//!
//! Client ini tidak melakukan retry; itu tugas pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ChainError;

/// Position in an event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCursor {
    pub tx_digest: String,
    pub event_seq: String,
}

/// One page of `suix_queryEvents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<EventCursor>,
    #[serde(default)]
    pub has_next_page: bool,
}

/// Read operations the service needs from a full node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Object with content, or `None` if it does not exist.
    async fn get_object(&self, id: &str) -> Result<Option<Value>, ChainError>;

    /// Objects that exist among `ids`, in request order.
    async fn multi_get_objects(&self, ids: &[String]) -> Result<Vec<Value>, ChainError>;

    /// Events of one Move event type, oldest first.
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<EventPage<Value>, ChainError>;

    /// Total balance of `coin_type` owned by `owner`.
    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u64, ChainError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcError {
    fn into_chain_error(self) -> ChainError {
        let lower = self.message.to_ascii_lowercase();
        if lower.contains("rate") || lower.contains("too many requests") {
            ChainError::RateLimited { retry_after_ms: None }
        } else {
            ChainError::Rpc { code: self.code, message: self.message }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResult {
    total_balance: Value,
}

/// `sui_getObject` result: `data` or `error` (e.g. `notExists`).
#[derive(Debug, Deserialize)]
struct ObjectResponse {
    data: Option<Value>,
}

/// Full node client.
#[derive(Debug)]
pub struct SuiRpcClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Network(format!("failed to build http client: {}", e)))?;
        Ok(Self { url: url.into(), client, next_id: AtomicU64::new(1) })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, "sending json-rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                ChainError::Network(format!("{}: {}", kind, e))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000));
            warn!(method, ?retry_after_ms, "full node rate limited request");
            return Err(ChainError::RateLimited { retry_after_ms });
        }
        if status.is_server_error() {
            return Err(ChainError::Network(format!("http {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Rpc { code: i64::from(status.as_u16()), message: body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChainError::Network(format!("failed to read body: {}", e)))?;
        let parsed: JsonRpcResponse<T> = serde_json::from_str(&body)?;

        if let Some(error) = parsed.error {
            debug!(method, code = error.code, message = %error.message, "json-rpc error");
            return Err(error.into_chain_error());
        }
        parsed
            .result
            .ok_or_else(|| ChainError::Decode(format!("{}: response has neither result nor error", method)))
    }
}

fn object_options() -> Value {
    json!({ "showContent": true, "showType": true, "showOwner": false })
}

/// Parse a u64 that Sui may send as a JSON string or number.
pub(crate) fn value_to_u64(v: &Value) -> Option<u64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[async_trait]
impl ChainRpc for SuiRpcClient {
    async fn get_object(&self, id: &str) -> Result<Option<Value>, ChainError> {
        let resp: ObjectResponse = self.call("sui_getObject", json!([id, object_options()])).await?;
        Ok(resp.data)
    }

    async fn multi_get_objects(&self, ids: &[String]) -> Result<Vec<Value>, ChainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let resp: Vec<ObjectResponse> = self
            .call("sui_multiGetObjects", json!([ids, object_options()]))
            .await?;
        Ok(resp.into_iter().filter_map(|o| o.data).collect())
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
    ) -> Result<EventPage<Value>, ChainError> {
        let query = json!({ "MoveEventType": event_type });
        self.call("suix_queryEvents", json!([query, cursor, limit, false])).await
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u64, ChainError> {
        let resp: BalanceResult = self.call("suix_getBalance", json!([owner, coin_type])).await?;
        value_to_u64(&resp.total_balance)
            .ok_or_else(|| ChainError::Decode(format!("invalid totalBalance: {}", resp.total_balance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SuiRpcClient {
        SuiRpcClient::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    async fn mount_result(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_balance_parses_string_total() {
        let server = MockServer::start().await;
        mount_result(
            &server,
            "suix_getBalance",
            json!({ "coinType": "0x2::sui::SUI", "coinObjectCount": 2, "totalBalance": "1500000000" }),
        )
        .await;

        let balance = client(&server).get_balance("0xabc", "0x2::sui::SUI").await.unwrap();
        assert_eq!(balance, 1_500_000_000);
    }

    #[tokio::test]
    async fn test_missing_object_is_none() {
        let server = MockServer::start().await;
        mount_result(
            &server,
            "sui_getObject",
            json!({ "error": { "code": "notExists", "object_id": "0x9" } }),
        )
        .await;

        assert_eq!(client(&server).get_object("0x9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_get_skips_missing() {
        let server = MockServer::start().await;
        mount_result(
            &server,
            "sui_multiGetObjects",
            json!([
                { "data": { "objectId": "0x1" } },
                { "error": { "code": "deleted" } },
                { "data": { "objectId": "0x3" } }
            ]),
        )
        .await;

        let ids = vec!["0x1".to_string(), "0x2".to_string(), "0x3".to_string()];
        let objects = client(&server).multi_get_objects(&ids).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1]["objectId"], "0x3");
    }

    #[tokio::test]
    async fn test_query_events_page() {
        let server = MockServer::start().await;
        mount_result(
            &server,
            "suix_queryEvents",
            json!({
                "data": [{ "id": { "txDigest": "D1", "eventSeq": "0" }, "parsedJson": {} }],
                "nextCursor": { "txDigest": "D1", "eventSeq": "0" },
                "hasNextPage": true
            }),
        )
        .await;

        let page = client(&server)
            .query_events("0x1::crowdfunding::DonationReceived", None, 50)
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.has_next_page);
        assert_eq!(
            page.next_cursor,
            Some(EventCursor { tx_digest: "D1".into(), event_seq: "0".into() })
        );
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let err = client(&server).get_object("0x1").await.unwrap_err();
        assert_eq!(err, ChainError::RateLimited { retry_after_ms: Some(3000) });
    }

    #[tokio::test]
    async fn test_http_503_is_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).get_object("0x1").await.unwrap_err();
        assert!(matches!(err, ChainError::Network(_)));
    }

    #[tokio::test]
    async fn test_jsonrpc_rate_message_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": -32000, "message": "Request rate limit exceeded" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_balance("0x1", "0x2::sui::SUI").await.unwrap_err();
        assert_eq!(err, ChainError::RateLimited { retry_after_ms: None });
    }

    #[tokio::test]
    async fn test_jsonrpc_other_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": { "code": -32602, "message": "Invalid params" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_object("not-an-id").await.unwrap_err();
        assert_eq!(err, ChainError::Rpc { code: -32602, message: "Invalid params".into() });
        assert!(!err.is_degradable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).get_object("0x1").await.unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let c = SuiRpcClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = c.get_object("0x1").await.unwrap_err();
        assert!(matches!(err, ChainError::Network(_)));
    }

    #[test]
    fn test_value_to_u64() {
        assert_eq!(value_to_u64(&json!("42")), Some(42));
        assert_eq!(value_to_u64(&json!(42)), Some(42));
        assert_eq!(value_to_u64(&json!(-1)), None);
        assert_eq!(value_to_u64(&json!(null)), None);
    }
}
