use futures::future::LocalBoxFuture;
use serde::Serialize;
use serde_json::Value;
use snafu::Snafu;

use crate::bridge::PageContext;
use crate::chat::CardData;

mod http;

pub use http::HttpTransport;

/// Which config endpoint identifies the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFetchTarget {
    /// `GET <base>/widget/init?apiKey=<key>`
    ApiKey(String),
    /// `GET <base>/widget/config/<workspaceId>`
    Workspace(String),
}

/// Body of `POST <base>/chat/message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_context: Option<PageContext>,
}

/// A successful reply, already classified by the wire decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub card: Option<CardData>,
}

impl ChatReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            card: None,
        }
    }

    pub fn card(text: impl Into<String>, card: CardData) -> Self {
        Self {
            text: text.into(),
            card: Some(card),
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("http request failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend returned status {status} on `{stage}`"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode backend response on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("backend rejected the request on `{stage}`: {details}"))]
    Rejected {
        stage: &'static str,
        details: String,
    },
}

/// Network seam for the two backend calls the widget makes.
///
/// Futures are not `Send`: the widget runs on a single cooperative event loop
/// (the browser's, or a current-thread runtime natively).
pub trait Transport {
    fn fetch_config<'a>(
        &'a self,
        target: &'a ConfigFetchTarget,
    ) -> LocalBoxFuture<'a, TransportResult<Value>>;

    fn send_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> LocalBoxFuture<'a, TransportResult<ChatReply>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn chat_request_uses_backend_field_names() {
        let request = ChatRequest {
            message: "Hi".to_string(),
            session_id: "session_1_abc".to_string(),
            workspace_id: Some("ws-1".to_string()),
            page_context: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap_or_default(),
            json!({ "message": "Hi", "sessionId": "session_1_abc", "workspaceId": "ws-1" })
        );
    }

    #[test]
    fn chat_request_carries_page_context_verbatim() {
        let context = PageContext::from_payload(&json!({
            "type": "CONTEXT",
            "title": "Product X",
            "url": "https://shop.example.com/x",
            "sku": 991,
        }))
        .unwrap_or_default();
        let request = ChatRequest {
            message: "Hi".to_string(),
            session_id: "s".to_string(),
            workspace_id: None,
            page_context: Some(context),
        };

        let body = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(body["pageContext"]["title"], "Product X");
        assert_eq!(body["pageContext"]["sku"], 991);
        assert!(body["pageContext"].get("type").is_none());
        assert!(body["workspaceId"].is_null());
    }
}
