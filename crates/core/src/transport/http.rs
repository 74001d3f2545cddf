use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use snafu::{ResultExt, ensure};

use super::{
    ChatReply, ChatRequest, ConfigFetchTarget, DecodeSnafu, RequestSnafu, StatusSnafu, Transport,
    TransportResult,
};
use crate::chat::parse_chat_response;
use crate::config::WidgetConfig;

/// `reqwest`-backed transport. On `wasm32` reqwest issues `fetch` calls, so
/// the same client serves the browser binding and the terminal harness.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Builds a client from the locally known settings. The server layer can
    /// never change the base URL or credentials, so this may run before the
    /// remote config is fetched.
    pub fn new(config: &WidgetConfig) -> TransportResult<Self> {
        let builder = reqwest::Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        let builder = match config.request_timeout_ms {
            Some(millis) => builder.timeout(std::time::Duration::from_millis(millis)),
            None => builder,
        };

        let client = builder.build().context(RequestSnafu {
            stage: "build-http-client",
        })?;

        Ok(Self {
            client,
            base_url: config.endpoint_base().to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn config_url(&self, target: &ConfigFetchTarget) -> String {
        match target {
            ConfigFetchTarget::ApiKey(_) => format!("{}/widget/init", self.base_url),
            ConfigFetchTarget::Workspace(workspace_id) => format!(
                "{}/widget/config/{}",
                self.base_url,
                urlencoding::encode(workspace_id)
            ),
        }
    }

    async fn get_config(&self, target: &ConfigFetchTarget) -> TransportResult<Value> {
        let mut request = self.client.get(self.config_url(target));
        if let ConfigFetchTarget::ApiKey(api_key) = target {
            request = request.query(&[("apiKey", api_key.as_str())]);
        }

        let response = request.send().await.context(RequestSnafu {
            stage: "send-config-request",
        })?;
        let status = response.status();
        let body = response.text().await.context(RequestSnafu {
            stage: "read-config-response",
        })?;

        ensure!(
            status.is_success(),
            StatusSnafu {
                stage: "config-http-status",
                status: status.as_u16(),
                body,
            }
        );

        serde_json::from_str(&body).context(DecodeSnafu {
            stage: "decode-config-response",
        })
    }

    async fn post_chat(&self, chat_request: &ChatRequest) -> TransportResult<ChatReply> {
        let mut request = self
            .client
            .post(format!("{}/chat/message", self.base_url))
            .json(chat_request);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.context(RequestSnafu {
            stage: "send-chat-request",
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.context(RequestSnafu {
            stage: "read-chat-response",
        })?;

        tracing::debug!(status, body_len = body.len(), "chat endpoint responded");
        parse_chat_response(status, &body)
    }
}

impl Transport for HttpTransport {
    fn fetch_config<'a>(
        &'a self,
        target: &'a ConfigFetchTarget,
    ) -> LocalBoxFuture<'a, TransportResult<Value>> {
        self.get_config(target).boxed_local()
    }

    fn send_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> LocalBoxFuture<'a, TransportResult<ChatReply>> {
        self.post_chat(request).boxed_local()
    }
}
