use std::sync::Arc;

use figment::{Figment, providers::Serialized};
use serde_json::{Map, Value};

use super::state::{Position, WidgetConfig};
use crate::transport::{ConfigFetchTarget, Transport};

/// Where a config layer came from; only used for log context and field gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    LocalOverride,
    Server,
}

impl ConfigLayer {
    fn as_str(&self) -> &'static str {
        match self {
            Self::LocalOverride => "local-override",
            Self::Server => "server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Url,
    Color,
    Position,
    Origins,
    Millis,
}

struct FieldSpec {
    key: &'static str,
    aliases: &'static [&'static str],
    kind: FieldKind,
    server_may_set: bool,
}

// Keys are the camelCase names of `WidgetConfig` fields so sanitized layers
// deserialize straight into the struct.
const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "apiKey",
        aliases: &[],
        kind: FieldKind::Text,
        server_may_set: false,
    },
    FieldSpec {
        key: "workspaceId",
        aliases: &["tenantId"],
        kind: FieldKind::Text,
        server_may_set: false,
    },
    FieldSpec {
        key: "baseUrl",
        aliases: &["apiUrl"],
        kind: FieldKind::Url,
        server_may_set: false,
    },
    FieldSpec {
        key: "botName",
        aliases: &[],
        kind: FieldKind::Text,
        server_may_set: true,
    },
    FieldSpec {
        key: "welcomeMessage",
        aliases: &[],
        kind: FieldKind::Text,
        server_may_set: true,
    },
    FieldSpec {
        key: "accentColor",
        aliases: &["widgetColor", "color"],
        kind: FieldKind::Color,
        server_may_set: true,
    },
    FieldSpec {
        key: "position",
        aliases: &[],
        kind: FieldKind::Position,
        server_may_set: true,
    },
    FieldSpec {
        key: "logoUrl",
        aliases: &["logo"],
        kind: FieldKind::Url,
        server_may_set: true,
    },
    FieldSpec {
        key: "placeholder",
        aliases: &[],
        kind: FieldKind::Text,
        server_may_set: true,
    },
    FieldSpec {
        key: "allowedOrigins",
        aliases: &[],
        kind: FieldKind::Origins,
        server_may_set: false,
    },
    FieldSpec {
        key: "requestTimeoutMs",
        aliases: &[],
        kind: FieldKind::Millis,
        server_may_set: false,
    },
];

/// One sanitized config source: only recognized, well-formed fields survive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    fields: Map<String, Value>,
}

impl ConfigPatch {
    pub fn sanitize(raw: &Value, layer: ConfigLayer) -> Self {
        let Some(object) = raw.as_object() else {
            if !raw.is_null() {
                tracing::warn!(
                    layer = layer.as_str(),
                    "widget config layer is not a JSON object; ignoring it"
                );
            }
            return Self::default();
        };

        let mut fields = Map::new();
        for spec in FIELDS {
            let Some((source_key, value)) = std::iter::once(spec.key)
                .chain(spec.aliases.iter().copied())
                .find_map(|key| object.get(key).map(|value| (key, value)))
            else {
                continue;
            };

            if layer == ConfigLayer::Server && !spec.server_may_set {
                tracing::debug!(field = source_key, "server config may not set this field");
                continue;
            }

            match sanitize_value(spec.kind, value) {
                Some(clean) => {
                    fields.insert(spec.key.to_string(), clean);
                }
                None => {
                    tracing::warn!(
                        layer = layer.as_str(),
                        field = source_key,
                        "ignoring malformed widget config field"
                    );
                }
            }
        }

        Self { fields }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// Unwraps `{ success, config }` from the server's config endpoint.
pub fn server_config_payload(body: &Value) -> Option<&Value> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    body.get("config").filter(|config| config.is_object())
}

/// Produces the frozen widget settings from defaults, a local override and
/// the tenant's server configuration, in that priority order.
///
/// Resolution never fails: malformed input and fetch failures degrade to the
/// layers that were already merged.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: WidgetConfig,
    local: ConfigPatch,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::with_defaults(WidgetConfig::default())
    }

    pub fn with_defaults(defaults: WidgetConfig) -> Self {
        Self {
            defaults,
            local: ConfigPatch::default(),
        }
    }

    pub fn with_local_override(mut self, raw: &Value) -> Self {
        self.local = ConfigPatch::sanitize(raw, ConfigLayer::LocalOverride);
        self
    }

    /// Defaults merged with the local override only.
    pub fn local_config(&self) -> WidgetConfig {
        self.layered(&[&self.local])
    }

    /// Self-hosted embeds bake bot name and welcome message into the page,
    /// in which case there is nothing to fetch.
    pub fn is_pre_resolved(&self) -> bool {
        self.local.contains("botName") && self.local.contains("welcomeMessage")
    }

    pub fn fetch_target(&self) -> Option<ConfigFetchTarget> {
        if self.is_pre_resolved() {
            return None;
        }

        let local = self.local_config();
        if let Some(api_key) = local.api_key {
            return Some(ConfigFetchTarget::ApiKey(api_key));
        }
        local.workspace_id.map(ConfigFetchTarget::Workspace)
    }

    /// Merges an already fetched server body over the local layers.
    pub fn merge_server_body(&self, body: &Value) -> WidgetConfig {
        let Some(payload) = server_config_payload(body) else {
            tracing::warn!("server widget config was unsuccessful or missing; using local config");
            return self.local_config();
        };

        let server = ConfigPatch::sanitize(payload, ConfigLayer::Server);
        self.layered(&[&self.local, &server])
    }

    pub async fn resolve(self, transport: Option<&dyn Transport>) -> Arc<WidgetConfig> {
        let (Some(transport), Some(target)) = (transport, self.fetch_target()) else {
            return Arc::new(self.local_config());
        };

        match transport.fetch_config(&target).await {
            Ok(body) => Arc::new(self.merge_server_body(&body)),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "failed to fetch widget config; rendering with local settings"
                );
                Arc::new(self.local_config())
            }
        }
    }

    fn layered(&self, patches: &[&ConfigPatch]) -> WidgetConfig {
        let mut figment = Figment::from(Serialized::defaults(self.defaults.clone()));
        for patch in patches {
            figment = figment.merge(Serialized::defaults(patch.fields.clone()));
        }

        match figment.extract::<WidgetConfig>() {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(error = %error, "failed to layer widget config; using defaults");
                self.defaults.clone()
            }
        }
    }
}

/// Rewrites root-relative `baseUrl`/`apiUrl` values (`/api`) against the page
/// origin so they pass URL validation. Other values are left untouched.
pub fn absolutize_relative_urls(raw: &mut Value, page_origin: &str) {
    let Some(object) = raw.as_object_mut() else {
        return;
    };

    let origin = page_origin.trim_end_matches('/');
    for key in ["baseUrl", "apiUrl"] {
        if let Some(Value::String(url)) = object.get_mut(key)
            && url.starts_with('/')
            && !url.starts_with("//")
        {
            *url = format!("{origin}{url}");
        }
    }
}

fn sanitize_value(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Text => non_empty_str(value).map(|text| Value::String(text.to_string())),
        FieldKind::Url => non_empty_str(value)
            .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
            .map(|url| Value::String(url.trim_end_matches('/').to_string())),
        FieldKind::Color => non_empty_str(value)
            .filter(|color| is_hex_color(color))
            .map(|color| Value::String(color.to_ascii_lowercase())),
        FieldKind::Position => non_empty_str(value)
            .and_then(Position::parse)
            .map(|position| Value::String(position.as_str().to_string())),
        FieldKind::Origins => {
            let raw_origins = match value {
                Value::String(single) => vec![single.as_str()],
                Value::Array(items) => items.iter().map(Value::as_str).collect::<Option<Vec<_>>>()?,
                _ => return None,
            };
            let origins = raw_origins
                .into_iter()
                .map(|origin| origin.trim().trim_end_matches('/'))
                .filter(|origin| !origin.is_empty())
                .map(|origin| Value::String(origin.to_string()))
                .collect();
            Some(Value::Array(origins))
        }
        FieldKind::Millis => value
            .as_u64()
            .filter(|millis| *millis > 0)
            .map(Value::from),
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn is_hex_color(raw: &str) -> bool {
    let Some(digits) = raw.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|digit| digit.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::FutureExt;
    use futures::future::LocalBoxFuture;
    use serde_json::json;

    use super::*;
    use crate::config::state::{DEFAULT_ACCENT_COLOR, DEFAULT_BOT_NAME, DEFAULT_WELCOME_MESSAGE};
    use crate::transport::{ChatReply, ChatRequest, TransportError, TransportResult};

    struct ConfigOnlyTransport {
        response: Result<Value, u16>,
        calls: Cell<usize>,
    }

    impl Transport for ConfigOnlyTransport {
        fn fetch_config<'a>(
            &'a self,
            _target: &'a ConfigFetchTarget,
        ) -> LocalBoxFuture<'a, TransportResult<Value>> {
            self.calls.set(self.calls.get() + 1);
            let result = match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(status) => Err(TransportError::Status {
                    stage: "test-config-fetch",
                    status: *status,
                    body: String::new(),
                }),
            };
            async move { result }.boxed_local()
        }

        fn send_chat<'a>(
            &'a self,
            _request: &'a ChatRequest,
        ) -> LocalBoxFuture<'a, TransportResult<ChatReply>> {
            async move { Ok(ChatReply::text("unused")) }.boxed_local()
        }
    }

    fn assert_renderable(config: &WidgetConfig) {
        assert!(!config.bot_name.trim().is_empty());
        assert!(!config.welcome_message.trim().is_empty());
        assert!(is_hex_color(&config.accent_color));
        assert!(config.base_url.starts_with("http"));
        assert!(!config.placeholder.trim().is_empty());
    }

    #[test]
    fn malformed_inputs_always_resolve_to_renderable_config() {
        let inputs = [
            Value::Null,
            json!(42),
            json!("not an object"),
            json!([1, 2, 3]),
            json!({}),
            json!({ "botName": 7, "welcomeMessage": null, "widgetColor": "red" }),
            json!({ "botName": "   ", "position": "middle", "baseUrl": "ftp://nope" }),
            json!({ "allowedOrigins": [1, "x"], "requestTimeoutMs": -5 }),
            json!({ "unknownKey": true, "color": "#12345z" }),
        ];

        for input in inputs {
            let config = ConfigResolver::new().with_local_override(&input).local_config();
            assert_renderable(&config);
        }
    }

    #[test]
    fn unrecognized_and_malformed_fields_keep_defaults() {
        let config = ConfigResolver::new()
            .with_local_override(&json!({
                "botName": 12,
                "widgetColor": "#zzzzzz",
                "position": "top",
                "somethingElse": "x",
            }))
            .local_config();

        assert_eq!(config.bot_name, DEFAULT_BOT_NAME);
        assert_eq!(config.accent_color, DEFAULT_ACCENT_COLOR);
        assert_eq!(config.position, Position::Right);
    }

    #[test]
    fn local_override_applies_aliases_and_normalizes() {
        let config = ConfigResolver::new()
            .with_local_override(&json!({
                "apiKey": " key-1 ",
                "apiUrl": "https://chat.example.com/api/",
                "color": "#ABC",
                "position": "LEFT",
                "logo": "https://cdn.example.com/logo.png",
                "allowedOrigins": ["https://shop.example.com/", " "],
            }))
            .local_config();

        assert_eq!(config.api_key.as_deref(), Some("key-1"));
        assert_eq!(config.base_url, "https://chat.example.com/api");
        assert_eq!(config.accent_color, "#abc");
        assert_eq!(config.position, Position::Left);
        assert_eq!(
            config.logo_url.as_deref(),
            Some("https://cdn.example.com/logo.png")
        );
        assert_eq!(config.allowed_origins, vec!["https://shop.example.com"]);
    }

    #[test]
    fn server_layer_wins_over_local_but_cannot_touch_restricted_fields() {
        let resolver = ConfigResolver::new().with_local_override(&json!({
            "apiKey": "key-1",
            "baseUrl": "https://chat.example.com",
            "botName": "Local Bot",
        }));

        let config = resolver.merge_server_body(&json!({
            "success": true,
            "config": {
                "botName": "Server Bot",
                "welcomeMessage": "Welcome from the server",
                "widgetColor": "#ff0000",
                "position": "left",
                "baseUrl": "https://evil.example.com",
                "allowedOrigins": ["https://evil.example.com"],
            }
        }));

        assert_eq!(config.bot_name, "Server Bot");
        assert_eq!(config.welcome_message, "Welcome from the server");
        assert_eq!(config.accent_color, "#ff0000");
        assert_eq!(config.position, Position::Left);
        assert_eq!(config.base_url, "https://chat.example.com");
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn unsuccessful_server_body_falls_back_to_local() {
        let resolver =
            ConfigResolver::new().with_local_override(&json!({ "botName": "Local Bot" }));

        let config = resolver.merge_server_body(&json!({
            "success": false,
            "config": { "botName": "Server Bot" }
        }));
        assert_eq!(config.bot_name, "Local Bot");

        let config = resolver.merge_server_body(&json!({ "success": true }));
        assert_eq!(config.bot_name, "Local Bot");
    }

    #[test]
    fn fetch_target_prefers_api_key_and_skips_pre_resolved_configs() {
        let with_key = ConfigResolver::new()
            .with_local_override(&json!({ "apiKey": "key-1", "workspaceId": "ws-1" }));
        assert_eq!(
            with_key.fetch_target(),
            Some(ConfigFetchTarget::ApiKey("key-1".to_string()))
        );

        let with_workspace =
            ConfigResolver::new().with_local_override(&json!({ "tenantId": "ws-1" }));
        assert_eq!(
            with_workspace.fetch_target(),
            Some(ConfigFetchTarget::Workspace("ws-1".to_string()))
        );

        let standalone = ConfigResolver::new().with_local_override(&json!({
            "apiKey": "key-1",
            "botName": "Baked",
            "welcomeMessage": "Baked welcome",
        }));
        assert!(standalone.is_pre_resolved());
        assert_eq!(standalone.fetch_target(), None);

        assert_eq!(ConfigResolver::new().fetch_target(), None);
    }

    #[test]
    fn relative_base_url_is_resolved_against_page_origin() {
        let mut raw = json!({ "baseUrl": "/api", "apiUrl": "//cdn.example.com/api" });
        absolutize_relative_urls(&mut raw, "https://shop.example.com/");

        assert_eq!(raw["baseUrl"], "https://shop.example.com/api");
        assert_eq!(raw["apiUrl"], "//cdn.example.com/api");
        assert_eq!(
            ConfigResolver::new()
                .with_local_override(&raw)
                .local_config()
                .base_url,
            "https://shop.example.com/api"
        );

        let mut not_object = json!("x");
        absolutize_relative_urls(&mut not_object, "https://shop.example.com");
        assert_eq!(not_object, json!("x"));
    }

    #[tokio::test]
    async fn resolve_merges_fetched_config() {
        let transport = ConfigOnlyTransport {
            response: Ok(json!({
                "success": true,
                "config": { "botName": "Shop Helper", "welcomeMessage": "Hello shopper" }
            })),
            calls: Cell::new(0),
        };

        let config = ConfigResolver::new()
            .with_local_override(&json!({ "apiKey": "key-1" }))
            .resolve(Some(&transport))
            .await;

        assert_eq!(transport.calls.get(), 1);
        assert_eq!(config.bot_name, "Shop Helper");
        assert_eq!(config.welcome_message, "Hello shopper");
    }

    #[tokio::test]
    async fn resolve_survives_fetch_failure() {
        let transport = ConfigOnlyTransport {
            response: Err(500),
            calls: Cell::new(0),
        };

        let config = ConfigResolver::new()
            .with_local_override(&json!({ "apiKey": "key-1", "widgetColor": "#00ff00" }))
            .resolve(Some(&transport))
            .await;

        assert_eq!(transport.calls.get(), 1);
        assert_eq!(config.accent_color, "#00ff00");
        assert_eq!(config.welcome_message, DEFAULT_WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn resolve_without_tenant_never_calls_transport() {
        let transport = ConfigOnlyTransport {
            response: Ok(json!({})),
            calls: Cell::new(0),
        };

        let config = ConfigResolver::new().resolve(Some(&transport)).await;

        assert_eq!(transport.calls.get(), 0);
        assert_renderable(&config);
    }
}
