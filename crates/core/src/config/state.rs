use serde::{Deserialize, Serialize};

use crate::bridge::OriginPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_BOT_NAME: &str = "Assistant";
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi there! How can I help you today?";
pub const DEFAULT_ACCENT_COLOR: &str = "#4f46e5";
pub const DEFAULT_PLACEHOLDER: &str = "Type your message...";

/// Screen corner the launcher is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    #[default]
    Right,
}

impl Position {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("left") {
            Some(Self::Left)
        } else if raw.eq_ignore_ascii_case("right") {
            Some(Self::Right)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Canonical, renderable widget settings.
///
/// Built once per page load by [`super::ConfigResolver`] and shared as an
/// `Arc`; nothing mutates it after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub base_url: String,
    pub bot_name: String,
    pub welcome_message: String,
    pub accent_color: String,
    pub position: Position,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub placeholder: String,
    /// Origins the host bridge accepts messages from. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            workspace_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            bot_name: DEFAULT_BOT_NAME.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            position: Position::default(),
            logo_url: None,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            allowed_origins: Vec::new(),
            request_timeout_ms: None,
        }
    }
}

impl WidgetConfig {
    /// Identifier sent as `workspaceId`; falls back to the api key for
    /// tenants that only configured a key.
    pub fn tenant_id(&self) -> Option<&str> {
        self.workspace_id.as_deref().or(self.api_key.as_deref())
    }

    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::from_origins(&self.allowed_origins)
    }

    /// Base URL without trailing slashes, ready for path concatenation.
    pub fn endpoint_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
