use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::Snafu;

/// Free-form description of the host page, forwarded verbatim with the next
/// chat request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageContext(Map<String, Value>);

impl PageContext {
    /// Takes every field of an inbound `CONTEXT` message except the
    /// discriminator. Returns `None` for non-object payloads.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let mut fields = payload.as_object()?.clone();
        fields.remove("type");
        Some(Self(fields))
    }

    pub fn from_page(title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("title".to_string(), Value::String(title.into()));
        fields.insert("url".to_string(), Value::String(url.into()));
        Self(fields)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Messages crossing the frame boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    /// Widget to parent, after every open/close transition.
    #[serde(rename_all = "camelCase")]
    Resize { is_open: bool },
    /// Parent to widget (or widget to parent when the parent script captures
    /// its own page).
    Context(PageContext),
    /// Parent to widget. `None` flips the current state.
    Toggle {
        #[serde(skip_serializing_if = "Option::is_none")]
        open: Option<bool>,
    },
    /// Widget to parent once it listens; the parent answers with `CONTEXT`.
    Ready,
}

impl HostMessage {
    /// Classifies by the `type` discriminator only.
    pub fn from_value(data: &Value) -> Option<Self> {
        match data.get("type").and_then(Value::as_str)? {
            "RESIZE" => Some(Self::Resize {
                is_open: data.get("isOpen").and_then(Value::as_bool).unwrap_or(false),
            }),
            "CONTEXT" => PageContext::from_payload(data).map(Self::Context),
            "TOGGLE" => Some(Self::Toggle {
                open: data.get("open").and_then(Value::as_bool),
            }),
            "READY" => Some(Self::Ready),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "RESIZE",
            Self::Context(_) => "CONTEXT",
            Self::Toggle { .. } => "TOGGLE",
            Self::Ready => "READY",
        }
    }
}

/// Which origins a hosted widget talks to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    #[default]
    AllowAny,
    AllowList(Vec<String>),
}

impl OriginPolicy {
    pub fn from_origins(origins: &[String]) -> Self {
        let origins: Vec<String> = origins
            .iter()
            .map(|origin| normalize_origin(origin).to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        if origins.is_empty() {
            Self::AllowAny
        } else {
            Self::AllowList(origins)
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::AllowAny => true,
            Self::AllowList(allowed) => {
                let origin = normalize_origin(origin);
                allowed
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(origin))
            }
        }
    }

    /// `targetOrigin` argument for outbound `postMessage`.
    pub fn target_origin(&self) -> &str {
        match self {
            Self::AllowList(allowed) => allowed.first().map(String::as_str).unwrap_or("*"),
            Self::AllowAny => "*",
        }
    }
}

fn normalize_origin(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("failed to encode host message on `{stage}`"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to post host message on `{stage}`: {details}"))]
    Post {
        stage: &'static str,
        details: String,
    },
}

/// Outbound half of the frame boundary (`window.parent.postMessage` in the
/// browser).
pub trait HostChannel {
    fn post(&self, message: &HostMessage, target_origin: &str) -> BridgeResult<()>;
}

/// Parent-side iframe size for each widget state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFootprint {
    pub width: u32,
    pub height: u32,
}

impl FrameFootprint {
    pub const OPEN: Self = Self {
        width: 380,
        height: 600,
    };
    pub const CLOSED: Self = Self {
        width: 88,
        height: 88,
    };

    pub fn for_state(is_open: bool) -> Self {
        if is_open { Self::OPEN } else { Self::CLOSED }
    }

    pub fn to_css(&self) -> String {
        format!("width:{}px;height:{}px", self.width, self.height)
    }
}

/// Holds what the parent page sent before the widget existed.
///
/// Only the latest `CONTEXT` and the latest `TOGGLE` matter; older ones are
/// overwritten. Origins are kept verbatim and checked on replay, once the
/// resolved config supplies the origin policy.
#[derive(Debug, Default)]
pub struct HostInbox {
    context: Option<(String, Value)>,
    toggle: Option<(String, Value)>,
}

impl HostInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the message was kept.
    pub fn push(&mut self, origin: &str, data: &Value) -> bool {
        let slot = match HostMessage::from_value(data) {
            Some(HostMessage::Context(_)) => &mut self.context,
            Some(HostMessage::Toggle { .. }) => &mut self.toggle,
            Some(HostMessage::Resize { .. } | HostMessage::Ready) | None => return false,
        };
        *slot = Some((origin.to_string(), data.clone()));
        true
    }

    /// Buffered messages in replay order: context before toggle.
    pub fn drain(&mut self) -> Vec<(String, Value)> {
        [self.context.take(), self.toggle.take()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Widget side of the hosted-mode protocol.
pub struct HostBridge {
    channel: Box<dyn HostChannel>,
    policy: OriginPolicy,
    page_context: Option<PageContext>,
}

impl HostBridge {
    pub fn new(channel: Box<dyn HostChannel>, policy: OriginPolicy) -> Self {
        if policy == OriginPolicy::AllowAny {
            tracing::warn!(
                "host bridge accepts messages from any origin; set allowedOrigins to restrict it"
            );
        }

        Self {
            channel,
            policy,
            page_context: None,
        }
    }

    /// Latest `CONTEXT` payload, attached to the next chat request.
    pub fn page_context(&self) -> Option<&PageContext> {
        self.page_context.as_ref()
    }

    /// Filters and classifies an inbound message. `CONTEXT` is cached here;
    /// every accepted message is returned for the widget to act on.
    pub fn receive(&mut self, origin: &str, data: &Value) -> Option<HostMessage> {
        if !self.policy.allows(origin) {
            tracing::debug!(origin, "dropping host message from disallowed origin");
            return None;
        }

        let Some(message) = HostMessage::from_value(data) else {
            tracing::debug!(origin, "ignoring unrecognized host message");
            return None;
        };

        if let HostMessage::Context(context) = &message {
            self.page_context = Some(context.clone());
        }
        Some(message)
    }

    pub fn notify_resize(&self, is_open: bool) {
        self.post(&HostMessage::Resize { is_open });
    }

    /// Tells the parent page the widget is listening, so it can (re)send
    /// its page context.
    pub fn announce_ready(&self) {
        self.post(&HostMessage::Ready);
    }

    fn post(&self, message: &HostMessage) {
        if let Err(error) = self.channel.post(message, self.policy.target_origin()) {
            tracing::warn!(
                error = %error,
                kind = message.kind(),
                "failed to post message to host page"
            );
        }
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("policy", &self.policy)
            .field("page_context", &self.page_context)
            .finish_non_exhaustive()
    }
}
