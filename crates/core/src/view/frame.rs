use crate::chat::{CardData, Message, MessageId, MessageKind, Role};
use crate::config::Position;
use crate::drag::Point;
use crate::widget::{EmbedMode, Widget};

/// Gap between the anchored chrome and the viewport edge.
pub const EDGE_OFFSET_PX: u32 = 20;
const Z_INDEX: u32 = 2_147_483_000;

/// Placement of the widget's outermost element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerStyle {
    pub mode: EmbedMode,
    pub anchor: Position,
    /// Top-left set by dragging; overrides the corner anchor.
    pub offset: Option<Point>,
    pub dragging: bool,
}

impl ContainerStyle {
    pub fn to_css(&self) -> String {
        if self.mode == EmbedMode::Hosted {
            return "position:fixed;top:0;left:0;right:0;bottom:0".to_string();
        }

        let placement = match self.offset {
            Some(point) => format!("left:{:.0}px;top:{:.0}px", point.x, point.y),
            None => format!(
                "{}:{EDGE_OFFSET_PX}px;bottom:{EDGE_OFFSET_PX}px",
                self.anchor.as_str()
            ),
        };
        let cursor = if self.dragging {
            ";cursor:grabbing;user-select:none"
        } else {
            ""
        };
        format!("position:fixed;{placement};z-index:{Z_INDEX}{cursor}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherView {
    pub label: String,
    pub unread: usize,
    pub draggable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Card { text: String, card: CardData },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: MessageId,
    pub role: Role,
    pub body: MessageBody,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        let body = match (&message.kind, &message.card) {
            (MessageKind::Card, Some(card)) => MessageBody::Card {
                text: message.content.clone(),
                card: card.clone(),
            },
            _ => MessageBody::Text(message.content.clone()),
        };

        Self {
            id: message.id,
            role: message.role,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputView {
    pub placeholder: String,
    pub draft: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowView {
    pub bot_name: String,
    pub logo_url: Option<String>,
    pub draggable: bool,
    pub messages: Vec<MessageView>,
    pub typing: bool,
    pub input: InputView,
}

/// Everything needed to paint the widget once.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetFrame {
    pub is_open: bool,
    pub accent_color: String,
    pub container: ContainerStyle,
    pub launcher: LauncherView,
    /// Present only while open. Messages keep accumulating while closed and
    /// show up here on reopen.
    pub window: Option<WindowView>,
    /// Changes whenever the message list changes; the platform layer scrolls
    /// the list to its end when it observes a new value.
    pub scroll_revision: u64,
}

/// Pure projection of a widget instance into a frame.
pub fn render<G>(widget: &Widget<G>) -> WidgetFrame {
    let config = widget.config();
    let exchange = widget.exchange();
    let state = widget.ui_state();
    let draggable = widget.mode() == EmbedMode::Inline;

    let window = state.is_open.then(|| WindowView {
        bot_name: config.bot_name.clone(),
        logo_url: config.logo_url.clone(),
        draggable,
        messages: exchange.messages().iter().map(MessageView::from).collect(),
        typing: state.is_typing,
        input: InputView {
            placeholder: config.placeholder.clone(),
            draft: exchange.draft().to_string(),
            enabled: exchange.input_enabled(),
        },
    });

    WidgetFrame {
        is_open: state.is_open,
        accent_color: config.accent_color.clone(),
        container: ContainerStyle {
            mode: widget.mode(),
            anchor: config.position,
            offset: state.position,
            dragging: state.is_dragging,
        },
        launcher: LauncherView {
            label: format!("Open chat with {}", config.bot_name),
            unread: state.unread,
            draggable,
        },
        window,
        scroll_revision: exchange.revision(),
    }
}
