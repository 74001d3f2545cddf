#![deny(unsafe_code)]

//! Headless runtime for the embeddable chat widget.
//!
//! Everything here is platform independent: the browser binding and the
//! terminal harness both drive the same [`Widget`] instance record and only
//! supply the platform seams ([`Transport`], [`KeyValueStore`],
//! [`HostChannel`] and the drag listener guard).

/// Cross-document protocol between a hosted widget and its parent page.
pub mod bridge;
/// Chat domain: messages, wire replies and the request/response state machine.
pub mod chat;
/// Layered widget settings.
pub mod config;
pub mod drag;
/// Markup snippets handed to site operators.
pub mod embed;
pub mod session;
pub mod transport;
/// Pure view model and HTML rendering.
pub mod view;
pub mod widget;

pub use bridge::{
    FrameFootprint, HostBridge, HostChannel, HostInbox, HostMessage, OriginPolicy, PageContext,
};
pub use chat::{
    CardData, ExchangeRejection, ExchangeState, FALLBACK_REPLY, Message, MessageExchange,
    MessageId, MessageKind, PendingRequest, RequestTicket, Role,
};
pub use config::{ConfigResolver, Position, WidgetConfig, absolutize_relative_urls};
pub use drag::{DragController, HitRegion, Point, Rect, Size};
pub use session::{KeyValueStore, MemoryStore, SESSION_STORAGE_KEY, Session, SessionManager};
pub use transport::{
    ChatReply, ChatRequest, ConfigFetchTarget, HttpTransport, Transport, TransportError,
    TransportResult,
};
pub use view::{ScrollTracker, WidgetFrame, render, render_html};
pub use widget::{EmbedMode, ToggleSource, Widget, WidgetUiState, deliver};
