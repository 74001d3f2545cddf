//! The widget instance record.
//!
//! One [`Widget`] is built per embedding and owns everything that embedding
//! needs: the frozen config, the visitor session, the conversation, the drag
//! controller and (hosted mode) the host bridge. Platform layers only feed it
//! events and paint [`Widget::render`].

use std::cell::RefCell;
use std::sync::Arc;

use serde_json::Value;

use crate::bridge::{HostBridge, HostChannel, HostInbox, HostMessage};
use crate::chat::{
    ExchangeRejection, Message, MessageExchange, PendingRequest, RequestContext, RequestTicket,
    Role,
};
use crate::config::WidgetConfig;
use crate::drag::{DragController, HitRegion, Point, Rect, Size};
use crate::session::{KeyValueStore, SessionManager};
use crate::transport::{ChatReply, Transport, TransportResult};
use crate::view::{WidgetFrame, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    /// Rendered straight into the host document.
    Inline,
    /// Rendered inside a frame; sizing is delegated to the parent page.
    Hosted,
}

/// What asked for an open/close transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSource {
    Launcher,
    CloseControl,
    Host,
}

/// Transient view state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetUiState {
    pub is_open: bool,
    pub is_typing: bool,
    pub is_dragging: bool,
    pub position: Option<Point>,
    pub unread: usize,
}

/// Launcher and window sizes the stylesheet produces, used until the
/// platform reports measured ones.
const LAUNCHER_CHROME: Size = Size::new(60.0, 60.0);
const WINDOW_CHROME: Size = Size::new(360.0, 560.0);

pub struct Widget<G = ()> {
    config: Arc<WidgetConfig>,
    mode: EmbedMode,
    session: SessionManager<Box<dyn KeyValueStore>>,
    exchange: MessageExchange,
    drag: DragController<G>,
    bridge: Option<HostBridge>,
    is_open: bool,
    unread: usize,
    launcher_chrome: Size,
    window_chrome: Size,
}

impl<G> Widget<G> {
    pub fn inline(config: Arc<WidgetConfig>, store: Box<dyn KeyValueStore>, viewport: Size) -> Self {
        Self::mount(config, EmbedMode::Inline, store, viewport, None)
    }

    pub fn hosted(
        config: Arc<WidgetConfig>,
        store: Box<dyn KeyValueStore>,
        channel: Box<dyn HostChannel>,
    ) -> Self {
        let bridge = HostBridge::new(channel, config.origin_policy());
        Self::mount(
            config,
            EmbedMode::Hosted,
            store,
            Size::default(),
            Some(bridge),
        )
    }

    fn mount(
        config: Arc<WidgetConfig>,
        mode: EmbedMode,
        store: Box<dyn KeyValueStore>,
        viewport: Size,
        bridge: Option<HostBridge>,
    ) -> Self {
        let session = SessionManager::new(store, config.tenant_id().map(str::to_string));
        let mut exchange = MessageExchange::new();
        exchange.append_bot_text(config.welcome_message.clone());

        let mut drag = DragController::new(viewport);
        drag.element_resized(LAUNCHER_CHROME);

        tracing::info!(
            mode = ?mode,
            bot_name = %config.bot_name,
            tenant = config.tenant_id().unwrap_or("<none>"),
            "chat widget mounted"
        );

        Self {
            config,
            mode,
            session,
            exchange,
            drag,
            bridge,
            is_open: false,
            unread: 0,
            launcher_chrome: LAUNCHER_CHROME,
            window_chrome: WINDOW_CHROME,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn mode(&self) -> EmbedMode {
        self.mode
    }

    pub fn exchange(&self) -> &MessageExchange {
        &self.exchange
    }

    pub fn messages(&self) -> &[Message] {
        self.exchange.messages()
    }

    pub fn bridge(&self) -> Option<&HostBridge> {
        self.bridge.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Resolves the visitor session on first use.
    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn ui_state(&self) -> WidgetUiState {
        WidgetUiState {
            is_open: self.is_open,
            is_typing: self.exchange.is_typing(),
            is_dragging: self.drag.is_dragging(),
            position: self.drag.position(),
            unread: self.unread,
        }
    }

    pub fn render(&self) -> WidgetFrame {
        render(self)
    }

    /// Flips open/closed. A launcher click that ends a drag is swallowed.
    pub fn toggle(&mut self, source: ToggleSource) -> bool {
        match source {
            ToggleSource::Launcher => {
                if self.drag.take_click_suppression() {
                    tracing::debug!("launcher click suppressed after drag");
                    return false;
                }
                self.set_open(!self.is_open)
            }
            ToggleSource::CloseControl => self.set_open(false),
            ToggleSource::Host => self.set_open(!self.is_open),
        }
    }

    pub fn open(&mut self) -> bool {
        self.set_open(true)
    }

    pub fn close(&mut self) -> bool {
        self.set_open(false)
    }

    /// Applies a transition; no-op (and no `RESIZE`) when already there.
    pub fn set_open(&mut self, open: bool) -> bool {
        if self.is_open == open {
            return false;
        }

        self.is_open = open;
        if open {
            self.unread = 0;
        }
        self.drag.element_resized(self.chrome_size(open));
        if let Some(bridge) = &self.bridge {
            bridge.notify_resize(open);
        }
        true
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.exchange.set_draft(draft);
    }

    /// Submits the draft. Returns the request to send, or `None` when the
    /// submit was a no-op (empty input or a request already in flight).
    pub fn submit(&mut self) -> Option<PendingRequest> {
        let context = RequestContext {
            session_id: self.session.session_id().to_string(),
            workspace_id: self.config.tenant_id().map(str::to_string),
            page_context: self
                .bridge
                .as_ref()
                .and_then(HostBridge::page_context)
                .cloned(),
        };

        match self.exchange.submit_draft(context) {
            Ok(pending) => Some(pending),
            Err(rejection) => {
                tracing::debug!(?rejection, "submit ignored");
                None
            }
        }
    }

    /// Applies a transport outcome. Replies that land while the window is
    /// closed bump the unread badge.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: TransportResult<ChatReply>,
    ) -> Result<(), ExchangeRejection> {
        let role = self.exchange.complete(ticket, outcome)?.role;
        if role == Role::Bot && !self.is_open {
            self.unread += 1;
        }
        Ok(())
    }

    /// Handles a `message` event from another window. Returns whether the
    /// visible state changed.
    pub fn handle_host_message(&mut self, origin: &str, data: &Value) -> bool {
        let Some(bridge) = self.bridge.as_mut() else {
            return false;
        };

        match bridge.receive(origin, data) {
            Some(HostMessage::Toggle { open: Some(open) }) => self.set_open(open),
            Some(HostMessage::Toggle { open: None }) => self.toggle(ToggleSource::Host),
            Some(HostMessage::Context(_) | HostMessage::Resize { .. } | HostMessage::Ready)
            | None => false,
        }
    }

    /// Applies messages the parent sent before this widget existed, checking
    /// them against the now-known origin policy.
    pub fn replay_host_messages(&mut self, inbox: &mut HostInbox) -> bool {
        let mut changed = false;
        for (origin, data) in inbox.drain() {
            changed |= self.handle_host_message(&origin, &data);
        }
        changed
    }

    /// Hosted mode: tells the parent page the widget is listening.
    pub fn announce_ready(&self) {
        if let Some(bridge) = &self.bridge {
            bridge.announce_ready();
        }
    }

    /// Drag only exists in inline mode; hosted frames are placed by the host.
    pub fn pointer_down(
        &mut self,
        region: HitRegion,
        pointer: Point,
        element: Rect,
        acquire_listeners: impl FnOnce() -> G,
    ) -> bool {
        if self.mode != EmbedMode::Inline {
            return false;
        }
        self.drag
            .pointer_down(region, pointer, element, acquire_listeners)
    }

    pub fn pointer_move(&mut self, pointer: Point) -> Option<Point> {
        self.drag.pointer_move(pointer)
    }

    pub fn pointer_up(&mut self) -> bool {
        self.drag.pointer_up()
    }

    pub fn pointer_cancel(&mut self) -> bool {
        self.drag.cancel()
    }

    pub fn viewport_resized(&mut self, viewport: Size) {
        self.drag.viewport_resized(viewport);
    }

    /// Records the rendered size of the current chrome (launcher or window)
    /// and reclamps against it. Later transitions into the same state reuse
    /// the measurement. Empty or non-finite sizes are ignored.
    pub fn chrome_measured(&mut self, size: Size) {
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width <= 0.0
            || size.height <= 0.0
        {
            return;
        }

        if self.is_open {
            self.window_chrome = size;
        } else {
            self.launcher_chrome = size;
        }
        self.drag.element_resized(size);
    }

    fn chrome_size(&self, open: bool) -> Size {
        if open {
            self.window_chrome
        } else {
            self.launcher_chrome
        }
    }
}

impl<G> std::fmt::Debug for Widget<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("mode", &self.mode)
            .field("is_open", &self.is_open)
            .field("unread", &self.unread)
            .field("exchange_state", &self.exchange.state())
            .finish_non_exhaustive()
    }
}

/// Sends a pending request and applies its outcome.
///
/// The widget is only borrowed after the transport future resolves, so other
/// events can run against it while the request is in flight.
pub async fn deliver<G>(
    widget: &RefCell<Widget<G>>,
    transport: &dyn Transport,
    pending: PendingRequest,
) -> bool {
    let outcome = transport.send_chat(&pending.request).await;
    match widget.borrow_mut().complete(pending.ticket, outcome) {
        Ok(()) => true,
        Err(rejection) => {
            tracing::warn!(?rejection, "dropping chat reply for a request that is no longer active");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::bridge::{BridgeResult, PageContext};
    use crate::session::MemoryStore;

    #[derive(Default, Clone)]
    struct RecordingChannel {
        posted: Rc<RefCell<Vec<HostMessage>>>,
    }

    impl HostChannel for RecordingChannel {
        fn post(&self, message: &HostMessage, _target_origin: &str) -> BridgeResult<()> {
            self.posted.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    fn config() -> Arc<WidgetConfig> {
        Arc::new(WidgetConfig {
            workspace_id: Some("ws-1".to_string()),
            welcome_message: "Welcome!".to_string(),
            ..WidgetConfig::default()
        })
    }

    fn inline_widget() -> Widget {
        Widget::inline(
            config(),
            Box::new(MemoryStore::new()),
            Size::new(1280.0, 800.0),
        )
    }

    #[test]
    fn mount_appends_welcome_once_and_starts_closed() {
        let widget = inline_widget();
        assert!(!widget.is_open());
        assert_eq!(widget.messages().len(), 1);
        assert_eq!(widget.messages()[0].content, "Welcome!");
        assert_eq!(widget.messages()[0].role, Role::Bot);
    }

    #[test]
    fn toggle_sources_move_between_exactly_two_states() {
        let mut widget = inline_widget();

        assert!(widget.toggle(ToggleSource::Launcher));
        assert!(widget.is_open());
        assert!(!widget.open());
        assert!(widget.toggle(ToggleSource::CloseControl));
        assert!(!widget.is_open());
        assert!(!widget.toggle(ToggleSource::CloseControl));
    }

    #[test]
    fn drag_on_launcher_suppresses_the_following_click() {
        let mut widget = inline_widget();
        let launcher = Rect::new(Point::new(1172.0, 692.0), Size::new(88.0, 88.0));

        assert!(widget.pointer_down(HitRegion::DragHandle, Point::new(1200.0, 720.0), launcher, || ()));
        widget.pointer_move(Point::new(900.0, 500.0));
        assert!(widget.pointer_up());

        assert!(!widget.toggle(ToggleSource::Launcher));
        assert!(!widget.is_open());
        assert!(widget.toggle(ToggleSource::Launcher));
        assert!(widget.is_open());
    }

    #[test]
    fn reply_while_closed_counts_as_unread_until_reopened() {
        let mut widget = inline_widget();
        widget.open();
        widget.set_draft("Hi");
        let pending = widget.submit().expect("accepted");
        widget.close();

        widget
            .complete(pending.ticket, Ok(ChatReply::text("Hello!")))
            .expect("applied");
        assert_eq!(widget.ui_state().unread, 1);
        assert_eq!(widget.render().launcher.unread, 1);

        widget.open();
        assert_eq!(widget.ui_state().unread, 0);
        let frame = widget.render();
        let window = frame.window.expect("open window");
        assert_eq!(window.messages.len(), 3);
    }

    #[test]
    fn submit_carries_session_and_tenant() {
        let mut widget = inline_widget();
        widget.set_draft("Hi");
        let pending = widget.submit().expect("accepted");

        assert_eq!(pending.request.session_id, widget.session_id());
        assert_eq!(pending.request.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(pending.request.page_context, None);
        assert!(widget.ui_state().is_typing);

        widget.set_draft("again");
        assert!(widget.submit().is_none());
    }

    #[test]
    fn hosted_widget_never_drags_and_follows_host_toggles() {
        let channel = RecordingChannel::default();
        let mut widget: Widget = Widget::hosted(
            config(),
            Box::new(MemoryStore::new()),
            Box::new(channel.clone()),
        );

        assert!(!widget.pointer_down(
            HitRegion::Header,
            Point::new(10.0, 10.0),
            Rect::default(),
            || ()
        ));

        assert!(widget.handle_host_message("https://shop.example.com", &json!({ "type": "TOGGLE" })));
        assert!(widget.is_open());
        assert!(!widget.handle_host_message(
            "https://shop.example.com",
            &json!({ "type": "TOGGLE", "open": true })
        ));
        assert!(widget.handle_host_message(
            "https://shop.example.com",
            &json!({ "type": "TOGGLE", "open": false })
        ));

        assert_eq!(
            *channel.posted.borrow(),
            vec![
                HostMessage::Resize { is_open: true },
                HostMessage::Resize { is_open: false },
            ]
        );
    }

    #[test]
    fn messages_buffered_before_mount_are_replayed_then_ready_is_announced() {
        let mut inbox = HostInbox::new();
        let origin = "https://shop.example.com";
        assert!(inbox.push(origin, &json!({ "type": "CONTEXT", "title": "Home" })));
        assert!(inbox.push(origin, &json!({ "type": "CONTEXT", "title": "Product X" })));
        assert!(inbox.push(origin, &json!({ "type": "TOGGLE", "open": true })));

        let channel = RecordingChannel::default();
        let mut widget: Widget = Widget::hosted(
            config(),
            Box::new(MemoryStore::new()),
            Box::new(channel.clone()),
        );
        assert!(widget.replay_host_messages(&mut inbox));
        assert!(widget.is_open());
        widget.announce_ready();

        widget.set_draft("Is this in stock?");
        let pending = widget.submit().expect("accepted");
        assert_eq!(
            pending.request.page_context.as_ref().and_then(PageContext::title),
            Some("Product X")
        );
        assert_eq!(
            *channel.posted.borrow(),
            vec![HostMessage::Resize { is_open: true }, HostMessage::Ready]
        );
    }

    #[test]
    fn inline_widget_never_announces_ready() {
        let mut widget = inline_widget();
        widget.announce_ready();
        assert!(!widget.replay_host_messages(&mut HostInbox::new()));
    }

    #[test]
    fn measured_chrome_size_bounds_the_dragged_window() {
        let mut widget = inline_widget();
        widget.open();
        widget.chrome_measured(Size::new(340.0, 520.0));
        widget.chrome_measured(Size::new(0.0, f64::NAN));

        let window = Rect::new(Point::new(900.0, 220.0), Size::new(340.0, 520.0));
        assert!(widget.pointer_down(HitRegion::Header, Point::new(1000.0, 230.0), window, || ()));
        assert_eq!(
            widget.pointer_move(Point::new(2000.0, 2000.0)),
            Some(Point::new(940.0, 280.0))
        );
        widget.pointer_up();

        // Closing and reopening reuses the measured window size, so the
        // flush bottom-right position survives.
        widget.close();
        widget.open();
        assert_eq!(widget.ui_state().position, Some(Point::new(940.0, 280.0)));
    }
}
