use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use chatdock_core::bridge::BridgeResult;
use chatdock_core::{
    CardData, ChatReply, ChatRequest, ConfigFetchTarget, FALLBACK_REPLY, HostChannel, HostInbox,
    HostMessage,
    MemoryStore, MessageKind, Role, Size, ToggleSource, Transport, TransportError,
    TransportResult, Widget, WidgetConfig, deliver,
};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};

#[derive(Default)]
struct ScriptedTransport {
    replies: RefCell<VecDeque<TransportResult<ChatReply>>>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    fn with(replies: Vec<TransportResult<ChatReply>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::default(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn fetch_config<'a>(
        &'a self,
        _target: &'a ConfigFetchTarget,
    ) -> LocalBoxFuture<'a, TransportResult<Value>> {
        async move { Ok(json!({ "success": true, "config": {} })) }.boxed_local()
    }

    fn send_chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> LocalBoxFuture<'a, TransportResult<ChatReply>> {
        self.requests.borrow_mut().push(request.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatReply::text("unscripted")));
        async move { reply }.boxed_local()
    }
}

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
        api_key: Some("key-1".to_string()),
        ..WidgetConfig::default()
    })
}

fn inline_widget() -> RefCell<Widget> {
    RefCell::new(Widget::inline(
        config(),
        Box::new(MemoryStore::new()),
        Size::new(1280.0, 800.0),
    ))
}

fn server_error() -> TransportError {
    TransportError::Status {
        stage: "scenario",
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[tokio::test]
async fn empty_submit_sends_nothing() {
    let widget = inline_widget();
    widget.borrow_mut().set_draft("   ");

    assert!(widget.borrow_mut().submit().is_none());
    assert_eq!(widget.borrow().messages().len(), 1);
    assert!(widget.borrow().exchange().input_enabled());
}

#[tokio::test]
async fn hi_gets_hello() {
    let widget = inline_widget();
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::text("Hello!"))]);

    widget.borrow_mut().set_draft("Hi");
    let pending = widget.borrow_mut().submit().expect("accepted");
    assert!(widget.borrow().ui_state().is_typing);

    assert!(deliver(&widget, &transport, pending).await);

    let widget = widget.borrow();
    let messages = widget.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!((messages[1].role, messages[1].content.as_str()), (Role::User, "Hi"));
    assert_eq!((messages[2].role, messages[2].content.as_str()), (Role::Bot, "Hello!"));
    assert_eq!(messages[2].kind, MessageKind::Text);
    assert!(!widget.ui_state().is_typing);
    assert!(widget.exchange().input_enabled());

    let requests = transport.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Hi");
    assert_eq!(requests[0].session_id, widget.session_id());
    assert_eq!(requests[0].workspace_id.as_deref(), Some("key-1"));
}

#[tokio::test]
async fn structured_reply_becomes_card() {
    let widget = inline_widget();
    let card = CardData {
        title: "Trail Shoe".to_string(),
        price: Some("$89".to_string()),
        ..CardData::default()
    };
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::card("Trail Shoe", card))]);

    widget.borrow_mut().set_draft("show me shoes");
    let pending = widget.borrow_mut().submit().expect("accepted");
    deliver(&widget, &transport, pending).await;

    let widget = widget.borrow();
    let last = widget.messages().last().expect("reply appended");
    assert_eq!(last.kind, MessageKind::Card);
    assert_eq!(last.card.as_ref().map(|card| card.title.as_str()), Some("Trail Shoe"));
}

#[tokio::test]
async fn each_failed_send_appends_one_fallback() {
    let widget = inline_widget();
    let transport = ScriptedTransport::with(vec![Err(server_error()), Err(server_error())]);

    for expected in 1..=2 {
        widget.borrow_mut().set_draft("Hi");
        let pending = widget.borrow_mut().submit().expect("accepted");
        deliver(&widget, &transport, pending).await;

        let widget = widget.borrow();
        let fallbacks = widget
            .messages()
            .iter()
            .filter(|message| message.role == Role::Bot && message.content == FALLBACK_REPLY)
            .count();
        assert_eq!(fallbacks, expected);
        assert!(widget.exchange().input_enabled());
    }
}

#[tokio::test]
async fn send_while_outstanding_is_noop() {
    let widget = inline_widget();
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::text("first"))]);

    widget.borrow_mut().set_draft("one");
    let pending = widget.borrow_mut().submit().expect("accepted");

    widget.borrow_mut().set_draft("two");
    assert!(widget.borrow_mut().submit().is_none());
    assert_eq!(widget.borrow().messages().len(), 2);

    deliver(&widget, &transport, pending).await;
    assert_eq!(transport.requests.borrow().len(), 1);

    let pending = widget.borrow_mut().submit().expect("draft kept and accepted");
    assert_eq!(pending.request.message, "two");
}

#[tokio::test]
async fn hosted_context_is_attached_to_next_request() {
    let channel = RecordingChannel::default();
    let widget: RefCell<Widget> = RefCell::new(Widget::hosted(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(channel.clone()),
    ));
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::text("Product X is in stock"))]);

    widget.borrow_mut().handle_host_message(
        "https://shop.example.com",
        &json!({ "type": "CONTEXT", "title": "Product X", "url": "https://shop.example.com/x" }),
    );
    widget.borrow_mut().set_draft("Is this in stock?");
    let pending = widget.borrow_mut().submit().expect("accepted");
    deliver(&widget, &transport, pending).await;

    let requests = transport.requests.borrow();
    let page_context = requests[0].page_context.as_ref().expect("context attached");
    assert_eq!(page_context.title(), Some("Product X"));
    let body = serde_json::to_value(&requests[0]).expect("serializable");
    assert_eq!(body["pageContext"]["title"], "Product X");
}

#[tokio::test]
async fn context_sent_before_mount_still_reaches_the_first_request() {
    // The parent answers the iframe `load` event while the widget is still
    // resolving its config.
    let mut inbox = HostInbox::new();
    inbox.push(
        "https://shop.example.com",
        &json!({ "type": "CONTEXT", "title": "Product X" }),
    );

    let channel = RecordingChannel::default();
    let widget: RefCell<Widget> = RefCell::new(Widget::hosted(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(channel.clone()),
    ));
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::text("Yes"))]);

    widget.borrow_mut().replay_host_messages(&mut inbox);
    widget.borrow().announce_ready();
    widget.borrow_mut().set_draft("Is this in stock?");
    let pending = widget.borrow_mut().submit().expect("accepted");
    deliver(&widget, &transport, pending).await;

    let requests = transport.requests.borrow();
    let body = serde_json::to_value(&requests[0]).expect("serializable");
    assert_eq!(body["pageContext"]["title"], "Product X");
    assert_eq!(*channel.posted.borrow(), vec![HostMessage::Ready]);
}

#[tokio::test]
async fn each_toggle_posts_exactly_one_resize() {
    let channel = RecordingChannel::default();
    let mut widget: Widget = Widget::hosted(
        config(),
        Box::new(MemoryStore::new()),
        Box::new(channel.clone()),
    );

    widget.toggle(ToggleSource::Launcher);
    widget.toggle(ToggleSource::CloseControl);
    widget.toggle(ToggleSource::CloseControl);

    assert_eq!(
        *channel.posted.borrow(),
        vec![
            HostMessage::Resize { is_open: true },
            HostMessage::Resize { is_open: false },
        ]
    );
}

#[tokio::test]
async fn reply_arriving_while_closed_shows_on_reopen() {
    let widget = inline_widget();
    let transport = ScriptedTransport::with(vec![Ok(ChatReply::text("Hello!"))]);

    widget.borrow_mut().open();
    widget.borrow_mut().set_draft("Hi");
    let pending = widget.borrow_mut().submit().expect("accepted");
    widget.borrow_mut().close();
    deliver(&widget, &transport, pending).await;

    assert!(widget.borrow().render().window.is_none());
    widget.borrow_mut().open();

    let frame = widget.borrow().render();
    let window = frame.window.expect("window rendered");
    assert_eq!(window.messages.len(), 3);
    assert!(!window.typing);
}
