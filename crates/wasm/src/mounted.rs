use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use chatdock_core::chat::{ComposerAction, composer_action};
use chatdock_core::view::WIDGET_CSS;
use chatdock_core::{
    EmbedMode, HitRegion, HostInbox, HttpTransport, Point, Rect, ScrollTracker, Size, ToggleSource,
    Widget, WidgetConfig, deliver, render_html,
};
use serde_json::Value;
use snafu::OptionExt;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, HtmlTextAreaElement, KeyboardEvent,
    MouseEvent, Node, PointerEvent, Window,
};

use crate::drag_listeners::DragListeners;
use crate::error::{
    JsResultExt, MountError, MountResult, NoDocumentSnafu, js_error_message,
};
use crate::platform::{LocalStorageStore, ParentChannel, viewport};

const STYLESHEET_ID: &str = "chatdock-styles";
const INPUT_SELECTOR: &str = "[data-role=\"input\"]";
const MESSAGES_SELECTOR: &str = "[data-role=\"messages\"]";

type Listener = Closure<dyn FnMut(Event)>;

/// A widget attached to the current document, plus the DOM it owns.
pub struct Mounted {
    window: Window,
    document: Document,
    root: HtmlElement,
    mode: EmbedMode,
    listeners: RefCell<Vec<(EventTarget, &'static str, bool, Listener)>>,
    widget: RefCell<Widget<DragListeners>>,
    transport: HttpTransport,
    scroll: RefCell<ScrollTracker>,
    was_open: Cell<bool>,
    this: Weak<Mounted>,
}

impl Mounted {
    pub fn create(
        window: Window,
        mode: EmbedMode,
        config: Arc<WidgetConfig>,
        transport: HttpTransport,
        root_id: &str,
    ) -> MountResult<Rc<Self>> {
        let document = window.document().context(NoDocumentSnafu {
            stage: "resolve-document",
        })?;
        let body = document.body().context(NoDocumentSnafu {
            stage: "resolve-body",
        })?;

        ensure_stylesheet(&document)?;

        let root = document
            .create_element("div")
            .dom("create-root-element")?
            .dyn_into::<HtmlElement>()
            .map_err(|_| MountError::Dom {
                stage: "cast-root-element",
                details: "created element is not an HtmlElement".to_string(),
            })?;
        root.set_id(root_id);
        body.append_child(&root).dom("append-root-element")?;

        let store = Box::new(LocalStorageStore::new(window.clone()));
        let widget = match mode {
            EmbedMode::Inline => Widget::inline(config, store, viewport(&window)),
            EmbedMode::Hosted => Widget::hosted(
                config,
                store,
                Box::new(ParentChannel::new(window.clone())),
            ),
        };

        let mounted = Rc::new_cyclic(|this| Self {
            window,
            document,
            root,
            mode,
            listeners: RefCell::new(Vec::new()),
            widget: RefCell::new(widget),
            transport,
            scroll: RefCell::new(ScrollTracker::new()),
            was_open: Cell::new(false),
            this: this.clone(),
        });

        if let Err(error) = mounted.wire_events() {
            mounted.detach();
            return Err(error);
        }
        mounted.render();
        Ok(mounted)
    }

    /// Parent messages reach a hosted widget through its `HostRoute`, which
    /// listens from the moment the mount starts.
    fn wire_events(&self) -> MountResult<()> {
        let root: &EventTarget = self.root.as_ref();
        self.listen(root, "click", false, Self::on_click)?;
        self.listen(root, "pointerdown", false, Self::on_pointer_down)?;
        self.listen(root, "input", false, Self::on_input)?;
        self.listen(root, "keydown", false, Self::on_keydown)?;
        self.listen(root, "submit", false, Self::on_submit)?;
        // `scroll` does not bubble; capture it from the message list.
        self.listen(root, "scroll", true, Self::on_scroll)?;

        if self.mode == EmbedMode::Inline {
            let window: &EventTarget = self.window.as_ref();
            self.listen(window, "resize", false, Self::on_resize)?;
        }
        Ok(())
    }

    /// Registers a listener that lives until [`Mounted::detach`].
    fn listen<E: JsCast + 'static>(
        &self,
        target: &EventTarget,
        event_name: &'static str,
        capture: bool,
        handler: fn(&Mounted, E),
    ) -> MountResult<()> {
        let weak = self.this.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            let Some(mounted) = weak.upgrade() else {
                return;
            };
            if let Ok(event) = event.dyn_into::<E>() {
                handler(&mounted, event);
            }
        });
        target
            .add_event_listener_with_callback_and_bool(
                event_name,
                closure.as_ref().unchecked_ref(),
                capture,
            )
            .dom("add-widget-listener")?;
        self.listeners
            .borrow_mut()
            .push((target.clone(), event_name, capture, closure));
        Ok(())
    }

    /// Removes the widget's listeners and markup from the page. Any drag in
    /// progress is cancelled so its window listeners go too.
    pub fn detach(&self) {
        if let Ok(mut widget) = self.widget.try_borrow_mut() {
            widget.pointer_cancel();
        }

        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for (target, event_name, capture, closure) in &listeners {
            if let Err(error) = target.remove_event_listener_with_callback_and_bool(
                event_name,
                closure.as_ref().unchecked_ref(),
                *capture,
            ) {
                log::debug!(
                    "failed to remove widget listener `{event_name}`: {}",
                    js_error_message(&error)
                );
            }
        }
        self.root.remove();

        wasm_bindgen_futures::spawn_local(async move {
            drop(listeners);
        });
    }

    /// Opens or closes the widget on behalf of the embedding page.
    pub fn set_open(&self, open: bool) -> bool {
        let changed = self
            .widget
            .try_borrow_mut()
            .map(|mut widget| widget.set_open(open))
            .unwrap_or(false);
        if changed {
            self.render();
        }
        changed
    }

    fn on_click(&self, event: MouseEvent) {
        let Some(action) = closest(event.target(), "[data-action]")
            .and_then(|element| element.get_attribute("data-action"))
        else {
            return;
        };

        let source = match action.as_str() {
            "open" => ToggleSource::Launcher,
            "close" => ToggleSource::CloseControl,
            _ => return,
        };
        let changed = self
            .widget
            .try_borrow_mut()
            .map(|mut widget| widget.toggle(source))
            .unwrap_or(false);
        if changed {
            self.render();
        }
    }

    fn on_pointer_down(&self, event: PointerEvent) {
        if event.button() != 0 {
            return;
        }

        let region = hit_region(event.target());
        let pointer = Point::new(f64::from(event.client_x()), f64::from(event.client_y()));
        let bounds = self.root.get_bounding_client_rect();
        let element = Rect::new(
            Point::new(bounds.left(), bounds.top()),
            Size::new(bounds.width(), bounds.height()),
        );

        let window = self.window.clone();
        let weak = self.this.clone();
        let started = self
            .widget
            .try_borrow_mut()
            .map(|mut widget| {
                widget.pointer_down(region, pointer, element, || {
                    DragListeners::attach(&window, weak)
                })
            })
            .unwrap_or(false);

        if started {
            event.prevent_default();
            self.apply_container_style();
        }
    }

    /// Called from the window-level drag listeners.
    pub fn drag_moved(&self, event: &PointerEvent) -> bool {
        let pointer = Point::new(f64::from(event.client_x()), f64::from(event.client_y()));
        let moved = self
            .widget
            .try_borrow_mut()
            .ok()
            .and_then(|mut widget| widget.pointer_move(pointer));
        if moved.is_some() {
            self.apply_container_style();
        }
        moved.is_some()
    }

    /// `completed` is false for pointer-cancel and window blur.
    ///
    /// Only the container style changes here: replacing the markup between
    /// pointer-up and the following click would swallow the click.
    pub fn drag_ended(&self, completed: bool) {
        if let Ok(mut widget) = self.widget.try_borrow_mut() {
            if completed {
                widget.pointer_up();
            } else {
                widget.pointer_cancel();
            }
        }
        self.apply_container_style();
    }

    fn on_input(&self, event: Event) {
        let Some(input) = event
            .target()
            .and_then(|target| target.dyn_into::<HtmlTextAreaElement>().ok())
        else {
            return;
        };
        if let Ok(mut widget) = self.widget.try_borrow_mut() {
            widget.set_draft(input.value());
        }
    }

    fn on_keydown(&self, event: KeyboardEvent) {
        if closest(event.target(), INPUT_SELECTOR).is_none() {
            return;
        }
        if composer_action(&event.key(), event.shift_key(), event.is_composing())
            == ComposerAction::Submit
        {
            event.prevent_default();
            self.send();
        }
    }

    fn on_submit(&self, event: Event) {
        event.prevent_default();
        self.send();
    }

    fn on_scroll(&self, event: Event) {
        let Some(list) = closest(event.target(), MESSAGES_SELECTOR) else {
            return;
        };
        self.scroll.borrow_mut().observe_scroll(
            f64::from(list.scroll_top()),
            f64::from(list.scroll_height()),
            f64::from(list.client_height()),
        );
    }

    fn on_resize(&self, _event: Event) {
        if let Ok(mut widget) = self.widget.try_borrow_mut() {
            widget.viewport_resized(viewport(&self.window));
        }
        self.apply_container_style();
    }

    pub fn host_message(&self, origin: &str, data: &Value) {
        let changed = self
            .widget
            .try_borrow_mut()
            .map(|mut widget| widget.handle_host_message(origin, data))
            .unwrap_or(false);
        if changed {
            self.render();
        }
    }

    /// Applies what the parent sent while the config was resolving, then
    /// announces `READY` so the parent can send its context again.
    pub fn host_ready(&self, inbox: &mut HostInbox) {
        let changed = match self.widget.try_borrow_mut() {
            Ok(mut widget) => widget.replay_host_messages(inbox),
            Err(_) => false,
        };
        if changed {
            self.render();
        }
        if let Ok(widget) = self.widget.try_borrow() {
            widget.announce_ready();
        }
    }

    fn send(&self) {
        let pending = self
            .widget
            .try_borrow_mut()
            .ok()
            .and_then(|mut widget| widget.submit());
        let Some(pending) = pending else {
            return;
        };
        self.render();

        let Some(mounted) = self.this.upgrade() else {
            return;
        };
        wasm_bindgen_futures::spawn_local(async move {
            deliver(&mounted.widget, &mounted.transport, pending).await;
            mounted.render();
        });
    }

    fn render(&self) {
        let Ok(frame) = self.widget.try_borrow().map(|widget| widget.render()) else {
            return;
        };

        self.set_container_style(&frame.container.to_css());
        let had_focus = self.input_has_focus();
        self.root.set_inner_html(&render_html(&frame));

        let was_open = self.was_open.replace(frame.is_open);
        let just_opened = frame.is_open && !was_open;
        if (had_focus || just_opened)
            && let Some(input) = self.query::<HtmlTextAreaElement>(INPUT_SELECTOR)
            && !input.disabled()
        {
            let end = input.value().encode_utf16().count() as u32;
            if let Err(error) = input.focus() {
                log::debug!("failed to focus chat input: {}", js_error_message(&error));
            }
            if let Err(error) = input.set_selection_range(end, end) {
                log::debug!(
                    "failed to move chat input caret: {}",
                    js_error_message(&error)
                );
            }
        }

        if self.mode == EmbedMode::Inline {
            self.measure_chrome();
        }

        let mut scroll = self.scroll.borrow_mut();
        scroll.observe_frame(frame.is_open, frame.scroll_revision);
        if scroll.take_pending_scroll()
            && let Some(list) = self.query::<Element>(MESSAGES_SELECTOR)
        {
            list.set_scroll_top(list.scroll_height());
        }
    }

    /// Feeds the rendered launcher or window size back into the drag clamp.
    fn measure_chrome(&self) {
        let bounds = self.root.get_bounding_client_rect();
        let measured = self
            .widget
            .try_borrow_mut()
            .map(|mut widget| widget.chrome_measured(Size::new(bounds.width(), bounds.height())));
        if measured.is_ok() {
            self.apply_container_style();
        }
    }

    fn apply_container_style(&self) {
        if let Ok(css) = self
            .widget
            .try_borrow()
            .map(|widget| widget.render().container.to_css())
        {
            self.set_container_style(&css);
        }
    }

    fn set_container_style(&self, css: &str) {
        if let Err(error) = self.root.set_attribute("style", css) {
            log::warn!(
                "failed to update widget container style: {}",
                js_error_message(&error)
            );
        }
    }

    fn input_has_focus(&self) -> bool {
        self.document.active_element().is_some_and(|active| {
            let node: &Node = &active;
            active.get_attribute("data-role").as_deref() == Some("input")
                && self.root.contains(Some(node))
        })
    }

    fn query<T: JsCast>(&self, selector: &str) -> Option<T> {
        self.root
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(|element| element.dyn_into::<T>().ok())
    }
}

/// Installs the widget stylesheet in `<head>` once per document.
fn ensure_stylesheet(document: &Document) -> MountResult<()> {
    if document.get_element_by_id(STYLESHEET_ID).is_some() {
        return Ok(());
    }
    let head = document.head().context(NoDocumentSnafu {
        stage: "resolve-head",
    })?;
    let style = document
        .create_element("style")
        .dom("create-stylesheet")?;
    style.set_id(STYLESHEET_ID);
    style.set_text_content(Some(WIDGET_CSS));
    head.append_child(&style).dom("append-stylesheet")?;
    Ok(())
}

fn closest(target: Option<EventTarget>, selector: &str) -> Option<Element> {
    target?
        .dyn_into::<Element>()
        .ok()?
        .closest(selector)
        .ok()
        .flatten()
}

fn hit_region(target: Option<EventTarget>) -> HitRegion {
    let Some(element) = target.and_then(|target| target.dyn_into::<Element>().ok()) else {
        return HitRegion::Content;
    };
    if matches!(element.closest("[data-interactive]"), Ok(Some(_))) {
        return HitRegion::Interactive;
    }

    match element
        .closest("[data-drag-region]")
        .ok()
        .flatten()
        .and_then(|region| region.get_attribute("data-drag-region"))
        .as_deref()
    {
        Some("handle") => HitRegion::DragHandle,
        Some("header") => HitRegion::Header,
        _ => HitRegion::Content,
    }
}
