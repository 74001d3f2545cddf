use std::rc::Rc;

use chatdock_core::{FrameFootprint, HostMessage, PageContext};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, HtmlIFrameElement, MessageEvent, Window};

use crate::error::{JsResultExt, MountError, MountResult, js_error_message};
use crate::platform::{from_js, to_js};

/// Parent-page companion of a hosted widget: resizes the frame on `RESIZE`
/// and tells the widget which page it is embedded in. The context goes out on
/// attach, on every frame load and whenever the widget announces `READY`, so
/// a widget that starts listening late still receives it.
#[wasm_bindgen]
pub struct HostFrame {
    inner: Rc<FrameState>,
    window: Window,
    on_message: Closure<dyn FnMut(Event)>,
    on_load: Closure<dyn FnMut(Event)>,
}

struct FrameState {
    frame: HtmlIFrameElement,
    origin: String,
}

impl FrameState {
    fn post(&self, message: &HostMessage) {
        let Some(target) = self.frame.content_window() else {
            log::debug!("widget frame has no content window yet");
            return;
        };
        let payload = match to_js(message) {
            Ok(payload) => payload,
            Err(details) => {
                log::warn!("failed to encode {} for widget frame: {details}", message.kind());
                return;
            }
        };
        if let Err(error) = target.post_message(&payload, &self.origin) {
            log::warn!(
                "failed to post {} to widget frame: {}",
                message.kind(),
                js_error_message(&error)
            );
        }
    }

    fn apply_footprint(&self, is_open: bool) {
        let footprint = FrameFootprint::for_state(is_open);
        let style = self.frame.style();
        for (property, value) in [
            ("width", format!("{}px", footprint.width)),
            ("height", format!("{}px", footprint.height)),
        ] {
            if let Err(error) = style.set_property(property, &value) {
                log::warn!(
                    "failed to resize widget frame: {}",
                    js_error_message(&error)
                );
            }
        }
    }

    fn send_page_context(&self, window: &Window) {
        let title = window
            .document()
            .map(|document| document.title())
            .unwrap_or_default();
        let url = window.location().href().unwrap_or_default();
        self.post(&HostMessage::Context(PageContext::from_page(title, url)));
    }
}

pub(crate) fn attach(frame_id: &str) -> MountResult<HostFrame> {
    let window = web_sys::window().ok_or(MountError::NoWindow {
        stage: "attach-host-frame",
    })?;
    let document = window.document().ok_or(MountError::NoDocument {
        stage: "attach-host-frame",
    })?;
    let frame = document
        .get_element_by_id(frame_id)
        .and_then(|element| element.dyn_into::<HtmlIFrameElement>().ok())
        .ok_or_else(|| MountError::ElementNotFound {
            stage: "resolve-widget-frame",
            id: frame_id.to_string(),
        })?;

    let origin = web_sys::Url::new(&frame.src())
        .dom("parse-widget-frame-src")?
        .origin();
    let inner = Rc::new(FrameState { frame, origin });

    let on_message = {
        let inner = Rc::clone(&inner);
        let window = window.clone();
        Closure::<dyn FnMut(_)>::new(move |event: Event| {
            let Some(event) = event.dyn_ref::<MessageEvent>() else {
                return;
            };
            if event.origin() != inner.origin {
                return;
            }
            match HostMessage::from_value(&from_js(event.data())) {
                Some(HostMessage::Resize { is_open }) => inner.apply_footprint(is_open),
                Some(HostMessage::Ready) => inner.send_page_context(&window),
                _ => {}
            }
        })
    };
    window
        .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
        .dom("add-host-message-listener")?;

    let on_load = {
        let inner = Rc::clone(&inner);
        let window = window.clone();
        Closure::<dyn FnMut(_)>::new(move |_event: Event| {
            inner.send_page_context(&window);
        })
    };
    inner
        .frame
        .add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())
        .dom("add-frame-load-listener")?;

    inner.apply_footprint(false);
    inner.send_page_context(&window);
    log::info!("attached chat widget frame from {}", inner.origin);

    Ok(HostFrame {
        inner,
        window,
        on_message,
        on_load,
    })
}

#[wasm_bindgen]
impl HostFrame {
    /// Opens (`true`), closes (`false`) or flips (no argument) the widget.
    pub fn toggle(&self, open: Option<bool>) {
        self.inner.post(&HostMessage::Toggle { open });
    }

    /// Re-sends the page title and URL, e.g. after client-side navigation.
    pub fn send_context(&self) {
        self.inner.send_page_context(&self.window);
    }
}

impl Drop for HostFrame {
    fn drop(&mut self) {
        if let Err(error) = self.window.remove_event_listener_with_callback(
            "message",
            self.on_message.as_ref().unchecked_ref(),
        ) {
            log::debug!(
                "failed to remove widget frame message listener: {}",
                js_error_message(&error)
            );
        }
        if let Err(error) = self
            .inner
            .frame
            .remove_event_listener_with_callback("load", self.on_load.as_ref().unchecked_ref())
        {
            log::debug!(
                "failed to remove widget frame load listener: {}",
                js_error_message(&error)
            );
        }
    }
}
