use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chatdock_core::HostInbox;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Event, MessageEvent, Window};

use crate::error::{JsResultExt, MountResult, js_error_message};
use crate::mounted::Mounted;
use crate::platform::from_js;

enum RouteState {
    Buffering(HostInbox),
    Live(Weak<Mounted>),
}

/// Where parent-page messages go in hosted mode: into an inbox while the
/// config is still resolving, straight to the widget afterwards.
#[derive(Clone)]
pub struct HostRoute {
    state: Rc<RefCell<RouteState>>,
}

impl HostRoute {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RouteState::Buffering(HostInbox::new()))),
        }
    }

    fn deliver(&self, origin: &str, data: &Value) {
        let live = match &mut *self.state.borrow_mut() {
            RouteState::Buffering(inbox) => {
                if !inbox.push(origin, data) {
                    log::debug!("dropping early host message that is not replayed");
                }
                return;
            }
            RouteState::Live(mounted) => mounted.upgrade(),
        };
        if let Some(mounted) = live {
            mounted.host_message(origin, data);
        }
    }

    /// Hands buffered messages to `mounted` and routes later ones to it.
    pub fn go_live(&self, mounted: &Rc<Mounted>) {
        let previous = self
            .state
            .replace(RouteState::Live(Rc::downgrade(mounted)));
        if let RouteState::Buffering(mut inbox) = previous {
            mounted.host_ready(&mut inbox);
        }
    }
}

/// Window `message` listener feeding a [`HostRoute`]. Registered as soon as
/// a hosted mount starts; removed on drop.
pub struct HostListener {
    window: Window,
    closure: Closure<dyn FnMut(Event)>,
}

impl HostListener {
    pub fn attach(window: &Window, route: HostRoute) -> MountResult<Self> {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: Event| {
            if let Some(event) = event.dyn_ref::<MessageEvent>() {
                route.deliver(&event.origin(), &from_js(event.data()));
            }
        });
        window
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .dom("add-host-message-listener")?;

        Ok(Self {
            window: window.clone(),
            closure,
        })
    }
}

impl Drop for HostListener {
    fn drop(&mut self) {
        if let Err(error) = self
            .window
            .remove_event_listener_with_callback("message", self.closure.as_ref().unchecked_ref())
        {
            log::debug!(
                "failed to remove host message listener: {}",
                js_error_message(&error)
            );
        }
    }
}
