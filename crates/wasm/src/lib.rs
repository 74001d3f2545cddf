use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chatdock_core::{ConfigResolver, EmbedMode, HttpTransport, absolutize_relative_urls};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use wasm_bindgen::prelude::*;

mod drag_listeners;
mod error;
mod host_frame;
mod host_route;
mod mounted;
mod platform;

pub use host_frame::HostFrame;

use error::{MountResult, NoWindowSnafu, TransportSnafu};
use host_route::{HostListener, HostRoute};
use mounted::Mounted;

/// One mount call. `mounted` is filled in once config resolution finishes.
struct Instance {
    mounted: Option<Rc<Mounted>>,
    // Held for its drop, which removes the window listener.
    _host_listener: Option<HostListener>,
}

thread_local! {
    static INSTANCES: RefCell<HashMap<u32, Instance>> = RefCell::new(HashMap::new());
    static NEXT_INSTANCE_ID: Cell<u32> = const { Cell::new(1) };
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("chatdock widget module initialized");
}

/// Mounts a floating widget configured by `window.ChatdockConfig`.
#[wasm_bindgen]
pub fn mount() -> Result<WidgetHandle, JsValue> {
    let window = web_sys::window().context(NoWindowSnafu { stage: "mount" })?;
    start_mount(EmbedMode::Inline, platform::page_config(&window)).map_err(Into::into)
}

/// Mounts a floating widget with its own config object. Each call creates
/// an independent widget with its own root element.
#[wasm_bindgen]
pub fn mount_with(config: JsValue) -> Result<WidgetHandle, JsValue> {
    start_mount(EmbedMode::Inline, platform::from_js(config)).map_err(Into::into)
}

/// Mounts the full-viewport widget inside a widget-page iframe.
#[wasm_bindgen]
pub fn mount_hosted() -> Result<WidgetHandle, JsValue> {
    let window = web_sys::window().context(NoWindowSnafu {
        stage: "mount-hosted",
    })?;
    start_mount(EmbedMode::Hosted, platform::page_config(&window)).map_err(Into::into)
}

/// Called by the parent page once the widget iframe is in the DOM.
#[wasm_bindgen]
pub fn attach_host_frame(frame_id: &str) -> Result<HostFrame, JsValue> {
    host_frame::attach(frame_id).map_err(Into::into)
}

/// Page-side handle to one mounted widget.
#[wasm_bindgen]
pub struct WidgetHandle {
    id: u32,
}

#[wasm_bindgen]
impl WidgetHandle {
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// False while the config is still resolving and after `unmount`.
    pub fn is_mounted(&self) -> bool {
        mounted(self.id).is_some()
    }

    pub fn open(&self) -> bool {
        self.set_open(true)
    }

    pub fn close(&self) -> bool {
        self.set_open(false)
    }

    /// Removes the widget from the page. A mount still resolving its config
    /// is abandoned.
    pub fn unmount(&self) {
        let removed = INSTANCES.with(|instances| instances.borrow_mut().remove(&self.id));
        match removed {
            Some(Instance {
                mounted: Some(mounted),
                ..
            }) => {
                mounted.detach();
                log::info!("unmounted chat widget {}", self.id);
            }
            Some(_) => log::debug!("abandoned chat widget {} before it mounted", self.id),
            None => log::debug!("chat widget {} is not mounted", self.id),
        }
    }

    fn set_open(&self, open: bool) -> bool {
        match mounted(self.id) {
            Some(mounted) => mounted.set_open(open),
            None => {
                log::debug!("chat widget {} is not mounted yet", self.id);
                false
            }
        }
    }
}

fn mounted(id: u32) -> Option<Rc<Mounted>> {
    INSTANCES.with(|instances| {
        instances
            .borrow()
            .get(&id)
            .and_then(|instance| instance.mounted.clone())
    })
}

fn root_element_id(id: u32) -> String {
    format!("chatdock-widget-{id}")
}

fn start_mount(mode: EmbedMode, mut raw: Value) -> MountResult<WidgetHandle> {
    let window = web_sys::window().context(NoWindowSnafu { stage: "mount" })?;
    if let Some(origin) = platform::page_origin(&window) {
        absolutize_relative_urls(&mut raw, &origin);
    }

    let resolver = ConfigResolver::new().with_local_override(&raw);
    let transport = HttpTransport::new(&resolver.local_config()).context(TransportSnafu {
        stage: "build-config-transport",
    })?;

    // The parent may post CONTEXT or TOGGLE before the config resolves.
    let (route, host_listener) = match mode {
        EmbedMode::Hosted => {
            let route = HostRoute::new();
            let listener = HostListener::attach(&window, route.clone())?;
            (Some(route), Some(listener))
        }
        EmbedMode::Inline => (None, None),
    };

    let id = NEXT_INSTANCE_ID.with(|next| {
        let id = next.get();
        next.set(id.wrapping_add(1));
        id
    });
    INSTANCES.with(|instances| {
        instances.borrow_mut().insert(
            id,
            Instance {
                mounted: None,
                _host_listener: host_listener,
            },
        )
    });

    wasm_bindgen_futures::spawn_local(async move {
        let config = resolver.resolve(Some(&transport)).await;
        let transport = match HttpTransport::new(&config) {
            Ok(resolved) => resolved,
            Err(error) => {
                log::warn!("keeping config transport for chat requests: {error}");
                transport
            }
        };

        if !INSTANCES.with(|instances| instances.borrow().contains_key(&id)) {
            return;
        }
        let mounted = match Mounted::create(window, mode, config, transport, &root_element_id(id)) {
            Ok(mounted) => mounted,
            Err(error) => {
                INSTANCES.with(|instances| instances.borrow_mut().remove(&id));
                log::error!("failed to mount chat widget {id}: {error}");
                return;
            }
        };

        INSTANCES.with(|instances| {
            if let Some(instance) = instances.borrow_mut().get_mut(&id) {
                instance.mounted = Some(Rc::clone(&mounted));
            }
        });
        if let Some(route) = route {
            route.go_live(&mounted);
        }
        log::info!("mounted chat widget {id}");
    });

    Ok(WidgetHandle { id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_instance_gets_its_own_root_element() {
        assert_eq!(root_element_id(1), "chatdock-widget-1");
        assert_ne!(root_element_id(1), root_element_id(2));
    }
}
