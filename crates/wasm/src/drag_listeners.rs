use std::rc::Weak;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Event, PointerEvent, Window};

use crate::error::js_error_message;
use crate::mounted::Mounted;

type Listener = Closure<dyn FnMut(Event)>;

/// Window-level listeners that exist only while a drag is in progress.
///
/// Acquired when the widget enters the dragging state and released by
/// `Drop` when it leaves it.
pub struct DragListeners {
    window: Window,
    registered: Vec<(&'static str, Listener)>,
}

impl DragListeners {
    pub fn attach(window: &Window, mounted: Weak<Mounted>) -> Self {
        let mut listeners = Self {
            window: window.clone(),
            registered: Vec::with_capacity(4),
        };

        let on_move = {
            let mounted = mounted.clone();
            Closure::<dyn FnMut(_)>::new(move |event: Event| {
                let (Some(mounted), Some(pointer)) =
                    (mounted.upgrade(), event.dyn_ref::<PointerEvent>())
                else {
                    return;
                };
                if mounted.drag_moved(pointer) {
                    event.prevent_default();
                }
            })
        };
        listeners.register("pointermove", on_move);

        for (event_name, completed) in [
            ("pointerup", true),
            ("pointercancel", false),
            ("blur", false),
        ] {
            let mounted = mounted.clone();
            let on_end = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
                if let Some(mounted) = mounted.upgrade() {
                    mounted.drag_ended(completed);
                }
            });
            listeners.register(event_name, on_end);
        }

        listeners
    }

    fn register(&mut self, event_name: &'static str, listener: Listener) {
        match self
            .window
            .add_event_listener_with_callback(event_name, listener.as_ref().unchecked_ref())
        {
            Ok(()) => self.registered.push((event_name, listener)),
            Err(error) => log::warn!(
                "failed to register drag listener `{event_name}`: {}",
                js_error_message(&error)
            ),
        }
    }
}

impl Drop for DragListeners {
    fn drop(&mut self) {
        for (event_name, listener) in &self.registered {
            if let Err(error) = self
                .window
                .remove_event_listener_with_callback(event_name, listener.as_ref().unchecked_ref())
            {
                log::warn!(
                    "failed to remove drag listener `{event_name}`: {}",
                    js_error_message(&error)
                );
            }
        }

        // The release usually happens inside one of these closures, which must
        // not be freed while it is still on the stack.
        let closures = std::mem::take(&mut self.registered);
        wasm_bindgen_futures::spawn_local(async move {
            drop(closures);
        });
    }
}
