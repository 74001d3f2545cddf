use chatdock_core::bridge::{BridgeError, BridgeResult};
use chatdock_core::session::{StoreError, StoreResult};
use chatdock_core::{HostChannel, HostMessage, KeyValueStore, Size};
use serde_json::Value;
use wasm_bindgen::JsValue;
use web_sys::Window;

use crate::error::js_error_message;

/// Global the host page sets before loading the widget script.
pub const PAGE_CONFIG_GLOBAL: &str = "ChatdockConfig";

/// `window.localStorage`, resolved on every call so a storage that becomes
/// unavailable later degrades to warnings instead of a stale handle.
pub struct LocalStorageStore {
    window: Window,
}

impl LocalStorageStore {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn storage(&self, stage: &'static str) -> StoreResult<web_sys::Storage> {
        match self.window.local_storage() {
            Ok(Some(storage)) => Ok(storage),
            Ok(None) => Err(StoreError::Unavailable {
                stage,
                details: "localStorage is not available".to_string(),
            }),
            Err(error) => Err(StoreError::Unavailable {
                stage,
                details: js_error_message(&error),
            }),
        }
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.storage("open-local-storage-for-read")?
            .get_item(key)
            .map_err(|error| StoreError::Unavailable {
                stage: "read-local-storage",
                details: js_error_message(&error),
            })
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.storage("open-local-storage-for-write")?
            .set_item(key, value)
            .map_err(|error| StoreError::Unavailable {
                stage: "write-local-storage",
                details: js_error_message(&error),
            })
    }
}

/// Posts to `window.parent`.
pub struct ParentChannel {
    window: Window,
}

impl ParentChannel {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl HostChannel for ParentChannel {
    fn post(&self, message: &HostMessage, target_origin: &str) -> BridgeResult<()> {
        let parent = match self.window.parent() {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                return Err(BridgeError::Post {
                    stage: "resolve-parent-window",
                    details: "widget frame has no parent window".to_string(),
                });
            }
            Err(error) => {
                return Err(BridgeError::Post {
                    stage: "resolve-parent-window",
                    details: js_error_message(&error),
                });
            }
        };

        let payload = to_js(message).map_err(|details| BridgeError::Post {
            stage: "encode-host-message",
            details,
        })?;
        parent
            .post_message(&payload, target_origin)
            .map_err(|error| BridgeError::Post {
                stage: "post-host-message",
                details: js_error_message(&error),
            })
    }
}

/// Plain-object encoding (no `Map`s) so the receiving page can read fields
/// directly.
pub fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|error| error.to_string())
}

pub fn from_js(value: JsValue) -> Value {
    if value.is_undefined() || value.is_null() {
        return Value::Null;
    }
    serde_wasm_bindgen::from_value(value).unwrap_or_else(|error| {
        log::warn!("ignoring value that is not plain JSON: {error}");
        Value::Null
    })
}

/// Reads `window.ChatdockConfig` once.
pub fn page_config(window: &Window) -> Value {
    match js_sys::Reflect::get(window, &JsValue::from_str(PAGE_CONFIG_GLOBAL)) {
        Ok(raw) => from_js(raw),
        Err(error) => {
            log::warn!(
                "failed to read window.{PAGE_CONFIG_GLOBAL}: {}",
                js_error_message(&error)
            );
            Value::Null
        }
    }
}

pub fn page_origin(window: &Window) -> Option<String> {
    window.location().origin().ok()
}

pub fn viewport(window: &Window) -> Size {
    let dimension = |value: Result<JsValue, JsValue>| {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or_default()
    };
    Size::new(
        dimension(window.inner_width()),
        dimension(window.inner_height()),
    )
}
