use chatdock_core::TransportError;
use snafu::Snafu;
use wasm_bindgen::{JsCast, JsValue};

pub type MountResult<T> = Result<T, MountError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MountError {
    #[snafu(display("no global `window` on `{stage}`"))]
    NoWindow { stage: &'static str },
    #[snafu(display("no document on `{stage}`"))]
    NoDocument { stage: &'static str },
    #[snafu(display("DOM call failed on `{stage}`: {details}"))]
    Dom {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("element #{id} not found on `{stage}`"))]
    ElementNotFound { stage: &'static str, id: String },
    #[snafu(display("failed to build http transport on `{stage}`"))]
    Transport {
        stage: &'static str,
        source: TransportError,
    },
}

impl From<MountError> for JsValue {
    fn from(error: MountError) -> Self {
        JsValue::from_str(&error.to_string())
    }
}

/// Best-effort readable text for a thrown JS value.
pub(crate) fn js_error_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|error| String::from(error.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

pub(crate) trait JsResultExt<T> {
    fn dom(self, stage: &'static str) -> MountResult<T>;
}

impl<T> JsResultExt<T> for Result<T, JsValue> {
    fn dom(self, stage: &'static str) -> MountResult<T> {
        self.map_err(|error| MountError::Dom {
            stage,
            details: js_error_message(&error),
        })
    }
}
