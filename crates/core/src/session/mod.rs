use std::cell::OnceCell;

mod store;

#[cfg(not(target_arch = "wasm32"))]
pub use store::FileStore;
pub use store::{KeyValueStore, MemoryStore, StoreError, StoreResult};

use crate::chat::now_millis;

/// The only key the widget ever writes to durable storage.
pub const SESSION_STORAGE_KEY: &str = "chatdock_session_id";

const SESSION_PREFIX: &str = "session_";
const RANDOM_SUFFIX_LEN: usize = 9;

/// Visitor identity bound to one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub tenant: Option<String>,
}

/// Lazily obtains the visitor's session id and keeps it for the page lifetime.
///
/// Storage failures never surface: they are logged and the generated id is
/// used anyway, so chat keeps working in private browsing or with a
/// read-only disk.
#[derive(Debug)]
pub struct SessionManager<S> {
    store: S,
    tenant: Option<String>,
    current: OnceCell<Session>,
}

impl<S: KeyValueStore> SessionManager<S> {
    pub fn new(store: S, tenant: Option<String>) -> Self {
        Self {
            store,
            tenant,
            current: OnceCell::new(),
        }
    }

    pub fn get(&self) -> &Session {
        self.current.get_or_init(|| Session {
            id: self.load_or_create(),
            tenant: self.tenant.clone(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.get().id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_or_create(&self) -> String {
        match self.store.get(SESSION_STORAGE_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => return existing,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(error = %error, "failed to read stored session id");
            }
        }

        let id = generate_session_id();
        if let Err(error) = self.store.set(SESSION_STORAGE_KEY, &id) {
            tracing::warn!(error = %error, "failed to persist session id; using it for this page only");
        }
        id
    }
}

/// `session_<unix-millis>_<9 lowercase hex chars>`.
pub fn generate_session_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{SESSION_PREFIX}{}_{}",
        now_millis(),
        &random[..RANDOM_SUFFIX_LEN]
    )
}
