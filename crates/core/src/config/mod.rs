mod resolver;
mod state;

pub use resolver::{
    ConfigLayer, ConfigPatch, ConfigResolver, absolutize_relative_urls, server_config_payload,
};
pub use state::{
    DEFAULT_ACCENT_COLOR, DEFAULT_BASE_URL, DEFAULT_BOT_NAME, DEFAULT_PLACEHOLDER,
    DEFAULT_WELCOME_MESSAGE, Position, WidgetConfig,
};
