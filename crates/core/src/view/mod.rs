mod frame;
mod html;
mod scroll;

pub use frame::{
    ContainerStyle, EDGE_OFFSET_PX, InputView, LauncherView, MessageBody, MessageView, WidgetFrame,
    WindowView, render,
};
pub use html::{WIDGET_CSS, escape, render_html};
pub use scroll::ScrollTracker;
