use serde_json::Value;

use crate::bridge::FrameFootprint;
use crate::config::Position;
use crate::view::{EDGE_OFFSET_PX, escape};

pub const FRAME_ELEMENT_ID: &str = "chatdock-frame";

/// Snippet for inline mode: the widget runs in the host document and reads
/// `window.ChatdockConfig` once at mount.
pub fn inline_snippet(script_url: &str, overrides: &Value) -> String {
    format!(
        "<script>window.ChatdockConfig = {config};</script>\n\
         <script type=\"module\">import init, {{ mount }} from \"{script}\"; await init(); mount();</script>\n",
        config = script_json(overrides),
        script = escape(script_url),
    )
}

/// Document served inside the frame in hosted mode.
pub fn hosted_document(script_url: &str, overrides: &Value) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n\
         <style>html,body{{margin:0;background:transparent;overflow:hidden}}</style>\n\
         <script>window.ChatdockConfig = {config};</script>\n</head>\n<body>\n\
         <script type=\"module\">import init, {{ mount_hosted }} from \"{script}\"; await init(); mount_hosted();</script>\n\
         </body>\n</html>\n",
        config = script_json(overrides),
        script = escape(script_url),
    )
}

/// Snippet for the page that embeds a hosted widget. The frame starts at the
/// closed footprint; the parent-side script resizes it on `RESIZE`.
pub fn iframe_snippet(script_url: &str, widget_page_url: &str, position: Position) -> String {
    let closed = FrameFootprint::CLOSED;
    format!(
        "<iframe id=\"{FRAME_ELEMENT_ID}\" src=\"{page}\" title=\"Chat\" \
         style=\"position:fixed;{side}:{EDGE_OFFSET_PX}px;bottom:{EDGE_OFFSET_PX}px;{size};border:none;background:transparent;z-index:2147483000\"></iframe>\n\
         <script type=\"module\">import init, {{ attach_host_frame }} from \"{script}\"; await init(); attach_host_frame(\"{FRAME_ELEMENT_ID}\");</script>\n",
        page = escape(widget_page_url),
        side = position.as_str(),
        size = closed.to_css(),
        script = escape(script_url),
    )
}

/// JSON that can sit inside a `<script>` element without closing it.
fn script_json(value: &Value) -> String {
    let object = if value.is_object() {
        value.to_string()
    } else {
        "{}".to_string()
    };
    object.replace("</", "<\\/").replace("<!--", "<\\!--")
}
