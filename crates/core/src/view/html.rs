use std::fmt::Write as _;

use super::frame::{MessageBody, MessageView, WidgetFrame, WindowView};
use crate::chat::CardData;

/// Scoped stylesheet. Every selector hangs off `.chatdock-root` so the host
/// page's rules and ours never meet.
pub const WIDGET_CSS: &str = r#"
.chatdock-root{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;font-size:14px;line-height:1.45;color:#1f2937}
.chatdock-root *{box-sizing:border-box;margin:0;padding:0}
.chatdock-root .chatdock-launcher{position:relative;width:60px;height:60px;border:none;border-radius:50%;background:var(--chatdock-accent);color:#fff;cursor:pointer;box-shadow:0 6px 20px rgba(0,0,0,.2);display:flex;align-items:center;justify-content:center;touch-action:none}
.chatdock-root .chatdock-launcher svg{width:28px;height:28px;pointer-events:none}
.chatdock-root .chatdock-badge{position:absolute;top:-4px;right:-4px;min-width:20px;height:20px;padding:0 6px;border-radius:10px;background:#ef4444;color:#fff;font-size:12px;font-weight:600;line-height:20px;text-align:center}
.chatdock-root .chatdock-window{width:360px;max-width:calc(100vw - 24px);height:560px;max-height:calc(100vh - 24px);background:#fff;border-radius:16px;box-shadow:0 12px 40px rgba(0,0,0,.18);display:flex;flex-direction:column;overflow:hidden}
.chatdock-root.chatdock-hosted .chatdock-window{width:100%;height:100%;max-width:none;max-height:none;border-radius:0}
.chatdock-root .chatdock-header{display:flex;align-items:center;gap:10px;padding:14px 16px;background:var(--chatdock-accent);color:#fff;touch-action:none}
.chatdock-root .chatdock-header.chatdock-draggable{cursor:grab}
.chatdock-root .chatdock-handle{opacity:.7;cursor:grab}
.chatdock-root .chatdock-logo{width:28px;height:28px;border-radius:50%;object-fit:cover;background:#fff}
.chatdock-root .chatdock-title{flex:1;font-weight:600;white-space:nowrap;overflow:hidden;text-overflow:ellipsis}
.chatdock-root .chatdock-close{border:none;background:transparent;color:#fff;font-size:22px;line-height:1;cursor:pointer}
.chatdock-root .chatdock-messages{flex:1;overflow-y:auto;padding:16px;display:flex;flex-direction:column;gap:10px;background:#f9fafb}
.chatdock-root .chatdock-msg{max-width:82%;padding:9px 13px;border-radius:14px;white-space:pre-wrap;word-wrap:break-word}
.chatdock-root .chatdock-msg-user{align-self:flex-end;background:var(--chatdock-accent);color:#fff;border-bottom-right-radius:4px}
.chatdock-root .chatdock-msg-bot{align-self:flex-start;background:#fff;border:1px solid #e5e7eb;border-bottom-left-radius:4px}
.chatdock-root .chatdock-msg-system{align-self:center;color:#6b7280;font-size:12px;font-style:italic}
.chatdock-root .chatdock-card{padding:0;overflow:hidden;white-space:normal}
.chatdock-root .chatdock-card img{display:block;width:100%;max-height:160px;object-fit:cover}
.chatdock-root .chatdock-card-body{padding:10px 13px;display:flex;flex-direction:column;gap:4px}
.chatdock-root .chatdock-card-title{font-weight:600}
.chatdock-root .chatdock-card-price{color:var(--chatdock-accent);font-weight:600}
.chatdock-root .chatdock-card-link{color:var(--chatdock-accent);text-decoration:none;font-weight:500}
.chatdock-root .chatdock-typing{align-self:flex-start;display:flex;gap:4px;padding:12px 14px;background:#fff;border:1px solid #e5e7eb;border-radius:14px}
.chatdock-root .chatdock-typing span{width:6px;height:6px;border-radius:50%;background:#9ca3af;animation:chatdock-bounce 1.2s infinite}
.chatdock-root .chatdock-typing span:nth-child(2){animation-delay:.15s}
.chatdock-root .chatdock-typing span:nth-child(3){animation-delay:.3s}
@keyframes chatdock-bounce{0%,60%,100%{transform:translateY(0)}30%{transform:translateY(-4px)}}
.chatdock-root .chatdock-composer{display:flex;gap:8px;padding:12px;border-top:1px solid #e5e7eb;background:#fff}
.chatdock-root .chatdock-input{flex:1;resize:none;border:1px solid #d1d5db;border-radius:10px;padding:9px 12px;font:inherit;max-height:96px;outline:none}
.chatdock-root .chatdock-input:focus{border-color:var(--chatdock-accent)}
.chatdock-root .chatdock-send{border:none;border-radius:10px;padding:0 16px;background:var(--chatdock-accent);color:#fff;font-weight:600;cursor:pointer}
.chatdock-root .chatdock-send:disabled,.chatdock-root .chatdock-input:disabled{opacity:.5;cursor:not-allowed}
"#;

const CHAT_ICON: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" aria-hidden="true"><path d="M21 15a2 2 0 0 1-2 2H7l-4 4V5a2 2 0 0 1 2-2h14a2 2 0 0 1 2 2z"/></svg>"#;

/// Serializes a frame into markup.
///
/// Neither the stylesheet nor container placement is part of the markup:
/// platforms install [`WIDGET_CSS`] once per document and apply
/// [`super::ContainerStyle::to_css`] to the element they mount into.
pub fn render_html(frame: &WidgetFrame) -> String {
    let mut html = String::with_capacity(4096);
    let hosted = if frame.container.mode == crate::widget::EmbedMode::Hosted {
        " chatdock-hosted"
    } else {
        ""
    };

    let _ = write!(
        html,
        r#"<div class="chatdock-root chatdock-{anchor}{hosted}" style="--chatdock-accent:{accent}">"#,
        anchor = frame.container.anchor.as_str(),
        accent = escape(&frame.accent_color),
    );

    match &frame.window {
        Some(window) => push_window(&mut html, window),
        None => push_launcher(&mut html, frame),
    }

    html.push_str("</div>");
    html
}

fn push_launcher(html: &mut String, frame: &WidgetFrame) {
    let launcher = &frame.launcher;
    let drag = if launcher.draggable {
        r#" data-drag-region="handle""#
    } else {
        ""
    };

    let _ = write!(
        html,
        r#"<button type="button" class="chatdock-launcher" data-action="open"{drag} aria-label="{label}">{CHAT_ICON}"#,
        label = escape(&launcher.label),
    );
    if launcher.unread > 0 {
        let count = if launcher.unread > 9 {
            "9+".to_string()
        } else {
            launcher.unread.to_string()
        };
        let _ = write!(
            html,
            r#"<span class="chatdock-badge" data-role="unread">{count}</span>"#
        );
    }
    html.push_str("</button>");
}

fn push_window(html: &mut String, window: &WindowView) {
    let bot_name = escape(&window.bot_name);
    let _ = write!(
        html,
        r#"<section class="chatdock-window" role="dialog" aria-label="{bot_name}">"#
    );

    if window.draggable {
        html.push_str(
            r#"<header class="chatdock-header chatdock-draggable" data-drag-region="header"><span class="chatdock-handle" data-drag-region="handle" aria-hidden="true">&#8942;&#8942;</span>"#,
        );
    } else {
        html.push_str(r#"<header class="chatdock-header">"#);
    }
    if let Some(logo) = window.logo_url.as_deref().filter(|url| is_safe_url(url)) {
        let _ = write!(
            html,
            r#"<img class="chatdock-logo" src="{}" alt="">"#,
            escape(logo)
        );
    }
    let _ = write!(
        html,
        r#"<span class="chatdock-title">{bot_name}</span><button type="button" class="chatdock-close" data-action="close" data-interactive aria-label="Close chat">&times;</button></header>"#
    );

    html.push_str(r#"<div class="chatdock-messages" data-role="messages" aria-live="polite">"#);
    for message in &window.messages {
        push_message(html, message);
    }
    if window.typing {
        html.push_str(
            r#"<div class="chatdock-typing" data-role="typing" aria-label="Typing"><span></span><span></span><span></span></div>"#,
        );
    }
    html.push_str("</div>");

    let disabled = if window.input.enabled { "" } else { " disabled" };
    let _ = write!(
        html,
        r#"<form class="chatdock-composer" data-action="submit"><textarea class="chatdock-input" data-role="input" data-interactive rows="1" placeholder="{placeholder}"{disabled}>{draft}</textarea><button type="submit" class="chatdock-send" data-interactive{disabled}>Send</button></form>"#,
        placeholder = escape(&window.input.placeholder),
        draft = escape(&window.input.draft),
    );

    html.push_str("</section>");
}

fn push_message(html: &mut String, message: &MessageView) {
    let role = message.role.as_str();
    let id = message.id.0;
    match &message.body {
        MessageBody::Text(text) => {
            let _ = write!(
                html,
                r#"<div class="chatdock-msg chatdock-msg-{role}" data-message-id="{id}">{}</div>"#,
                escape(text)
            );
        }
        MessageBody::Card { text, card } => {
            let _ = write!(
                html,
                r#"<div class="chatdock-msg chatdock-msg-{role} chatdock-card" data-message-id="{id}">"#
            );
            push_card(html, text, card);
            html.push_str("</div>");
        }
    }
}

fn push_card(html: &mut String, text: &str, card: &CardData) {
    if let Some(image) = card.image_url.as_deref().filter(|url| is_safe_url(url)) {
        let _ = write!(
            html,
            r#"<img src="{}" alt="{}" loading="lazy">"#,
            escape(image),
            escape(&card.title)
        );
    }

    html.push_str(r#"<div class="chatdock-card-body">"#);
    if !card.title.is_empty() {
        let _ = write!(
            html,
            r#"<div class="chatdock-card-title">{}</div>"#,
            escape(&card.title)
        );
    }
    if !text.is_empty() && text != card.title && Some(text) != card.description.as_deref() {
        let _ = write!(html, "<p>{}</p>", escape(text));
    }
    if let Some(description) = &card.description {
        let _ = write!(
            html,
            r#"<p class="chatdock-card-description">{}</p>"#,
            escape(description)
        );
    }
    if let Some(price) = &card.price {
        let _ = write!(
            html,
            r#"<span class="chatdock-card-price">{}</span>"#,
            escape(price)
        );
    }
    if let Some(url) = card.url.as_deref().filter(|url| is_safe_url(url)) {
        let _ = write!(
            html,
            r#"<a class="chatdock-card-link" href="{}" target="_blank" rel="noopener noreferrer" data-interactive>View details</a>"#,
            escape(url)
        );
    }
    html.push_str("</div>");
}

/// Escape HTML special characters
pub fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessageId, Role};
    use crate::config::Position;
    use crate::view::frame::{ContainerStyle, InputView, LauncherView};
    use crate::widget::EmbedMode;

    fn frame(window: Option<WindowView>, unread: usize) -> WidgetFrame {
        WidgetFrame {
            is_open: window.is_some(),
            accent_color: "#4f46e5".to_string(),
            container: ContainerStyle {
                mode: EmbedMode::Inline,
                anchor: Position::Right,
                offset: None,
                dragging: false,
            },
            launcher: LauncherView {
                label: "Open chat with Assistant".to_string(),
                unread,
                draggable: true,
            },
            window,
            scroll_revision: 0,
        }
    }

    fn window(messages: Vec<MessageView>, typing: bool) -> WindowView {
        WindowView {
            bot_name: "Shop <Bot>".to_string(),
            logo_url: Some("javascript:alert(1)".to_string()),
            draggable: true,
            messages,
            typing,
            input: InputView {
                placeholder: "Ask \"anything\"".to_string(),
                draft: String::new(),
                enabled: !typing,
            },
        }
    }

    #[test]
    fn closed_frame_renders_launcher_with_badge() {
        let html = render_html(&frame(None, 12));
        assert!(html.contains(r#"data-action="open""#));
        assert!(html.contains(r#"data-role="unread">9+<"#));
        assert!(!html.contains(r#"<section class="chatdock-window""#));
        assert!(!html.contains(r#"role="dialog""#));
    }

    #[test]
    fn markup_leaves_the_stylesheet_to_the_platform() {
        let html = render_html(&frame(Some(window(Vec::new(), false)), 0));

        assert!(html.starts_with(r#"<div class="chatdock-root chatdock-right""#));
        assert!(!html.contains("<style"));
        assert!(WIDGET_CSS.contains(".chatdock-root .chatdock-window{"));
    }

    #[test]
    fn untitled_card_skips_empty_title_and_repeated_text() {
        let card = CardData {
            description: Some("Blue mug".to_string()),
            price: Some("$12".to_string()),
            ..CardData::default()
        };
        let message = MessageView {
            id: MessageId::new(4),
            role: Role::Bot,
            body: MessageBody::Card {
                text: "Blue mug".to_string(),
                card,
            },
        };
        let html = render_html(&frame(Some(window(vec![message], false)), 0));

        assert!(!html.contains("chatdock-card-title"));
        assert_eq!(html.matches("Blue mug").count(), 1);
        assert!(html.contains(r#"<span class="chatdock-card-price">$12</span>"#));
    }

    #[test]
    fn text_is_escaped_everywhere() {
        let message = MessageView {
            id: MessageId::new(1),
            role: Role::User,
            body: MessageBody::Text("<script>alert('x')</script>".to_string()),
        };
        let html = render_html(&frame(Some(window(vec![message], false)), 0));

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(html.contains("Shop &lt;Bot&gt;"));
        assert!(html.contains("Ask &quot;anything&quot;"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn typing_row_and_disabled_input_while_sending() {
        let html = render_html(&frame(Some(window(Vec::new(), true)), 0));
        assert!(html.contains(r#"data-role="typing""#));
        assert!(html.contains(r#"placeholder="Ask &quot;anything&quot;" disabled>"#));
    }

    #[test]
    fn card_renders_panel_with_safe_link_only() {
        let card = CardData {
            title: "Trail Shoe".to_string(),
            description: Some("Light & fast".to_string()),
            price: Some("$89".to_string()),
            image_url: Some("https://cdn.example.com/shoe.png".to_string()),
            url: Some("https://shop.example.com/shoe".to_string()),
        };
        let message = MessageView {
            id: MessageId::new(2),
            role: Role::Bot,
            body: MessageBody::Card {
                text: "Trail Shoe".to_string(),
                card,
            },
        };
        let html = render_html(&frame(Some(window(vec![message], false)), 0));

        assert!(html.contains("chatdock-card"));
        assert!(html.contains("Light &amp; fast"));
        assert!(html.contains(r#"href="https://shop.example.com/shoe""#));
        assert!(html.contains(r#"src="https://cdn.example.com/shoe.png""#));
    }
}
