use serde_json::Value;
use snafu::{ResultExt, ensure};

use super::message::CardData;
use crate::transport::{
    ChatReply, DecodeSnafu, RejectedSnafu, StatusSnafu, TransportError, TransportResult,
};

const CARD_KEYS: &[&str] = &["structuredData", "card", "product"];

/// Classifies a chat endpoint response.
///
/// A card is taken from the first structured payload with any recognized
/// field; everything else is plain text. An untitled card borrows the reply
/// text as its title, and a card-only reply uses the card headline as its
/// text so the transcript always has something to read.
pub fn parse_chat_response(status: u16, body: &str) -> TransportResult<ChatReply> {
    ensure!(
        (200..300).contains(&status),
        StatusSnafu {
            stage: "chat-http-status",
            status,
            body: body.to_string(),
        }
    );

    let value: Value = serde_json::from_str(body).context(DecodeSnafu {
        stage: "decode-chat-response",
    })?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let details = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("success flag was false")
            .to_string();
        return RejectedSnafu {
            stage: "chat-success-flag",
            details,
        }
        .fail();
    }

    let text = reply_text(&value);
    let card = CARD_KEYS
        .iter()
        .filter_map(|key| value.get(*key))
        .find(|candidate| candidate.is_object())
        .and_then(CardData::from_value);

    match (text, card) {
        (Some(text), Some(mut card)) => {
            if card.title.is_empty() {
                card.title = text.clone();
            }
            Ok(ChatReply::card(text, card))
        }
        (Some(text), None) => Ok(ChatReply::text(text)),
        (None, Some(card)) => {
            let text = card.headline().unwrap_or_default().to_string();
            Ok(ChatReply::card(text, card))
        }
        (None, None) => Err(TransportError::Rejected {
            stage: "chat-reply-shape",
            details: "response carried neither reply text nor a card".to_string(),
        }),
    }
}

fn reply_text(value: &Value) -> Option<String> {
    [
        value.get("reply"),
        value.get("message"),
        value.get("aiMessage").and_then(|message| message.get("content")),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|text| !text.is_empty())
    .map(str::to_string)
}
