use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier for one message within a widget instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::System => "system",
        }
    }
}

/// How a message body is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Card,
}

/// Structured payload rendered as a product/info panel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CardData {
    /// Reads a backend card object. Accepts the alias spellings the backend
    /// has used over time and numeric prices. Any object carrying at least
    /// one recognized field is a card; a missing title stays empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| object.get(*key))
                .find_map(|value| match value {
                    Value::String(text) if !text.trim().is_empty() => {
                        Some(text.trim().to_string())
                    }
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
        };

        let card = Self {
            title: text(&["title", "name"]).unwrap_or_default(),
            description: text(&["description"]),
            price: text(&["price"]),
            image_url: text(&["imageUrl", "image"]),
            url: text(&["url", "link"]),
        };
        (card != Self::default()).then_some(card)
    }

    /// First readable line of the card: title, then description, then price.
    pub fn headline(&self) -> Option<&str> {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.price.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
    }
}

/// One entry of the append-only conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "structuredData", skip_serializing_if = "Option::is_none")]
    pub card: Option<CardData>,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl Message {
    pub fn text(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            kind: MessageKind::Text,
            content: content.into(),
            card: None,
            timestamp_ms: now_millis(),
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::text(id, Role::User, content)
    }

    pub fn bot(id: MessageId, content: impl Into<String>) -> Self {
        Self::text(id, Role::Bot, content)
    }

    pub fn card(id: MessageId, content: impl Into<String>, card: CardData) -> Self {
        Self {
            kind: MessageKind::Card,
            card: Some(card),
            ..Self::text(id, Role::Bot, content)
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn card_accepts_aliases_and_numeric_price() {
        let card = CardData::from_value(&json!({
            "title": "Trail Shoe",
            "price": 89.5,
            "image": "https://cdn.example.com/shoe.png",
            "link": "https://shop.example.com/shoe",
        }))
        .expect("card with title");

        assert_eq!(card.price.as_deref(), Some("89.5"));
        assert_eq!(
            card.image_url.as_deref(),
            Some("https://cdn.example.com/shoe.png")
        );
        assert_eq!(card.url.as_deref(), Some("https://shop.example.com/shoe"));
        assert_eq!(card.description, None);
    }

    #[test]
    fn card_needs_one_recognized_field() {
        let card = CardData::from_value(&json!({ "price": "10" })).expect("price-only card");
        assert_eq!(card.title, "");
        assert_eq!(card.headline(), Some("10"));

        assert_eq!(CardData::from_value(&json!({ "title": "  " })), None);
        assert_eq!(CardData::from_value(&json!({ "sku": "A-1" })), None);
        assert_eq!(CardData::from_value(&json!("Trail Shoe")), None);
    }

    #[test]
    fn message_serializes_with_widget_field_names() {
        let card = CardData {
            title: "Trail Shoe".to_string(),
            ..CardData::default()
        };
        let message = Message::card(MessageId::new(3), "Trail Shoe", card);
        let value = serde_json::to_value(&message).expect("serializable");

        assert_eq!(value["role"], "bot");
        assert_eq!(value["type"], "card");
        assert_eq!(value["structuredData"]["title"], "Trail Shoe");
        assert!(value["timestamp"].as_u64().is_some());
    }
}
