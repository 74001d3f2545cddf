mod exchange;
mod message;
mod reply;

pub use exchange::{
    ComposerAction, ExchangeRejection, ExchangeState, FALLBACK_REPLY, MessageExchange,
    PendingRequest, RequestContext, RequestTicket, composer_action,
};
pub use message::{CardData, Message, MessageId, MessageKind, Role};
pub(crate) use message::now_millis;
pub use reply::parse_chat_response;
