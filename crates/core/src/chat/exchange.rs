use super::message::{Message, MessageId};
use crate::bridge::PageContext;
use crate::transport::{ChatReply, ChatRequest, TransportResult};

/// Fixed wording appended once for every failed send.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble connecting right now. Please try again in a moment.";

/// Identifier of the single outstanding chat request.
///
/// Changes on every submit so a late completion for an earlier request is
/// rejected instead of being applied twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    Sending(RequestTicket),
}

/// Why a submit or completion was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeRejection {
    EmptyInput,
    RequestOutstanding { active: RequestTicket },
    NoActiveRequest,
    StaleTicket {
        active: RequestTicket,
        attempted: RequestTicket,
    },
}

/// Per-request data the exchange does not own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub session_id: String,
    pub workspace_id: Option<String>,
    pub page_context: Option<PageContext>,
}

/// A request the driver must send, then hand back to
/// [`MessageExchange::complete`] with its ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub request: ChatRequest,
}

/// What a key press in the composer should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerAction {
    Submit,
    InsertNewline,
    Ignore,
}

/// Enter submits, Shift+Enter falls through to a newline. Keys pressed while
/// an IME composition is active never submit.
pub fn composer_action(key: &str, shift: bool, composing: bool) -> ComposerAction {
    match key {
        "Enter" if composing => ComposerAction::Ignore,
        "Enter" if shift => ComposerAction::InsertNewline,
        "Enter" => ComposerAction::Submit,
        _ => ComposerAction::Ignore,
    }
}

/// Message list plus the `Idle | Sending` request cycle.
#[derive(Debug, Clone, Default)]
pub struct MessageExchange {
    messages: Vec<Message>,
    state: ExchangeState,
    draft: String,
    next_message_id: u64,
    next_ticket: u64,
    revision: u64,
}

impl MessageExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_typing(&self) -> bool {
        matches!(self.state, ExchangeState::Sending(_))
    }

    pub fn input_enabled(&self) -> bool {
        !self.is_typing()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Bumped on every message-list mutation; views scroll to the end when it
    /// changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn append_bot_text(&mut self, content: impl Into<String>) -> MessageId {
        let id = self.allocate_message_id();
        self.push(Message::bot(id, content));
        id
    }

    /// Sends the current draft, clearing it only when the submit is accepted.
    pub fn submit_draft(
        &mut self,
        context: RequestContext,
    ) -> Result<PendingRequest, ExchangeRejection> {
        let draft = std::mem::take(&mut self.draft);
        let result = self.submit(&draft, context);
        if result.is_err() {
            self.draft = draft;
        }
        result
    }

    pub fn submit(
        &mut self,
        text: &str,
        context: RequestContext,
    ) -> Result<PendingRequest, ExchangeRejection> {
        if let ExchangeState::Sending(active) = self.state {
            return Err(ExchangeRejection::RequestOutstanding { active });
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(ExchangeRejection::EmptyInput);
        }

        self.next_ticket += 1;
        let ticket = RequestTicket(self.next_ticket);
        let id = self.allocate_message_id();
        self.push(Message::user(id, text));
        self.state = ExchangeState::Sending(ticket);

        tracing::debug!(ticket = ticket.raw(), "chat request started");
        Ok(PendingRequest {
            ticket,
            request: ChatRequest {
                message: text.to_string(),
                session_id: context.session_id,
                workspace_id: context.workspace_id,
                page_context: context.page_context,
            },
        })
    }

    /// Applies the outcome of the outstanding request and returns to `Idle`.
    ///
    /// Failures of any kind append exactly one fallback bot message.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: TransportResult<ChatReply>,
    ) -> Result<&Message, ExchangeRejection> {
        match self.state {
            ExchangeState::Sending(active) if active == ticket => {}
            ExchangeState::Sending(active) => {
                return Err(ExchangeRejection::StaleTicket {
                    active,
                    attempted: ticket,
                });
            }
            ExchangeState::Idle => return Err(ExchangeRejection::NoActiveRequest),
        }

        self.state = ExchangeState::Idle;
        let id = self.allocate_message_id();
        let message = match outcome {
            Ok(ChatReply {
                text,
                card: Some(card),
            }) => Message::card(id, text, card),
            Ok(ChatReply { text, card: None }) => Message::bot(id, text),
            Err(error) => {
                tracing::warn!(error = %error, ticket = ticket.raw(), "chat request failed");
                Message::bot(id, FALLBACK_REPLY)
            }
        };
        self.push(message);

        self.messages
            .last()
            .ok_or(ExchangeRejection::NoActiveRequest)
    }

    fn allocate_message_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        MessageId::new(self.next_message_id)
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.revision += 1;
    }
}
