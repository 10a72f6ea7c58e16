//! Generation sessions: send a prompt, fold the framed reply into the
//! conversation as it arrives, and stop or fail without losing what streamed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use chatbox_core::{
    derive_title, ChatRequest, ConversationHandle, FrameEvent, FrameParser, Message,
    MessageStatus, ProtocolError, Utf8Decoder, DEFAULT_MODEL,
};

use crate::transport::Transport;

/// Shown in place of an answer that could not be produced.
pub const FAILURE_NOTICE: &str = "⚠️ Something went wrong while generating a response.";

const EVENT_CAPACITY: usize = 256;

/// How a generation session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The producer sent `[DONE]`.
    Completed,
    /// `stop()` was called, or the session was dropped.
    Cancelled,
    /// The producer sent `[ERROR] <diagnostic>`.
    UpstreamFailed(String),
    /// The request failed or the body broke off before `[DONE]`.
    TransportFailed(String),
}

/// Live notifications for whoever renders the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    Started {
        session: Uuid,
        conversation: Uuid,
        message: Uuid,
    },
    Delta {
        session: Uuid,
        message: Uuid,
        text: String,
    },
    Finished {
        session: Uuid,
        message: Uuid,
        outcome: GenerationOutcome,
    },
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub model: String,
    pub title_max_chars: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            title_max_chars: 30,
        }
    }
}

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
}

struct Shared<H> {
    handle: Arc<H>,
    transport: Arc<dyn Transport>,
    options: ControllerOptions,
    session: Mutex<Option<ActiveSession>>,
    generating: watch::Sender<bool>,
    events: broadcast::Sender<GenerationEvent>,
}

impl<H> Shared<H> {
    fn slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs at most one generation session at a time against a conversation owner.
pub struct ChatController<H> {
    shared: Arc<Shared<H>>,
}

impl<H> Clone for ChatController<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: ConversationHandle + 'static> ChatController<H> {
    pub fn new(handle: Arc<H>, transport: Arc<dyn Transport>, options: ControllerOptions) -> Self {
        let (generating, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                handle,
                transport,
                options,
                session: Mutex::new(None),
                generating,
                events,
            }),
        }
    }

    pub fn handle(&self) -> &Arc<H> {
        &self.shared.handle
    }

    pub fn is_generating(&self) -> bool {
        *self.shared.generating.borrow()
    }

    /// Watch the generating flag, e.g. to disable the send button.
    pub fn subscribe_generating(&self) -> watch::Receiver<bool> {
        self.shared.generating.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.shared.events.subscribe()
    }

    /// Submit `prompt` and stream the reply to completion.
    ///
    /// Returns `None` if the prompt was rejected: blank, no active
    /// conversation, or a session already running.
    pub async fn send(&self, prompt: &str) -> Option<GenerationOutcome> {
        Some(self.begin(prompt)?.run().await)
    }

    /// Append the prompt and an in-flight reply, and claim the session.
    ///
    /// Nothing is sent until [`Generation::run`] is awaited. Dropping the
    /// returned value releases the session.
    pub fn begin(&self, prompt: &str) -> Option<Generation<H>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        let mut slot = self.shared.slot();
        if slot.is_some() {
            debug!("Generation already in progress, ignoring prompt");
            return None;
        }

        let reply = Message::in_flight();
        let max_chars = self.shared.options.title_max_chars;
        let conversation = self.shared.handle.update_active(&mut |conv| {
            if !conv.has_user_message() {
                conv.title = derive_title(prompt, max_chars);
            }
            conv.push(Message::user(prompt));
            conv.push(reply.clone());
        })?;

        Some(self.open_session(&mut slot, conversation, reply.id, prompt.to_string()))
    }

    /// Ask again for the latest prompt of the active conversation.
    pub async fn regenerate(&self) -> Option<GenerationOutcome> {
        Some(self.begin_regenerate()?.run().await)
    }

    /// Reuse the most recent user message: everything after it is discarded
    /// and a fresh in-flight reply takes its place. The title is left alone.
    pub fn begin_regenerate(&self) -> Option<Generation<H>> {
        let mut slot = self.shared.slot();
        if slot.is_some() {
            debug!("Generation already in progress, ignoring regenerate");
            return None;
        }

        let reply = Message::in_flight();
        let mut prompt = None;
        let conversation = self.shared.handle.update_active(&mut |conv| {
            let Some(index) = conv.last_user_index() else {
                return;
            };
            prompt = Some(conv.messages[index].content.clone());
            conv.messages.truncate(index + 1);
            conv.push(reply.clone());
        })?;

        let prompt = prompt?;
        Some(self.open_session(&mut slot, conversation, reply.id, prompt))
    }

    fn open_session(
        &self,
        slot: &mut Option<ActiveSession>,
        conversation: Uuid,
        message: Uuid,
        prompt: String,
    ) -> Generation<H> {
        let session = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *slot = Some(ActiveSession {
            id: session,
            cancel: cancel.clone(),
        });
        self.shared.generating.send_replace(true);

        info!(%session, %conversation, %message, "Generation started");
        let _ = self.shared.events.send(GenerationEvent::Started {
            session,
            conversation,
            message,
        });
        self.shared.handle.checkpoint();

        Generation {
            guard: SessionGuard {
                shared: Arc::clone(&self.shared),
                session,
                conversation,
                message,
                outcome: GenerationOutcome::Cancelled,
            },
            prompt,
            cancel,
        }
    }

    /// Stop reading the current reply. What already streamed stays.
    ///
    /// No-op when nothing is running.
    pub fn stop(&self) {
        let Some(active) = self.shared.slot().take() else {
            return;
        };
        active.cancel.cancel();
        self.shared.generating.send_replace(false);
        info!(session = %active.id, "Generation stopped");
    }
}

/// One claimed generation session, ready to run.
pub struct Generation<H: ConversationHandle + 'static> {
    guard: SessionGuard<H>,
    prompt: String,
    cancel: CancellationToken,
}

impl<H: ConversationHandle + 'static> Generation<H> {
    pub fn session_id(&self) -> Uuid {
        self.guard.session
    }

    pub fn conversation_id(&self) -> Uuid {
        self.guard.conversation
    }

    /// Id of the in-flight assistant message this session writes into.
    pub fn message_id(&self) -> Uuid {
        self.guard.message
    }

    /// Send the request and fold the reply in until it ends or is stopped.
    pub async fn run(mut self) -> GenerationOutcome {
        let outcome = self.read_reply().await;
        self.guard.outcome = outcome.clone();
        outcome
    }

    #[instrument(skip(self), fields(session = %self.guard.session))]
    async fn read_reply(&self) -> GenerationOutcome {
        let shared = &self.guard.shared;
        let request = ChatRequest::new(self.prompt.as_str(), shared.options.model.as_str());

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return GenerationOutcome::Cancelled,
            opened = shared.transport.open(&request) => opened,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(e) => {
                warn!(session = %self.guard.session, error = %e, "Chat request failed");
                self.replace_content(FAILURE_NOTICE);
                return GenerationOutcome::TransportFailed(e.to_string());
            }
        };

        let mut utf8 = Utf8Decoder::new();
        let mut frames = FrameParser::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return GenerationOutcome::Cancelled,
                chunk = body.next() => chunk,
            };

            let text = match chunk {
                Some(Ok(bytes)) => utf8.decode(&bytes),
                Some(Err(e)) => {
                    warn!(session = %self.guard.session, error = %e, "Reply stream interrupted");
                    self.notice_if_empty();
                    return GenerationOutcome::TransportFailed(e.to_string());
                }
                None => {
                    let tail = utf8.finish();
                    if let Some(outcome) = self.apply(frames.push(&tail)) {
                        return outcome;
                    }
                    if let Some(e) = frames.finish() {
                        debug!(error = %e, "Discarding incomplete trailing frame");
                    }
                    warn!(session = %self.guard.session, "Reply stream closed before [DONE]");
                    self.notice_if_empty();
                    return GenerationOutcome::TransportFailed(
                        "stream closed before completion".to_string(),
                    );
                }
            };

            if let Some(outcome) = self.apply(frames.push(&text)) {
                return outcome;
            }
        }
    }

    /// Fold parsed frames into the in-flight message. Returns the outcome once
    /// a terminal frame is seen.
    fn apply(
        &self,
        events: Vec<Result<FrameEvent, ProtocolError>>,
    ) -> Option<GenerationOutcome> {
        for event in events {
            match event {
                Ok(FrameEvent::Token(token)) => {
                    if !self.append(&token) {
                        return Some(GenerationOutcome::Cancelled);
                    }
                }
                Ok(FrameEvent::Done) => return Some(GenerationOutcome::Completed),
                Ok(FrameEvent::Error(diagnostic)) => {
                    warn!(session = %self.guard.session, %diagnostic, "Producer reported an error");
                    self.replace_content(FAILURE_NOTICE);
                    return Some(GenerationOutcome::UpstreamFailed(diagnostic));
                }
                Ok(FrameEvent::Keepalive) => {}
                Err(e) => debug!(error = %e, "Skipping malformed frame"),
            }
        }
        None
    }

    /// Returns `false` once the conversation or message no longer exists.
    fn append(&self, token: &str) -> bool {
        let message = self.guard.message;
        let mut found = false;
        let exists = self.guard.shared.handle.update(self.guard.conversation, &mut |conv| {
            if let Some(m) = conv.message_mut(message) {
                m.content.push_str(token);
                found = true;
            }
        });
        if !(exists && found) {
            debug!(session = %self.guard.session, "In-flight message is gone, stopping");
            return false;
        }

        let _ = self.guard.shared.events.send(GenerationEvent::Delta {
            session: self.guard.session,
            message,
            text: token.to_string(),
        });
        true
    }

    fn replace_content(&self, text: &str) {
        self.edit_message(|m| {
            m.content.clear();
            m.content.push_str(text);
        });
    }

    fn notice_if_empty(&self) {
        self.edit_message(|m| {
            if m.content.is_empty() {
                m.content.push_str(FAILURE_NOTICE);
            }
        });
    }

    fn edit_message(&self, mut f: impl FnMut(&mut Message)) {
        let message = self.guard.message;
        self.guard.shared.handle.update(self.guard.conversation, &mut |conv| {
            if let Some(m) = conv.message_mut(message) {
                f(m);
            }
        });
    }
}

/// Closes the session however the generation ends, including when its future
/// is dropped mid-stream.
struct SessionGuard<H: ConversationHandle + 'static> {
    shared: Arc<Shared<H>>,
    session: Uuid,
    conversation: Uuid,
    message: Uuid,
    outcome: GenerationOutcome,
}

impl<H: ConversationHandle + 'static> Drop for SessionGuard<H> {
    fn drop(&mut self) {
        let message = self.message;
        self.shared.handle.update(self.conversation, &mut |conv| {
            if let Some(m) = conv.message_mut(message) {
                m.status = MessageStatus::Complete;
            }
        });

        let idle = {
            let mut slot = self.shared.slot();
            if slot.as_ref().is_some_and(|active| active.id == self.session) {
                *slot = None;
            }
            slot.is_none()
        };
        if idle {
            self.shared.generating.send_replace(false);
        }

        self.shared.handle.checkpoint();
        info!(session = %self.session, outcome = ?self.outcome, "Generation finished");
        let _ = self.shared.events.send(GenerationEvent::Finished {
            session: self.session,
            message: self.message,
            outcome: self.outcome.clone(),
        });
    }
}
