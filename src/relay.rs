use crate::completion::{extract_response_text, CompletionClient, CompletionError};
use crate::config::AppConfig;
use crate::slack::{MessageEvent, OutboundReply, SlackClient, SlackError};
use anyhow::Result;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

pub const DISCLAIMER: &str = "⚠️ Not legal advice. Consult compliance before acting.";
pub const FALLBACK_REPLY: &str =
    "I couldn't generate a response. Please escalate to Compliance/Legal.";
pub const INTERNAL_ERROR_REPLY: &str = "LegalBot hit an internal error generating a response. Please try again or escalate to Compliance/Legal.";

pub const SYSTEM_INSTRUCTION: &str = "\
You are LegalBot, an internal legal/compliance assistant for a telehealth clinic.

Rules:
- Provide general informational guidance only (not legal advice).
- If high-risk (lawsuit/subpoena/DEA/state board complaint/HIPAA breach/termination),
  do not advise and instruct escalation to Compliance/Legal.
- Be concise, practical, and structured (bullets when helpful).
- If unclear, ask 1-2 clarifying questions.
";

/// Every outbound message starts with the disclaimer and a blank line.
pub fn with_disclaimer(body: &str) -> String {
    format!("{DISCLAIMER}\n\n{body}")
}

/// Terminal state of one reply pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Delivered,
    FallbackNotified,
    FallbackFailed,

    /// Delivery failed and fallback notification is disabled.
    FallbackSkipped,
}

#[derive(Clone)]
pub struct Relay {
    completion: CompletionClient,
    slack: SlackClient,
    notify_on_delivery_failure: bool,

    #[cfg(test)]
    faults: Faults,
}

/// Panics injected into the pipeline stages by tests.
#[cfg(test)]
#[derive(Clone, Copy, Default)]
struct Faults {
    panic_in_answer: bool,
    panic_in_notice: bool,
}

impl Relay {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            completion: CompletionClient::new(
                &config.completion,
                &config.credentials.openai_api_key,
            )?,
            slack: SlackClient::new(&config.slack, &config.credentials.slack_bot_token)?,
            notify_on_delivery_failure: config.reply.notify_on_delivery_failure,

            #[cfg(test)]
            faults: Faults::default(),
        })
    }

    /// Detaches processing of an Events API body. The task does nothing, filtering included,
    /// until `acknowledged` resolves (or its sender is dropped), so no outbound call can
    /// precede the HTTP acknowledgement.
    pub fn dispatch(
        &self,
        body: Value,
        acknowledged: oneshot::Receiver<()>,
    ) -> JoinHandle<Option<ReplyOutcome>> {
        let relay = self.clone();
        let span = info_span!("delivery", id = %Uuid::new_v4());

        tokio::spawn(
            async move {
                // A dropped sender also means the response is gone.
                let _ = acknowledged.await;

                let event = match MessageEvent::from_envelope(&body) {
                    Ok(event) => event,
                    Err(reason) => {
                        debug!("Ignoring event: {reason}");
                        return None;
                    }
                };
                Some(relay.process(&event).await)
            }
            .instrument(span),
        )
    }

    /// Runs the reply pipeline for one accepted message. A delivery failure or a panic in
    /// answering or delivering leads to at most one internal-error notice.
    #[instrument(skip_all, fields(channel = %event.channel, thread_ts = event.ts.as_deref().unwrap_or("-")))]
    pub async fn process(&self, event: &MessageEvent) -> ReplyOutcome {
        match AssertUnwindSafe(self.answer_and_deliver(event))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                info!("Reply delivered");
                return ReplyOutcome::Delivered;
            }
            Ok(Err(e)) => {
                error!("Failed to deliver reply: {e}");
                if !self.notify_on_delivery_failure {
                    return ReplyOutcome::FallbackSkipped;
                }
            }
            Err(panic) => error!("Reply pipeline panicked: {}", panic_message(&*panic)),
        }

        self.notify_internal_error(event).await
    }

    async fn answer_and_deliver(&self, event: &MessageEvent) -> Result<(), SlackError> {
        #[cfg(test)]
        if self.faults.panic_in_answer {
            panic!("injected answer failure");
        }

        let answer = self.generate_answer(&event.text).await;
        let reply = Self::reply_to(event, with_disclaimer(&answer));
        self.slack.post_message(&reply).await
    }

    /// Answer text without the disclaimer. Never fails: every upstream problem is logged and
    /// replaced by [`FALLBACK_REPLY`].
    async fn generate_answer(&self, user_text: &str) -> String {
        let payload = match self.completion.complete(SYSTEM_INSTRUCTION, user_text).await {
            Ok(payload) => payload,

            // The document may still carry usable text alongside the error.
            Err(CompletionError::Upstream(payload)) => {
                error!("Completion API reported an error: {}", payload["error"]);
                payload
            }
            Err(CompletionError::Status { status, payload }) => {
                error!("Completion API returned status {status} with payload: {payload}");
                return FALLBACK_REPLY.to_string();
            }
            Err(e) => {
                error!("Completion request failed: {e}");
                return FALLBACK_REPLY.to_string();
            }
        };

        extract_response_text(&payload).unwrap_or_else(|| {
            warn!("Completion response contained no usable text: {payload}");
            FALLBACK_REPLY.to_string()
        })
    }

    /// Single best-effort notice into the originating thread, never retried. A panic while
    /// posting it counts as a failed notice.
    async fn notify_internal_error(&self, event: &MessageEvent) -> ReplyOutcome {
        match AssertUnwindSafe(self.post_notice(event)).catch_unwind().await {
            Ok(Ok(())) => {
                info!("Internal error notice delivered");
                ReplyOutcome::FallbackNotified
            }
            Ok(Err(e)) => {
                error!("Failed to post internal error notice: {e}");
                ReplyOutcome::FallbackFailed
            }
            Err(panic) => {
                error!("Internal error notice panicked: {}", panic_message(&*panic));
                ReplyOutcome::FallbackFailed
            }
        }
    }

    async fn post_notice(&self, event: &MessageEvent) -> Result<(), SlackError> {
        #[cfg(test)]
        if self.faults.panic_in_notice {
            panic!("injected notice failure");
        }

        let notice = Self::reply_to(event, with_disclaimer(INTERNAL_ERROR_REPLY));
        self.slack.post_message(&notice).await
    }

    fn reply_to(event: &MessageEvent, text: String) -> OutboundReply {
        OutboundReply {
            channel: event.channel.clone(),
            text,
            thread_ts: event.ts.clone(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
