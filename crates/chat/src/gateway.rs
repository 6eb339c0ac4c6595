use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use brewbot_core::errors::{ApplicationError, InterfaceError};
use brewbot_core::retry::{retry_with_backoff, BackoffPolicy};

use crate::events::{
    default_dispatcher, DispatchError, EventContext, EventDispatcher, EventHandlerError,
    GatewayEnvelope, GatewayEvent, HandlerResult,
};
use crate::replies::{self, Reply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway ack failed: {0}")]
    Acknowledge(String),
    #[error("gateway reply failed: {0}")]
    Respond(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

/// Connection to the chat platform's event gateway.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly.
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn respond(&self, envelope_id: &str, reply: &Reply) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn respond(&self, _envelope_id: &str, _reply: &Reply) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps gateway events into the dispatcher and writes replies back.
/// Transport failures reconnect with backoff; exhaustion is logged, never
/// propagated.
pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: BackoffPolicy,
}

impl Default for GatewayRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopGatewayTransport),
            dispatcher: default_dispatcher(),
            reconnect_policy: BackoffPolicy::default(),
        }
    }
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: BackoffPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let outcome = retry_with_backoff(&self.reconnect_policy, "gateway.connect", |attempt| {
            self.connect_and_pump(attempt)
        })
        .await;

        if let Err(error) = outcome {
            warn!(
                event_name = "ingress.gateway.retries_exhausted",
                max_attempts = self.reconnect_policy.max_attempts,
                error = %error,
                "gateway retries exhausted; continuing process without crash"
            );
        }
        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.transport.connect().await?;
        info!(attempt, "gateway connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let user_id = invoking_user(&envelope);

            info!(
                event_name = "ingress.gateway.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                user_id = user_id.unwrap_or("unknown"),
                "received gateway envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.gateway.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge gateway envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.gateway.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged gateway envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            let reply = match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(reply)) => Some(reply),
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => None,
                Err(error) => {
                    warn!(
                        event_name = "ingress.gateway.dispatch_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        user_id = user_id.unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing gateway loop"
                    );
                    Some(error_reply(error, &context.correlation_id))
                }
            };

            if let Some(reply) = reply {
                if let Err(error) = self.transport.respond(&envelope.envelope_id, &reply).await {
                    warn!(
                        event_name = "egress.gateway.reply_failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "failed to deliver command reply"
                    );
                }
            }
        }
    }
}

fn invoking_user(envelope: &GatewayEnvelope) -> Option<&str> {
    match &envelope.event {
        GatewayEvent::SlashCommand(payload) => Some(payload.user_id.as_str()),
        GatewayEvent::Ready { .. } | GatewayEvent::Unsupported { .. } => None,
    }
}

fn error_reply(error: DispatchError, correlation_id: &str) -> Reply {
    let interface = match error {
        DispatchError::Handler(EventHandlerError::Parse(parse)) => InterfaceError::BadRequest {
            message: parse.to_string(),
            correlation_id: correlation_id.to_owned(),
        },
        DispatchError::Handler(EventHandlerError::Route(route)) => {
            ApplicationError::Integration(route.to_string()).into_interface(correlation_id)
        }
    };
    replies::interface_error(&interface)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use brewbot_core::retry::BackoffPolicy;
    use tokio::sync::Mutex;

    use super::{GatewayRunner, GatewayTransport, TransportError};
    use crate::commands::SlashCommandPayload;
    use crate::events::{default_dispatcher, EventDispatcher, GatewayEnvelope, GatewayEvent};
    use crate::replies::{self, Reply};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<GatewayEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        replies: Vec<(String, Reply)>,
        disconnect_calls: usize,
        fail_acks: bool,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<GatewayEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn replies(&self) -> Vec<(String, Reply)> {
            self.state.lock().await.replies.clone()
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            if state.fail_acks {
                return Err(TransportError::Acknowledge("ack rejected".to_owned()));
            }
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn respond(&self, envelope_id: &str, reply: &Reply) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.replies.push((envelope_id.to_owned(), reply.clone()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn slash(envelope_id: &str, command: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: GatewayEvent::SlashCommand(SlashCommandPayload {
                command: command.to_owned(),
                user_id: "U1".to_owned(),
                channel_id: "C1".to_owned(),
                request_id: envelope_id.to_owned(),
                ..SlashCommandPayload::default()
            }),
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(GatewayEnvelope {
                    envelope_id: "env-1".to_owned(),
                    event: GatewayEvent::Unsupported { event_type: "typing_start".to_owned() },
                })),
                Ok(None),
            ],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            BackoffPolicy::no_delay(3),
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert!(transport.replies().await.is_empty());
        assert_eq!(transport.state.lock().await.disconnect_calls, 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            BackoffPolicy::no_delay(3),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn command_replies_are_written_back_to_the_envelope() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(slash("env-help", "/help"))), Ok(Some(slash("env-bad", "/weather")))],
        ));

        let runner =
            GatewayRunner::new(transport.clone(), default_dispatcher(), BackoffPolicy::no_delay(1));
        runner.start().await.expect("runner");

        let replies = transport.replies().await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], ("env-help".to_owned(), replies::help_message()));
        assert_eq!(replies[1].0, "env-bad");
        assert!(replies[1].1.ephemeral);
        assert!(replies[1].1.content.contains("could not be processed"));
    }

    #[tokio::test]
    async fn read_errors_mid_stream_trigger_reconnect() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![
                Ok(Some(slash("env-1", "/help"))),
                Err(TransportError::Receive("socket reset".to_owned())),
                Ok(Some(slash("env-2", "/help"))),
                Ok(None),
            ],
        ));

        let runner =
            GatewayRunner::new(transport.clone(), default_dispatcher(), BackoffPolicy::no_delay(3));
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
    }

    #[tokio::test]
    async fn failed_acks_still_dispatch_and_reply() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(slash("env-help", "/help"))), Ok(None)],
        ));
        transport.state.lock().await.fail_acks = true;

        let runner =
            GatewayRunner::new(transport.clone(), default_dispatcher(), BackoffPolicy::no_delay(1));
        runner.start().await.expect("runner");

        assert!(transport.acknowledgements().await.is_empty());
        assert_eq!(transport.replies().await, vec![("env-help".to_owned(), replies::help_message())]);
    }
}
