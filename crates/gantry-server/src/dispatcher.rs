//! Request dispatch for subsystem queues.
//!
//! One worker per subsystem queue (commands, data) drains its stream with a
//! flow-control window of one. The queue pair shares its subsystem's
//! dispatcher behind an async mutex, so no two handler executions for the
//! same subsystem ever overlap. Authorization happens before the body is
//! ever parsed; every per-request failure becomes a response, never a dead
//! loop.

use crate::broker::{ReplyPublisher, StreamConsumer};
use crate::error::{ServerError, ServerResult};
use crate::gatekeeper::SessionGate;
use crate::registry::CommandRegistry;
use gantry_protocol::{status, CommandRequest, Envelope, Reply};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Which of a subsystem's two queues a worker is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Mutating operations.
    Commands,
    /// Read-only telemetry.
    Data,
}

/// A subsystem's dispatcher, shared between its two queue workers.
pub type SharedDispatcher<S> = Arc<Mutex<Dispatcher<S>>>;

/// Per-subsystem dispatch: the two registries plus the controller state they
/// act on. The commands and data workers take turns through the mutex.
pub struct Dispatcher<S> {
    operations: CommandRegistry<S>,
    telemetry: CommandRegistry<S>,
    state: S,
}

impl<S> Dispatcher<S> {
    /// Create a dispatcher over the given registries and state.
    pub fn new(operations: CommandRegistry<S>, telemetry: CommandRegistry<S>, state: S) -> Self {
        Self {
            operations,
            telemetry,
            state,
        }
    }

    /// Wrap for sharing between the subsystem's queue workers.
    pub fn into_shared(self) -> SharedDispatcher<S> {
        Arc::new(Mutex::new(self))
    }

    /// Decide the reply for one request.
    ///
    /// Always produces a reply value; handler and parse failures are
    /// rendered as status strings.
    pub async fn dispatch(
        &mut self,
        gate: &SessionGate,
        channel: Channel,
        envelope: &Envelope,
    ) -> Value {
        if !gate.authorize(envelope.token.as_deref()).await {
            warn!(reply_to = %envelope.reply_to, "Rejected request from non-active client");
            return Value::String(status::UNAUTHORIZED_CLIENT.to_string());
        }

        let request = match CommandRequest::from_json(&envelope.body) {
            Ok(request) => request,
            Err(e) => {
                warn!(reply_to = %envelope.reply_to, error = %e, "Unparseable request body");
                return Value::String(status::malformed_request(e));
            }
        };

        let Self {
            operations,
            telemetry,
            state,
        } = self;
        let registry = match channel {
            Channel::Commands => operations,
            Channel::Data => telemetry,
        };

        match registry.get(&request.command) {
            None => {
                debug!(command = %request.command, channel = %registry.channel(), "Unknown command");
                Value::String(status::UNKNOWN_COMMAND.to_string())
            }
            Some(handler) => match handler(state, &request.args) {
                Ok(None) => Value::String(status::COMMAND_EXECUTED.to_string()),
                Ok(Some(value)) => value,
                Err(e) => {
                    warn!(command = %request.command, error = %e, "Handler failed");
                    Value::String(status::handler_failure(e))
                }
            },
        }
    }
}

/// Worker task draining one subsystem queue.
pub struct QueueWorker<S> {
    channel: Channel,
    consumer: StreamConsumer,
    publisher: ReplyPublisher,
    gate: SessionGate,
    dispatcher: SharedDispatcher<S>,
}

impl<S> QueueWorker<S> {
    /// Create a worker. `consumer` must be bound to the queue's stream;
    /// `dispatcher` is shared with the subsystem's other queue worker.
    pub fn new(
        channel: Channel,
        consumer: StreamConsumer,
        publisher: ReplyPublisher,
        gate: SessionGate,
        dispatcher: SharedDispatcher<S>,
    ) -> Self {
        Self {
            channel,
            consumer,
            publisher,
            gate,
            dispatcher,
        }
    }

    /// Run the dispatch loop.
    ///
    /// Per-entry failures are logged and survived; broker errors trigger a
    /// reconnect with backoff.
    pub async fn run(&mut self) -> ServerResult<()> {
        info!(queue = %self.consumer.stream(), "Queue worker started");

        loop {
            if let Err(e) = self.process_one().await {
                error!(queue = %self.consumer.stream(), error = %e, "Error processing request");

                match &e {
                    ServerError::Redis(_) => {
                        warn!("Redis error, attempting to reconnect...");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        if let Err(reconnect_err) = self.consumer.reconnect().await {
                            error!(error = %reconnect_err, "Failed to reconnect to Redis");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                    _ => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    }

    /// Process one entry: read, dispatch, reply, then ack.
    async fn process_one(&mut self) -> ServerResult<()> {
        let delivery = match self.consumer.read_next().await? {
            Some(delivery) => delivery,
            None => {
                debug!(queue = %self.consumer.stream(), "No requests available, continuing to poll...");
                return Ok(());
            }
        };

        let envelope = match Envelope::from_fields(delivery.field_refs()) {
            Ok(envelope) => envelope,
            Err(e) => {
                // No reply address to answer to; drop the entry
                warn!(
                    queue = %self.consumer.stream(),
                    entry_id = %delivery.entry_id,
                    error = %e,
                    "Dropping entry without envelope fields"
                );
                self.consumer.ack(&delivery.entry_id).await?;
                return Ok(());
            }
        };

        let reply_value = {
            let mut dispatcher = self.dispatcher.lock().await;
            dispatcher.dispatch(&self.gate, self.channel, &envelope).await
        };
        let body =
            serde_json::to_string(&reply_value).map_err(|e| ServerError::Protocol(e.to_string()))?;

        self.publisher
            .publish(
                &envelope.reply_to,
                &Reply::correlated(envelope.correlation_id.clone(), body),
            )
            .await?;

        // Ack strictly after the reply publish; a crash in between means
        // redelivery, not a lost request
        self.consumer.ack(&delivery.entry_id).await?;

        Ok(())
    }
}
