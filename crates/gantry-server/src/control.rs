//! Control-queue worker: `Connect`/`Release` admission traffic.
//!
//! Identity on the control channel is the transport reply address — that is
//! what a grant attaches authority to. The minted session token then rides
//! on every command/data request.

use crate::broker::{ReplyPublisher, StreamConsumer};
use crate::error::{ServerError, ServerResult};
use crate::gatekeeper::{ConnectOutcome, ReleaseOutcome, SessionGate};
use gantry_protocol::{ControlCommand, ControlReply, Envelope, Reply};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A reply queued for publishing, with its destination stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outbound {
    pub to: String,
    pub reply: Reply,
}

/// Replies owed for a `Connect` outcome.
pub(crate) fn connect_replies(envelope: &Envelope, outcome: &ConnectOutcome) -> Vec<Outbound> {
    match outcome {
        ConnectOutcome::Granted(token) => vec![Outbound {
            to: envelope.reply_to.clone(),
            reply: Reply::correlated(
                envelope.correlation_id.clone(),
                ControlReply::Connected.as_str(),
            )
            .with_token(token.clone()),
        }],
        ConnectOutcome::AlreadyConnected => vec![Outbound {
            to: envelope.reply_to.clone(),
            reply: Reply::correlated(
                envelope.correlation_id.clone(),
                ControlReply::AlreadyConnected.as_str(),
            ),
        }],
        ConnectOutcome::Queued => vec![Outbound {
            to: envelope.reply_to.clone(),
            reply: Reply::correlated(
                envelope.correlation_id.clone(),
                ControlReply::Queued.as_str(),
            ),
        }],
    }
}

/// Replies owed for a `Release` outcome.
///
/// A promotion grants the waiter unsolicited: no correlation identifier,
/// fresh token attached.
pub(crate) fn release_replies(envelope: &Envelope, outcome: &ReleaseOutcome) -> Vec<Outbound> {
    match outcome {
        ReleaseOutcome::Released { promoted } => {
            let mut replies = vec![Outbound {
                to: envelope.reply_to.clone(),
                reply: Reply::correlated(
                    envelope.correlation_id.clone(),
                    ControlReply::Released.as_str(),
                ),
            }];
            if let Some(grant) = promoted {
                replies.push(Outbound {
                    to: grant.identity.clone(),
                    reply: Reply::unsolicited(ControlReply::Connected.as_str())
                        .with_token(grant.token.clone()),
                });
            }
            replies
        }
        // No state change and no reply; the attempt is only logged
        ReleaseOutcome::NotConnected => vec![],
    }
}

/// Worker task draining the control stream.
pub struct ControlWorker {
    consumer: StreamConsumer,
    publisher: ReplyPublisher,
    gate: SessionGate,
}

impl ControlWorker {
    /// Create a worker. `consumer` must be bound to the control stream.
    pub fn new(consumer: StreamConsumer, publisher: ReplyPublisher, gate: SessionGate) -> Self {
        Self {
            consumer,
            publisher,
            gate,
        }
    }

    /// Run the admission loop.
    pub async fn run(&mut self) -> ServerResult<()> {
        info!("Gatekeeper started");

        loop {
            if let Err(e) = self.process_one().await {
                error!(error = %e, "Error processing control message");

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

    /// Process one control message: read, transition the gate, publish the
    /// owed replies, then ack.
    async fn process_one(&mut self) -> ServerResult<()> {
        let delivery = match self.consumer.read_next().await? {
            Some(delivery) => delivery,
            None => {
                debug!("No control messages available, continuing to poll...");
                return Ok(());
            }
        };

        let outbound = match Envelope::from_fields(delivery.field_refs()) {
            Ok(envelope) => match ControlCommand::parse(&envelope.body) {
                Ok(ControlCommand::Connect) => {
                    let outcome = self.gate.connect(&envelope.reply_to).await;
                    info!(client = %envelope.reply_to, outcome = outcome_label(&outcome), "Connect");
                    connect_replies(&envelope, &outcome)
                }
                Ok(ControlCommand::Release) => {
                    let outcome = self.gate.release(&envelope.reply_to).await;
                    match &outcome {
                        ReleaseOutcome::Released { promoted } => {
                            info!(
                                client = %envelope.reply_to,
                                promoted = promoted.as_ref().map(|g| g.identity.as_str()),
                                "Released"
                            );
                        }
                        ReleaseOutcome::NotConnected => {
                            warn!(client = %envelope.reply_to, "Release from unconnected client ignored");
                        }
                    }
                    release_replies(&envelope, &outcome)
                }
                Err(e) => {
                    warn!(client = %envelope.reply_to, error = %e, "Unknown control message");
                    vec![]
                }
            },
            Err(e) => {
                warn!(
                    entry_id = %delivery.entry_id,
                    error = %e,
                    "Dropping control entry without envelope fields"
                );
                vec![]
            }
        };

        for Outbound { to, reply } in &outbound {
            self.publisher.publish(to, reply).await?;
        }

        // Ack strictly after the reply publishes
        self.consumer.ack(&delivery.entry_id).await?;

        Ok(())
    }
}

fn outcome_label(outcome: &ConnectOutcome) -> &'static str {
    match outcome {
        ConnectOutcome::Granted(_) => "granted",
        ConnectOutcome::AlreadyConnected => "already connected",
        ConnectOutcome::Queued => "queued",
    }
}
