//! Test harness for the broker integration tests.
//!
//! Provides:
//! - MockBroker: in-memory streams with pending/ack bookkeeping
//! - ControlSim / QueueSim / SubsystemSim: drive the gatekeeper and
//!   dispatcher against MockBroker exactly the way the workers do (one
//!   consumer per stream, reply published before ack)
//! - SimClient: builds envelopes the way the client stub does

use crate::control::{connect_replies, release_replies};
use crate::dispatcher::{Channel, Dispatcher, SharedDispatcher};
use crate::gatekeeper::SessionGate;
use gantry_protocol::{streams, CommandRequest, ControlCommand, ControlReply, Envelope, Reply};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use uuid::Uuid;

/// An entry sitting in a mock request stream.
#[derive(Debug, Clone)]
pub struct MockEntry {
    pub entry_id: String,
    pub envelope: Envelope,
}

/// In-memory stand-in for the Redis Streams topology.
#[derive(Default)]
pub struct MockBroker {
    streams: Mutex<HashMap<String, VecDeque<MockEntry>>>,
    pending: Mutex<Vec<(String, String)>>,
    ack_log: Mutex<Vec<(String, String)>>,
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    publish_log: Mutex<Vec<(String, Reply)>>,
    next_id: AtomicU64,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to a request stream (XADD).
    pub fn xadd(&self, stream: &str, envelope: Envelope) -> String {
        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let entry_id = format!("{id}-0");

        self.streams
            .lock()
            .unwrap()
            .entry(stream.to_string())
            .or_default()
            .push_back(MockEntry {
                entry_id: entry_id.clone(),
                envelope,
            });

        entry_id
    }

    /// Pop the next entry off one stream (XREADGROUP COUNT=1 against a
    /// single bound stream). Moves the entry to the pending list.
    pub fn read_next(&self, stream: &str) -> Option<MockEntry> {
        let mut streams = self.streams.lock().unwrap();
        let entry = streams.get_mut(stream)?.pop_front()?;
        self.pending
            .lock()
            .unwrap()
            .push((stream.to_string(), entry.entry_id.clone()));
        Some(entry)
    }

    /// Acknowledge an entry (XACK).
    pub fn ack(&self, stream: &str, entry_id: &str) -> bool {
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending
            .iter()
            .position(|(s, id)| s == stream && id == entry_id)
        {
            pending.remove(pos);
            self.ack_log
                .lock()
                .unwrap()
                .push((stream.to_string(), entry_id.to_string()));
            true
        } else {
            false
        }
    }

    /// Publish a reply onto a reply stream.
    pub fn publish(&self, to: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(to.to_string())
            .or_default()
            .push(reply.clone());
        self.publish_log
            .lock()
            .unwrap()
            .push((to.to_string(), reply));
    }

    /// All replies delivered to a reply stream, in order.
    pub fn replies(&self, to: &str) -> Vec<Reply> {
        self.replies.lock().unwrap().get(to).cloned().unwrap_or_default()
    }

    /// Ordered log of (stream, entry_id) acks.
    pub fn ack_log(&self) -> Vec<(String, String)> {
        self.ack_log.lock().unwrap().clone()
    }

    /// Ordered log of every reply publish.
    pub fn publish_log(&self) -> Vec<(String, Reply)> {
        self.publish_log.lock().unwrap().clone()
    }

    /// Delivered-but-unacked entry count.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

/// Drives the gatekeeper against the mock broker the way ControlWorker does.
pub struct ControlSim {
    pub stream: String,
}

impl ControlSim {
    pub fn new() -> Self {
        Self {
            stream: streams::control_stream("gmq"),
        }
    }

    /// Process one control message. Returns false when the stream is empty.
    pub async fn process_one(&self, broker: &MockBroker, gate: &SessionGate) -> bool {
        let Some(entry) = broker.read_next(&self.stream) else {
            return false;
        };
        let envelope = entry.envelope;

        let outbound = match ControlCommand::parse(&envelope.body) {
            Ok(ControlCommand::Connect) => {
                let outcome = gate.connect(&envelope.reply_to).await;
                connect_replies(&envelope, &outcome)
            }
            Ok(ControlCommand::Release) => {
                let outcome = gate.release(&envelope.reply_to).await;
                release_replies(&envelope, &outcome)
            }
            Err(_) => vec![],
        };

        for out in outbound {
            broker.publish(&out.to, out.reply);
        }
        broker.ack(&self.stream, &entry.entry_id);
        true
    }

    /// Process until the control stream is empty.
    pub async fn drain(&self, broker: &MockBroker, gate: &SessionGate) {
        while self.process_one(broker, gate).await {}
    }
}

/// Drives one queue worker against the mock broker the way QueueWorker does:
/// one consumer per stream, dispatcher shared with the sibling queue.
pub struct QueueSim<S> {
    pub stream: String,
    channel: Channel,
    dispatcher: SharedDispatcher<S>,
}

impl<S> QueueSim<S> {
    /// Process one request. Returns false when the queue is empty.
    pub async fn process_one(&self, broker: &MockBroker, gate: &SessionGate) -> bool {
        let Some(entry) = broker.read_next(&self.stream) else {
            return false;
        };

        let reply_value = {
            let mut dispatcher = self.dispatcher.lock().await;
            dispatcher.dispatch(gate, self.channel, &entry.envelope).await
        };
        broker.publish(
            &entry.envelope.reply_to,
            Reply::correlated(
                entry.envelope.correlation_id.clone(),
                serde_json::to_string(&reply_value).unwrap(),
            ),
        );
        broker.ack(&self.stream, &entry.entry_id);
        true
    }

    /// Process until the queue is empty.
    pub async fn drain(&self, broker: &MockBroker, gate: &SessionGate) {
        while self.process_one(broker, gate).await {}
    }
}

/// The pair of queue workers for one subsystem, over a shared dispatcher.
pub struct SubsystemSim<S> {
    pub commands: QueueSim<S>,
    pub data: QueueSim<S>,
}

impl<S> SubsystemSim<S> {
    pub fn new(subsystem: &str, dispatcher: Dispatcher<S>) -> Self {
        let dispatcher = dispatcher.into_shared();
        Self {
            commands: QueueSim {
                stream: streams::request_stream("gmq", streams::EXCHANGE_COMMANDS, subsystem),
                channel: Channel::Commands,
                dispatcher: dispatcher.clone(),
            },
            data: QueueSim {
                stream: streams::request_stream("gmq", streams::EXCHANGE_DATA, subsystem),
                channel: Channel::Data,
                dispatcher,
            },
        }
    }

    /// Process one request from either queue, commands first. Returns false
    /// when both queues are empty.
    pub async fn process_one(&self, broker: &MockBroker, gate: &SessionGate) -> bool {
        self.commands.process_one(broker, gate).await || self.data.process_one(broker, gate).await
    }

    /// Process until both queues are empty.
    pub async fn drain(&self, broker: &MockBroker, gate: &SessionGate) {
        while self.process_one(broker, gate).await {}
    }
}

/// Client-side envelope builder mirroring the stub.
pub struct SimClient {
    pub identity: String,
    pub token: Option<String>,
}

impl SimClient {
    pub fn new(name: &str) -> Self {
        Self {
            identity: streams::reply_stream("gmq", name),
            token: None,
        }
    }

    /// Send a control message; returns the correlation id.
    pub fn send_control(&self, broker: &MockBroker, command: ControlCommand) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        broker.xadd(
            &streams::control_stream("gmq"),
            Envelope::new(&self.identity, &correlation_id, command.as_str()),
        );
        correlation_id
    }

    /// Send a command/data request carrying the stored token; returns the
    /// correlation id.
    pub fn send_request(
        &self,
        broker: &MockBroker,
        stream: &str,
        command: &str,
        args: Value,
    ) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        let body = CommandRequest::new(command, args).to_json().unwrap();
        let mut envelope = Envelope::new(&self.identity, &correlation_id, body);
        if let Some(token) = &self.token {
            envelope = envelope.with_token(token.clone());
        }
        broker.xadd(stream, envelope);
        correlation_id
    }

    /// The reply answering the given correlation id, if delivered.
    pub fn correlated_reply(&self, broker: &MockBroker, correlation_id: &str) -> Option<Reply> {
        broker
            .replies(&self.identity)
            .into_iter()
            .find(|reply| reply.correlation_id.as_deref() == Some(correlation_id))
    }

    /// The unsolicited `"Connected"` grant, if delivered.
    pub fn grant(&self, broker: &MockBroker) -> Option<Reply> {
        broker
            .replies(&self.identity)
            .into_iter()
            .find(|reply| reply.correlation_id.is_none() && reply.body == ControlReply::Connected.as_str())
    }

    /// Store the token delivered on a grant reply.
    pub fn adopt_token(&mut self, reply: &Reply) {
        self.token = reply.token.clone();
    }
}

/// Parse a command/data reply body back into a JSON value.
pub fn reply_body(reply: &Reply) -> Value {
    serde_json::from_str(&reply.body).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_broker_basic_operations() {
        let broker = MockBroker::new();

        let id1 = broker.xadd("s", Envelope::new("r", "c1", "a"));
        let id2 = broker.xadd("s", Envelope::new("r", "c2", "b"));

        let entry = broker.read_next("s").unwrap();
        assert_eq!(entry.entry_id, id1);
        assert_eq!(broker.pending_count(), 1);

        assert!(broker.ack("s", &id1));
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(broker.ack_log(), vec![("s".to_string(), id1)]);

        let entry = broker.read_next("s").unwrap();
        assert_eq!(entry.entry_id, id2);
    }

    #[test]
    fn test_mock_broker_streams_are_independent() {
        let broker = MockBroker::new();
        broker.xadd("a", Envelope::new("r", "c1", "x"));

        assert!(broker.read_next("b").is_none());
        assert!(broker.read_next("a").is_some());
    }

    #[test]
    fn test_ack_unknown_entry_is_rejected() {
        let broker = MockBroker::new();
        assert!(!broker.ack("s", "nope-0"));
    }
}
