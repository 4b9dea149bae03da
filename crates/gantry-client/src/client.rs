//! The RPC client stub.
//!
//! Requests go out as stream entries carrying the stub's reply address,
//! a fresh correlation identifier and the session token; the stub then
//! pumps its private reply stream until the matching reply arrives or the
//! deadline expires.

use crate::error::{ClientError, ClientResult};
use crate::pending::{Inbound, PendingCall};
use gantry_protocol::{streams, CommandRequest, ControlCommand, ControlReply, Envelope, Reply};
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest single broker poll while waiting on a deadline.
const POLL_SLICE_MS: u64 = 500;

/// Result of a `Connect` control call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// This stub now holds the active session.
    Connected,
    /// This stub already held the active session.
    AlreadyConnected,
    /// Parked in the wait queue; an unsolicited grant will follow on
    /// promotion (see [`RpcClient::await_grant`]).
    Queued,
}

/// Blocking RPC stub with one outstanding call at a time.
pub struct RpcClient {
    conn: MultiplexedConnection,
    namespace: String,
    reply_stream: String,
    last_reply_id: String,
    token: Option<String>,
    pending_grant: Option<String>,
}

impl RpcClient {
    /// Connect to the broker and allocate a private reply stream.
    pub async fn new(redis_url: &str, namespace: &str) -> ClientResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        let reply_stream = streams::reply_stream(namespace, &Uuid::new_v4().to_string());
        debug!(reply_stream = %reply_stream, "Client stub ready");

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            reply_stream,
            last_reply_id: "0".to_string(),
            token: None,
            pending_grant: None,
        })
    }

    /// The stub's private reply stream; doubles as its identity towards the
    /// gatekeeper.
    pub fn reply_stream(&self) -> &str {
        &self.reply_stream
    }

    /// True once a session token is held.
    pub fn is_connected(&self) -> bool {
        self.token.is_some()
    }

    /// Request the active session.
    pub async fn connect(&mut self, deadline: Duration) -> ClientResult<ConnectStatus> {
        let reply = self.send_control(ControlCommand::Connect, deadline).await?;

        match ControlReply::parse(&reply.body)? {
            ControlReply::Connected => {
                self.token = reply.token.clone();
                info!("Connected to server");
                Ok(ConnectStatus::Connected)
            }
            ControlReply::AlreadyConnected => Ok(ConnectStatus::AlreadyConnected),
            ControlReply::Queued => {
                info!("Queued for the session");
                Ok(ConnectStatus::Queued)
            }
            ControlReply::Released => Err(ClientError::Protocol(
                "unexpected Released reply to Connect".to_string(),
            )),
        }
    }

    /// Wait for the unsolicited grant after a `Queued` connect.
    pub async fn await_grant(&mut self, deadline: Duration) -> ClientResult<()> {
        if let Some(token) = self.pending_grant.take() {
            self.token = Some(token);
            return Ok(());
        }

        let expires_at = Instant::now() + deadline;
        loop {
            let Some(block_ms) = next_poll(expires_at) else {
                return Err(ClientError::Timeout(deadline));
            };
            for reply in self.read_replies(block_ms).await? {
                if reply.correlation_id.is_none() && reply.body == ControlReply::Connected.as_str()
                {
                    self.token = reply.token.clone();
                    info!("Granted the session");
                    return Ok(());
                }
                debug!(body = %reply.body, "Ignoring reply while awaiting grant");
            }
        }
    }

    /// Give up the active session.
    pub async fn release(&mut self, deadline: Duration) -> ClientResult<()> {
        let reply = self.send_control(ControlCommand::Release, deadline).await?;

        match ControlReply::parse(&reply.body)? {
            ControlReply::Released => {
                self.token = None;
                // Best-effort cleanup of the private reply stream
                let result: RedisResult<i64> = redis::cmd("DEL")
                    .arg(&self.reply_stream)
                    .query_async(&mut self.conn)
                    .await;
                if let Err(e) = result {
                    debug!(error = %e, "Failed to delete reply stream");
                }
                Ok(())
            }
            other => Err(ClientError::Protocol(format!(
                "unexpected {:?} reply to Release",
                other.as_str()
            ))),
        }
    }

    /// Scoped-shutdown release: failures are logged, never escalated, since
    /// the broker connection may already be gone.
    pub async fn release_connection(mut self) {
        match self.release(Duration::from_secs(5)).await {
            Ok(()) => info!("Connection released"),
            Err(e) => warn!(
                error = %e,
                "Failed to send Release; connection may not have been released"
            ),
        }
    }

    /// Issue a request and block until its reply arrives.
    ///
    /// The reply is whatever the subsystem produced: a JSON value, or one of
    /// the status strings. Deadline expiry yields a retryable
    /// [`ClientError::Timeout`].
    pub async fn call(
        &mut self,
        command: &str,
        args: Value,
        exchange: &str,
        routing_key: &str,
        deadline: Duration,
    ) -> ClientResult<Value> {
        let correlation_id = Uuid::new_v4().to_string();
        let body = CommandRequest::new(command, args).to_json()?;

        let mut envelope = Envelope::new(&self.reply_stream, &correlation_id, body);
        if let Some(token) = &self.token {
            envelope = envelope.with_token(token.clone());
        }

        let stream = streams::request_stream(&self.namespace, exchange, routing_key);
        debug!(command = %command, stream = %stream, correlation_id = %correlation_id, "Sending request");
        self.publish(&stream, &envelope).await?;

        let reply = self.wait_for_reply(&correlation_id, deadline).await?;
        serde_json::from_str(&reply.body)
            .map_err(|e| ClientError::Protocol(format!("invalid reply body: {e}")))
    }

    /// Publish a raw control message and wait for its correlated reply.
    async fn send_control(
        &mut self,
        command: ControlCommand,
        deadline: Duration,
    ) -> ClientResult<Reply> {
        let correlation_id = Uuid::new_v4().to_string();
        let envelope = Envelope::new(&self.reply_stream, &correlation_id, command.as_str());

        let stream = streams::control_stream(&self.namespace);
        debug!(command = command.as_str(), correlation_id = %correlation_id, "Sending control message");
        self.publish(&stream, &envelope).await?;

        self.wait_for_reply(&correlation_id, deadline).await
    }

    /// Pump the reply stream until the matching reply arrives.
    ///
    /// Replies bearing other correlation identifiers never resolve this
    /// call; an unsolicited grant observed on the way is kept for
    /// [`RpcClient::await_grant`].
    async fn wait_for_reply(
        &mut self,
        correlation_id: &str,
        deadline: Duration,
    ) -> ClientResult<Reply> {
        let pending = PendingCall::new(correlation_id);
        let expires_at = Instant::now() + deadline;

        loop {
            let Some(block_ms) = next_poll(expires_at) else {
                return Err(ClientError::Timeout(deadline));
            };
            for reply in self.read_replies(block_ms).await? {
                match pending.classify(&reply) {
                    Inbound::Matched => return Ok(reply),
                    Inbound::Grant => {
                        debug!("Stashing unsolicited grant");
                        self.pending_grant = reply.token.clone();
                    }
                    Inbound::Foreign => {
                        debug!(body = %reply.body, "Ignoring reply for another call");
                    }
                }
            }
        }
    }

    async fn publish(&mut self, stream: &str, envelope: &Envelope) -> ClientResult<()> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("*");
        for (name, value) in envelope.to_fields() {
            cmd.arg(name).arg(value);
        }
        let _entry_id: String = cmd.query_async(&mut self.conn).await?;
        Ok(())
    }

    /// Read any new entries off the private reply stream.
    async fn read_replies(&mut self, block_ms: u64) -> ClientResult<Vec<Reply>> {
        let result: RedisResult<redis::Value> = redis::cmd("XREAD")
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.reply_stream)
            .arg(&self.last_reply_id)
            .query_async(&mut self.conn)
            .await;

        match result {
            Ok(redis::Value::Nil) => Ok(Vec::new()),
            Ok(value) => {
                let (replies, last_id) = parse_reply_entries(value)?;
                if let Some(last_id) = last_id {
                    self.last_reply_id = last_id;
                }
                Ok(replies)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Milliseconds for the next poll, or `None` when the deadline has expired.
///
/// BLOCK 0 would wait forever, so the returned slice is always nonzero.
fn next_poll(expires_at: Instant) -> Option<u64> {
    let remaining = expires_at.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return None;
    }
    Some((remaining.as_millis() as u64).clamp(1, POLL_SLICE_MS))
}

/// Parse an XREAD response into replies plus the highest entry ID seen.
///
/// Response format:
/// `[[stream_key, [[entry_id, [field, value, field, value, ...]]]]]`
fn parse_reply_entries(value: redis::Value) -> ClientResult<(Vec<Reply>, Option<String>)> {
    let streams = match value {
        redis::Value::Array(streams) => streams,
        redis::Value::Nil => return Ok((Vec::new(), None)),
        _ => {
            return Err(ClientError::Protocol(format!(
                "unexpected XREAD response type: {value:?}"
            )))
        }
    };

    let mut replies = Vec::new();
    let mut last_id = None;

    for stream in &streams {
        let pair = match stream {
            redis::Value::Array(pair) => pair,
            _ => return Err(ClientError::Protocol("expected array for stream entry".into())),
        };
        if pair.len() < 2 {
            return Err(ClientError::Protocol("stream entry too short".into()));
        }

        let entries = match &pair[1] {
            redis::Value::Array(entries) => entries,
            _ => return Err(ClientError::Protocol("expected array for entries".into())),
        };

        for entry in entries {
            let entry = match entry {
                redis::Value::Array(entry) => entry,
                _ => return Err(ClientError::Protocol("expected array for entry".into())),
            };
            if entry.len() < 2 {
                return Err(ClientError::Protocol("entry too short".into()));
            }

            let entry_id = value_as_string(&entry[0])
                .ok_or_else(|| ClientError::Protocol("expected string for entry ID".into()))?;

            let raw_fields = match &entry[1] {
                redis::Value::Array(fields) => fields,
                _ => return Err(ClientError::Protocol("expected array for fields".into())),
            };

            let mut fields = Vec::with_capacity(raw_fields.len() / 2);
            let mut i = 0;
            while i + 1 < raw_fields.len() {
                if let (Some(name), Some(value)) = (
                    value_as_string(&raw_fields[i]),
                    value_as_string(&raw_fields[i + 1]),
                ) {
                    fields.push((name, value));
                }
                i += 2;
            }

            match Reply::from_fields(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
                Ok(reply) => replies.push(reply),
                Err(e) => debug!(entry_id = %entry_id, error = %e, "Skipping malformed reply entry"),
            }

            last_id = Some(entry_id);
        }
    }

    Ok((replies, last_id))
}

fn value_as_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}
