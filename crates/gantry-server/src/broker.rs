//! Redis Streams plumbing.
//!
//! Each worker owns a consumer bound to exactly one stream and drains it
//! with XREADGROUP COUNT=1, so at most one entry is ever in flight per
//! queue. Acknowledgment goes out with XACK only after the reply was
//! published. Replies go out as XADD onto the caller's private reply
//! stream.

use crate::error::{ServerError, ServerResult};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::{debug, info, warn};

/// One entry read off a request stream.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The broker entry ID (e.g., "1234567890-0").
    pub entry_id: String,
    /// Raw entry fields in arrival order.
    pub fields: Vec<(String, String)>,
}

impl Delivery {
    /// Borrow the fields in the shape the envelope decoder expects.
    pub fn field_refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Consumer-group reader over a single stream, window 1.
pub struct StreamConsumer {
    client: Client,
    conn: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    block_timeout_ms: u64,
}

impl StreamConsumer {
    /// Connect and ensure the consumer group exists on the stream.
    pub async fn connect(
        redis_url: &str,
        stream: String,
        group: &str,
        consumer: &str,
        block_timeout_ms: u64,
    ) -> ServerResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        let consumer = Self {
            client,
            conn,
            stream,
            group: group.to_string(),
            consumer: consumer.to_string(),
            block_timeout_ms,
        };

        consumer.ensure_group().await?;

        Ok(consumer)
    }

    /// The stream this consumer is bound to.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Ensure the consumer group exists, creating it if necessary.
    async fn ensure_group(&self) -> ServerResult<()> {
        // XGROUP CREATE key group $ MKSTREAM: only new entries are delivered
        // to the group
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut self.conn.clone())
            .await;

        match result {
            Ok(()) => {
                info!(stream = %self.stream, group = %self.group, "Created consumer group");
            }
            Err(e) => {
                // BUSYGROUP means the group already exists, which is fine
                if e.to_string().contains("BUSYGROUP") {
                    debug!(stream = %self.stream, group = %self.group, "Consumer group already exists");
                } else {
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Read the next entry off the stream.
    ///
    /// Blocking XREADGROUP with COUNT=1 against the single bound stream, so
    /// at most one entry is delivered into the pending list per read.
    /// Returns `None` when the block timeout expires with no entries.
    pub async fn read_next(&mut self) -> ServerResult<Option<Delivery>> {
        let result: RedisResult<redis::Value> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(self.block_timeout_ms)
            .arg("STREAMS")
            .arg(&self.stream)
            // ">" delivers only entries never handed to this group before
            .arg(">")
            .query_async(&mut self.conn)
            .await;

        match result {
            Ok(redis::Value::Nil) => Ok(None),
            Ok(value) => parse_stream_response(value),
            Err(e) => Err(e.into()),
        }
    }

    /// Acknowledge an entry, removing it from the pending list.
    pub async fn ack(&mut self, entry_id: &str) -> ServerResult<()> {
        let result: i64 = self
            .conn
            .xack(&self.stream, &self.group, &[entry_id])
            .await?;

        if result == 1 {
            debug!(entry_id = %entry_id, stream = %self.stream, "Acknowledged entry");
        } else {
            warn!(
                entry_id = %entry_id,
                stream = %self.stream,
                "XACK returned {}, entry may not exist",
                result
            );
        }

        Ok(())
    }

    /// Reconnect after a broker error.
    pub async fn reconnect(&mut self) -> ServerResult<()> {
        info!("Reconnecting to Redis...");
        self.conn = self.client.get_multiplexed_async_connection().await?;
        self.ensure_group().await?;
        Ok(())
    }
}

/// Parse an XREAD/XREADGROUP response down to its single entry.
///
/// Response format:
/// `[[stream_key, [[entry_id, [field, value, field, value, ...]]]]]`
fn parse_stream_response(value: redis::Value) -> ServerResult<Option<Delivery>> {
    let streams = match value {
        redis::Value::Array(streams) => streams,
        redis::Value::Nil => return Ok(None),
        _ => {
            return Err(ServerError::Protocol(format!(
                "unexpected stream response type: {value:?}"
            )))
        }
    };

    for stream in &streams {
        let pair = match stream {
            redis::Value::Array(pair) => pair,
            _ => return Err(ServerError::Protocol("expected array for stream entry".into())),
        };
        if pair.len() < 2 {
            return Err(ServerError::Protocol("stream entry too short".into()));
        }

        let entries = match &pair[1] {
            redis::Value::Array(entries) => entries,
            _ => return Err(ServerError::Protocol("expected array for entries".into())),
        };

        let Some(entry) = entries.first() else {
            continue;
        };
        let entry = match entry {
            redis::Value::Array(entry) => entry,
            _ => return Err(ServerError::Protocol("expected array for entry".into())),
        };
        if entry.len() < 2 {
            return Err(ServerError::Protocol("entry too short".into()));
        }

        let entry_id = value_as_string(&entry[0])
            .ok_or_else(|| ServerError::Protocol("expected string for entry ID".into()))?;

        let raw_fields = match &entry[1] {
            redis::Value::Array(fields) => fields,
            _ => return Err(ServerError::Protocol("expected array for fields".into())),
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

        debug!(
            entry_id = %entry_id,
            field_count = fields.len(),
            "Read entry from stream"
        );

        return Ok(Some(Delivery { entry_id, fields }));
    }

    Ok(None)
}

fn value_as_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

/// Publisher for reply streams.
///
/// Multiplexed connections are clone-able; every worker holds its own handle
/// onto the same connection.
#[derive(Clone)]
pub struct ReplyPublisher {
    conn: MultiplexedConnection,
}

impl ReplyPublisher {
    /// Connect to the broker.
    pub async fn connect(redis_url: &str) -> ServerResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Publish a reply onto the given reply stream.
    pub async fn publish(
        &mut self,
        reply_to: &str,
        reply: &gantry_protocol::Reply,
    ) -> ServerResult<()> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(reply_to).arg("*");
        for (name, value) in reply.to_fields() {
            cmd.arg(name).arg(value);
        }

        let entry_id: String = cmd.query_async(&mut self.conn).await?;
        debug!(reply_to = %reply_to, entry_id = %entry_id, "Published reply");

        Ok(())
    }
}
