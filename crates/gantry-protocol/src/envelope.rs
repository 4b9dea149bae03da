//! Transport-level metadata for requests and replies.
//!
//! Every stream entry carries its payload in a `body` field; the reply
//! address, correlation identifier and session token ride as sibling fields.
//! The dispatcher reads the metadata before it ever parses the payload.

use crate::error::{ProtocolError, ProtocolResult};

/// Field name for the payload.
pub const FIELD_BODY: &str = "body";

/// Field name for the caller's private reply stream.
pub const FIELD_REPLY_TO: &str = "reply_to";

/// Field name for the correlation identifier.
pub const FIELD_CORRELATION_ID: &str = "correlation_id";

/// Field name for the session token.
pub const FIELD_TOKEN: &str = "token";

/// An inbound request as read off a request or control stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The caller's private reply stream.
    pub reply_to: String,
    /// Echoed verbatim on the reply so the caller can match it to the call.
    pub correlation_id: String,
    /// Session token, required on command/data requests. Control messages
    /// carry none.
    pub token: Option<String>,
    /// Payload: JSON for command/data requests, a raw string on the control
    /// stream.
    pub body: String,
}

impl Envelope {
    /// Create a new Envelope without a token.
    pub fn new(
        reply_to: impl Into<String>,
        correlation_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            reply_to: reply_to.into(),
            correlation_id: correlation_id.into(),
            token: None,
            body: body.into(),
        }
    }

    /// Attach a session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Render as stream-entry fields for publishing.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (FIELD_BODY, self.body.clone()),
            (FIELD_REPLY_TO, self.reply_to.clone()),
            (FIELD_CORRELATION_ID, self.correlation_id.clone()),
        ];
        if let Some(token) = &self.token {
            fields.push((FIELD_TOKEN, token.clone()));
        }
        fields
    }

    /// Rebuild from stream-entry fields. Unknown fields are ignored.
    pub fn from_fields<'a, I>(fields: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut body = None;
        let mut reply_to = None;
        let mut correlation_id = None;
        let mut token = None;

        for (name, value) in fields {
            match name {
                FIELD_BODY => body = Some(value.to_string()),
                FIELD_REPLY_TO => reply_to = Some(value.to_string()),
                FIELD_CORRELATION_ID => correlation_id = Some(value.to_string()),
                FIELD_TOKEN => token = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            reply_to: reply_to.ok_or(ProtocolError::MissingField(FIELD_REPLY_TO))?,
            correlation_id: correlation_id
                .ok_or(ProtocolError::MissingField(FIELD_CORRELATION_ID))?,
            token,
            body: body.ok_or(ProtocolError::MissingField(FIELD_BODY))?,
        })
    }
}

/// An outbound reply as published onto a client's reply stream.
///
/// A correlated reply answers one specific call. An uncorrelated reply is
/// unsolicited — the grant delivered to a parked client on promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Payload: a JSON value for command/data replies, a raw control reply
    /// string otherwise.
    pub body: String,
    /// The originating request's correlation identifier, if any.
    pub correlation_id: Option<String>,
    /// Session token, present on grants.
    pub token: Option<String>,
}

impl Reply {
    /// A reply answering the given correlation identifier.
    pub fn correlated(correlation_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            correlation_id: Some(correlation_id.into()),
            token: None,
        }
    }

    /// An unsolicited reply with no correlation identifier.
    pub fn unsolicited(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            correlation_id: None,
            token: None,
        }
    }

    /// Attach a session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Render as stream-entry fields for publishing.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![(FIELD_BODY, self.body.clone())];
        if let Some(correlation_id) = &self.correlation_id {
            fields.push((FIELD_CORRELATION_ID, correlation_id.clone()));
        }
        if let Some(token) = &self.token {
            fields.push((FIELD_TOKEN, token.clone()));
        }
        fields
    }

    /// Rebuild from stream-entry fields. Only `body` is required.
    pub fn from_fields<'a, I>(fields: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut body = None;
        let mut correlation_id = None;
        let mut token = None;

        for (name, value) in fields {
            match name {
                FIELD_BODY => body = Some(value.to_string()),
                FIELD_CORRELATION_ID => correlation_id = Some(value.to_string()),
                FIELD_TOKEN => token = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            body: body.ok_or(ProtocolError::MissingField(FIELD_BODY))?,
            correlation_id,
            token,
        })
    }
}
