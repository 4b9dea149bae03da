//! Correlation of inbound replies to the one outstanding call.

use gantry_protocol::{ControlReply, Reply};

/// The single outstanding call: its correlation identifier.
pub(crate) struct PendingCall {
    correlation_id: String,
}

/// How an inbound reply relates to the pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// Resolves the pending call.
    Matched,
    /// Unsolicited session grant for this client.
    Grant,
    /// Someone else's correlation identifier, or noise; never resolves the
    /// pending call.
    Foreign,
}

impl PendingCall {
    pub fn new(correlation_id: &str) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
        }
    }

    /// Classify a reply against this call.
    pub fn classify(&self, reply: &Reply) -> Inbound {
        match &reply.correlation_id {
            Some(correlation_id) if *correlation_id == self.correlation_id => Inbound::Matched,
            Some(_) => Inbound::Foreign,
            None if reply.body == ControlReply::Connected.as_str() => Inbound::Grant,
            None => Inbound::Foreign,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_the_matching_identifier_resolves() {
        let pending = PendingCall::new("corr-1");

        assert_eq!(
            pending.classify(&Reply::correlated("corr-1", "\"ok\"")),
            Inbound::Matched
        );
        assert_eq!(
            pending.classify(&Reply::correlated("corr-2", "\"ok\"")),
            Inbound::Foreign
        );
        assert_eq!(
            pending.classify(&Reply::correlated("", "\"ok\"")),
            Inbound::Foreign
        );
    }

    #[test]
    fn test_uncorrelated_connected_is_a_grant() {
        let pending = PendingCall::new("corr-1");

        let grant = Reply::unsolicited("Connected").with_token("tok");
        assert_eq!(pending.classify(&grant), Inbound::Grant);
    }

    #[test]
    fn test_uncorrelated_noise_is_foreign() {
        let pending = PendingCall::new("corr-1");

        assert_eq!(
            pending.classify(&Reply::unsolicited("Released")),
            Inbound::Foreign
        );
        assert_eq!(
            pending.classify(&Reply::unsolicited("{\"x\":1}")),
            Inbound::Foreign
        );
    }
}
