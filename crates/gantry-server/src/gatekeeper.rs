//! Session admission control.
//!
//! At most one client holds control authority over the hardware at a time.
//! Contenders are parked in a FIFO wait queue and promoted on release. Each
//! grant mints a fresh session token; command/data requests are authorized
//! against that token, not against the transport reply address.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Credential minted per grant of the active session.
pub type SessionToken = String;

/// The identity currently holding control, plus the token proving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// The holder's private reply stream.
    pub identity: String,
    /// Token required on every command/data request.
    pub token: SessionToken,
}

/// A promotion produced by a release: this waiter now holds the session and
/// must be granted unsolicited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// The promoted identity.
    pub identity: String,
    /// The freshly minted token.
    pub token: SessionToken,
}

/// Outcome of a `Connect` control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The caller now holds the session.
    Granted(SessionToken),
    /// The caller already holds the session; queue untouched.
    AlreadyConnected,
    /// The caller was appended to the wait queue tail.
    Queued,
}

/// Outcome of a `Release` control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's session was cleared; `promoted` carries the wait-queue
    /// head if one was installed in its place.
    Released { promoted: Option<Grant> },
    /// The caller does not hold the session; no state change.
    NotConnected,
}

/// Admission state: the active session and the wait queue.
///
/// Pure synchronous transitions; sharing across tasks goes through
/// [`SessionGate`].
#[derive(Debug, Default)]
pub struct GateState {
    active: Option<ActiveSession>,
    wait_queue: VecDeque<String>,
}

impl GateState {
    /// Create an empty gate: no session, no waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a `Connect` from the given identity.
    pub fn connect(&mut self, identity: &str) -> ConnectOutcome {
        match &self.active {
            None => {
                let token = mint_token();
                self.active = Some(ActiveSession {
                    identity: identity.to_string(),
                    token: token.clone(),
                });
                ConnectOutcome::Granted(token)
            }
            Some(session) if session.identity == identity => ConnectOutcome::AlreadyConnected,
            Some(_) => {
                self.wait_queue.push_back(identity.to_string());
                ConnectOutcome::Queued
            }
        }
    }

    /// Handle a `Release` from the given identity.
    ///
    /// Clearing the session and installing the wait-queue head happen in one
    /// transition, so no request can slip through while nobody holds the
    /// session.
    pub fn release(&mut self, identity: &str) -> ReleaseOutcome {
        match &self.active {
            Some(session) if session.identity == identity => {
                self.active = None;
                let promoted = self.wait_queue.pop_front().map(|next| {
                    let token = mint_token();
                    self.active = Some(ActiveSession {
                        identity: next.clone(),
                        token: token.clone(),
                    });
                    Grant {
                        identity: next,
                        token,
                    }
                });
                ReleaseOutcome::Released { promoted }
            }
            _ => ReleaseOutcome::NotConnected,
        }
    }

    /// True iff a session is active and the presented token matches it.
    pub fn authorize(&self, token: Option<&str>) -> bool {
        match (&self.active, token) {
            (Some(session), Some(presented)) => session.token == presented,
            _ => false,
        }
    }

    /// The current session holder, if any.
    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Identities waiting for promotion, in FIFO order.
    pub fn waiting(&self) -> impl Iterator<Item = &str> {
        self.wait_queue.iter().map(String::as_str)
    }

    /// Number of parked identities.
    pub fn queue_len(&self) -> usize {
        self.wait_queue.len()
    }
}

fn mint_token() -> SessionToken {
    Uuid::new_v4().to_string()
}

/// Clone-able handle sharing one [`GateState`] between the control worker
/// and the per-subsystem dispatch workers.
///
/// The mutex is never held across an await point; critical sections are the
/// synchronous transitions above.
#[derive(Clone, Default)]
pub struct SessionGate {
    inner: Arc<Mutex<GateState>>,
}

impl SessionGate {
    /// Create a gate with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a `Connect` from the given identity.
    pub async fn connect(&self, identity: &str) -> ConnectOutcome {
        self.inner.lock().await.connect(identity)
    }

    /// Handle a `Release` from the given identity.
    pub async fn release(&self, identity: &str) -> ReleaseOutcome {
        self.inner.lock().await.release(identity)
    }

    /// Authorize a command/data request by its presented token.
    pub async fn authorize(&self, token: Option<&str>) -> bool {
        self.inner.lock().await.authorize(token)
    }

    /// The current session holder's identity, if any.
    pub async fn active_identity(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .active()
            .map(|session| session.identity.clone())
    }
}
