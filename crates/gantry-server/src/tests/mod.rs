//! Integration tests for the broker core.
//!
//! Test organization:
//!
//! - `harness.rs`       - Mock broker and worker simulations
//! - `admission.rs`     - Session grants, wait queue, FIFO promotion
//! - `authorization.rs` - Token gate in front of the registries
//! - `dispatch.rs`      - Lookup, normalization, failure containment
//! - `ordering.rs`      - Per-queue serialization and ack-after-reply
//! - `scenario.rs`      - End-to-end session handover

mod admission;
pub(crate) mod harness;
