//! # Coursehub Dispatch
//!
//! The broker-agnostic application layer over
//! [`MessageQueue`](coursehub_core::MessageQueue):
//!
//! - [`Publisher`]: envelope construction and durable enqueue
//! - [`Dispatcher`]: the per-queue delivery loop: decode, invoke the domain
//!   handler, then acknowledge, retry or dead-letter
//!
//! # State Machine
//!
//! Each delivered message terminates in exactly one of three states:
//!
//! ```text
//!             ┌─────────────┐
//!             │  Consuming  │◄───────────────────┐
//!             └──────┬──────┘                    │
//!                    │ deliver                   │ next message
//!                    ▼                           │
//!      ┌──────────────────────────┐              │
//!      │ decode → handler.handle  │──────────────┘
//!      └──────────────────────────┘
//!        │           │           │
//!        ▼           ▼           ▼
//!     Acked       Retried    DeadLettered
//!   (success)  (republished (undecodable, permanent,
//!               + ack)       or retry budget spent)
//! ```
//!
//! Retrying republishes the full original payload to the **same** queue with
//! only the retry counter incremented, then acknowledges the original
//! delivery. The retried copy is appended behind whatever is already queued:
//! delivery is at-least-once and non-FIFO, and handlers must be idempotent.

pub mod dispatcher;
pub mod publisher;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use publisher::{PublishError, PublishOptions, Publisher};
