//! Naming, entity contract, envelope codec, topology builder, publisher and
//! consumer/retry engine for the event-and-task messaging substrate.
//!
//! Everything in this crate is broker-agnostic at its core (`naming`,
//! `entity`, `envelope`, `consumer::decide`) with a thin `lapin`-specific
//! layer (`topology`, `publisher`, `consumer::run_consumer`) on top, so the
//! decision logic that spec.md's Laws and Invariants govern can be unit
//! tested without a running broker.

pub mod adapters;
pub mod consumer;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod naming;
pub mod publisher;
pub mod topology;

pub use entity::{EntityDescriptor, EventKind, FieldDescriptor};
pub use envelope::Envelope;
pub use error::{BusinessError, CoreError, ExternalServiceError, HandlerError, ModelError, TechnicalError, UnknownError};
pub use publisher::Publisher;
