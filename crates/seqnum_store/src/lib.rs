//! # seqnum store
//!
//! Store traits and record types for the seqnum sequence-number engine.
//!
//! This crate defines the persistence seams the engine depends on. The
//! engine never talks to a database directly; it is handed implementations
//! of five narrow traits:
//!
//! - [`SequenceDefinitionStore`] - immutable sequence configuration
//! - [`CounterStore`] - atomic read-and-set counter rows (the engine's only
//!   serialization point)
//! - [`ReservationStore`] - reservations and their slots
//! - [`GapStore`] - append-only gap accounting
//! - [`AuditSink`] - append-only audit trail
//!
//! Thread-safe in-memory implementations of every trait are provided for
//! tests and ephemeral use.
//!
//! ## Example
//!
//! ```rust
//! use seqnum_store::{CounterKey, CounterState, CounterStore, InMemoryCounterStore};
//! use seqnum_store::{PeriodKey, ScopeId, SequenceName};
//!
//! let store = InMemoryCounterStore::new();
//! let key = CounterKey::new(
//!     SequenceName::new("invoice"),
//!     ScopeId::new("tenant_1"),
//!     PeriodKey::new("2024"),
//! );
//! let fresh = CounterState {
//!     current_value: 1,
//!     last_allocated_at: chrono::Utc::now(),
//! };
//! assert!(store.compare_and_swap(&key, None, fresh).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod stores;
mod types;

pub use error::{StoreError, StoreResult};
pub use memory::{
    InMemoryAuditLog, InMemoryCounterStore, InMemoryDefinitionStore, InMemoryGapStore,
    InMemoryReservationStore,
};
pub use stores::{AuditSink, CounterStore, GapStore, ReservationStore, SequenceDefinitionStore};
pub use types::{
    AuditOperation, AuditRecord, CounterKey, CounterState, GapReason, GapRecord, PeriodKey,
    Reservation, ReservationId, ReservationSlot, ResetPolicy, ScopeId, ScopeKind,
    SequenceDefinition, SequenceName, SlotStatus,
};
