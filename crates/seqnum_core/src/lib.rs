//! # seqnum core
//!
//! Gap-aware, audit-traceable sequence-number allocation engine.
//!
//! This crate generates formatted document numbers (invoice numbers,
//! purchase-order numbers, ...) under concurrent, multi-tenant access:
//!
//! - **Uniqueness and monotonicity** per `(sequence, scope, reset period)`,
//!   guaranteed by a single compare-and-swap serialization point in the
//!   injected counter store
//! - **Gap accounting**: every allocated value that is never issued, or is
//!   issued and later voided, leaves a permanent gap record - numbers are
//!   never silently lost and gap values are never reissued
//! - **Audit trail**: one append-only record per state-changing call
//! - **Reservations**: batch allocation with per-slot commit/release and
//!   lazy expiry, no background task required
//!
//! This is a library-level component. Persistence, tenant resolution, and
//! transport are collaborator concerns behind the `seqnum_store` traits.
//!
//! ## Example
//!
//! ```rust
//! use seqnum_core::SequenceManager;
//! use seqnum_store::{InMemoryDefinitionStore, ScopeId, SequenceDefinition, SequenceName};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let definitions = Arc::new(InMemoryDefinitionStore::new());
//! definitions
//!     .put(SequenceDefinition::new("invoice", "INV-{YEAR}-{COUNTER:00001}"))
//!     .unwrap();
//! # use seqnum_store::SequenceDefinitionStore;
//!
//! let manager = SequenceManager::in_memory(definitions);
//! let number = manager
//!     .generate(
//!         &SequenceName::new("invoice"),
//!         &ScopeId::new("tenant_1"),
//!         &HashMap::new(),
//!         "billing",
//!     )
//!     .unwrap();
//! assert!(number.starts_with("INV-"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod counter;
mod error;
mod manager;
mod pattern;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use counter::CounterService;
pub use error::{SequenceError, SequenceResult};
pub use manager::SequenceManager;
pub use pattern::TokenPlan;
