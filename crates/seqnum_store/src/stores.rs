//! Store trait definitions.
//!
//! The engine depends only on these traits; persistence technology is a
//! collaborator concern. All implementations must be `Send + Sync` because
//! callers may invoke the engine from many threads.

use crate::error::StoreResult;
use crate::types::{
    AuditRecord, CounterKey, CounterState, GapRecord, PeriodKey, Reservation, ReservationId,
    ScopeId, SequenceDefinition, SequenceName, SlotStatus,
};

/// Read/register access to immutable sequence definitions.
///
/// Definitions are written once at setup time; the engine only ever reads
/// them.
pub trait SequenceDefinitionStore: Send + Sync {
    /// Looks up a definition by name.
    ///
    /// Returns `Ok(None)` when no definition is registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, name: &SequenceName) -> StoreResult<Option<SequenceDefinition>>;

    /// Registers a new definition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::DefinitionExists`] if the name is taken;
    /// definitions are immutable and never replaced.
    fn put(&self, definition: SequenceDefinition) -> StoreResult<()>;
}

/// Atomic read-and-set access to counter rows.
///
/// This is the engine's sole serialization point. Implementations map
/// [`CounterStore::compare_and_swap`] to whatever atomic primitive the
/// backing store offers: row lock plus update, optimistic version check,
/// or a native atomic counter.
///
/// # Invariants
///
/// - `compare_and_swap` is all-or-nothing under concurrent callers: of two
///   racing swaps against the same observed state, exactly one succeeds.
/// - Rows are never deleted; historical reset periods stay readable.
pub trait CounterStore: Send + Sync {
    /// Reads the current state of a counter row.
    ///
    /// Returns `Ok(None)` when no allocation has happened for `key` yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, key: &CounterKey) -> StoreResult<Option<CounterState>>;

    /// Atomically installs `new` iff the stored state equals `expected`.
    ///
    /// `expected = None` means the row must be absent (first allocation).
    /// Returns `true` when the swap was applied, `false` when another
    /// caller got there first and the stored state no longer matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails; a lost race is *not* an
    /// error.
    fn compare_and_swap(
        &self,
        key: &CounterKey,
        expected: Option<&CounterState>,
        new: CounterState,
    ) -> StoreResult<bool>;
}

/// Create/read/update access to reservations and their slots.
pub trait ReservationStore: Send + Sync {
    /// Persists a new reservation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ReservationExists`] if the id is taken.
    fn insert(&self, reservation: &Reservation) -> StoreResult<()>;

    /// Reads a reservation by id.
    ///
    /// Returns `Ok(None)` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn get(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// Replaces a reservation's stored state (slot transitions).
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ReservationMissing`] if the id was
    /// never inserted.
    fn update(&self, reservation: &Reservation) -> StoreResult<()>;

    /// Finds the slot holding `value` for a sequence/scope/period, if any.
    ///
    /// Used to decide whether a number to be voided was ever allocated.
    /// The period is part of the lookup because counters restart per reset
    /// period, so the same numeric value recurs across periods.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn find_slot(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        period: &PeriodKey,
        value: u64,
    ) -> StoreResult<Option<(ReservationId, SlotStatus)>>;
}

/// Append-only store of gap records.
///
/// Richer querying (date ranges, reason filters) is a reporting concern of
/// higher layers; the engine itself only appends, and reads back per-scope
/// gaps to refuse double-voiding.
pub trait GapStore: Send + Sync {
    /// Appends one gap record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn append(&self, gap: GapRecord) -> StoreResult<()>;

    /// Lists all gaps recorded for a sequence/scope, in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn list_for_scope(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
    ) -> StoreResult<Vec<GapRecord>>;
}

/// Append-only audit sink.
///
/// Write-only from the engine's perspective; records are never read back,
/// mutated, or deleted by the engine.
pub trait AuditSink: Send + Sync {
    /// Appends one audit record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn append(&self, record: AuditRecord) -> StoreResult<()>;
}
