//! In-memory store implementations for testing and ephemeral use.

use crate::error::{StoreError, StoreResult};
use crate::stores::{
    AuditSink, CounterStore, GapStore, ReservationStore, SequenceDefinitionStore,
};
use crate::types::{
    AuditRecord, CounterKey, CounterState, GapRecord, PeriodKey, Reservation, ReservationId,
    ScopeId, SequenceDefinition, SequenceName, SlotStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// An in-memory [`SequenceDefinitionStore`].
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    definitions: Mutex<HashMap<SequenceName, SequenceDefinition>>,
}

impl InMemoryDefinitionStore {
    /// Creates an empty definition store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceDefinitionStore for InMemoryDefinitionStore {
    fn get(&self, name: &SequenceName) -> StoreResult<Option<SequenceDefinition>> {
        Ok(self.definitions.lock().get(name).cloned())
    }

    fn put(&self, definition: SequenceDefinition) -> StoreResult<()> {
        let mut definitions = self.definitions.lock();
        if definitions.contains_key(&definition.name) {
            return Err(StoreError::definition_exists(definition.name.as_str()));
        }
        definitions.insert(definition.name.clone(), definition);
        Ok(())
    }
}

/// An in-memory [`CounterStore`].
///
/// The whole map is guarded by one mutex, which makes the compare-and-swap
/// trivially atomic. A persistent implementation would instead use row
/// locking or an optimistic version check.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<CounterKey, CounterState>>,
}

impl InMemoryCounterStore {
    /// Creates an empty counter store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn get(&self, key: &CounterKey) -> StoreResult<Option<CounterState>> {
        Ok(self.counters.lock().get(key).cloned())
    }

    fn compare_and_swap(
        &self,
        key: &CounterKey,
        expected: Option<&CounterState>,
        new: CounterState,
    ) -> StoreResult<bool> {
        let mut counters = self.counters.lock();
        let matches = match (counters.get(key), expected) {
            (None, None) => true,
            (Some(current), Some(expected)) => current == expected,
            _ => false,
        };
        if matches {
            counters.insert(key.clone(), new);
        }
        Ok(matches)
    }
}

/// An in-memory [`ReservationStore`].
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    /// Creates an empty reservation store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn insert(&self, reservation: &Reservation) -> StoreResult<()> {
        let mut reservations = self.reservations.lock();
        if reservations.contains_key(&reservation.id) {
            return Err(StoreError::reservation_exists(reservation.id));
        }
        reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    fn get(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.reservations.lock().get(&id).cloned())
    }

    fn update(&self, reservation: &Reservation) -> StoreResult<()> {
        let mut reservations = self.reservations.lock();
        if !reservations.contains_key(&reservation.id) {
            return Err(StoreError::reservation_missing(reservation.id));
        }
        reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    fn find_slot(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        period: &PeriodKey,
        value: u64,
    ) -> StoreResult<Option<(ReservationId, SlotStatus)>> {
        let reservations = self.reservations.lock();
        for reservation in reservations.values() {
            if &reservation.sequence != sequence
                || &reservation.scope != scope
                || &reservation.period != period
            {
                continue;
            }
            if let Some(slot) = reservation.slot(value) {
                return Ok(Some((reservation.id, slot.status)));
            }
        }
        Ok(None)
    }
}

/// An in-memory [`GapStore`].
#[derive(Debug, Default)]
pub struct InMemoryGapStore {
    gaps: Mutex<Vec<GapRecord>>,
}

impl InMemoryGapStore {
    /// Creates an empty gap store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded gap, in append order.
    ///
    /// Useful for tests and debugging.
    #[must_use]
    pub fn records(&self) -> Vec<GapRecord> {
        self.gaps.lock().clone()
    }
}

impl GapStore for InMemoryGapStore {
    fn append(&self, gap: GapRecord) -> StoreResult<()> {
        self.gaps.lock().push(gap);
        Ok(())
    }

    fn list_for_scope(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
    ) -> StoreResult<Vec<GapRecord>> {
        Ok(self
            .gaps
            .lock()
            .iter()
            .filter(|g| &g.sequence == sequence && &g.scope == scope)
            .cloned()
            .collect())
    }
}

/// An in-memory [`AuditSink`] that retains records for inspection.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded entry, in append order.
    ///
    /// Useful for tests and debugging.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, record: AuditRecord) -> StoreResult<()> {
        self.records.lock().push(record);
        Ok(())
    }
}
