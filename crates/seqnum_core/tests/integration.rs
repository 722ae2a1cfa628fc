//! Integration tests wiring the manager against in-memory stores.

use chrono::{DateTime, Duration, TimeZone, Utc};
use seqnum_core::{Clock, EngineConfig, ManualClock, SequenceError, SequenceManager};
use seqnum_store::{
    AuditOperation, CounterKey, CounterStore, GapReason, GapRecord, GapStore, InMemoryAuditLog,
    InMemoryCounterStore, InMemoryDefinitionStore, InMemoryGapStore, InMemoryReservationStore,
    PeriodKey, ReservationId, ResetPolicy, ScopeId, SequenceDefinition, SequenceDefinitionStore,
    SequenceName, SlotStatus, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

struct Harness {
    manager: SequenceManager,
    counters: Arc<InMemoryCounterStore>,
    gaps: Arc<InMemoryGapStore>,
    audit: Arc<InMemoryAuditLog>,
    clock: Arc<ManualClock>,
}

fn start_of_2024() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn harness(definition: SequenceDefinition) -> Harness {
    let definitions = Arc::new(InMemoryDefinitionStore::new());
    definitions.put(definition).unwrap();

    let counters = Arc::new(InMemoryCounterStore::new());
    let reservations = Arc::new(InMemoryReservationStore::new());
    let gaps = Arc::new(InMemoryGapStore::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let clock = Arc::new(ManualClock::new(start_of_2024()));

    let manager = SequenceManager::new(
        definitions,
        counters.clone(),
        reservations.clone(),
        gaps.clone(),
        audit.clone(),
        clock.clone(),
        EngineConfig::default(),
    );
    Harness {
        manager,
        counters,
        gaps,
        audit,
        clock,
    }
}

fn invoice_definition() -> SequenceDefinition {
    SequenceDefinition::new("invoice", "INV-{YEAR}-{COUNTER:00001}")
        .reset_policy(ResetPolicy::Yearly)
}

fn seq() -> SequenceName {
    SequenceName::new("invoice")
}

fn tenant_1() -> ScopeId {
    ScopeId::new("tenant_1")
}

fn no_vars() -> HashMap<String, String> {
    HashMap::new()
}

#[test]
fn end_to_end_invoice_scenario() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2024-00001"
    );
    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2024-00002"
    );

    let reservation = h
        .manager
        .reserve(&seq(), &scope, 3, None, "billing")
        .unwrap();
    h.manager.release(reservation.id, "billing").unwrap();

    let gaps = h.gaps.records();
    assert_eq!(gaps.len(), 3);
    assert_eq!(
        gaps.iter().map(|g| g.value).collect::<Vec<_>>(),
        vec![3, 4, 5]
    );
    assert!(gaps.iter().all(|g| g.reason == GapReason::ReleasedUnused));

    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2024-00006"
    );
}

#[test]
fn preview_is_stable_and_generate_returns_it() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    let previewed = h.manager.preview(&seq(), &scope, &no_vars()).unwrap();
    for _ in 0..3 {
        assert_eq!(h.manager.preview(&seq(), &scope, &no_vars()).unwrap(), previewed);
    }
    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        previewed
    );
    assert_ne!(h.manager.preview(&seq(), &scope, &no_vars()).unwrap(), previewed);
}

#[test]
fn concurrent_generates_yield_distinct_numbers() {
    let h = harness(invoice_definition());
    let manager = Arc::new(h.manager);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(thread::spawn(move || {
            let mut numbers = Vec::new();
            for _ in 0..10 {
                numbers.push(
                    manager
                        .generate(&seq(), &tenant_1(), &no_vars(), "billing")
                        .unwrap(),
                );
            }
            numbers
        }));
    }

    let mut all: Vec<String> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total, "every generated number must be distinct");
}

#[test]
fn scopes_are_numbered_independently() {
    let h = harness(invoice_definition());
    let a = h
        .manager
        .generate(&seq(), &ScopeId::new("tenant_a"), &no_vars(), "billing")
        .unwrap();
    let b = h
        .manager
        .generate(&seq(), &ScopeId::new("tenant_b"), &no_vars(), "billing")
        .unwrap();
    assert_eq!(a, "INV-2024-00001");
    assert_eq!(b, "INV-2024-00001");
}

#[test]
fn reservation_accounting_commit_one_release_rest() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    let reservation = h
        .manager
        .reserve(&seq(), &scope, 5, None, "batch")
        .unwrap();
    let committed_value = reservation.slots[0].value;
    h.manager
        .commit_slot(reservation.id, committed_value, "batch")
        .unwrap();
    h.manager.release(reservation.id, "batch").unwrap();

    let gaps = h.gaps.list_for_scope(&seq(), &scope).unwrap();
    assert_eq!(gaps.len(), 4);
    assert!(gaps.iter().all(|g| g.reason == GapReason::ReleasedUnused));
    assert!(gaps.iter().all(|g| g.value != committed_value));

    // Released values are never handed out again.
    let next = h.manager.generate(&seq(), &scope, &no_vars(), "batch").unwrap();
    assert_eq!(next, "INV-2024-00006");
}

#[test]
fn release_is_idempotent() {
    let h = harness(invoice_definition());
    let reservation = h
        .manager
        .reserve(&seq(), &tenant_1(), 2, None, "batch")
        .unwrap();

    h.manager.release(reservation.id, "batch").unwrap();
    let gaps_after_first = h.gaps.records().len();
    let audits_after_first = h.audit.records().len();

    h.manager.release(reservation.id, "batch").unwrap();
    assert_eq!(h.gaps.records().len(), gaps_after_first);
    assert_eq!(h.audit.records().len(), audits_after_first);
}

/// A gap store whose nth append fails once, then recovers.
struct FlakyGapStore {
    inner: InMemoryGapStore,
    fail_on: usize,
    appends: AtomicUsize,
}

impl FlakyGapStore {
    fn failing_on(fail_on: usize) -> Self {
        Self {
            inner: InMemoryGapStore::new(),
            fail_on,
            appends: AtomicUsize::new(0),
        }
    }
}

impl GapStore for FlakyGapStore {
    fn append(&self, gap: GapRecord) -> StoreResult<()> {
        if self.appends.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(StoreError::backend("gap log unavailable"));
        }
        self.inner.append(gap)
    }

    fn list_for_scope(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
    ) -> StoreResult<Vec<GapRecord>> {
        self.inner.list_for_scope(sequence, scope)
    }
}

#[test]
fn release_retry_after_failed_gap_write_does_not_duplicate_gaps() {
    let definitions = Arc::new(InMemoryDefinitionStore::new());
    definitions.put(invoice_definition()).unwrap();
    let gaps = Arc::new(FlakyGapStore::failing_on(1));
    let manager = SequenceManager::new(
        definitions,
        Arc::new(InMemoryCounterStore::new()),
        Arc::new(InMemoryReservationStore::new()),
        gaps.clone(),
        Arc::new(InMemoryAuditLog::new()),
        Arc::new(ManualClock::new(start_of_2024())),
        EngineConfig::default(),
    );
    let scope = tenant_1();

    let reservation = manager.reserve(&seq(), &scope, 2, None, "batch").unwrap();
    // The second gap append fails mid-release, after the slot transitions
    // were already persisted.
    assert!(matches!(
        manager.release(reservation.id, "batch"),
        Err(SequenceError::Store(StoreError::Backend { .. }))
    ));

    // Retrying finds no reserved slots left and writes nothing, so the
    // already-recorded gap is not duplicated. The value whose gap write
    // was lost stays reconcilable as released-without-gap.
    manager.release(reservation.id, "batch").unwrap();
    let recorded = gaps.inner.records();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].value, reservation.slots[0].value);
}

#[test]
fn commit_slot_lifecycle_errors() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    let unknown = ReservationId::new();
    assert!(matches!(
        h.manager.commit_slot(unknown, 1, "batch"),
        Err(SequenceError::ReservationNotFound { .. })
    ));

    let reservation = h
        .manager
        .reserve(&seq(), &scope, 2, None, "batch")
        .unwrap();
    assert!(matches!(
        h.manager.commit_slot(reservation.id, 999, "batch"),
        Err(SequenceError::SlotNotFound { value: 999, .. })
    ));

    let value = reservation.slots[0].value;
    h.manager.commit_slot(reservation.id, value, "batch").unwrap();
    assert!(matches!(
        h.manager.commit_slot(reservation.id, value, "batch"),
        Err(SequenceError::SlotAlreadyTerminal {
            status: SlotStatus::Committed,
            ..
        })
    ));

    h.manager.release(reservation.id, "batch").unwrap();
    let released_value = reservation.slots[1].value;
    assert!(matches!(
        h.manager.commit_slot(reservation.id, released_value, "batch"),
        Err(SequenceError::SlotAlreadyTerminal {
            status: SlotStatus::Released,
            ..
        })
    ));
}

#[test]
fn reserve_zero_count_is_rejected() {
    let h = harness(invoice_definition());
    assert!(matches!(
        h.manager.reserve(&seq(), &tenant_1(), 0, None, "batch"),
        Err(SequenceError::InvalidCount { count: 0 })
    ));
}

#[test]
fn expired_reservation_slots_release_lazily() {
    let h = harness(invoice_definition());
    let scope = tenant_1();
    let expires_at = h.clock.now() + Duration::hours(1);

    let reservation = h
        .manager
        .reserve(&seq(), &scope, 3, Some(expires_at), "batch")
        .unwrap();
    h.clock.advance(Duration::hours(2));

    // The next inspection normalizes the overdue slots to released.
    let value = reservation.slots[0].value;
    assert!(matches!(
        h.manager.commit_slot(reservation.id, value, "batch"),
        Err(SequenceError::SlotAlreadyTerminal {
            status: SlotStatus::Released,
            ..
        })
    ));

    let gaps = h.gaps.list_for_scope(&seq(), &scope).unwrap();
    assert_eq!(gaps.len(), 3);
    assert!(gaps.iter().all(|g| g.reason == GapReason::ReleasedUnused));
    assert!(h
        .audit
        .records()
        .iter()
        .any(|r| r.operation == AuditOperation::ReleaseReservation));
}

#[test]
fn void_records_gap_without_touching_counter() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();
    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();

    let key = CounterKey::new(seq(), scope.clone(), PeriodKey::new("2024"));
    let before = h.counters.get(&key).unwrap().unwrap().current_value;

    h.manager
        .void(&seq(), &scope, 1, h.clock.now(), "credit note issued", "billing")
        .unwrap();

    let after = h.counters.get(&key).unwrap().unwrap().current_value;
    assert_eq!(before, after);

    let gaps = h.gaps.list_for_scope(&seq(), &scope).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(
        gaps[0].reason,
        GapReason::Voided {
            reason: "credit note issued".to_string()
        }
    );

    // Voided numbers stay consumed; numbering continues past them.
    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2024-00003"
    );
}

#[test]
fn void_requires_an_issued_number() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    // Nothing allocated at all.
    assert!(matches!(
        h.manager.void(&seq(), &scope, 7, h.clock.now(), "typo", "billing"),
        Err(SequenceError::UnknownVoidTarget { value: 7, .. })
    ));

    // Reserved but never committed numbers were not issued either.
    let reservation = h
        .manager
        .reserve(&seq(), &scope, 1, None, "batch")
        .unwrap();
    let value = reservation.slots[0].value;
    assert!(matches!(
        h.manager.void(&seq(), &scope, value, h.clock.now(), "typo", "billing"),
        Err(SequenceError::UnknownVoidTarget { .. })
    ));
}

#[test]
fn void_twice_is_rejected() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();
    h.manager
        .void(&seq(), &scope, 1, h.clock.now(), "duplicate", "billing")
        .unwrap();
    assert!(matches!(
        h.manager.void(&seq(), &scope, 1, h.clock.now(), "duplicate", "billing"),
        Err(SequenceError::AlreadyVoided { value: 1, .. })
    ));
    assert_eq!(h.gaps.records().len(), 1);
}

#[test]
fn void_distinguishes_same_value_across_periods() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    let issued_2024 = h.clock.now();
    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();
    h.manager
        .void(&seq(), &scope, 1, issued_2024, "cancelled", "billing")
        .unwrap();

    // After the yearly reset the counter restarts, so value 1 recurs as a
    // different number. Voiding it must succeed independently.
    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap());
    let issued_2025 = h.clock.now();
    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2025-00001"
    );
    h.manager
        .void(&seq(), &scope, 1, issued_2025, "cancelled", "billing")
        .unwrap();

    let gaps = h.gaps.list_for_scope(&seq(), &scope).unwrap();
    assert_eq!(gaps.len(), 2);
    assert_eq!(gaps[0].period, PeriodKey::new("2024"));
    assert_eq!(gaps[1].period, PeriodKey::new("2025"));

    // Each period's void stays independently guarded against repeats.
    assert!(matches!(
        h.manager
            .void(&seq(), &scope, 1, issued_2024, "again", "billing"),
        Err(SequenceError::AlreadyVoided { value: 1, .. })
    ));
}

#[test]
fn void_ignores_reservations_from_other_periods() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    let issued_2024 = h.clock.now();
    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();

    // A fresh reservation in the next period reuses numeric value 1; it
    // must not shadow the committed 2024 slot.
    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap());
    h.manager.reserve(&seq(), &scope, 1, None, "batch").unwrap();

    h.manager
        .void(&seq(), &scope, 1, issued_2024, "cancelled", "billing")
        .unwrap();

    // The 2025 value 1 is only reserved, never issued.
    assert!(matches!(
        h.manager.void(&seq(), &scope, 1, h.clock.now(), "typo", "billing"),
        Err(SequenceError::UnknownVoidTarget { value: 1, .. })
    ));
}

#[test]
fn yearly_reset_restarts_at_initial_value() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();
    let reservation = h
        .manager
        .reserve(&seq(), &scope, 1, None, "batch")
        .unwrap();
    h.manager.release(reservation.id, "batch").unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap());
    assert_eq!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap(),
        "INV-2025-00001"
    );

    // The prior period's counter row and gaps are untouched.
    let key_2024 = CounterKey::new(seq(), scope.clone(), PeriodKey::new("2024"));
    assert_eq!(h.counters.get(&key_2024).unwrap().unwrap().current_value, 2);
    let gaps = h.gaps.list_for_scope(&seq(), &scope).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].value, 2);
}

#[test]
fn missing_context_variable_consumes_no_value() {
    let h = harness(
        SequenceDefinition::new("invoice", "{Department}-{COUNTER:000}")
            .reset_policy(ResetPolicy::Never),
    );
    let scope = tenant_1();

    assert!(matches!(
        h.manager.generate(&seq(), &scope, &no_vars(), "billing"),
        Err(SequenceError::MissingContextVariable { .. })
    ));

    let vars = HashMap::from([("Department".to_string(), "SALES".to_string())]);
    assert_eq!(
        h.manager.generate(&seq(), &scope, &vars, "billing").unwrap(),
        "SALES-001"
    );
}

#[test]
fn unknown_sequence_is_a_typed_error() {
    let h = harness(invoice_definition());
    assert!(matches!(
        h.manager
            .generate(&SequenceName::new("nope"), &tenant_1(), &no_vars(), "x"),
        Err(SequenceError::DefinitionNotFound { .. })
    ));
}

#[test]
fn audit_trail_covers_every_state_change() {
    let h = harness(invoice_definition());
    let scope = tenant_1();

    h.manager.generate(&seq(), &scope, &no_vars(), "billing").unwrap();
    let reservation = h
        .manager
        .reserve(&seq(), &scope, 2, None, "batch")
        .unwrap();
    h.manager
        .commit_slot(reservation.id, reservation.slots[0].value, "batch")
        .unwrap();
    h.manager.release(reservation.id, "batch").unwrap();
    h.manager
        .void(&seq(), &scope, 1, h.clock.now(), "cancelled", "billing")
        .unwrap();

    let operations: Vec<AuditOperation> =
        h.audit.records().iter().map(|r| r.operation).collect();
    assert_eq!(
        operations,
        vec![
            AuditOperation::Generate,
            AuditOperation::Reserve,
            AuditOperation::CommitSlot,
            AuditOperation::ReleaseReservation,
            AuditOperation::Void,
        ]
    );

    // Preview changes nothing and leaves no audit trace.
    let audits = h.audit.records().len();
    h.manager.preview(&seq(), &scope, &no_vars()).unwrap();
    assert_eq!(h.audit.records().len(), audits);
}

#[test]
fn empty_actor_falls_back_to_configured_principal() {
    let h = harness(invoice_definition());
    h.manager
        .generate(&seq(), &tenant_1(), &no_vars(), "")
        .unwrap();
    assert_eq!(h.audit.records()[0].actor, "system");
}
