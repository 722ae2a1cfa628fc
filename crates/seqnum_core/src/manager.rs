//! The public-facing sequence orchestrator.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::counter::CounterService;
use crate::error::{SequenceError, SequenceResult};
use crate::pattern::TokenPlan;
use chrono::DateTime;
use chrono::Utc;
use seqnum_store::{
    AuditOperation, AuditRecord, AuditSink, CounterStore, GapReason, GapRecord, GapStore,
    InMemoryAuditLog, InMemoryCounterStore, InMemoryDefinitionStore, InMemoryGapStore,
    InMemoryReservationStore, PeriodKey, Reservation, ReservationId, ReservationSlot,
    ReservationStore, ScopeId, SequenceDefinition, SequenceDefinitionStore, SequenceName,
    SlotStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates formatting, atomic allocation, reservations, gap
/// accounting, and auditing behind one synchronous API.
///
/// Callers talk only to this type. Formatting is delegated to
/// [`TokenPlan`], numeric allocation to [`CounterService`]; gap and audit
/// records are written as side effects of releases and voids.
///
/// ## Reservation slot state machine
///
/// `Reserved -> Committed` (terminal) or `Reserved -> Released` (terminal,
/// one gap record). Slots of a reservation whose expiry has passed are
/// normalized to `Released` the next time any operation inspects the
/// reservation; no background task is involved.
pub struct SequenceManager {
    definitions: Arc<dyn SequenceDefinitionStore>,
    counters: CounterService,
    reservations: Arc<dyn ReservationStore>,
    gaps: Arc<dyn GapStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl SequenceManager {
    /// Creates a manager over injected stores.
    #[must_use]
    pub fn new(
        definitions: Arc<dyn SequenceDefinitionStore>,
        counters: Arc<dyn CounterStore>,
        reservations: Arc<dyn ReservationStore>,
        gaps: Arc<dyn GapStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let counter_service =
            CounterService::new(counters, clock.clone(), config.max_allocate_retries);
        Self {
            definitions,
            counters: counter_service,
            reservations,
            gaps,
            audit,
            clock,
            config,
        }
    }

    /// Creates a manager over fresh in-memory stores and the system clock.
    ///
    /// Handy for tests, examples, and ephemeral use; nothing survives the
    /// process.
    #[must_use]
    pub fn in_memory(definitions: Arc<InMemoryDefinitionStore>) -> Self {
        Self::new(
            definitions,
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(InMemoryReservationStore::new()),
            Arc::new(InMemoryGapStore::new()),
            Arc::new(InMemoryAuditLog::new()),
            Arc::new(SystemClock),
            EngineConfig::default(),
        )
    }

    /// Allocates, commits, and formats the next number in one call.
    ///
    /// Equivalent to a one-slot reservation followed immediately by a
    /// commit, with no observable reserved-uncommitted state in between.
    /// Context variables are validated *before* the counter moves, so a
    /// call with missing variables consumes nothing.
    ///
    /// # Errors
    ///
    /// `DefinitionNotFound`, `InvalidPattern`, `MissingContextVariable`,
    /// `AllocationConflict`, or a store error.
    pub fn generate(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        variables: &HashMap<String, String>,
        actor: &str,
    ) -> SequenceResult<String> {
        let definition = self.definition(sequence)?;
        let plan = TokenPlan::compile(&definition.pattern)?;
        if let Some(name) = plan.first_missing_variable(variables) {
            return Err(SequenceError::missing_variable(name));
        }

        let now = self.clock.now();
        let period = definition.reset_policy.period_key(now);
        let value = self.counters.allocate_one(&definition, scope, &period)?;

        // Persist the value as an already-committed single-slot reservation
        // so it stays traceable and voidable.
        let reservation = Reservation {
            id: ReservationId::new(),
            sequence: definition.name.clone(),
            scope: scope.clone(),
            period: period.clone(),
            slots: vec![ReservationSlot::committed(value)],
            created_at: now,
            expires_at: None,
        };
        self.reservations.insert(&reservation)?;
        self.write_audit(AuditOperation::Generate, sequence, scope, vec![value], actor)?;

        let rendered = plan.render(value, variables, now)?;
        debug!(%sequence, %scope, value, number = %rendered, "generated number");
        Ok(rendered)
    }

    /// Formats the number the next `generate` would return, without
    /// mutating anything.
    ///
    /// Repeated calls with no intervening allocation return the same
    /// string.
    ///
    /// # Errors
    ///
    /// `DefinitionNotFound`, `InvalidPattern`, `MissingContextVariable`,
    /// or a store error.
    pub fn preview(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        variables: &HashMap<String, String>,
    ) -> SequenceResult<String> {
        let definition = self.definition(sequence)?;
        let plan = TokenPlan::compile(&definition.pattern)?;
        let now = self.clock.now();
        let period = definition.reset_policy.period_key(now);
        let next = self.counters.peek_next(&definition, scope, &period)?;
        plan.render(next, variables, now)
    }

    /// Provisionally allocates a batch of `count` values.
    ///
    /// Each value becomes a `Reserved` slot that the caller commits or
    /// releases individually. Slots still `Reserved` past `expires_at` are
    /// treated as released on next inspection.
    ///
    /// # Errors
    ///
    /// `InvalidCount` when `count` is zero; otherwise `DefinitionNotFound`,
    /// `AllocationConflict`, or a store error.
    pub fn reserve(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        count: u64,
        expires_at: Option<DateTime<Utc>>,
        actor: &str,
    ) -> SequenceResult<Reservation> {
        if count == 0 {
            return Err(SequenceError::InvalidCount { count });
        }
        let definition = self.definition(sequence)?;
        let now = self.clock.now();
        let period = definition.reset_policy.period_key(now);
        let values = self.counters.allocate(&definition, scope, &period, count)?;

        let reservation = Reservation {
            id: ReservationId::new(),
            sequence: definition.name.clone(),
            scope: scope.clone(),
            period: period.clone(),
            slots: values.iter().map(|v| ReservationSlot::reserved(*v)).collect(),
            created_at: now,
            expires_at,
        };
        self.reservations.insert(&reservation)?;
        self.write_audit(AuditOperation::Reserve, sequence, scope, values, actor)?;
        debug!(%sequence, %scope, id = %reservation.id, count, "reserved values");
        Ok(reservation)
    }

    /// Transitions one `Reserved` slot to `Committed`.
    ///
    /// # Errors
    ///
    /// `ReservationNotFound`, `SlotNotFound`, or `SlotAlreadyTerminal`
    /// (including slots released by lazy expiry before this call was
    /// inspected), or a store error.
    pub fn commit_slot(
        &self,
        id: ReservationId,
        value: u64,
        actor: &str,
    ) -> SequenceResult<()> {
        let mut reservation = self.load(id)?;
        self.expire_overdue(&mut reservation, actor)?;

        let Some(position) = reservation.slots.iter().position(|s| s.value == value) else {
            return Err(SequenceError::SlotNotFound { id, value });
        };
        let status = reservation.slots[position].status;
        if status.is_terminal() {
            return Err(SequenceError::SlotAlreadyTerminal { id, value, status });
        }

        reservation.slots[position].status = SlotStatus::Committed;
        self.reservations.update(&reservation)?;
        let sequence = reservation.sequence.clone();
        let scope = reservation.scope.clone();
        self.write_audit(AuditOperation::CommitSlot, &sequence, &scope, vec![value], actor)?;
        debug!(%id, value, "committed reservation slot");
        Ok(())
    }

    /// Releases every still-`Reserved` slot of a reservation.
    ///
    /// One gap record with reason `released_unused` is written per released
    /// slot. Releasing a fully-terminal reservation is a no-op, not an
    /// error.
    ///
    /// # Errors
    ///
    /// `ReservationNotFound` or a store error.
    pub fn release(&self, id: ReservationId, actor: &str) -> SequenceResult<()> {
        let mut reservation = self.load(id)?;
        // Overdue slots are already released (and gap-accounted) by the
        // normalization; whatever is left is released explicitly here.
        self.expire_overdue(&mut reservation, actor)?;

        let sequence = reservation.sequence.clone();
        let scope = reservation.scope.clone();
        let period = reservation.period.clone();
        let mut released = Vec::new();
        for slot in &mut reservation.slots {
            if slot.status == SlotStatus::Reserved {
                slot.status = SlotStatus::Released;
                released.push(slot.value);
            }
        }
        if released.is_empty() {
            return Ok(());
        }

        // Slot transitions are persisted before gap records so a failed gap
        // write cannot be retried into duplicate gaps: a retry finds no
        // `Reserved` slots left and writes nothing.
        self.reservations.update(&reservation)?;
        for &value in &released {
            self.record_gap(
                &sequence,
                &scope,
                &period,
                value,
                GapReason::ReleasedUnused,
                actor,
            )?;
        }
        self.write_audit(
            AuditOperation::ReleaseReservation,
            &sequence,
            &scope,
            released,
            actor,
        )?;
        debug!(%id, "released reservation");
        Ok(())
    }

    /// Voids a previously issued (committed) number.
    ///
    /// Counters restart per reset period, so a numeric value alone does not
    /// identify a number; `issued_at` pins the void to the period the
    /// number was issued in (for a never-resetting sequence any instant
    /// works). Writes a gap record carrying the caller's reason. The
    /// counter is never decremented; voided numbers are permanently
    /// consumed.
    ///
    /// # Errors
    ///
    /// `UnknownVoidTarget` when no committed slot holds `value` for this
    /// sequence/scope/period, `AlreadyVoided` on a repeated void, or a
    /// store error.
    pub fn void(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        value: u64,
        issued_at: DateTime<Utc>,
        reason: &str,
        actor: &str,
    ) -> SequenceResult<()> {
        let definition = self.definition(sequence)?;
        let period = definition.reset_policy.period_key(issued_at);
        match self.reservations.find_slot(sequence, scope, &period, value)? {
            Some((_, SlotStatus::Committed)) => {}
            // Reserved or released values were never issued.
            _ => {
                return Err(SequenceError::unknown_void_target(
                    sequence.as_str(),
                    scope.as_str(),
                    value,
                ));
            }
        }

        let voided_before = self
            .gaps
            .list_for_scope(sequence, scope)?
            .iter()
            .any(|g| {
                g.value == value
                    && g.period == period
                    && matches!(g.reason, GapReason::Voided { .. })
            });
        if voided_before {
            return Err(SequenceError::already_voided(
                sequence.as_str(),
                scope.as_str(),
                value,
            ));
        }

        self.record_gap(
            sequence,
            scope,
            &period,
            value,
            GapReason::Voided {
                reason: reason.to_string(),
            },
            actor,
        )?;
        self.write_audit(AuditOperation::Void, sequence, scope, vec![value], actor)?;
        debug!(%sequence, %scope, value, reason, "voided number");
        Ok(())
    }

    fn load(&self, id: ReservationId) -> SequenceResult<Reservation> {
        self.reservations
            .get(id)?
            .ok_or(SequenceError::ReservationNotFound { id })
    }

    fn definition(&self, sequence: &SequenceName) -> SequenceResult<SequenceDefinition> {
        self.definitions
            .get(sequence)?
            .ok_or_else(|| SequenceError::definition_not_found(sequence.as_str()))
    }

    /// Normalizes slots of an expired reservation to `Released`, writing
    /// one gap per slot, exactly like an explicit release.
    fn expire_overdue(
        &self,
        reservation: &mut Reservation,
        actor: &str,
    ) -> SequenceResult<()> {
        if !reservation.is_expired(self.clock.now()) {
            return Ok(());
        }
        let sequence = reservation.sequence.clone();
        let scope = reservation.scope.clone();
        let period = reservation.period.clone();
        let mut expired = Vec::new();
        for slot in &mut reservation.slots {
            if slot.status == SlotStatus::Reserved {
                slot.status = SlotStatus::Released;
                expired.push(slot.value);
            }
        }
        if expired.is_empty() {
            return Ok(());
        }

        warn!(id = %reservation.id, values = ?expired, "reservation expired; releasing slots");
        // Same write order as an explicit release: slot transitions first,
        // then gap records, so retries cannot duplicate gaps.
        self.reservations.update(reservation)?;
        for &value in &expired {
            self.record_gap(
                &sequence,
                &scope,
                &period,
                value,
                GapReason::ReleasedUnused,
                actor,
            )?;
        }
        self.write_audit(
            AuditOperation::ReleaseReservation,
            &sequence,
            &scope,
            expired,
            actor,
        )?;
        Ok(())
    }

    fn record_gap(
        &self,
        sequence: &SequenceName,
        scope: &ScopeId,
        period: &PeriodKey,
        value: u64,
        reason: GapReason,
        actor: &str,
    ) -> SequenceResult<()> {
        self.gaps.append(GapRecord {
            sequence: sequence.clone(),
            scope: scope.clone(),
            period: period.clone(),
            value,
            reason,
            occurred_at: self.clock.now(),
            actor: self.resolve_actor(actor).to_string(),
        })?;
        Ok(())
    }

    fn write_audit(
        &self,
        operation: AuditOperation,
        sequence: &SequenceName,
        scope: &ScopeId,
        values: Vec<u64>,
        actor: &str,
    ) -> SequenceResult<()> {
        self.audit.append(AuditRecord {
            operation,
            sequence: sequence.clone(),
            scope: scope.clone(),
            values,
            actor: self.resolve_actor(actor).to_string(),
            recorded_at: self.clock.now(),
        })?;
        Ok(())
    }

    fn resolve_actor<'a>(&'a self, actor: &'a str) -> &'a str {
        if actor.is_empty() {
            &self.config.fallback_actor
        } else {
            actor
        }
    }
}
