//! Domain record types shared by the store traits and the engine.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique name of a sequence definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceName(String);

impl SequenceName {
    /// Creates a sequence name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SequenceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Key partitioning counters, e.g. a tenant id.
///
/// Independent scopes get independent numbering and never contend with
/// each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl ScopeId {
    /// Creates a scope identifier.
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// The well-known scope of globally-numbered sequences.
    #[must_use]
    pub fn global() -> Self {
        Self::new("global")
    }

    /// Returns the scope as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(scope: &str) -> Self {
        Self::new(scope)
    }
}

/// Derived key that restarts a counter under a reset policy.
///
/// The empty key is used by [`ResetPolicy::Never`]; yearly/monthly/daily
/// policies derive `"2024"`, `"2024-03"`, `"2024-03-17"` style keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// Creates a period key from a pre-derived string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key of sequences that never reset.
    #[must_use]
    pub fn none() -> Self {
        Self(String::new())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a sequence's counters are partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    /// One counter shared by all callers.
    Global,
    /// One counter per tenant.
    PerTenant,
    /// One counter per caller-chosen key.
    CustomKey,
}

/// When a sequence's counter restarts at its initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPolicy {
    /// The counter never resets.
    Never,
    /// A fresh counter per calendar year.
    Yearly,
    /// A fresh counter per calendar month.
    Monthly,
    /// A fresh counter per calendar day.
    Daily,
}

impl ResetPolicy {
    /// Derives the reset-period key for a point in time.
    ///
    /// Two instants map to the same key exactly when they fall in the same
    /// reset period, so a key change is what triggers a counter restart.
    #[must_use]
    pub fn period_key(&self, at: DateTime<Utc>) -> PeriodKey {
        match self {
            Self::Never => PeriodKey::none(),
            Self::Yearly => PeriodKey::new(format!("{:04}", at.year())),
            Self::Monthly => PeriodKey::new(format!("{:04}-{:02}", at.year(), at.month())),
            Self::Daily => {
                PeriodKey::new(format!("{:04}-{:02}-{:02}", at.year(), at.month(), at.day()))
            }
        }
    }
}

/// Immutable configuration of one numbered sequence.
///
/// Definitions are created at setup time and never mutated at runtime; the
/// engine treats them as read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Unique name, the lookup key.
    pub name: SequenceName,
    /// Format template, e.g. `INV-{YEAR}-{COUNTER:00001}`.
    pub pattern: String,
    /// How counters are partitioned across callers.
    pub scope_kind: ScopeKind,
    /// When the counter restarts.
    pub reset_policy: ResetPolicy,
    /// Increment between consecutive values.
    pub step: u64,
    /// First value handed out for a fresh counter.
    pub initial_value: u64,
}

impl SequenceDefinition {
    /// Creates a definition with the default scope (global), no reset,
    /// step 1 and initial value 1.
    pub fn new(name: impl Into<SequenceName>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            scope_kind: ScopeKind::Global,
            reset_policy: ResetPolicy::Never,
            step: 1,
            initial_value: 1,
        }
    }

    /// Sets the scope kind.
    #[must_use]
    pub const fn scope_kind(mut self, kind: ScopeKind) -> Self {
        self.scope_kind = kind;
        self
    }

    /// Sets the reset policy.
    #[must_use]
    pub const fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Sets the increment between consecutive values.
    #[must_use]
    pub const fn step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Sets the first value of a fresh counter.
    #[must_use]
    pub const fn initial_value(mut self, value: u64) -> Self {
        self.initial_value = value;
        self
    }
}

/// Key of one counter row: `(sequence, scope, reset period)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    /// The owning sequence.
    pub sequence: SequenceName,
    /// The scope partition.
    pub scope: ScopeId,
    /// The reset period.
    pub period: PeriodKey,
}

impl CounterKey {
    /// Creates a counter key.
    #[must_use]
    pub fn new(sequence: SequenceName, scope: ScopeId, period: PeriodKey) -> Self {
        Self {
            sequence,
            scope,
            period,
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.sequence, self.scope, self.period)
    }
}

/// Mutable state of one counter row.
///
/// Owned exclusively by the engine's counter service; `current_value` is
/// monotonically non-decreasing within a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Highest value allocated so far.
    pub current_value: u64,
    /// When the last allocation happened.
    pub last_allocated_at: DateTime<Utc>,
}

/// Unique identifier of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random reservation id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a reservation id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one reservation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    /// Provisionally allocated, not yet consumed.
    Reserved,
    /// Consumed by the caller. Terminal.
    Committed,
    /// Never consumed; explained by a gap record. Terminal.
    Released,
}

impl SlotStatus {
    /// Whether the slot can no longer transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Released)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reserved => "reserved",
            Self::Committed => "committed",
            Self::Released => "released",
        })
    }
}

/// One value inside a reservation, individually trackable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSlot {
    /// The allocated counter value.
    pub value: u64,
    /// Current lifecycle state.
    pub status: SlotStatus,
}

impl ReservationSlot {
    /// Creates a slot in the `Reserved` state.
    #[must_use]
    pub const fn reserved(value: u64) -> Self {
        Self {
            value,
            status: SlotStatus::Reserved,
        }
    }

    /// Creates a slot that is already `Committed`.
    #[must_use]
    pub const fn committed(value: u64) -> Self {
        Self {
            value,
            status: SlotStatus::Committed,
        }
    }
}

/// A batch of provisionally-allocated values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique id.
    pub id: ReservationId,
    /// The owning sequence.
    pub sequence: SequenceName,
    /// The scope the values were allocated in.
    pub scope: ScopeId,
    /// The reset period the values were allocated in.
    pub period: PeriodKey,
    /// The allocated values, in allocation order.
    pub slots: Vec<ReservationSlot>,
    /// When the reservation was created.
    pub created_at: DateTime<Utc>,
    /// After this instant, still-`Reserved` slots are treated as released.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Returns the slot holding `value`, if any.
    #[must_use]
    pub fn slot(&self, value: u64) -> Option<&ReservationSlot> {
        self.slots.iter().find(|s| s.value == value)
    }

    /// Whether every slot has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.slots.iter().all(|s| s.status.is_terminal())
    }

    /// Whether the reservation's expiry has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Why an allocated value was never issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapReason {
    /// A reservation slot was released (explicitly or by expiry).
    ReleasedUnused,
    /// An issued number was voided with the caller-supplied reason.
    Voided {
        /// The business reason supplied by the caller.
        reason: String,
    },
}

impl fmt::Display for GapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReleasedUnused => f.write_str("released_unused"),
            Self::Voided { reason } => write!(f, "voided: {reason}"),
        }
    }
}

/// Permanent record explaining a value missing from the issued set.
///
/// Gap records are append-only and never deleted; a gap value is never
/// reallocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRecord {
    /// The owning sequence.
    pub sequence: SequenceName,
    /// The scope the value was allocated in.
    pub scope: ScopeId,
    /// The reset period the value was allocated in. Counter values restart
    /// per period, so the period is part of a gap's identity.
    pub period: PeriodKey,
    /// The unissued value.
    pub value: u64,
    /// Why the value was never issued.
    pub reason: GapReason,
    /// When the gap was recorded.
    pub occurred_at: DateTime<Utc>,
    /// The principal responsible for the operation that caused the gap.
    pub actor: String,
}

/// Kind of state-changing engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOperation {
    /// Single-shot allocate-and-commit.
    Generate,
    /// Batch reservation of values.
    Reserve,
    /// One slot transitioned to committed.
    CommitSlot,
    /// Remaining reserved slots released.
    ReleaseReservation,
    /// An issued number voided.
    Void,
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generate => "generate",
            Self::Reserve => "reserve",
            Self::CommitSlot => "commit_slot",
            Self::ReleaseReservation => "release_reservation",
            Self::Void => "void",
        })
    }
}

/// Append-only record of one state-changing engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Which operation ran.
    pub operation: AuditOperation,
    /// The sequence it ran against.
    pub sequence: SequenceName,
    /// The scope it ran in.
    pub scope: ScopeId,
    /// The counter values it affected, in allocation order.
    pub values: Vec<u64>,
    /// The acting principal.
    pub actor: String,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
}
