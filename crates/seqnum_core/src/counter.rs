//! Atomic counter allocation.

use crate::clock::Clock;
use crate::error::{SequenceError, SequenceResult};
use seqnum_store::{CounterKey, CounterState, CounterStore, PeriodKey, ScopeId, SequenceDefinition};
use std::sync::Arc;
use tracing::{debug, warn};

/// The sole atomic-allocation authority.
///
/// All counter mutation funnels through [`CounterService::allocate`], which
/// is a bounded compare-and-swap retry loop over the injected
/// [`CounterStore`]. Concurrent callers on the same
/// `(sequence, scope, period)` key never observe overlapping ranges;
/// different keys never contend.
///
/// A reset-period transition is nothing special here: the new period is a
/// new [`CounterKey`], so a fresh row starts at the definition's initial
/// value while the prior period's row stays readable forever.
pub struct CounterService {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl CounterService {
    /// Creates a counter service over a store.
    ///
    /// `max_retries` bounds the compare-and-swap loop; when exhausted,
    /// allocation surfaces [`SequenceError::AllocationConflict`] instead of
    /// stalling the caller.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, max_retries: u32) -> Self {
        Self {
            store,
            clock,
            max_retries,
        }
    }

    /// Computes the next value for a key without mutating anything.
    ///
    /// Returns the definition's initial value when no allocation has
    /// happened for this key yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub fn peek_next(
        &self,
        definition: &SequenceDefinition,
        scope: &ScopeId,
        period: &PeriodKey,
    ) -> SequenceResult<u64> {
        let key = CounterKey::new(definition.name.clone(), scope.clone(), period.clone());
        Ok(match self.store.get(&key)? {
            Some(state) => state.current_value + definition.step,
            None => definition.initial_value,
        })
    }

    /// Atomically allocates `count` contiguous values for a key.
    ///
    /// Returns the allocated values in increasing order. On the first
    /// allocation for a key, the returned range starts at the definition's
    /// initial value.
    ///
    /// # Errors
    ///
    /// - [`SequenceError::InvalidCount`] if `count` is zero
    /// - [`SequenceError::AllocationConflict`] when every compare-and-swap
    ///   attempt lost its race
    /// - any store error, passed through
    pub fn allocate(
        &self,
        definition: &SequenceDefinition,
        scope: &ScopeId,
        period: &PeriodKey,
        count: u64,
    ) -> SequenceResult<Vec<u64>> {
        if count == 0 {
            return Err(SequenceError::InvalidCount { count });
        }
        let key = CounterKey::new(definition.name.clone(), scope.clone(), period.clone());

        for attempt in 1..=self.max_retries {
            let observed = self.store.get(&key)?;
            let first = match &observed {
                Some(state) => state.current_value + definition.step,
                None => definition.initial_value,
            };
            let last = first + (count - 1) * definition.step;
            let advanced = CounterState {
                current_value: last,
                last_allocated_at: self.clock.now(),
            };

            if self.store.compare_and_swap(&key, observed.as_ref(), advanced)? {
                debug!(%key, first, last, count, attempt, "allocated counter range");
                return Ok((0..count).map(|i| first + i * definition.step).collect());
            }
            // Lost the race; re-read and try again.
        }

        warn!(%key, attempts = self.max_retries, "counter allocation exhausted retries");
        Err(SequenceError::allocation_conflict(
            definition.name.as_str(),
            scope.as_str(),
            self.max_retries,
        ))
    }

    /// Single-value convenience form of [`CounterService::allocate`].
    ///
    /// # Errors
    ///
    /// Same as [`CounterService::allocate`].
    pub fn allocate_one(
        &self,
        definition: &SequenceDefinition,
        scope: &ScopeId,
        period: &PeriodKey,
    ) -> SequenceResult<u64> {
        self.allocate(definition, scope, period, 1).map(|values| values[0])
    }
}
