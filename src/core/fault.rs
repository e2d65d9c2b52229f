use std::collections::HashMap;

use crate::error::BatchError;

/// Failure categories a fault can be classified under.
///
/// The category drives the per-step fault policy: a category can be declared
/// fatal (never retried, never skipped) and every occurrence is counted per
/// category on the step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    /// The item itself is malformed or violates a business rule.
    Validation,
    /// A processing stage failed for a reason unrelated to item validity.
    Processing,
    /// The environment failed: I/O, storage, transport.
    Infrastructure,
}

impl FaultCategory {
    /// Classifies an engine error.
    pub fn of(error: &BatchError) -> FaultCategory {
        match error {
            BatchError::Validation(_) => FaultCategory::Validation,
            BatchError::ItemProcessor(_) => FaultCategory::Processing,
            _ => FaultCategory::Infrastructure,
        }
    }
}

/// What the engine does with a failed item or a failed chunk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDecision {
    /// Re-run the item through the whole processing chain, or re-attempt the
    /// whole chunk write.
    Retry,
    /// Drop the item and continue; the writer never sees it.
    Skip,
    /// Abort the step.
    Fatal,
}

/// Per-step fault tolerance configuration.
///
/// The decision functions are pure: the caller passes in the current
/// counters and nothing else is consulted, so a policy can be unit tested
/// without constructing an engine.
///
/// # Examples
///
/// ```
/// use batchline::core::fault::{FaultCategory, FaultDecision, FaultPolicy};
///
/// let policy = FaultPolicy::new(1, 2).fatal_on(FaultCategory::Infrastructure);
///
/// // First failure of an item: one retry is budgeted.
/// assert_eq!(
///     policy.decide_item(FaultCategory::Validation, 0, 0),
///     FaultDecision::Retry
/// );
/// // Retry budget exhausted, skip budget still open.
/// assert_eq!(
///     policy.decide_item(FaultCategory::Validation, 1, 0),
///     FaultDecision::Skip
/// );
/// // Fatal categories short-circuit everything.
/// assert_eq!(
///     policy.decide_item(FaultCategory::Infrastructure, 0, 0),
///     FaultDecision::Fatal
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct FaultPolicy {
    retry_limit: usize,
    skip_limit: usize,
    fatal_categories: Vec<FaultCategory>,
}

impl FaultPolicy {
    pub fn new(retry_limit: usize, skip_limit: usize) -> FaultPolicy {
        FaultPolicy {
            retry_limit,
            skip_limit,
            fatal_categories: Vec::new(),
        }
    }

    /// Marks a category as neither retryable nor skippable: any failure of
    /// this category aborts the step immediately.
    pub fn fatal_on(mut self, category: FaultCategory) -> FaultPolicy {
        if !self.fatal_categories.contains(&category) {
            self.fatal_categories.push(category);
        }
        self
    }

    fn is_fatal_category(&self, category: FaultCategory) -> bool {
        self.fatal_categories.contains(&category)
    }

    /// Decides what to do with a failed item.
    ///
    /// `retries` is the number of times this item has already been retried;
    /// `skips` is the step's current skip count. Evaluation order: fatal
    /// category, then retry budget, then skip budget, then fatal.
    pub fn decide_item(
        &self,
        category: FaultCategory,
        retries: usize,
        skips: usize,
    ) -> FaultDecision {
        if self.is_fatal_category(category) {
            return FaultDecision::Fatal;
        }
        if retries < self.retry_limit {
            return FaultDecision::Retry;
        }
        if skips < self.skip_limit {
            return FaultDecision::Skip;
        }
        FaultDecision::Fatal
    }

    /// Decides what to do with a failed chunk write.
    ///
    /// A chunk write is all-or-nothing, so the skip branch does not apply:
    /// the write is either re-attempted as a whole or the step aborts.
    pub fn decide_write(&self, category: FaultCategory, retries: usize) -> FaultDecision {
        if self.is_fatal_category(category) {
            return FaultDecision::Fatal;
        }
        if retries < self.retry_limit {
            return FaultDecision::Retry;
        }
        FaultDecision::Fatal
    }
}

/// Per-category failure occurrence counts for one step execution.
///
/// The counters live on the `StepExecution` and are updated through the same
/// synchronized path as the read/write/skip counters; they reset with a
/// fresh run of the step, not on chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct FaultCounters {
    counts: HashMap<FaultCategory, usize>,
}

impl FaultCounters {
    pub fn record(&mut self, category: FaultCategory) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn count(&self, category: FaultCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Total failure occurrences across all categories.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_is_consulted_before_skip_budget() {
        let policy = FaultPolicy::new(2, 1);

        assert_eq!(
            policy.decide_item(FaultCategory::Validation, 0, 0),
            FaultDecision::Retry
        );
        assert_eq!(
            policy.decide_item(FaultCategory::Validation, 1, 0),
            FaultDecision::Retry
        );
        assert_eq!(
            policy.decide_item(FaultCategory::Validation, 2, 0),
            FaultDecision::Skip
        );
    }

    #[test]
    fn exhausted_skip_budget_escalates_to_fatal() {
        let policy = FaultPolicy::new(0, 2);

        assert_eq!(
            policy.decide_item(FaultCategory::Processing, 0, 1),
            FaultDecision::Skip
        );
        assert_eq!(
            policy.decide_item(FaultCategory::Processing, 0, 2),
            FaultDecision::Fatal
        );
    }

    #[test]
    fn fatal_category_overrides_remaining_budgets() {
        let policy = FaultPolicy::new(5, 5).fatal_on(FaultCategory::Validation);

        assert_eq!(
            policy.decide_item(FaultCategory::Validation, 0, 0),
            FaultDecision::Fatal
        );
        assert_eq!(
            policy.decide_item(FaultCategory::Processing, 0, 0),
            FaultDecision::Retry
        );
    }

    #[test]
    fn write_decision_never_skips() {
        let policy = FaultPolicy::new(1, 100);

        assert_eq!(
            policy.decide_write(FaultCategory::Infrastructure, 0),
            FaultDecision::Retry
        );
        assert_eq!(
            policy.decide_write(FaultCategory::Infrastructure, 1),
            FaultDecision::Fatal
        );
    }

    #[test]
    fn zero_limits_mean_first_failure_is_fatal() {
        let policy = FaultPolicy::new(0, 0);

        assert_eq!(
            policy.decide_item(FaultCategory::Validation, 0, 0),
            FaultDecision::Fatal
        );
    }

    #[test]
    fn counters_accumulate_per_category() {
        let mut counters = FaultCounters::default();
        counters.record(FaultCategory::Validation);
        counters.record(FaultCategory::Validation);
        counters.record(FaultCategory::Infrastructure);

        assert_eq!(counters.count(FaultCategory::Validation), 2);
        assert_eq!(counters.count(FaultCategory::Infrastructure), 1);
        assert_eq!(counters.count(FaultCategory::Processing), 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn errors_map_to_their_category() {
        assert_eq!(
            FaultCategory::of(&BatchError::Validation("bad email".to_string())),
            FaultCategory::Validation
        );
        assert_eq!(
            FaultCategory::of(&BatchError::ItemProcessor("boom".to_string())),
            FaultCategory::Processing
        );
        assert_eq!(
            FaultCategory::of(&BatchError::ItemWriter("disk full".to_string())),
            FaultCategory::Infrastructure
        );
    }
}
