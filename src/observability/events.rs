//! Observable events of the paginated query engine
//!
//! Every warning or timing record the engine emits carries one of these names
//! in its `event` field. Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Request exceeded the slow-query threshold
    SlowQuery,
    /// Per-phase elapsed times of one request
    PhaseTiming,
    /// A filter set failed validation and was dropped
    FiltersDiscarded,
    /// The collection has no indexed search column
    SearchIndexAbsent,
    /// The search column probe failed; treated as absent
    SearchIndexProbeFailed,
    /// A count strategy failed and the next one was tried
    CountFallback,
    /// The estimator was not applicable and an exact count was used
    EstimatorSkipped,
    /// Row hydration failed; rows returned un-enriched
    HydrationFailed,
    /// Pagination failed with an internal error
    PaginationFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SlowQuery => "slow_query",
            Event::PhaseTiming => "phase_timing",
            Event::FiltersDiscarded => "filters_discarded",
            Event::SearchIndexAbsent => "search_index_absent",
            Event::SearchIndexProbeFailed => "search_index_probe_failed",
            Event::CountFallback => "count_fallback",
            Event::EstimatorSkipped => "estimator_skipped",
            Event::HydrationFailed => "hydration_failed",
            Event::PaginationFailed => "pagination_failed",
        }
    }

    /// Returns true if the event means the request produced no page
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::PaginationFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_snake_case_names() {
        let events = [
            Event::SlowQuery,
            Event::PhaseTiming,
            Event::FiltersDiscarded,
            Event::SearchIndexAbsent,
            Event::SearchIndexProbeFailed,
            Event::CountFallback,
            Event::EstimatorSkipped,
            Event::HydrationFailed,
            Event::PaginationFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::PaginationFailed.is_failure());
        assert!(!Event::CountFallback.is_failure());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Event::FiltersDiscarded), "filters_discarded");
    }
}
