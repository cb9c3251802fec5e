//! Property tests for the queen's worker-type selection.

use proptest::prelude::*;

use hivemind::domain::models::WorkerType;
use hivemind::services::queen::{analyze_objective, fill_worker_roster, select_worker_types};

proptest! {
    #[test]
    fn selection_is_deterministic(objective in ".{0,120}") {
        let a1 = analyze_objective(&objective);
        let a2 = analyze_objective(&objective);
        let s1 = select_worker_types(None, &objective, Some(&a1));
        let s2 = select_worker_types(None, &objective, Some(&a2));
        prop_assert_eq!(s1, s2);
    }

    #[test]
    fn selection_is_bounded_and_deduped(objective in ".{0,120}") {
        let analysis = analyze_objective(&objective);
        let selected = select_worker_types(None, &objective, Some(&analysis));
        prop_assert!(selected.len() >= 3);
        prop_assert!(selected.len() <= 8);
        let unique: std::collections::HashSet<_> = selected.iter().collect();
        prop_assert_eq!(unique.len(), selected.len(), "no duplicate types");
    }

    #[test]
    fn selection_always_contains_researcher(objective in "[a-z ]{0,80}") {
        let analysis = analyze_objective(&objective);
        let selected = select_worker_types(None, &objective, Some(&analysis));
        prop_assert!(selected.contains(&WorkerType::Researcher));
    }

    #[test]
    fn fallback_selection_holds_without_analysis(objective in ".{0,120}") {
        let selected = select_worker_types(None, &objective, None);
        prop_assert!(selected.len() >= 3);
        prop_assert!(selected.len() <= 8);
    }

    #[test]
    fn roster_fills_exactly_to_count(count in 1usize..32) {
        let selection = vec![WorkerType::Coder, WorkerType::Tester];
        let roster = fill_worker_roster(&selection, count);
        prop_assert_eq!(roster.len(), count);
    }

    #[test]
    fn explicit_selection_is_untouched(picks in proptest::collection::vec(0usize..8, 1..8)) {
        let explicit: Vec<WorkerType> =
            picks.iter().map(|i| WorkerType::ALL[*i]).collect();
        let selected = select_worker_types(Some(&explicit), "anything at all", None);
        prop_assert_eq!(selected, explicit);
    }
}
