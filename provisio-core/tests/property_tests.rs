//! Property-based tests for provisio-core
//!
//! Verifies invariants that should hold for every `Progress` value,
//! regardless of the specific cursor position or percentage reported.

use proptest::prelude::*;
use provisio_core::Progress;

prop_compose! {
    fn arb_progress()(
        step_number in 0usize..1000,
        total_steps in 1usize..1000,
        percent_complete in 0u8..=100,
    ) -> Progress {
        Progress {
            step_number: step_number.min(total_steps),
            total_steps,
            current_step_name: "step".to_string(),
            sub_step_description: None,
            percent_complete,
        }
    }
}

proptest! {
    #[test]
    fn overall_percent_never_exceeds_100(progress in arb_progress()) {
        prop_assert!(progress.overall_percent() <= 100);
    }

    #[test]
    fn overall_percent_is_monotonic_in_step_number(
        total_steps in 1usize..1000,
        percent_complete in 0u8..=100,
        earlier_step in 0usize..500,
        later_step_offset in 0usize..500,
    ) {
        let earlier_step = earlier_step.min(total_steps);
        let later_step = (earlier_step + later_step_offset).min(total_steps);

        let earlier = Progress {
            step_number: earlier_step,
            total_steps,
            current_step_name: "step".to_string(),
            sub_step_description: None,
            percent_complete,
        };
        let later = Progress {
            step_number: later_step,
            total_steps,
            current_step_name: "step".to_string(),
            sub_step_description: None,
            percent_complete,
        };

        prop_assert!(later.overall_percent() >= earlier.overall_percent());
    }

    #[test]
    fn overall_percent_is_zero_when_no_steps(percent_complete in 0u8..=100) {
        let progress = Progress {
            step_number: 0,
            total_steps: 0,
            current_step_name: "step".to_string(),
            sub_step_description: None,
            percent_complete,
        };
        prop_assert_eq!(progress.overall_percent(), 0);
    }
}
