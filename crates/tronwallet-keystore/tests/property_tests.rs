//! Property-based tests for tier selection
//!
//! Uses proptest to verify the selection rule across randomized levels

use proptest::prelude::*;
use tronwallet_keystore::{select_tier, CapabilityTier, InitializationState, PlatformLevel};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Platform levels around and beyond every tier boundary
fn level_strategy() -> impl Strategy<Value = PlatformLevel> {
    (0u32..=64).prop_map(PlatformLevel)
}

// ============================================================================
// Selection Properties
// ============================================================================

proptest! {
    /// Property: first run picks the highest tier whose minimum is <= the live level
    #[test]
    fn prop_first_run_picks_highest_satisfied(current in level_strategy()) {
        let tier = select_tier(&InitializationState::first_run(), current);

        let expected = CapabilityTier::ALL
            .iter()
            .copied()
            .filter(|t| t.min_level() <= current)
            .max()
            .unwrap_or(CapabilityTier::LOWEST);
        prop_assert_eq!(tier, expected);
    }

    /// Property: an initialized wallet ignores the live level
    #[test]
    fn prop_initialized_ignores_current(
        recorded in level_strategy(),
        current_a in level_strategy(),
        current_b in level_strategy()
    ) {
        let state = InitializationState::initialized_at(recorded);
        prop_assert_eq!(select_tier(&state, current_a), select_tier(&state, current_b));
        prop_assert_eq!(select_tier(&state, current_a), CapabilityTier::for_level(recorded));
    }

    /// Property: more capable platforms never select a weaker tier
    #[test]
    fn prop_selection_monotonic(a in level_strategy(), b in level_strategy()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(CapabilityTier::for_level(low) <= CapabilityTier::for_level(high));
    }

    /// Property: recording a tier's minimum level pins exactly that tier
    #[test]
    fn prop_recorded_min_level_round_trips(current in level_strategy(), later in level_strategy()) {
        let first = select_tier(&InitializationState::first_run(), current);
        let pinned = select_tier(&InitializationState::initialized_at(first.min_level()), later);
        prop_assert_eq!(first, pinned);
    }
}
