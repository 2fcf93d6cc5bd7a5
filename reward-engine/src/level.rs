//! Level-upgrade policy
//!
//! Tiers are a pure function of cumulative completed links; an upgrade
//! check after any counter change lands on the tier the count earns,
//! even when several thresholds are crossed in one jump. Levels never
//! decrease through this path.

use coin_ledger::Level;

/// Completed links required for Gold
pub const GOLD_AT: u64 = 10;
/// Completed links required for Platinum
pub const PLATINUM_AT: u64 = 50;
/// Completed links required for Diamond
pub const DIAMOND_AT: u64 = 100;

/// Tier earned by a cumulative completed-links count
pub fn level_for_links(completed_links: u64) -> Level {
    if completed_links >= DIAMOND_AT {
        Level::Diamond
    } else if completed_links >= PLATINUM_AT {
        Level::Platinum
    } else if completed_links >= GOLD_AT {
        Level::Gold
    } else {
        Level::Bronze
    }
}

/// Monotonic upgrade: the higher of the current tier and the earned tier
pub fn upgraded(current: Level, completed_links: u64) -> Level {
    current.max(level_for_links(completed_links))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(level_for_links(0), Level::Bronze);
        assert_eq!(level_for_links(9), Level::Bronze);
        assert_eq!(level_for_links(10), Level::Gold);
        assert_eq!(level_for_links(49), Level::Gold);
        assert_eq!(level_for_links(50), Level::Platinum);
        assert_eq!(level_for_links(99), Level::Platinum);
        assert_eq!(level_for_links(100), Level::Diamond);
        assert_eq!(level_for_links(100_000), Level::Diamond);
    }

    #[test]
    fn test_single_step_upgrade_happens_once() {
        assert_eq!(upgraded(Level::Bronze, 9), Level::Bronze);
        assert_eq!(upgraded(Level::Bronze, 10), Level::Gold);
        assert_eq!(upgraded(Level::Gold, 10), Level::Gold);
        assert_eq!(upgraded(Level::Gold, 11), Level::Gold);
    }

    #[test]
    fn test_jump_lands_on_earned_tier() {
        // 9 -> 60 in one update crosses two thresholds and lands on
        // Platinum, not Gold
        assert_eq!(upgraded(Level::Bronze, 60), Level::Platinum);
        assert_eq!(upgraded(Level::Bronze, 150), Level::Diamond);
    }

    #[test]
    fn test_never_downgrades() {
        assert_eq!(upgraded(Level::Diamond, 0), Level::Diamond);
        assert_eq!(upgraded(Level::Platinum, 12), Level::Platinum);
    }

    #[test]
    fn test_monotone_in_links() {
        let mut previous = Level::Bronze;
        for links in 0..200 {
            let level = level_for_links(links);
            assert!(level >= previous);
            previous = level;
        }
    }
}
