use chrono::NaiveDate;

/// Streak milestones and the achievement tag each one unlocks.
pub const ACHIEVEMENT_THRESHOLDS: &[(u32, &str)] = &[(7, "streak_7"), (30, "streak_30")];

/// A user's persisted streak fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakState {
    pub last_post_date: Option<NaiveDate>,
    pub count: u32,
}

/// Result of advancing the streak. `changed` is false when the date was
/// already recorded and nothing needs persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakUpdate {
    pub count: u32,
    pub last_post_date: NaiveDate,
    pub new_achievements: Vec<&'static str>,
    pub changed: bool,
}

/// Advance the streak for a user's first post on `date`.
///
/// Consecutive days increment, a gap (or a first-ever post) resets to 1,
/// and re-invoking for an already-recorded date is a no-op. `unlocked` is
/// the user's current achievement set; tags already present are never
/// reported again, so unlocking stays monotonic and exactly-once.
pub fn record_first_post(state: &StreakState, unlocked: &[String], date: NaiveDate) -> StreakUpdate {
    if state.last_post_date == Some(date) {
        return StreakUpdate {
            count: state.count,
            last_post_date: date,
            new_achievements: Vec::new(),
            changed: false,
        };
    }

    let count = match state.last_post_date {
        Some(prev) if prev.succ_opt() == Some(date) => state.count + 1,
        _ => 1,
    };

    let new_achievements = ACHIEVEMENT_THRESHOLDS
        .iter()
        .filter(|(threshold, tag)| count >= *threshold && !unlocked.iter().any(|a| a == tag))
        .map(|(_, tag)| *tag)
        .collect();

    StreakUpdate {
        count,
        last_post_date: date,
        new_achievements,
        changed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn state(last: Option<&str>, count: u32) -> StreakState {
        StreakState {
            last_post_date: last.map(|s| day(s)),
            count,
        }
    }

    #[test]
    fn first_ever_post_starts_at_one() {
        let update = record_first_post(&state(None, 0), &[], day("2024-03-01"));
        assert_eq!(update.count, 1);
        assert_eq!(update.last_post_date, day("2024-03-01"));
        assert!(update.changed);
        assert!(update.new_achievements.is_empty());
    }

    #[test]
    fn consecutive_days_increment() {
        let update = record_first_post(&state(Some("2024-03-01"), 3), &[], day("2024-03-02"));
        assert_eq!(update.count, 4);
    }

    #[test]
    fn gap_resets_to_one() {
        let update = record_first_post(&state(Some("2024-03-01"), 12), &[], day("2024-03-05"));
        assert_eq!(update.count, 1);
    }

    #[test]
    fn same_day_is_a_noop() {
        let update = record_first_post(&state(Some("2024-03-02"), 4), &[], day("2024-03-02"));
        assert_eq!(update.count, 4);
        assert!(!update.changed);
        assert!(update.new_achievements.is_empty());
    }

    #[test]
    fn crossing_seven_unlocks_streak_7() {
        // alice: streak 6 as of 2024-03-01, posts again the next day
        let update = record_first_post(&state(Some("2024-03-01"), 6), &[], day("2024-03-02"));
        assert_eq!(update.count, 7);
        assert_eq!(update.new_achievements, vec!["streak_7"]);
    }

    #[test]
    fn already_unlocked_tags_are_not_reissued() {
        let unlocked = vec!["streak_7".to_string()];
        let update = record_first_post(&state(Some("2024-03-07"), 7), &unlocked, day("2024-03-08"));
        assert_eq!(update.count, 8);
        assert!(update.new_achievements.is_empty());
    }

    #[test]
    fn thirty_unlocks_both_missing_tags() {
        // a user whose tags were never granted catches up in one step
        let update = record_first_post(&state(Some("2024-03-29"), 29), &[], day("2024-03-30"));
        assert_eq!(update.count, 30);
        assert_eq!(update.new_achievements, vec!["streak_7", "streak_30"]);
    }

    #[test]
    fn reset_does_not_remove_achievements() {
        let unlocked = vec!["streak_7".to_string()];
        let update = record_first_post(&state(Some("2024-03-10"), 9), &unlocked, day("2024-03-20"));
        assert_eq!(update.count, 1);
        // the unlocked set is caller-owned; nothing is ever revoked
        assert!(update.new_achievements.is_empty());
    }
}
