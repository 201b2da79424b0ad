//! Per-question point award.
//!
//! Not present in the original Go source at all (its `Player.Score` field is
//! populated nowhere in the retrieved sources) — this is realized directly
//! from spec.md §4.5/§8's formula, the one piece of the core with no teacher
//! or original-source precedent to imitate.

/// Points awarded for one answer.
pub const BASE_SCORE: i64 = 1000;
/// Per-question streak bonus, capped at this many points.
const STREAK_CAP: i64 = 500;
const STREAK_UNIT: i64 = 100;

/// `taken` and `allowed` are both in whole seconds. `streak` is the
/// player's streak count *after* this question (i.e. already incremented if
/// this answer was correct).
///
/// # Panics
///
/// Panics if `taken > allowed`; the caller is responsible for only ever
/// passing a recorded answer time that falls within the question's allowed
/// duration. This is a programming-bug-level invariant, not a user input to
/// validate.
pub fn score(correct: bool, taken: u32, allowed: u32, streak: u32) -> i64 {
    assert!(taken <= allowed, "answer taken time {taken} exceeds allowed duration {allowed}");

    if !correct || allowed == 0 {
        return 0;
    }

    let taken = taken as f64;
    let allowed = allowed as f64;
    let streak_bonus = STREAK_CAP.min(STREAK_UNIT * streak as i64);

    let decay = BASE_SCORE as f64 * (1.0 - taken / (allowed / 2.0));
    (BASE_SCORE as f64 + decay) as i64 + streak_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_answer_scores_zero() {
        assert_eq!(score(false, 0, 20, 3), 0);
    }

    #[test]
    fn zero_allowed_time_scores_zero_even_if_correct() {
        assert_eq!(score(true, 0, 0, 0), 0);
    }

    #[test]
    fn instant_answer_scores_double_base_plus_streak() {
        assert_eq!(score(true, 0, 20, 0), 2 * BASE_SCORE);
        assert_eq!(score(true, 0, 20, 1), 2 * BASE_SCORE + STREAK_UNIT);
    }

    #[test]
    fn half_time_answer_scores_exactly_base() {
        assert_eq!(score(true, 10, 20, 0), BASE_SCORE);
    }

    #[test]
    fn streak_bonus_is_capped() {
        assert_eq!(score(true, 0, 20, 10), 2 * BASE_SCORE + STREAK_CAP);
        assert_eq!(score(true, 0, 20, 100), 2 * BASE_SCORE + STREAK_CAP);
    }

    #[test]
    fn late_answer_decays_below_base() {
        let late = score(true, 18, 20, 0);
        assert!(late < BASE_SCORE);
    }

    #[test]
    #[should_panic]
    fn taken_past_allowed_is_a_bug() {
        score(true, 21, 20, 0);
    }
}
