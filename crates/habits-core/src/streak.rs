//! Streak bookkeeping.
//!
//! A habit caches `current_streak`, `longest_streak` and
//! `last_completed_date`. Those fields are a function of the completion
//! history; [`recalculate_full`] computes them from that history and is the
//! source of truth. [`apply_incremental`] is the fast path for the common
//! case of marking days in order and only looks at the cached state.
//!
//! The incremental path does not try to be exact for retroactive edits: a
//! completion older than the cached one restarts the run at 1 and any
//! un-mark drops it to 0. Callers editing the past go through the full
//! recalculation instead.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::day;
use crate::habit::{Habit, StreakState};
use crate::recurrence::find_previous_due;

/// Updates the cached streak after a single mark, using only the cached state.
///
/// `habit` must be the state read at the start of the unit of work that
/// wrote the mark.
pub fn apply_incremental(
    habit: &Habit,
    date: NaiveDate,
    completed: bool,
    max_lookback_days: u32,
) -> StreakState {
    let mut state = habit.streak();

    if !completed {
        // Un-marking any day, today or older, resets the run without looking
        // at history. `last_completed_date` keeps the last real completion.
        state.current_streak = 0;
        return state;
    }

    state.current_streak = match habit.last_completed_date {
        None => 1,
        Some(last) if date == last => habit.current_streak,
        Some(last) if date > last => {
            let previous_due =
                find_previous_due(&habit.recurrence, habit.created_at, date, max_lookback_days);
            if previous_due == Some(last) {
                habit.current_streak.saturating_add(1)
            } else {
                1
            }
        }
        // Older than the cached completion.
        Some(_) => 1,
    };
    state.last_completed_date = Some(date);
    state.longest_streak = state.longest_streak.max(state.current_streak);
    state
}

/// Recomputes the streak fields from completion history.
///
/// * `from` bounds the current-streak walk (it never looks before `from`
///   or before the habit was created).
/// * `completed_recent` holds the completed days in `[from, today]`.
/// * `completed_all` holds every completed day of the habit.
///
/// The longest streak is never lowered below the cached value.
pub fn recalculate_full(
    habit: &Habit,
    from: NaiveDate,
    today: NaiveDate,
    completed_recent: &BTreeSet<NaiveDate>,
    completed_all: &BTreeSet<NaiveDate>,
) -> StreakState {
    let floor = from.max(habit.created_at);

    let mut current = 0u32;
    for date in walk_back(today, floor) {
        if !habit.is_due(date) {
            continue;
        }
        if completed_recent.contains(&date) {
            current += 1;
        } else {
            break;
        }
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    for date in walk_back(today, habit.created_at) {
        if !habit.is_due(date) {
            continue;
        }
        if completed_all.contains(&date) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    StreakState {
        current_streak: current,
        longest_streak: longest.max(habit.longest_streak),
        last_completed_date: completed_recent
            .iter()
            .next_back()
            .copied()
            .or(habit.last_completed_date),
    }
}

/// Days from `start` down to `floor`, inclusive, newest first.
fn walk_back(start: NaiveDate, floor: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |d| day::previous(*d)).take_while(move |d| *d >= floor)
}
