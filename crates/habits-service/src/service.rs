//! [`RecordService`] -- the record upsert orchestrator.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use habits_core::habit::{Habit, HabitBuilder, StreakState};
use habits_core::idgen;
use habits_core::record::{CompletionRecord, RecordKey};
use habits_core::streak;
use habits_core::validation::{self, validate_habit, validate_range, validate_record};
use habits_storage::{
    CompletionLedger, DateRange, HabitRepository, Storage, StorageError, Transaction,
};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ServiceError};
use crate::types::{
    DEFAULT_PAGE_LIMIT, HistoryPage, MAX_PAGE_LIMIT, NewHabit, Pagination, RecordOutcome,
    RetroactiveOutcome, ServiceOptions, UpsertRecord,
};

/// Attempts at finding a free habit ID before giving up.
const ID_ATTEMPTS: u32 = 8;

/// Validates marks, writes the ledger and keeps the cached streak in step.
pub struct RecordService<S> {
    store: S,
    clock: Box<dyn Clock>,
    options: ServiceOptions,
}

impl<S> std::fmt::Debug for RecordService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> RecordService<S> {
    /// Creates a service over `store` using the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }

    /// Creates a service with an explicit clock.
    pub fn with_clock(store: S, clock: impl Clock + 'static) -> Self {
        Self {
            store,
            clock: Box::new(clock),
            options: ServiceOptions::default(),
        }
    }

    /// Replaces the service options.
    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The current day according to the service clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // -- Writes --------------------------------------------------------------

    /// Records a mark and updates the streak incrementally.
    ///
    /// Validation happens before any write. The ledger row and the habit's
    /// streak fields commit together.
    pub fn upsert_record(&self, req: &UpsertRecord) -> Result<RecordOutcome> {
        let key = RecordKey::new(req.habit_id.as_str(), req.user_id.as_str(), req.date);
        let fields = req.fields();

        self.in_transaction(|tx| {
            let habit = load_active(tx, &req.habit_id, &req.user_id)?;
            validate_record(&habit, req.date, &fields)?;

            let record = tx.upsert_record(&key, &fields)?;
            let state = streak::apply_incremental(
                &habit,
                req.date,
                fields.completed,
                self.options.max_lookback_days,
            );
            let mut updated = habit.clone();
            updated.set_streak(state);
            tx.save_habit(&updated)?;

            debug!(
                habit = %habit.id,
                date = %req.date,
                completed = fields.completed,
                current = state.current_streak,
                longest = state.longest_streak,
                "mark recorded"
            );
            Ok(RecordOutcome {
                record,
                current_streak: state.current_streak,
                longest_streak: state.longest_streak,
                last_completed_date: state.last_completed_date,
                target_met: validation::target_met(&habit.measure, &fields),
            })
        })
    }

    /// Records a mark for any day and recomputes the streak from history.
    ///
    /// The current streak is rebuilt from `req.date` up to today; the longest
    /// streak from the whole history.
    pub fn mark_retroactively(&self, req: &UpsertRecord) -> Result<RetroactiveOutcome> {
        let key = RecordKey::new(req.habit_id.as_str(), req.user_id.as_str(), req.date);
        let fields = req.fields();
        let today = self.clock.today().max(req.date);

        self.in_transaction(|tx| {
            let habit = load_active(tx, &req.habit_id, &req.user_id)?;
            validate_record(&habit, req.date, &fields)?;

            let record = tx.upsert_record(&key, &fields)?;
            let state = recalculate(tx, &habit, req.date, today)?;
            let mut updated = habit.clone();
            updated.set_streak(state);
            tx.save_habit(&updated)?;

            info!(
                habit = %habit.id,
                date = %req.date,
                current = state.current_streak,
                longest = state.longest_streak,
                "streak recalculated after retroactive mark"
            );
            Ok(RetroactiveOutcome::new(state, record.id))
        })
    }

    /// Recomputes the cached streak of a habit from its whole history.
    pub fn rebuild_streaks(&self, habit_id: &str, user_id: &str) -> Result<StreakState> {
        let today = self.clock.today();

        self.in_transaction(|tx| {
            let mut habit = load_active(tx, habit_id, user_id)?;
            let state = recalculate(tx, &habit, habit.created_at, today)?;
            let before = habit.streak();
            habit.set_streak(state);
            tx.save_habit(&habit)?;

            info!(habit = habit_id, ?before, after = ?state, "streak rebuilt");
            Ok(state)
        })
    }

    // -- Reads ---------------------------------------------------------------

    /// The record of one day, if any.
    pub fn get_record_by_date(
        &self,
        habit_id: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<CompletionRecord>> {
        load_owned(&self.store, habit_id, user_id)?;
        let key = RecordKey::new(habit_id, user_id, date);
        Ok(self.store.find_record(&key)?)
    }

    /// Records between `from` and `to` (inclusive), oldest first.
    pub fn get_records_by_date_range(
        &self,
        habit_id: &str,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        validate_range(from, to)?;
        load_owned(&self.store, habit_id, user_id)?;
        Ok(self
            .store
            .find_records_in_range(habit_id, user_id, &DateRange::between(from, to))?)
    }

    /// A page of records, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_PAGE_LIMIT`] and is clamped to
    /// `1..=MAX_PAGE_LIMIT`.
    pub fn get_historical_records(
        &self,
        habit_id: &str,
        user_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<HistoryPage> {
        if let (Some(from), Some(to)) = (from, to) {
            validate_range(from, to)?;
        }
        let range = DateRange { from, to };
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

        // One unit of work so the count and the page agree.
        self.in_transaction(|tx| {
            load_owned(tx, habit_id, user_id)?;
            let total = tx.count_records_in_range(habit_id, user_id, &range)?;
            let records = tx.find_records_page(habit_id, user_id, &range, limit, offset)?;
            let has_more = offset.saturating_add(records.len() as u64) < total;
            Ok(HistoryPage {
                records,
                pagination: Pagination {
                    total,
                    limit,
                    offset,
                    has_more,
                },
            })
        })
    }

    // -- Habit lifecycle -----------------------------------------------------

    /// Creates a habit with a generated ID.
    pub fn create_habit(&self, new: NewHabit) -> Result<Habit> {
        let created_at = new.created_at.unwrap_or_else(|| self.clock.today());
        let mut habit = HabitBuilder::new(new.title.trim())
            .user(new.user_id)
            .recurrence(new.recurrence)
            .measure(new.measure)
            .created_at(created_at)
            .build();
        validate_habit(&habit)?;

        let now = Utc::now();
        for nonce in 0..ID_ATTEMPTS {
            habit.id = idgen::generate_habit_id(&habit.user_id, &habit.title, now, nonce);
            match self.store.create_habit(&habit) {
                Ok(()) => {
                    info!(id = %habit.id, user = %habit.user_id, title = %habit.title, "habit created");
                    return Ok(habit);
                }
                Err(StorageError::AlreadyExists { .. }) => {
                    debug!(id = %habit.id, nonce, "habit id collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StorageError::Internal(format!(
            "no free habit id after {ID_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Loads a habit owned by the user, active or not.
    pub fn get_habit(&self, habit_id: &str, user_id: &str) -> Result<Habit> {
        load_owned(&self.store, habit_id, user_id)
    }

    /// Hides a habit from the record operations. Its history is kept.
    pub fn deactivate_habit(&self, habit_id: &str, user_id: &str) -> Result<()> {
        self.store
            .set_habit_active(habit_id, user_id, false)
            .map_err(|e| {
                if e.is_not_found() {
                    ServiceError::not_found(habit_id)
                } else {
                    e.into()
                }
            })?;
        info!(habit = habit_id, "habit deactivated");
        Ok(())
    }

    /// Lists the habits of a user.
    pub fn list_habits(&self, user_id: &str, include_inactive: bool) -> Result<Vec<Habit>> {
        Ok(self.store.list_habits(user_id, include_inactive)?)
    }

    // -- Unit of work --------------------------------------------------------

    /// Runs `body` in a storage transaction and hands back its value.
    ///
    /// A service error from `body` rolls the transaction back and is returned
    /// as is. Version conflicts and a busy database rerun `body` up to
    /// `conflict_retries` times.
    fn in_transaction<T>(&self, mut body: impl FnMut(&dyn Transaction) -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            let mut outcome: Option<Result<T>> = None;
            let committed = self.store.run_in_transaction(&mut |tx| match body(tx) {
                Ok(value) => {
                    outcome = Some(Ok(value));
                    Ok(())
                }
                Err(ServiceError::Storage(e)) => Err(e),
                Err(e) => {
                    let reason = e.to_string();
                    outcome = Some(Err(e));
                    Err(StorageError::RolledBack(reason))
                }
            });

            match (committed, outcome) {
                (Ok(()), Some(Ok(value))) => return Ok(value),
                (Err(StorageError::RolledBack(_)), Some(Err(e))) => return Err(e),
                (Err(e), _) if e.is_retryable() && attempt < self.options.conflict_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying unit of work");
                }
                (Err(e), _) => return Err(e.into()),
                (Ok(()), _) => {
                    return Err(StorageError::Internal(
                        "transaction committed without an outcome".into(),
                    )
                    .into());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_active(tx: &dyn Transaction, habit_id: &str, user_id: &str) -> Result<Habit> {
    tx.find_active_by_id(habit_id, user_id)?
        .ok_or_else(|| ServiceError::not_found(habit_id))
}

fn load_owned<R: HabitRepository + ?Sized>(repo: &R, habit_id: &str, user_id: &str) -> Result<Habit> {
    repo.find_by_id(habit_id, user_id)?
        .ok_or_else(|| ServiceError::not_found(habit_id))
}

/// Loads the two completion sets and runs the full recalculation.
fn recalculate(
    tx: &dyn Transaction,
    habit: &Habit,
    from: NaiveDate,
    today: NaiveDate,
) -> Result<StreakState> {
    let recent = tx.find_completed_dates_in_range(&habit.id, &habit.user_id, from, today)?;
    let all = tx.find_all_completed_dates(&habit.id, &habit.user_id)?;
    Ok(streak::recalculate_full(habit, from, today, &recent, &all))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    use chrono::Days;
    use habits_core::habit::Measure;
    use habits_core::record::RecordFields;
    use habits_core::recurrence::Recurrence;
    use habits_core::validation::ValidationError;
    use habits_storage::SqliteStore;
    use habits_storage::error::Result as StorageResult;
    use pretty_assertions::assert_eq;

    use crate::clock::FixedClock;

    const USER: &str = "alice";

    fn day0() -> NaiveDate {
        // A Monday.
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn d(offset: u64) -> NaiveDate {
        day0() + Days::new(offset)
    }

    fn service_at(today: NaiveDate) -> RecordService<SqliteStore> {
        RecordService::with_clock(SqliteStore::open_in_memory().unwrap(), FixedClock(today))
    }

    fn add_habit(service: &RecordService<SqliteStore>, new: NewHabit) -> Habit {
        service.create_habit(new.created_at(day0())).unwrap()
    }

    fn daily(service: &RecordService<SqliteStore>) -> Habit {
        add_habit(service, NewHabit::new(USER, "Meditate"))
    }

    fn mark(service: &RecordService<SqliteStore>, habit: &Habit, offset: u64) -> RecordOutcome {
        service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(offset)))
            .unwrap()
    }

    fn record_count(service: &RecordService<SqliteStore>, habit: &Habit) -> u64 {
        service
            .store()
            .count_records_in_range(&habit.id, USER, &DateRange::all())
            .unwrap()
    }

    // -- Incremental path ----------------------------------------------------

    #[test]
    fn consecutive_days_increment() {
        let service = service_at(d(3));
        let habit = daily(&service);
        let mut last = None;
        for offset in 0..4 {
            last = Some(mark(&service, &habit, offset));
        }
        let last = last.unwrap();
        assert_eq!(last.current_streak, 4);
        assert_eq!(last.longest_streak, 4);
        assert_eq!(last.last_completed_date, Some(d(3)));
    }

    #[test]
    fn same_day_remark_is_idempotent() {
        let service = service_at(d(1));
        let habit = daily(&service);
        mark(&service, &habit, 0);
        let first = mark(&service, &habit, 1);
        let again = mark(&service, &habit, 1);

        assert_eq!(again.current_streak, first.current_streak);
        assert_eq!(again.longest_streak, first.longest_streak);
        assert_eq!(again.record.id, first.record.id);
        assert_eq!(record_count(&service, &habit), 2);
    }

    #[test]
    fn gap_resets_current_streak() {
        let service = service_at(d(3));
        let habit = daily(&service);
        mark(&service, &habit, 0);
        mark(&service, &habit, 1);
        let outcome = mark(&service, &habit, 3);
        assert_eq!(outcome.current_streak, 1);
        assert_eq!(outcome.longest_streak, 2);
    }

    #[test]
    fn streak_is_persisted_on_the_habit() {
        let service = service_at(d(1));
        let habit = daily(&service);
        mark(&service, &habit, 0);
        mark(&service, &habit, 1);

        let stored = service.get_habit(&habit.id, USER).unwrap();
        assert_eq!(stored.current_streak, 2);
        assert_eq!(stored.last_completed_date, Some(d(1)));
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn weekly_habit_is_due_only_on_its_days() {
        let service = service_at(d(7));
        let habit = add_habit(
            &service,
            NewHabit::new(USER, "Gym").recurrence(Recurrence::weekly(&[1, 3, 5]).unwrap()),
        );

        // Tuesday.
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(1)))
            .unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("Monday, Wednesday, Friday"), "{err}");

        let mut outcome = None;
        for offset in [0, 2, 4, 7] {
            outcome = Some(mark(&service, &habit, offset));
        }
        assert_eq!(outcome.unwrap().current_streak, 4);
        assert_eq!(record_count(&service, &habit), 4);
    }

    #[test]
    fn unmark_resets_current_streak() {
        let service = service_at(d(2));
        let habit = daily(&service);
        for offset in 0..3 {
            mark(&service, &habit, offset);
        }
        let outcome = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(2)).completed(false))
            .unwrap();
        assert_eq!(outcome.current_streak, 0);
        assert_eq!(outcome.longest_streak, 3);
        assert!(!outcome.record.completed);
    }

    #[test]
    fn longest_streak_never_decreases() {
        let service = service_at(d(20));
        let habit = daily(&service);
        let ops: [(u64, bool); 10] = [
            (0, true),
            (1, true),
            (2, true),
            (1, false),
            (4, true),
            (5, true),
            (2, true),
            (9, true),
            (9, false),
            (10, true),
        ];
        let mut longest = 0;
        for (offset, completed) in ops {
            let outcome = service
                .upsert_record(&UpsertRecord::new(&habit.id, USER, d(offset)).completed(completed))
                .unwrap();
            assert!(outcome.longest_streak >= longest);
            assert!(outcome.longest_streak >= outcome.current_streak);
            longest = outcome.longest_streak;
        }
    }

    // -- Validation ----------------------------------------------------------

    #[test]
    fn numeric_habit_requires_a_value() {
        let service = service_at(d(0));
        let habit = add_habit(
            &service,
            NewHabit::new(USER, "Water").measure(Measure::Numeric { target: Some(8.0) }),
        );

        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(0)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ValidationError::MissingValue)));
        assert_eq!(record_count(&service, &habit), 0);

        let outcome = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(0)).value(9.5))
            .unwrap();
        assert_eq!(outcome.target_met, Some(true));
        assert_eq!(outcome.record.value, Some(9.5));
    }

    #[test]
    fn check_habit_rejects_a_value() {
        let service = service_at(d(0));
        let habit = daily(&service);
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(0)).value(1.0))
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ValidationError::UnexpectedValue)));
    }

    #[test]
    fn long_notes_are_rejected_before_writing() {
        let service = service_at(d(0));
        let habit = daily(&service);
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(0)).notes("x".repeat(501)))
            .unwrap_err();
        assert!(err.is_bad_request());
        assert_eq!(record_count(&service, &habit), 0);
        assert_eq!(service.get_habit(&habit.id, USER).unwrap().version, 0);
    }

    #[test]
    fn day_before_creation_is_a_bad_request() {
        let service = service_at(d(0));
        let habit = daily(&service);
        let before = day0() - Days::new(1);
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, before))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::BadRequest(ValidationError::BeforeCreation { .. })
        ));
    }

    #[test]
    fn foreign_and_inactive_habits_are_not_found() {
        let service = service_at(d(0));
        let habit = daily(&service);

        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, "mallory", d(0)))
            .unwrap_err();
        assert!(err.is_not_found());

        service.deactivate_habit(&habit.id, USER).unwrap();
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(0)))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(service.deactivate_habit("hb-none", USER).unwrap_err().is_not_found());
    }

    // -- Retroactive path ----------------------------------------------------

    #[test]
    fn retroactive_unmark_recalculates() {
        let service = service_at(d(4));
        let habit = daily(&service);
        for offset in 0..5 {
            mark(&service, &habit, offset);
        }

        let outcome = service
            .mark_retroactively(&UpsertRecord::new(&habit.id, USER, d(2)).completed(false))
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.current_streak, 2);
        assert!(outcome.longest_streak >= 5);

        let record = service.get_record_by_date(&habit.id, USER, d(2)).unwrap().unwrap();
        assert_eq!(outcome.record_id, record.id);
        assert!(!record.completed);
    }

    #[test]
    fn retroactive_fill_of_a_gap_joins_the_runs() {
        let service = service_at(d(4));
        let habit = daily(&service);
        for offset in [0, 1, 3, 4] {
            mark(&service, &habit, offset);
        }
        assert_eq!(service.get_habit(&habit.id, USER).unwrap().current_streak, 2);

        let outcome = service
            .mark_retroactively(&UpsertRecord::new(&habit.id, USER, d(2)))
            .unwrap();
        // The current walk stops at the marked day.
        assert_eq!(outcome.current_streak, 3);
        assert_eq!(outcome.longest_streak, 5);

        let rebuilt = service.rebuild_streaks(&habit.id, USER).unwrap();
        assert_eq!(rebuilt.current_streak, 5);
        assert_eq!(rebuilt.longest_streak, 5);
        assert_eq!(rebuilt.last_completed_date, Some(d(4)));
    }

    #[test]
    fn rebuild_repairs_a_corrupted_cache() {
        let service = service_at(d(2));
        let habit = daily(&service);
        for offset in 0..3 {
            mark(&service, &habit, offset);
        }
        let mut broken = service.get_habit(&habit.id, USER).unwrap();
        broken.current_streak = 0;
        broken.last_completed_date = None;
        service.store().save_habit(&broken).unwrap();

        let state = service.rebuild_streaks(&habit.id, USER).unwrap();
        assert_eq!(state.current_streak, 3);
        assert_eq!(state.last_completed_date, Some(d(2)));
    }

    // -- Reads ---------------------------------------------------------------

    #[test]
    fn date_range_reads_are_ascending_and_checked() {
        let service = service_at(d(5));
        let habit = daily(&service);
        for offset in [3, 0, 5, 1] {
            service
                .mark_retroactively(&UpsertRecord::new(&habit.id, USER, d(offset)))
                .unwrap();
        }
        let dates: Vec<NaiveDate> = service
            .get_records_by_date_range(&habit.id, USER, d(0), d(3))
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec![d(0), d(1), d(3)]);

        assert!(service
            .get_records_by_date_range(&habit.id, USER, d(3), d(0))
            .unwrap_err()
            .is_bad_request());
        assert!(service
            .get_records_by_date_range(&habit.id, "bob", d(0), d(3))
            .unwrap_err()
            .is_not_found());
        assert!(service.get_record_by_date(&habit.id, USER, d(2)).unwrap().is_none());
    }

    #[test]
    fn history_pages_newest_first_with_clamped_limit() {
        let service = service_at(d(9));
        let habit = daily(&service);
        for offset in 0..10 {
            mark(&service, &habit, offset);
        }

        let page = service
            .get_historical_records(&habit.id, USER, None, None, Some(3), 0)
            .unwrap();
        let dates: Vec<NaiveDate> = page.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(9), d(8), d(7)]);
        assert_eq!(
            page.pagination,
            Pagination {
                total: 10,
                limit: 3,
                offset: 0,
                has_more: true,
            }
        );

        let last = service
            .get_historical_records(&habit.id, USER, None, None, Some(3), 9)
            .unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(!last.pagination.has_more);

        let bounded = service
            .get_historical_records(&habit.id, USER, Some(d(2)), Some(d(4)), Some(0), 0)
            .unwrap();
        assert_eq!(bounded.pagination.limit, 1);
        assert_eq!(bounded.pagination.total, 3);
        assert_eq!(bounded.records[0].date, d(4));

        let capped = service
            .get_historical_records(&habit.id, USER, None, None, Some(1_000), 0)
            .unwrap();
        assert_eq!(capped.pagination.limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn create_habit_validates_and_generates_ids() {
        let service = service_at(d(0));
        assert!(service
            .create_habit(NewHabit::new(USER, "   "))
            .unwrap_err()
            .is_bad_request());

        let a = service.create_habit(NewHabit::new(USER, "Read")).unwrap();
        let b = service.create_habit(NewHabit::new(USER, "Read")).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("hb-"));
        assert_eq!(a.created_at, d(0));
        assert_eq!(service.list_habits(USER, false).unwrap().len(), 2);
    }

    // -- Concurrency ---------------------------------------------------------

    #[test]
    fn concurrent_marks_on_one_habit_are_serialized() {
        let service = Arc::new(service_at(d(5)));
        let habit = daily(&service);
        for offset in 0..5 {
            mark(&service, &habit, offset);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let id = habit.id.clone();
                thread::spawn(move || {
                    service
                        .upsert_record(&UpsertRecord::new(id, USER, d(5)))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            let outcome = handle.join().unwrap();
            assert_eq!(outcome.current_streak, 6);
        }

        let stored = service.get_habit(&habit.id, USER).unwrap();
        assert_eq!(stored.current_streak, 6);
        assert_eq!(stored.longest_streak, 6);
        // One save per mark, none lost.
        assert_eq!(stored.version, 13);
        assert_eq!(record_count(&service, &habit), 6);
    }

    #[test]
    fn concurrent_marks_across_connections_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habits.db");
        let first = Arc::new(RecordService::with_clock(
            SqliteStore::open(&path).unwrap(),
            FixedClock(d(3)),
        ));
        let second = Arc::new(RecordService::with_clock(
            SqliteStore::open(&path).unwrap(),
            FixedClock(d(3)),
        ));
        let habit = daily(&first);
        for offset in 0..3 {
            mark(&first, &habit, offset);
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(if i % 2 == 0 { &first } else { &second });
                let id = habit.id.clone();
                thread::spawn(move || {
                    service
                        .upsert_record(&UpsertRecord::new(id, USER, d(3)))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = second.get_habit(&habit.id, USER).unwrap();
        assert_eq!(stored.current_streak, 4);
        assert_eq!(stored.version, 3 + 8);
    }

    // -- Retries -------------------------------------------------------------

    /// A store whose next `busy` units of work fail as if SQLite were busy.
    struct BusyStore {
        inner: SqliteStore,
        busy: AtomicU32,
    }

    impl BusyStore {
        fn new(busy: u32) -> Self {
            Self {
                inner: SqliteStore::open_in_memory().unwrap(),
                busy: AtomicU32::new(busy),
            }
        }
    }

    impl HabitRepository for BusyStore {
        fn find_active_by_id(&self, habit_id: &str, user_id: &str) -> StorageResult<Option<Habit>> {
            self.inner.find_active_by_id(habit_id, user_id)
        }

        fn find_by_id(&self, habit_id: &str, user_id: &str) -> StorageResult<Option<Habit>> {
            self.inner.find_by_id(habit_id, user_id)
        }

        fn save_habit(&self, habit: &Habit) -> StorageResult<Habit> {
            self.inner.save_habit(habit)
        }
    }

    impl CompletionLedger for BusyStore {
        fn upsert_record(
            &self,
            key: &RecordKey,
            fields: &RecordFields,
        ) -> StorageResult<CompletionRecord> {
            self.inner.upsert_record(key, fields)
        }

        fn find_record(&self, key: &RecordKey) -> StorageResult<Option<CompletionRecord>> {
            self.inner.find_record(key)
        }

        fn find_completed_dates_in_range(
            &self,
            habit_id: &str,
            user_id: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> StorageResult<BTreeSet<NaiveDate>> {
            self.inner
                .find_completed_dates_in_range(habit_id, user_id, from, to)
        }

        fn find_all_completed_dates(
            &self,
            habit_id: &str,
            user_id: &str,
        ) -> StorageResult<BTreeSet<NaiveDate>> {
            self.inner.find_all_completed_dates(habit_id, user_id)
        }

        fn find_records_in_range(
            &self,
            habit_id: &str,
            user_id: &str,
            range: &DateRange,
        ) -> StorageResult<Vec<CompletionRecord>> {
            self.inner.find_records_in_range(habit_id, user_id, range)
        }

        fn count_records_in_range(
            &self,
            habit_id: &str,
            user_id: &str,
            range: &DateRange,
        ) -> StorageResult<u64> {
            self.inner.count_records_in_range(habit_id, user_id, range)
        }

        fn find_records_page(
            &self,
            habit_id: &str,
            user_id: &str,
            range: &DateRange,
            limit: u32,
            offset: u64,
        ) -> StorageResult<Vec<CompletionRecord>> {
            self.inner
                .find_records_page(habit_id, user_id, range, limit, offset)
        }
    }

    impl Storage for BusyStore {
        fn create_habit(&self, habit: &Habit) -> StorageResult<()> {
            Storage::create_habit(&self.inner, habit)
        }

        fn set_habit_active(&self, habit_id: &str, user_id: &str, active: bool) -> StorageResult<()> {
            self.inner.set_habit_active(habit_id, user_id, active)
        }

        fn list_habits(&self, user_id: &str, include_inactive: bool) -> StorageResult<Vec<Habit>> {
            Storage::list_habits(&self.inner, user_id, include_inactive)
        }

        fn run_in_transaction(
            &self,
            f: &mut dyn FnMut(&dyn Transaction) -> StorageResult<()>,
        ) -> StorageResult<()> {
            let busy = self
                .busy
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if busy.is_ok() {
                return Err(StorageError::Query(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    None,
                )));
            }
            self.inner.run_in_transaction(f)
        }

        fn close(&self) -> StorageResult<()> {
            self.inner.close()
        }
    }

    fn busy_service(busy: u32) -> (RecordService<BusyStore>, Habit) {
        let service = RecordService::with_clock(BusyStore::new(0), FixedClock(d(1)));
        let habit = service
            .create_habit(NewHabit::new(USER, "Meditate").created_at(day0()))
            .unwrap();
        service.store().busy.store(busy, Ordering::SeqCst);
        (service, habit)
    }

    #[test]
    fn busy_database_is_retried() {
        let (service, habit) = busy_service(2);
        let outcome = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(1)))
            .unwrap();
        assert_eq!(outcome.current_streak, 1);
        assert_eq!(service.store().busy.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn busy_database_gives_up_after_the_retry_budget() {
        let (service, habit) = busy_service(10);
        let err = service
            .upsert_record(&UpsertRecord::new(&habit.id, USER, d(1)))
            .unwrap_err();
        assert!(matches!(&err, ServiceError::Storage(e) if e.is_retryable()), "{err}");
        // One first attempt plus three retries.
        assert_eq!(service.store().busy.load(Ordering::SeqCst), 6);
        assert_eq!(
            service
                .store()
                .count_records_in_range(&habit.id, USER, &DateRange::all())
                .unwrap(),
            0
        );
    }
}
