use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use super::clock::Clock;
use super::day::{computed_check_out, local_day, resolve_timezone};
use super::record::{AttendanceRecord, AttendanceStatus, EnrichedRecord};
use super::store::{AttendanceStore, NewRecord, Page, RecordFilter, SortKey, StoreError};
use crate::model::user::UserProfile;

/// What happens when a manual checkout is submitted for a record that
/// already carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// The second write silently replaces the first.
    #[default]
    LastWriteWins,
    /// The second write is rejected, mirroring the live-checkout path.
    RejectSecond,
}

/// Business-rule violation. Returned as a value, never raised; only store
/// failures are fatal.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("Already checked in for today")]
    DuplicateCheckIn(Option<AttendanceRecord>),
    #[error("Already checked out for today")]
    AlreadyCheckedOut(AttendanceRecord),
    #[error("A manual check-out is already recorded for this record")]
    ManualAlreadyRecorded(AttendanceRecord),
    #[error("Check-out time must be after check-in time")]
    CheckOutNotAfterCheckIn,
    #[error("Check-out must be on the same date as check-in")]
    CheckOutOnDifferentDay,
    #[error("No check-in record found for today. Please check in first.")]
    NoCheckInToday,
    #[error("Attendance record not found")]
    RecordNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    Conflict,
    InvalidTransition,
    NotFound,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::DuplicateCheckIn(_)
            | Rejection::AlreadyCheckedOut(_)
            | Rejection::ManualAlreadyRecorded(_) => RejectionKind::Conflict,
            Rejection::CheckOutNotAfterCheckIn | Rejection::CheckOutOnDifferentDay => {
                RejectionKind::InvalidTransition
            }
            Rejection::NoCheckInToday | Rejection::RecordNotFound => RejectionKind::NotFound,
        }
    }

    /// Record echoed alongside the rejection, when one exists.
    pub fn record(&self) -> Option<&AttendanceRecord> {
        match self {
            Rejection::DuplicateCheckIn(record) => record.as_ref(),
            Rejection::AlreadyCheckedOut(record) | Rejection::ManualAlreadyRecorded(record) => {
                Some(record)
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub page: i64,
    pub limit: i64,
    pub sort: SortKey,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct HistoryPage {
    pub records: Vec<EnrichedRecord>,
    #[schema(example = 1)]
    pub current_page: i64,
    #[schema(example = 3)]
    pub total_pages: i64,
    #[schema(example = 25)]
    pub total_records: i64,
    #[schema(example = 10)]
    pub limit: i64,
}

/// The attendance state engine: day-key resolution, transition validation
/// and read-side enrichment over a record store and a clock.
pub struct Engine<S, C> {
    store: S,
    clock: C,
    default_tz: Tz,
    overwrite_policy: OverwritePolicy,
}

impl<S: AttendanceStore, C: Clock> Engine<S, C> {
    pub fn new(store: S, clock: C, default_tz: Tz, overwrite_policy: OverwritePolicy) -> Self {
        Self {
            store,
            clock,
            default_tz,
            overwrite_policy,
        }
    }

    /// The user's zone, or the configured fallback when the profile has none.
    pub fn timezone_for(&self, profile: &UserProfile) -> Tz {
        resolve_timezone(profile.timezone.as_deref(), self.default_tz)
    }

    /// Create today's record. The attendance day is resolved from the
    /// check-in instant in the user's timezone; the store's uniqueness
    /// constraint backs up the existence pre-check against racing inserts.
    pub async fn check_in(
        &self,
        user_id: i64,
        profile: &UserProfile,
        at: Option<DateTime<Utc>>,
        note: Option<String>,
    ) -> Result<EnrichedRecord, EngineError> {
        let now = self.clock.now();
        let check_in_at = at.unwrap_or(now);
        let tz = self.timezone_for(profile);
        let date = local_day(check_in_at, tz);

        if let Some(existing) = self.store.find_by_day(user_id, date).await? {
            return Err(Rejection::DuplicateCheckIn(Some(existing)).into());
        }

        let new_record = NewRecord {
            user_id,
            date,
            check_in_at,
            computed_check_out_at: computed_check_out(
                check_in_at,
                profile.default_work_duration_minutes,
            ),
            note,
        };

        match self.store.insert_new(new_record).await {
            Ok(record) => Ok(record.enriched(now)),
            Err(StoreError::DuplicateDay) => {
                // Lost the race between the existence check and the insert;
                // surface the winner's record.
                let existing = self.store.find_by_day(user_id, date).await?;
                Err(Rejection::DuplicateCheckIn(existing).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Live checkout. The record is looked up under *today's* day key
    /// (resolved from now, not from the supplied instant), since this models
    /// an action happening today.
    pub async fn check_out(
        &self,
        user_id: i64,
        profile: &UserProfile,
        at: Option<DateTime<Utc>>,
    ) -> Result<EnrichedRecord, EngineError> {
        let now = self.clock.now();
        let check_out_at = at.unwrap_or(now);
        let tz = self.timezone_for(profile);
        let today = local_day(now, tz);

        let Some(mut record) = self.store.find_by_day(user_id, today).await? else {
            return Err(Rejection::NoCheckInToday.into());
        };

        if record.is_checked_out {
            return Err(Rejection::AlreadyCheckedOut(record).into());
        }
        if check_out_at <= record.check_in_at {
            return Err(Rejection::CheckOutNotAfterCheckIn.into());
        }
        if local_day(check_out_at, tz) != record.date {
            return Err(Rejection::CheckOutOnDifferentDay.into());
        }

        self.store.set_check_out(record.id, check_out_at).await?;
        record.check_out_at = Some(check_out_at);
        record.is_checked_out = true;
        Ok(record.enriched(now))
    }

    /// Retroactive checkout for an existing record, id scoped to the caller.
    /// The instant is required; same ordering and same-day rules as the live
    /// path. Whether an existing manual value may be replaced is governed by
    /// the overwrite policy.
    pub async fn manual_check_out(
        &self,
        user_id: i64,
        profile: &UserProfile,
        record_id: i64,
        at: DateTime<Utc>,
    ) -> Result<EnrichedRecord, EngineError> {
        let now = self.clock.now();
        let tz = self.timezone_for(profile);

        let Some(mut record) = self.store.find_by_id(user_id, record_id).await? else {
            return Err(Rejection::RecordNotFound.into());
        };

        if self.overwrite_policy == OverwritePolicy::RejectSecond
            && record.manual_check_out_at.is_some()
        {
            return Err(Rejection::ManualAlreadyRecorded(record).into());
        }
        if at <= record.check_in_at {
            return Err(Rejection::CheckOutNotAfterCheckIn.into());
        }
        if local_day(at, tz) != record.date {
            return Err(Rejection::CheckOutOnDifferentDay.into());
        }

        self.store.set_manual_check_out(record.id, at).await?;
        record.manual_check_out_at = Some(at);
        record.is_checked_out = true;
        Ok(record.enriched(now))
    }

    /// Today's record for the caller, if any.
    pub async fn today(
        &self,
        user_id: i64,
        profile: &UserProfile,
    ) -> Result<Option<EnrichedRecord>, EngineError> {
        let now = self.clock.now();
        let today = local_day(now, self.timezone_for(profile));
        let record = self.store.find_by_day(user_id, today).await?;
        Ok(record.map(|r| r.enriched(now)))
    }

    pub async fn find(&self, user_id: i64, record_id: i64) -> Result<EnrichedRecord, EngineError> {
        let now = self.clock.now();
        match self.store.find_by_id(user_id, record_id).await? {
            Some(record) => Ok(record.enriched(now)),
            None => Err(Rejection::RecordNotFound.into()),
        }
    }

    pub async fn delete(&self, user_id: i64, record_id: i64) -> Result<(), EngineError> {
        if self.store.delete(user_id, record_id).await? {
            Ok(())
        } else {
            Err(Rejection::RecordNotFound.into())
        }
    }

    /// Paged history. A status filter is evaluated on the *derived* status —
    /// the same derivation the response displays — so filtered counts can
    /// never disagree with what the caller sees; pagination then happens on
    /// the filtered set.
    pub async fn history(&self, user_id: i64, query: &HistoryQuery) -> Result<HistoryPage, EngineError> {
        let now = self.clock.now();
        let filter = RecordFilter {
            from: query.from,
            to: query.to,
            sort: query.sort,
            page: None,
        };

        let (records, total) = match query.status {
            Some(status) => {
                let enriched: Vec<_> = self
                    .store
                    .list(user_id, &filter)
                    .await?
                    .iter()
                    .map(|r| r.enriched(now))
                    .filter(|e| e.status == status)
                    .collect();
                let total = enriched.len() as i64;
                let page: Vec<_> = enriched
                    .into_iter()
                    .skip(((query.page - 1) * query.limit) as usize)
                    .take(query.limit as usize)
                    .collect();
                (page, total)
            }
            None => {
                let total = self.store.count(user_id, &filter).await?;
                let paged = RecordFilter {
                    page: Some(Page {
                        offset: (query.page - 1) * query.limit,
                        limit: query.limit,
                    }),
                    ..filter
                };
                let records = self
                    .store
                    .list(user_id, &paged)
                    .await?
                    .iter()
                    .map(|r| r.enriched(now))
                    .collect();
                (records, total)
            }
        };

        Ok(HistoryPage {
            records,
            current_page: query.page,
            total_pages: (total + query.limit - 1) / query.limit,
            total_records: total,
            limit: query.limit,
        })
    }

    /// Full enriched record set for export: date bounds and optional status
    /// filter, oldest day first, no pagination.
    pub async fn export_rows(
        &self,
        user_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        status: Option<AttendanceStatus>,
    ) -> Result<Vec<EnrichedRecord>, EngineError> {
        let now = self.clock.now();
        let filter = RecordFilter {
            from,
            to,
            sort: SortKey::DateAsc,
            page: None,
        };
        let rows = self
            .store
            .list(user_id, &filter)
            .await?
            .iter()
            .map(|r| r.enriched(now))
            .filter(|e| status.is_none_or(|s| e.status == s))
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::clock::test::FixedClock;
    use crate::attendance::store::mem::MemStore;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn kolkata_profile() -> UserProfile {
        UserProfile {
            timezone: Some("Asia/Kolkata".into()),
            default_work_duration_minutes: 480,
        }
    }

    // 2024-01-10 09:00 Asia/Kolkata
    fn nine_am_ist() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 3, 30, 0).unwrap()
    }

    fn engine(
        clock: FixedClock,
        policy: OverwritePolicy,
    ) -> Engine<MemStore, FixedClock> {
        Engine::new(MemStore::new(), clock, chrono_tz::UTC, policy)
    }

    #[tokio::test]
    async fn check_in_resolves_day_and_computed_checkout() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);

        let record = engine
            .check_in(7, &kolkata_profile(), None, Some("on site".into()))
            .await
            .unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(record.check_in_at, nine_am_ist());
        // 09:00 + 480 minutes = 17:00 IST = 11:30 UTC
        assert_eq!(
            record.computed_check_out_at,
            Utc.with_ymd_and_hms(2024, 1, 10, 11, 30, 0).unwrap()
        );
        assert_eq!(record.status, AttendanceStatus::Active);
        assert_eq!(record.duration_minutes, 480);
        assert_eq!(record.note.as_deref(), Some("on site"));
    }

    #[tokio::test]
    async fn second_check_in_same_day_is_a_conflict() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let first = engine.check_in(7, &profile, None, None).await.unwrap();

        let err = engine.check_in(7, &profile, None, None).await.unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::Conflict);
        assert_eq!(rejection.record().unwrap().id, first.id);

        // Original record untouched
        let today = engine.today(7, &profile).await.unwrap().unwrap();
        assert_eq!(today.check_in_at, first.check_in_at);
    }

    /// Store whose first day lookup reports nothing, so the insert runs into
    /// the uniqueness constraint the way a racing request would.
    struct RacingStore {
        inner: MemStore,
        hide_first_lookup: AtomicBool,
    }

    impl AttendanceStore for RacingStore {
        async fn insert_new(&self, rec: NewRecord) -> Result<AttendanceRecord, StoreError> {
            self.inner.insert_new(rec).await
        }
        async fn find_by_day(
            &self,
            user_id: i64,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            if self.hide_first_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_day(user_id, date).await
        }
        async fn find_by_id(
            &self,
            user_id: i64,
            record_id: i64,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            self.inner.find_by_id(user_id, record_id).await
        }
        async fn set_check_out(&self, record_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
            self.inner.set_check_out(record_id, at).await
        }
        async fn set_manual_check_out(
            &self,
            record_id: i64,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.set_manual_check_out(record_id, at).await
        }
        async fn list(
            &self,
            user_id: i64,
            filter: &RecordFilter,
        ) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.list(user_id, filter).await
        }
        async fn count(&self, user_id: i64, filter: &RecordFilter) -> Result<i64, StoreError> {
            self.inner.count(user_id, filter).await
        }
        async fn delete(&self, user_id: i64, record_id: i64) -> Result<bool, StoreError> {
            self.inner.delete(user_id, record_id).await
        }
    }

    #[tokio::test]
    async fn racing_insert_maps_to_the_same_conflict() {
        let store = RacingStore {
            inner: MemStore::new(),
            hide_first_lookup: AtomicBool::new(false),
        };
        let clock = FixedClock::at(nine_am_ist());
        let engine = Engine::new(store, clock, chrono_tz::UTC, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let first = engine.check_in(7, &profile, None, None).await.unwrap();

        // Next request misses the existence check but loses the insert
        engine.store.hide_first_lookup.store(true, Ordering::SeqCst);
        let err = engine.check_in(7, &profile, None, None).await.unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::Conflict);
        assert_eq!(rejection.record().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn check_out_sets_actual_time() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock.clone(), OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        engine.check_in(7, &profile, None, None).await.unwrap();

        // 18:00 IST
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 30, 0).unwrap();
        clock.set(at);
        let record = engine.check_out(7, &profile, None).await.unwrap();

        assert_eq!(record.check_out_at, Some(at));
        assert!(record.is_checked_out);
        assert_eq!(record.status, AttendanceStatus::Completed);
        assert_eq!(record.duration_minutes, 540);
    }

    #[tokio::test]
    async fn check_out_without_check_in_is_not_found() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);

        let err = engine
            .check_out(7, &kolkata_profile(), None)
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::NotFound);
    }

    #[tokio::test]
    async fn second_check_out_is_rejected_and_record_unmodified() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock.clone(), OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        engine.check_in(7, &profile, None, None).await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 30, 0).unwrap();
        clock.set(at);
        let first = engine.check_out(7, &profile, None).await.unwrap();

        let later = Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap();
        let err = engine
            .check_out(7, &profile, Some(later))
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::Conflict);

        let today = engine.today(7, &profile).await.unwrap().unwrap();
        assert_eq!(today.check_out_at, first.check_out_at);
    }

    #[tokio::test]
    async fn check_out_not_after_check_in_is_invalid() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        engine.check_in(7, &profile, None, None).await.unwrap();

        // Equal to check-in is rejected too
        let err = engine
            .check_out(7, &profile, Some(nine_am_ist()))
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::InvalidTransition);

        let today = engine.today(7, &profile).await.unwrap().unwrap();
        assert!(!today.is_checked_out);
        assert!(today.check_out_at.is_none());
    }

    #[tokio::test]
    async fn check_out_crossing_midnight_is_invalid() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock.clone(), OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        engine.check_in(7, &profile, None, None).await.unwrap();

        // Still 2024-01-10 22:30 IST on the wall clock, but the submitted
        // instant is 2024-01-11 00:30 IST
        clock.set(Utc.with_ymd_and_hms(2024, 1, 10, 17, 0, 0).unwrap());
        let crossing = Utc.with_ymd_and_hms(2024, 1, 10, 19, 0, 0).unwrap();
        let err = engine
            .check_out(7, &profile, Some(crossing))
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::InvalidTransition);
    }

    #[tokio::test]
    async fn manual_check_out_overrides_and_scopes_to_owner() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let record = engine.check_in(7, &profile, None, None).await.unwrap();

        // Another user cannot see (or edit) the record
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let err = engine
            .manual_check_out(8, &profile, record.id, at)
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::NotFound);

        let updated = engine
            .manual_check_out(7, &profile, record.id, at)
            .await
            .unwrap();
        assert_eq!(updated.manual_check_out_at, Some(at));
        assert!(updated.is_checked_out);
        assert_eq!(updated.status, AttendanceStatus::ManualOverride);
        assert_eq!(updated.actual_check_out_at, at);
    }

    #[tokio::test]
    async fn manual_overwrite_policy_last_write_wins() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let record = engine.check_in(7, &profile, None, None).await.unwrap();

        let first = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap();
        engine
            .manual_check_out(7, &profile, record.id, first)
            .await
            .unwrap();
        let updated = engine
            .manual_check_out(7, &profile, record.id, second)
            .await
            .unwrap();

        assert_eq!(updated.manual_check_out_at, Some(second));
    }

    #[tokio::test]
    async fn manual_overwrite_policy_reject_second() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::RejectSecond);
        let profile = kolkata_profile();

        let record = engine.check_in(7, &profile, None, None).await.unwrap();

        let first = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        engine
            .manual_check_out(7, &profile, record.id, first)
            .await
            .unwrap();

        let second = Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap();
        let err = engine
            .manual_check_out(7, &profile, record.id, second)
            .await
            .unwrap_err();
        let EngineError::Rejected(rejection) = err else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.kind(), RejectionKind::Conflict);

        let kept = engine.find(7, record.id).await.unwrap();
        assert_eq!(kept.manual_check_out_at, Some(first));
    }

    #[tokio::test]
    async fn manual_check_out_enforces_time_rules() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let record = engine.check_in(7, &profile, None, None).await.unwrap();

        let before = Utc.with_ymd_and_hms(2024, 1, 10, 2, 0, 0).unwrap();
        let err = engine
            .manual_check_out(7, &profile, record.id, before)
            .await
            .unwrap_err();
        let EngineError::Rejected(r) = err else {
            panic!("expected rejection")
        };
        assert_eq!(r.kind(), RejectionKind::InvalidTransition);

        // Crosses into 2024-01-11 in Kolkata
        let next_day = Utc.with_ymd_and_hms(2024, 1, 10, 19, 0, 0).unwrap();
        let err = engine
            .manual_check_out(7, &profile, record.id, next_day)
            .await
            .unwrap_err();
        let EngineError::Rejected(r) = err else {
            panic!("expected rejection")
        };
        assert_eq!(r.kind(), RejectionKind::InvalidTransition);
    }

    #[tokio::test]
    async fn history_filters_on_derived_status() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock.clone(), OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        // Day 1: checked in, never checked out, computed checkout passed
        engine.check_in(7, &profile, None, None).await.unwrap();

        // Day 2: still active
        let next_morning = Utc.with_ymd_and_hms(2024, 1, 11, 3, 30, 0).unwrap();
        clock.set(next_morning);
        engine.check_in(7, &profile, None, None).await.unwrap();

        let query = HistoryQuery {
            from: None,
            to: None,
            status: Some(AttendanceStatus::Completed),
            page: 1,
            limit: 10,
            sort: SortKey::DateDesc,
        };
        let page = engine.history(7, &query).await.unwrap();

        // The day-1 record is completed by time passing even though
        // is_checked_out is still false in the store
        assert_eq!(page.total_records, 1);
        assert_eq!(
            page.records[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
        assert_eq!(page.records[0].status, AttendanceStatus::Completed);

        let active = HistoryQuery {
            status: Some(AttendanceStatus::Active),
            ..query
        };
        let page = engine.history(7, &active).await.unwrap();
        assert_eq!(page.total_records, 1);
        assert_eq!(
            page.records[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()
        );
    }

    #[tokio::test]
    async fn history_paginates_and_sorts() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock.clone(), OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        for day in 10u32..15 {
            clock.set(Utc.with_ymd_and_hms(2024, 1, day, 3, 30, 0).unwrap());
            engine.check_in(7, &profile, None, None).await.unwrap();
        }

        let query = HistoryQuery {
            from: Some(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()),
            to: None,
            status: None,
            page: 2,
            limit: 2,
            sort: SortKey::DateDesc,
        };
        let page = engine.history(7, &query).await.unwrap();

        assert_eq!(page.total_records, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.records.len(), 2);
        assert_eq!(
            page.records[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[tokio::test]
    async fn delete_is_scoped_and_reports_not_found() {
        let clock = FixedClock::at(nine_am_ist());
        let engine = engine(clock, OverwritePolicy::LastWriteWins);
        let profile = kolkata_profile();

        let record = engine.check_in(7, &profile, None, None).await.unwrap();

        let err = engine.delete(8, record.id).await.unwrap_err();
        let EngineError::Rejected(r) = err else {
            panic!("expected rejection")
        };
        assert_eq!(r.kind(), RejectionKind::NotFound);

        engine.delete(7, record.id).await.unwrap();
        assert!(engine.today(7, &profile).await.unwrap().is_none());
    }
}
