use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use super::record::AttendanceRecord;

const RECORD_COLUMNS: &str = "id, user_id, date, check_in_at, computed_check_out_at, \
     check_out_at, manual_check_out_at, is_checked_out, note";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// UNIQUE(user_id, date) violation; the engine maps this to the
    /// duplicate-check-in conflict.
    #[error("attendance record already exists for this day")]
    DuplicateDay,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Fields of a record fixed at creation.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub user_id: i64,
    pub date: NaiveDate,
    pub check_in_at: DateTime<Utc>,
    pub computed_check_out_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    CheckInDesc,
    CheckInAsc,
}

impl SortKey {
    /// Mongoose-style sort parameter: leading '-' means descending.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date" => Some(SortKey::DateAsc),
            "-date" => Some(SortKey::DateDesc),
            "check_in_at" => Some(SortKey::CheckInAsc),
            "-check_in_at" => Some(SortKey::CheckInDesc),
            _ => None,
        }
    }

    fn order_clause(&self) -> &'static str {
        match self {
            SortKey::DateAsc => "date ASC, check_in_at ASC",
            SortKey::DateDesc => "date DESC, check_in_at DESC",
            SortKey::CheckInAsc => "check_in_at ASC",
            SortKey::CheckInDesc => "check_in_at DESC",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

/// Day-key bounds are inclusive; ISO dates stored as TEXT compare correctly
/// as strings.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub sort: SortKey,
    pub page: Option<Page>,
}

/// Record store keyed by (user_id, date). All id lookups are scoped to the
/// owning user so foreign records read as absent.
#[allow(async_fn_in_trait)]
pub trait AttendanceStore: Send + Sync + 'static {
    async fn insert_new(&self, rec: NewRecord) -> Result<AttendanceRecord, StoreError>;
    async fn find_by_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn find_by_id(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
    async fn set_check_out(&self, record_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn set_manual_check_out(
        &self,
        record_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn list(
        &self,
        user_id: i64,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn count(&self, user_id: i64, filter: &RecordFilter) -> Result<i64, StoreError>;
    async fn delete(&self, user_id: i64, record_id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, record_id: i64) -> Result<AttendanceRecord, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?");
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(record_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    fn where_clause(filter: &RecordFilter) -> String {
        let mut conditions = vec!["user_id = ?"];
        if filter.from.is_some() {
            conditions.push("date >= ?");
        }
        if filter.to.is_some() {
            conditions.push("date <= ?");
        }
        conditions.join(" AND ")
    }
}

impl AttendanceStore for SqliteStore {
    async fn insert_new(&self, rec: NewRecord) -> Result<AttendanceRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (user_id, date, check_in_at, computed_check_out_at, is_checked_out, note)
            VALUES (?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(rec.user_id)
        .bind(rec.date)
        .bind(rec.check_in_at)
        .bind(rec.computed_check_out_at)
        .bind(&rec.note)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self.fetch(done.last_insert_rowid()).await,
            Err(e) => {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return Err(StoreError::DuplicateDay);
                    }
                }
                Err(StoreError::Database(e))
            }
        }
    }

    async fn find_by_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql =
            format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE user_id = ? AND date = ?");
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_by_id(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql =
            format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ? AND user_id = ?");
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(record_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn set_check_out(&self, record_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE attendance_records
            SET check_out_at = ?, is_checked_out = TRUE, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_manual_check_out(
        &self,
        record_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE attendance_records
            SET manual_check_out_at = ?, is_checked_out = TRUE, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(
        &self,
        user_id: i64,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE {} ORDER BY {}",
            Self::where_clause(filter),
            filter.sort.order_clause()
        );
        if filter.page.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql).bind(user_id);
        if let Some(from) = filter.from {
            query = query.bind(from);
        }
        if let Some(to) = filter.to {
            query = query.bind(to);
        }
        if let Some(page) = filter.page {
            query = query.bind(page.limit).bind(page.offset);
        }

        let records = query.fetch_all(&self.pool).await?;
        Ok(records)
    }

    async fn count(&self, user_id: i64, filter: &RecordFilter) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM attendance_records WHERE {}",
            Self::where_clause(filter)
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
        if let Some(from) = filter.from {
            query = query.bind(from);
        }
        if let Some(to) = filter.to {
            query = query.bind(to);
        }

        let total = query.fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn delete(&self, user_id: i64, record_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attendance_records WHERE id = ? AND user_id = ?")
            .bind(record_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::TimeZone;

    async fn store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        // Seed the users referenced by the test records so the
        // attendance_records -> users foreign key is satisfied.
        for id in [1i64, 2] {
            sqlx::query("INSERT INTO users (id, username, password) VALUES (?, ?, ?)")
                .bind(id)
                .bind(format!("user{id}"))
                .bind("x")
                .execute(&pool)
                .await
                .unwrap();
        }
        SqliteStore::new(pool)
    }

    fn new_record(user_id: i64, day: u32) -> NewRecord {
        NewRecord {
            user_id,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            check_in_at: Utc.with_ymd_and_hms(2024, 1, day, 3, 30, 0).unwrap(),
            computed_check_out_at: Utc.with_ymd_and_hms(2024, 1, day, 11, 30, 0).unwrap(),
            note: None,
        }
    }

    #[tokio::test]
    async fn duplicate_day_maps_unique_violation() {
        let store = store().await;
        store.insert_new(new_record(1, 10)).await.unwrap();

        let err = store.insert_new(new_record(1, 10)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateDay));

        // A different user on the same day is fine
        store.insert_new(new_record(2, 10)).await.unwrap();
    }

    #[tokio::test]
    async fn id_lookup_is_scoped_to_owner() {
        let store = store().await;
        let record = store.insert_new(new_record(1, 10)).await.unwrap();

        assert!(store.find_by_id(1, record.id).await.unwrap().is_some());
        assert!(store.find_by_id(2, record.id).await.unwrap().is_none());
        assert!(!store.delete(2, record.id).await.unwrap());
        assert!(store.delete(1, record.id).await.unwrap());
    }

    #[tokio::test]
    async fn checkout_updates_round_trip() {
        let store = store().await;
        let record = store.insert_new(new_record(1, 10)).await.unwrap();
        assert!(!record.is_checked_out);

        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        store.set_check_out(record.id, at).await.unwrap();

        let updated = store.find_by_id(1, record.id).await.unwrap().unwrap();
        assert_eq!(updated.check_out_at, Some(at));
        assert!(updated.is_checked_out);
        assert!(updated.manual_check_out_at.is_none());
    }

    #[tokio::test]
    async fn list_bounds_sort_and_pagination() {
        let store = store().await;
        for day in [10u32, 11, 12, 13] {
            store.insert_new(new_record(1, day)).await.unwrap();
        }
        store.insert_new(new_record(2, 10)).await.unwrap();

        let filter = RecordFilter {
            from: Some(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()),
            to: Some(NaiveDate::from_ymd_opt(2024, 1, 13).unwrap()),
            sort: SortKey::DateDesc,
            page: Some(Page { offset: 0, limit: 2 }),
        };

        let page = store.list(1, &filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].date, NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());
        assert_eq!(page[1].date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());

        assert_eq!(store.count(1, &filter).await.unwrap(), 3);
    }
}
