pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod storage;

pub use config::{ReportConfig, DEFAULT_HOURS_PER_TON};
pub use error::{Error, Result};
pub use metrics::{
    bucket_series, ChapterRow, ExecutorRow, Interval, MetricMode, Progress, SeriesRow,
    MASS_SCALE,
};
pub use storage::repository::EntityRef;
pub use storage::Database;

use storage::repository;

/// Main entry point for the progress reporting core: the
/// `(title_id, mode, interval) -> table` surface the presentation layer
/// calls. Operations validate their arguments up front; a store failure
/// is logged and yields the documented empty/sentinel result so one
/// failed interaction never takes the process down.
pub struct ProgressDW {
    db: Database,
    config: ReportConfig,
}

impl ProgressDW {
    pub fn new(db: Database, config: ReportConfig) -> Self {
        Self { db, config }
    }

    /// Open the database named by the configuration and wrap it.
    pub async fn connect(config: ReportConfig) -> Result<Self> {
        let path = config.resolve_db_path()?;
        let db = Database::open_at(path).await?;
        Ok(Self { db, config })
    }

    /// Access the database (for direct queries and test fixtures).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Reporting operations ───────────────────────────────────────

    /// The date-keyed chart series for a title, re-bucketed to the
    /// requested interval.
    pub async fn series(
        &self,
        title_id: i64,
        mode: MetricMode,
        interval: Interval,
    ) -> Result<Vec<SeriesRow>> {
        let rows = match mode {
            MetricMode::Mass => {
                metrics::title_series(&self.db, title_id, self.config.hours_per_ton).await
            }
            MetricMode::Drawings => metrics::drawing_series(&self.db, title_id).await,
        };
        let rows = or_empty("series", title_id, rows)?;
        Ok(bucket_series(rows, interval, mode))
    }

    /// Per-executor rollup for a title.
    pub async fn executors(&self, title_id: i64) -> Result<Vec<ExecutorRow>> {
        or_empty(
            "executors",
            title_id,
            metrics::executor_summary(&self.db, title_id, self.config.hours_per_ton).await,
        )
    }

    /// Per-chapter time breakdown for a title.
    pub async fn chapters(&self, title_id: i64) -> Result<Vec<ChapterRow>> {
        or_empty(
            "chapters",
            title_id,
            metrics::chapter_breakdown(&self.db, title_id).await,
        )
    }

    /// Completed mass against the larger of `target` (user-entered, tons)
    /// and the title's stored planned mass.
    pub async fn progress(&self, title_id: i64, target: Option<f64>) -> Result<Progress> {
        let completed = match metrics::completed_mass_tons(&self.db, title_id).await {
            Ok(tons) => tons,
            Err(Error::Database(e)) => {
                log::error!("progress failed for title_id={title_id}: {e}");
                return Ok(Progress::default());
            }
            Err(e) => return Err(e),
        };

        let initial = self
            .db
            .reader()
            .call(move |conn| repository::get_title_initial_mass(conn, title_id))
            .await;
        let initial_tons = match initial {
            Ok(stored) => stored.flatten().unwrap_or(0) as f64 / MASS_SCALE,
            Err(e) => {
                log::error!("progress failed for title_id={title_id}: {e}");
                return Ok(Progress::default());
            }
        };

        let (completed_tons, percent) =
            metrics::progress_ratio(completed, target.unwrap_or(0.0), initial_tons);
        Ok(Progress {
            completed_tons,
            percent,
        })
    }

    // ── Selector lists and status ──────────────────────────────────

    pub async fn projects(&self) -> Result<Vec<EntityRef>> {
        self.db
            .reader()
            .call(|conn| repository::list_projects(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn titles(&self, project_id: i64) -> Result<Vec<EntityRef>> {
        if project_id <= 0 {
            return Err(Error::InvalidArgument(format!(
                "project_id must be a positive integer, got {project_id}"
            )));
        }
        self.db
            .reader()
            .call(move |conn| repository::list_titles(conn, project_id))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn status(&self) -> Result<Vec<(String, i64)>> {
        self.db
            .reader()
            .call(|conn| repository::table_counts(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Store failures degrade to the empty/sentinel result for the
/// presentation layer; everything else (validation errors included)
/// propagates unchanged.
fn or_empty<T: Default>(operation: &str, title_id: i64, result: Result<T>) -> Result<T> {
    match result {
        Err(Error::Database(e)) => {
            log::error!("{operation} failed for title_id={title_id}: {e}");
            Ok(T::default())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use storage::repository::{
        create_project, create_title, upsert_executor, upsert_modeling_day, ModelingDay,
    };

    async fn dw() -> ProgressDW {
        let db = Database::open_memory().await.unwrap();
        ProgressDW::new(db, ReportConfig::default())
    }

    async fn seed_title(dw: &ProgressDW, initial_mass_grams: Option<i64>) -> i64 {
        dw.db()
            .writer()
            .call(move |conn| {
                let project = create_project(conn, "Plant 7")?;
                let title = create_title(conn, "Boiler house", project, initial_mass_grams)?;
                let executor = upsert_executor(conn, 1, "Ivanov I.I.")?;
                upsert_modeling_day(
                    conn,
                    &ModelingDay {
                        date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                        executor_id: executor,
                        title_id: title,
                        total_mass_grams: Some(10_000_000),
                        total_complexity: Some(2.0),
                        record_count: 4,
                    },
                )?;
                Ok::<i64, rusqlite::Error>(title)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_series_validates_before_store_access() {
        let dw = dw().await;
        assert!(matches!(
            dw.series(-5, MetricMode::Mass, Interval::Day).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_series_mass_mode_buckets() {
        let dw = dw().await;
        let title = seed_title(&dw, None).await;

        let rows = dw.series(title, MetricMode::Mass, Interval::Month).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(rows[0].total_mass, 10.0);
    }

    #[tokio::test]
    async fn test_progress_uses_stored_initial_mass() {
        let dw = dw().await;
        let title = seed_title(&dw, Some(20_000_000)).await;

        // 10 t completed of a 20 t stored target.
        let p = dw.progress(title, None).await.unwrap();
        assert_eq!(p.completed_tons, 10.0);
        assert_eq!(p.percent, 50.0);

        // A larger user-entered target wins over the stored one.
        let p = dw.progress(title, Some(40.0)).await.unwrap();
        assert_eq!(p.percent, 25.0);
    }

    #[tokio::test]
    async fn test_progress_sentinel_without_data_or_target() {
        let dw = dw().await;
        let title = dw
            .db()
            .writer()
            .call(|conn| {
                let project = create_project(conn, "P")?;
                create_title(conn, "T", project, None)
            })
            .await
            .unwrap();

        let p = dw.progress(title, None).await.unwrap();
        assert_eq!(p, Progress::default());
    }

    #[tokio::test]
    async fn test_selector_lists_and_status() {
        let dw = dw().await;
        let title = seed_title(&dw, None).await;

        let projects = dw.projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        let titles = dw.titles(projects[0].id).await.unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].id, title);

        let status = dw.status().await.unwrap();
        let modeling = status.iter().find(|(t, _)| t == "modeling_data").unwrap();
        assert_eq!(modeling.1, 1);

        assert!(matches!(
            dw.titles(0).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
