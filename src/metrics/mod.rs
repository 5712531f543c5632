pub mod bucket;
pub mod types;

pub use bucket::{bucket_series, Interval};
pub use types::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::storage::Database;

/// Mass facts are stored in grams; divide by this exactly once, after
/// integer summation, to get metric tons.
pub const MASS_SCALE: f64 = 1_000_000.0;

fn check_title_id(title_id: i64) -> Result<()> {
    if title_id <= 0 {
        return Err(Error::InvalidArgument(format!(
            "title_id must be a positive integer, got {title_id}"
        )));
    }
    Ok(())
}

/// Compute the mass-mode series for a title: modeled mass and average
/// complexity per date, with tracked modeling-tool hours joined onto the
/// modeling dates and the planned mass derived from them.
pub async fn title_series(
    db: &Database,
    title_id: i64,
    hours_per_ton: f64,
) -> Result<Vec<SeriesRow>> {
    check_title_id(title_id)?;

    db.reader()
        .call(move |conn| {
            guarded(conn, |conn| {
                let modeling = modeling_by_date_sql(conn, title_id)?;
                let hours = tekla_hours_by_date_sql(conn, title_id)?;

                let rows: Vec<SeriesRow> = modeling
                    .into_iter()
                    .map(|(date, mass_grams, complexity)| {
                        let total_hours = hours.get(&date).copied().unwrap_or(0.0);
                        SeriesRow {
                            date,
                            total_mass: mass_grams as f64 / MASS_SCALE,
                            planned_mass: total_hours / hours_per_ton,
                            complexity,
                            total_drawings: 0,
                            total_hours,
                        }
                    })
                    .collect();
                Ok(rows)
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Compute the drawing-mode series for a title: sheet count, drawing
/// complexity and drawn mass per date.
pub async fn drawing_series(db: &Database, title_id: i64) -> Result<Vec<SeriesRow>> {
    check_title_id(title_id)?;

    db.reader()
        .call(move |conn| {
            guarded(conn, |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.date,
                            SUM(d.drawing_count),
                            TOTAL(d.total_complexity),
                            SUM(d.total_mass_grams)
                     FROM drawing_data d
                     WHERE d.title_id = ?1
                     GROUP BY d.date
                     ORDER BY d.date",
                )?;
                let raw: Vec<(String, Option<i64>, f64, Option<i64>)> = stmt
                    .query_map([title_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<std::result::Result<_, _>>()?;

                let rows: Vec<SeriesRow> = raw
                    .into_iter()
                    .filter_map(|(date, drawings, complexity, mass_grams)| {
                        let date = parse_date_key(&date, "drawing_series")?;
                        Some(SeriesRow {
                            date,
                            total_mass: mass_grams.unwrap_or(0) as f64 / MASS_SCALE,
                            planned_mass: 0.0,
                            complexity,
                            total_drawings: drawings.unwrap_or(0),
                            total_hours: 0.0,
                        })
                    })
                    .collect();
                Ok(rows)
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Sum tracked task time per chapter for a title and compute each
/// chapter's share of the total. Every percentage is 0 when the total
/// is 0; otherwise the shares sum to 100 barring rounding.
pub async fn chapter_breakdown(db: &Database, title_id: i64) -> Result<Vec<ChapterRow>> {
    check_title_id(title_id)?;

    db.reader()
        .call(move |conn| {
            guarded(conn, |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.name, TOTAL(w.hours)
                     FROM title_chapters c
                     JOIN worksection_tasks w ON w.chapter_id = c.id
                     WHERE w.title_id = ?1
                     GROUP BY c.name
                     ORDER BY c.name",
                )?;
                let raw: Vec<(String, f64)> = stmt
                    .query_map([title_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<_, _>>()?;

                let total: f64 = raw.iter().map(|(_, t)| t).sum();
                let rows: Vec<ChapterRow> = raw
                    .into_iter()
                    .map(|(chapter_name, total_time)| ChapterRow {
                        chapter_name,
                        total_time,
                        percentage: if total > 0.0 {
                            total_time / total * 100.0
                        } else {
                            0.0
                        },
                    })
                    .collect();
                Ok(rows)
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Roll up all four fact tables to one row per executor for a title.
/// Executors appear if they contributed to any table; missing
/// contributions are zero.
pub async fn executor_summary(
    db: &Database,
    title_id: i64,
    hours_per_ton: f64,
) -> Result<Vec<ExecutorRow>> {
    check_title_id(title_id)?;

    db.reader()
        .call(move |conn| {
            guarded(conn, |conn| {
                let mut merged: BTreeMap<String, ExecutorRow> = BTreeMap::new();
                fn row_for<'a>(
                    map: &'a mut BTreeMap<String, ExecutorRow>,
                    name: String,
                ) -> &'a mut ExecutorRow {
                    map.entry(name.clone()).or_insert_with(|| ExecutorRow {
                        name,
                        ..Default::default()
                    })
                }

                for (name, mass_grams) in executor_modeling_sql(conn, title_id)? {
                    row_for(&mut merged, name).total_mass_modeling =
                        mass_grams as f64 / MASS_SCALE;
                }
                for (name, hours) in executor_worksection_hours_sql(conn, title_id)? {
                    let row = row_for(&mut merged, name);
                    row.total_hours = hours;
                    row.planned_mass = hours / hours_per_ton;
                }
                for (name, drawings, complexity, mass_grams) in
                    executor_drawing_sql(conn, title_id)?
                {
                    let row = row_for(&mut merged, name);
                    row.completed_drawings = drawings;
                    row.total_complexity_drawing = complexity;
                    row.total_mass_drawing = mass_grams as f64 / MASS_SCALE;
                }
                for (name, tekla) in executor_tekla_sql(conn, title_id)? {
                    row_for(&mut merged, name).tekla_hours = tekla;
                }

                let rows: Vec<ExecutorRow> = merged
                    .into_values()
                    .map(|mut row| {
                        row.tekla_percentage = if row.total_hours != 0.0 {
                            round1(row.tekla_hours / row.total_hours * 100.0)
                        } else {
                            0.0
                        };
                        row
                    })
                    .collect();
                Ok(rows)
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Total modeled mass for a title, in metric tons.
pub async fn completed_mass_tons(db: &Database, title_id: i64) -> Result<f64> {
    check_title_id(title_id)?;

    db.reader()
        .call(move |conn| {
            guarded(conn, |conn| {
                let grams: Option<i64> = conn.query_row(
                    "SELECT SUM(total_mass_grams) FROM modeling_data WHERE title_id = ?1",
                    [title_id],
                    |row| row.get(0),
                )?;
                Ok(grams.unwrap_or(0) as f64 / MASS_SCALE)
            })
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Completed mass against the larger of the user-entered target and the
/// stored planned mass. The denominator must be positive for a ratio;
/// `(0, 0)` is the no-data sentinel when both sides are non-positive.
pub fn progress_ratio(completed: f64, target: f64, initial_mass: f64) -> (f64, f64) {
    let denominator = target.max(initial_mass);
    if denominator <= 0.0 {
        return if completed <= 0.0 {
            (0.0, 0.0)
        } else {
            (completed, 0.0)
        };
    }
    (completed, completed / denominator * 100.0)
}

// ── Internal SQL helpers ───────────────────────────────────────────

/// Run a read-only query batch; if a failing statement leaves an explicit
/// transaction open on the shared session, roll it back before surfacing
/// the error.
fn guarded<T>(
    conn: &rusqlite::Connection,
    f: impl FnOnce(&rusqlite::Connection) -> std::result::Result<T, rusqlite::Error>,
) -> std::result::Result<T, rusqlite::Error> {
    let result = f(conn);
    if result.is_err() && !conn.is_autocommit() {
        let _ = conn.execute_batch("ROLLBACK");
    }
    result
}

/// Parse a stored date key, excluding unparseable rows from aggregation
/// instead of coercing them.
fn parse_date_key(s: &str, operation: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            log::warn!("{operation}: excluding row with invalid date {s:?}");
            None
        }
    }
}

fn modeling_by_date_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<Vec<(NaiveDate, i64, f64)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT m.date, SUM(m.total_mass_grams), AVG(m.total_complexity)
         FROM modeling_data m
         WHERE m.title_id = ?1
         GROUP BY m.date
         ORDER BY m.date",
    )?;
    let raw: Vec<(String, Option<i64>, Option<f64>)> = stmt
        .query_map([title_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<_, _>>()?;

    Ok(raw
        .into_iter()
        .filter_map(|(date, mass, complexity)| {
            let date = parse_date_key(&date, "title_series")?;
            Some((date, mass.unwrap_or(0), complexity.unwrap_or(0.0)))
        })
        .collect())
}

fn tekla_hours_by_date_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<BTreeMap<NaiveDate, f64>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT t.date, TOTAL(t.hours_worked)
         FROM tekla_hours t
         WHERE t.title_id = ?1
         GROUP BY t.date",
    )?;
    let raw: Vec<(String, f64)> = stmt
        .query_map([title_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    Ok(raw
        .into_iter()
        .filter_map(|(date, hours)| Some((parse_date_key(&date, "title_series")?, hours)))
        .collect())
}

fn executor_modeling_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<Vec<(String, i64)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.name, SUM(m.total_mass_grams)
         FROM executors e
         JOIN modeling_data m ON m.executor_id = e.id
         WHERE m.title_id = ?1
         GROUP BY e.name",
    )?;
    let rows = stmt.query_map([title_id], |row| {
        Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0)))
    })?;
    rows.collect()
}

fn executor_worksection_hours_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<Vec<(String, f64)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.name, TOTAL(h.hours_worked)
         FROM executors e
         JOIN worksection_hours h ON h.executor_id = e.id
         WHERE h.title_id = ?1
         GROUP BY e.name",
    )?;
    let rows = stmt.query_map([title_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn executor_drawing_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<Vec<(String, i64, f64, i64)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.name,
                SUM(d.drawing_count),
                TOTAL(d.total_complexity),
                SUM(d.total_mass_grams)
         FROM executors e
         JOIN drawing_data d ON d.executor_id = e.id
         WHERE d.title_id = ?1
         GROUP BY e.name",
    )?;
    let rows = stmt.query_map([title_id], |row| {
        Ok((
            row.get(0)?,
            row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            row.get(2)?,
            row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        ))
    })?;
    rows.collect()
}

fn executor_tekla_sql(
    conn: &rusqlite::Connection,
    title_id: i64,
) -> std::result::Result<Vec<(String, f64)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.name, TOTAL(t.hours_worked)
         FROM executors e
         JOIN tekla_hours t ON t.executor_id = e.id
         WHERE t.title_id = ?1
         GROUP BY e.name",
    )?;
    let rows = stmt.query_map([title_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::{
        create_chapter, create_project, create_title, create_worksection_task, upsert_executor,
        upsert_drawing_day, upsert_modeling_day, upsert_tekla_day, upsert_worksection_hours,
        DrawingDay, ModelingDay,
    };
    use crate::storage::Database;

    const K: f64 = 3.0;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Seed a project/title with one executor and a few fact rows; returns
    /// the title id.
    async fn seed(db: &Database) -> i64 {
        db.writer()
            .call(|conn| {
                let project = create_project(conn, "Plant 7")?;
                let title = create_title(conn, "Boiler house", project, Some(20_000_000))?;
                let ivanov = upsert_executor(conn, 1, "Ivanov I.I.")?;
                let petrov = upsert_executor(conn, 2, "Petrov P.P.")?;

                // Modeling: two executors on the same date, one on a later date.
                upsert_modeling_day(
                    conn,
                    &ModelingDay {
                        date: d("2025-03-10"),
                        executor_id: ivanov,
                        title_id: title,
                        total_mass_grams: Some(4_000_000),
                        total_complexity: Some(2.0),
                        record_count: 5,
                    },
                )?;
                upsert_modeling_day(
                    conn,
                    &ModelingDay {
                        date: d("2025-03-10"),
                        executor_id: petrov,
                        title_id: title,
                        total_mass_grams: Some(2_000_000),
                        total_complexity: Some(4.0),
                        record_count: 2,
                    },
                )?;
                upsert_modeling_day(
                    conn,
                    &ModelingDay {
                        date: d("2025-03-11"),
                        executor_id: ivanov,
                        title_id: title,
                        total_mass_grams: Some(1_000_000),
                        total_complexity: Some(3.0),
                        record_count: 1,
                    },
                )?;

                // Tekla hours: one date overlapping modeling, one NULL entry.
                upsert_tekla_day(conn, d("2025-03-10"), ivanov, title, Some(9.0))?;
                upsert_tekla_day(conn, d("2025-03-10"), petrov, title, None)?;

                // Drawings.
                upsert_drawing_day(
                    conn,
                    &DrawingDay {
                        date: d("2025-03-10"),
                        executor_id: ivanov,
                        title_id: title,
                        drawing_count: 4,
                        total_complexity: Some(1.5),
                        total_mass_grams: Some(500_000),
                    },
                )?;

                // Worksection: two chapters, tasks and tracked hours.
                let ch_a = create_chapter(conn, "KM", title)?;
                let ch_b = create_chapter(conn, "KMD", title)?;
                let t1 = create_worksection_task(
                    conn, "Frame", d("2025-03-10"), 6.0, 12_000, ivanov, title, ch_a,
                )?;
                let _t2 = create_worksection_task(
                    conn, "Sheets", d("2025-03-11"), 2.0, 4_000, petrov, title, ch_b,
                )?;
                upsert_worksection_hours(conn, d("2025-03-10"), t1, title, ivanov, Some(6.0))?;
                upsert_worksection_hours(conn, d("2025-03-11"), t1, title, petrov, None)?;

                Ok::<i64, rusqlite::Error>(title)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_title_series() {
        let db = Database::open_memory().await.unwrap();
        let title = seed(&db).await;

        let rows = title_series(&db, title, K).await.unwrap();
        assert_eq!(rows.len(), 2);

        // 2025-03-10: 6 tons across both executors, mean complexity 3,
        // 9 tracked hours (the NULL entry contributes zero).
        assert_eq!(rows[0].date, d("2025-03-10"));
        assert_eq!(rows[0].total_mass, 6.0);
        assert_eq!(rows[0].complexity, 3.0);
        assert_eq!(rows[0].total_hours, 9.0);
        assert_eq!(rows[0].planned_mass, 3.0);

        // 2025-03-11 has modeling but no tracked hours.
        assert_eq!(rows[1].date, d("2025-03-11"));
        assert_eq!(rows[1].total_mass, 1.0);
        assert_eq!(rows[1].total_hours, 0.0);
        assert_eq!(rows[1].planned_mass, 0.0);
    }

    #[tokio::test]
    async fn test_drawing_series() {
        let db = Database::open_memory().await.unwrap();
        let title = seed(&db).await;

        let rows = drawing_series(&db, title).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_drawings, 4);
        assert_eq!(rows[0].complexity, 1.5);
        assert_eq!(rows[0].total_mass, 0.5);
    }

    #[tokio::test]
    async fn test_chapter_breakdown_percentages_sum_to_100() {
        let db = Database::open_memory().await.unwrap();
        let title = seed(&db).await;

        let rows = chapter_breakdown(&db, title).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chapter_name, "KM");
        assert_eq!(rows[0].total_time, 6.0);
        assert_eq!(rows[1].chapter_name, "KMD");
        assert_eq!(rows[1].total_time, 2.0);

        let total_pct: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((total_pct - 100.0).abs() < 1e-9);
        assert_eq!(rows[0].percentage, 75.0);
    }

    #[tokio::test]
    async fn test_chapter_breakdown_zero_total_is_all_zero() {
        let db = Database::open_memory().await.unwrap();

        let title = db
            .writer()
            .call(|conn| {
                let project = create_project(conn, "P")?;
                let title = create_title(conn, "T", project, None)?;
                let e = upsert_executor(conn, 1, "A")?;
                let ch = create_chapter(conn, "KM", title)?;
                create_worksection_task(conn, "x", d("2025-01-01"), 0.0, 0, e, title, ch)?;
                Ok::<i64, rusqlite::Error>(title)
            })
            .await
            .unwrap();

        let rows = chapter_breakdown(&db, title).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].percentage, 0.0);
        assert!(rows[0].percentage.is_finite());
    }

    #[tokio::test]
    async fn test_executor_summary() {
        let db = Database::open_memory().await.unwrap();
        let title = seed(&db).await;

        let rows = executor_summary(&db, title, K).await.unwrap();
        assert_eq!(rows.len(), 2);

        let ivanov = &rows[0];
        assert_eq!(ivanov.name, "Ivanov I.I.");
        assert_eq!(ivanov.total_mass_modeling, 5.0);
        assert_eq!(ivanov.total_hours, 6.0);
        assert_eq!(ivanov.planned_mass, 2.0);
        assert_eq!(ivanov.completed_drawings, 4);
        assert_eq!(ivanov.total_complexity_drawing, 1.5);
        assert_eq!(ivanov.total_mass_drawing, 0.5);
        assert_eq!(ivanov.tekla_hours, 9.0);
        assert_eq!(ivanov.tekla_percentage, 150.0);

        // Petrov tracked no Worksection hours (one NULL row) and his Tekla
        // entry is NULL: the percentage must be exactly zero, not NaN.
        let petrov = &rows[1];
        assert_eq!(petrov.name, "Petrov P.P.");
        assert_eq!(petrov.total_mass_modeling, 2.0);
        assert_eq!(petrov.total_hours, 0.0);
        assert_eq!(petrov.tekla_hours, 0.0);
        assert_eq!(petrov.tekla_percentage, 0.0);
        assert!(petrov.tekla_percentage.is_finite());
    }

    #[tokio::test]
    async fn test_empty_title_returns_empty_structures() {
        let db = Database::open_memory().await.unwrap();

        let title = db
            .writer()
            .call(|conn| {
                let project = create_project(conn, "P")?;
                create_title(conn, "T", project, None)
            })
            .await
            .unwrap();

        assert!(title_series(&db, title, K).await.unwrap().is_empty());
        assert!(drawing_series(&db, title).await.unwrap().is_empty());
        assert!(chapter_breakdown(&db, title).await.unwrap().is_empty());
        assert!(executor_summary(&db, title, K).await.unwrap().is_empty());
        assert_eq!(completed_mass_tons(&db, title).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_invalid_title_id_fails_fast() {
        let db = Database::open_memory().await.unwrap();

        for bad in [0, -1, -42] {
            assert!(matches!(
                title_series(&db, bad, K).await,
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                drawing_series(&db, bad).await,
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                chapter_breakdown(&db, bad).await,
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                executor_summary(&db, bad, K).await,
                Err(Error::InvalidArgument(_))
            ));
            assert!(matches!(
                completed_mass_tons(&db, bad).await,
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(progress_ratio(50.0, 100.0, 0.0), (50.0, 50.0));
        // No target, no data: sentinel pair.
        assert_eq!(progress_ratio(0.0, 0.0, 0.0), (0.0, 0.0));
        // Stored planned mass backs the ratio when no target is entered.
        assert_eq!(progress_ratio(10.0, 0.0, 20.0), (10.0, 50.0));
        // The larger of target and stored mass wins.
        assert_eq!(progress_ratio(30.0, 60.0, 20.0), (30.0, 50.0));
        // Completed work with no usable denominator reports zero percent.
        assert_eq!(progress_ratio(5.0, 0.0, -1.0), (5.0, 0.0));
        assert_eq!(progress_ratio(5.0, -3.0, 0.0), (5.0, 0.0));
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.66), 66.7);
        assert_eq!(round1(0.0), 0.0);
    }
}
