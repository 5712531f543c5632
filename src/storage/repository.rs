use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// A project or title reference for selector lists.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

/// One ingested day of modeling work for an (executor, title) pair.
#[derive(Debug, Clone)]
pub struct ModelingDay {
    pub date: NaiveDate,
    pub executor_id: i64,
    pub title_id: i64,
    pub total_mass_grams: Option<i64>,
    pub total_complexity: Option<f64>,
    pub record_count: i64,
}

/// One ingested day of drawing work for an (executor, title) pair.
#[derive(Debug, Clone)]
pub struct DrawingDay {
    pub date: NaiveDate,
    pub executor_id: i64,
    pub title_id: i64,
    pub drawing_count: i64,
    pub total_complexity: Option<f64>,
    pub total_mass_grams: Option<i64>,
}

/// Normalize an executor name before lookup or creation: NFKC, then
/// collapse whitespace runs (this also folds non-breaking spaces) and trim.
/// Every repository entry point that touches executor names goes through
/// this, so spelling variants of one person resolve to one row.
pub fn normalize_executor_name(name: &str) -> String {
    name.nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

// ── Projects and titles ────────────────────────────────────────────

pub fn get_project_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM projects WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

pub fn create_project(conn: &Connection, name: &str) -> Result<i64, rusqlite::Error> {
    conn.execute("INSERT INTO projects (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_title_by_name(
    conn: &Connection,
    project_id: i64,
    name: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM titles WHERE project_id = ?1 AND name = ?2",
        params![project_id, name],
        |row| row.get(0),
    )
    .optional()
}

pub fn create_title(
    conn: &Connection,
    name: &str,
    project_id: i64,
    initial_mass_grams: Option<i64>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO titles (name, project_id, initial_mass_grams) VALUES (?1, ?2, ?3)",
        params![name, project_id, initial_mass_grams],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The stored planned-mass target for a title. Outer `None` means the
/// title does not exist; inner `None` means no target was recorded.
pub fn get_title_initial_mass(
    conn: &Connection,
    title_id: i64,
) -> Result<Option<Option<i64>>, rusqlite::Error> {
    conn.query_row(
        "SELECT initial_mass_grams FROM titles WHERE id = ?1",
        params![title_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn create_chapter(
    conn: &Connection,
    name: &str,
    title_id: i64,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO title_chapters (name, title_id) VALUES (?1, ?2)",
        params![name, title_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_projects(conn: &Connection) -> Result<Vec<EntityRef>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, name FROM projects ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(EntityRef {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn list_titles(
    conn: &Connection,
    project_id: i64,
) -> Result<Vec<EntityRef>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM titles WHERE project_id = ?1 ORDER BY name")?;
    let rows = stmt.query_map([project_id], |row| {
        Ok(EntityRef {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

// ── Executors ──────────────────────────────────────────────────────

pub fn find_executor_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    let normalized = normalize_executor_name(name);
    conn.query_row(
        "SELECT id FROM executors WHERE name = ?1",
        params![normalized],
        |row| row.get(0),
    )
    .optional()
}

/// Insert an executor or update the stored name if the number is already
/// known. The name is normalized on the way in.
pub fn upsert_executor(
    conn: &Connection,
    number: i64,
    name: &str,
) -> Result<i64, rusqlite::Error> {
    let normalized = normalize_executor_name(name);
    conn.execute(
        "INSERT INTO executors (number, name) VALUES (?1, ?2)
         ON CONFLICT(number) DO UPDATE SET name = excluded.name",
        params![number, normalized],
    )?;
    conn.query_row(
        "SELECT id FROM executors WHERE number = ?1",
        params![number],
        |row| row.get(0),
    )
}

// ── Fact upserts (ingestion side and test fixtures) ────────────────

pub fn upsert_modeling_day(
    conn: &Connection,
    day: &ModelingDay,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO modeling_data (
            date, executor_id, title_id, total_mass_grams, total_complexity, record_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(executor_id, title_id, date) DO UPDATE SET
            total_mass_grams = excluded.total_mass_grams,
            total_complexity = excluded.total_complexity,
            record_count = excluded.record_count",
        params![
            date_key(day.date),
            day.executor_id,
            day.title_id,
            day.total_mass_grams,
            day.total_complexity,
            day.record_count,
        ],
    )?;
    Ok(())
}

pub fn upsert_drawing_day(conn: &Connection, day: &DrawingDay) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO drawing_data (
            date, executor_id, title_id, drawing_count, total_complexity, total_mass_grams
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(executor_id, title_id, date) DO UPDATE SET
            drawing_count = excluded.drawing_count,
            total_complexity = excluded.total_complexity,
            total_mass_grams = excluded.total_mass_grams",
        params![
            date_key(day.date),
            day.executor_id,
            day.title_id,
            day.drawing_count,
            day.total_complexity,
            day.total_mass_grams,
        ],
    )?;
    Ok(())
}

pub fn upsert_tekla_day(
    conn: &Connection,
    date: NaiveDate,
    executor_id: i64,
    title_id: i64,
    hours_worked: Option<f64>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO tekla_hours (date, executor_id, title_id, hours_worked)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(executor_id, title_id, date) DO UPDATE SET
             hours_worked = excluded.hours_worked",
        params![date_key(date), executor_id, title_id, hours_worked],
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn create_worksection_task(
    conn: &Connection,
    name: &str,
    date: NaiveDate,
    hours: f64,
    money_cents: i64,
    executor_id: i64,
    title_id: i64,
    chapter_id: i64,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO worksection_tasks (
            name, date, hours, money_cents, executor_id, title_id, chapter_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            name,
            date_key(date),
            hours,
            money_cents,
            executor_id,
            title_id,
            chapter_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn upsert_worksection_hours(
    conn: &Connection,
    date: NaiveDate,
    task_id: i64,
    title_id: i64,
    executor_id: i64,
    hours_worked: Option<f64>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO worksection_hours (date, task_id, title_id, executor_id, hours_worked)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(executor_id, task_id, date) DO UPDATE SET
             hours_worked = excluded.hours_worked",
        params![date_key(date), task_id, title_id, executor_id, hours_worked],
    )?;
    Ok(())
}

// ── Status ─────────────────────────────────────────────────────────

const FACT_TABLES: &[&str] = &[
    "projects",
    "titles",
    "title_chapters",
    "executors",
    "worksection_tasks",
    "modeling_data",
    "drawing_data",
    "tekla_hours",
    "worksection_hours",
];

/// Row counts per table, for the `status` command.
pub fn table_counts(conn: &Connection) -> Result<Vec<(String, i64)>, rusqlite::Error> {
    let mut counts = Vec::with_capacity(FACT_TABLES.len());
    for table in FACT_TABLES {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        counts.push((table.to_string(), count));
    }
    Ok(counts)
}
