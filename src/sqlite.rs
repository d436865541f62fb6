use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::domain::{DailyCount, DoublingEntry, SliceBatch};

pub const DEFAULT_DB_FILE: &str = "releasedates.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS slices (
    slice_start   TEXT PRIMARY KEY,
    slice_end     TEXT NOT NULL,
    total_results INTEGER NOT NULL,
    page_count    INTEGER NOT NULL,
    fetched_at    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS records (
    id           INTEGER PRIMARY KEY,
    release_date TEXT NOT NULL,
    title        TEXT NOT NULL,
    slice_start  TEXT NOT NULL,
    position     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS records_by_slice ON records (slice_start, position);
CREATE TABLE IF NOT EXISTS daily_counts (
    date           TEXT PRIMARY KEY,
    count          INTEGER NOT NULL,
    cumulative_sum INTEGER NOT NULL,
    doubling_date  TEXT
);
CREATE TABLE IF NOT EXISTS doubling_series (
    date                TEXT PRIMARY KEY,
    days_until_doubling INTEGER NOT NULL,
    doubling_date       TEXT NOT NULL
);
";

pub fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE)
}

pub fn open_store(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open store at {:?}", path))?;
    conn.execute_batch(SCHEMA)
        .context("Failed to initialize store schema")?;
    info!(action = "open", component = "store", path = ?path, "Connected to database");
    Ok(conn)
}

/// Store one slice as its own unit. Writing a slice again replaces the
/// earlier batch with the same start date; records are unique by id.
pub fn write_slice_batch(conn: &mut Connection, batch: &SliceBatch) -> Result<()> {
    let start_time = Instant::now();
    let tx = conn.transaction()?;
    {
        tx.execute(
            "DELETE FROM records WHERE slice_start = ?1",
            params![batch.slice.start_date],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO slices (slice_start, slice_end, total_results, page_count, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                batch.slice.start_date,
                batch.slice.end_date,
                batch.total_results as i64,
                batch.page_count,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let mut insert = tx.prepare(
            "INSERT OR REPLACE INTO records (id, release_date, title, slice_start, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, record) in batch.records.iter().enumerate() {
            insert.execute(params![
                record.id as i64,
                record.release_date,
                record.title,
                batch.slice.start_date,
                position as i64,
            ])?;
        }
    }
    tx.commit().context("Failed to commit slice batch")?;

    info!(
        action = "write",
        component = "store",
        slice = %batch.slice,
        record_count = batch.records.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Slice batch written"
    );
    Ok(())
}

pub fn load_release_dates(conn: &Connection) -> Result<Vec<NaiveDate>> {
    let start_time = Instant::now();
    let dates = conn
        .prepare("SELECT release_date FROM records")?
        .query_map([], |row| row.get(0))?
        .collect::<SqliteResult<Vec<NaiveDate>>>()
        .context("Failed to load release dates")?;

    info!(
        action = "query",
        component = "store",
        record_count = dates.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded release dates"
    );
    Ok(dates)
}

/// Replace the aggregate table. `doubling_dates` is parallel to `counts`.
pub fn write_daily_counts(
    conn: &mut Connection,
    counts: &[DailyCount],
    doubling_dates: &[Option<NaiveDate>],
) -> Result<()> {
    if counts.len() != doubling_dates.len() {
        anyhow::bail!(
            "Got {} doubling dates for {} daily counts",
            doubling_dates.len(),
            counts.len()
        );
    }

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM daily_counts", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO daily_counts (date, count, cumulative_sum, doubling_date) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (count, doubling_date) in counts.iter().zip(doubling_dates) {
            insert.execute(params![
                count.date,
                count.count as i64,
                count.cumulative_sum as i64,
                doubling_date,
            ])?;
        }
    }
    tx.commit().context("Failed to commit daily counts")?;

    info!(action = "write", component = "store", row_count = counts.len(), "Daily counts written");
    Ok(())
}

pub fn load_daily_counts(conn: &Connection) -> Result<Vec<(DailyCount, Option<NaiveDate>)>> {
    let rows: Vec<(DailyCount, Option<NaiveDate>)> = conn
        .prepare("SELECT date, count, cumulative_sum, doubling_date FROM daily_counts ORDER BY date")?
        .query_map([], |row| {
            let count: i64 = row.get(1)?;
            let cumulative_sum: i64 = row.get(2)?;
            Ok((
                DailyCount {
                    date: row.get(0)?,
                    count: count as u64,
                    cumulative_sum: cumulative_sum as u64,
                },
                row.get(3)?,
            ))
        })?
        .collect::<SqliteResult<Vec<_>>>()
        .context("Failed to load daily counts")?;
    Ok(rows)
}

pub fn write_doubling_series(conn: &mut Connection, series: &[DoublingEntry]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM doubling_series", [])?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO doubling_series (date, days_until_doubling, doubling_date) VALUES (?1, ?2, ?3)",
        )?;
        for entry in series {
            insert.execute(params![entry.date, entry.days_until_doubling, entry.doubling_date])?;
        }
    }
    tx.commit().context("Failed to commit doubling series")?;

    info!(action = "write", component = "store", row_count = series.len(), "Doubling series written");
    Ok(())
}

pub fn load_doubling_series(conn: &Connection) -> Result<Vec<DoublingEntry>> {
    let series = conn
        .prepare("SELECT date, days_until_doubling, doubling_date FROM doubling_series ORDER BY date")?
        .query_map([], |row| {
            Ok(DoublingEntry {
                date: row.get(0)?,
                days_until_doubling: row.get(1)?,
                doubling_date: row.get(2)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()
        .context("Failed to load doubling series")?;
    Ok(series)
}

pub fn get_date_range(conn: &Connection) -> Result<(String, String, i64)> {
    let start_time = Instant::now();
    info!(action = "start", component = "date_range_query", "Querying release date range");

    let (earliest, latest): (Option<NaiveDate>, Option<NaiveDate>) = conn
        .query_row(
            "SELECT MIN(release_date), MAX(release_date) FROM records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("Failed to query release dates")?;

    if let (Some(earliest), Some(latest)) = (earliest, latest) {
        let days_between = (latest - earliest).num_days();
        info!(
            action = "complete",
            component = "date_range_query",
            earliest_date = %earliest,
            latest_date = %latest,
            days_between,
            duration_ms = start_time.elapsed().as_millis(),
            "Date range query completed"
        );

        Ok((
            earliest.format("%B %-d, %Y").to_string(),
            latest.format("%B %-d, %Y").to_string(),
            days_between,
        ))
    } else {
        warn!(
            action = "complete",
            component = "date_range_query",
            duration_ms = start_time.elapsed().as_millis(),
            "No records found"
        );
        Ok((
            "No data available".to_string(),
            "No data available".to_string(),
            0,
        ))
    }
}
