//! Road table storage in `DuckDB`.
//!
//! `roads.csv` is validated and loaded into a `roads` table, replacing any
//! previous contents. A `_meta` table records when the table was last
//! loaded and from which file.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Number of columns in `roads.csv`.
pub const ROAD_COLUMNS: usize = 11;

/// One validated row of `roads.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRecord {
    /// Road id.
    pub roadid: i64,
    /// `GeoJSON` geometry text, `None` when blank.
    pub geom_geojson: Option<String>,
    /// Road name.
    pub name: String,
    /// Resolved classification tag or `Mixed`.
    pub street_classification: String,
    /// Whether the road belongs to the reported classes.
    pub relevant_road: bool,
    /// KSI total.
    pub ksi: i64,
    /// Injured total.
    pub injured: i64,
    /// Distinct crash count.
    pub crashes: i64,
    /// KSI per mile.
    pub ksi_mile: Option<f64>,
    /// Injured per mile.
    pub injured_mile: Option<f64>,
    /// Crashes per mile.
    pub crashes_mile: Option<f64>,
}

/// Opens (or creates) the roads `DuckDB` and ensures the metadata table
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_meta(&conn)?;
    Ok(conn)
}

fn create_meta(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn recreate_roads_table(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS roads;
         CREATE TABLE roads (
            roadid INTEGER PRIMARY KEY,
            geom_geojson TEXT,
            name TEXT,
            street_classification TEXT,
            relevant_road BOOLEAN,
            ksi BIGINT,
            injured BIGINT,
            crashes BIGINT,
            ksi_mile DOUBLE,
            injured_mile DOUBLE,
            crashes_mile DOUBLE
         );",
    )?;
    Ok(())
}

/// Reads and validates `roads.csv`.
///
/// # Errors
///
/// Returns [`DbError::Format`] naming the offending line if a row does not
/// have exactly [`ROAD_COLUMNS`] columns or a field cannot be parsed, and
/// [`DbError::Csv`] / [`DbError::Io`] if the file cannot be read.
pub fn read_roads_csv(path: &Path) -> Result<Vec<RoadRecord>, DbError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?;
    if headers.len() != ROAD_COLUMNS {
        return Err(DbError::Format {
            message: format!(
                "line 1: expected {ROAD_COLUMNS} header columns, found {}",
                headers.len()
            ),
        });
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        if record.len() != ROAD_COLUMNS {
            return Err(DbError::Format {
                message: format!(
                    "line {line}: expected {ROAD_COLUMNS} columns, found {}",
                    record.len()
                ),
            });
        }
        records.push(parse_record(&record, line)?);
    }

    Ok(records)
}

fn parse_record(record: &csv::StringRecord, line: u64) -> Result<RoadRecord, DbError> {
    let field = |i: usize| record.get(i).unwrap_or_default().trim();
    let invalid = |column: &str, value: &str| DbError::Format {
        message: format!("line {line}: invalid {column} {value:?}"),
    };
    let int = |i: usize, column: &str| {
        field(i)
            .parse::<i64>()
            .map_err(|_| invalid(column, field(i)))
    };
    let rate = |i: usize, column: &str| match field(i) {
        "" => Ok(None),
        v => v.parse::<f64>().map(Some).map_err(|_| invalid(column, v)),
    };

    let relevant_road = match field(4).to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => return Err(invalid("relevant_road", field(4))),
    };

    Ok(RoadRecord {
        roadid: int(0, "roadid")?,
        geom_geojson: Some(field(1).to_string()).filter(|g| !g.is_empty()),
        name: field(2).to_string(),
        street_classification: field(3).to_string(),
        relevant_road,
        ksi: int(5, "ksi")?,
        injured: int(6, "injured")?,
        crashes: int(7, "crashes")?,
        ksi_mile: rate(8, "ksi/mile")?,
        injured_mile: rate(9, "injured/mile")?,
        crashes_mile: rate(10, "crashes/mile")?,
    })
}

/// Replaces the `roads` table with the contents of `csv_path`.
///
/// The file is fully validated before the table is touched. The drop,
/// recreate and inserts run in one transaction.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if validation or any database operation fails.
pub fn load_roads_csv(conn: &Connection, csv_path: &Path) -> Result<u64, DbError> {
    let records = read_roads_csv(csv_path)?;
    log::info!(
        "Loading {} roads from {}",
        records.len(),
        csv_path.display()
    );

    conn.execute_batch("BEGIN TRANSACTION")?;
    let loaded = insert_roads(conn, &records).and_then(|count| {
        set_meta(conn, "roads_source", &csv_path.display().to_string())?;
        set_meta(conn, "roads_loaded_at", &chrono::Utc::now().to_rfc3339())?;
        conn.execute_batch("COMMIT")?;
        Ok(count)
    });

    match loaded {
        Ok(count) => {
            log::info!("Loaded {count} roads");
            Ok(count)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::error!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

fn insert_roads(conn: &Connection, records: &[RoadRecord]) -> Result<u64, DbError> {
    recreate_roads_table(conn)?;

    let mut stmt = conn.prepare(
        "INSERT INTO roads (
            roadid, geom_geojson, name, street_classification, relevant_road,
            ksi, injured, crashes, ksi_mile, injured_mile, crashes_mile
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    let mut inserted = 0u64;
    for r in records {
        stmt.execute(duckdb::params![
            r.roadid,
            r.geom_geojson.as_deref(),
            r.name,
            r.street_classification,
            r.relevant_road,
            r.ksi,
            r.injured,
            r.crashes,
            r.ksi_mile,
            r.injured_mile,
            r.crashes_mile,
        ])?;
        inserted += 1;
    }

    Ok(inserted)
}

/// Returns the number of rows in the `roads` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails (including when the table has
/// never been loaded).
pub fn road_count(conn: &Connection) -> Result<u64, DbError> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM roads")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

/// Gets a metadata value from the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, DbError> {
    let mut stmt = conn.prepare("SELECT value FROM _meta WHERE key = ?")?;
    match stmt.query_row([key], |row| row.get(0)) {
        Ok(v) => Ok(Some(v)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Sets a metadata value in the `_meta` table.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?, ?)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        duckdb::params![key, value],
    )?;
    Ok(())
}
