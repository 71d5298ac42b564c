//! SQLite storage for training listings
//!
//! Each row keeps the raw listing exactly as imported plus its `log_price`
//! target. Normalization happens at training time so the stored data never
//! depends on the current schema version.

use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::features::normalizer::parse_number;
use crate::features::RawRecord;
use crate::{PricerError, Result};

/// Keys holding the regression target rather than a feature
const TARGET_KEYS: &[&str] = &["log_price", "price"];

/// One stored training example
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub listing_id: Option<String>,
    pub raw: RawRecord,
    pub log_price: f64,
}

impl TrainingRow {
    /// Split a raw JSON listing into features and target
    ///
    /// Accepts `log_price` directly or a positive `price` to take the log of.
    /// Either may be a number or a numeric string.
    pub fn from_json(mut raw: RawRecord) -> Option<Self> {
        let log_price = match raw.get("log_price").and_then(parse_number) {
            Some(lp) => lp,
            None => raw
                .get("price")
                .and_then(parse_number)
                .filter(|p| *p > 0.0)?
                .ln(),
        };
        if !log_price.is_finite() {
            return None;
        }

        let listing_id = match raw.remove("id") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        for key in TARGET_KEYS {
            raw.remove(*key);
        }

        Some(TrainingRow {
            listing_id,
            raw,
            log_price,
        })
    }
}

/// Outcome of a listing file import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id TEXT UNIQUE,
                raw TEXT NOT NULL,
                log_price REAL NOT NULL,
                imported_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_listings_imported ON listings(imported_at);
            "#,
        )?;
        Ok(())
    }

    // ==================== Listing Operations ====================

    /// Insert a listing, replacing any earlier import with the same listing id
    pub fn upsert_listing(&self, row: &TrainingRow) -> Result<()> {
        let raw = serde_json::to_string(&row.raw)
            .map_err(|e| PricerError::Parse(format!("Failed to encode listing: {}", e)))?;
        self.conn.execute(
            r#"
            INSERT INTO listings (listing_id, raw, log_price, imported_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(listing_id) DO UPDATE SET
                raw = excluded.raw,
                log_price = excluded.log_price,
                imported_at = excluded.imported_at
            "#,
            params![row.listing_id, raw, row.log_price, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Insert multiple listings in one transaction
    pub fn upsert_listings(&self, rows: &[TrainingRow]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for row in rows {
            self.upsert_listing(row)?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// Import listings from a JSON Lines file
    ///
    /// Blank lines are ignored. Lines that are not JSON objects or carry no
    /// usable target are skipped with a warning.
    pub fn import_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<ImportSummary> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut summary = ImportSummary::default();
        let mut rows = Vec::new();

        for (n, line) in std::io::BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<Value>(&line)
                .ok()
                .and_then(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .and_then(TrainingRow::from_json);
            match parsed {
                Some(row) => rows.push(row),
                None => {
                    log::warn!("{}:{}: skipping unusable listing", path.display(), n + 1);
                    summary.skipped += 1;
                }
            }
        }

        self.finish_import(path, &rows, summary)
    }

    /// Import listings from a CSV file with a header row
    ///
    /// Every cell is kept as a string and parsed by the normalizer at training
    /// time. Empty cells are dropped so they count as missing.
    pub fn import_csv<P: AsRef<Path>>(&self, path: P) -> Result<ImportSummary> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut summary = ImportSummary::default();
        let mut rows = Vec::new();

        for (n, record) in reader.records().enumerate() {
            let parsed = record.ok().and_then(|record| {
                let raw: RawRecord = headers
                    .iter()
                    .zip(record.iter())
                    .filter(|(_, field)| !field.trim().is_empty())
                    .map(|(name, field)| (name.trim().to_string(), Value::String(field.to_string())))
                    .collect();
                TrainingRow::from_json(raw)
            });
            match parsed {
                Some(row) => rows.push(row),
                None => {
                    // Header is line 1
                    log::warn!("{}:{}: skipping unusable listing", path.display(), n + 2);
                    summary.skipped += 1;
                }
            }
        }

        self.finish_import(path, &rows, summary)
    }

    /// Import a listing file, choosing CSV or JSON Lines by extension
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportSummary> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            self.import_csv(path)
        } else {
            self.import_jsonl(path)
        }
    }

    fn finish_import(
        &self,
        path: &Path,
        rows: &[TrainingRow],
        mut summary: ImportSummary,
    ) -> Result<ImportSummary> {
        summary.imported = self.upsert_listings(rows)?;
        log::info!(
            "Imported {} listings from {} ({} skipped)",
            summary.imported,
            path.display(),
            summary.skipped
        );
        Ok(summary)
    }

    /// Get all listings in import order
    pub fn get_all_listings(&self) -> Result<Vec<TrainingRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT listing_id, raw, log_price FROM listings ORDER BY id")?;

        let rows = stmt
            .query_map([], |row| {
                let listing_id: Option<String> = row.get(0)?;
                let raw: String = row.get(1)?;
                let log_price: f64 = row.get(2)?;
                Ok((listing_id, raw, log_price))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(listing_id, raw, log_price)| {
                let raw: RawRecord = serde_json::from_str(&raw).map_err(|e| {
                    PricerError::Parse(format!("Stored listing is not valid JSON: {}", e))
                })?;
                Ok(TrainingRow {
                    listing_id,
                    raw,
                    log_price,
                })
            })
            .collect()
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let (listing_count, mean_log_price): (i64, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), AVG(log_price) FROM listings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let last_import: Option<String> = self
            .conn
            .query_row("SELECT MAX(imported_at) FROM listings", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            listing_count: listing_count as usize,
            mean_log_price,
            last_import: last_import
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|d| d.with_timezone(&Utc)),
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub listing_count: usize,
    pub mean_log_price: Option<f64>,
    pub last_import: Option<DateTime<Utc>>,
}
