use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::{KassaError, Result};
use crate::fingerprint;
use crate::models::{cents, DedupKey, ParsedRow};

// ---------------------------------------------------------------------------
// Locale parsing helpers
// ---------------------------------------------------------------------------

const DATE_FORMATS: [&str; 3] = ["%d-%m-%Y", "%d.%m.%Y", "%d/%m/%Y"];

/// Parse a day-first date into ISO form.
pub fn parse_date_dayfirst(raw: &str) -> Option<String> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| chrono::NaiveDate::parse_from_str(raw, f).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Parse a decimal-comma amount. When a comma is present, dots and spaces
/// are grouping separators: "1.234,56" and "1 234,56" both parse to 1234.56.
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s
    };
    normalized.parse().ok()
}

fn optional(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Parse one export file into rows. The layout is fixed: date,
/// execution date, title, vendor, account, amount, balance. Any further
/// columns are ignored. A malformed date or amount fails the whole file.
pub fn parse_file(path: &Path, delimiter: u8) -> Result<Vec<ParsedRow>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let name = path.display().to_string();
    let bad = |line: usize, message: String| KassaError::BadRecord {
        file: name.clone(),
        line,
        message,
    };

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() < 7 {
            return Err(bad(line, format!("expected 7 columns, got {}", record.len())));
        }

        let date = parse_date_dayfirst(&record[0])
            .ok_or_else(|| bad(line, format!("bad date '{}'", &record[0])))?;
        let execution_date = match optional(&record[1]) {
            Some(raw) => Some(
                parse_date_dayfirst(&raw)
                    .ok_or_else(|| bad(line, format!("bad execution date '{raw}'")))?,
            ),
            None => None,
        };
        let amount = parse_decimal_comma(&record[5])
            .ok_or_else(|| bad(line, format!("bad amount '{}'", &record[5])))?;
        let balance = parse_decimal_comma(&record[6])
            .ok_or_else(|| bad(line, format!("bad balance '{}'", &record[6])))?;

        rows.push(ParsedRow {
            date,
            execution_date,
            title: record[2].trim().to_string(),
            vendor: optional(&record[3]),
            account: optional(&record[4]),
            amount,
            balance,
        });
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Merge into the store
// ---------------------------------------------------------------------------

pub struct IngestOutcome {
    pub inserted: usize,
    /// Files whose fingerprint was unchanged and which were not re-read.
    pub unchanged_files: usize,
    /// Files that failed to parse, with the reason. Their fingerprints are
    /// left untouched so the next run retries them.
    pub failed: Vec<(PathBuf, String)>,
}

fn stored_keys(conn: &Connection) -> Result<HashSet<DedupKey>> {
    let mut stmt = conn.prepare("SELECT date, title, amount, balance FROM transactions")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;
    let mut keys = HashSet::new();
    for row in rows {
        let (date, title, amount, balance) = row?;
        keys.insert((date, title, cents(amount), cents(balance)));
    }
    Ok(keys)
}

/// Merge CSV exports into the store. Only files whose content changed since
/// the last run are parsed (unless `force`). Rows already stored under the
/// (date, title, amount, balance) key are dropped silently; inserts and the
/// fingerprints of successfully parsed files commit atomically.
pub fn ingest(
    conn: &mut Connection,
    files: &[PathBuf],
    delimiter: u8,
    force: bool,
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome {
        inserted: 0,
        unchanged_files: 0,
        failed: Vec::new(),
    };

    let mut batch: Vec<ParsedRow> = Vec::new();
    let mut parsed_files: Vec<&PathBuf> = Vec::new();
    for file in files {
        if !force && !fingerprint::has_changed(conn, file)? {
            outcome.unchanged_files += 1;
            continue;
        }
        match parse_file(file, delimiter) {
            Ok(rows) => {
                batch.extend(rows);
                parsed_files.push(file);
            }
            Err(err) => outcome.failed.push((file.clone(), err.to_string())),
        }
    }

    let mut seen = stored_keys(conn)?;
    let tx = conn.transaction()?;
    for row in &batch {
        // `seen` also absorbs intra-batch duplicates.
        if !seen.insert(row.dedup_key()) {
            continue;
        }
        tx.execute(
            "INSERT INTO transactions (date, execution_date, title, vendor, account, amount, balance) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                row.date,
                row.execution_date,
                row.title,
                row.vendor,
                row.account,
                row.amount,
                row.balance,
            ],
        )?;
        outcome.inserted += 1;
    }
    for file in parsed_files {
        fingerprint::record(&tx, file)?;
    }
    tx.commit()?;

    Ok(outcome)
}
