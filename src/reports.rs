use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::EXCLUDE_CATEGORY;

pub const UNCATEGORISED: &str = "Uncategorised";

// ---------------------------------------------------------------------------
// Year/month × category pivot
// ---------------------------------------------------------------------------

pub struct SummaryPivot {
    /// "2024" rows, or "2024-01" with monthly resolution.
    pub periods: Vec<String>,
    pub categories: Vec<String>,
    /// cells[row][col], indexed like periods × categories.
    pub cells: Vec<Vec<Option<f64>>>,
    pub totals: Vec<Option<f64>>,
}

/// Sum of amounts per period and category, excluded rows omitted,
/// unassigned rows shown under a synthetic category.
pub fn summary(conn: &Connection, by_month: bool) -> Result<SummaryPivot> {
    let period_len = if by_month { 7 } else { 4 };
    let sql = format!(
        "SELECT substr(date, 1, {period_len}) AS period, \
                COALESCE(category, '{UNCATEGORISED}') AS cat, \
                SUM(amount) \
         FROM transactions \
         WHERE category IS NULL OR category <> '{EXCLUDE_CATEGORY}' \
         GROUP BY period, cat"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(String, String, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut grid: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut categories: Vec<String> = Vec::new();
    for (period, category, total) in rows {
        if !categories.contains(&category) {
            categories.push(category.clone());
        }
        grid.entry(period).or_default().insert(category, total);
    }
    categories.sort();

    let periods: Vec<String> = grid.keys().cloned().collect();
    let cells: Vec<Vec<Option<f64>>> = periods
        .iter()
        .map(|p| {
            categories
                .iter()
                .map(|c| grid[p].get(c).copied())
                .collect()
        })
        .collect();
    let totals: Vec<Option<f64>> = (0..categories.len())
        .map(|col| {
            let vals: Vec<f64> = cells.iter().filter_map(|row| row[col]).collect();
            if vals.is_empty() {
                None
            } else {
                Some(vals.iter().sum())
            }
        })
        .collect();

    Ok(SummaryPivot {
        periods,
        categories,
        cells,
        totals,
    })
}

// ---------------------------------------------------------------------------
// Sub-category register
// ---------------------------------------------------------------------------

pub struct RegisterRow {
    pub date: String,
    pub title: String,
    pub vendor: Option<String>,
    pub amount: f64,
}

pub fn sub_category_register(conn: &Connection, name: &str) -> Result<Vec<RegisterRow>> {
    let mut stmt = conn.prepare(
        "SELECT date, title, vendor, amount FROM transactions \
         WHERE sub_category = ?1 ORDER BY date, id",
    )?;
    let rows = stmt.query_map([name], |row| {
        Ok(RegisterRow {
            date: row.get(0)?,
            title: row.get(1)?,
            vendor: row.get(2)?,
            amount: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Store counts
// ---------------------------------------------------------------------------

pub struct StoreCounts {
    pub transactions: i64,
    pub uncategorised: i64,
    pub excluded: i64,
    pub categories: i64,
    pub tags: i64,
    pub exclusion_rules: i64,
    pub fingerprints: i64,
}

pub fn store_counts(conn: &Connection) -> Result<StoreCounts> {
    let count = |sql: &str| -> Result<i64> {
        Ok(conn.query_row(sql, [], |r| r.get(0))?)
    };
    Ok(StoreCounts {
        transactions: count("SELECT count(*) FROM transactions")?,
        uncategorised: count("SELECT count(*) FROM transactions WHERE category IS NULL")?,
        excluded: count(&format!(
            "SELECT count(*) FROM transactions WHERE category = '{EXCLUDE_CATEGORY}'"
        ))?,
        categories: count("SELECT count(*) FROM categories")?,
        tags: count("SELECT count(*) FROM tags")?,
        exclusion_rules: count("SELECT count(*) FROM exclusion_rules")?,
        fingerprints: count("SELECT count(*) FROM file_hashes")?,
    })
}
