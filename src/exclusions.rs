use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;

use crate::error::{KassaError, Result};
use crate::models::TagColumn;
use crate::reconcile::{reconcile, ReconcileOutcome};

/// Contents of exclude.json: column -> lower-cased tag substrings. Rows
/// matching any of these are flagged out of scope for reporting.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    entries: BTreeMap<TagColumn, Vec<String>>,
}

/// Parse a flat column -> [tags] mapping with the same validation and
/// normalization rules as the tag dictionary. Shared by the exclusion
/// rules and the allowed-duplicates list, which have the same file shape.
pub fn load_column_map(json: &str) -> Result<BTreeMap<TagColumn, Vec<String>>> {
    let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
    let mut unknown: Vec<String> = Vec::new();
    let mut entries: BTreeMap<TagColumn, Vec<String>> = BTreeMap::new();

    for (column_name, tags) in raw {
        let Some(column) = TagColumn::parse(&column_name) else {
            if !unknown.contains(&column_name) {
                unknown.push(column_name);
            }
            continue;
        };
        let lowered = entries.entry(column).or_default();
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !lowered.contains(&tag) {
                lowered.push(tag);
            }
        }
    }

    if !unknown.is_empty() {
        unknown.sort();
        return Err(KassaError::UnknownTagColumns(unknown));
    }
    Ok(entries)
}

impl ExclusionRules {
    pub fn load(json: &str) -> Result<Self> {
        Ok(Self {
            entries: load_column_map(json)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagColumn, &[String])> {
        self.entries.iter().map(|(col, tags)| (*col, tags.as_slice()))
    }
}

fn read_rules(conn: &Connection) -> Result<HashMap<(String, i64), i64>> {
    let mut stmt = conn.prepare("SELECT tag, tag_type_id, id FROM exclusion_rules")?;
    let rows = stmt.query_map([], |row| {
        Ok(((row.get(0)?, row.get(1)?), row.get(2)?))
    })?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

/// Single-level reconciliation over (tag, column) pairs.
pub fn synchronize(conn: &Connection, rules: &ExclusionRules) -> Result<ReconcileOutcome> {
    let type_ids = crate::dictionary::read_tag_types(conn)?;

    let mut desired: HashSet<(String, i64)> = HashSet::new();
    for (column, tags) in rules.iter() {
        let type_id = type_ids
            .get(column.name())
            .copied()
            .ok_or_else(|| KassaError::Other(format!("tag type '{}' not stored", column.name())))?;
        for tag in tags {
            desired.insert((tag.clone(), type_id));
        }
    }

    let existing = read_rules(conn)?;
    reconcile(
        &existing,
        &desired,
        |(tag, type_id)| {
            conn.execute(
                "INSERT INTO exclusion_rules (tag, tag_type_id) VALUES (?1, ?2)",
                rusqlite::params![tag, type_id],
            )?;
            Ok(())
        },
        |id| {
            conn.execute("DELETE FROM exclusion_rules WHERE id = ?1", [id])?;
            Ok(())
        },
    )
}

/// Stored exclusion tag lists keyed by column, in column priority order.
pub fn aggregate(conn: &Connection) -> Result<Vec<(TagColumn, Vec<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT m.name, e.tag FROM exclusion_rules e \
         JOIN tag_types m ON e.tag_type_id = m.id \
         ORDER BY e.tag",
    )?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_column: BTreeMap<TagColumn, Vec<String>> = BTreeMap::new();
    for (type_name, tag) in rows {
        if let Some(column) = TagColumn::parse(&type_name) {
            by_column.entry(column).or_default().push(tag);
        }
    }
    Ok(by_column.into_iter().collect())
}
