use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::dictionary::TagGroup;
use crate::error::Result;
use crate::exclusions::load_column_map;
use crate::models::{TagColumn, EXCLUDE_CATEGORY, TYPE_ORDER};

/// Tag/column pairs for which multiple matches on one row are expected.
/// Matching rows are dropped from the ambiguity diagnostic; the assignment
/// itself is unaffected.
#[derive(Debug, Clone, Default)]
pub struct AllowedDuplicates {
    entries: BTreeMap<TagColumn, Vec<String>>,
}

impl AllowedDuplicates {
    pub fn load(json: &str) -> Result<Self> {
        Ok(Self {
            entries: load_column_map(json)?,
        })
    }

    fn contains(&self, column: TagColumn, tag: &str) -> bool {
        self.entries
            .get(&column)
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }
}

struct WorkRow {
    id: i64,
    // Lower-cased matchable column values, indexed by type order.
    values: [Option<String>; TYPE_ORDER.len()],
}

fn load_work_rows(conn: &Connection, include_assigned: bool) -> Result<Vec<WorkRow>> {
    // Excluded rows are out of the working set either way.
    let filter = if include_assigned {
        format!("category IS NULL OR category <> '{EXCLUDE_CATEGORY}'")
    } else {
        "category IS NULL".to_string()
    };
    let sql = format!("SELECT id, title, vendor, account FROM transactions WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut work = Vec::new();
    for row in rows {
        let (id, title, vendor, account) = row?;
        work.push(WorkRow {
            id,
            values: [
                Some(title.to_lowercase()),
                vendor.map(|v| v.to_lowercase()),
                account.map(|a| a.to_lowercase()),
            ],
        });
    }
    Ok(work)
}

fn update_by_ids(
    conn: &Connection,
    category: Option<&str>,
    sub_category: Option<&str>,
    ids: &[i64],
) -> Result<usize> {
    let id_list = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "UPDATE transactions SET category = ?1, sub_category = ?2 WHERE id IN ({id_list})"
    );
    Ok(conn.execute(&sql, rusqlite::params![category, sub_category])?)
}

pub struct ClassifyOutcome {
    pub updated: usize,
    /// Rows that matched more than one tag and are not covered by the
    /// allowed-duplicates list. A diagnostic, not an error.
    pub ambiguous: usize,
}

/// Derive category/sub-category assignments by substring matching. Groups
/// are applied in aggregate order and each match overwrites the previous
/// tentative assignment, so the last matching group wins. Rows without any
/// match keep a NULL category. With `overwrite`, previously assigned rows
/// are re-derived too; excluded rows are never touched.
pub fn classify(
    conn: &mut Connection,
    groups: &[TagGroup],
    allowed: &AllowedDuplicates,
    overwrite: bool,
) -> Result<ClassifyOutcome> {
    let rows = load_work_rows(conn, overwrite)?;

    let mut assignments: Vec<Option<usize>> = vec![None; rows.len()];
    let mut hits: Vec<Vec<(TagColumn, usize, usize)>> = vec![Vec::new(); rows.len()];
    for (group_idx, group) in groups.iter().enumerate() {
        let value_idx = group.column.order_index();
        for (tag_idx, tag) in group.tags.iter().enumerate() {
            for (row_idx, row) in rows.iter().enumerate() {
                let Some(value) = &row.values[value_idx] else {
                    continue;
                };
                if value.contains(tag.as_str()) {
                    assignments[row_idx] = Some(group_idx);
                    hits[row_idx].push((group.column, group_idx, tag_idx));
                }
            }
        }
    }

    let mut ambiguous = 0;
    for row_hits in &hits {
        if row_hits.len() <= 1 {
            continue;
        }
        let allowed_hit = row_hits.iter().any(|(column, group_idx, tag_idx)| {
            allowed.contains(*column, &groups[*group_idx].tags[*tag_idx])
        });
        if !allowed_hit {
            ambiguous += 1;
        }
    }

    // Batch the writes per distinct assignment.
    let mut by_assignment: BTreeMap<(String, String), Vec<i64>> = BTreeMap::new();
    for (row_idx, assignment) in assignments.iter().enumerate() {
        if let Some(group_idx) = assignment {
            let group = &groups[*group_idx];
            by_assignment
                .entry((group.category.clone(), group.sub_category.clone()))
                .or_default()
                .push(rows[row_idx].id);
        }
    }

    let mut updated = 0;
    let tx = conn.transaction()?;
    for ((category, sub_category), ids) in &by_assignment {
        updated += update_by_ids(&tx, Some(category), Some(sub_category), ids)?;
    }
    tx.commit()?;

    Ok(ClassifyOutcome { updated, ambiguous })
}

/// Flag rows matching any exclusion tag as out of scope. Runs over every
/// row not already excluded, regardless of prior assignment, and wins over
/// classification: classify never revisits excluded rows.
pub fn exclude(conn: &mut Connection, rules: &[(TagColumn, Vec<String>)]) -> Result<usize> {
    let rows = load_work_rows(conn, true)?;

    let mut flagged: Vec<i64> = Vec::new();
    for row in &rows {
        let hit = rules.iter().any(|(column, tags)| {
            row.values[column.order_index()]
                .as_deref()
                .is_some_and(|value| tags.iter().any(|tag| value.contains(tag.as_str())))
        });
        if hit {
            flagged.push(row.id);
        }
    }

    if flagged.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let updated = update_by_ids(&tx, Some(EXCLUDE_CATEGORY), None, &flagged)?;
    tx.commit()?;
    Ok(updated)
}
