use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;

use crate::error::{KassaError, Result};
use crate::models::TagColumn;
use crate::reconcile::{reconcile, ReconcileOutcome};

/// Normalized contents of categories.json:
/// category -> sub-category -> column -> lower-cased tag substrings.
#[derive(Debug, Clone, Default)]
pub struct TagDictionary {
    entries: BTreeMap<String, BTreeMap<String, BTreeMap<TagColumn, Vec<String>>>>,
}

type RawDictionary = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

impl TagDictionary {
    /// Parse and validate the nested mapping. Column keys are matched
    /// case-insensitively against the known transaction columns; every
    /// unknown key is collected so the error names all offenders at once.
    pub fn load(json: &str) -> Result<Self> {
        let raw: RawDictionary = serde_json::from_str(json)?;
        let mut unknown: Vec<String> = Vec::new();
        let mut entries: BTreeMap<String, BTreeMap<String, BTreeMap<TagColumn, Vec<String>>>> =
            BTreeMap::new();

        for (category, subs) in raw {
            let cat_entry = entries.entry(category).or_default();
            for (sub_category, columns) in subs {
                let sub_entry = cat_entry.entry(sub_category).or_default();
                for (column_name, tags) in columns {
                    let Some(column) = TagColumn::parse(&column_name) else {
                        if !unknown.contains(&column_name) {
                            unknown.push(column_name);
                        }
                        continue;
                    };
                    let lowered = sub_entry.entry(column).or_default();
                    for tag in tags {
                        let tag = tag.trim().to_lowercase();
                        if !tag.is_empty() && !lowered.contains(&tag) {
                            lowered.push(tag);
                        }
                    }
                }
            }
        }

        if !unknown.is_empty() {
            unknown.sort();
            return Err(KassaError::UnknownTagColumns(unknown));
        }
        Ok(Self { entries })
    }

    fn category_names(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Per-level effect counts of one dictionary synchronization.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionarySyncOutcome {
    pub categories: ReconcileOutcome,
    pub sub_categories: ReconcileOutcome,
    pub tags: ReconcileOutcome,
}

impl DictionarySyncOutcome {
    pub fn changed(&self) -> bool {
        self.categories.changed() || self.sub_categories.changed() || self.tags.changed()
    }

    pub fn total(&self) -> ReconcileOutcome {
        self.categories + self.sub_categories + self.tags
    }
}

fn read_categories(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT name, id FROM categories")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

fn read_sub_categories(conn: &Connection) -> Result<HashMap<(String, i64), i64>> {
    let mut stmt = conn.prepare("SELECT name, category_id, id FROM sub_categories")?;
    let rows = stmt.query_map([], |row| {
        Ok(((row.get(0)?, row.get(1)?), row.get(2)?))
    })?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

fn read_tags(conn: &Connection) -> Result<HashMap<(String, i64, i64), i64>> {
    let mut stmt = conn.prepare("SELECT value, sub_category_id, tag_type_id, id FROM tags")?;
    let rows = stmt.query_map([], |row| {
        Ok(((row.get(0)?, row.get(1)?, row.get(2)?), row.get(3)?))
    })?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

pub fn read_tag_types(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT name, id FROM tag_types")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
}

fn lookup(ids: &HashMap<String, i64>, name: &str) -> Result<i64> {
    ids.get(name)
        .copied()
        .ok_or_else(|| KassaError::Other(format!("'{name}' not stored")))
}

/// Bring the stored category/sub-category/tag hierarchy in line with the
/// dictionary. Each level reconciles against parent ids re-read after the
/// parent level finished, so inserts land under current parents and
/// deletes cascade downward.
pub fn synchronize(conn: &Connection, dict: &TagDictionary) -> Result<DictionarySyncOutcome> {
    let mut outcome = DictionarySyncOutcome::default();

    let existing = read_categories(conn)?;
    outcome.categories = reconcile(
        &existing,
        &dict.category_names(),
        |name| {
            conn.execute("INSERT INTO categories (name) VALUES (?1)", [name])?;
            Ok(())
        },
        |id| {
            conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
            Ok(())
        },
    )?;

    let category_ids = read_categories(conn)?;
    let mut desired_subs: HashSet<(String, i64)> = HashSet::new();
    for (category, subs) in &dict.entries {
        let cat_id = lookup(&category_ids, category)?;
        for sub in subs.keys() {
            desired_subs.insert((sub.clone(), cat_id));
        }
    }
    let existing = read_sub_categories(conn)?;
    outcome.sub_categories = reconcile(
        &existing,
        &desired_subs,
        |(name, cat_id)| {
            conn.execute(
                "INSERT INTO sub_categories (name, category_id) VALUES (?1, ?2)",
                rusqlite::params![name, cat_id],
            )?;
            Ok(())
        },
        |id| {
            conn.execute("DELETE FROM sub_categories WHERE id = ?1", [id])?;
            Ok(())
        },
    )?;

    let sub_ids = read_sub_categories(conn)?;
    let type_ids = read_tag_types(conn)?;
    let mut desired_tags: HashSet<(String, i64, i64)> = HashSet::new();
    for (category, subs) in &dict.entries {
        let cat_id = lookup(&category_ids, category)?;
        for (sub, columns) in subs {
            let sub_id = sub_ids
                .get(&(sub.clone(), cat_id))
                .copied()
                .ok_or_else(|| KassaError::Other(format!("sub-category '{sub}' not stored")))?;
            for (column, tags) in columns {
                let type_id = lookup(&type_ids, column.name())?;
                for tag in tags {
                    desired_tags.insert((tag.clone(), sub_id, type_id));
                }
            }
        }
    }
    let existing = read_tags(conn)?;
    outcome.tags = reconcile(
        &existing,
        &desired_tags,
        |(value, sub_id, type_id)| {
            conn.execute(
                "INSERT INTO tags (value, sub_category_id, tag_type_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![value, sub_id, type_id],
            )?;
            Ok(())
        },
        |id| {
            conn.execute("DELETE FROM tags WHERE id = ?1", [id])?;
            Ok(())
        },
    )?;

    Ok(outcome)
}

/// One classification unit: the tags of a (category, sub-category, column)
/// group, matched together against that column.
#[derive(Debug, Clone)]
pub struct TagGroup {
    pub category: String,
    pub sub_category: String,
    pub column: TagColumn,
    pub tags: Vec<String>,
}

/// Stored tag lists grouped by (category, sub-category, column), ordered by
/// the fixed column priority first. Group order is the classification
/// application order, so it decides which assignment wins on multi-match.
pub fn aggregate(conn: &Connection) -> Result<Vec<TagGroup>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, s.name, m.name, t.value \
         FROM tags t \
         JOIN sub_categories s ON t.sub_category_id = s.id \
         JOIN categories c ON s.category_id = c.id \
         JOIN tag_types m ON t.tag_type_id = m.id \
         ORDER BY c.name, s.name, t.value",
    )?;
    let rows: Vec<(String, String, String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut groups: BTreeMap<(usize, String, String), TagGroup> = BTreeMap::new();
    for (category, sub_category, type_name, tag) in rows {
        let Some(column) = TagColumn::parse(&type_name) else {
            continue;
        };
        let group_key = (column.order_index(), category.clone(), sub_category.clone());
        groups
            .entry(group_key)
            .or_insert_with(|| TagGroup {
                category,
                sub_category,
                column,
                tags: Vec::new(),
            })
            .tags
            .push(tag);
    }
    Ok(groups.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    const FOOD: &str = r#"{"Food": {"Groceries": {"Title": ["Lidl", "ALDI"]}}}"#;

    #[test]
    fn test_load_normalizes_tags_and_columns() {
        let dict = TagDictionary::load(r#"{"Food": {"Groceries": {"tItLe": ["  LIDL "]}}}"#).unwrap();
        let columns = &dict.entries["Food"]["Groceries"];
        assert_eq!(columns[&TagColumn::Title], vec!["lidl"]);
    }

    #[test]
    fn test_load_rejects_unknown_columns() {
        let err = TagDictionary::load(
            r#"{"Food": {"Groceries": {"Title": ["lidl"], "Iban": ["x"], "Comment": ["y"]}}}"#,
        )
        .unwrap_err();
        match err {
            KassaError::UnknownTagColumns(cols) => {
                assert_eq!(cols, vec!["Comment".to_string(), "Iban".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_synchronize_populates_all_levels() {
        let (_dir, conn) = test_db();
        let dict = TagDictionary::load(FOOD).unwrap();
        let outcome = synchronize(&conn, &dict).unwrap();
        assert_eq!(outcome.categories.inserted, 1);
        assert_eq!(outcome.sub_categories.inserted, 1);
        assert_eq!(outcome.tags.inserted, 2);

        let tags: i64 = conn.query_row("SELECT count(*) FROM tags", [], |r| r.get(0)).unwrap();
        assert_eq!(tags, 2);
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let (_dir, conn) = test_db();
        let dict = TagDictionary::load(FOOD).unwrap();
        synchronize(&conn, &dict).unwrap();
        let second = synchronize(&conn, &dict).unwrap();
        assert!(!second.changed());
    }

    #[test]
    fn test_synchronize_keeps_surrogate_ids_for_unchanged_entries() {
        let (_dir, conn) = test_db();
        let dict = TagDictionary::load(FOOD).unwrap();
        synchronize(&conn, &dict).unwrap();
        let lidl_id: i64 = conn
            .query_row("SELECT id FROM tags WHERE value = 'lidl'", [], |r| r.get(0))
            .unwrap();

        // aldi removed, netto added; lidl must keep its row.
        let updated = TagDictionary::load(
            r#"{"Food": {"Groceries": {"Title": ["lidl", "netto"]}}}"#,
        )
        .unwrap();
        let outcome = synchronize(&conn, &updated).unwrap();
        assert_eq!(outcome.tags.inserted, 1);
        assert_eq!(outcome.tags.removed, 1);
        assert_eq!(outcome.categories.inserted + outcome.categories.removed, 0);

        let lidl_id_after: i64 = conn
            .query_row("SELECT id FROM tags WHERE value = 'lidl'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lidl_id, lidl_id_after);
    }

    #[test]
    fn test_removing_category_cascades() {
        let (_dir, conn) = test_db();
        let dict = TagDictionary::load(
            r#"{
                "Food": {"Groceries": {"Title": ["lidl"]}},
                "Media": {"Streaming": {"Title": ["netflix"]}}
            }"#,
        )
        .unwrap();
        synchronize(&conn, &dict).unwrap();

        let trimmed = TagDictionary::load(FOOD).unwrap();
        let outcome = synchronize(&conn, &trimmed).unwrap();
        assert_eq!(outcome.categories.removed, 1);

        let tags: Vec<String> = conn
            .prepare("SELECT value FROM tags ORDER BY value")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(tags, vec!["aldi", "lidl"]);
    }

    #[test]
    fn test_aggregate_orders_by_column_priority() {
        let (_dir, conn) = test_db();
        let dict = TagDictionary::load(
            r#"{
                "Transfers": {"Internal": {"Account": ["savings"]}},
                "Food": {"Groceries": {"Title": ["lidl"], "Vendor": ["rewe"]}}
            }"#,
        )
        .unwrap();
        synchronize(&conn, &dict).unwrap();

        let groups = aggregate(&conn).unwrap();
        let columns: Vec<TagColumn> = groups.iter().map(|g| g.column).collect();
        assert_eq!(
            columns,
            vec![TagColumn::Title, TagColumn::Vendor, TagColumn::Account]
        );
        assert_eq!(groups[0].category, "Food");
        assert_eq!(groups[0].tags, vec!["lidl"]);
        assert_eq!(groups[2].sub_category, "Internal");
    }
}
