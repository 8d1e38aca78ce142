use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::Result;

pub fn digest_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn key(path: &Path) -> String {
    path.display().to_string()
}

fn stored_digest(conn: &Connection, path: &Path) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached("SELECT digest FROM file_hashes WHERE path = ?1")?;
    let mut rows = stmt.query([key(path)])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// True if the file's content digest differs from the stored one, or the
/// file has never been seen. Pure check: callers record the digest with
/// [`record`] only once the file was fully processed, so a failed pass is
/// retried on the next run.
pub fn has_changed(conn: &Connection, path: &Path) -> Result<bool> {
    let current = digest_file(path)?;
    Ok(stored_digest(conn, path)?.as_deref() != Some(current.as_str()))
}

/// Persist the file's current digest, replacing any previous entry.
pub fn record(conn: &Connection, path: &Path) -> Result<()> {
    let digest = digest_file(path)?;
    conn.execute(
        "INSERT INTO file_hashes (path, digest, seen_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(path) DO UPDATE SET digest = excluded.digest, seen_at = excluded.seen_at",
        rusqlite::params![key(path), digest],
    )?;
    Ok(())
}

/// Remove fingerprint entries for files no longer in the tracked set.
pub fn prune(conn: &Connection, tracked: &[&Path]) -> Result<usize> {
    let keep: HashSet<String> = tracked.iter().map(|p| key(p)).collect();
    let stored: Vec<String> = conn
        .prepare("SELECT path FROM file_hashes")?
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut removed = 0;
    for path in stored {
        if !keep.contains(&path) {
            removed += conn.execute("DELETE FROM file_hashes WHERE path = ?1", [&path])?;
        }
    }
    Ok(removed)
}
