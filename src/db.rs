use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::TYPE_ORDER;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    execution_date TEXT,
    title TEXT NOT NULL,
    vendor TEXT,
    account TEXT,
    amount REAL NOT NULL,
    balance REAL NOT NULL,
    category TEXT,
    sub_category TEXT,
    UNIQUE (date, title, amount, balance)
);

CREATE TABLE IF NOT EXISTS tag_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS sub_categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category_id INTEGER NOT NULL,
    UNIQUE (name, category_id),
    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    value TEXT NOT NULL,
    sub_category_id INTEGER NOT NULL,
    tag_type_id INTEGER NOT NULL,
    UNIQUE (value, sub_category_id, tag_type_id),
    FOREIGN KEY (sub_category_id) REFERENCES sub_categories(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_type_id) REFERENCES tag_types(id)
);

CREATE TABLE IF NOT EXISTS exclusion_rules (
    id INTEGER PRIMARY KEY,
    tag TEXT NOT NULL,
    tag_type_id INTEGER NOT NULL,
    UNIQUE (tag, tag_type_id),
    FOREIGN KEY (tag_type_id) REFERENCES tag_types(id)
);

CREATE TABLE IF NOT EXISTS file_hashes (
    path TEXT PRIMARY KEY,
    digest TEXT NOT NULL,
    seen_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    // Tag types are the fixed set of matchable columns, seeded once.
    for column in TYPE_ORDER {
        conn.execute(
            "INSERT OR IGNORE INTO tag_types (name) VALUES (?1)",
            [column.name()],
        )?;
    }
    Ok(())
}
