use std::path::Path;

use rusqlite::Connection;

use crate::error::{BursarError, Result};
use crate::models::Account;

/// Storage format for transaction timestamps.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    account_type TEXT NOT NULL,
    column_mapping TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS file_uploads (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    transaction_count INTEGER DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'processing',
    errors TEXT,
    checksum TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    file_upload_id INTEGER,
    transaction_date TEXT,
    posted_date TEXT,
    description TEXT,
    description_2 TEXT,
    category TEXT,
    subcategory TEXT,
    amount TEXT,
    raw_data TEXT NOT NULL,
    location_classification_id INTEGER,
    location_subclassification_id INTEGER,
    time_classification_id INTEGER,
    person_classification_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (file_upload_id) REFERENCES file_uploads(id),
    FOREIGN KEY (location_classification_id) REFERENCES location_classifications(id),
    FOREIGN KEY (location_subclassification_id) REFERENCES location_subclassifications(id),
    FOREIGN KEY (time_classification_id) REFERENCES time_classifications(id),
    FOREIGN KEY (person_classification_id) REFERENCES person_classifications(id)
);

CREATE TABLE IF NOT EXISTS location_classifications (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS location_subclassifications (
    id INTEGER PRIMARY KEY,
    location_classification_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    UNIQUE (location_classification_id, name),
    FOREIGN KEY (location_classification_id)
        REFERENCES location_classifications(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS time_classifications (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS person_classifications (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS statements (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    period_start TEXT,
    period_end TEXT NOT NULL,
    opening_balance TEXT,
    closing_balance TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn get_account(conn: &Connection, name: &str) -> Result<Account> {
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, column_mapping FROM accounts WHERE name = ?1",
    )?;
    stmt.query_row([name], |row| {
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
            account_type: row.get(2)?,
            column_mapping: row.get(3)?,
        })
    })
    .map_err(|_| BursarError::UnknownAccount(name.to_string()))
}
