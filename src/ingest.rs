use std::path::Path;

use csv::StringRecord;
use rusqlite::Connection;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{BursarError, Result};
use crate::mapping::{apply_to_transaction, ColumnMapping};
use crate::models::{Account, BatchStatus};

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One CSV line as a header→value JSON object. This is the immutable raw
/// form every later mapping pass reads from.
fn record_to_raw(headers: &StringRecord, record: &StringRecord) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(i) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
    }
    map
}

fn is_duplicate_file(conn: &Connection, account_id: i64, checksum: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM file_uploads WHERE account_id = ?1 AND checksum = ?2")?;
    Ok(stmt.exists(rusqlite::params![account_id, checksum])?)
}

fn finalize_batch(conn: &Connection, batch_id: i64, errors: &[String]) -> Result<BatchStatus> {
    let status = if errors.is_empty() {
        BatchStatus::Completed
    } else {
        BatchStatus::Failed
    };
    let log = if errors.is_empty() { None } else { Some(errors.join("\n")) };
    conn.execute(
        "UPDATE file_uploads SET status = ?1, errors = ?2 WHERE id = ?3",
        rusqlite::params![status.as_str(), log, batch_id],
    )?;
    Ok(status)
}

/// Run the schema mapper over a set of (id, raw_data) rows, collecting
/// per-transaction failures instead of aborting the pass.
fn map_rows(
    conn: &Connection,
    mapping: &ColumnMapping,
    rows: &[(i64, String)],
    errors: &mut Vec<String>,
) {
    for (tx_id, raw_json) in rows {
        let result = serde_json::from_str::<Map<String, Value>>(raw_json)
            .map_err(|e| BursarError::Other(format!("bad raw_data: {e}")))
            .and_then(|raw| apply_to_transaction(conn, *tx_id, mapping, &raw));
        if let Err(e) = result {
            errors.push(format!("transaction {tx_id}: {e}"));
        }
    }
}

// ---------------------------------------------------------------------------
// File ingestion
// ---------------------------------------------------------------------------

pub struct IngestResult {
    pub batch_id: i64,
    pub rows: usize,
    pub status: BatchStatus,
    pub duplicate_file: bool,
}

/// Ingest one CSV export into an account: store every line as an immutable
/// raw row, then run the account's column mapping inline if one is
/// configured. Without a mapping the batch rests at `pending` until
/// `set-mapping` triggers a re-process pass.
pub fn ingest_file(conn: &Connection, file_path: &Path, account: &Account) -> Result<IngestResult> {
    let mapping = account
        .column_mapping
        .as_deref()
        .map(ColumnMapping::from_json)
        .transpose()?;

    let data = std::fs::read(file_path)?;
    let checksum = compute_checksum(&data);
    if is_duplicate_file(conn, account.id, &checksum)? {
        return Ok(IngestResult {
            batch_id: 0,
            rows: 0,
            status: BatchStatus::Pending,
            duplicate_file: true,
        });
    }

    // Exports from some banks lead with a UTF-8 BOM; strip it before the
    // header row is read.
    let content = String::from_utf8_lossy(&data);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = rdr.headers()?.clone();

    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");
    conn.execute(
        "INSERT INTO file_uploads (account_id, filename, status, checksum) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![account.id, filename, BatchStatus::Processing.as_str(), checksum],
    )?;
    let batch_id = conn.last_insert_rowid();

    let mut inserted: Vec<(i64, String)> = Vec::new();
    for result in rdr.records() {
        let Ok(record) = result else { continue };
        let raw = record_to_raw(&headers, &record);
        let raw_json = serde_json::to_string(&raw)
            .map_err(|e| BursarError::Other(format!("raw row encode: {e}")))?;
        conn.execute(
            "INSERT INTO transactions (account_id, file_upload_id, raw_data) VALUES (?1, ?2, ?3)",
            rusqlite::params![account.id, batch_id, raw_json],
        )?;
        inserted.push((conn.last_insert_rowid(), raw_json));
    }

    conn.execute(
        "UPDATE file_uploads SET transaction_count = ?1 WHERE id = ?2",
        rusqlite::params![inserted.len() as i64, batch_id],
    )?;

    let status = match &mapping {
        Some(mapping) => {
            let mut errors = Vec::new();
            map_rows(conn, mapping, &inserted, &mut errors);
            finalize_batch(conn, batch_id, &errors)?
        }
        None => {
            conn.execute(
                "UPDATE file_uploads SET status = 'pending' WHERE id = ?1",
                [batch_id],
            )?;
            BatchStatus::Pending
        }
    };

    Ok(IngestResult {
        batch_id,
        rows: inserted.len(),
        status,
        duplicate_file: false,
    })
}

// ---------------------------------------------------------------------------
// Re-process pass
// ---------------------------------------------------------------------------

pub struct ReprocessResult {
    pub batches: usize,
    pub transactions: usize,
    pub failed_batches: usize,
}

/// Re-run the account's mapping over every stored raw row, batch by batch.
/// Mapped fields are fully overwritten, so the pass is idempotent; each
/// batch's status and error log are refreshed.
pub fn reprocess_account(conn: &Connection, account: &Account) -> Result<ReprocessResult> {
    let mapping_json = account.column_mapping.as_deref().ok_or_else(|| {
        BursarError::Other(format!("account '{}' has no column mapping configured", account.name))
    })?;
    let mapping = ColumnMapping::from_json(mapping_json)?;

    let mut batch_stmt =
        conn.prepare("SELECT id FROM file_uploads WHERE account_id = ?1 ORDER BY id")?;
    let batch_ids: Vec<i64> = batch_stmt
        .query_map([account.id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut transactions = 0usize;
    let mut failed_batches = 0usize;

    for batch_id in &batch_ids {
        let mut tx_stmt = conn
            .prepare("SELECT id, raw_data FROM transactions WHERE file_upload_id = ?1 ORDER BY id")?;
        let rows: Vec<(i64, String)> = tx_stmt
            .query_map([batch_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut errors = Vec::new();
        map_rows(conn, &mapping, &rows, &mut errors);
        transactions += rows.len();
        if finalize_batch(conn, *batch_id, &errors)? == BatchStatus::Failed {
            failed_batches += 1;
        }
    }

    Ok(ReprocessResult {
        batches: batch_ids.len(),
        transactions,
        failed_batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_account, get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    const MAPPING: &str = r#"{
        "schema": {"transaction_date": "Date", "description": "Payee", "amount": "Amt"},
        "amount_column_format": "debit_is_negative"
    }"#;

    fn add_account(conn: &Connection, mapping: Option<&str>) {
        conn.execute(
            "INSERT INTO accounts (name, account_type, column_mapping) VALUES ('Main', 'checking', ?1)",
            [mapping],
        )
        .unwrap();
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const SAMPLE: &str = "\
Date,Payee,Amt
2025-01-15,COFFEE SHOP,-4.50
2025-01-16,PAYCHECK,2500.00
";

    #[test]
    fn test_ingest_without_mapping_defers() {
        let (dir, conn) = test_db();
        add_account(&conn, None);
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);

        let result = ingest_file(&conn, &path, &account).unwrap();
        assert_eq!(result.rows, 2);
        assert_eq!(result.status, BatchStatus::Pending);

        // Raw rows stored, typed fields untouched
        let (amount, raw): (Option<String>, String) = conn
            .query_row("SELECT amount, raw_data FROM transactions LIMIT 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(amount, None);
        assert!(raw.contains("COFFEE SHOP"));
    }

    #[test]
    fn test_ingest_with_mapping_normalizes_inline() {
        let (dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);

        let result = ingest_file(&conn, &path, &account).unwrap();
        assert_eq!(result.status, BatchStatus::Completed);

        let (desc, amount, date): (Option<String>, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT description, amount, transaction_date FROM transactions ORDER BY id LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(desc.as_deref(), Some("COFFEE SHOP"));
        assert_eq!(amount.as_deref(), Some("-4.50"));
        assert_eq!(date.as_deref(), Some("2025-01-15 00:00:00"));
    }

    #[test]
    fn test_ingest_records_batch() {
        let (dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);
        ingest_file(&conn, &path, &account).unwrap();

        let (filename, count, status): (String, i64, String) = conn
            .query_row(
                "SELECT filename, transaction_count, status FROM file_uploads LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(filename, "jan.csv");
        assert_eq!(count, 2);
        assert_eq!(status, "completed");
    }

    #[test]
    fn test_duplicate_file_refused() {
        let (dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);

        let first = ingest_file(&conn, &path, &account).unwrap();
        assert!(!first.duplicate_file);
        let second = ingest_file(&conn, &path, &account).unwrap();
        assert!(second.duplicate_file);
        let count: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_bom_stripped_from_header() {
        let (dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "bom.csv", "\u{feff}Date,Payee,Amt\n2025-02-01,VENDOR,-1.00\n");

        ingest_file(&conn, &path, &account).unwrap();
        let date: Option<String> = conn
            .query_row("SELECT transaction_date FROM transactions LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(date.as_deref(), Some("2025-02-01 00:00:00"));
    }

    #[test]
    fn test_reprocess_after_mapping_supplied() {
        let (dir, conn) = test_db();
        add_account(&conn, None);
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);
        ingest_file(&conn, &path, &account).unwrap();

        conn.execute("UPDATE accounts SET column_mapping = ?1 WHERE id = ?2",
            rusqlite::params![MAPPING, account.id]).unwrap();
        let account = get_account(&conn, "Main").unwrap();

        let result = reprocess_account(&conn, &account).unwrap();
        assert_eq!(result.batches, 1);
        assert_eq!(result.transactions, 2);
        assert_eq!(result.failed_batches, 0);

        let status: String = conn
            .query_row("SELECT status FROM file_uploads LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "completed");
        let amount: Option<String> = conn
            .query_row(
                "SELECT amount FROM transactions ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(amount.as_deref(), Some("2500.00"));
    }

    #[test]
    fn test_reprocess_is_idempotent() {
        let (dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        let path = write_csv(dir.path(), "jan.csv", SAMPLE);
        ingest_file(&conn, &path, &account).unwrap();

        let before: Vec<(Option<String>, Option<String>)> = conn
            .prepare("SELECT description, amount FROM transactions ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        reprocess_account(&conn, &account).unwrap();
        let after: Vec<(Option<String>, Option<String>)> = conn
            .prepare("SELECT description, amount FROM transactions ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reprocess_requires_mapping() {
        let (_dir, conn) = test_db();
        add_account(&conn, None);
        let account = get_account(&conn, "Main").unwrap();
        assert!(reprocess_account(&conn, &account).is_err());
    }

    #[test]
    fn test_reprocess_collects_bad_raw_data() {
        let (_dir, conn) = test_db();
        add_account(&conn, Some(MAPPING));
        let account = get_account(&conn, "Main").unwrap();
        conn.execute(
            "INSERT INTO file_uploads (account_id, filename, status) VALUES (?1, 'x.csv', 'pending')",
            [account.id],
        )
        .unwrap();
        let batch_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO transactions (account_id, file_upload_id, raw_data) VALUES (?1, ?2, 'not json')",
            rusqlite::params![account.id, batch_id],
        )
        .unwrap();

        let result = reprocess_account(&conn, &account).unwrap();
        assert_eq!(result.failed_batches, 1);
        let (status, errors): (String, Option<String>) = conn
            .query_row("SELECT status, errors FROM file_uploads WHERE id = ?1", [batch_id], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(status, "failed");
        assert!(errors.unwrap().contains("bad raw_data"));
    }
}
