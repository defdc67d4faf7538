use comfy_table::{Cell, Table};

use crate::db::{get_account, get_connection};
use crate::error::{BursarError, Result};
use crate::ingest::reprocess_account;
use crate::mapping::ColumnMapping;
use crate::models::ACCOUNT_TYPES;
use crate::settings::db_path;

pub fn add(name: &str, account_type: &str) -> Result<()> {
    if !ACCOUNT_TYPES.contains(&account_type) {
        return Err(BursarError::Other(format!(
            "unknown account type '{account_type}' (expected one of: {})",
            ACCOUNT_TYPES.join(", ")
        )));
    }
    let conn = get_connection(&db_path())?;
    conn.execute(
        "INSERT INTO accounts (name, account_type) VALUES (?1, ?2)",
        rusqlite::params![name, account_type],
    )?;
    println!("Added account: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, column_mapping IS NOT NULL FROM accounts ORDER BY id",
    )?;
    let rows: Vec<(i64, String, String, bool)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Mapping"]);
    for (id, name, acct_type, has_mapping) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(name),
            Cell::new(acct_type),
            Cell::new(if has_mapping { "configured" } else { "\u{2014}" }),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

/// Store a validated column mapping on the account, then immediately re-run
/// it over everything already ingested.
pub fn set_mapping(account_name: &str, file: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account = get_account(&conn, account_name)?;

    let json = std::fs::read_to_string(file)?;
    let mapping = ColumnMapping::from_json(&json)?;
    conn.execute(
        "UPDATE accounts SET column_mapping = ?1 WHERE id = ?2",
        rusqlite::params![mapping.to_json(), account.id],
    )?;
    println!("Mapping set for account: {account_name}");

    let account = get_account(&conn, account_name)?;
    let result = reprocess_account(&conn, &account)?;
    println!(
        "Re-processed {} transactions across {} batches ({} failed)",
        result.transactions, result.batches, result.failed_batches
    );
    Ok(())
}

pub fn show_mapping(account_name: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account = get_account(&conn, account_name)?;
    match account.column_mapping {
        Some(json) => println!("{json}"),
        None => println!("No column mapping configured for {account_name}."),
    }
    Ok(())
}
