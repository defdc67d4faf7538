use std::path::PathBuf;

use crate::db::{get_account, get_connection};
use crate::error::Result;
use crate::ingest::{ingest_file, reprocess_account};
use crate::models::BatchStatus;
use crate::settings::db_path;

pub fn run(file: &str, account_name: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account = get_account(&conn, account_name)?;

    let result = ingest_file(&conn, &PathBuf::from(file), &account)?;
    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    match result.status {
        BatchStatus::Pending => println!(
            "{} raw rows stored; no column mapping configured \u{2014} run \
             `bursar accounts set-mapping {account_name} --file <mapping.json>` to normalize them",
            result.rows
        ),
        BatchStatus::Failed => println!(
            "{} rows ingested; batch {} marked failed \u{2014} see file_uploads.errors",
            result.rows, result.batch_id
        ),
        _ => println!("{} rows ingested and normalized", result.rows),
    }
    Ok(())
}

pub fn reprocess(account_name: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account = get_account(&conn, account_name)?;
    let result = reprocess_account(&conn, &account)?;
    println!(
        "Re-processed {} transactions across {} batches ({} failed)",
        result.transactions, result.batches, result.failed_batches
    );
    Ok(())
}
