use crate::db::get_connection;
use crate::error::Result;
use crate::export::export_transactions;
use crate::settings::db_path;

pub fn run(output: Option<String>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            let count = export_transactions(&conn, file)?;
            println!("Exported {count} transactions to {path}");
        }
        None => {
            export_transactions(&conn, std::io::stdout().lock())?;
        }
    }
    Ok(())
}
