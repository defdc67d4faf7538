use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::{BursarError, Result};
use crate::models::ClassificationKind;
use crate::settings::db_path;

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT lc.id, lc.name, lc.kind, group_concat(lsc.name, ', ') \
         FROM location_classifications lc \
         LEFT JOIN location_subclassifications lsc ON lsc.location_classification_id = lc.id \
         GROUP BY lc.id ORDER BY lc.id",
    )?;
    let rows: Vec<(i64, String, String, Option<String>)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Kind", "Subclassifications"]);
    for (id, name, kind, subs) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(name),
            Cell::new(kind),
            Cell::new(subs.unwrap_or_default()),
        ]);
    }
    println!("Location Classifications\n{table}");
    Ok(())
}

pub fn set_kind(id: i64, kind: &str) -> Result<()> {
    let kind = ClassificationKind::parse(kind).ok_or_else(|| {
        BursarError::Other(format!(
            "unknown kind '{kind}' (expected income, expense, or transfer)"
        ))
    })?;
    let conn = get_connection(&db_path())?;
    let changed = conn.execute(
        "UPDATE location_classifications SET kind = ?1 WHERE id = ?2",
        rusqlite::params![kind.as_str(), id],
    )?;
    if changed == 0 {
        return Err(BursarError::Other(format!("no classification with id {id}")));
    }
    println!("Classification {id} is now {}", kind.as_str());
    Ok(())
}
