use std::io::Write;

use rusqlite::Connection;

use crate::error::Result;

const HEADER: &[&str] = &[
    "ID",
    "Account",
    "Transaction Date",
    "Posted Date",
    "Description",
    "Description 2",
    "Category",
    "Subcategory",
    "Amount",
    "Location Classification",
    "Location Subclassification",
    "Time Classification",
    "Person Classification",
];

/// Write every transaction as one flat CSV row in the fixed column order.
/// Absent values render as empty strings; amounts stay exact decimal text.
pub fn export_transactions<W: Write>(conn: &Connection, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, a.name, t.transaction_date, t.posted_date, t.description, \
         t.description_2, t.category, t.subcategory, t.amount, \
         lc.name, lsc.name, tc.name, pc.name \
         FROM transactions t \
         JOIN accounts a ON t.account_id = a.id \
         LEFT JOIN location_classifications lc ON t.location_classification_id = lc.id \
         LEFT JOIN location_subclassifications lsc ON t.location_subclassification_id = lsc.id \
         LEFT JOIN time_classifications tc ON t.time_classification_id = tc.id \
         LEFT JOIN person_classifications pc ON t.person_classification_id = pc.id \
         ORDER BY t.id",
    )?;

    type Row = (i64, String, Vec<Option<String>>);
    let rows: Vec<Row> = stmt
        .query_map([], |row| {
            let mut rest = Vec::with_capacity(11);
            for i in 2..13 {
                rest.push(row.get::<_, Option<String>>(i)?);
            }
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, rest))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let count = rows.len();
    for (id, account, rest) in rows {
        let mut record: Vec<String> = Vec::with_capacity(HEADER.len());
        record.push(id.to_string());
        record.push(account);
        for field in rest {
            record.push(field.unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(count)
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

    fn export_string(conn: &Connection) -> String {
        let mut out = Vec::new();
        export_transactions(conn, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_export_header_order() {
        let (_dir, conn) = test_db();
        let out = export_string(&conn);
        assert_eq!(
            out.lines().next().unwrap(),
            "ID,Account,Transaction Date,Posted Date,Description,Description 2,\
             Category,Subcategory,Amount,Location Classification,\
             Location Subclassification,Time Classification,Person Classification"
        );
    }

    #[test]
    fn test_export_rows_with_classifications() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Main', 'checking')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO location_classifications (name, kind) VALUES ('Food', 'expense')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO time_classifications (name) VALUES ('2025 Q1')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions (account_id, raw_data, transaction_date, description, \
             category, amount, location_classification_id, time_classification_id) \
             VALUES (1, '{}', '2025-01-15 00:00:00', 'COFFEE', 'Food', '-4.50', 1, 1)",
            [],
        )
        .unwrap();

        let out = export_string(&conn);
        let row = out.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "1,Main,2025-01-15 00:00:00,,COFFEE,,Food,,-4.50,Food,,2025 Q1,"
        );
    }

    #[test]
    fn test_export_absent_values_are_empty() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Main', 'checking')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions (account_id, raw_data) VALUES (1, '{}')",
            [],
        )
        .unwrap();

        let out = export_string(&conn);
        assert_eq!(out.lines().nth(1).unwrap(), "1,Main,,,,,,,,,,,");
    }

    #[test]
    fn test_export_counts_rows() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Main', 'checking')",
            [],
        )
        .unwrap();
        for _ in 0..3 {
            conn.execute(
                "INSERT INTO transactions (account_id, raw_data) VALUES (1, '{}')",
                [],
            )
            .unwrap();
        }
        let mut out = Vec::new();
        let count = export_transactions(&conn, &mut out).unwrap();
        assert_eq!(count, 3);
    }
}
