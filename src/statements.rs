use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::{BursarError, Result};
use crate::models::Statement;

const CHUNK_SIZE: usize = 500;

fn parse_period(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| BursarError::InvalidDate(s.to_string()))
}

pub fn add_statement(
    conn: &Connection,
    account_id: i64,
    period_start: Option<NaiveDate>,
    period_end: NaiveDate,
    opening_balance: Option<Decimal>,
    closing_balance: Option<Decimal>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO statements (account_id, period_start, period_end, opening_balance, closing_balance) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            account_id,
            period_start.map(|d| d.format("%Y-%m-%d").to_string()),
            period_end.format("%Y-%m-%d").to_string(),
            opening_balance.map(|b| b.to_string()),
            closing_balance.map(|b| b.to_string()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_statements(conn: &Connection, account_id: Option<i64>) -> Result<Vec<Statement>> {
    let sql = "SELECT id, account_id, period_start, period_end, opening_balance, closing_balance \
               FROM statements WHERE (?1 IS NULL OR account_id = ?1) \
               ORDER BY account_id, period_end";
    let mut stmt = conn.prepare(sql)?;
    let raw: Vec<(i64, i64, Option<String>, String, Option<String>, Option<String>)> = stmt
        .query_map([account_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut statements = Vec::with_capacity(raw.len());
    for (id, account_id, start, end, opening, closing) in raw {
        statements.push(Statement {
            id,
            account_id,
            period_start: start.as_deref().map(parse_period).transpose()?,
            period_end: parse_period(&end)?,
            opening_balance: opening.and_then(|b| b.parse().ok()),
            closing_balance: closing.and_then(|b| b.parse().ok()),
        });
    }
    Ok(statements)
}

// ---------------------------------------------------------------------------
// Period-end shift
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ShiftPlanItem {
    pub statement_id: i64,
    pub account_id: i64,
    pub old_end: NaiveDate,
    pub new_end: NaiveDate,
}

#[derive(Debug)]
pub struct ShiftOutcome {
    pub planned: Vec<ShiftPlanItem>,
    pub updated: usize,
}

/// Shift every matching statement's period_end by `days` (positive or
/// negative, never zero). Dry-run returns the full plan without writing.
pub fn shift_period_end(
    conn: &Connection,
    days: i64,
    account_id: Option<i64>,
    dry_run: bool,
) -> Result<ShiftOutcome> {
    if days == 0 {
        return Err(BursarError::Other("days must be non-zero".to_string()));
    }

    let mut stmt = conn.prepare(
        "SELECT id, account_id, period_end FROM statements \
         WHERE (?1 IS NULL OR account_id = ?1) ORDER BY id",
    )?;
    let rows: Vec<(i64, i64, String)> = stmt
        .query_map([account_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let delta = Duration::days(days);
    let mut planned = Vec::with_capacity(rows.len());
    for (statement_id, account_id, end) in rows {
        let old_end = parse_period(&end)?;
        planned.push(ShiftPlanItem {
            statement_id,
            account_id,
            old_end,
            new_end: old_end + delta,
        });
    }

    if dry_run {
        return Ok(ShiftOutcome { planned, updated: 0 });
    }

    let mut updated = 0usize;
    for chunk in planned.chunks(CHUNK_SIZE) {
        let txn = conn.unchecked_transaction()?;
        for item in chunk {
            conn.execute(
                "UPDATE statements SET period_end = ?1 WHERE id = ?2",
                rusqlite::params![item.new_end.format("%Y-%m-%d").to_string(), item.statement_id],
            )?;
        }
        txn.commit()?;
        updated += chunk.len();
    }

    Ok(ShiftOutcome { planned, updated })
}

// ---------------------------------------------------------------------------
// Period-start backfill
// ---------------------------------------------------------------------------

/// A predecessor statement older than this many days is assumed to belong to
/// a different statement run and is not used as an open date.
const MAX_PREDECESSOR_GAP_DAYS: i64 = 32;

#[derive(Debug)]
pub struct StartPlanItem {
    pub statement_id: i64,
    pub account_id: i64,
    pub period_start: NaiveDate,
    pub gap_days: i64,
}

#[derive(Debug, Default)]
pub struct StartBackfillOutcome {
    pub planned: Vec<StartPlanItem>,
    pub updated: usize,
    pub skipped_no_predecessor: usize,
    pub skipped_gap: usize,
}

/// Fill a missing period_start from the preceding statement's period_end,
/// per account oldest-first, when the two closed within 32 days of each
/// other.
pub fn backfill_period_starts(
    conn: &Connection,
    account_id: Option<i64>,
    dry_run: bool,
) -> Result<StartBackfillOutcome> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, period_start, period_end FROM statements \
         WHERE (?1 IS NULL OR account_id = ?1) ORDER BY account_id, period_end",
    )?;
    let rows: Vec<(i64, i64, Option<String>, String)> = stmt
        .query_map([account_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_account: BTreeMap<i64, Vec<(i64, Option<String>, NaiveDate)>> = BTreeMap::new();
    for (id, acct, start, end) in rows {
        by_account
            .entry(acct)
            .or_default()
            .push((id, start, parse_period(&end)?));
    }

    let mut outcome = StartBackfillOutcome::default();
    for (acct, stmts) in &by_account {
        for (i, (id, start, end)) in stmts.iter().enumerate() {
            if start.is_some() {
                continue;
            }
            if i == 0 {
                outcome.skipped_no_predecessor += 1;
                continue;
            }
            let predecessor_end = stmts[i - 1].2;
            let gap_days = (*end - predecessor_end).num_days();
            if gap_days > MAX_PREDECESSOR_GAP_DAYS {
                outcome.skipped_gap += 1;
                continue;
            }
            outcome.planned.push(StartPlanItem {
                statement_id: *id,
                account_id: *acct,
                period_start: predecessor_end,
                gap_days,
            });
        }
    }

    if dry_run {
        return Ok(outcome);
    }

    for chunk in outcome.planned.chunks(CHUNK_SIZE) {
        let txn = conn.unchecked_transaction()?;
        for item in chunk {
            conn.execute(
                "UPDATE statements SET period_start = ?1 WHERE id = ?2",
                rusqlite::params![
                    item.period_start.format("%Y-%m-%d").to_string(),
                    item.statement_id
                ],
            )?;
        }
        txn.commit()?;
        outcome.updated += chunk.len();
    }

    Ok(outcome)
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

    fn add_account(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES (?1, 'credit_card')",
            [name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn add_stmt(conn: &Connection, acct: i64, start: Option<&str>, end: &str) -> i64 {
        add_statement(conn, acct, start.map(d), d(end), None, None).unwrap()
    }

    #[test]
    fn test_add_and_list() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_statement(&conn, acct, Some(d("2025-01-01")), d("2025-01-31"),
            Some("100.00".parse().unwrap()), Some("250.00".parse().unwrap())).unwrap();
        let all = list_statements(&conn, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].period_end, d("2025-01-31"));
        assert_eq!(all[0].closing_balance, Some("250.00".parse().unwrap()));
    }

    #[test]
    fn test_shift_rejects_zero_days() {
        let (_dir, conn) = test_db();
        assert!(shift_period_end(&conn, 0, None, false).is_err());
    }

    #[test]
    fn test_shift_applies_delta() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_stmt(&conn, acct, None, "2025-01-31");
        add_stmt(&conn, acct, None, "2025-02-28");

        let outcome = shift_period_end(&conn, -3, None, false).unwrap();
        assert_eq!(outcome.updated, 2);
        let ends: Vec<String> = conn
            .prepare("SELECT period_end FROM statements ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(ends, vec!["2025-01-28", "2025-02-25"]);
    }

    #[test]
    fn test_shift_dry_run_writes_nothing() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_stmt(&conn, acct, None, "2025-01-31");

        let outcome = shift_period_end(&conn, 5, None, true).unwrap();
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.planned.len(), 1);
        assert_eq!(outcome.planned[0].new_end, d("2025-02-05"));
        let end: String = conn
            .query_row("SELECT period_end FROM statements", [], |r| r.get(0))
            .unwrap();
        assert_eq!(end, "2025-01-31");
    }

    #[test]
    fn test_shift_account_scope() {
        let (_dir, conn) = test_db();
        let a = add_account(&conn, "A");
        let b = add_account(&conn, "B");
        add_stmt(&conn, a, None, "2025-01-31");
        add_stmt(&conn, b, None, "2025-01-31");

        let outcome = shift_period_end(&conn, 1, Some(a), false).unwrap();
        assert_eq!(outcome.updated, 1);
        let untouched: String = conn
            .query_row("SELECT period_end FROM statements WHERE account_id = ?1", [b], |r| r.get(0))
            .unwrap();
        assert_eq!(untouched, "2025-01-31");
    }

    #[test]
    fn test_backfill_sets_start_from_predecessor() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_stmt(&conn, acct, Some("2025-01-01"), "2025-01-31");
        let second = add_stmt(&conn, acct, None, "2025-02-28");

        let outcome = backfill_period_starts(&conn, None, false).unwrap();
        assert_eq!(outcome.updated, 1);
        let start: Option<String> = conn
            .query_row("SELECT period_start FROM statements WHERE id = ?1", [second], |r| r.get(0))
            .unwrap();
        assert_eq!(start.as_deref(), Some("2025-01-31"));
    }

    #[test]
    fn test_backfill_skips_earliest_and_wide_gaps() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        // Earliest statement has no predecessor
        add_stmt(&conn, acct, None, "2025-01-31");
        // 89-day gap exceeds the 32-day window
        add_stmt(&conn, acct, None, "2025-04-30");

        let outcome = backfill_period_starts(&conn, None, false).unwrap();
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.skipped_no_predecessor, 1);
        assert_eq!(outcome.skipped_gap, 1);
    }

    #[test]
    fn test_backfill_leaves_existing_starts() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_stmt(&conn, acct, Some("2025-01-01"), "2025-01-31");
        add_stmt(&conn, acct, Some("2025-01-31"), "2025-02-28");

        let outcome = backfill_period_starts(&conn, None, false).unwrap();
        assert_eq!(outcome.updated, 0);
        assert!(outcome.planned.is_empty());
    }

    #[test]
    fn test_backfill_dry_run_writes_nothing() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card");
        add_stmt(&conn, acct, Some("2025-01-01"), "2025-01-31");
        let second = add_stmt(&conn, acct, None, "2025-02-28");

        let outcome = backfill_period_starts(&conn, None, true).unwrap();
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.planned.len(), 1);
        assert_eq!(outcome.planned[0].gap_days, 28);
        let start: Option<String> = conn
            .query_row("SELECT period_start FROM statements WHERE id = ?1", [second], |r| r.get(0))
            .unwrap();
        assert_eq!(start, None);
    }
}
