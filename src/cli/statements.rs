use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::db::{get_account, get_connection};
use crate::error::{BursarError, Result};
use crate::fmt::money;
use crate::reports::parse_iso_date;
use crate::settings::db_path;
use crate::statements::{add_statement, list_statements};

fn parse_balance(value: Option<&str>) -> Result<Option<Decimal>> {
    value
        .map(|v| {
            v.parse::<Decimal>()
                .map_err(|_| BursarError::Other(format!("invalid balance: {v}")))
        })
        .transpose()
}

pub fn add(
    account_name: &str,
    period_end: &str,
    period_start: Option<&str>,
    opening: Option<&str>,
    closing: Option<&str>,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account = get_account(&conn, account_name)?;
    let id = add_statement(
        &conn,
        account.id,
        period_start.map(parse_iso_date).transpose()?,
        parse_iso_date(period_end)?,
        parse_balance(opening)?,
        parse_balance(closing)?,
    )?;
    println!("Added statement {id} for {account_name}");
    Ok(())
}

pub fn list(account_name: Option<&str>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account_id = account_name
        .map(|name| get_account(&conn, name).map(|a| a.id))
        .transpose()?;
    let statements = list_statements(&conn, account_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Account", "Period Start", "Period End", "Opening", "Closing"]);
    for s in statements {
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(s.account_id),
            Cell::new(
                s.period_start
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "\u{2014}".to_string()),
            ),
            Cell::new(s.period_end.format("%Y-%m-%d")),
            Cell::new(s.opening_balance.map(money).unwrap_or_default()),
            Cell::new(s.closing_balance.map(money).unwrap_or_default()),
        ]);
    }
    println!("Statements\n{table}");
    Ok(())
}
