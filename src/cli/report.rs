use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::db::get_connection;
use crate::error::{BursarError, Result};
use crate::fmt::money;
use crate::reports::{
    cash_flow_monthly, cash_flow_summary, parse_iso_date, MonthlyReport, ReportFilter,
    SummaryReport,
};
use crate::settings::db_path;

pub fn summary(
    from_date: Option<String>,
    to_date: Option<String>,
    account: Option<String>,
    json: bool,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let filter = ReportFilter {
        date_from: from_date.as_deref().map(parse_iso_date).transpose()?,
        date_to: to_date.as_deref().map(parse_iso_date).transpose()?,
        account,
    };
    let report = cash_flow_summary(&conn, &filter)?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("{}", format_summary(&report));
    }
    Ok(())
}

pub fn monthly(year: i32, account: Option<String>, json: bool) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let report = cash_flow_monthly(&conn, year, account.as_deref())?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("{}", format_monthly(&report));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| BursarError::Other(e.to_string()))
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn section_heading(label: &str, kind: &str) -> String {
    let upper = label.to_uppercase();
    if kind == "income" {
        upper.green().bold().to_string()
    } else {
        upper.red().bold().to_string()
    }
}

pub fn format_summary(report: &SummaryReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount"]);

    for section in &report.sections {
        table.add_row(vec![
            Cell::new(section_heading(section.label, section.kind)),
            Cell::new(""),
        ]);
        for cat in &section.categories {
            table.add_row(vec![
                Cell::new(format!("  {}", cat.name)),
                Cell::new(money(cat.total.abs())),
            ]);
            for sub in &cat.subcategories {
                table.add_row(vec![
                    Cell::new(format!("    {}", sub.name)),
                    Cell::new(money(sub.total.abs())),
                ]);
            }
        }
        table.add_row(vec![
            Cell::new(format!("Total {}", section.label).bold()),
            Cell::new(money(section.total.abs())),
        ]);
        table.add_row(vec![Cell::new(""), Cell::new("")]);
    }

    let net_label = if report.net_income >= Decimal::ZERO {
        "NET INCOME".green().bold()
    } else {
        "NET INCOME".red().bold()
    };
    table.add_row(vec![Cell::new(net_label), Cell::new(money(report.net_income))]);

    format!("Cash Flow Summary\n{table}")
}

const MONTH_LABELS: &[&str] = &[
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_cells(months: &[Decimal], ytd: Decimal) -> Vec<Cell> {
    let mut cells: Vec<Cell> = months.iter().map(|m| Cell::new(money(m.abs()))).collect();
    cells.push(Cell::new(money(ytd.abs())));
    cells
}

pub fn format_monthly(report: &MonthlyReport) -> String {
    let mut table = Table::new();
    let mut header = vec!["Category".to_string()];
    header.extend(MONTH_LABELS.iter().map(|m| m.to_string()));
    header.push("YTD".to_string());
    table.set_header(header);

    for section in &report.sections {
        let mut row = vec![Cell::new(section_heading(section.label, section.kind))];
        row.extend((0..13).map(|_| Cell::new("")));
        table.add_row(row);
        for cat in &section.categories {
            let mut row = vec![Cell::new(format!("  {}", cat.name))];
            row.extend(month_cells(&cat.total.months, cat.total.ytd));
            table.add_row(row);
            for sub in &cat.subcategories {
                let mut row = vec![Cell::new(format!("    {}", sub.name))];
                row.extend(month_cells(&sub.total.months, sub.total.ytd));
                table.add_row(row);
            }
        }
        let mut row = vec![Cell::new(format!("Total {}", section.label).bold())];
        row.extend(month_cells(&section.total.months, section.total.ytd));
        table.add_row(row);
    }

    let net_label = if report.net_income.ytd >= Decimal::ZERO {
        "NET INCOME".green().bold()
    } else {
        "NET INCOME".red().bold()
    };
    let mut row = vec![Cell::new(net_label)];
    row.extend(
        report
            .net_income
            .months
            .iter()
            .map(|m| Cell::new(money(*m))),
    );
    row.push(Cell::new(money(report.net_income.ytd)));
    table.add_row(row);

    format!("Monthly Cash Flow \u{2014} {}\n{table}", report.year)
}
