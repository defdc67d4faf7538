use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::TIMESTAMP_FMT;
use crate::error::{BursarError, Result};
use crate::models::ClassificationKind;

pub const UNCLASSIFIED: &str = "Unclassified";
pub const UNCATEGORIZED: &str = "Uncategorized";

pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| BursarError::InvalidDate(s.to_string()))
}

#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub account: Option<String>,
}

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Section<T> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub label: &'static str,
    pub categories: Vec<CategoryTotals<T>>,
    pub total: T,
}

#[derive(Debug, Serialize)]
pub struct CategoryTotals<T> {
    pub id: Option<i64>,
    pub name: String,
    pub subcategories: Vec<SubcategoryTotals<T>>,
    pub total: T,
}

#[derive(Debug, Serialize)]
pub struct SubcategoryTotals<T> {
    pub id: Option<i64>,
    pub name: String,
    pub total: T,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub sections: Vec<Section<Decimal>>,
    pub total_revenues: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
}

/// Twelve month slots (January first) plus their sum.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTotal {
    pub months: Vec<Decimal>,
    pub ytd: Decimal,
}

impl MonthlyTotal {
    fn from_slots(months: [Decimal; 12]) -> Self {
        let ytd = months.iter().copied().sum();
        Self {
            months: months.to_vec(),
            ytd,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub sections: Vec<Section<MonthlyTotal>>,
    pub total_revenues: MonthlyTotal,
    pub total_expenses: MonthlyTotal,
    pub net_income: MonthlyTotal,
}

// ---------------------------------------------------------------------------
// Row fetch + grouping
// ---------------------------------------------------------------------------

struct TxRow {
    amount: Decimal,
    date: Option<NaiveDateTime>,
    category: Option<(i64, String)>,
    kind: Option<ClassificationKind>,
    subcategory: Option<(i64, String)>,
}

fn fetch_rows(conn: &Connection, filter: &ReportFilter) -> Result<Vec<TxRow>> {
    let mut clauses: Vec<String> = vec!["t.amount IS NOT NULL".to_string()];
    let mut params: Vec<String> = Vec::new();

    if let Some(from) = filter.date_from {
        params.push(from.format("%Y-%m-%d").to_string());
        clauses.push(format!("date(t.transaction_date) >= ?{}", params.len()));
    }
    if let Some(to) = filter.date_to {
        params.push(to.format("%Y-%m-%d").to_string());
        clauses.push(format!("date(t.transaction_date) <= ?{}", params.len()));
    }
    if let Some(account) = &filter.account {
        params.push(account.clone());
        clauses.push(format!("a.name = ?{}", params.len()));
    }

    let sql = format!(
        "SELECT t.amount, t.transaction_date, lc.id, lc.name, lc.kind, lsc.id, lsc.name \
         FROM transactions t \
         JOIN accounts a ON t.account_id = a.id \
         LEFT JOIN location_classifications lc ON t.location_classification_id = lc.id \
         LEFT JOIN location_subclassifications lsc ON t.location_subclassification_id = lsc.id \
         WHERE {}",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();

    type Raw = (
        String,
        Option<String>,
        Option<i64>,
        Option<String>,
        Option<String>,
        Option<i64>,
        Option<String>,
    );
    let raw: Vec<Raw> = stmt
        .query_map(param_values.as_slice(), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(raw.len());
    for (amount, date, lc_id, lc_name, lc_kind, lsc_id, lsc_name) in raw {
        let Ok(amount) = amount.parse::<Decimal>() else { continue };
        rows.push(TxRow {
            amount,
            date: date.and_then(|d| NaiveDateTime::parse_from_str(&d, TIMESTAMP_FMT).ok()),
            category: lc_id.zip(lc_name),
            kind: lc_kind.as_deref().and_then(ClassificationKind::parse),
            subcategory: lsc_id.zip(lsc_name),
        });
    }
    Ok(rows)
}

#[derive(Default)]
struct SubAcc {
    name: String,
    total: Decimal,
    months: [Decimal; 12],
}

#[derive(Default)]
struct CatAcc {
    name: String,
    // Option<i64> sorts None before Some, so Unclassified lands first
    subs: BTreeMap<Option<i64>, SubAcc>,
}

type Grouped = BTreeMap<ClassificationKind, BTreeMap<Option<i64>, CatAcc>>;

/// Group rows into bucket → category → subcategory accumulators. With
/// `year` set, amounts land in calendar-month slots of that year only;
/// without it everything accumulates into the flat total.
fn group_rows(rows: Vec<TxRow>, year: Option<i32>) -> Grouped {
    let mut grouped: Grouped = BTreeMap::new();

    for row in rows {
        // Unclassified rows count as expenses; transfers stay out of the report
        let bucket = row.kind.unwrap_or(ClassificationKind::Expense);
        if bucket == ClassificationKind::Transfer {
            continue;
        }

        let month_slot = match year {
            Some(y) => match row.date {
                Some(d) if d.year() == y => Some(d.month() as usize - 1),
                _ => continue,
            },
            None => None,
        };

        let (cat_id, cat_name) = match row.category {
            Some((id, name)) => (Some(id), name),
            None => (None, UNCLASSIFIED.to_string()),
        };
        let (sub_id, sub_name) = match row.subcategory {
            Some((id, name)) => (Some(id), name),
            None => (None, UNCATEGORIZED.to_string()),
        };

        let cat = grouped.entry(bucket).or_default().entry(cat_id).or_default();
        cat.name = cat_name;
        let sub = cat.subs.entry(sub_id).or_default();
        sub.name = sub_name;
        match month_slot {
            Some(m) => sub.months[m] += row.amount,
            None => sub.total += row.amount,
        }
    }

    grouped
}

// ---------------------------------------------------------------------------
// Summary mode
// ---------------------------------------------------------------------------

const SECTION_SPECS: &[(ClassificationKind, &str, &str)] = &[
    (ClassificationKind::Income, "income", "Revenues"),
    (ClassificationKind::Expense, "expense", "Expenses"),
];

pub fn cash_flow_summary(conn: &Connection, filter: &ReportFilter) -> Result<SummaryReport> {
    let mut grouped = group_rows(fetch_rows(conn, filter)?, None);

    let mut sections = Vec::with_capacity(2);
    for &(bucket, kind, label) in SECTION_SPECS {
        let cats = grouped.remove(&bucket).unwrap_or_default();
        let mut categories = Vec::with_capacity(cats.len());
        let mut section_total = Decimal::ZERO;
        for (cat_id, cat) in cats {
            let mut subcategories = Vec::with_capacity(cat.subs.len());
            let mut cat_total = Decimal::ZERO;
            for (sub_id, sub) in cat.subs {
                cat_total += sub.total;
                subcategories.push(SubcategoryTotals {
                    id: sub_id,
                    name: sub.name,
                    total: sub.total,
                });
            }
            section_total += cat_total;
            categories.push(CategoryTotals {
                id: cat_id,
                name: cat.name,
                subcategories,
                total: cat_total,
            });
        }
        sections.push(Section {
            kind,
            label,
            categories,
            total: section_total,
        });
    }

    let total_revenues = sections[0].total;
    let total_expenses = sections[1].total;
    Ok(SummaryReport {
        sections,
        total_revenues,
        total_expenses,
        // Expenses carry their negative sign, so plain addition nets
        net_income: total_revenues + total_expenses,
    })
}

// ---------------------------------------------------------------------------
// Monthly mode
// ---------------------------------------------------------------------------

pub fn cash_flow_monthly(
    conn: &Connection,
    year: i32,
    account: Option<&str>,
) -> Result<MonthlyReport> {
    let filter = ReportFilter {
        date_from: None,
        date_to: None,
        account: account.map(str::to_string),
    };
    let mut grouped = group_rows(fetch_rows(conn, &filter)?, Some(year));

    let mut sections = Vec::with_capacity(2);
    let mut grand: BTreeMap<ClassificationKind, [Decimal; 12]> = BTreeMap::new();
    for &(bucket, kind, label) in SECTION_SPECS {
        let cats = grouped.remove(&bucket).unwrap_or_default();
        let mut categories = Vec::with_capacity(cats.len());
        let mut section_months = [Decimal::ZERO; 12];
        for (cat_id, cat) in cats {
            let mut subcategories = Vec::with_capacity(cat.subs.len());
            let mut cat_months = [Decimal::ZERO; 12];
            for (sub_id, sub) in cat.subs {
                for (i, v) in sub.months.iter().enumerate() {
                    cat_months[i] += *v;
                }
                subcategories.push(SubcategoryTotals {
                    id: sub_id,
                    name: sub.name,
                    total: MonthlyTotal::from_slots(sub.months),
                });
            }
            for (i, v) in cat_months.iter().enumerate() {
                section_months[i] += *v;
            }
            categories.push(CategoryTotals {
                id: cat_id,
                name: cat.name,
                subcategories,
                total: MonthlyTotal::from_slots(cat_months),
            });
        }
        grand.insert(bucket, section_months);
        sections.push(Section {
            kind,
            label,
            categories,
            total: MonthlyTotal::from_slots(section_months),
        });
    }

    let revenue_months = grand[&ClassificationKind::Income];
    let expense_months = grand[&ClassificationKind::Expense];
    let mut net_months = [Decimal::ZERO; 12];
    for i in 0..12 {
        net_months[i] = revenue_months[i] + expense_months[i];
    }

    Ok(MonthlyReport {
        year,
        sections,
        total_revenues: MonthlyTotal::from_slots(revenue_months),
        total_expenses: MonthlyTotal::from_slots(expense_months),
        net_income: MonthlyTotal::from_slots(net_months),
    })
}
