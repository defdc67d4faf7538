use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::TIMESTAMP_FMT;
use crate::error::{BursarError, Result};
use crate::parse::{parse_amount, parse_date};

// ---------------------------------------------------------------------------
// Mapping configuration
// ---------------------------------------------------------------------------

/// Wire shape of the per-account mapping blob:
///
/// ```json
/// {
///   "schema": {
///     "transaction_date": "Date", "posted_date": null,
///     "description": "Payee", "description_2": null,
///     "category": "Category", "amount": "Amount"
///   },
///   "amount_column_format": "debit_is_negative",
///   "debit_column": null,
///   "credit_column": null
/// }
/// ```
///
/// `amount_column_format` selects single-column handling; when absent the
/// debit/credit column pair is used instead.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawMapping {
    #[serde(default)]
    schema: RawSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount_column_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debit_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credit_column: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawSchema {
    #[serde(default)]
    transaction_date: Option<String>,
    #[serde(default)]
    posted_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    description_2: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    amount: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Source already encodes expenses as negative values.
    DebitIsNegative,
    /// Source encodes expenses as positive values; flip on ingest.
    DebitIsPositive,
}

/// Amount handling is either a single signed column or a debit/credit pair,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountColumns {
    Single { column: Option<String>, sign: SignMode },
    Split { debit: Option<String>, credit: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub transaction_date: Option<String>,
    pub posted_date: Option<String>,
    pub description: Option<String>,
    pub description_2: Option<String>,
    pub category: Option<String>,
    pub amount: AmountColumns,
}

fn non_empty(col: Option<String>) -> Option<String> {
    col.filter(|c| !c.trim().is_empty())
}

impl ColumnMapping {
    /// Parse and validate a mapping blob. Unknown `amount_column_format`
    /// values are rejected here rather than surfacing mid-ingest.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawMapping = serde_json::from_str(json)
            .map_err(|e| BursarError::InvalidMapping(e.to_string()))?;

        let amount = match raw.amount_column_format.as_deref() {
            Some("debit_is_negative") => AmountColumns::Single {
                column: non_empty(raw.schema.amount),
                sign: SignMode::DebitIsNegative,
            },
            Some("debit_is_positive") => AmountColumns::Single {
                column: non_empty(raw.schema.amount),
                sign: SignMode::DebitIsPositive,
            },
            Some(other) => {
                return Err(BursarError::InvalidMapping(format!(
                    "unrecognized amount_column_format: {other:?}"
                )))
            }
            None => AmountColumns::Split {
                debit: non_empty(raw.debit_column),
                credit: non_empty(raw.credit_column),
            },
        };

        Ok(Self {
            transaction_date: non_empty(raw.schema.transaction_date),
            posted_date: non_empty(raw.schema.posted_date),
            description: non_empty(raw.schema.description),
            description_2: non_empty(raw.schema.description_2),
            category: non_empty(raw.schema.category),
            amount,
        })
    }

    /// Re-emit the wire shape for storage on the account row.
    pub fn to_json(&self) -> String {
        let mut raw = RawMapping {
            schema: RawSchema {
                transaction_date: self.transaction_date.clone(),
                posted_date: self.posted_date.clone(),
                description: self.description.clone(),
                description_2: self.description_2.clone(),
                category: self.category.clone(),
                amount: None,
            },
            amount_column_format: None,
            debit_column: None,
            credit_column: None,
        };
        match &self.amount {
            AmountColumns::Single { column, sign } => {
                raw.schema.amount = column.clone();
                raw.amount_column_format = Some(
                    match sign {
                        SignMode::DebitIsNegative => "debit_is_negative",
                        SignMode::DebitIsPositive => "debit_is_positive",
                    }
                    .to_string(),
                );
            }
            AmountColumns::Split { debit, credit } => {
                raw.debit_column = debit.clone();
                raw.credit_column = credit.clone();
            }
        }
        serde_json::to_string_pretty(&raw).unwrap_or_else(|_| "{}".to_string())
    }
}

// ---------------------------------------------------------------------------
// Schema application
// ---------------------------------------------------------------------------

/// Normalized field values produced from one raw row. Every field is
/// overwritten on each application, so re-running a mapping is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFields {
    pub transaction_date: Option<NaiveDateTime>,
    pub posted_date: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub description_2: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
}

fn raw_value<'a>(raw: &'a Map<String, Value>, column: &Option<String>) -> Option<&'a str> {
    column
        .as_deref()
        .and_then(|col| raw.get(col))
        .and_then(|v| v.as_str())
}

fn text_field(raw: &Map<String, Value>, column: &Option<String>) -> Option<String> {
    raw_value(raw, column)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn date_field(raw: &Map<String, Value>, column: &Option<String>) -> Option<NaiveDateTime> {
    raw_value(raw, column).and_then(parse_date)
}

pub fn apply_mapping(mapping: &ColumnMapping, raw: &Map<String, Value>) -> MappedFields {
    let amount = match &mapping.amount {
        AmountColumns::Single { column, sign } => {
            raw_value(raw, column).and_then(parse_amount).map(|a| match sign {
                SignMode::DebitIsNegative => a,
                SignMode::DebitIsPositive => -a,
            })
        }
        AmountColumns::Split { debit, credit } => {
            let debit_val = raw_value(raw, debit).and_then(parse_amount);
            let credit_val = raw_value(raw, credit).and_then(parse_amount);
            match (debit_val, credit_val) {
                // Credits weigh positive, debits negative; both present nets out
                (Some(d), Some(c)) => Some(c - d),
                (Some(d), None) => Some(-d.abs()),
                (None, Some(c)) => Some(c.abs()),
                (None, None) => None,
            }
        }
    };

    MappedFields {
        transaction_date: date_field(raw, &mapping.transaction_date),
        posted_date: date_field(raw, &mapping.posted_date),
        description: text_field(raw, &mapping.description),
        description_2: text_field(raw, &mapping.description_2),
        category: text_field(raw, &mapping.category),
        amount,
    }
}

/// Apply a mapping to one stored transaction and persist the result,
/// overwriting every mapped field.
pub fn apply_to_transaction(
    conn: &Connection,
    tx_id: i64,
    mapping: &ColumnMapping,
    raw: &Map<String, Value>,
) -> Result<()> {
    let fields = apply_mapping(mapping, raw);
    conn.execute(
        "UPDATE transactions SET transaction_date = ?1, posted_date = ?2, \
         description = ?3, description_2 = ?4, category = ?5, amount = ?6 WHERE id = ?7",
        rusqlite::params![
            fields.transaction_date.map(|d| d.format(TIMESTAMP_FMT).to_string()),
            fields.posted_date.map(|d| d.format(TIMESTAMP_FMT).to_string()),
            fields.description,
            fields.description_2,
            fields.category,
            fields.amount.map(|a| a.to_string()),
            tx_id,
        ],
    )?;
    Ok(())
}
