use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Account types whose exports follow the usual sign convention
/// (positive = money in, negative = money out).
pub const STANDARD_SIGN_TYPES: &[&str] =
    &["checking", "savings", "credit_card", "investment", "loan"];

pub const ACCOUNT_TYPES: &[&str] =
    &["checking", "savings", "credit_card", "investment", "loan", "other"];

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: String,
    pub column_mapping: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub id: i64,
    pub account_id: i64,
    pub filename: String,
    pub transaction_count: i64,
    pub status: String,
    pub errors: Option<String>,
    pub checksum: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub file_upload_id: Option<i64>,
    pub transaction_date: Option<NaiveDateTime>,
    pub posted_date: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub description_2: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub amount: Option<Decimal>,
    pub location_classification_id: Option<i64>,
    pub location_subclassification_id: Option<i64>,
    pub time_classification_id: Option<i64>,
    pub person_classification_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClassificationKind {
    Income,
    Expense,
    Transfer,
}

impl ClassificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationClassification {
    pub id: i64,
    pub name: String,
    pub kind: ClassificationKind,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct LocationSubClassification {
    pub id: i64,
    pub location_classification_id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: i64,
    pub account_id: i64,
    pub period_start: Option<NaiveDate>,
    pub period_end: NaiveDate,
    pub opening_balance: Option<Decimal>,
    pub closing_balance: Option<Decimal>,
}
