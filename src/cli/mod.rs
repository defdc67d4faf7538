pub mod accounts;
pub mod admin;
pub mod export;
pub mod import;
pub mod init;
pub mod report;
pub mod statements;
pub mod taxonomies;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bursar",
    about = "Personal finance tracker: CSV ingestion, classification, cash-flow reports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up bursar: choose a data directory and initialize the database.
    Init {
        /// Path for bursar data (default: ~/Documents/bursar)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts and their column mappings.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Ingest a bank/credit-card CSV export into an account.
    Import {
        /// Path to the CSV file
        file: String,
        /// Account name to import into
        #[arg(long)]
        account: String,
    },
    /// Re-run the account's column mapping over every stored raw row.
    Reprocess {
        /// Account name
        #[arg(long)]
        account: String,
    },
    /// Manage the location classification taxonomy.
    Classifications {
        #[command(subcommand)]
        command: ClassificationsCommands,
    },
    /// Generate cash-flow reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export all transactions as a flat CSV file.
    Export {
        /// Output path (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Manage account statements.
    Statements {
        #[command(subcommand)]
        command: StatementsCommands,
    },
    /// One-shot maintenance batch jobs.
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Everyday Checking'
        name: String,
        /// Account type: checking, savings, credit_card, investment, loan, other
        #[arg(long = "type")]
        account_type: String,
    },
    /// List all accounts.
    List,
    /// Set the account's CSV column mapping and re-process its history.
    SetMapping {
        /// Account name
        account: String,
        /// Path to a JSON mapping file
        #[arg(long)]
        file: String,
    },
    /// Print the account's current column mapping.
    ShowMapping {
        /// Account name
        account: String,
    },
}

#[derive(Subcommand)]
pub enum ClassificationsCommands {
    /// List location classifications with their subclassifications.
    List,
    /// Change a classification's kind (income, expense, transfer).
    SetKind {
        /// Classification ID (shown in `bursar classifications list`)
        id: i64,
        /// New kind: income, expense, transfer
        #[arg(long)]
        kind: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Cash-flow summary over an optional date range.
    Summary {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD (inclusive)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Filter by account name
        #[arg(long)]
        account: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Cash flow pivoted by calendar month with YTD rollups.
    Monthly {
        /// Target year: YYYY
        #[arg(long)]
        year: i32,
        /// Filter by account name
        #[arg(long)]
        account: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum StatementsCommands {
    /// Record a statement period for an account.
    Add {
        /// Account name
        #[arg(long)]
        account: String,
        /// Period end: YYYY-MM-DD
        #[arg(long = "period-end")]
        period_end: String,
        /// Period start: YYYY-MM-DD
        #[arg(long = "period-start")]
        period_start: Option<String>,
        /// Opening balance
        #[arg(long)]
        opening: Option<String>,
        /// Closing balance
        #[arg(long)]
        closing: Option<String>,
    },
    /// List statements.
    List {
        /// Filter by account name
        #[arg(long)]
        account: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Derive the location taxonomy from transaction history and backfill FKs.
    SeedClassifications {
        /// Print the plan without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Shift statement period_end dates by a number of days.
    ShiftPeriodEnd {
        /// Days to add (positive) or subtract (negative)
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
        /// Restrict to a single account
        #[arg(long)]
        account: Option<String>,
        /// Print the plan without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Fill missing statement period_start dates from predecessors.
    BackfillStatementStarts {
        /// Restrict to a single account
        #[arg(long)]
        account: Option<String>,
        /// Print the plan without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}
