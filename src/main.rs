mod classify;
mod cli;
mod db;
mod error;
mod export;
mod fmt;
mod ingest;
mod mapping;
mod models;
mod parse;
mod reports;
mod settings;
mod statements;

use clap::Parser;

use cli::{
    AccountsCommands, AdminCommands, Cli, ClassificationsCommands, Commands, ReportCommands,
    StatementsCommands,
};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add { name, account_type } => cli::accounts::add(&name, &account_type),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::SetMapping { account, file } => {
                cli::accounts::set_mapping(&account, &file)
            }
            AccountsCommands::ShowMapping { account } => cli::accounts::show_mapping(&account),
        },
        Commands::Import { file, account } => cli::import::run(&file, &account),
        Commands::Reprocess { account } => cli::import::reprocess(&account),
        Commands::Classifications { command } => match command {
            ClassificationsCommands::List => cli::taxonomies::list(),
            ClassificationsCommands::SetKind { id, kind } => cli::taxonomies::set_kind(id, &kind),
        },
        Commands::Report { command } => match command {
            ReportCommands::Summary {
                from_date,
                to_date,
                account,
                json,
            } => cli::report::summary(from_date, to_date, account, json),
            ReportCommands::Monthly { year, account, json } => {
                cli::report::monthly(year, account, json)
            }
        },
        Commands::Export { output } => cli::export::run(output),
        Commands::Statements { command } => match command {
            StatementsCommands::Add {
                account,
                period_end,
                period_start,
                opening,
                closing,
            } => cli::statements::add(
                &account,
                &period_end,
                period_start.as_deref(),
                opening.as_deref(),
                closing.as_deref(),
            ),
            StatementsCommands::List { account } => cli::statements::list(account.as_deref()),
        },
        Commands::Admin { command } => match command {
            AdminCommands::SeedClassifications { dry_run, yes } => {
                cli::admin::seed_classifications(dry_run, yes)
            }
            AdminCommands::ShiftPeriodEnd {
                days,
                account,
                dry_run,
                yes,
            } => cli::admin::shift_period_end_cmd(days, account.as_deref(), dry_run, yes),
            AdminCommands::BackfillStatementStarts { account, dry_run, yes } => {
                cli::admin::backfill_statement_starts(account.as_deref(), dry_run, yes)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
