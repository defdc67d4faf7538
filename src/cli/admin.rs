use colored::Colorize;
use dialoguer::Confirm;
use rusqlite::Connection;

use crate::classify::{build_plan, execute_plan};
use crate::db::{get_account, get_connection};
use crate::error::{BursarError, Result};
use crate::settings::db_path;
use crate::statements::{backfill_period_starts, shift_period_end};

fn confirm_or_abort(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let proceed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| BursarError::Other(e.to_string()))?;
    if !proceed {
        println!("Aborted.");
    }
    Ok(proceed)
}

fn resolve_account(conn: &Connection, account: Option<&str>) -> Result<Option<i64>> {
    account.map(|name| get_account(conn, name).map(|a| a.id)).transpose()
}

fn scope_label(account: Option<&str>) -> String {
    match account {
        Some(name) => format!("account '{name}'"),
        None => "all accounts".to_string(),
    }
}

// ---------------------------------------------------------------------------
// seed-classifications
// ---------------------------------------------------------------------------

pub fn seed_classifications(dry_run: bool, yes: bool) -> Result<()> {
    let conn = get_connection(&db_path())?;

    println!("Scanning transactions\u{2026}");
    let plan = build_plan(&conn)?;
    println!("  Found {} unique categories.", plan.resolved.len());

    if !plan.conflicts.is_empty() {
        println!(
            "\n{}",
            format!(
                "  {} category/categories had conflicting kind votes \
                 (plurality used, recommend manual audit):",
                plan.conflicts.len()
            )
            .yellow()
        );
        for conflict in &plan.conflicts {
            let votes = conflict
                .votes
                .iter()
                .map(|(k, n)| format!("{}={n}", k.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "    '{}' \u{2192} {} ({votes})",
                conflict.category,
                conflict.resolved.as_str()
            );
        }
        println!();
    }

    if dry_run {
        println!("Proposed location classifications:");
        for (cat, kind) in &plan.resolved {
            println!("  [{}] '{cat}'", kind.as_str());
            if let Some(subs) = plan.subcategories.get(cat) {
                for sub in subs {
                    println!("      > '{sub}'");
                }
            }
        }
        println!("\n{}", "Dry run \u{2014} no changes written.".yellow());
        return Ok(());
    }

    let prompt = format!(
        "Create/link {} classifications and backfill transaction references?",
        plan.resolved.len()
    );
    if !confirm_or_abort(&prompt, yes)? {
        return Ok(());
    }

    let outcome = execute_plan(&conn, &plan)?;
    for (name, kind) in &outcome.created_classifications {
        println!("  CREATED [{}] '{name}'", kind.as_str());
    }
    for (name, existing, inferred) in &outcome.kept_existing {
        println!(
            "  EXISTS  [{}] '{name}' (inferred {}, kept existing)",
            existing.as_str(),
            inferred.as_str()
        );
    }
    println!(
        "\nDone. {} classification(s) created, {} subclassification(s) created, \
         {} transaction(s) back-filled, {} skipped (blank category).",
        outcome.created_classifications.len(),
        outcome.created_subclassifications,
        outcome.backfilled,
        outcome.skipped_blank
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// shift-period-end
// ---------------------------------------------------------------------------

pub fn shift_period_end_cmd(
    days: i64,
    account: Option<&str>,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account_id = resolve_account(&conn, account)?;
    let direction = if days > 0 { format!("+{days}") } else { days.to_string() };

    println!(
        "Scanning statements ({}), shifting period_end by {direction} days\u{2026}",
        scope_label(account)
    );

    if dry_run {
        let outcome = shift_period_end(&conn, days, account_id, true)?;
        for item in &outcome.planned {
            println!(
                "  WOULD UPDATE  statement {} (account {}): period_end {} \u{2192} {}",
                item.statement_id, item.account_id, item.old_end, item.new_end
            );
        }
        println!(
            "\n{}",
            format!(
                "Dry run \u{2014} no changes written. {} statement(s) would be updated.",
                outcome.planned.len()
            )
            .yellow()
        );
        return Ok(());
    }

    if !confirm_or_abort(&format!("Shift statement period_end dates by {direction} days?"), yes)? {
        return Ok(());
    }
    let outcome = shift_period_end(&conn, days, account_id, false)?;
    println!(
        "\nDone. {} statement(s) updated (period_end shifted by {direction} days).",
        outcome.updated
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// backfill-statement-starts
// ---------------------------------------------------------------------------

pub fn backfill_statement_starts(account: Option<&str>, dry_run: bool, yes: bool) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let account_id = resolve_account(&conn, account)?;

    println!(
        "Scanning statements with no period_start ({})\u{2026}",
        scope_label(account)
    );

    if dry_run {
        let outcome = backfill_period_starts(&conn, account_id, true)?;
        for item in &outcome.planned {
            println!(
                "  WOULD SET  statement {} (account {}): period_start = {} ({}d gap)",
                item.statement_id, item.account_id, item.period_start, item.gap_days
            );
        }
        println!(
            "\n{}",
            format!(
                "Dry run \u{2014} no changes written.\n  Would update:             {}\n  \
                 Skipped (no predecessor): {}\n  Skipped (gap > 32 days):  {}",
                outcome.planned.len(),
                outcome.skipped_no_predecessor,
                outcome.skipped_gap
            )
            .yellow()
        );
        return Ok(());
    }

    if !confirm_or_abort("Backfill missing statement period_start dates?", yes)? {
        return Ok(());
    }
    let outcome = backfill_period_starts(&conn, account_id, false)?;
    println!(
        "\nDone. {} statement(s) backfilled. Skipped {} (no predecessor), {} (gap > 32 days).",
        outcome.updated, outcome.skipped_no_predecessor, outcome.skipped_gap
    );
    Ok(())
}
