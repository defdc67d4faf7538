use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{ClassificationKind, LocationClassification, STANDARD_SIGN_TYPES};

/// Reserved category label for inter-account transfers.
pub const TRANSFER_CATEGORY: &str = "N/A";

const CHUNK_SIZE: usize = 500;

/// Infer a classification kind from the owning account's type and the
/// transaction amount's sign. Unknown account types default to expense.
pub fn infer_kind(account_type: &str, amount: Option<Decimal>) -> ClassificationKind {
    if STANDARD_SIGN_TYPES.contains(&account_type) {
        if let Some(a) = amount {
            if a > Decimal::ZERO {
                return ClassificationKind::Income;
            }
        }
        return ClassificationKind::Expense;
    }
    ClassificationKind::Expense
}

// ---------------------------------------------------------------------------
// Plan (read-only scan + vote resolution)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TypeConflict {
    pub category: String,
    pub resolved: ClassificationKind,
    /// Vote tallies, highest first.
    pub votes: Vec<(ClassificationKind, u64)>,
}

#[derive(Debug)]
pub struct BackfillPlan {
    /// category → winning kind, every category seen in history.
    pub resolved: BTreeMap<String, ClassificationKind>,
    /// category → its non-blank subcategories.
    pub subcategories: BTreeMap<String, BTreeSet<String>>,
    pub conflicts: Vec<TypeConflict>,
}

/// Scan the full transaction history and resolve every category to a single
/// kind by plurality vote. Performs no writes; the dry-run mode reports
/// straight from this plan.
pub fn build_plan(conn: &Connection) -> Result<BackfillPlan> {
    let mut stmt = conn.prepare(
        "SELECT t.category, t.subcategory, t.amount, a.account_type \
         FROM transactions t JOIN accounts a ON t.account_id = a.id",
    )?;
    let rows: Vec<(Option<String>, Option<String>, Option<String>, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut votes: BTreeMap<String, BTreeMap<ClassificationKind, u64>> = BTreeMap::new();
    let mut subcategories: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (category, subcategory, amount, account_type) in &rows {
        let Some(cat) = category.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };

        let subs = subcategories.entry(cat.to_string()).or_default();
        if let Some(sub) = subcategory.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            subs.insert(sub.to_string());
        }

        let kind = if cat == TRANSFER_CATEGORY {
            ClassificationKind::Transfer
        } else {
            let amount = amount.as_deref().and_then(|a| a.parse::<Decimal>().ok());
            infer_kind(account_type, amount)
        };
        *votes.entry(cat.to_string()).or_default().entry(kind).or_insert(0) += 1;
    }

    let mut resolved = BTreeMap::new();
    let mut conflicts = Vec::new();
    for (cat, tally) in &votes {
        let mut ranked: Vec<(ClassificationKind, u64)> =
            tally.iter().map(|(k, n)| (*k, *n)).collect();
        // Highest count wins; ties break on kind name so reruns are stable
        ranked.sort_by_key(|(k, n)| (Reverse(*n), k.as_str()));
        let winner = ranked[0].0;
        resolved.insert(cat.clone(), winner);
        if ranked.len() > 1 {
            conflicts.push(TypeConflict {
                category: cat.clone(),
                resolved: winner,
                votes: ranked,
            });
        }
    }

    Ok(BackfillPlan {
        resolved,
        subcategories,
        conflicts,
    })
}

// ---------------------------------------------------------------------------
// Taxonomy cache
// ---------------------------------------------------------------------------

/// Name-keyed lookup for the run, loaded once so repeated get-or-create calls
/// never round-trip to the store for a name already seen.
pub struct TaxonomyCache {
    classifications: HashMap<String, LocationClassification>,
    subclassifications: HashMap<(i64, String), i64>,
}

impl TaxonomyCache {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut classifications = HashMap::new();
        let mut stmt = conn.prepare("SELECT id, name, kind FROM location_classifications")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (id, name, kind) = row?;
            let kind = ClassificationKind::parse(&kind).unwrap_or(ClassificationKind::Expense);
            classifications.insert(name.clone(), LocationClassification { id, name, kind });
        }

        let mut subclassifications = HashMap::new();
        let mut stmt = conn
            .prepare("SELECT id, location_classification_id, name FROM location_subclassifications")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (id, lc_id, name) = row?;
            subclassifications.insert((lc_id, name), id);
        }

        Ok(Self {
            classifications,
            subclassifications,
        })
    }

    /// Returns (classification, created). An existing row keeps its kind even
    /// when the inferred kind disagrees.
    pub fn get_or_create_classification(
        &mut self,
        conn: &Connection,
        name: &str,
        kind: ClassificationKind,
    ) -> Result<(LocationClassification, bool)> {
        if let Some(existing) = self.classifications.get(name) {
            return Ok((existing.clone(), false));
        }
        conn.execute(
            "INSERT INTO location_classifications (name, kind) VALUES (?1, ?2)",
            rusqlite::params![name, kind.as_str()],
        )?;
        let lc = LocationClassification {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            kind,
        };
        self.classifications.insert(name.to_string(), lc.clone());
        Ok((lc, true))
    }

    pub fn get_or_create_subclassification(
        &mut self,
        conn: &Connection,
        lc_id: i64,
        name: &str,
    ) -> Result<(i64, bool)> {
        let key = (lc_id, name.to_string());
        if let Some(id) = self.subclassifications.get(&key) {
            return Ok((*id, false));
        }
        conn.execute(
            "INSERT INTO location_subclassifications (location_classification_id, name) VALUES (?1, ?2)",
            rusqlite::params![lc_id, name],
        )?;
        let id = conn.last_insert_rowid();
        self.subclassifications.insert(key, id);
        Ok((id, true))
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BackfillOutcome {
    pub created_classifications: Vec<(String, ClassificationKind)>,
    /// (name, existing kind, inferred kind) where the two disagree.
    pub kept_existing: Vec<(String, ClassificationKind, ClassificationKind)>,
    pub created_subclassifications: usize,
    pub backfilled: usize,
    pub skipped_blank: usize,
}

/// Create missing taxonomy rows and backfill classification FKs on every
/// transaction still lacking one. Taxonomy creation runs in one transaction;
/// FK updates are chunked with one transaction per chunk.
pub fn execute_plan(conn: &Connection, plan: &BackfillPlan) -> Result<BackfillOutcome> {
    let mut cache = TaxonomyCache::load(conn)?;
    let mut outcome = BackfillOutcome::default();

    let mut cat_to_lc: HashMap<String, i64> = HashMap::new();
    let mut pair_to_lsc: HashMap<(String, String), i64> = HashMap::new();

    {
        let txn = conn.unchecked_transaction()?;
        for (cat, inferred) in &plan.resolved {
            let (lc, created) = cache.get_or_create_classification(conn, cat, *inferred)?;
            if created {
                outcome.created_classifications.push((cat.clone(), lc.kind));
            } else if lc.kind != *inferred {
                outcome.kept_existing.push((cat.clone(), lc.kind, *inferred));
            }
            cat_to_lc.insert(cat.clone(), lc.id);
        }

        for (cat, subs) in &plan.subcategories {
            let Some(lc_id) = cat_to_lc.get(cat).copied() else { continue };
            for sub in subs {
                let (lsc_id, created) = cache.get_or_create_subclassification(conn, lc_id, sub)?;
                if created {
                    outcome.created_subclassifications += 1;
                }
                pair_to_lsc.insert((cat.clone(), sub.clone()), lsc_id);
            }
        }
        txn.commit()?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, category, subcategory FROM transactions \
         WHERE location_classification_id IS NULL ORDER BY id",
    )?;
    let pending: Vec<(i64, Option<String>, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut updates: Vec<(i64, i64, Option<i64>)> = Vec::new();
    for (tx_id, category, subcategory) in &pending {
        let Some(cat) = category.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            outcome.skipped_blank += 1;
            continue;
        };
        let Some(lc_id) = cat_to_lc.get(cat).copied() else { continue };
        let lsc_id = subcategory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|sub| pair_to_lsc.get(&(cat.to_string(), sub.to_string())).copied());
        updates.push((*tx_id, lc_id, lsc_id));
    }

    for chunk in updates.chunks(CHUNK_SIZE) {
        let txn = conn.unchecked_transaction()?;
        for (tx_id, lc_id, lsc_id) in chunk {
            conn.execute(
                "UPDATE transactions SET location_classification_id = ?1, \
                 location_subclassification_id = ?2 WHERE id = ?3",
                rusqlite::params![lc_id, lsc_id, tx_id],
            )?;
        }
        txn.commit()?;
        outcome.backfilled += chunk.len();
    }

    Ok(outcome)
}
