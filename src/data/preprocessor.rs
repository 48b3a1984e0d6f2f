// ============================================================
// Layer 4 — Preprocessor (curated → processed layer)
// ============================================================
// Turns a raw activity table into model-ready columns and the
// feature schema that freezes them.
//
// Steps (applied in order):
//   1. Check required columns
//   2. Parse obs_end_date; any bad value aborts
//   3. Coerce the churn label to 0/1, null → 0
//   4. Drop leakage columns
//   5. Engineer activated_800, obs_month, obs_dow
//   6. Fill numeric nulls with 0, category nulls with "unknown"
//   7. Drop stray text columns
//   8. One-hot encode primary_model_7d (drop-first)
//   9. Derive the FeatureSchema from the resulting columns

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};

use crate::data::table::{Column, ColumnData, Table};
use crate::domain::schema::{dummy_column, FeatureSchema, FieldSpec, ObservedRange};

pub const ID_COL: &str = "user_id";
pub const DATE_COL: &str = "obs_end_date";
pub const LABEL_COL: &str = "churned_14d";
pub const TOKENS_COL: &str = "tokens_per_session_7d";
pub const CATEGORY_COL: &str = "primary_model_7d";

pub const REQUIRED_COLUMNS: [&str; 5] = [ID_COL, DATE_COL, LABEL_COL, TOKENS_COL, CATEGORY_COL];

/// Only known after the observation window closes.
pub const LEAKAGE_COLUMNS: [&str; 1] = ["unsubscribe_ts"];

pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Users averaging at least this many tokens per session count as activated.
pub const ACTIVATION_TOKENS: f64 = 800.0;

/// Output of the preprocessor: the processed table, the parsed
/// observation dates (row-aligned) and the frozen schema.
#[derive(Debug, Clone)]
pub struct ProcessedLayer {
    pub table:  Table,
    pub dates:  Vec<NaiveDate>,
    pub schema: FeatureSchema,
}

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, mut table: Table) -> Result<ProcessedLayer> {
        // ── Step 1: required columns ──────────────────────────────────────────
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !table.has_column(c))
            .collect();
        if !missing.is_empty() {
            bail!("Missing required columns: {missing:?}");
        }

        // ── Step 2: observation dates ─────────────────────────────────────────
        let dates = parse_dates(&table)?;
        table.set_column(Column::text(
            DATE_COL,
            dates.iter().map(|d| Some(d.format("%Y-%m-%d").to_string())).collect(),
        ))?;

        // ── Step 3: label ─────────────────────────────────────────────────────
        let label = numeric_filled(&table, LABEL_COL)?
            .into_iter()
            .map(|v| Some(v.trunc()))
            .collect();
        table.set_column(Column::numeric(LABEL_COL, label))?;

        // ── Step 4: leakage ───────────────────────────────────────────────────
        for col in LEAKAGE_COLUMNS {
            if table.drop_column(col).is_some() {
                tracing::info!("Dropped leakage column '{col}'");
            }
        }

        // ── Step 5: engineered features ───────────────────────────────────────
        let tokens = numeric_filled(&table, TOKENS_COL)?;
        let activated = tokens
            .iter()
            .map(|&t| Some(if t >= ACTIVATION_TOKENS { 1.0 } else { 0.0 }))
            .collect();
        table.set_column(Column::numeric(TOKENS_COL, tokens.into_iter().map(Some).collect()))?;
        table.set_column(Column::numeric("activated_800", activated))?;
        table.set_column(Column::numeric(
            "obs_month",
            dates.iter().map(|d| Some(d.month() as f64)).collect(),
        ))?;
        table.set_column(Column::numeric(
            "obs_dow",
            dates.iter().map(|d| Some(d.weekday().num_days_from_monday() as f64)).collect(),
        ))?;

        // ── Step 6: missing values ────────────────────────────────────────────
        let numeric_names: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| c.data.is_numeric())
            .map(|c| c.name.clone())
            .collect();
        for name in numeric_names {
            let filled = numeric_filled(&table, &name)?.into_iter().map(Some).collect();
            table.set_column(Column::numeric(name, filled))?;
        }

        let categories: Vec<String> = table
            .column(CATEGORY_COL)
            .map(|c| c.data.to_text())
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()))
            .collect();

        // ── Step 7: stray text columns ────────────────────────────────────────
        let stray: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !c.data.is_numeric())
            .map(|c| c.name.clone())
            .filter(|n| n != ID_COL && n != DATE_COL && n != CATEGORY_COL)
            .collect();
        for name in stray {
            tracing::warn!("Dropping non-numeric column '{name}'");
            table.drop_column(&name);
        }

        // ── Step 8: one-hot encoding ──────────────────────────────────────────
        table.drop_column(CATEGORY_COL);
        let mut levels = categories.clone();
        levels.sort();
        levels.dedup();
        for level in levels.iter().skip(1) {
            let dummy = categories
                .iter()
                .map(|c| Some(if c == level { 1.0 } else { 0.0 }))
                .collect();
            table
                .push_column(Column::numeric(dummy_column(CATEGORY_COL, level), dummy))
                .with_context(|| format!("one-hot column for '{level}' collides with an existing column"))?;
        }

        // ── Step 9: schema ────────────────────────────────────────────────────
        let schema = derive_schema(&table, levels)?;
        tracing::info!(
            "Processed layer: {} rows, {} encoded features",
            table.n_rows(),
            schema.encoded_width()
        );

        Ok(ProcessedLayer { table, dates, schema })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_obs_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_dates(table: &Table) -> Result<Vec<NaiveDate>> {
    let raw = table
        .column(DATE_COL)
        .map(|c| c.data.to_text())
        .unwrap_or_default();
    let parsed: Vec<Option<NaiveDate>> = raw.iter().map(|v| v.as_deref().and_then(parse_obs_date)).collect();
    let bad = parsed.iter().filter(|d| d.is_none()).count();
    if bad > 0 {
        bail!("{DATE_COL} has {bad} unparsable values.");
    }
    Ok(parsed.into_iter().flatten().collect())
}

/// Coerce a column to numbers, nulls and unparsable text → 0.
fn numeric_filled(table: &Table, name: &str) -> Result<Vec<f64>> {
    let col = table
        .column(name)
        .with_context(|| format!("column '{name}' not found"))?;
    Ok(col.data.to_numeric().into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

/// Integer flag and enforced bounds for the fields we know.
fn known_bounds(name: &str) -> (bool, Option<f64>, Option<f64>) {
    match name {
        "activated_800" => (true, Some(0.0), Some(1.0)),
        "obs_month" => (true, Some(1.0), Some(12.0)),
        "obs_dow" => (true, Some(0.0), Some(6.0)),
        "active_days_7d" => (true, Some(0.0), Some(7.0)),
        "sessions_7d" => (true, Some(0.0), None),
        "tokens_per_session_7d" | "avg_turns_per_session_7d" | "avg_latency_ms_7d" => {
            (false, Some(0.0), None)
        }
        n if n.ends_with("_rate_7d") => (false, Some(0.0), Some(1.0)),
        _ => (false, None, None),
    }
}

fn observed_range(values: &[Option<f64>]) -> Option<ObservedRange> {
    let mut it = values.iter().flatten().copied();
    let first = it.next()?;
    let (min, max) = it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(ObservedRange { min, max })
}

fn derive_schema(table: &Table, levels: Vec<String>) -> Result<FeatureSchema> {
    let dummies: Vec<String> = levels.iter().skip(1).map(|l| dummy_column(CATEGORY_COL, l)).collect();
    let mut fields = Vec::new();

    for col in table.columns() {
        let name = col.name.as_str();
        if name == ID_COL || name == DATE_COL || name == LABEL_COL || dummies.iter().any(|d| d == name) {
            continue;
        }
        if let ColumnData::Numeric(values) = &col.data {
            let (integer, min, max) = known_bounds(name);
            let mut spec = FieldSpec::numeric(name)
                .bounded(min, max)
                .with_observed(observed_range(values));
            if integer {
                spec = spec.integer();
            }
            fields.push(spec);
        }
    }
    fields.push(FieldSpec::categorical(CATEGORY_COL, levels));

    Ok(FeatureSchema::new(LABEL_COL, fields)?)
}
