// ============================================================
// Layer 4 — Time-based Splitter
// ============================================================
// Orders rows by observation date and cuts them into three
// consecutive blocks:
//   - Train:      oldest rows, used to fit the model
//   - Validation: next block, used for early checks
//   - Test:       newest rows, held out for the final report
//
// Rows are never shuffled across the boundaries: a model is
// always evaluated on weeks it has not seen.
//
// Cut points (n rows, sorted by date):
//   train = [0, floor(n * 0.70))
//   val   = [floor(n * 0.70), floor(n * 0.85))
//   test  = [floor(n * 0.85), n)
//
// The sort is stable, so rows sharing a date keep their
// original order.

use anyhow::{bail, Result};
use chrono::NaiveDate;

use crate::data::table::Table;

pub const TRAIN_FRACTION: f64 = 0.70;
pub const VAL_END_FRACTION: f64 = 0.85;

/// Row indices of each block, in date order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub val:   Vec<usize>,
    pub test:  Vec<usize>,
}

/// The three blocks as tables.
#[derive(Debug, Clone)]
pub struct TimeSplit {
    pub train: Table,
    pub val:   Table,
    pub test:  Table,
}

/// Compute the cut with custom fractions.
/// `train_fraction <= val_end_fraction`, both within [0, 1].
pub fn time_split_indices(
    dates:            &[NaiveDate],
    train_fraction:   f64,
    val_end_fraction: f64,
) -> Result<SplitIndices> {
    if !(0.0..=1.0).contains(&train_fraction)
        || !(0.0..=1.0).contains(&val_end_fraction)
        || train_fraction > val_end_fraction
    {
        bail!("invalid split fractions: train={train_fraction}, val_end={val_end_fraction}");
    }

    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);

    let n         = order.len();
    let train_end = ((n as f64) * train_fraction).floor() as usize;
    let val_end   = ((n as f64) * val_end_fraction).floor() as usize;

    let test  = order.split_off(val_end.min(n));
    let val   = order.split_off(train_end.min(order.len()));
    let train = order;

    tracing::debug!(
        "Time split: {} train, {} validation, {} test",
        train.len(),
        val.len(),
        test.len(),
    );

    Ok(SplitIndices { train, val, test })
}

/// Split a processed table with the standard 70 / 15 / 15 cut.
/// `dates` must be row-aligned with `table`.
pub fn time_split(table: &Table, dates: &[NaiveDate]) -> Result<TimeSplit> {
    if dates.len() != table.n_rows() {
        bail!("{} dates for {} rows", dates.len(), table.n_rows());
    }
    let idx = time_split_indices(dates, TRAIN_FRACTION, VAL_END_FRACTION)?;
    Ok(TimeSplit {
        train: table.take_rows(&idx.train),
        val:   table.take_rows(&idx.val),
        test:  table.take_rows(&idx.test),
    })
}
