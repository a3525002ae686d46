// src/process/mod.rs
pub mod aggregate;
pub mod flows;
pub mod harmonize;
pub mod raw_table;
pub mod respondents;
pub mod utils;

use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

use crate::error::SchemaError;
use crate::period::Period;
use crate::reference::Reference;
use aggregate::{aggregate, Recode, StateRates};
use flows::{build_flows, FlowSummary};
use harmonize::harmonize;
use raw_table::RawTable;
use respondents::to_record_batch;

/// Knobs the per-quarter computation reads from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarterOptions {
    pub min_age: f64,
    pub recode_tolerance: f64,
}

/// Everything computed for one wave, before it is laid out as panel rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterIndicators {
    pub period: Period,
    pub respondents: usize,
    /// Share of respondents reporting a move (`p3o`).
    pub migration: StateRates,
    /// Share employed (`p1`).
    pub employment: StateRates,
    /// Mean income code (`p6b2`).
    pub income: StateRates,
    pub flows: FlowSummary,
}

/// Run harmonization, aggregation and the flow matrix for one wave whose
/// two extracts are already on disk.
#[instrument(level = "info", skip_all, fields(period = %period))]
pub fn build_quarter(
    period: Period,
    coe1: &Path,
    coe2: &Path,
    reference: &Reference,
    opts: QuarterOptions,
) -> Result<QuarterIndicators, SchemaError> {
    let start = Instant::now();
    let canonical = &reference.columns;
    let keep = |h: &str| canonical.contains(&h.to_lowercase());

    let left = RawTable::read_projected(coe1, keep)?;
    let right = RawTable::read_projected(coe2, keep)?;
    let joined = harmonize(&left, &right, canonical, opts.min_age)?;
    drop(left);
    drop(right);

    let batch = to_record_batch(&joined)?;
    drop(joined);

    let migration = aggregate(&batch, "p3o", Recode::Binary, opts.recode_tolerance)?;
    let employment = aggregate(&batch, "p1", Recode::Binary, opts.recode_tolerance)?;
    let income = aggregate(&batch, "p6b2", Recode::Identity, opts.recode_tolerance)?;
    let flows = build_flows(&batch, &reference.legal, period)?;

    info!(
        respondents = batch.num_rows(),
        elapsed = ?start.elapsed(),
        "computed quarter indicators"
    );
    Ok(QuarterIndicators {
        period,
        respondents: batch.num_rows(),
        migration,
        employment,
        income,
        flows,
    })
}
