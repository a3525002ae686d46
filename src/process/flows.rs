// src/process/flows.rs
use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use tracing::debug;

use super::respondents::{states, string_column};
use super::utils::parse_code;
use crate::error::SchemaError;
use crate::period::{Period, STATE_CODES};
use crate::reference::LegalStatusTable;

/// Sparse count of respondents by (current state, prior state).
///
/// Rows are the current state (`ent`), columns the stringified prior-state
/// code (`p3p2`). Pairs that never occur are absent rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatrix {
    rows: BTreeMap<i64, BTreeMap<String, u64>>,
}

impl FlowMatrix {
    /// Count prior-residence responses. Blank, unparseable and out-of-range
    /// prior-state codes are not valid origins and are left out.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self, SchemaError> {
        let prior = string_column(batch, "p3p2")?;
        let current = states(batch)?;

        let mut matrix = FlowMatrix::default();
        let mut invalid_origin = 0usize;
        for (row, state) in current.into_iter().enumerate() {
            let Some(state) = state else { continue };
            if prior.is_null(row) {
                continue;
            }
            match parse_code(prior.value(row)).filter(|c| STATE_CODES.contains(c)) {
                Some(origin) => matrix.add(state, origin, 1),
                None => invalid_origin += 1,
            }
        }
        if invalid_origin > 0 {
            debug!(invalid_origin, "prior-residence codes outside 1..=32 treated as missing");
        }
        Ok(matrix)
    }

    pub fn add(&mut self, current: i64, prior: i64, count: u64) {
        *self
            .rows
            .entry(current)
            .or_default()
            .entry(prior.to_string())
            .or_insert(0) += count;
    }

    #[cfg(test)]
    pub fn get(&self, current: i64, prior: &str) -> Option<u64> {
        self.rows.get(&current)?.get(prior).copied()
    }

    /// Sum of `current`'s row over the requested columns. Columns absent from
    /// this quarter's matrix, and rows absent altogether, contribute zero.
    pub fn row_sum<S: AsRef<str>>(&self, current: i64, columns: &[S]) -> u64 {
        let Some(row) = self.rows.get(&current) else {
            return 0;
        };
        columns
            .iter()
            .filter_map(|c| row.get(c.as_ref()))
            .sum()
    }

    /// Observed prior-state labels, ascending.
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .rows
            .values()
            .flat_map(|r| r.keys().cloned())
            .collect();
        cols.sort_by_key(|c| c.parse::<i64>().unwrap_or(i64::MAX));
        cols.dedup();
        cols
    }

    pub fn total(&self) -> u64 {
        self.rows.values().flat_map(|r| r.values()).sum()
    }
}

/// Inbound flows of one destination state in one quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFlow {
    pub state: i64,
    /// Destination's own legal status at the survey's fractional date.
    pub equal_marriage: bool,
    /// Arrivals whose prior state had legalized by the survey quarter.
    pub from_equal: u64,
    /// Arrivals whose prior state had not.
    pub from_non_equal: u64,
}

/// Dense 1..=32 summary of a quarter's flow matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSummary {
    pub rows: Vec<StateFlow>,
}

impl FlowSummary {
    #[cfg(test)]
    pub fn get(&self, state: i64) -> Option<&StateFlow> {
        self.rows.iter().find(|r| r.state == state)
    }
}

/// Summarize a flow matrix against legal status as of `period`.
pub fn summarize(matrix: &FlowMatrix, legal: &LegalStatusTable, period: Period) -> FlowSummary {
    let date = period.fractional_date();
    let partition = legal.partition(date);
    let rows = STATE_CODES
        .map(|state| StateFlow {
            state,
            equal_marriage: legal.is_legal_as_of(state, date),
            from_equal: matrix.row_sum(state, &partition.legal),
            from_non_equal: matrix.row_sum(state, &partition.non_legal),
        })
        .collect();
    FlowSummary { rows }
}

/// Build the origin-classified flow summary for one quarter.
pub fn build_flows(
    batch: &RecordBatch,
    legal: &LegalStatusTable,
    period: Period,
) -> Result<FlowSummary, SchemaError> {
    let matrix = FlowMatrix::from_batch(batch)?;
    debug!(
        %period,
        destinations = matrix.rows.len(),
        origins = matrix.columns().len(),
        movers = matrix.total(),
        "built flow matrix"
    );
    Ok(summarize(&matrix, legal, period))
}
