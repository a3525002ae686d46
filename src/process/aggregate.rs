// src/process/aggregate.rs
use arrow::array::{Array, Float64Array, Float64Builder};
use arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

use super::respondents::{states, string_column};
use super::utils::parse_numeric;
use crate::error::{RecodeError, SchemaError};
use crate::period::{state_index, STATE_CODES, STATE_COUNT};

/// How a survey code becomes an indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recode {
    /// Yes/no codes 1/2 flipped into a 0/1 dummy: `2 - value`.
    Binary,
    /// Continuous values used as they are.
    Identity,
}

impl Recode {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Recode::Binary => 2.0 - value,
            Recode::Identity => value,
        }
    }
}

/// Mean indicator per state, dense over 1..=32. `None` means the state had
/// no respondent with a usable value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRates {
    rates: [Option<f64>; STATE_COUNT],
}

impl StateRates {
    pub fn get(&self, state: i64) -> Option<f64> {
        state_index(state).and_then(|i| self.rates[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Option<f64>)> + '_ {
        STATE_CODES.zip(self.rates.iter().copied())
    }
}

/// Coerce a string code column to numbers and apply `recode`.
///
/// Blank cells are missing. Non-numeric residue is also coerced to missing;
/// its extent is returned so the caller can decide whether to warn.
pub fn recode_column(
    batch: &RecordBatch,
    column: &str,
    recode: Recode,
) -> Result<(Float64Array, Option<RecodeError>), SchemaError> {
    let codes = string_column(batch, column)?;
    let mut builder = Float64Builder::with_capacity(codes.len());
    let mut residue = 0usize;
    let mut non_blank = 0usize;
    for i in 0..codes.len() {
        if codes.is_null(i) {
            builder.append_null();
            continue;
        }
        non_blank += 1;
        match parse_numeric(codes.value(i)) {
            Some(v) => builder.append_value(recode.apply(v)),
            None => {
                residue += 1;
                builder.append_null();
            }
        }
    }
    let report = (residue > 0).then(|| RecodeError {
        column: column.to_string(),
        residue,
        total: non_blank,
    });
    Ok((builder.finish(), report))
}

/// Group-mean of a recoded column by state of residence.
///
/// Missing values are excluded from both numerator and denominator;
/// independently for every indicator.
pub fn aggregate(
    batch: &RecordBatch,
    column: &str,
    recode: Recode,
    tolerance: f64,
) -> Result<StateRates, SchemaError> {
    let (values, report) = recode_column(batch, column, recode)?;
    if let Some(err) = report {
        if err.share() > tolerance {
            warn!(error = %err, share = err.share(), "non-numeric codes coerced to missing");
        } else {
            debug!(error = %err, "non-numeric codes coerced to missing");
        }
    }

    let mut sums = [0.0f64; STATE_COUNT];
    let mut counts = [0usize; STATE_COUNT];
    for (row, state) in states(batch)?.into_iter().enumerate() {
        let Some(idx) = state.and_then(state_index) else {
            continue;
        };
        if values.is_null(row) {
            continue;
        }
        sums[idx] += values.value(row);
        counts[idx] += 1;
    }

    let mut rates = [None; STATE_COUNT];
    for i in 0..STATE_COUNT {
        if counts[i] > 0 {
            rates[i] = Some(sums[i] / counts[i] as f64);
        }
    }
    Ok(StateRates { rates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::raw_table::RawTable;
    use crate::process::respondents::to_record_batch;

    fn batch(rows: &[(&str, &str)]) -> RecordBatch {
        let table = RawTable::new(
            vec!["ent".into(), "code".into()],
            rows.iter()
                .map(|(e, c)| vec![e.to_string(), c.to_string()])
                .collect(),
        );
        to_record_batch(&table).expect("valid batch")
    }

    #[test]
    fn binary_recode_flips_yes_no() {
        assert_eq!(Recode::Binary.apply(1.0), 1.0);
        assert_eq!(Recode::Binary.apply(2.0), 0.0);
        assert_eq!(Recode::Identity.apply(4500.0), 4500.0);
    }

    #[test]
    fn missing_values_leave_the_denominator() -> Result<(), SchemaError> {
        let b = batch(&[("1", "1"), ("1", "2"), ("1", " "), ("1", "x"), ("2", "1")]);
        let rates = aggregate(&b, "code", Recode::Binary, 0.05)?;
        assert_eq!(rates.get(1), Some(0.5));
        assert_eq!(rates.get(2), Some(1.0));
        Ok(())
    }

    #[test]
    fn output_is_dense_with_missing_for_absent_states() -> Result<(), SchemaError> {
        let b = batch(&[("5", "1000"), ("5", "3000"), ("7", ""), ("40", "10")]);
        let rates = aggregate(&b, "code", Recode::Identity, 0.05)?;
        assert_eq!(rates.iter().count(), 32);
        assert_eq!(rates.get(5), Some(2000.0));
        // a state whose respondents are all missing yields a missing rate, not zero
        assert_eq!(rates.get(7), None);
        assert_eq!(rates.get(1), None);
        Ok(())
    }

    #[test]
    fn residue_is_reported_not_fatal() -> Result<(), SchemaError> {
        let b = batch(&[("1", "1"), ("1", "abc"), ("1", "")]);
        let (values, report) = recode_column(&b, "code", Recode::Binary)?;
        assert_eq!(values.len(), 3);
        assert!(values.is_null(1));
        assert!(values.is_null(2));
        assert_eq!(
            report,
            Some(RecodeError {
                column: "code".into(),
                residue: 1,
                total: 2
            })
        );
        Ok(())
    }
}
