// src/reference/legal.rs

use csv::ReaderBuilder;
use serde::Deserialize;
use std::{collections::BTreeMap, io::Read, path::Path};
use tracing::{debug, warn};

use crate::error::ReferenceError;
use crate::period::{FractionalDate, STATE_CODES};
use crate::process::utils::{is_blank, parse_code};

/// One row of the legalization reference file. Extra columns are ignored and
/// blank dates mean the state has not legalized.
#[derive(Debug, Deserialize)]
struct LegalRecord {
    cve: String,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    month: Option<String>,
}

/// Integer cell that may be blank. Spreadsheet exports write `2010.0`, which
/// is accepted; anything else non-numeric is rejected.
fn optional_code(raw: Option<&str>, name: &str) -> Result<Option<i64>, String> {
    match raw {
        None => Ok(None),
        Some(v) if is_blank(v) => Ok(None),
        Some(v) => parse_code(v)
            .map(Some)
            .ok_or_else(|| format!("{} '{}' is not an integer", name, v)),
    }
}

/// First marriage-equality date per state, encoded as a [`FractionalDate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegalStatusTable {
    effective: BTreeMap<i64, FractionalDate>,
}

/// Origin states split by legal status at a given fractional date. Labels are
/// the stringified state codes used as flow-matrix columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPartition {
    pub legal: Vec<String>,
    pub non_legal: Vec<String>,
}

impl LegalStatusTable {
    /// Build from `(state, year, month)` triples, keeping the earliest date per state.
    pub fn from_months<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, i32, u32)>,
    {
        let mut table = Self::default();
        for (state, year, month) in entries {
            table.insert(state, FractionalDate::from_year_month(year, month));
        }
        table
    }

    fn insert(&mut self, state: i64, date: FractionalDate) {
        match self.effective.get(&state) {
            Some(existing) if *existing <= date => {
                warn!(state, kept = %existing, ignored = %date, "duplicate legalization date");
            }
            Some(existing) => {
                warn!(state, kept = %date, ignored = %existing, "duplicate legalization date");
                self.effective.insert(state, date);
            }
            None => {
                self.effective.insert(state, date);
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| ReferenceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_reader(rdr, path)
    }

    fn from_reader<R: Read>(mut rdr: csv::Reader<R>, path: &Path) -> Result<Self, ReferenceError> {
        let mut table = Self::default();
        for (i, rec) in rdr.deserialize::<LegalRecord>().enumerate() {
            let row = i + 1;
            let rec = rec.map_err(|source| ReferenceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let invalid = |reason: String| ReferenceError::InvalidRow {
                path: path.to_path_buf(),
                row,
                reason,
            };
            let cve = parse_code(&rec.cve)
                .filter(|c| STATE_CODES.contains(c))
                .ok_or_else(|| invalid(format!("state code '{}' outside 1..=32", rec.cve)))?;
            let year = optional_code(rec.year.as_deref(), "year").map_err(invalid)?;
            let month = optional_code(rec.month.as_deref(), "month").map_err(invalid)?;
            let (year, month) = match (year, month) {
                (Some(y), Some(m)) => (y, m),
                (None, None) => {
                    debug!(state = cve, "no legalization date");
                    continue;
                }
                _ => return Err(invalid("year and month must both be set or both blank".into())),
            };
            if !(1..=12).contains(&month) {
                return Err(invalid(format!("month {} outside 1..=12", month)));
            }
            let year = i32::try_from(year).map_err(|_| invalid(format!("year {} out of range", year)))?;
            table.insert(cve, FractionalDate::from_year_month(year, month as u32));
        }
        Ok(table)
    }

    pub fn effective_date(&self, state: i64) -> Option<FractionalDate> {
        self.effective.get(&state).copied()
    }

    /// Legal iff the state's legalization date is on or before `date`.
    pub fn is_legal_as_of(&self, state: i64, date: FractionalDate) -> bool {
        self.effective
            .get(&state)
            .map(|legalized| *legalized <= date)
            .unwrap_or(false)
    }

    /// Classify every state in 1..=32 as a legal or non-legal origin at `date`.
    pub fn partition(&self, date: FractionalDate) -> OriginPartition {
        let (legal, non_legal): (Vec<i64>, Vec<i64>) =
            STATE_CODES.partition(|s| self.is_legal_as_of(*s, date));
        OriginPartition {
            legal: legal.into_iter().map(|s| s.to_string()).collect(),
            non_legal: non_legal.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.effective.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_reference_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "cve,state,year,month\n9,CDMX,2010,3\n2,Baja California,2017,6\n15,Mexico,,\n"
        )?;
        let table = LegalStatusTable::load(tmp.path())?;
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.effective_date(9),
            Some(FractionalDate::from_year_quarter(2010, 1))
        );
        assert_eq!(
            table.effective_date(2),
            Some(FractionalDate::from_year_quarter(2017, 2))
        );
        assert_eq!(table.effective_date(15), None);
        Ok(())
    }

    #[test]
    fn rejects_bad_month() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "cve,year,month\n9,2010,13\n")?;
        assert!(matches!(
            LegalStatusTable::load(tmp.path()),
            Err(ReferenceError::InvalidRow { row: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn accepts_float_formatted_dates() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "cve,year,month\n9.0,2010.0,3.0\n14, 2016 , 5\n")?;
        let table = LegalStatusTable::load(tmp.path())?;
        assert_eq!(
            table.effective_date(9),
            Some(FractionalDate::from_year_quarter(2010, 1))
        );
        let q1_2019 = Period::new(2019, 1).fractional_date();
        assert!(table.is_legal_as_of(9, q1_2019));
        assert!(table.is_legal_as_of(14, q1_2019));
        Ok(())
    }

    #[test]
    fn malformed_dates_are_errors_not_blanks() -> Result<()> {
        for (body, bad_row) in [
            ("cve,year,month\n9,2010,3\n14,2O16,5\n", 2),
            ("cve,year,month\n14,2016,may\n", 1),
            ("cve,year,month\n14,2016,\n", 1),
        ] {
            let mut tmp = NamedTempFile::new()?;
            write!(tmp, "{}", body)?;
            match LegalStatusTable::load(tmp.path()) {
                Err(ReferenceError::InvalidRow { row, .. }) => assert_eq!(row, bad_row, "{}", body),
                other => panic!("expected InvalidRow for {:?}, got {:?}", body, other),
            }
        }
        Ok(())
    }

    #[test]
    fn legal_from_the_quarter_of_legalization() {
        let table = LegalStatusTable::from_months([(11, 2021, 12)]);
        assert!(!table.is_legal_as_of(11, Period::new(2021, 3).fractional_date()));
        assert!(table.is_legal_as_of(11, Period::new(2021, 4).fractional_date()));
        assert!(table.is_legal_as_of(11, Period::new(2022, 1).fractional_date()));
        // unknown states are never legal
        assert!(!table.is_legal_as_of(30, Period::new(2022, 4).fractional_date()));
    }

    #[test]
    fn legal_status_is_monotonic_in_time() {
        let table = LegalStatusTable::from_months([(5, 2014, 9), (14, 2016, 1), (22, 2021, 9)]);
        for state in STATE_CODES {
            let mut seen_legal = false;
            for year in 2010..=2024 {
                for quarter in 1..=4 {
                    let legal = table.is_legal_as_of(state, FractionalDate::from_year_quarter(year, quarter));
                    assert!(!(seen_legal && !legal), "state {} lost legal status", state);
                    seen_legal |= legal;
                }
            }
        }
    }

    #[test]
    fn duplicate_states_keep_first_legalization() {
        let table = LegalStatusTable::from_months([(7, 2018, 11), (7, 2016, 2), (7, 2019, 1)]);
        assert_eq!(
            table.effective_date(7),
            Some(FractionalDate::from_year_quarter(2016, 1))
        );
    }

    #[test]
    fn partition_is_evaluated_at_survey_time() {
        let table = LegalStatusTable::from_months([(9, 2010, 3), (11, 2021, 12)]);
        let in_2019 = table.partition(Period::new(2019, 2).fractional_date());
        assert_eq!(in_2019.legal, vec!["9".to_string()]);
        assert_eq!(in_2019.non_legal.len(), 31);
        assert!(in_2019.non_legal.contains(&"11".to_string()));

        let in_2022 = table.partition(Period::new(2022, 1).fractional_date());
        assert_eq!(in_2022.legal, vec!["9".to_string(), "11".to_string()]);
        assert_eq!(in_2022.non_legal.len(), 30);
    }
}
