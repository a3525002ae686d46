// src/period.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Federal entities are coded 1..=32; every per-state output covers all of them.
pub const STATE_CODES: RangeInclusive<i64> = 1..=32;
pub const STATE_COUNT: usize = 32;

/// Position of a state code inside a dense 32-slot table.
pub fn state_index(state: i64) -> Option<usize> {
    if STATE_CODES.contains(&state) {
        Some((state - 1) as usize)
    } else {
        None
    }
}

/// One survey wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    pub fn new(year: i32, quarter: u8) -> Self {
        Self { year, quarter }
    }

    pub fn fractional_date(&self) -> FractionalDate {
        FractionalDate::from_year_quarter(self.year, self.quarter as u32)
    }

    /// Cache directory name, e.g. `2019t3`.
    pub fn cache_key(&self) -> String {
        format!("{}t{}", self.year, self.quarter)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Q{}", self.year, self.quarter)
    }
}

/// Coarse ordering key `year + quarter/5`.
///
/// Not a calendar date: quarters 1..=4 map to `.2 .. .8`, which sorts
/// correctly within and across years. Every "is legal yet" comparison must
/// build both sides through [`FractionalDate::from_year_quarter`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FractionalDate(f64);

impl FractionalDate {
    pub fn from_year_quarter(year: i32, quarter: u32) -> Self {
        FractionalDate(year as f64 + quarter as f64 / 5.0)
    }

    /// Quarter of a calendar month: `ceil(month / 3)`.
    pub fn quarter_of_month(month: u32) -> u32 {
        (month + 2) / 3
    }

    pub fn from_year_month(year: i32, month: u32) -> Self {
        Self::from_year_quarter(year, Self::quarter_of_month(month))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for FractionalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}
