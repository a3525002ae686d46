// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::fetch::ArchiveUrls;
use crate::period::Period;

pub const DEFAULT_ARCHIVE_URL_TEMPLATE: &str = "https://www.inegi.org.mx/contenidos/programas/enoe/15ymas/datosabiertos/{year}/conjunto_de_datos_{survey}_{year}_{quarter}t_csv.zip";

/// Naming used by the open-data portal for waves published before 2018.
pub const DEFAULT_LEGACY_ARCHIVE_URL_TEMPLATE: &str = "https://www.inegi.org.mx/contenidos/programas/enoe/15ymas/datosabiertos/{year}/{year}_trim{quarter}_enoe_csv.zip";
pub const DEFAULT_LEGACY_BEFORE_YEAR: i32 = 2018;

/// Upper bound on `http.max_retries`; backoff doubles per attempt.
pub const MAX_HTTP_RETRIES: u32 = 10;

/// Environment variable consulted when no config path is passed on the command line.
pub const CONFIG_ENV: &str = "ENOE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub years: YearRange,
    pub quarters: QuarterRange,
    pub cache_dir: PathBuf,
    pub output_csv: PathBuf,
    pub output_parquet: Option<PathBuf>,
    pub columns_file: PathBuf,
    pub legal_status_file: PathBuf,
    pub archive_url_template: String,
    /// Template for waves before `legacy_before_year`; `null` disables it.
    pub legacy_archive_url_template: Option<String>,
    pub legacy_before_year: i32,
    /// Respondents must be strictly older than this to enter the panel.
    pub min_age: f64,
    /// Share of non-numeric residue in a code column above which a warning is raised.
    pub recode_tolerance: f64,
    pub http: HttpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            years: YearRange::default(),
            quarters: QuarterRange::default(),
            cache_dir: PathBuf::from("data/ENOE/raw"),
            output_csv: PathBuf::from("data/ENOE/final/lgbt_migration.csv"),
            output_parquet: Some(PathBuf::from("data/ENOE/final/lgbt_migration.parquet")),
            columns_file: PathBuf::from("auxiliary/columns.csv"),
            legal_status_file: PathBuf::from("auxiliary/equal_marriage.csv"),
            archive_url_template: DEFAULT_ARCHIVE_URL_TEMPLATE.to_string(),
            legacy_archive_url_template: Some(DEFAULT_LEGACY_ARCHIVE_URL_TEMPLATE.to_string()),
            legacy_before_year: DEFAULT_LEGACY_BEFORE_YEAR,
            min_age: 14.0,
            recode_tolerance: 0.05,
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2017,
            end: 2022,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuarterRange {
    pub start: u8,
    pub end: u8,
}

impl Default for QuarterRange {
    fn default() -> Self {
        Self { start: 1, end: 4 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_retries: 3,
            initial_backoff_ms: 1_000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Load from YAML at `path`, or fall back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.years.start > self.years.end {
            bail!(
                "year range is empty: start {} > end {}",
                self.years.start,
                self.years.end
            );
        }
        let QuarterRange { start, end } = self.quarters;
        if !(1..=4).contains(&start) || !(1..=4).contains(&end) || start > end {
            bail!("quarter range {}..={} must lie within 1..=4", start, end);
        }
        if self.http.max_retries > MAX_HTTP_RETRIES {
            bail!(
                "http.max_retries {} exceeds the limit of {}",
                self.http.max_retries,
                MAX_HTTP_RETRIES
            );
        }
        if !(0.0..=1.0).contains(&self.recode_tolerance) {
            bail!(
                "recode_tolerance {} must be a share between 0 and 1",
                self.recode_tolerance
            );
        }
        Ok(())
    }

    pub fn archive_urls(&self) -> ArchiveUrls {
        let urls = ArchiveUrls::new(self.archive_url_template.clone());
        match &self.legacy_archive_url_template {
            Some(legacy) => urls.with_legacy(legacy.clone(), self.legacy_before_year),
            None => urls,
        }
    }

    /// Every configured wave, ascending by (year, quarter).
    pub fn periods(&self) -> Vec<Period> {
        (self.years.start..=self.years.end)
            .flat_map(|year| {
                (self.quarters.start..=self.quarters.end).map(move |q| Period::new(year, q))
            })
            .collect()
    }
}
