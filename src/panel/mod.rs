// src/panel/mod.rs
pub mod write;

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, instrument};

use crate::config::PipelineConfig;
use crate::error::QuarterError;
use crate::fetch::{ArchiveFetcher, ArchiveResolver, Questionnaire};
use crate::period::Period;
use crate::process::{build_quarter, QuarterIndicators, QuarterOptions};
use crate::reference::Reference;
use write::{write_csv_snapshot, write_parquet_snapshot};

/// One (state, year, quarter) observation of the output panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub ent: i64,
    pub migr: Option<f64>,
    pub year: i32,
    pub quarter: u8,
    pub equal_marriage: bool,
    pub from_equal: u64,
    pub from_non_equal: u64,
    pub p1: Option<f64>,
    pub p6b2: Option<f64>,
}

impl PanelRow {
    /// Lay a quarter's indicators out as 32 rows, one per state.
    pub fn from_quarter(q: &QuarterIndicators) -> Vec<PanelRow> {
        q.flows
            .rows
            .iter()
            .map(|flow| PanelRow {
                ent: flow.state,
                migr: q.migration.get(flow.state),
                year: q.period.year,
                quarter: q.period.quarter,
                equal_marriage: flow.equal_marriage,
                from_equal: flow.from_equal,
                from_non_equal: flow.from_non_equal,
                p1: q.employment.get(flow.state),
                p6b2: q.income.get(flow.state),
            })
            .collect()
    }
}

/// Output columns, in the order the plotting scripts read them.
pub fn panel_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("ent", DataType::Int64, false),
        Field::new("migr", DataType::Float64, true),
        Field::new("year", DataType::Int64, false),
        Field::new("quarter", DataType::Int64, false),
        Field::new("equal_marriage", DataType::Int64, false),
        Field::new("from_equal", DataType::Int64, false),
        Field::new("from_non_equal", DataType::Int64, false),
        Field::new("p1", DataType::Float64, true),
        Field::new("p6b2", DataType::Float64, true),
    ]))
}

/// Accumulated panel, ordered by (year, quarter) then state.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    rows: Vec<PanelRow>,
}

impl Panel {
    pub fn push_quarter(&mut self, q: &QuarterIndicators) {
        self.rows.extend(PanelRow::from_quarter(q));
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = &self.rows;
        let ints = |f: fn(&PanelRow) -> i64| -> ArrayRef {
            Arc::new(Int64Array::from_iter_values(rows.iter().map(f)))
        };
        let floats = |f: fn(&PanelRow) -> Option<f64>| -> ArrayRef {
            Arc::new(Float64Array::from_iter(rows.iter().map(f)))
        };
        let columns = vec![
            ints(|r| r.ent),
            floats(|r| r.migr),
            ints(|r| r.year as i64),
            ints(|r| r.quarter as i64),
            ints(|r| r.equal_marriage as i64),
            ints(|r| r.from_equal as i64),
            ints(|r| r.from_non_equal as i64),
            floats(|r| r.p1),
            floats(|r| r.p6b2),
        ];
        Ok(RecordBatch::try_new(panel_schema(), columns)?)
    }
}

/// Where the snapshot goes after every completed quarter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTargets {
    pub csv: PathBuf,
    pub parquet: Option<PathBuf>,
}

impl OutputTargets {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            csv: config.output_csv.clone(),
            parquet: config.output_parquet.clone(),
        }
    }

    /// Overwrite every target with the full accumulated panel.
    pub fn write(&self, panel: &Panel) -> Result<()> {
        let batch = panel.to_record_batch()?;
        write_csv_snapshot(&batch, &self.csv)?;
        if let Some(parquet) = &self.parquet {
            write_parquet_snapshot(&batch, parquet)?;
        }
        Ok(())
    }
}

/// Outcome of a run: which waves made it into the panel and which were skipped.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: Vec<Period>,
    pub skipped: Vec<(Period, String)>,
}

/// Drives the per-quarter pipeline over every configured wave, strictly in
/// ascending order, persisting the panel after each success.
pub struct PanelAssembler<F> {
    resolver: ArchiveResolver<F>,
    reference: Arc<Reference>,
    options: QuarterOptions,
    periods: Vec<Period>,
    targets: OutputTargets,
}

impl<F: ArchiveFetcher> PanelAssembler<F> {
    pub fn new(config: &PipelineConfig, fetcher: F, reference: Arc<Reference>) -> Self {
        Self {
            resolver: ArchiveResolver::new(
                fetcher,
                config.cache_dir.clone(),
                config.archive_urls(),
            ),
            reference,
            options: QuarterOptions {
                min_age: config.min_age,
                recode_tolerance: config.recode_tolerance,
            },
            periods: config.periods(),
            targets: OutputTargets::from_config(config),
        }
    }

    /// Resolve both extracts and compute the wave's indicators.
    pub async fn process_quarter(&self, period: Period) -> Result<QuarterIndicators, QuarterError> {
        let coe1 = self.resolver.resolve(period, Questionnaire::Coe1).await?;
        let coe2 = self.resolver.resolve(period, Questionnaire::Coe2).await?;

        let reference = Arc::clone(&self.reference);
        let opts = self.options;
        let q = tokio::task::spawn_blocking(move || {
            build_quarter(period, &coe1, &coe2, &reference, opts)
        })
        .await??;
        Ok(q)
    }

    /// Process every wave. A failing wave is logged and skipped; output
    /// write failures abort the run.
    #[instrument(level = "info", skip_all, fields(quarters = self.periods.len()))]
    pub async fn run(&self) -> Result<(Panel, RunReport)> {
        let started_at = Utc::now();
        let mut panel = Panel::default();
        let mut completed = Vec::new();
        let mut skipped = Vec::new();

        for &period in &self.periods {
            info!(year = period.year, quarter = period.quarter, "processing quarter");
            match self.process_quarter(period).await {
                Ok(q) => {
                    panel.push_quarter(&q);
                    self.targets.write(&panel)?;
                    info!(
                        year = period.year,
                        quarter = period.quarter,
                        respondents = q.respondents,
                        panel_rows = panel.rows().len(),
                        "quarter added to panel"
                    );
                    completed.push(period);
                }
                Err(e) => {
                    error!(year = period.year, quarter = period.quarter, error = %e, "skipped quarter");
                    skipped.push((period, e.to_string()));
                }
            }
        }

        if panel.is_empty() {
            self.targets.write(&panel)?;
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            completed,
            skipped,
        };
        info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            elapsed = ?(report.finished_at - report.started_at),
            "run finished"
        );
        Ok((panel, report))
    }
}
