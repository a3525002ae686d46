use anyhow::Result;
use enoepanel::{
    config::{PipelineConfig, CONFIG_ENV},
    fetch::HttpFetcher,
    panel::PanelAssembler,
    Reference,
};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Config path from the first argument, else `$ENOE_CONFIG`, else built-in defaults.
fn config_path() -> Option<PathBuf> {
    env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,enoepanel=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config & reference data ──────────────────────────────────
    let path = config_path();
    let config = PipelineConfig::load(path.as_deref())?;
    info!(
        config = ?path,
        years = ?(config.years.start, config.years.end),
        quarters = ?(config.quarters.start, config.quarters.end),
        cache = %config.cache_dir.display(),
        output = %config.output_csv.display(),
        "configuration loaded"
    );
    let reference = Reference::load(&config)?;

    // ─── 3) assemble panel ───────────────────────────────────────────
    let fetcher = HttpFetcher::new(&config.http)?;
    let assembler = PanelAssembler::new(&config, fetcher, reference);
    let (panel, report) = assembler.run().await?;

    for (period, reason) in &report.skipped {
        warn!(%period, %reason, "quarter missing from panel");
    }
    info!(
        rows = panel.rows().len(),
        completed = report.completed.len(),
        skipped = report.skipped.len(),
        output = %config.output_csv.display(),
        "all done"
    );
    Ok(())
}
