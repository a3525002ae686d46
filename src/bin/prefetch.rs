// src/bin/prefetch.rs
//! Warm the raw-archive cache for every configured wave without computing
//! anything, so a later run can proceed offline.

use anyhow::Result;
use enoepanel::{
    config::{PipelineConfig, CONFIG_ENV},
    fetch::{ArchiveResolver, HttpFetcher, Questionnaire},
};
use std::{env, path::PathBuf};
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
    let config = PipelineConfig::load(path.as_deref())?;
    let resolver = ArchiveResolver::new(
        HttpFetcher::new(&config.http)?,
        config.cache_dir.clone(),
        config.archive_urls(),
    );

    let start = Instant::now();
    let (mut ok, mut failed) = (0usize, 0usize);
    // one download at a time, in wave order
    'periods: for period in config.periods() {
        // both questionnaires live in the same archive, so the second resolve is a cache hit
        for q in [Questionnaire::Coe1, Questionnaire::Coe2] {
            if let Err(e) = resolver.resolve(period, q).await {
                error!(%period, questionnaire = %q, error = %e, "prefetch failed");
                failed += 1;
                continue 'periods;
            }
        }
        info!(%period, cache = %resolver.cache_dir_for(period).display(), "cached");
        ok += 1;
    }
    info!(ok, failed, elapsed = ?start.elapsed(), "prefetch finished");
    Ok(())
}
