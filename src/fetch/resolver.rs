// src/fetch/resolver.rs
use glob::{glob_with, MatchOptions, Pattern};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

use super::urls::{member_stem, ArchiveUrls, Questionnaire};
use super::zips::{extract_archive, ArchiveFetcher};
use crate::error::AcquisitionError;
use crate::period::Period;

/// Resolves a wave's questionnaire extract to a local CSV, downloading and
/// extracting the wave archive into `<cache_dir>/<year>t<quarter>` on a miss.
pub struct ArchiveResolver<F> {
    fetcher: F,
    cache_dir: PathBuf,
    urls: ArchiveUrls,
}

impl<F: ArchiveFetcher> ArchiveResolver<F> {
    pub fn new(fetcher: F, cache_dir: impl Into<PathBuf>, urls: impl Into<ArchiveUrls>) -> Self {
        Self {
            fetcher,
            cache_dir: cache_dir.into(),
            urls: urls.into(),
        }
    }

    pub fn cache_dir_for(&self, period: Period) -> PathBuf {
        self.cache_dir.join(period.cache_key())
    }

    #[instrument(level = "info", skip_all, fields(period = %period, questionnaire = %questionnaire))]
    pub async fn resolve(
        &self,
        period: Period,
        questionnaire: Questionnaire,
    ) -> Result<PathBuf, AcquisitionError> {
        let target = self.cache_dir_for(period);
        if let Some(found) = find_member(&target, questionnaire, period)? {
            debug!(path = %found.display(), "cache hit");
            return Ok(found);
        }

        self.download(period, &target).await?;

        find_member(&target, questionnaire, period)?.ok_or_else(|| {
            AcquisitionError::MemberNotFound {
                pattern: questionnaire.token().to_string(),
                dir: target.clone(),
            }
        })
    }

    /// Fetch and unpack the wave archive into `target`. Members are unpacked
    /// into a staging directory first, so an interrupted extraction never
    /// leaves a half-written cache entry behind.
    pub async fn download(&self, period: Period, target: &Path) -> Result<(), AcquisitionError> {
        let url = self.urls.url_for(period)?;
        info!(%url, "downloading");
        let bytes = self.fetcher.fetch(url.as_str()).await?;

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| AcquisitionError::Io { path, source }
        };
        fs::create_dir_all(&self.cache_dir).map_err(io_err(&self.cache_dir))?;
        let staging = tempfile::Builder::new()
            .prefix(".partial-")
            .tempdir_in(&self.cache_dir)
            .map_err(io_err(&self.cache_dir))?;
        let members = extract_archive(&bytes, url.as_str(), staging.path())?;

        if target.exists() {
            // an earlier archive for this wave lacked the requested member
            fs::remove_dir_all(target).map_err(io_err(target))?;
        }
        fs::rename(staging.path(), target).map_err(io_err(target))?;
        info!(members, dir = %target.display(), "extracted");
        Ok(())
    }
}

/// Recursively search `dir` for a `.csv` whose file name contains the
/// questionnaire token, ignoring case.
///
/// Archives also carry dictionary and catalog CSVs with the same token, so
/// candidates are ranked: the wave's data-member stem first, then any
/// `conjunto_de_datos*` file, then the rest, ties broken by path.
pub fn find_member(
    dir: &Path,
    questionnaire: Questionnaire,
    period: Period,
) -> Result<Option<PathBuf>, AcquisitionError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pattern = format!("{}/**/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let entries = glob_with(&pattern, options).map_err(|e| AcquisitionError::Io {
        path: dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;

    let token = questionnaire.token();
    let stem = member_stem(questionnaire, period);
    let mut candidates: Vec<(u8, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().to_lowercase();
            if !name.contains(token) {
                return None;
            }
            let rank = if name.contains(&stem) {
                0
            } else if name.starts_with("conjunto_de_datos") {
                1
            } else {
                2
            };
            Some((rank, p))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next().map(|(_, p)| p))
}
