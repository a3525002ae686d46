// src/fetch/urls.rs
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

use crate::error::AcquisitionError;
use crate::period::Period;

/// Waves at or after this fractional date are published under the `enoen` name.
pub const NEW_EDITION_FROM: f64 = 2020.4;

/// Survey name used in archive URLs and member file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyEdition {
    Enoe,
    EnoeN,
}

impl SurveyEdition {
    pub fn for_period(period: Period) -> Self {
        if period.fractional_date().value() >= NEW_EDITION_FROM {
            SurveyEdition::EnoeN
        } else {
            SurveyEdition::Enoe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyEdition::Enoe => "enoe",
            SurveyEdition::EnoeN => "enoen",
        }
    }
}

/// The two parallel per-respondent extracts of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Questionnaire {
    Coe1,
    Coe2,
}

impl Questionnaire {
    /// Case-insensitive token every member file of this questionnaire contains.
    pub fn token(&self) -> &'static str {
        match self {
            Questionnaire::Coe1 => "coe1",
            Questionnaire::Coe2 => "coe2",
        }
    }
}

impl fmt::Display for Questionnaire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[a-z_]*\}").expect("placeholder pattern is valid"))
}

/// Expand `{year}`, `{quarter}` and `{survey}` in `template`.
pub fn archive_url(template: &str, period: Period) -> Result<Url, AcquisitionError> {
    let expanded = template
        .replace("{year}", &period.year.to_string())
        .replace("{quarter}", &period.quarter.to_string())
        .replace("{survey}", SurveyEdition::for_period(period).as_str());

    if let Some(m) = placeholder_re().find(&expanded) {
        return Err(AcquisitionError::InvalidUrl {
            url: expanded.clone(),
            reason: format!("unknown placeholder {}", m.as_str()),
        });
    }
    Url::parse(&expanded).map_err(|e| AcquisitionError::InvalidUrl {
        url: expanded,
        reason: e.to_string(),
    })
}

/// Older waves were published under a different naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LegacyNaming {
    template: String,
    before_year: i32,
}

/// URL templates for every wave: the current `{survey}` scheme, plus an
/// optional legacy template used for waves before a cutoff year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrls {
    current: String,
    legacy: Option<LegacyNaming>,
}

impl ArchiveUrls {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            legacy: None,
        }
    }

    /// Use `template` for every wave whose year is before `before_year`.
    pub fn with_legacy(mut self, template: impl Into<String>, before_year: i32) -> Self {
        self.legacy = Some(LegacyNaming {
            template: template.into(),
            before_year,
        });
        self
    }

    pub fn template_for(&self, period: Period) -> &str {
        match &self.legacy {
            Some(l) if period.year < l.before_year => &l.template,
            _ => &self.current,
        }
    }

    pub fn url_for(&self, period: Period) -> Result<Url, AcquisitionError> {
        archive_url(self.template_for(period), period)
    }
}

impl From<&str> for ArchiveUrls {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for ArchiveUrls {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

/// Stem of the data member inside the archive, e.g.
/// `conjunto_de_datos_coe1_enoen_2021_1t`.
pub fn member_stem(questionnaire: Questionnaire, period: Period) -> String {
    format!(
        "conjunto_de_datos_{}_{}_{}_{}t",
        questionnaire.token(),
        SurveyEdition::for_period(period).as_str(),
        period.year,
        period.quarter
    )
}
