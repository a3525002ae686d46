// src/fetch/mod.rs

pub mod resolver;
pub mod urls;
pub mod zips;

pub use resolver::{find_member, ArchiveResolver};
pub use urls::{archive_url, member_stem, ArchiveUrls, Questionnaire, SurveyEdition};
pub use zips::{extract_archive, ArchiveFetcher, HttpFetcher};
