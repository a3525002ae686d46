// src/test_support.rs
//! Shared fixtures for unit tests: in-memory zips, a counting fetcher and
//! synthetic questionnaire extracts.

use anyhow::Result;
use std::{
    collections::HashMap,
    io::{Cursor, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::AcquisitionError;
use crate::fetch::urls::{member_stem, Questionnaire};
use crate::fetch::zips::ArchiveFetcher;
use crate::period::Period;

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,enoepanel=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn zip_bytes(members: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Archive laid out the way the statistics office nests its CSV bundles,
/// including a dictionary file that also mentions the questionnaire token.
pub fn wave_zip(period: Period, coe1: &str, coe2: &str) -> Result<Vec<u8>> {
    let c1 = member_stem(Questionnaire::Coe1, period);
    let c2 = member_stem(Questionnaire::Coe2, period);
    let dictionary = format!("{c1}/diccionario_de_datos/diccionario_de_datos_coe1.csv");
    let data1 = format!("{c1}/conjunto_de_datos/{c1}.csv");
    let data2 = format!("{c2}/conjunto_de_datos/{c2}.csv");
    zip_bytes(&[
        (dictionary.as_str(), "nemonico,nombre\nent,Entidad\n"),
        (data1.as_str(), coe1),
        (data2.as_str(), coe2),
    ])
}

/// Serves canned archives by URL, answers 404 for anything else, and counts calls.
#[derive(Clone, Default)]
pub struct MockFetcher {
    archives: Arc<HashMap<String, Vec<u8>>>,
    calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn with_archive(self, url: &str, bytes: Vec<u8>) -> Self {
        let mut archives = (*self.archives).clone();
        archives.insert(url.to_string(), bytes);
        Self {
            archives: Arc::new(archives),
            calls: self.calls,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchiveFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.archives
            .get(url)
            .cloned()
            .ok_or_else(|| AcquisitionError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// One respondent line for [`coe1_csv`]/[`coe2_csv`].
pub struct Respondent<'a> {
    pub ent: &'a str,
    pub eda: &'a str,
    pub p1: &'a str,
    pub p3o: &'a str,
    pub p3p2: &'a str,
    pub p6b2: &'a str,
}

/// First extract: upper-case headers, keys plus age, employment and migration.
pub fn coe1_csv(rows: &[Respondent<'_>]) -> String {
    let mut out = String::from("CD_A,ENT,CON,N_HOG,N_REN,EDA,P1,P3O,P3P2,EXTRA\n");
    for (i, r) in rows.iter().enumerate() {
        out.push_str(&format!(
            "1,{},{},1,1,{},{},{},{},x\n",
            r.ent, i, r.eda, r.p1, r.p3o, r.p3p2
        ));
    }
    out
}

/// Second extract: lower-case headers, same keys plus income.
pub fn coe2_csv(rows: &[Respondent<'_>]) -> String {
    let mut out = String::from("cd_a,ent,con,n_hog,n_ren,p6b2,other\n");
    for (i, r) in rows.iter().enumerate() {
        out.push_str(&format!("1,{},{},1,1,{},y\n", r.ent, i, r.p6b2));
    }
    out
}

pub const TEST_COLUMNS: &[&str] = &[
    "cd_a", "ent", "con", "n_hog", "n_ren", "eda", "p1", "p3o", "p3p2", "p6b2",
];
