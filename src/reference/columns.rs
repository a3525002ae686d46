// src/reference/columns.rs

use csv::ReaderBuilder;
use std::{collections::BTreeSet, io::Read, path::Path};

use crate::error::ReferenceError;

const KEY_COLUMN: &str = "clave";

/// Lower-cased set of respondent variables that survive harmonization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalColumns {
    names: BTreeSet<String>,
}

impl CanonicalColumns {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Load the `clave` column of a reference CSV.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let rdr = ReaderBuilder::new()
            .from_path(path)
            .map_err(|source| ReferenceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_reader(rdr, path)
    }

    fn from_reader<R: Read>(
        mut rdr: csv::Reader<R>,
        path: &Path,
    ) -> Result<Self, ReferenceError> {
        let csv_err = |source| ReferenceError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let idx = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(KEY_COLUMN))
            .ok_or_else(|| ReferenceError::MissingColumn {
                path: path.to_path_buf(),
                column: KEY_COLUMN.to_string(),
            })?;

        let mut names = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            if let Some(v) = record.get(idx) {
                names.push(v.to_string());
            }
        }
        Ok(Self::new(names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_clave_lowercased() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(
            tmp,
            "clave,descripcion\nENT,Entidad\n eda ,Edad\nP3P2,Estado anterior\n,\n"
        )?;
        let cols = CanonicalColumns::load(tmp.path())?;
        assert_eq!(cols.iter().collect::<Vec<_>>(), vec!["eda", "ent", "p3p2"]);
        assert!(cols.contains("ent"));
        assert!(!cols.contains("ENT"));
        Ok(())
    }

    #[test]
    fn missing_clave_column_is_an_error() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "name\nent\n")?;
        let err = CanonicalColumns::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ReferenceError::MissingColumn { .. }));
        Ok(())
    }
}
