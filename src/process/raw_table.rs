// src/process/raw_table.rs
use csv::{ByteRecord, ReaderBuilder};
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, instrument};

use super::utils::decode_field;
use crate::error::SchemaError;

const UTF8_BOM: &str = "\u{feff}";

/// A questionnaire extract held as text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names as the file spells them.
    pub headers: Vec<String>,
    /// One `Vec` per respondent, aligned with `headers`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read every column of the CSV at `path`.
    #[cfg(test)]
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        Self::read_projected(path, |_| true)
    }

    /// Read the CSV at `path`, keeping only columns whose header satisfies `keep`.
    ///
    /// Fields are decoded as UTF-8 or Latin-1, a leading BOM is dropped from
    /// the first header, and short rows are padded with blanks.
    #[instrument(level = "debug", skip(path, keep), fields(path = %path.as_ref().display()))]
    pub fn read_projected<F>(path: impl AsRef<Path>, keep: F) -> Result<Self, SchemaError>
    where
        F: Fn(&str) -> bool,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SchemaError::Csv {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        })?;
        Self::from_reader(file, keep).map_err(|e| match e {
            ReadFailure::Csv(source) => SchemaError::Csv {
                path: path.to_path_buf(),
                source,
            },
            ReadFailure::Empty => SchemaError::EmptyFile {
                path: path.to_path_buf(),
            },
        })
    }

    fn from_reader<R: Read, F: Fn(&str) -> bool>(reader: R, keep: F) -> Result<Self, ReadFailure> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut record = ByteRecord::new();
        if !rdr.read_byte_record(&mut record).map_err(ReadFailure::Csv)? {
            return Err(ReadFailure::Empty);
        }
        let all_headers: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let decoded = decode_field(h);
                let name: &str = if i == 0 {
                    decoded.trim_start_matches(UTF8_BOM)
                } else {
                    decoded.as_ref()
                };
                name.trim().to_string()
            })
            .collect();

        let kept: Vec<usize> = all_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| keep(h.as_str()))
            .map(|(i, _)| i)
            .collect();
        let headers: Vec<String> = kept.iter().map(|&i| all_headers[i].clone()).collect();

        let mut rows = Vec::new();
        while rdr.read_byte_record(&mut record).map_err(ReadFailure::Csv)? {
            let row: Vec<String> = kept
                .iter()
                .map(|&i| record.get(i).map(|f| decode_field(f).into_owned()).unwrap_or_default())
                .collect();
            rows.push(row);
        }
        debug!(
            columns = headers.len(),
            dropped = all_headers.len() - headers.len(),
            rows = rows.len(),
            "read extract"
        );
        Ok(Self { headers, rows })
    }
}

enum ReadFailure {
    Csv(csv::Error),
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_latin1_with_bom_and_ragged_rows() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"\xef\xbb\xbfENT,NOMBRE,EDA\n11,Le\xf3n,30\n9\n")?;
        let table = RawTable::read_csv(tmp.path())?;
        assert_eq!(table.headers, vec!["ENT", "NOMBRE", "EDA"]);
        assert_eq!(table.rows[0], vec!["11", "León", "30"]);
        assert_eq!(table.rows[1], vec!["9", "", ""]);
        Ok(())
    }

    #[test]
    fn projection_drops_columns_at_read_time() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "ent,junk,eda\n1,a,20\n2,b,40\n")?;
        let table = RawTable::read_projected(tmp.path(), |h| h != "junk")?;
        assert_eq!(table.headers, vec!["ent", "eda"]);
        assert_eq!(table.rows, vec![vec!["1", "20"], vec!["2", "40"]]);
        Ok(())
    }

    #[test]
    fn empty_file_is_a_schema_error() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        assert!(matches!(
            RawTable::read_csv(tmp.path()),
            Err(SchemaError::EmptyFile { .. })
        ));
        Ok(())
    }
}
