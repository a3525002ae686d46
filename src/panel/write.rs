// src/panel/write.rs
use anyhow::{Context, Result};
use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;
use tracing::debug;

/// Write into a temporary sibling of `target`, then rename it into place. The
/// target is always either the previous snapshot or the complete new one.
fn replace_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating output directory {:?}", dir))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {:?}", dir))?;
    write(&mut tmp)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(target)
        .with_context(|| format!("replacing {:?}", target))?;
    Ok(())
}

pub fn write_csv_snapshot(batch: &RecordBatch, target: &Path) -> Result<()> {
    replace_atomically(target, |tmp| {
        let mut writer = WriterBuilder::new().with_header(true).build(tmp.as_file_mut());
        writer.write(batch).context("writing panel CSV")?;
        drop(writer);
        Ok(())
    })?;
    debug!(rows = batch.num_rows(), path = %target.display(), "wrote CSV snapshot");
    Ok(())
}

pub fn write_parquet_snapshot(batch: &RecordBatch, target: &Path) -> Result<()> {
    replace_atomically(target, |tmp| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = tmp.as_file_mut().try_clone()?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating Parquet writer for panel")?;
        writer.write(batch).context("writing panel batch")?;
        writer.close().context("closing Parquet writer")?;
        Ok(())
    })?;
    debug!(rows = batch.num_rows(), path = %target.display(), "wrote Parquet snapshot");
    Ok(())
}
