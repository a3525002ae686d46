// src/reference/mod.rs

pub mod columns;
pub mod legal;

pub use columns::CanonicalColumns;
pub use legal::{LegalStatusTable, OriginPartition};

use std::sync::Arc;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::ReferenceError;

/// Static inputs loaded once per run and shared read-only by every quarter.
#[derive(Debug, Clone)]
pub struct Reference {
    pub columns: CanonicalColumns,
    pub legal: LegalStatusTable,
}

impl Reference {
    pub fn new(columns: CanonicalColumns, legal: LegalStatusTable) -> Arc<Self> {
        Arc::new(Self { columns, legal })
    }

    pub fn load(config: &PipelineConfig) -> Result<Arc<Self>, ReferenceError> {
        let columns = CanonicalColumns::load(&config.columns_file)?;
        let legal = LegalStatusTable::load(&config.legal_status_file)?;
        info!(
            columns = columns.len(),
            legal_states = legal.len(),
            "loaded reference data"
        );
        Ok(Self::new(columns, legal))
    }
}
