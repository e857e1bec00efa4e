//! Metadata loader seam.
//!
//! The engine never talks to a database or an HTTP API itself; a collaborator
//! implements [`MarketCatalog`] and the periodic rebuild goes through here,
//! off the hot path.

use crate::engine::ArbEngine;
use crate::error::Result;
use crate::structure::{BuildReport, StructureBuilder};
use async_trait::async_trait;
use chrono::Utc;
use tracing::error;

/// Source of active market metadata (active, unexpired rows only)
#[async_trait]
pub trait MarketCatalog: Send + Sync {
    async fn fetch_active_markets(&self) -> Result<Vec<crate::domain::MarketRecord>>;
}

/// Fetch a fresh snapshot, assemble groups and swap them into the engine.
///
/// On any failure the previous structure stays in effect; the failure is
/// logged once and returned.
pub async fn rebuild(
    catalog: &dyn MarketCatalog,
    builder: &StructureBuilder,
    engine: &mut ArbEngine,
) -> Result<BuildReport> {
    let records = match catalog.fetch_active_markets().await {
        Ok(records) => records,
        Err(e) => {
            error!(error = %e, "structure rebuild failed, keeping previous snapshot");
            return Err(e);
        }
    };
    let (groups, report) = builder.build(&records, Utc::now());
    engine.on_structure_changed(groups);
    Ok(report)
}
