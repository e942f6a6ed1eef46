pub mod completions;
pub mod import;
pub mod index;
pub mod search;
pub mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use runway_core::config::{EmbedderChoice, ProjectConfig};
use runway_core::db::try_open_catalog;
use runway_core::error::ErrorCode;
use runway_search::semantic::SemanticModel;
use runway_search::{Embedder, HashEmbedder};
use rusqlite::Connection;

use crate::output::{CliError, OutputMode, render_error};

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct CommandContext {
    pub config: ProjectConfig,
    pub db_path: PathBuf,
    pub output: OutputMode,
}

impl CommandContext {
    /// Open the catalog, rendering a `CatalogNotFound` error when it does
    /// not exist yet.
    pub fn open_existing_catalog(&self) -> Result<Connection> {
        match try_open_catalog(&self.db_path)? {
            Some(conn) => Ok(conn),
            None => {
                render_error(
                    self.output,
                    &CliError::from_code(ErrorCode::CatalogNotFound, self.db_path.display()),
                )?;
                anyhow::bail!("catalog not found at {}", self.db_path.display());
            }
        }
    }

    /// Build the embedder selected by `[search].embedder`.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self.config.search.embedder {
            EmbedderChoice::Hash => Ok(Arc::new(HashEmbedder::default())),
            EmbedderChoice::Minilm => {
                let loaded = self
                    .config
                    .search
                    .resolved_model_dir()
                    .and_then(|dir| SemanticModel::load(&dir));
                match loaded {
                    Ok(model) => Ok(Arc::new(model)),
                    Err(err) => {
                        render_error(
                            self.output,
                            &CliError::from_code(ErrorCode::ModelNotFound, format!("{err:#}")),
                        )?;
                        Err(err)
                    }
                }
            }
        }
    }
}
