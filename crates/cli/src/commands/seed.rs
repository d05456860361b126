//! Seed the database from a catalog dataset.
//!
//! Without `--file` the dataset bundled into the storefront binary is used,
//! the same one demo mode and the read fallback serve.

use std::path::Path;

use tracing::info;

use kaaya_storefront::db::seed;
use kaaya_storefront::store::Dataset;

use super::{CliError, connect};

/// Import categories, products, users, and settings.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, the database is
/// unreachable, or any insert fails. The import is transactional.
pub async fn run(file: Option<&str>, force: bool) -> Result<(), CliError> {
    // Read and validate before connecting to the database.
    let dataset = match file {
        Some(file_path) => {
            info!(path = %file_path, "Loading dataset from file");
            let content = tokio::fs::read_to_string(Path::new(file_path))
                .await
                .map_err(|source| CliError::Io {
                    path: file_path.to_owned(),
                    source,
                })?;
            Dataset::from_yaml(&content)?
        }
        None => {
            info!("Using bundled catalog dataset");
            Dataset::builtin()?
        }
    };

    let pool = connect().await?;

    info!(force, "Starting seeding process");
    let report = seed::import(&pool, &dataset, force).await?;

    info!("Seeding complete!");
    for (table, rows) in &report.seeded {
        info!("  {table}: {rows} rows");
    }
    for table in &report.skipped {
        info!("  {table}: skipped (already has rows, use --force to overwrite)");
    }

    Ok(())
}
