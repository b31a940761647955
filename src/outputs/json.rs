//! JSON output for reports and query results.
//!
//! # Output Structure
//!
//! ```text
//! report_dir/
//! └── stats.json        # Stats snapshot of the current dataset
//! ```

use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` as pretty-printed JSON into `{dir}/{file_name}`.
///
/// Creates `dir` if needed and returns the written path.
#[instrument(level = "info", skip_all, fields(dir = %dir, file_name = %file_name))]
pub async fn write_json<T: Serialize>(
    value: &T,
    dir: &str,
    file_name: &str,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    info!(%dir, "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(dir).await {
        error!(%dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = Path::new(dir).join(file_name).display().to_string();
    fs::write(&path, json).await?;
    info!(%path, "Wrote JSON file");
    Ok(path)
}
