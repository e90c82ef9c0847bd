use std::path::Path;

use hush_ir::parse::parse_expectations;
use hush_ir::types::Expectation;
use tracing::info;

use crate::limits::{check_expectation_count, check_manifest_size, InputLimits};
use crate::scan::ScanError;

/// Read and parse a pre-loaded expectation manifest.
pub fn load_manifest(path: impl AsRef<Path>, limits: &InputLimits) -> Result<Vec<Expectation>, ScanError> {
    let path = path.as_ref();
    let manifest_error = |source| ScanError::Manifest {
        path: path.display().to_string(),
        source,
    };

    let size = std::fs::metadata(path).map_err(manifest_error)?.len();
    check_manifest_size(limits, size)?;
    let json = std::fs::read_to_string(path).map_err(manifest_error)?;
    let expectations = parse_expectations(&json)?;
    check_expectation_count(limits, expectations.len())?;

    info!(path = %path.display(), expectations = expectations.len(), "manifest loaded");
    Ok(expectations)
}
