//! Artifact store: persists each tool result payload as a canonical JSON
//! file keyed by call id.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};

use piebot_types::codec::canonical_bytes;

/// Where a stored payload landed, and what it hashed to.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub artifact_path: PathBuf,
    pub artifact_hash: String,
    pub bytes: usize,
}

/// Write `payload` to `runtime/artifacts/tool_results/<call_id>.json`.
///
/// Whole-file write, last-writer-wins; call ids are unique per run.
pub fn store_tool_result(
    runtime_root: &Path,
    call_id: &str,
    payload: &Value,
) -> io::Result<StoredArtifact> {
    let out_dir = runtime_root.join("artifacts").join("tool_results");
    fs::create_dir_all(&out_dir)?;
    let out_path = out_dir.join(format!("{call_id}.json"));

    let data = canonical_bytes(payload);
    fs::write(&out_path, &data)?;

    Ok(StoredArtifact {
        artifact_path: out_path,
        artifact_hash: hex::encode(Sha256::digest(&data)),
        bytes: data.len(),
    })
}
