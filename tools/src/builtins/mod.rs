//! Built-in tools: repository reads and git plumbing.

mod fs;
mod git;

pub use fs::{fs_list_dir_spec, fs_read_file_spec};
pub use git::{git_apply_patch_spec, git_diff_spec};

use std::path::{Component, Path, PathBuf};

use crate::ToolError;

/// Resolve `rel` strictly under `root`, lexically.
///
/// Absolute paths and any `..` that would climb above the root are
/// rejected before any filesystem access.
fn resolve_under(root: &Path, rel: &str) -> Result<PathBuf, ToolError> {
    let mut depth: i64 = 0;
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(ToolError::PathEscape);
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(ToolError::PathEscape),
        }
    }
    Ok(root.join(rel))
}
