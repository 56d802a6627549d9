//! Loading real class declarations into the child's type space.

use crate::runtime::{ClassOrigin, Declared, Runtime};
use ms_common::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// Check that `path` exists, is a file, and carries `extension`.
pub fn validate_autoload_path(path: &Path, extension: &str) -> Result<()> {
    let invalid = |reason: String| Error::InvalidAutoload {
        path: path.to_path_buf(),
        reason,
    };
    if !path.exists() {
        return Err(invalid("file does not exist".to_string()));
    }
    if !path.is_file() {
        return Err(invalid("not a regular file".to_string()));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext == extension => Ok(()),
        _ => Err(invalid(format!("expected a .{extension} file"))),
    }
}

/// Something that can bring a file's classes into a runtime.
pub trait Autoloader {
    fn load(&self, runtime: &mut Runtime, path: &Path) -> Result<Vec<Declared>>;
}

/// Reads declaration source from disk.
#[derive(Debug, Clone, Default)]
pub struct SourceAutoloader;

impl Autoloader for SourceAutoloader {
    fn load(&self, runtime: &mut Runtime, path: &Path) -> Result<Vec<Declared>> {
        let src = std::fs::read_to_string(path).map_err(|e| {
            Error::Load(format!("cannot read {}: {e}", path.display()))
        })?;
        let origin = ClassOrigin::Source(path.display().to_string());
        let declared = runtime.load_source(&src, origin).map_err(|e| match e {
            Error::Parse { line, message } => Error::Load(format!(
                "{}:{line}: {message}",
                path.display()
            )),
            other => other,
        })?;

        let shadowed = declared
            .iter()
            .filter(|d| matches!(d, Declared::Shadowed(_)))
            .count();
        info!(
            path = %path.display(),
            classes = declared.len(),
            shadowed,
            "autoloaded declarations"
        );
        debug!(?declared, "autoload detail");
        Ok(declared)
    }
}
