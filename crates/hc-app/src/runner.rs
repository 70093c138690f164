//! External model execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// One model invocation inside a prepared model directory.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub model_dir: &'a Path,
    pub executable: &'a str,
    /// Parameter documents for this iteration, by key.
    pub parameters: &'a BTreeMap<String, Value>,
}

/// Runs the model for one evaluation. Implementations block until the
/// model has finished and its outputs are on disk.
pub trait ModelRunner {
    fn run(&self, request: &RunRequest<'_>) -> AppResult<()>;
}

/// Write each document as `<dir>/<key>.json`.
pub fn stage_documents(dir: &Path, documents: &BTreeMap<String, Value>) -> AppResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(AppError::at(dir))?;
    let mut written = Vec::with_capacity(documents.len());
    for (key, doc) in documents {
        let path = dir.join(format!("{key}.json"));
        let text = serde_json::to_string_pretty(doc)?;
        std::fs::write(&path, text).map_err(AppError::at(&path))?;
        written.push(path);
    }
    Ok(written)
}

/// Stages parameters and runs the executable as a subprocess with the model
/// directory as working directory. No timeout is enforced.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    pub args: Vec<String>,
}

impl ModelRunner for ProcessRunner {
    fn run(&self, request: &RunRequest<'_>) -> AppResult<()> {
        let staged = stage_documents(request.model_dir, request.parameters)?;
        debug!(files = staged.len(), "staged parameter documents");

        let dir = std::fs::canonicalize(request.model_dir).map_err(AppError::at(request.model_dir))?;
        let executable = dir.join(request.executable);
        info!(executable = %executable.display(), "running model");

        let status = Command::new(&executable)
            .args(&self.args)
            .current_dir(&dir)
            .status()
            .map_err(AppError::at(&executable))?;
        if !status.success() {
            return Err(AppError::Execution {
                executable,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_are_staged_by_key() {
        let dir = std::env::temp_dir().join(format!("hc-app-stage-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut docs = BTreeMap::new();
        docs.insert("hydrology".to_string(), json!({"zsnl": 0.35}));
        docs.insert("routing".to_string(), json!({"r2n": [0.1, 0.2]}));

        let written = stage_documents(&dir, &docs).unwrap();
        assert_eq!(written.len(), 2);
        let back: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("hydrology.json")).unwrap()).unwrap();
        assert_eq!(back, json!({"zsnl": 0.35}));
    }

    #[test]
    fn missing_model_directory_is_an_io_error() {
        let dir = std::env::temp_dir().join(format!("hc-app-nodir-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let params = BTreeMap::new();
        let runner = ProcessRunner::default();
        // Staging creates the directory; the executable itself is absent.
        let err = runner
            .run(&RunRequest {
                model_dir: &dir,
                executable: "no_such_model",
                parameters: &params,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::PathIo { .. }));
    }
}
