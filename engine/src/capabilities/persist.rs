//! Persistence contract for generated code
//!
//! `persist_code` hands a relative path under the fixed output root plus
//! the unfenced code to a [`CodeWriter`]. Paths are sanitised here, before
//! any writer sees them, so no writer can be asked to leave the root.

use async_trait::async_trait;
use regex::Regex;
use sdk::errors::EngineError;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tracing::{debug, info};

/// External writer receiving `(relative_path, content)` pairs
#[async_trait]
pub trait CodeWriter: Send + Sync {
    /// Write `content` at `relative_path`, returning where it landed
    async fn write(&self, relative_path: &Path, content: &str) -> Result<PathBuf, EngineError>;
}

/// Writes files below a workspace directory on the local filesystem
#[derive(Debug, Clone)]
pub struct WorkspaceWriter {
    workspace: PathBuf,
}

impl WorkspaceWriter {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

#[async_trait]
impl CodeWriter for WorkspaceWriter {
    async fn write(&self, relative_path: &Path, content: &str) -> Result<PathBuf, EngineError> {
        if relative_path.is_absolute() {
            return Err(EngineError::PersistenceFailure(format!(
                "Refusing absolute path {}",
                relative_path.display()
            )));
        }

        let target = self.workspace.join(relative_path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::PersistenceFailure(format!(
                    "Failed to create directories {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        info!("Writing {} bytes to: {}", content.len(), target.display());

        fs::write(&target, content).await.map_err(|e| {
            EngineError::PersistenceFailure(format!("Failed to write {}: {}", target.display(), e))
        })?;

        Ok(target)
    }
}

static OPENING_FENCE: OnceLock<Regex> = OnceLock::new();
static CLOSING_FENCE: OnceLock<Regex> = OnceLock::new();

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````
pub fn strip_code_fence(code: &str) -> String {
    let opening = OPENING_FENCE
        .get_or_init(|| Regex::new(r"^\s*```[\w+#.-]*[ \t]*\r?\n?").expect("Invalid fence pattern"));
    let closing = CLOSING_FENCE
        .get_or_init(|| Regex::new(r"\r?\n?```\s*$").expect("Invalid fence pattern"));

    let without_opening = opening.replace(code, "");
    closing.replace(&without_opening, "").into_owned()
}

/// Resolve a model-supplied filename to a path under `output_root`
///
/// Leading `/`, `.` and `..` components are dropped, and a filename that
/// already starts with the output root is not prefixed twice: with root
/// `out`, both `foo.py` and `out/foo.py` resolve to `out/foo.py`.
pub fn output_path(output_root: &Path, filename: &str) -> Result<PathBuf, EngineError> {
    let root: Vec<_> = output_root
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    let mut parts: Vec<_> = Path::new(filename.trim())
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    if !root.is_empty() && parts.len() >= root.len() && parts[..root.len()] == root[..] {
        parts.drain(..root.len());
    }

    if parts.is_empty() {
        return Err(EngineError::PersistenceFailure(format!(
            "No usable file name in '{}'",
            filename
        )));
    }

    let path: PathBuf = root.iter().chain(parts.iter()).collect();
    debug!("Resolved '{}' to {}", filename, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fence("```\nx = 1\ny = 2\n```\n"), "x = 1\ny = 2");
        assert_eq!(strip_code_fence("no fence here"), "no fence here");
        assert_eq!(strip_code_fence("```c++\nint x;\n```"), "int x;");
    }

    #[test]
    fn test_strip_keeps_inner_fences() {
        let code = "```markdown\n# Title\n```js\nx\n```\nend\n```";
        assert_eq!(strip_code_fence(code), "# Title\n```js\nx\n```\nend");
    }

    #[test]
    fn test_output_path_forces_root() {
        let root = Path::new("out");
        assert_eq!(output_path(root, "foo.py").unwrap(), PathBuf::from("out/foo.py"));
        assert_eq!(output_path(root, "out/foo.py").unwrap(), PathBuf::from("out/foo.py"));
        assert_eq!(output_path(root, "/etc/passwd").unwrap(), PathBuf::from("out/etc/passwd"));
        assert_eq!(
            output_path(root, "../../secret.txt").unwrap(),
            PathBuf::from("out/secret.txt")
        );
        assert_eq!(
            output_path(root, "src/./login.ts").unwrap(),
            PathBuf::from("out/src/login.ts")
        );
    }

    #[test]
    fn test_output_path_rejects_empty_name() {
        assert!(output_path(Path::new("out"), "../..").is_err());
        assert!(output_path(Path::new("out"), "   ").is_err());
        assert!(output_path(Path::new("out"), "out").is_err());
    }

    #[tokio::test]
    async fn test_workspace_writer_creates_directories() {
        let dir = TempDir::new().unwrap();
        let writer = WorkspaceWriter::new(dir.path());

        let written = writer
            .write(Path::new("out/nested/main.py"), "print('hi')")
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("out/nested/main.py"));
        let content = std::fs::read_to_string(written).unwrap();
        assert_eq!(content, "print('hi')");
    }

    #[tokio::test]
    async fn test_workspace_writer_refuses_absolute_paths() {
        let dir = TempDir::new().unwrap();
        let writer = WorkspaceWriter::new(dir.path());

        let err = writer.write(Path::new("/tmp/x.py"), "x").await.unwrap_err();
        assert!(matches!(err, EngineError::PersistenceFailure(_)));
    }
}
