use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::warn;

use crate::application::render::types::RenderError;

const WORKSPACE_PREFIX: &str = "figrender-";

/// Uniquely named scratch directory owned by one compiled render.
///
/// Deleted recursively by [`ScratchWorkspace::close`] or, failing that, on drop,
/// which also covers panics and cancelled futures.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            warn!(
                target = "application::render::toolchain",
                op = "workspace::close",
                path = %path.display(),
                error = %err,
                "Failed to remove scratch workspace"
            );
        }
    }
}

/// Run `f` inside a fresh workspace under `root` and remove the workspace
/// afterwards, whatever `f` returns.
pub async fn with_workspace<F, Fut, T>(root: Option<&Path>, f: F) -> Result<T, RenderError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, RenderError>>,
{
    let workspace = ScratchWorkspace::create(root).map_err(|err| {
        RenderError::internal(format!("failed to create scratch workspace: {err}"))
    })?;
    let result = f(workspace.path().to_path_buf()).await;
    workspace.close();
    result
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).expect("read root").count()
    }

    #[tokio::test]
    async fn removed_after_success() {
        let root = TempDir::new().expect("root");
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);

        let value = with_workspace(Some(root.path()), |dir| async move {
            std::fs::write(dir.join("figure.tex"), "x").expect("write");
            *captured.lock().expect("lock") = Some(dir);
            Ok(7)
        })
        .await
        .expect("workspace result");

        assert_eq!(value, 7);
        let dir = seen.lock().expect("lock").clone().expect("dir recorded");
        assert!(!dir.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn removed_after_failure() {
        let root = TempDir::new().expect("root");
        let result: Result<(), RenderError> = with_workspace(Some(root.path()), |dir| async move {
            std::fs::write(dir.join("figure.log"), "boom").expect("write");
            Err(RenderError::conversion("nope"))
        })
        .await;

        assert!(matches!(result, Err(RenderError::Conversion { .. })));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn removed_when_future_is_dropped() {
        let root = TempDir::new().expect("root");
        let pending = with_workspace(Some(root.path()), |_dir| async move {
            std::future::pending::<Result<(), RenderError>>().await
        });
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(20), pending).await;

        assert!(outcome.is_err());
        assert_eq!(entries(root.path()), 0);
    }

    fn explode() -> Result<(), RenderError> {
        panic!("render task panicked")
    }

    #[tokio::test]
    async fn removed_after_panic() {
        let root = TempDir::new().expect("root");
        let root_path = root.path().to_path_buf();
        let handle = tokio::spawn(async move {
            with_workspace(Some(&root_path), |_dir| async move { explode() }).await
        });

        assert!(handle.await.is_err());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn workspace_names_are_unique() {
        let root = TempDir::new().expect("root");
        let first = ScratchWorkspace::create(Some(root.path())).expect("first");
        let second = ScratchWorkspace::create(Some(root.path())).expect("second");
        assert_ne!(first.path(), second.path());
        assert!(
            first
                .path()
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX))
        );
    }
}
