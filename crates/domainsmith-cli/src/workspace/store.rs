use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use domainsmith_generate::ArtifactStore;

use super::{WorkspaceError, write_bytes_atomic};

/// Artifacts as files in one output directory.
///
/// In dry-run mode nothing is written; each artifact is printed to stdout
/// under a `# ==> file <==` banner instead.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    dry_run: bool,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn load(&self, file_name: &str) -> io::Result<Option<String>> {
        let path = self.path_for(file_name);
        tokio::task::spawn_blocking(move || match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn store(&self, file_name: &str, contents: &str) -> io::Result<()> {
        let path = self.path_for(file_name);
        if self.dry_run {
            print!("# ==> {} <==\n{contents}\n", path.display());
            tracing::info!(event = "dry_run_artifact", path = %path.display());
            return Ok(());
        }

        let data = contents.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || write_bytes_atomic(&path, &data))
            .await
            .map_err(io::Error::other)?
            .map_err(into_io)
    }
}

fn into_io(err: WorkspaceError) -> io::Error {
    match err {
        WorkspaceError::Io(err) => err,
        other => io::Error::other(other.to_string()),
    }
}
