//! Moves files between the local filesystem and the remote service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ar_domain::attachment::{FilePurpose, UploadedAttachment};
use ar_domain::error::Result;
use ar_remote::RunClient;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    File,
}

pub struct AttachmentMediator {
    client: Arc<dyn RunClient>,
    download_dir: PathBuf,
}

impl AttachmentMediator {
    pub fn new(client: Arc<dyn RunClient>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Upload a user file for agent file search.
    pub async fn upload(&self, path: &Path) -> Result<UploadedAttachment> {
        let remote = self.client.upload_file(path, FilePurpose::Agents).await?;
        tracing::info!(file_id = %remote.id, path = %path.display(), "attachment uploaded");
        Ok(UploadedAttachment {
            local_path: path.to_path_buf(),
            file_id: remote.id,
            purpose: FilePurpose::Agents,
            uploaded_at: Utc::now(),
        })
    }

    /// Save an agent-produced file locally, then delete the remote copy.
    ///
    /// `annotation_name` is the literal annotation text, e.g.
    /// `sandbox:/mnt/data/sales_by_region.png`.
    pub async fn download(
        &self,
        file_id: &str,
        annotation_name: &str,
        kind: FileKind,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let path = self
            .download_dir
            .join(local_file_name(file_id, annotation_name, kind));

        let mut content = self.client.get_file_content(file_id).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        let copied: Result<usize> = async {
            let mut written = 0usize;
            while let Some(chunk) = content.next().await {
                let chunk = chunk?;
                written += chunk.len();
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(written)
        }
        .await;
        drop(file);
        let written = match copied {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %rm, "failed to remove partial download");
                }
                return Err(e);
            }
        };
        tracing::info!(file_id, path = %path.display(), bytes = written, "file saved");

        if let Err(e) = self.client.delete_file(file_id).await {
            tracing::warn!(file_id, error = %e, "failed to delete remote file after download");
        }
        Ok(path)
    }

    /// Best-effort removal of uploaded files.
    pub async fn delete_uploads(&self, uploads: &[UploadedAttachment]) {
        for upload in uploads {
            if let Err(e) = self.client.delete_file(&upload.file_id).await {
                tracing::warn!(file_id = %upload.file_id, error = %e, "failed to delete uploaded file");
            }
        }
    }
}

/// `<stem>.<file_id><ext>` where stem and ext come from the basename of the
/// part of `annotation_name` after its last `:`.
pub fn local_file_name(file_id: &str, annotation_name: &str, kind: FileKind) -> String {
    let tail = annotation_name.rsplit(':').next().unwrap_or_default();
    let base = Path::new(tail);
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file");
    let ext = match base.extension().and_then(|e| e.to_str()) {
        Some(e) => format!(".{e}"),
        None if kind == FileKind::Image => ".png".to_string(),
        None => String::new(),
    };
    format!("{stem}.{}{ext}", safe_file_id(file_id))
}

/// The remote file id with anything but ASCII alphanumerics, `-` and `_`
/// replaced, so it cannot introduce a path separator or `..`.
fn safe_file_id(file_id: &str) -> String {
    file_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
