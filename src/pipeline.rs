use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::client::{ObsClient, ProfileKind, SaveAs};
use crate::error::PictError;
use crate::files;

#[derive(Debug)]
pub enum Outcome {
    Updated,
    DownloadFailed(PictError),
    UploadFailed(PictError),
}

#[derive(Debug)]
pub enum Cleanup {
    /// Nothing was downloaded, so there was nothing to remove.
    NotNeeded,
    Removed,
    AlreadyGone,
    Failed(io::Error),
}

#[derive(Debug)]
pub struct Report {
    pub message_id: String,
    pub temp_file: Option<PathBuf>,
    pub outcome: Outcome,
    pub cleanup: Cleanup,
}

impl Report {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Updated)
    }
}

/// Downloads the object attached to `message_id`, sets it as the profile
/// picture, then removes the temporary copy whether or not the upload worked.
pub async fn run_pipeline(client: &ObsClient, message_id: &str) -> Report {
    let path = match client
        .download_message_to(message_id, SaveAs::TempFile)
        .await
    {
        Ok(path) => path,
        Err(e) => {
            warn!("Download of message {} failed: {}", message_id, e);
            return Report {
                message_id: message_id.to_string(),
                temp_file: None,
                outcome: Outcome::DownloadFailed(e),
                cleanup: Cleanup::NotNeeded,
            };
        }
    };

    let outcome = match client
        .update_profile_picture(&path, ProfileKind::Picture)
        .await
    {
        Ok(_) => Outcome::Updated,
        Err(e) => {
            warn!("Profile picture upload failed: {}", e);
            Outcome::UploadFailed(e)
        }
    };

    let cleanup = remove_temp_file(&path);

    info!("Pipeline for message {} finished", message_id);
    Report {
        message_id: message_id.to_string(),
        temp_file: Some(path),
        outcome,
        cleanup,
    }
}

fn remove_temp_file(path: &Path) -> Cleanup {
    match files::delete_file(path) {
        Ok(true) => Cleanup::Removed,
        Ok(false) => Cleanup::AlreadyGone,
        Err(e) => {
            warn!("Could not remove {}: {}", path.display(), e);
            Cleanup::Failed(e)
        }
    }
}
