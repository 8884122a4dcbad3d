// The upload task: read the definition, send it once, then let the skip
// policy decide whether a failure ends the run.

use std::path::Path;

use reqwest::blocking::Client;
use tracing::info;

use crate::api::{ClientConfig, UploadClient, UploadOutcome, UploadRequest};
use crate::config::UploadSettings;
use crate::error::{Result, UploadError};

/// How a task run finished when it did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Uploaded,
    /// The upload failed but `skip_on_error` turned it into a no-op.
    Skipped { reason: String },
}

/// With `skip_on_error` a failure is logged and dropped; without it the
/// original error comes back to the caller.
pub fn apply_skip_policy(outcome: UploadOutcome, skip_on_error: bool) -> Result<Completion> {
    match outcome {
        UploadOutcome::Success => Ok(Completion::Uploaded),
        UploadOutcome::Failure { error, .. } if skip_on_error => {
            let reason = error.to_string();
            info!("{reason}");
            Ok(Completion::Skipped { reason })
        }
        UploadOutcome::Failure { error, .. } => Err(error),
    }
}

/// One upload attempt gated by the skip policy.
pub fn upload(
    http: &Client,
    config: &ClientConfig,
    request: &UploadRequest,
    skip_on_error: bool,
) -> Result<Completion> {
    let outcome = UploadClient::new(http, config).upload(request);
    apply_skip_policy(outcome, skip_on_error)
}

fn read_definition(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| UploadError::LocalFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Run the whole task for resolved settings. A missing or unreadable
/// definition goes through the same skip policy as a failed upload. The
/// marker file is written whenever the run does not abort.
pub fn run(http: &Client, settings: &UploadSettings) -> Result<Completion> {
    info!(
        "Uploading to {} api: {}, owner: {}, version: {}, inputFile: {}, format: {}, private: {}",
        settings.host,
        settings.api,
        settings.owner,
        settings.version,
        settings.input_file.display(),
        settings.format,
        settings.private
    );

    let outcome = match read_definition(&settings.input_file) {
        Ok(content) => {
            let config = settings.client_config();
            let request = settings.upload_request(content);
            UploadClient::new(http, &config).upload(&request)
        }
        Err(err) => UploadOutcome::failure(err),
    };
    let completion = apply_skip_policy(outcome, settings.skip_on_error)?;

    if let Some(marker) = &settings.marker_file {
        write_marker(marker)?;
    }
    Ok(completion)
}

/// Record the local time of this run so an outer build tool can see the task ran.
pub fn write_marker(path: &Path) -> Result<()> {
    let marker_err = |source| UploadError::Marker {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(marker_err)?;
    }
    let stamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string();
    std::fs::write(path, stamp).map_err(marker_err)
}
