//! Recording Manager: starts call recording and resolves the retrievable URL.
//!
//! Recording is best-effort and fire-and-forget: a failed `uuid_record` is
//! logged but never aborts the call, and there is no `stop_recording`
//! operation — recording terminates when the legs hang up.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::commands::channel::UuidRecord;
use crate::connection::EslClient;

/// A recording in progress or completed against a particular call.
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    /// Filename relative to the configured recordings directory.
    pub filename: String,
    /// Absolute path passed to `uuid_record`.
    pub absolute_path: String,
}

impl RecordingArtifact {
    /// Compose the artifact for `call_id`, rooted under `directory`.
    pub fn new(call_id: &str, directory: &str, epoch_ms: u128) -> Self {
        let filename = format!("call_{}_{}.wav", call_id, epoch_ms);
        let absolute_path = format!(
            "{}/{}",
            directory.trim_end_matches('/'),
            filename
        );
        Self {
            filename,
            absolute_path,
        }
    }

    /// The retrievable URL once the call has completed, composed from
    /// `base_url` and the artifact's filename.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.filename)
    }
}

/// Recording Manager: issues `uuid_record` against both legs of a bridged
/// call and tracks the resulting artifact.
#[derive(Clone)]
pub struct RecordingManager {
    directory: String,
    base_url: String,
}

impl RecordingManager {
    /// Build a manager rooted at `directory`, resolving URLs under `base_url`.
    pub fn new(directory: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_url: base_url.into(),
        }
    }

    /// Compute the artifact `call_id`'s recording will be written to. Callers
    /// that need the filename before the legs finish originating (the
    /// orchestrator reports it back synchronously from `StartCall`) call this
    /// up front and pass the result to [`RecordingManager::start`].
    pub fn plan(&self, call_id: &str) -> RecordingArtifact {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        RecordingArtifact::new(call_id, &self.directory, epoch_ms)
    }

    /// Start recording a previously [`plan`](Self::plan)ned artifact into a
    /// single file, mixing both legs. Failures on either leg are logged and
    /// absorbed.
    pub async fn start(
        &self,
        client: &EslClient,
        call_id: &str,
        artifact: &RecordingArtifact,
        agent_uuid: &str,
        lead_uuid: &str,
    ) {
        for uuid in [agent_uuid, lead_uuid] {
            let cmd = UuidRecord {
                uuid: uuid.to_string(),
                path: artifact
                    .absolute_path
                    .clone(),
            };
            match client
                .api(&cmd.to_string())
                .await
            {
                Ok(response) if response
                    .body()
                    .is_some_and(|b| b.starts_with("+OK")) => {}
                Ok(response) => warn!(
                    call_id,
                    uuid, "uuid_record rejected: {:?}", response.body()
                ),
                Err(e) => warn!(call_id, uuid, "uuid_record failed: {}", e),
            }
        }
    }

    /// Resolve the retrievable URL for a finished recording.
    pub fn resolve_url(&self, artifact: &RecordingArtifact) -> String {
        artifact.url(&self.base_url)
    }
}
