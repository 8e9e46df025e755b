use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::HelperError;

/// Result of asking the helper to start the data refresh workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered,
    Rejected(String),
}

/// How a finished refresh run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
}

/// Status of the most recent refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed(Conclusion),
}

/// Result of launching the insurer portal automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Started,
    AlreadyRunning,
    Other(String),
}

/// Result of merging the invoice PDFs into one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub ok: bool,
    pub path: Option<String>,
    pub pages: Option<u32>,
    pub files: Option<u32>,
    pub message: Option<String>,
}

/// Groups of source files removed after a claim was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSet {
    /// Invoice PDFs in the shared cloud-drive folder
    DriveFiles,
    /// Downloaded folder and merged PDF on the desktop
    DesktopFolder,
}

impl ArtifactSet {
    pub fn path(&self) -> &'static str {
        match self {
            ArtifactSet::DriveFiles => "/delete-drive-files",
            ArtifactSet::DesktopFolder => "/delete-desktop-folder",
        }
    }
}

impl fmt::Display for ArtifactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSet::DriveFiles => write!(f, "drive_files"),
            ArtifactSet::DesktopFolder => write!(f, "desktop_folder"),
        }
    }
}

/// Result of deleting one artifact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub ok: bool,
    pub deleted: usize,
    pub message: Option<String>,
}

/// Liveness report of the helper process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperStatus {
    pub server: String,
    #[serde(default)]
    pub luxmed_running: bool,
}

/// Operations offered by the local helper process.
///
/// Every call is a single request; none of them retry.
#[async_trait]
pub trait HelperApi: Send + Sync {
    async fn trigger_refresh(&self) -> Result<TriggerOutcome, HelperError>;

    async fn workflow_status(&self) -> Result<JobStatus, HelperError>;

    async fn launch_external_action(&self) -> Result<LaunchOutcome, HelperError>;

    async fn merge_documents(&self) -> Result<MergeOutcome, HelperError>;

    async fn delete_artifacts(&self, set: ArtifactSet) -> Result<DeleteOutcome, HelperError>;

    async fn status(&self) -> Result<HelperStatus, HelperError>;
}

/// Generic `{status, message}` reply used by most helper endpoints.
#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowReply {
    status: String,
    #[serde(default)]
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    pages: Option<u32>,
    #[serde(default)]
    files: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DeleteReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
    /// A count for drive files, a list of paths for the desktop folder
    #[serde(default)]
    deleted: Value,
}

impl From<WorkflowReply> for JobStatus {
    fn from(reply: WorkflowReply) -> Self {
        if reply.status != "completed" {
            return JobStatus::Pending;
        }
        match reply.conclusion.as_deref() {
            Some("success") => JobStatus::Completed(Conclusion::Success),
            _ => JobStatus::Completed(Conclusion::Failure),
        }
    }
}

impl From<DeleteReply> for DeleteOutcome {
    fn from(reply: DeleteReply) -> Self {
        let deleted = match &reply.deleted {
            Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
            Value::Array(items) => items.len(),
            _ => 0,
        };
        DeleteOutcome {
            ok: reply.status == "ok",
            deleted,
            message: reply.message,
        }
    }
}

/// HTTP client for the helper process.
pub struct HttpHelper {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHelper {
    /// Creates a new helper client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Helper address, e.g. `http://localhost:8765`
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HelperError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Issues a GET and decodes the JSON body.
    ///
    /// The helper reports failures as JSON with a 4xx/5xx status, so the
    /// body is decoded regardless of the status code.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HelperError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!("Helper {} -> {}", path, status);

        serde_json::from_slice(&body)
            .map_err(|e| HelperError::Decode(format!("{} ({}): {}", path, status, e)))
    }
}

#[async_trait]
impl HelperApi for HttpHelper {
    async fn trigger_refresh(&self) -> Result<TriggerOutcome, HelperError> {
        let reply: StatusReply = self.get_json("/trigger-refresh").await?;
        Ok(if reply.status == "triggered" {
            TriggerOutcome::Triggered
        } else {
            TriggerOutcome::Rejected(reply.message.unwrap_or(reply.status))
        })
    }

    async fn workflow_status(&self) -> Result<JobStatus, HelperError> {
        let reply: WorkflowReply = self.get_json("/workflow-status").await?;
        Ok(reply.into())
    }

    async fn launch_external_action(&self) -> Result<LaunchOutcome, HelperError> {
        let reply: StatusReply = self.get_json("/launch-luxmed").await?;
        Ok(match reply.status.as_str() {
            "started" => LaunchOutcome::Started,
            "already_running" => LaunchOutcome::AlreadyRunning,
            _ => LaunchOutcome::Other(reply.message.unwrap_or(reply.status)),
        })
    }

    async fn merge_documents(&self) -> Result<MergeOutcome, HelperError> {
        let reply: MergeReply = self.get_json("/merge-pdfs").await?;
        Ok(MergeOutcome {
            ok: reply.status == "ok",
            path: reply.path,
            pages: reply.pages,
            files: reply.files,
            message: reply.message,
        })
    }

    async fn delete_artifacts(&self, set: ArtifactSet) -> Result<DeleteOutcome, HelperError> {
        let reply: DeleteReply = self.get_json(set.path()).await?;
        Ok(reply.into())
    }

    async fn status(&self) -> Result<HelperStatus, HelperError> {
        self.get_json("/status").await
    }
}
