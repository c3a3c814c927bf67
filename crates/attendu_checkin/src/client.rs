//! HTTP client for the classifier and finalization endpoints
//!
//! This module provides the [`RecognitionClient`] seam the check-in session
//! drives, plus its HTTP implementation. The classifier accepts a JPEG data
//! URL with class/student identifiers and answers with a classification
//! outcome; the finalization endpoint converts a pending record into a
//! terminal status. Both speak plain JSON.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use attendu_common::http::client::create_client;
use attendu_common::services::BoxFuture;
use attendu_config::ClassifierConfig;

use crate::camera::{CameraError, CapturedFrame};

/// Errors that can occur during the check-in flow
#[derive(Error, Debug)]
pub enum CheckInError {
    /// The camera resource failed or was unavailable
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// Capture was attempted before the consent flag was given
    #[error("Consent is required before scanning")]
    ConsentRequired,

    /// Capture was attempted while another capture or a pending countdown
    /// is active
    #[error("Capture is not available right now")]
    CaptureUnavailable,

    /// The endpoint could not be reached, or its body was unusable
    #[error("Transport error: {0}")]
    Transport(String),

    /// The classifier answered non-2xx
    #[error("Classifier error: {0}")]
    Backend(String),

    /// The classifier reported a pending result without the record id the
    /// autonomous finalization needs. Fatal for the session: a fresh
    /// capture is required.
    #[error("Pending result without a record id")]
    MissingPendingRecordId,

    /// The finalization endpoint answered non-2xx
    #[error("Finalization failed: {0}")]
    Finalize(String),
}

impl From<reqwest::Error> for CheckInError {
    fn from(err: reqwest::Error) -> Self {
        CheckInError::Transport(err.to_string())
    }
}

/// Outcome of one classification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Confident match; attendance recorded immediately.
    Recorded { attendance_status: String },
    /// Attendance was already recorded today.
    AlreadyMarked,
    /// Ambiguous match; a pending record was created.
    Pending { record_id: Option<String> },
    /// The classifier did not match.
    Rejected { message: Option<String> },
}

/// Outcome of one finalization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The record reached a terminal status.
    Finalized,
    /// The backend refused; the user may re-attempt capture.
    Rejected { message: Option<String> },
    /// A 2xx answer that is neither finalized nor rejected: assume the
    /// backend did its job.
    Completed { message: Option<String> },
}

/// The two calls the check-in session makes.
pub trait RecognitionClient: Send + Sync {
    /// Submits one frame for classification.
    fn classify(
        &self,
        frame: &CapturedFrame,
        class_id: &str,
        student_id: &str,
    ) -> BoxFuture<'_, ScanOutcome, CheckInError>;

    /// Converts a pending record into a terminal status.
    fn finalize(&self, record_id: &str) -> BoxFuture<'_, FinalizeOutcome, CheckInError>;
}

/// Wire shape of a classifier answer. `recordId` is canonical,
/// `record_id` accepted.
#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    attendance_status: Option<String>,
    #[serde(rename = "recordId", alias = "record_id", default)]
    record_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Wire shape of a finalization answer.
#[derive(Debug, Deserialize)]
struct FinalizeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP implementation of [`RecognitionClient`]
pub struct HttpRecognitionClient {
    /// HTTP client for making requests
    client: Client,
    /// Endpoint configuration
    config: ClassifierConfig,
}

impl HttpRecognitionClient {
    /// Creates a new client against the configured endpoints.
    pub fn new(config: ClassifierConfig) -> Result<Self, CheckInError> {
        let client = create_client(config.timeout_secs, true)?;
        Ok(Self { client, config })
    }
}

impl RecognitionClient for HttpRecognitionClient {
    fn classify(
        &self,
        frame: &CapturedFrame,
        class_id: &str,
        student_id: &str,
    ) -> BoxFuture<'_, ScanOutcome, CheckInError> {
        let body = serde_json::json!({
            "image": frame.to_data_url(),
            "classId": class_id,
            "studentId": student_id,
        });

        Box::pin(async move {
            let response = self
                .client
                .post(&self.config.recognition_url)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let parsed: Option<ScanResponse> = response.json().await.ok();

            if !status.is_success() {
                let message = parsed
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| format!("classifier answered {}", status));
                return Err(CheckInError::Backend(message));
            }

            let Some(parsed) = parsed else {
                return Err(CheckInError::Transport(
                    "classifier returned an unusable body".to_string(),
                ));
            };

            let outcome = match parsed.status.as_deref() {
                Some("success") => ScanOutcome::Recorded {
                    attendance_status: parsed
                        .attendance_status
                        .unwrap_or_else(|| "present".to_string()),
                },
                Some("already_marked") => ScanOutcome::AlreadyMarked,
                Some("pending") => ScanOutcome::Pending {
                    record_id: parsed.record_id,
                },
                _ => ScanOutcome::Rejected {
                    message: parsed.message,
                },
            };
            Ok(outcome)
        })
    }

    fn finalize(&self, record_id: &str) -> BoxFuture<'_, FinalizeOutcome, CheckInError> {
        let body = serde_json::json!({ "recordId": record_id });

        Box::pin(async move {
            let response = self
                .client
                .post(&self.config.finalize_url)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let parsed: Option<FinalizeResponse> = response.json().await.ok();

            if !status.is_success() {
                let message = parsed
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| format!("finalize answered {}", status));
                return Err(CheckInError::Finalize(message));
            }

            let normalized = parsed
                .as_ref()
                .and_then(|r| r.status.as_deref())
                .map(|s| s.trim().to_lowercase());

            let outcome = match normalized.as_deref() {
                Some("success") | Some("finalized") | Some("ok") => FinalizeOutcome::Finalized,
                Some("rejected") => FinalizeOutcome::Rejected {
                    message: parsed.and_then(|r| r.message),
                },
                _ => FinalizeOutcome::Completed {
                    message: parsed.and_then(|r| r.message),
                },
            };
            Ok(outcome)
        })
    }
}
