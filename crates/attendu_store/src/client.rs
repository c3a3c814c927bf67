//! Firestore REST client module
//!
//! This module provides a client for the Firestore REST API: point reads,
//! document creation, partial updates with an update mask, and structured
//! queries. It is deliberately small (only the operations the attendance
//! pipeline needs) and hides the Firestore value envelope behind the
//! [`crate::value`] codec.
//!
//! When `base_url` is set in the configuration (emulator or test server),
//! authentication is skipped; otherwise every request carries a
//! service-account bearer token.

use crate::auth::get_firestore_auth_token;
use crate::value::decode_document;
use attendu_config::FirestoreConfig;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";

/// Errors that can occur when talking to the Firestore REST API
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Error during authentication with Google
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to the Firestore API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the Firestore API
    #[error("Firestore API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// A response that could not be interpreted
    #[error("Failed to decode Firestore response: {0}")]
    DecodeError(String),
}

/// Client for the Firestore REST API
pub struct FirestoreClient {
    /// HTTP client for making requests
    client: Client,
    /// Firestore configuration, including project id and key path
    config: FirestoreConfig,
    project_id: String,
}

impl FirestoreClient {
    /// Creates a new Firestore client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a `FirestoreError::ConfigError` when the project id is
    /// missing and no base URL override is configured.
    pub fn new(config: FirestoreConfig) -> Result<Self, FirestoreError> {
        let project_id = config
            .project_id
            .clone()
            .or_else(|| config.base_url.as_ref().map(|_| "demo-project".to_string()))
            .ok_or_else(|| {
                FirestoreError::ConfigError("Missing project_id in FirestoreConfig".to_string())
            })?;

        Ok(Self {
            client: Client::new(),
            config,
            project_id,
        })
    }

    fn api_base(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(FIRESTORE_API_BASE)
    }

    /// `projects/{p}/databases/{db}/documents`, the query parent path.
    fn documents_parent(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.config.database_id
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.api_base(), self.documents_parent())
    }

    async fn bearer_token(&self) -> Result<Option<String>, FirestoreError> {
        if self.config.base_url.is_some() {
            // Emulator / test server: no auth
            return Ok(None);
        }
        let token = get_firestore_auth_token(&self.config)
            .await
            .map_err(|e| FirestoreError::AuthError(e.to_string()))?;
        Ok(Some(token))
    }

    fn apply_auth(
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FirestoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(FirestoreError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    /// Point read of one document, decoded to plain JSON (with `id`).
    ///
    /// A 404 is a miss, not an error.
    pub async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Value>, FirestoreError> {
        let url = format!("{}/{}/{}", self.documents_url(), collection, document_id);
        let token = self.bearer_token().await?;

        let response = Self::apply_auth(self.client.get(&url), token.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let document: Value = response.json().await?;
        let decoded = decode_document(&document)
            .ok_or_else(|| FirestoreError::DecodeError("document without a name".to_string()))?;
        Ok(Some(decoded))
    }

    /// Creates a document with server-assigned id; returns the new id.
    ///
    /// `fields` must already be in the Firestore value envelope (see
    /// [`crate::value::encode_fields`] and [`crate::value::timestamp_value`]).
    pub async fn create_document(
        &self,
        collection: &str,
        fields: Value,
    ) -> Result<String, FirestoreError> {
        let url = format!("{}/{}", self.documents_url(), collection);
        let token = self.bearer_token().await?;

        let body = json!({ "fields": fields });
        let response = Self::apply_auth(self.client.post(&url), token.as_deref())
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let document: Value = response.json().await?;
        let id = document
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
            .ok_or_else(|| FirestoreError::DecodeError("create returned no name".to_string()))?;
        Ok(id.to_string())
    }

    /// Partial update of one document. Only the fields named in the update
    /// mask are touched; a field present in the mask but absent from
    /// `fields` is deleted. `fields` must already be in the Firestore value
    /// envelope.
    pub async fn patch_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: Value,
        update_mask: &[&str],
    ) -> Result<(), FirestoreError> {
        let mut url = format!("{}/{}/{}", self.documents_url(), collection, document_id);
        let mask: Vec<String> = update_mask
            .iter()
            .map(|path| format!("updateMask.fieldPaths={}", path))
            .collect();
        if !mask.is_empty() {
            url.push('?');
            url.push_str(&mask.join("&"));
        }

        let token = self.bearer_token().await?;
        let body = json!({ "fields": fields });
        let response = Self::apply_auth(self.client.patch(&url), token.as_deref())
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Runs a structured query against one collection; returns the decoded
    /// documents (rows without a `document` entry are skipped).
    pub async fn run_query(&self, structured_query: Value) -> Result<Vec<Value>, FirestoreError> {
        let url = format!("{}/{}:runQuery", self.api_base(), self.documents_parent());
        let token = self.bearer_token().await?;

        let body = json!({ "structuredQuery": structured_query });
        let response = Self::apply_auth(self.client.post(&url), token.as_deref())
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let rows: Vec<Value> = response.json().await?;
        let documents = rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(decode_document)
            .collect();
        Ok(documents)
    }
}

/// `{ fieldFilter: { field, op, value } }` for a structured query.
pub fn field_filter(field: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value,
        }
    })
}

/// ANDs a set of filters; a single filter passes through unwrapped.
pub fn composite_and(mut filters: Vec<Value>) -> Value {
    if filters.len() == 1 {
        return filters.remove(0);
    }
    json!({
        "compositeFilter": {
            "op": "AND",
            "filters": filters,
        }
    })
}

/// A structured query over one collection with an optional limit.
pub fn structured_query(collection: &str, filter: Value, limit: Option<u32>) -> Value {
    let mut query = json!({
        "from": [{ "collectionId": collection }],
        "where": filter,
    });
    if let Some(limit) = limit {
        query["limit"] = json!(limit);
    }
    query
}
