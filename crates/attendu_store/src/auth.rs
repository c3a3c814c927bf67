//! Authentication module for the Firestore REST API
//!
//! This module provides functionality to authenticate with the Firestore
//! REST API using a service account key file. It generates OAuth2 tokens
//! that can be used to authenticate document reads, writes and queries.

use attendu_config::FirestoreConfig;
use std::{error::Error, path::Path};
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

/// Obtains an OAuth2 access token for the Firestore REST API
///
/// This function reads a service account key file from the path specified in
/// the FirestoreConfig and uses it to authenticate with Google's OAuth2
/// service. It requests a token with the Datastore scope, which covers
/// Firestore document operations.
///
/// # Arguments
///
/// * `config` - A reference to a FirestoreConfig containing the path to the service account key file
///
/// # Returns
///
/// * `Result<String, Box<dyn Error + Send + Sync>>` - On success, returns the access token as a String.
///   On failure, returns a boxed error.
///
/// # Errors
///
/// This function will return an error if:
/// * The key_path is missing from the FirestoreConfig
/// * The service account key file cannot be read
/// * Authentication with Google's OAuth2 service fails
/// * No token is returned from the authentication service
pub async fn get_firestore_auth_token(
    config: &FirestoreConfig,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let key_path = config
        .key_path
        .as_deref()
        .ok_or("Missing key_path in FirestoreConfig")?;

    let sa_key = read_service_account_key(Path::new(key_path)).await?;

    // Firestore document access requires the Datastore scope
    let auth = ServiceAccountAuthenticator::builder(sa_key).build().await?;

    let auth_token = auth
        .token(&["https://www.googleapis.com/auth/datastore"])
        .await?;
    let access_token = match auth_token.token() {
        Some(token) => token,
        None => {
            return Err("No token available".into());
        }
    };

    Ok(access_token.to_string())
}
