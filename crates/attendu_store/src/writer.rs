//! Notification writer backed by Firestore.
//!
//! The writer is where the dedupe invariant is enforced: before inserting,
//! it looks for an existing document with the same `dedupeKey` and turns
//! the insert into a no-op when one exists. The keys themselves are pure
//! functions of the triggering event, so a redelivered trigger resolves to
//! the same key and lands on the duplicate path.
//!
//! The lookup-then-create pair is not transactional; two deliveries racing
//! through the window can still both insert. The delivery surface keys its
//! rendering on `dedupeKey` as a second line of defense.

use std::sync::Arc;

use attendu_common::models::NotificationCreation;
use attendu_common::models::NotificationDocument;
use attendu_common::services::{BoxFuture, BoxedError, NotificationWriter, WriteOutcome};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::{field_filter, structured_query, FirestoreClient};
use crate::value::{encode_fields, timestamp_value};

const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// Firestore-backed [`NotificationWriter`] implementation.
pub struct FirestoreNotificationWriter {
    client: Arc<FirestoreClient>,
}

impl FirestoreNotificationWriter {
    pub fn new(client: Arc<FirestoreClient>) -> Self {
        Self { client }
    }

    async fn find_by_dedupe_key(&self, dedupe_key: &str) -> Result<Option<String>, BoxedError> {
        let filter = field_filter(
            "dedupeKey",
            "EQUAL",
            json!({ "stringValue": dedupe_key }),
        );
        let documents = self
            .client
            .run_query(structured_query(NOTIFICATIONS_COLLECTION, filter, Some(1)))
            .await
            .map_err(|e| BoxedError(Box::new(e)))?;
        Ok(documents
            .first()
            .and_then(|document| document.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

impl NotificationWriter for FirestoreNotificationWriter {
    type Error = BoxedError;

    fn create(&self, creation: NotificationCreation) -> BoxFuture<'_, WriteOutcome, Self::Error> {
        Box::pin(async move {
            if let Some(existing) = self.find_by_dedupe_key(&creation.dedupe_key).await? {
                debug!(
                    dedupe_key = %creation.dedupe_key,
                    existing_id = %existing,
                    "skipping duplicate notification"
                );
                return Ok(WriteOutcome::Duplicate(existing));
            }

            let document = NotificationDocument::from_creation(creation, Utc::now());
            let created_at = document.created_at;

            let mut plain = match serde_json::to_value(&document) {
                Ok(Value::Object(map)) => map,
                Ok(_) => unreachable!("a struct serializes to an object"),
                Err(e) => return Err(BoxedError(Box::new(e))),
            };
            // createdAt is stored as a native timestamp, not a string
            plain.remove("createdAt");
            let mut fields = encode_fields(&plain);
            fields["createdAt"] = timestamp_value(created_at);

            let id = self
                .client
                .create_document(NOTIFICATIONS_COLLECTION, fields)
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;
            info!(
                notification_id = %id,
                kind = %document.creation.kind.as_str(),
                user_id = %document.creation.user_id,
                "notification created"
            );
            Ok(WriteOutcome::Created(id))
        })
    }
}
