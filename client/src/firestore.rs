//! Firestore REST document encoding.
//!
//! Firestore's REST API wraps every field in a typed value object
//! (`{"stringValue": "jo"}`, `{"timestampValue": "2025-03-05T12:00:00Z"}`).
//! These helpers translate between that shape and [`AccountRecord`], and build
//! the request bodies the gateway sends.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use guuber_core::AccountRecord;

use crate::firebase::FirebaseError;

/// Collection holding one document per account, keyed by uid.
pub const USERS_COLLECTION: &str = "users";

/// A Firestore document as returned by `GET` and `PATCH`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, `projects/{p}/databases/(default)/documents/users/{uid}`.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub fields: Map<String, Value>,

    pub create_time: Option<DateTime<Utc>>,
}

/// One element of a `runQuery` response stream.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResult {
    pub(crate) document: Option<Document>,
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn timestamp_value(time: DateTime<Utc>) -> Value {
    json!({ "timestampValue": time.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

/// Encodes the fields of an account document.
///
/// `created_at` is omitted when the server is expected to stamp it.
pub fn account_fields(
    first_name: &str,
    last_name: &str,
    username: &str,
    email: &str,
    uid: &str,
    created_at: Option<DateTime<Utc>>,
) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("firstName".to_string(), string_value(first_name));
    fields.insert("lastName".to_string(), string_value(last_name));
    fields.insert("username".to_string(), string_value(username));
    fields.insert("email".to_string(), string_value(email));
    fields.insert("uid".to_string(), string_value(uid));
    if let Some(time) = created_at {
        fields.insert("createdAt".to_string(), timestamp_value(time));
    }
    fields
}

/// Decodes an account document.
///
/// A missing `createdAt` falls back to the document's creation time.
///
/// # Errors
///
/// [`FirebaseError::InvalidResponse`] if a string field is missing or the
/// document carries no usable timestamp.
pub fn decode_account(document: &Document) -> Result<AccountRecord, FirebaseError> {
    let string = |key: &str| -> Result<String, FirebaseError> {
        document
            .fields
            .get(key)
            .and_then(|value| value.get("stringValue"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                FirebaseError::InvalidResponse(format!("account document has no {key} field"))
            })
    };

    let created_at = document
        .fields
        .get("createdAt")
        .and_then(|value| value.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
        .or(document.create_time)
        .ok_or_else(|| {
            FirebaseError::InvalidResponse("account document has no createdAt field".to_string())
        })?;

    Ok(AccountRecord {
        first_name: string("firstName")?,
        last_name: string("lastName")?,
        username: string("username")?,
        email: string("email")?,
        uid: string("uid")?,
        created_at,
    })
}

/// Builds a `runQuery` body matching `users` documents whose `field` equals
/// `value`, limited to one result.
pub fn equality_query(field: &str, value: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": USERS_COLLECTION }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": string_value(value),
                }
            },
            "limit": 1
        }
    })
}

/// Builds a `commit` body that upserts `fields` into `document_name` and sets
/// `createdAt` to the server's request time.
pub fn profile_commit(document_name: &str, fields: Map<String, Value>) -> Value {
    json!({
        "writes": [{
            "update": {
                "name": document_name,
                "fields": fields,
            },
            "updateTransforms": [{
                "fieldPath": "createdAt",
                "setToServerValue": "REQUEST_TIME",
            }]
        }]
    })
}
