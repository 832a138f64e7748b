//! User profile documents.

use serde_json::{json, Value};

use crate::model::{DecodeError, FromDocument};
use crate::types::{CollectionPath, Document, DocumentId, Fields, Timestamp};

/// Name of the root collection holding one profile per user.
pub const USERS_COLLECTION: &str = "users";

/// The profile document stored at `users/{uid}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: DocumentId,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: Timestamp,
    pub last_login_at: Timestamp,
    pub is_active: bool,
}

impl UserProfile {
    pub(crate) fn new(uid: DocumentId, email: &str, display_name: Option<String>) -> Self {
        let now = Timestamp::now();
        Self {
            uid,
            email: email.to_string(),
            display_name,
            created_at: now,
            last_login_at: now,
            is_active: true,
        }
    }

    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("uid".into(), json!(self.uid.as_str()));
        fields.insert("email".into(), json!(self.email));
        fields.insert("displayName".into(), json!(self.display_name));
        fields.insert("createdAt".into(), json!(self.created_at.0));
        fields.insert("lastLoginAt".into(), json!(self.last_login_at.0));
        fields.insert("isActive".into(), json!(self.is_active));
        fields
    }

    /// Fields merged into the profile on each sign in.
    pub(crate) fn login_fields(at: Timestamp) -> Fields {
        let mut fields = Fields::new();
        fields.insert("lastLoginAt".into(), json!(at.0));
        fields
    }
}

fn timestamp(doc: &Document, field: &'static str) -> Result<Timestamp, DecodeError> {
    match doc.field(field) {
        Some(Value::Number(n)) => n.as_i64().map(Timestamp).ok_or(DecodeError::InvalidField {
            field,
            reason: "expected an integer timestamp".into(),
        }),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            reason: "expected an integer timestamp".into(),
        }),
        None => Err(DecodeError::MissingField(field)),
    }
}

impl FromDocument for UserProfile {
    fn from_document(collection: &CollectionPath, doc: &Document) -> Result<Self, DecodeError> {
        if collection.segments().len() != 1 || collection.segments()[0] != USERS_COLLECTION {
            return Err(DecodeError::WrongCollection(USERS_COLLECTION));
        }

        let email = match doc.field("email") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(DecodeError::InvalidField {
                    field: "email",
                    reason: "expected a string".into(),
                })
            }
            None => return Err(DecodeError::MissingField("email")),
        };
        let display_name = doc
            .field("displayName")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(UserProfile {
            uid: doc.id.clone(),
            email,
            display_name,
            created_at: timestamp(doc, "createdAt")?,
            last_login_at: timestamp(doc, "lastLoginAt")?,
            is_active: doc.field("isActive").and_then(Value::as_bool).unwrap_or(true),
        })
    }
}
