//! Ledgers and their form drafts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{required_str, DecodeError, FromDocument};
use crate::error::ValidationError;
use crate::types::{CollectionPath, Document, DocumentId, Fields, Timestamp};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

/// What a ledger is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerCategory {
    #[default]
    Personal,
    Business,
}

impl LedgerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerCategory::Personal => "personal",
            LedgerCategory::Business => "business",
        }
    }
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(LedgerCategory::Personal),
            "business" => Ok(LedgerCategory::Business),
            other => Err(ValidationError::new(
                "type",
                format!("type must be one of personal, business (got {:?})", other),
            )),
        }
    }
}

/// A named grouping of transactions owned by one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    pub id: DocumentId,
    pub name: String,
    pub category: LedgerCategory,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FromDocument for Ledger {
    fn from_document(collection: &CollectionPath, doc: &Document) -> Result<Self, DecodeError> {
        if collection.segments().last().map(String::as_str) != Some("ledgers") {
            return Err(DecodeError::WrongCollection("ledgers"));
        }

        let name = required_str(doc, "name")?.to_string();
        let category = required_str(doc, "type")?
            .parse()
            .map_err(|e: ValidationError| DecodeError::InvalidField {
                field: "type",
                reason: e.message,
            })?;

        Ok(Ledger {
            id: doc.id.clone(),
            name,
            category,
            created_at: doc.create_time,
            updated_at: doc.update_time,
        })
    }
}

/// User input for creating or editing a ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerDraft {
    pub name: String,
    pub category: LedgerCategory,
}

impl LedgerDraft {
    pub fn new(name: impl Into<String>, category: LedgerCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    /// Check the draft and return its trimmed form.
    ///
    /// # Errors
    ///
    /// Returns a [ValidationError] on the `name` field if the trimmed name is
    /// empty or not between 2 and 100 characters.
    pub fn validate(&self) -> Result<LedgerDraft, ValidationError> {
        let name = self.name.trim();
        let chars = name.chars().count();

        if chars == 0 {
            return Err(ValidationError::new("name", "Name is required"));
        }
        if chars < NAME_MIN_CHARS {
            return Err(ValidationError::new(
                "name",
                format!("name must be at least {NAME_MIN_CHARS} characters"),
            ));
        }
        if chars > NAME_MAX_CHARS {
            return Err(ValidationError::new(
                "name",
                format!("name must be at most {NAME_MAX_CHARS} characters"),
            ));
        }

        Ok(LedgerDraft {
            name: name.to_string(),
            category: self.category,
        })
    }

    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(self.name));
        fields.insert("type".into(), json!(self.category.as_str()));
        fields
    }
}
