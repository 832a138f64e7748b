//! Credit and debit entries under a ledger.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{format_description::BorrowedFormatItem, macros::format_description, Date};

use super::{required_str, DecodeError, FromDocument};
use crate::error::ValidationError;
use crate::types::{CollectionPath, Document, DocumentId, Fields, Timestamp};

const NOTE_MAX_CHARS: usize = 200;

/// Largest amount a single transaction may carry (10^15).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Storage format for transaction dates.
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// Whether a transaction adds to or takes from the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(ValidationError::new(
                "type",
                format!("type must be one of credit, debit (got {:?})", other),
            )),
        }
    }
}

/// A single credit or debit entry under a ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: DocumentId,
    /// The owning ledger.
    pub ledger_id: DocumentId,
    /// Always positive; the sign comes from `direction`.
    pub amount: Decimal,
    pub direction: Direction,
    pub note: Option<String>,
    /// The calendar date the transaction happened on.
    pub date: Date,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Transaction {
    /// The amount with the direction's sign applied.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

fn decode_amount(doc: &Document) -> Result<Decimal, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidField {
        field: "amount",
        reason,
    };

    match doc.field("amount") {
        Some(Value::String(s)) => Decimal::from_str(s).map_err(|e| invalid(e.to_string())),
        // Older documents stored plain numbers.
        Some(Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| invalid(e.to_string()))
        }
        Some(_) => Err(invalid("expected a decimal".into())),
        None => Err(DecodeError::MissingField("amount")),
    }
}

fn format_date(date: Date) -> Result<String, ValidationError> {
    date.format(DATE_FORMAT)
        .map_err(|e| ValidationError::new("date", format!("date cannot be stored: {e}")))
}

impl FromDocument for Transaction {
    fn from_document(collection: &CollectionPath, doc: &Document) -> Result<Self, DecodeError> {
        let in_transactions =
            collection.segments().last().map(String::as_str) == Some("transactions");
        let ledger_id = match collection.parent() {
            Some(parent) if in_transactions => parent.id(),
            _ => return Err(DecodeError::WrongCollection("transactions")),
        };

        let amount = decode_amount(doc)?;
        let direction = required_str(doc, "type")?
            .parse()
            .map_err(|e: ValidationError| DecodeError::InvalidField {
                field: "type",
                reason: e.message,
            })?;
        let date = Date::parse(required_str(doc, "date")?, DATE_FORMAT).map_err(|e| {
            DecodeError::InvalidField {
                field: "date",
                reason: e.to_string(),
            }
        })?;
        let note = match doc.field("note") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Ok(Transaction {
            id: doc.id.clone(),
            ledger_id,
            amount,
            direction,
            note,
            date,
            created_at: doc.create_time,
            updated_at: doc.update_time,
        })
    }
}

/// User input for creating or editing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDraft {
    pub amount: Decimal,
    pub direction: Direction,
    pub note: Option<String>,
    pub date: Date,
}

impl TransactionDraft {
    pub fn new(amount: Decimal, direction: Direction, date: Date) -> Self {
        Self {
            amount,
            direction,
            note: None,
            date,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Parse an amount typed into a form.
    pub fn parse_amount(input: &str) -> Result<Decimal, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::new("amount", "Amount is required"));
        }
        Decimal::from_str(input)
            .map_err(|_| ValidationError::new("amount", "amount must be a number"))
    }

    /// Parse a `YYYY-MM-DD` date typed into a form.
    pub fn parse_date(input: &str) -> Result<Date, ValidationError> {
        Date::parse(input.trim(), DATE_FORMAT)
            .map_err(|_| ValidationError::new("date", "date must be a valid date"))
    }

    /// Check the draft and return it with an empty note normalized away.
    ///
    /// # Errors
    ///
    /// Returns a [ValidationError] if the amount is not positive or exceeds
    /// [MAX_AMOUNT], or if the note is longer than 200 characters.
    pub fn validate(&self) -> Result<TransactionDraft, ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::new(
                "amount",
                "amount must be a positive number",
            ));
        }
        if self.amount > MAX_AMOUNT {
            return Err(ValidationError::new(
                "amount",
                format!("amount must be at most {MAX_AMOUNT}"),
            ));
        }

        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty());
        if let Some(note) = note {
            if note.chars().count() > NOTE_MAX_CHARS {
                return Err(ValidationError::new(
                    "note",
                    format!("note must be at most {NOTE_MAX_CHARS} characters"),
                ));
            }
        }

        Ok(TransactionDraft {
            amount: self.amount,
            direction: self.direction,
            note: note.map(str::to_string),
            date: self.date,
        })
    }

    pub(crate) fn to_fields(&self) -> Result<Fields, ValidationError> {
        let mut fields = Fields::new();
        fields.insert("amount".into(), json!(self.amount.to_string()));
        fields.insert("type".into(), json!(self.direction.as_str()));
        fields.insert("note".into(), json!(self.note.clone().unwrap_or_default()));
        fields.insert("date".into(), json!(format_date(self.date)?));
        Ok(fields)
    }
}
