//! Patient records kept by the in-memory registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

pub const MAX_PATIENT_AGE: u8 = 130;

/// Unique identifier for a patient record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(Uuid);

impl PatientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SharedError::InvalidUuid { input: s.to_string() })
    }
}

/// A registered patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub full_name: String,
    pub age: u8,
    pub document_id: String,
    pub email: Option<String>,
    pub notes: String,
    pub analyses: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when registering a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub age: u8,
    pub document_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl NewPatient {
    /// Validate and turn into a stored record
    pub fn into_patient(self) -> SharedResult<Patient> {
        let full_name = validate_name(&self.full_name)?;
        validate_age(self.age)?;
        let document_id = validate_document(&self.document_id)?;
        let email = self.email.as_deref().map(validate_email).transpose()?;

        let now = Utc::now();
        Ok(Patient {
            id: PatientId::new(),
            full_name,
            age: self.age,
            document_id,
            email,
            notes: self.notes.trim().to_string(),
            analyses: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub document_id: Option<String>,
    /// `Some(None)` clears the address
    #[serde(default, with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Patient {
    /// Apply a partial update, validating every provided field first
    pub fn apply(&mut self, update: PatientUpdate) -> SharedResult<()> {
        let full_name = update.full_name.as_deref().map(validate_name).transpose()?;
        if let Some(age) = update.age {
            validate_age(age)?;
        }
        let document_id = update.document_id.as_deref().map(validate_document).transpose()?;
        let email = match update.email {
            Some(Some(ref addr)) => Some(Some(validate_email(addr)?)),
            Some(None) => Some(None),
            None => None,
        };

        if let Some(name) = full_name {
            self.full_name = name;
        }
        if let Some(age) = update.age {
            self.age = age;
        }
        if let Some(doc) = document_id {
            self.document_id = doc;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(notes) = update.notes {
            self.notes = notes.trim().to_string();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Case-insensitive match on name or document id
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.full_name.to_lowercase().contains(&query)
            || self.document_id.to_lowercase().contains(&query)
    }
}

fn validate_name(name: &str) -> SharedResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SharedError::InvalidPatient {
            field: "full_name".to_string(),
            value: name.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_age(age: u8) -> SharedResult<()> {
    if age > MAX_PATIENT_AGE {
        return Err(SharedError::InvalidPatient {
            field: "age".to_string(),
            value: age.to_string(),
        });
    }
    Ok(())
}

fn validate_document(document_id: &str) -> SharedResult<String> {
    let trimmed = document_id.trim();
    if trimmed.is_empty() {
        return Err(SharedError::InvalidPatient {
            field: "document_id".to_string(),
            value: document_id.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Syntactic plausibility only: one `@`, non-empty local part, dotted domain
pub fn validate_email(address: &str) -> SharedResult<String> {
    let trimmed = address.trim();
    let invalid = || SharedError::InvalidPatient {
        field: "email".to_string(),
        value: address.to_string(),
    };

    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    let plausible = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !trimmed.chars().any(char::is_whitespace);

    if plausible { Ok(trimmed.to_string()) } else { Err(invalid()) }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
