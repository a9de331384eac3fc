//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Either an email or a phone number must be provided")]
    MissingCriteria,

    #[error("Demoting contact {id} under {target} would create a link cycle")]
    LinkCycle { id: i64, target: i64 },
}

/// Whether a contact is the canonical record of its cluster or merged under one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }

    /// Parse from SQL string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "primary" => LinkPrecedence::Primary,
            _ => LinkPrecedence::Secondary,
        }
    }
}

/// A row from the `contacts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbContact {
    pub id: i64,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Present iff this record is secondary; points at its cluster's primary.
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
    pub created_at: String,
    pub updated_at: String,
}

impl DbContact {
    /// The id of this contact's cluster root: itself when primary, otherwise
    /// the primary it is linked under.
    pub fn root_id(&self) -> i64 {
        match self.link_precedence {
            LinkPrecedence::Primary => self.id,
            LinkPrecedence::Secondary => self.linked_id.unwrap_or(self.id),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }
}
