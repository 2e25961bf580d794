//! Database row types, mapped directly from SQLite rows.
//! Distinct from hush-types models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use hush_types::models::{Account, Message, SampleMessage};
use uuid::Uuid;

pub struct AccountRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verify_code: String,
    pub verify_code_expiry: String,
    pub is_verified: bool,
    pub is_accepting_messages: bool,
    pub created_at: String,
}

impl AccountRow {
    pub const COLUMNS: &'static str = "id, username, email, password_hash, verify_code, \
        verify_code_expiry, is_verified, is_accepting_messages, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            verify_code: row.get(4)?,
            verify_code_expiry: row.get(5)?,
            is_verified: row.get(6)?,
            is_accepting_messages: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn account_id(&self) -> Result<Uuid> {
        self.id
            .parse()
            .with_context(|| format!("corrupt account id '{}'", self.id))
    }

    pub fn verify_code_expiry(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.verify_code_expiry)
    }

    pub fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: self.account_id()?,
            created_at: parse_timestamp(&self.created_at)?,
            username: self.username,
            email: self.email,
            is_verified: self.is_verified,
            is_accepting_messages: self.is_accepting_messages,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub content: String,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: self
                .id
                .parse()
                .with_context(|| format!("corrupt message id '{}'", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            content: self.content,
        })
    }
}

pub struct SampleRow {
    pub username: String,
    pub content: String,
    pub created_at: String,
}

impl SampleRow {
    pub fn into_sample(self) -> Result<SampleMessage> {
        Ok(SampleMessage {
            created_at: parse_timestamp(&self.created_at)?,
            content: self.content,
            username: self.username,
        })
    }
}

/// Fixed-width RFC 3339 in UTC, so lexical order in SQL is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("corrupt timestamp '{}'", s))?;
    Ok(ts.with_timezone(&Utc))
}
