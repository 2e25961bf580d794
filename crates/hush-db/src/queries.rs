use crate::models::{AccountRow, MessageRow, SampleRow, format_timestamp};
use crate::Database;
use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};
use hush_types::models::{Message, PublicProfile, SampleMessage};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction};
use uuid::Uuid;

/// Everything needed to create or refresh an unverified account.
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verify_code: String,
    pub verify_code_expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    /// A fresh unverified account was inserted.
    Created(Uuid),
    /// An existing unverified account got a new credential and code.
    Replaced(Uuid),
    UsernameTaken,
    EmailTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    NotFound,
    AlreadyVerified,
    Expired,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(Message),
    NotFound,
    /// Account exists but is unverified or has turned messages off.
    NotAccepting,
}

impl Database {
    // -- Accounts --

    /// Create an unverified account, or refresh the unverified account that
    /// already holds this email (or, failing that, this username).
    ///
    /// Verified holders of either identity are never touched.
    pub fn signup(&self, new: &NewSignup, now: DateTime<Utc>) -> Result<SignupOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = match signup_in_tx(&tx, new, now) {
                Ok(outcome) => outcome,
                Err(e) => {
                    return match unique_violation(&e) {
                        Some(outcome) => Ok(outcome),
                        None => Err(e.into()),
                    };
                }
            };

            if matches!(outcome, SignupOutcome::Created(_) | SignupOutcome::Replaced(_)) {
                tx.commit()?;
            }
            Ok(outcome)
        })
    }

    /// Check a verification code and flip the account to verified on a
    /// match. Runs under the write lock, so the check and the update can't
    /// be split by another signup.
    pub fn verify_account(
        &self,
        username: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome> {
        self.with_conn_mut(|conn| {
            let Some(row) = query_account(conn, "username = ?1", username)? else {
                return Ok(VerifyOutcome::NotFound);
            };

            if row.is_verified {
                return Ok(VerifyOutcome::AlreadyVerified);
            }
            if now > row.verify_code_expiry()? {
                return Ok(VerifyOutcome::Expired);
            }
            if row.verify_code != code {
                return Ok(VerifyOutcome::Mismatch);
            }

            conn.execute(
                "UPDATE accounts SET is_verified = 1 WHERE id = ?1 AND is_verified = 0",
                [&row.id],
            )?;
            Ok(VerifyOutcome::Verified)
        })
    }

    pub fn get_account_by_id(&self, id: Uuid) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_account_by_username(&self, username: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "username = ?1", username))
    }

    /// Sign-in lookup: the identifier may be either a username or an email.
    pub fn find_account_by_identifier(&self, identifier: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "username = ?1 OR email = ?1", identifier))
    }

    /// A username counts as taken only once its holder is verified.
    pub fn is_username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1 AND is_verified = 1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(taken)
        })
    }

    /// Unverified accounts look exactly like missing ones here.
    pub fn get_public_profile(&self, username: &str) -> Result<Option<PublicProfile>> {
        self.with_conn(|conn| {
            let profile = conn
                .query_row(
                    "SELECT username, is_accepting_messages FROM accounts
                     WHERE username = ?1 AND is_verified = 1",
                    [username],
                    |row| {
                        Ok(PublicProfile {
                            username: row.get(0)?,
                            is_accepting_messages: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(profile)
        })
    }

    /// Returns `None` if the account does not exist.
    pub fn get_accepting_messages(&self, account_id: Uuid) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            let accepting: Option<bool> = conn
                .query_row(
                    "SELECT is_accepting_messages FROM accounts WHERE id = ?1",
                    [account_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(accepting)
        })
    }

    /// Returns `false` if the account does not exist.
    pub fn set_accepting_messages(&self, account_id: Uuid, accepting: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE accounts SET is_accepting_messages = ?2 WHERE id = ?1",
                rusqlite::params![account_id.to_string(), accepting],
            )?;
            Ok(updated == 1)
        })
    }

    // -- Messages --

    /// Append a message to `username`'s inbox if, at this instant, the
    /// account is verified and accepting. Gate and insert are one statement.
    pub fn append_message(
        &self,
        username: &str,
        message_id: Uuid,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome> {
        let now = now.trunc_subsecs(6);
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO messages (id, account_id, content, created_at)
                 SELECT ?1, a.id, ?2, ?3 FROM accounts a
                 WHERE a.username = ?4 AND a.is_verified = 1 AND a.is_accepting_messages = 1",
                rusqlite::params![message_id.to_string(), content, format_timestamp(now), username],
            )?;

            if inserted == 1 {
                return Ok(AppendOutcome::Appended(Message {
                    id: message_id,
                    content: content.to_string(),
                    created_at: now,
                }));
            }

            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(if exists {
                AppendOutcome::NotAccepting
            } else {
                AppendOutcome::NotFound
            })
        })
    }

    /// Newest first. Messages created in the same instant come back latest
    /// insertion first.
    pub fn list_messages(&self, account_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, created_at FROM messages
                 WHERE account_id = ?1
                 ORDER BY created_at DESC, seq DESC",
            )?;

            let rows = stmt
                .query_map([account_id.to_string()], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(MessageRow::into_message).collect()
        })
    }

    /// Remove one message from the owner's inbox. `false` when nothing
    /// matched, including messages that belong to someone else.
    pub fn delete_message(&self, account_id: Uuid, message_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND account_id = ?2",
                [message_id.to_string(), account_id.to_string()],
            )?;
            Ok(deleted == 1)
        })
    }

    /// One random message from each of up to `limit` random verified,
    /// accepting accounts. Content is copied out; nothing links back.
    pub fn sample_messages(&self, limit: u32) -> Result<Vec<SampleMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.username, m.content, m.created_at
                 FROM accounts a
                 JOIN messages m ON m.seq = (
                     SELECT seq FROM messages WHERE account_id = a.id ORDER BY RANDOM() LIMIT 1
                 )
                 WHERE a.is_verified = 1 AND a.is_accepting_messages = 1
                 ORDER BY RANDOM()
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(SampleRow {
                        username: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(SampleRow::into_sample).collect()
        })
    }
}

fn signup_in_tx(
    tx: &Transaction<'_>,
    new: &NewSignup,
    now: DateTime<Utc>,
) -> rusqlite::Result<SignupOutcome> {
    let by_username = query_identity(tx, "username = ?1", &new.username)?;
    if matches!(by_username, Some((_, true))) {
        return Ok(SignupOutcome::UsernameTaken);
    }

    let by_email = query_identity(tx, "email = ?1", &new.email)?;
    let expiry = format_timestamp(new.verify_code_expiry);

    match (by_email, by_username) {
        (Some((_, true)), _) => Ok(SignupOutcome::EmailTaken),
        (Some((id, false)), by_username) => {
            // Another unverified account sitting on the requested username
            // is dropped; it can never have received messages.
            if let Some((other, false)) = by_username {
                if other != id {
                    tx.execute("DELETE FROM accounts WHERE id = ?1", [&other])?;
                }
            }
            tx.execute(
                "UPDATE accounts
                 SET username = ?2, password_hash = ?3, verify_code = ?4, verify_code_expiry = ?5
                 WHERE id = ?1",
                rusqlite::params![id, new.username, new.password_hash, new.verify_code, expiry],
            )?;
            Ok(SignupOutcome::Replaced(parse_id(&id)?))
        }
        (None, Some((id, _))) => {
            tx.execute(
                "UPDATE accounts
                 SET email = ?2, password_hash = ?3, verify_code = ?4, verify_code_expiry = ?5
                 WHERE id = ?1",
                rusqlite::params![id, new.email, new.password_hash, new.verify_code, expiry],
            )?;
            Ok(SignupOutcome::Replaced(parse_id(&id)?))
        }
        (None, None) => {
            tx.execute(
                "INSERT INTO accounts
                 (id, username, email, password_hash, verify_code, verify_code_expiry, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id.to_string(),
                    new.username,
                    new.email,
                    new.password_hash,
                    new.verify_code,
                    expiry,
                    format_timestamp(now),
                ],
            )?;
            Ok(SignupOutcome::Created(new.id))
        }
    }
}

/// `(id, is_verified)` for the account matching `clause`.
fn query_identity(
    conn: &Connection,
    clause: &str,
    value: &str,
) -> rusqlite::Result<Option<(String, bool)>> {
    conn.query_row(
        &format!("SELECT id, is_verified FROM accounts WHERE {clause}"),
        [value],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

fn query_account(conn: &Connection, clause: &str, value: &str) -> Result<Option<AccountRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts WHERE {clause}",
        AccountRow::COLUMNS
    ))?;

    let row = stmt.query_row([value], AccountRow::from_row).optional()?;
    Ok(row)
}

fn parse_id(id: &str) -> rusqlite::Result<Uuid> {
    id.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Map a UNIQUE constraint failure on `accounts` to the identity it hit.
fn unique_violation(err: &rusqlite::Error) -> Option<SignupOutcome> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) if e.code == ErrorCode::ConstraintViolation => {
            if msg.contains("accounts.username") {
                Some(SignupOutcome::UsernameTaken)
            } else if msg.contains("accounts.email") {
                Some(SignupOutcome::EmailTaken)
            } else {
                None
            }
        }
        _ => None,
    }
}
