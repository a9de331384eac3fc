use super::*;

use chrono::Utc;
use rusqlite::{params, params_from_iter};

impl ContactDb {
    // =========================================================================
    // Contacts
    // =========================================================================

    /// Find every contact whose email or phone number exactly matches the
    /// given values, ordered by `created_at` ascending (ties by id).
    ///
    /// Callers must supply at least one criterion; each Some/None shape maps
    /// to its own parameterized query.
    pub fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<DbContact>, DbError> {
        let rows = match (email, phone_number) {
            (Some(email), Some(phone)) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, email, phone_number, linked_id, link_precedence,
                            created_at, updated_at
                     FROM contacts
                     WHERE email = ?1 OR phone_number = ?2
                     ORDER BY created_at, id",
                )?;
                let mapped = stmt.query_map(params![email, phone], Self::map_contact_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            (Some(email), None) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, email, phone_number, linked_id, link_precedence,
                            created_at, updated_at
                     FROM contacts
                     WHERE email = ?1
                     ORDER BY created_at, id",
                )?;
                let mapped = stmt.query_map(params![email], Self::map_contact_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            (None, Some(phone)) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, email, phone_number, linked_id, link_precedence,
                            created_at, updated_at
                     FROM contacts
                     WHERE phone_number = ?1
                     ORDER BY created_at, id",
                )?;
                let mapped = stmt.query_map(params![phone], Self::map_contact_row)?;
                mapped.collect::<Result<Vec<_>, _>>()?
            }
            (None, None) => return Err(DbError::MissingCriteria),
        };
        Ok(rows)
    }

    /// Expand one or more seed contacts to their full cluster(s).
    ///
    /// Each seed resolves to its cluster root (itself when primary, else its
    /// `linked_id`); the result is every contact whose id or linked_id is one
    /// of those roots, in the same deterministic order as the other queries.
    /// A single query suffices because links are always one hop from a primary.
    pub fn find_cluster(&self, seeds: &[DbContact]) -> Result<Vec<DbContact>, DbError> {
        let mut roots: Vec<i64> = Vec::new();
        for seed in seeds {
            let root = seed.root_id();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        // Numbered placeholders so the same id list feeds both IN clauses
        let placeholders = (1..=roots.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, email, phone_number, linked_id, link_precedence,
                    created_at, updated_at
             FROM contacts
             WHERE id IN ({placeholders}) OR linked_id IN ({placeholders})
             ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = stmt.query_map(params_from_iter(roots.iter()), Self::map_contact_row)?;
        Ok(mapped.collect::<Result<Vec<_>, _>>()?)
    }

    /// Insert a new contact with a fresh id and current timestamps.
    pub fn insert_contact(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
        linked_id: Option<i64>,
        link_precedence: LinkPrecedence,
    ) -> Result<DbContact, DbError> {
        if email.is_none() && phone_number.is_none() {
            return Err(DbError::MissingCriteria);
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO contacts (email, phone_number, linked_id, link_precedence,
                                   created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                email,
                phone_number,
                linked_id,
                link_precedence.as_str(),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(DbContact {
            id,
            email: email.map(str::to_string),
            phone_number: phone_number.map(str::to_string),
            linked_id,
            link_precedence,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Demote a contact to secondary, linked under `new_linked_id`.
    ///
    /// No-op when the contact is already secondary with the same target.
    /// Rejected with `LinkCycle` when the target is the contact itself or is
    /// linked under it — links must stay one hop from a primary.
    pub fn demote_contact(&self, id: i64, new_linked_id: i64) -> Result<(), DbError> {
        if id == new_linked_id {
            return Err(DbError::LinkCycle {
                id,
                target: new_linked_id,
            });
        }
        let target = self
            .get_contact(new_linked_id)?
            .ok_or_else(|| DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        if target.linked_id == Some(id) {
            return Err(DbError::LinkCycle {
                id,
                target: new_linked_id,
            });
        }
        let current = self
            .get_contact(id)?
            .ok_or_else(|| DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        if current.link_precedence == LinkPrecedence::Secondary
            && current.linked_id == Some(new_linked_id)
        {
            return Ok(());
        }
        self.conn.execute(
            "UPDATE contacts
             SET link_precedence = 'secondary', linked_id = ?2, updated_at = ?3
             WHERE id = ?1",
            params![id, new_linked_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Repoint every secondary linked under `from` to `to`. Called when a
    /// primary is absorbed into an older cluster so links stay one hop deep.
    /// Returns the number of rows repointed.
    pub fn reparent_secondaries(&self, from: i64, to: i64) -> Result<usize, DbError> {
        let updated = self.conn.execute(
            "UPDATE contacts SET linked_id = ?2, updated_at = ?3 WHERE linked_id = ?1",
            params![from, to, Utc::now().to_rfc3339()],
        )?;
        Ok(updated)
    }

    /// Get a contact by id.
    pub fn get_contact(&self, id: i64) -> Result<Option<DbContact>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, phone_number, linked_id, link_precedence,
                    created_at, updated_at
             FROM contacts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_contact_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Total number of stored contacts.
    pub fn contact_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?)
    }

    /// Helper: map a row to `DbContact`.
    fn map_contact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbContact> {
        let precedence: String = row.get(4)?;
        Ok(DbContact {
            id: row.get(0)?,
            email: row.get(1)?,
            phone_number: row.get(2)?,
            linked_id: row.get(3)?,
            link_precedence: LinkPrecedence::from_str_lossy(&precedence),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
