//! The list of candidates being prepared for invitation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchOutcome, StatusProjection};
use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientEntry {
    pub id: RecipientId,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl RecipientEntry {
    pub fn empty(id: RecipientId) -> Self {
        Self {
            id,
            display_name: String::new(),
            email: String::new(),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientField {
    Name,
    Email,
    Phone,
}

/// One row of a roster file.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterRow {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RecipientEntry>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    /// A fresh roster holds a single blank row, ready to be filled in.
    pub fn new() -> Self {
        Self {
            entries: vec![RecipientEntry::empty(RecipientId(1))],
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_rows(rows: impl IntoIterator<Item = RosterRow>) -> Self {
        let mut roster = Self::empty();
        for row in rows {
            roster.push(row.name, row.email, row.phone);
        }
        roster
    }

    /// Load a JSON array of `{ "name", "email", "phone"? }` objects.
    pub fn load_json(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let rows: Vec<RosterRow> = serde_json::from_slice(&data)?;
        Ok(Self::from_rows(rows))
    }

    fn next_id(&self) -> RecipientId {
        let max = self.entries.iter().map(|e| e.id.0).max().unwrap_or(0);
        RecipientId(max + 1)
    }

    /// Append a blank row and return its id.
    pub fn add(&mut self) -> RecipientId {
        let id = self.next_id();
        self.entries.push(RecipientEntry::empty(id));
        id
    }

    /// Append a filled-in row and return its id.
    pub fn push(
        &mut self,
        display_name: impl Into<String>,
        email: impl Into<String>,
        phone: Option<String>,
    ) -> RecipientId {
        let id = self.next_id();
        self.entries.push(RecipientEntry {
            id,
            display_name: display_name.into(),
            email: email.into(),
            phone: phone.filter(|p| !p.trim().is_empty()),
        });
        id
    }

    /// Remove a row. The last remaining row cannot be removed; clear its
    /// fields instead.
    pub fn remove(&mut self, id: RecipientId) -> Result<RecipientEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(ConsoleError::RecipientNotFound(id.0))?;
        if self.entries.len() == 1 {
            return Err(ConsoleError::LastRecipient);
        }
        Ok(self.entries.remove(index))
    }

    pub fn edit(&mut self, id: RecipientId, field: RecipientField, value: &str) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ConsoleError::RecipientNotFound(id.0))?;
        match field {
            RecipientField::Name => entry.display_name = value.to_string(),
            RecipientField::Email => entry.email = value.to_string(),
            RecipientField::Phone => {
                entry.phone = if value.trim().is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: RecipientId) -> Option<&RecipientEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[RecipientEntry] {
        &self.entries
    }

    /// Copy of the current rows, in order, for a dispatch run.
    pub fn snapshot(&self) -> Vec<RecipientEntry> {
        self.entries.clone()
    }

    /// Rows whose invitation has not been delivered in `projection`.
    ///
    /// Dispatch never prunes by itself; callers that want a repeat run to
    /// skip already-delivered candidates pass this instead of
    /// [`Roster::snapshot`].
    pub fn without_delivered(&self, projection: &StatusProjection) -> Vec<RecipientEntry> {
        self.entries
            .iter()
            .filter(|e| projection.outcome(e.id) != DispatchOutcome::Succeeded)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_roster_has_one_blank_row() {
        let roster = Roster::new();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.entries()[0], RecipientEntry::empty(RecipientId(1)));
    }

    #[test]
    fn ids_are_max_plus_one() {
        let mut roster = Roster::new();
        let second = roster.add();
        let third = roster.add();
        assert_eq!(second, RecipientId(2));
        assert_eq!(third, RecipientId(3));

        roster.remove(second).unwrap();
        assert_eq!(roster.add(), RecipientId(4));

        roster.remove(RecipientId(4)).unwrap();
        roster.remove(third).unwrap();
        assert_eq!(roster.add(), RecipientId(2));
    }

    #[test]
    fn last_row_cannot_be_removed() {
        let mut roster = Roster::new();
        let second = roster.add();
        roster.remove(second).unwrap();

        assert!(matches!(
            roster.remove(RecipientId(1)),
            Err(ConsoleError::LastRecipient)
        ));
        assert_eq!(roster.len(), 1);
        assert!(matches!(
            roster.remove(RecipientId(9)),
            Err(ConsoleError::RecipientNotFound(9))
        ));
    }

    #[test]
    fn empty_roster_starts_at_one() {
        let mut roster = Roster::empty();
        assert!(roster.is_empty());
        assert_eq!(roster.add(), RecipientId(1));
    }

    #[test]
    fn edit_updates_fields_in_place() {
        let mut roster = Roster::new();
        let id = RecipientId(1);
        roster.edit(id, RecipientField::Name, "Ada").unwrap();
        roster.edit(id, RecipientField::Email, "ada@example.com").unwrap();
        roster.edit(id, RecipientField::Phone, "555-0100").unwrap();

        let entry = roster.get(id).unwrap();
        assert_eq!(entry.display_name, "Ada");
        assert_eq!(entry.email, "ada@example.com");
        assert_eq!(entry.phone.as_deref(), Some("555-0100"));

        roster.edit(id, RecipientField::Phone, "  ").unwrap();
        assert!(roster.get(id).unwrap().phone.is_none());
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut roster = Roster::new();
        assert!(matches!(
            roster.remove(RecipientId(9)),
            Err(ConsoleError::RecipientNotFound(9))
        ));
        assert!(roster
            .edit(RecipientId(9), RecipientField::Name, "x")
            .is_err());
    }

    #[test]
    fn from_rows_keeps_order_and_drops_blank_phones() {
        let roster = Roster::from_rows(vec![
            RosterRow {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: Some(" ".into()),
            },
            RosterRow {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                phone: Some("555".into()),
            },
        ]);
        let ids: Vec<_> = roster.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![RecipientId(1), RecipientId(2)]);
        assert!(roster.entries()[0].phone.is_none());
        assert_eq!(roster.entries()[1].phone.as_deref(), Some("555"));
    }

    #[test]
    fn load_json_reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"[{"name":"Ada","email":"ada@example.com"},{"name":"Bob","email":"bob@example.com","phone":"555"}]"#,
        )
        .unwrap();
        let roster = Roster::load_json(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.entries()[1].display_name, "Bob");
    }

    #[test]
    fn without_delivered_skips_succeeded_only() {
        let mut roster = Roster::empty();
        let a = roster.push("Ada", "ada@example.com", None);
        let b = roster.push("Bob", "bob@example.com", None);
        let c = roster.push("Cy", "cy@example.com", None);

        let mut projection = StatusProjection::new();
        projection.advance(a, DispatchOutcome::InFlight).unwrap();
        projection.advance(a, DispatchOutcome::Succeeded).unwrap();
        projection.advance(b, DispatchOutcome::InFlight).unwrap();
        projection
            .advance(
                b,
                DispatchOutcome::Failed {
                    reason: "boom".into(),
                },
            )
            .unwrap();

        let remaining: Vec<_> = roster
            .without_delivered(&projection)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(remaining, vec![b, c]);
    }
}
