//! Pending student intake from the application spreadsheet.
//!
//! Guardians apply through a hosted form that appends rows to a
//! spreadsheet. Reviewers work the rows front to back: accept turns a
//! row into a student record, reject skips it, and either decision
//! advances the shared review cursor exactly one row. Rows with no
//! child name are not reviewable; listing claims them when they reach
//! the front.

mod cursor;
mod sheet;

pub use cursor::{
    CursorStore, MemoryCursorStore, TableCursorStore, CURSOR_TABLE, FIRST_DATA_ROW, STUDENT_CURSOR,
};
pub use sheet::{SheetClient, SheetRow, RESPONSES_TAB};

use std::sync::Arc;

use crate::error::Error;
use crate::forms::StudentForm;
use crate::grid::{sanitize_payload, Row};
use crate::schema;
use crate::Portal;

/// Column layout of the responses tab, fixed by the application form
pub mod columns {
    /// Submission timestamp the form stamps on each response
    pub const SUBMITTED_AT: usize = 0;

    /// Child's full name
    pub const CHILD_NAME: usize = 1;

    /// Child's date of birth
    pub const DOB: usize = 2;

    /// Gender as picked on the form
    pub const GENDER: usize = 3;

    /// Diagnosis, free text
    pub const DIAGNOSIS: usize = 4;

    /// Guardian's full name
    pub const GUARDIAN_NAME: usize = 5;

    /// Guardian's phone number
    pub const GUARDIAN_PHONE: usize = 6;

    /// Guardian's email address
    pub const GUARDIAN_EMAIL: usize = 7;

    /// Center the guardian asked for, free text
    pub const CENTER: usize = 8;

    /// Anything else the guardian wrote
    pub const NOTES: usize = 9;

    /// Number of columns the form writes
    pub const WIDTH: usize = 10;
}

/// One parsed application awaiting review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Absolute spreadsheet row this entry came from
    pub row: u32,

    pub submitted_at: String,
    pub child_name: String,
    pub dob: String,
    pub gender: String,
    pub diagnosis: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,

    /// Center name as the guardian typed it
    pub center: String,

    pub notes: String,
}

impl PendingEntry {
    /// Parse a sheet row; rows without a child name are noise
    pub fn parse(row: &SheetRow) -> Option<Self> {
        let get = |index: usize| {
            row.values
                .get(index)
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };

        let child_name = get(columns::CHILD_NAME);
        if child_name.is_empty() {
            return None;
        }

        Some(Self {
            row: row.index,
            submitted_at: get(columns::SUBMITTED_AT),
            child_name,
            dob: get(columns::DOB),
            gender: get(columns::GENDER),
            diagnosis: get(columns::DIAGNOSIS),
            guardian_name: get(columns::GUARDIAN_NAME),
            guardian_phone: get(columns::GUARDIAN_PHONE),
            guardian_email: get(columns::GUARDIAN_EMAIL),
            center: get(columns::CENTER),
            notes: get(columns::NOTES),
        })
    }

    /// Rebuild the spreadsheet row after an edit
    pub fn to_values(&self) -> Vec<String> {
        let mut values = vec![String::new(); columns::WIDTH];
        values[columns::SUBMITTED_AT] = self.submitted_at.clone();
        values[columns::CHILD_NAME] = self.child_name.clone();
        values[columns::DOB] = self.dob.clone();
        values[columns::GENDER] = self.gender.clone();
        values[columns::DIAGNOSIS] = self.diagnosis.clone();
        values[columns::GUARDIAN_NAME] = self.guardian_name.clone();
        values[columns::GUARDIAN_PHONE] = self.guardian_phone.clone();
        values[columns::GUARDIAN_EMAIL] = self.guardian_email.clone();
        values[columns::CENTER] = self.center.clone();
        values[columns::NOTES] = self.notes.clone();
        values
    }

    /// Prefill the enrollment form from this application.
    ///
    /// The reviewer still assigns the center; the name the guardian
    /// asked for is carried into the notes so it is not lost.
    pub fn prefill(&self) -> StudentForm {
        let mut notes = self.notes.clone();
        if !self.center.is_empty() {
            if !notes.is_empty() {
                notes.push('\n');
            }
            notes.push_str("Requested center: ");
            notes.push_str(&self.center);
        }

        StudentForm {
            name: self.child_name.clone(),
            dob: normalize_date(&self.dob),
            gender: self.gender.clone(),
            diagnosis: self.diagnosis.clone(),
            guardian_name: self.guardian_name.clone(),
            guardian_phone: self.guardian_phone.clone(),
            guardian_email: self.guardian_email.clone(),
            center_id: None,
            program_id: None,
            enrollment_year: None,
            notes,
        }
    }
}

/// Bring a typed date into the stored `YYYY-MM-DD` form.
///
/// The form date picker writes ISO dates, but older responses carry
/// `DD/MM/YYYY`. Anything else is left for validation to flag.
fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return raw.to_string();
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Review queue over the responses tab
pub struct IntakeQueue {
    portal: Portal,
    sheet: SheetClient,
    cursor: Arc<dyn CursorStore>,
}

impl IntakeQueue {
    pub(crate) fn new(portal: Portal, sheet: SheetClient, cursor: Arc<dyn CursorStore>) -> Self {
        Self {
            portal,
            sheet,
            cursor,
        }
    }

    /// The first unreviewed spreadsheet row
    pub async fn position(&self) -> Result<u32, Error> {
        self.cursor.position().await
    }

    /// Applications at and after the cursor, oldest first.
    ///
    /// A noise row sitting at the cursor (blank submission, heading
    /// pasted into the tab) is claimed here with the same advance a
    /// reject issues. Entries only ever claim their own row, so an
    /// unlisted noise row in front of them would block the queue for
    /// good. Losing that claim to another reviewer is fine, the
    /// cursor moved either way.
    pub async fn pending(&self) -> Result<Vec<PendingEntry>, Error> {
        let position = self.cursor.position().await?;
        let rows = self.sheet.read_rows(position).await?;

        let mut entries = Vec::new();
        for row in &rows {
            match PendingEntry::parse(row) {
                Some(entry) => entries.push(entry),
                None if entries.is_empty() => {
                    match self.cursor.advance(row.index, row.index + 1).await {
                        Ok(()) | Err(Error::Conflict(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                // noise behind an unprocessed entry stays until a
                // later listing reaches it
                None => {}
            }
        }
        Ok(entries)
    }

    /// Accept an application: validate the reviewed form, claim the
    /// row, then create the student. Returns the created row.
    ///
    /// The claim happens before the insert so two reviewers racing on
    /// the same row cannot both create the student; the loser sees
    /// [`Error::Conflict`] before anything is written.
    pub async fn accept(&self, entry: &PendingEntry, form: StudentForm) -> Result<Row, Error> {
        form.validate()?;
        self.cursor.advance(entry.row, entry.row + 1).await?;

        let draft = sanitize_payload(form.into_row(), schema::primary_key("students"));
        let inserted: Vec<Row> = self
            .portal
            .entity("students")
            .insert(&draft)
            .execute()
            .await?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| Error::database("student insert returned no rows"))
    }

    /// Skip an application without creating anything
    pub async fn reject(&self, entry: &PendingEntry) -> Result<(), Error> {
        self.cursor.advance(entry.row, entry.row + 1).await
    }

    /// Write a corrected application back to the spreadsheet
    pub async fn update_entry(&self, entry: &PendingEntry) -> Result<(), Error> {
        self.sheet.write_row(entry.row, &entry.to_values()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_row(index: u32, values: &[&str]) -> SheetRow {
        SheetRow {
            index,
            values: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn rows_without_a_child_name_are_skipped() {
        assert!(PendingEntry::parse(&response_row(5, &[])).is_none());
        assert!(PendingEntry::parse(&response_row(5, &["2023-09-01", "  "])).is_none());
        assert!(PendingEntry::parse(&response_row(5, &["2023-09-01", "Asha"])).is_some());
    }

    #[test]
    fn short_rows_parse_with_blanks() {
        let entry = PendingEntry::parse(&response_row(7, &["2023-09-01", "Asha Rao", "2014-03-05"]))
            .unwrap();
        assert_eq!(entry.row, 7);
        assert_eq!(entry.child_name, "Asha Rao");
        assert_eq!(entry.dob, "2014-03-05");
        assert_eq!(entry.guardian_name, "");
        assert_eq!(entry.center, "");
    }

    #[test]
    fn edited_entries_rebuild_the_full_row() {
        let mut entry = PendingEntry::parse(&response_row(
            9,
            &[
                "2023-09-01",
                "Asha Rao",
                "2014-03-05",
                "Female",
                "ASD",
                "Priya Rao",
                "9876543210",
                "priya@example.com",
                "Jayanagar",
                "prefers mornings",
            ],
        ))
        .unwrap();

        entry.guardian_phone = "9876500000".to_string();
        let values = entry.to_values();
        assert_eq!(values.len(), columns::WIDTH);
        assert_eq!(values[columns::GUARDIAN_PHONE], "9876500000");
        assert_eq!(values[columns::CENTER], "Jayanagar");
    }

    #[test]
    fn prefill_carries_the_requested_center_into_notes() {
        let entry = PendingEntry::parse(&response_row(
            4,
            &[
                "2023-09-01",
                "Asha Rao",
                "05/03/2014",
                "Female",
                "ASD",
                "Priya Rao",
                "9876543210",
                "priya@example.com",
                "Jayanagar",
                "",
            ],
        ))
        .unwrap();

        let form = entry.prefill();
        assert_eq!(form.name, "Asha Rao");
        assert_eq!(form.dob, "2014-03-05");
        assert_eq!(form.center_id, None);
        assert_eq!(form.notes, "Requested center: Jayanagar");
    }

    #[test]
    fn dates_normalize_when_recognisable() {
        assert_eq!(normalize_date("2014-03-05"), "2014-03-05");
        assert_eq!(normalize_date("05/03/2014"), "2014-03-05");
        assert_eq!(normalize_date("March 5th"), "March 5th");
    }
}
