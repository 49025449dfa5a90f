//! Student enrollment form

use serde_json::{json, Map};

use crate::error::{Error, ValidationErrors};
use crate::forms::{
    check_email, check_not_future, check_phone, check_year, parse_date, put_text, require,
};
use crate::grid::Row;

/// Draft of a student record as the enrollment screen collects it
#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub name: String,

    /// Date of birth, `YYYY-MM-DD`
    pub dob: String,

    pub gender: String,

    /// Primary diagnosis, free text
    pub diagnosis: String,

    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,

    /// Center the student attends
    pub center_id: Option<i64>,

    /// Program the student is placed in, once assessed
    pub program_id: Option<i64>,

    pub enrollment_year: Option<i32>,

    pub notes: String,
}

impl StudentForm {
    /// Check the draft, reporting every problem keyed by field
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "name", &self.name);

        if require(&mut errors, "dob", &self.dob) {
            if let Some(date) = parse_date(&mut errors, "dob", &self.dob) {
                check_not_future(&mut errors, "dob", date);
            }
        }

        if !self.gender.trim().is_empty()
            && !matches!(self.gender.trim(), "Male" | "Female" | "Other")
        {
            errors.add("gender", "must be Male, Female or Other");
        }

        require(&mut errors, "guardian_name", &self.guardian_name);
        if require(&mut errors, "guardian_phone", &self.guardian_phone) {
            check_phone(&mut errors, "guardian_phone", &self.guardian_phone);
        }
        check_email(&mut errors, "guardian_email", &self.guardian_email);

        if self.center_id.is_none() {
            errors.add("center_id", "is required");
        }

        if let Some(year) = self.enrollment_year {
            check_year(&mut errors, "enrollment_year", year);
        }

        errors.into_result()
    }

    /// Render the draft as an insert row; blanks are left out
    pub fn into_row(self) -> Row {
        let mut row = Map::new();
        put_text(&mut row, "name", &self.name);
        put_text(&mut row, "dob", &self.dob);
        put_text(&mut row, "gender", &self.gender);
        put_text(&mut row, "diagnosis", &self.diagnosis);
        put_text(&mut row, "guardian_name", &self.guardian_name);
        put_text(&mut row, "guardian_phone", &self.guardian_phone);
        put_text(&mut row, "guardian_email", &self.guardian_email);
        if let Some(center_id) = self.center_id {
            row.insert("center_id".to_string(), json!(center_id));
        }
        if let Some(program_id) = self.program_id {
            row.insert("program_id".to_string(), json!(program_id));
        }
        if let Some(year) = self.enrollment_year {
            row.insert("enrollment_year".to_string(), json!(year));
        }
        put_text(&mut row, "notes", &self.notes);
        row
    }
}
