//! Employee entry form

use serde_json::{json, Map, Value};

use crate::error::{Error, ValidationErrors};
use crate::forms::{check_email, check_not_future, check_phone, parse_date, put_text, require};
use crate::grid::Row;

/// Draft of an employee record as the staff entry screen collects it
#[derive(Debug, Clone, Default)]
pub struct EmployeeForm {
    pub name: String,

    /// Login email; also the key the session role lookup uses
    pub email: String,

    pub phone: String,

    /// Portal role label: admin, hr or educator
    pub role: String,

    /// Joining date, `YYYY-MM-DD`
    pub date_of_joining: String,

    /// Monthly salary in rupees
    pub salary: Option<f64>,

    /// Center the employee works at
    pub center_id: Option<i64>,

    /// Whether this employee teaches and needs an educator record
    pub is_educator: bool,

    pub qualification: String,
}

impl EmployeeForm {
    /// Check the draft, reporting every problem keyed by field
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "name", &self.name);

        if require(&mut errors, "email", &self.email) {
            check_email(&mut errors, "email", &self.email);
        }
        check_phone(&mut errors, "phone", &self.phone);

        if require(&mut errors, "role", &self.role)
            && !matches!(self.role.trim(), "admin" | "hr" | "educator")
        {
            errors.add("role", "must be admin, hr or educator");
        }

        if self.role.trim() == "educator" && !self.is_educator {
            errors.add("is_educator", "must be set when the role is educator");
        }

        if require(&mut errors, "date_of_joining", &self.date_of_joining) {
            if let Some(date) = parse_date(&mut errors, "date_of_joining", &self.date_of_joining) {
                check_not_future(&mut errors, "date_of_joining", date);
            }
        }

        if let Some(salary) = self.salary {
            if salary < 0.0 {
                errors.add("salary", "must not be negative");
            }
        }

        if self.center_id.is_none() {
            errors.add("center_id", "is required");
        }

        errors.into_result()
    }

    /// Render the draft as an insert row; blanks are left out
    pub fn into_row(self) -> Row {
        let mut row = Map::new();
        put_text(&mut row, "name", &self.name);
        put_text(&mut row, "email", &self.email);
        put_text(&mut row, "phone", &self.phone);
        put_text(&mut row, "role", &self.role);
        put_text(&mut row, "date_of_joining", &self.date_of_joining);
        if let Some(salary) = self.salary {
            row.insert("salary".to_string(), json!(salary));
        }
        if let Some(center_id) = self.center_id {
            row.insert("center_id".to_string(), json!(center_id));
        }
        row.insert("is_educator".to_string(), Value::Bool(self.is_educator));
        put_text(&mut row, "qualification", &self.qualification);
        row
    }
}
