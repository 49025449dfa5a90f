//! Payroll entry form

use serde_json::{json, Map};

use crate::error::{Error, ValidationErrors};
use crate::forms::{check_year, put_text};
use crate::grid::Row;

/// Draft of one month's payroll line for one employee
#[derive(Debug, Clone, Default)]
pub struct PayrollForm {
    pub employee_id: Option<i64>,

    /// Calendar month, 1 to 12
    pub month: Option<u32>,

    pub year: Option<i32>,

    /// Base pay in rupees
    pub base_pay: Option<f64>,

    /// Allowances in rupees
    pub allowance: f64,

    /// Deductions in rupees
    pub deduction: f64,

    pub remarks: String,
}

impl PayrollForm {
    /// Net pay after allowances and deductions
    pub fn net_pay(&self) -> f64 {
        self.base_pay.unwrap_or(0.0) + self.allowance - self.deduction
    }

    /// Check the draft, reporting every problem keyed by field
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();

        if self.employee_id.is_none() {
            errors.add("employee_id", "is required");
        }

        match self.month {
            None => errors.add("month", "is required"),
            Some(month) if !(1..=12).contains(&month) => {
                errors.add("month", "must be between 1 and 12")
            }
            Some(_) => {}
        }

        match self.year {
            None => errors.add("year", "is required"),
            Some(year) => check_year(&mut errors, "year", year),
        }

        match self.base_pay {
            None => errors.add("base_pay", "is required"),
            Some(base_pay) if base_pay < 0.0 => errors.add("base_pay", "must not be negative"),
            Some(_) => {}
        }

        if self.allowance < 0.0 {
            errors.add("allowance", "must not be negative");
        }
        if self.deduction < 0.0 {
            errors.add("deduction", "must not be negative");
        }

        if errors.is_empty() && self.net_pay() < 0.0 {
            errors.add("deduction", "must not exceed base pay plus allowance");
        }

        errors.into_result()
    }

    /// Render the draft as an insert row, net pay included
    pub fn into_row(self) -> Row {
        let mut row = Map::new();
        if let Some(employee_id) = self.employee_id {
            row.insert("employee_id".to_string(), json!(employee_id));
        }
        if let Some(month) = self.month {
            row.insert("month".to_string(), json!(month));
        }
        if let Some(year) = self.year {
            row.insert("year".to_string(), json!(year));
        }
        if let Some(base_pay) = self.base_pay {
            row.insert("base_pay".to_string(), json!(base_pay));
        }
        row.insert("allowance".to_string(), json!(self.allowance));
        row.insert("deduction".to_string(), json!(self.deduction));
        row.insert("net_pay".to_string(), json!(self.net_pay()));
        put_text(&mut row, "remarks", &self.remarks);
        row
    }
}
