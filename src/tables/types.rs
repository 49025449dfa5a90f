//! Shared types for table queries

/// How the backend should count matching rows
#[derive(Debug, Clone, PartialEq)]
pub enum CountOption {
    /// Exact count
    Exact,

    /// Planned count (estimated from the query planner)
    Planned,

    /// Estimated count
    Estimated,
}

impl CountOption {
    /// Token used in the `Prefer: count=` header
    pub fn as_str(&self) -> &'static str {
        match self {
            CountOption::Exact => "exact",
            CountOption::Planned => "planned",
            CountOption::Estimated => "estimated",
        }
    }
}

/// Options for returning data from writes
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOption {
    /// Return representation (the written rows)
    Representation,

    /// Return minimal data
    Minimal,
}

impl ReturnOption {
    /// Token used in the `Prefer: return=` header
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnOption::Representation => "representation",
            ReturnOption::Minimal => "minimal",
        }
    }

    /// Render the Prefer header value for this option
    pub fn prefer(&self) -> String {
        format!("return={}", self.as_str())
    }
}
