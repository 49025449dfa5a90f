//! Filter operators for table queries

/// Operator for filter expressions.
///
/// Covers the operators the portal actually issues: scope filters are
/// equality checks, lookups go through `in`, and the intake cursor
/// compare-and-swap uses `eq` against the stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,

    /// Not equal to
    Neq,

    /// Greater than
    Gt,

    /// Greater than or equal to
    Gte,

    /// Less than
    Lt,

    /// Less than or equal to
    Lte,

    /// Like (case sensitive)
    Like,

    /// Like (case insensitive)
    ILike,

    /// Is (null / true / false)
    Is,

    /// In a list of values
    In,
}

impl FilterOperator {
    /// Operator token as it appears in a query string
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::ILike => "ilike",
            FilterOperator::Is => "is",
            FilterOperator::In => "in",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_render_postgrest_prefixes() {
        assert_eq!(FilterOperator::Eq.as_str(), "eq");
        assert_eq!(FilterOperator::ILike.as_str(), "ilike");
        assert_eq!(FilterOperator::Is.as_str(), "is");
        assert_eq!(FilterOperator::In.as_str(), "in");
    }
}
