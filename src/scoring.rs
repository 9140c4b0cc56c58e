//! Lead scoring derived from the quote form's service and budget selections.

use crate::models::Priority;

/// Services whose projects are typically large enough to follow up first.
pub const HIGH_VALUE_SERVICES: &[&str] = &["landscape-design", "hardscaping", "irrigation"];

/// Budget ranges considered high value.
pub const HIGH_VALUE_BUDGETS: &[&str] = &["10000-25000", "over-25000"];

/// Estimated project value in dollars for a budget range.
///
/// Unknown ranges (including `not-specified`) are worth 0.
pub fn estimated_value(budget: &str) -> u32 {
    match budget {
        "under-1000" => 500,
        "1000-5000" => 3_000,
        "5000-10000" => 7_500,
        "10000-25000" => 17_500,
        "over-25000" => 35_000,
        _ => 0,
    }
}

/// Follow-up priority: `High` when both service and budget are high value,
/// `Medium` when one of them is, `Low` otherwise.
pub fn priority_for(service: &str, budget: &str) -> Priority {
    let service_hit = HIGH_VALUE_SERVICES.contains(&service);
    let budget_hit = HIGH_VALUE_BUDGETS.contains(&budget);

    match (service_hit, budget_hit) {
        (true, true) => Priority::High,
        (true, false) | (false, true) => Priority::Medium,
        (false, false) => Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_value_table() {
        assert_eq!(estimated_value("under-1000"), 500);
        assert_eq!(estimated_value("1000-5000"), 3000);
        assert_eq!(estimated_value("5000-10000"), 7500);
        assert_eq!(estimated_value("10000-25000"), 17500);
        assert_eq!(estimated_value("over-25000"), 35000);
    }

    #[test]
    fn test_estimated_value_unknown_is_zero() {
        assert_eq!(estimated_value("not-specified"), 0);
        assert_eq!(estimated_value(""), 0);
        assert_eq!(estimated_value("OVER-25000"), 0);
    }

    #[test]
    fn test_priority_matrix() {
        assert_eq!(priority_for("hardscaping", "over-25000"), Priority::High);
        assert_eq!(
            priority_for("landscape-design", "10000-25000"),
            Priority::High
        );
        assert_eq!(priority_for("irrigation", "1000-5000"), Priority::Medium);
        assert_eq!(
            priority_for("lawn-maintenance", "over-25000"),
            Priority::Medium
        );
        assert_eq!(priority_for("tree-services", "under-1000"), Priority::Low);
        assert_eq!(priority_for("not-specified", "not-specified"), Priority::Low);
    }
}
