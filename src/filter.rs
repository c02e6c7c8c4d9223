//! Subscription filters evaluated against event fields

use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator applied by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single predicate over an event field
///
/// A webhook matches an event only if every filter in its list evaluates
/// true (AND semantics). Evaluation is pure: a filter that cannot be
/// applied — unknown field path, non-numeric operands for a numeric
/// comparison — evaluates false rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    /// Field path, with dotted lookup into `data`/`metadata` permitted
    pub field: String,

    /// Comparison operator
    #[serde(rename = "operator")]
    pub op: FilterOp,

    /// Value the field is compared against
    pub value: Value,
}

impl Filter {
    /// Create a new filter
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Evaluate this filter against an event
    pub fn matches(&self, event: &Event) -> bool {
        let Some(actual) = event.field(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Equals => actual == self.value,
            FilterOp::NotEquals => actual != self.value,
            FilterOp::Contains => match (&actual, &self.value) {
                (Value::String(haystack), Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (Value::Array(items), needle) => items.contains(needle),
                _ => false,
            },
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|set| set.contains(&actual)),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                match (actual.as_f64(), self.value.as_f64()) {
                    (Some(lhs), Some(rhs)) => match self.op {
                        FilterOp::Gt => lhs > rhs,
                        FilterOp::Gte => lhs >= rhs,
                        FilterOp::Lt => lhs < rhs,
                        FilterOp::Lte => lhs <= rhs,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
        }
    }
}

/// Evaluate a filter list against an event
///
/// An empty list matches every event.
pub fn matches_all(event: &Event, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types;
    use serde_json::json;

    fn login_event() -> Event {
        Event::new(types::USER_LOGIN)
            .with_user_id("user-1")
            .with_result("failure")
            .with_data("attempts", json!(4))
            .with_data("factors", json!(["password", "totp"]))
            .with_data("note", json!("from new device"))
    }

    #[test]
    fn test_empty_filter_list_matches() {
        assert!(matches_all(&login_event(), &[]));
    }

    #[test]
    fn test_equals_and_not_equals() {
        let event = login_event();

        assert!(Filter::new("result", FilterOp::Equals, json!("failure")).matches(&event));
        assert!(!Filter::new("result", FilterOp::Equals, json!("success")).matches(&event));
        assert!(Filter::new("result", FilterOp::NotEquals, json!("success")).matches(&event));
    }

    #[test]
    fn test_contains_substring_and_membership() {
        let event = login_event();

        assert!(Filter::new("data.note", FilterOp::Contains, json!("new device")).matches(&event));
        assert!(Filter::new("data.factors", FilterOp::Contains, json!("totp")).matches(&event));
        assert!(!Filter::new("data.factors", FilterOp::Contains, json!("sms")).matches(&event));
        // Contains over a number has no meaning and evaluates false
        assert!(!Filter::new("data.attempts", FilterOp::Contains, json!("4")).matches(&event));
    }

    #[test]
    fn test_in_set() {
        let event = login_event();

        let filter = Filter::new("result", FilterOp::In, json!(["failure", "error"]));
        assert!(filter.matches(&event));

        let filter = Filter::new("result", FilterOp::In, json!(["success"]));
        assert!(!filter.matches(&event));

        // A non-array value can never contain the field
        let filter = Filter::new("result", FilterOp::In, json!("failure"));
        assert!(!filter.matches(&event));
    }

    #[test]
    fn test_numeric_comparisons() {
        let event = login_event();

        assert!(Filter::new("data.attempts", FilterOp::Gt, json!(3)).matches(&event));
        assert!(Filter::new("data.attempts", FilterOp::Gte, json!(4)).matches(&event));
        assert!(!Filter::new("data.attempts", FilterOp::Lt, json!(4)).matches(&event));
        assert!(Filter::new("data.attempts", FilterOp::Lte, json!(4.0)).matches(&event));
    }

    #[test]
    fn test_numeric_comparison_on_non_numeric_is_false() {
        let event = login_event();

        assert!(!Filter::new("result", FilterOp::Gt, json!(1)).matches(&event));
        assert!(!Filter::new("data.attempts", FilterOp::Gt, json!("3")).matches(&event));
    }

    #[test]
    fn test_unknown_field_is_false() {
        let event = login_event();

        assert!(!Filter::new("data.missing", FilterOp::Equals, json!("x")).matches(&event));
        // Even a negative operator cannot match an absent field
        assert!(!Filter::new("data.missing", FilterOp::NotEquals, json!("x")).matches(&event));
    }

    #[test]
    fn test_and_semantics() {
        let event = login_event();
        let filters = vec![
            Filter::new("result", FilterOp::Equals, json!("failure")),
            Filter::new("data.attempts", FilterOp::Gte, json!(3)),
        ];
        assert!(matches_all(&event, &filters));

        let filters = vec![
            Filter::new("result", FilterOp::Equals, json!("failure")),
            Filter::new("data.attempts", FilterOp::Gt, json!(10)),
        ];
        assert!(!matches_all(&event, &filters));
    }

    #[test]
    fn test_operator_serde_names() {
        let filter: Filter =
            serde_json::from_value(json!({"field": "result", "operator": "not_equals", "value": "ok"}))
                .unwrap();
        assert_eq!(filter.op, FilterOp::NotEquals);

        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["operator"], "not_equals");
    }
}
