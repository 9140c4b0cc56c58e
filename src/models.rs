use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{AppError, MISSING_FIELDS_MESSAGE};
use crate::scoring;

/// Partition grouping every lead record.
pub const LEAD_PARTITION_KEY: &str = "Leads";
/// Initial status of a freshly captured lead.
pub const LEAD_STATUS_NEW: &str = "new";
/// Origin tag for leads captured by the website form.
pub const LEAD_SOURCE: &str = "website-form";
/// Placeholder stored for an unanswered service or budget question.
pub const NOT_SPECIFIED: &str = "not-specified";

/// Length of the random part of a row key.
pub const ROW_KEY_SUFFIX_LEN: usize = 9;
const ROW_KEY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// POST body sent by the website contact form.
///
/// Every field is optional here; presence is checked by [`LeadSubmission::validate`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadSubmission {
    #[serde(default, deserialize_with = "form_value")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub budget: Option<String>,
    #[serde(default, deserialize_with = "form_value")]
    pub message: Option<String>,
}

/// Reads a form field the way the browser form's values are judged:
/// strings as-is, numbers and `true` as their text, and `null`, `false`,
/// `0` or `""` as absent.
fn form_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(None),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(true) => Ok(Some("true".to_string())),
        Value::Bool(false) | Value::Null => Ok(None),
        other => Err(de::Error::custom(format!(
            "expected a text value, found {}",
            if other.is_array() { "an array" } else { "an object" }
        ))),
    }
}

/// A submission whose required contact fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: Option<String>,
    pub budget: Option<String>,
    pub message: Option<String>,
}

impl LeadSubmission {
    /// Presence-only validation of `name`, `email` and `phone`.
    ///
    /// No shape checking is done on email or phone values.
    pub fn validate(self) -> Result<ValidLead, AppError> {
        match (
            non_empty(self.name),
            non_empty(self.email),
            non_empty(self.phone),
        ) {
            (Some(name), Some(email), Some(phone)) => Ok(ValidLead {
                name,
                email,
                phone,
                service: self.service,
                budget: self.budget,
                message: self.message,
            }),
            _ => Err(AppError::Validation(MISSING_FIELDS_MESSAGE.to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Follow-up priority derived from service and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Lead entity as written to the table store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub budget: String,
    pub message: String,
    pub status: String,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub date_created: String,
    pub source: String,
    pub estimated_value: u32,
    pub priority: Priority,
}

impl LeadRecord {
    /// Builds the record for a validated lead, applying defaults and scoring.
    ///
    /// `now` drives both the row key prefix and `dateCreated`.
    pub fn new<R: Rng + ?Sized>(lead: ValidLead, now: DateTime<Utc>, rng: &mut R) -> Self {
        let service = non_empty(lead.service).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let budget = non_empty(lead.budget).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let estimated_value = scoring::estimated_value(&budget);
        let priority = scoring::priority_for(&service, &budget);

        Self {
            partition_key: LEAD_PARTITION_KEY.to_string(),
            row_key: generate_row_key(now, rng),
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            service,
            budget,
            message: lead.message.unwrap_or_default(),
            status: LEAD_STATUS_NEW.to_string(),
            date_created: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            source: LEAD_SOURCE.to_string(),
            estimated_value,
            priority,
        }
    }
}

/// Row key of the form `{epoch-millis}-{9 base-36 chars}`.
///
/// Uniqueness is probabilistic: two leads in the same millisecond collide
/// only if they also draw the same suffix.
pub fn generate_row_key<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..ROW_KEY_SUFFIX_LEN)
        .map(|_| ROW_KEY_ALPHABET[rng.gen_range(0..ROW_KEY_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix)
}

/// Success body for a stored lead.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadCreatedResponse {
    pub success: bool,
    pub message: String,
    pub lead_id: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn submission(name: &str, email: &str, phone: &str) -> LeadSubmission {
        LeadSubmission {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            phone: Some(phone.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_required_fields() {
        let lead = submission("A", "a@b.com", "555").validate().unwrap();
        assert_eq!(lead.name, "A");
        assert_eq!(lead.email, "a@b.com");
        assert_eq!(lead.phone, "555");
    }

    #[test]
    fn test_validate_rejects_missing_or_empty() {
        let missing_phone = LeadSubmission {
            phone: None,
            ..submission("A", "a@b.com", "")
        };
        assert!(matches!(
            missing_phone.validate(),
            Err(AppError::Validation(msg)) if msg == MISSING_FIELDS_MESSAGE
        ));
        assert!(submission("", "a@b.com", "555").validate().is_err());
        assert!(submission("A", "", "555").validate().is_err());
    }

    #[test]
    fn test_validate_is_presence_only() {
        // Malformed email and phone values are accepted as-is
        assert!(submission("A", "not-an-email", "x").validate().is_ok());
    }

    #[test]
    fn test_record_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let lead = submission("A", "a@b.com", "555").validate().unwrap();
        let record = LeadRecord::new(lead, now, &mut rng);

        assert_eq!(record.partition_key, "Leads");
        assert_eq!(record.service, "not-specified");
        assert_eq!(record.budget, "not-specified");
        assert_eq!(record.message, "");
        assert_eq!(record.status, "new");
        assert_eq!(record.source, "website-form");
        assert_eq!(record.date_created, "2024-01-15T10:30:00.000Z");
        assert_eq!(record.estimated_value, 0);
        assert_eq!(record.priority, Priority::Low);
        assert!(record
            .row_key
            .starts_with(&format!("{}-", now.timestamp_millis())));
    }

    #[test]
    fn test_record_empty_optional_fields_use_defaults() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(1);
        let lead = LeadSubmission {
            service: Some(String::new()),
            budget: Some(String::new()),
            message: Some("Backyard patio".to_string()),
            ..submission("A", "a@b.com", "555")
        }
        .validate()
        .unwrap();
        let record = LeadRecord::new(lead, now, &mut rng);

        assert_eq!(record.service, NOT_SPECIFIED);
        assert_eq!(record.budget, NOT_SPECIFIED);
        assert_eq!(record.message, "Backyard patio");
    }

    #[test]
    fn test_record_scoring() {
        let mut rng = StdRng::seed_from_u64(3);
        let lead = LeadSubmission {
            service: Some("hardscaping".to_string()),
            budget: Some("10000-25000".to_string()),
            ..submission("A", "a@b.com", "555")
        }
        .validate()
        .unwrap();
        let record = LeadRecord::new(lead, Utc::now(), &mut rng);

        assert_eq!(record.estimated_value, 17_500);
        assert_eq!(record.priority, Priority::High);
    }

    #[test]
    fn test_row_key_shape() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let key = generate_row_key(now, &mut rng);
        let (prefix, suffix) = key.split_once('-').unwrap();

        assert_eq!(prefix, "1700000000123");
        assert_eq!(suffix.len(), ROW_KEY_SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_record_wire_names() {
        let mut rng = StdRng::seed_from_u64(9);
        let lead = submission("A", "a@b.com", "555").validate().unwrap();
        let record = LeadRecord::new(lead, Utc::now(), &mut rng);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["PartitionKey"], "Leads");
        assert!(value["RowKey"].is_string());
        assert!(value["dateCreated"].is_string());
        assert_eq!(value["estimatedValue"], 0);
        assert_eq!(value["priority"], "low");
    }

    #[test]
    fn test_submission_coerces_scalar_values() {
        let parsed: LeadSubmission = serde_json::from_str(
            r#"{"name":false,"email":"a@b.com","phone":5551234,"budget":0,"service":true}"#,
        )
        .unwrap();
        assert!(parsed.name.is_none());
        assert_eq!(parsed.phone.as_deref(), Some("5551234"));
        assert!(parsed.budget.is_none());
        assert_eq!(parsed.service.as_deref(), Some("true"));
    }

    #[test]
    fn test_submission_rejects_structured_values() {
        assert!(serde_json::from_str::<LeadSubmission>(r#"{"name":["A"]}"#).is_err());
        assert!(serde_json::from_str::<LeadSubmission>(r#"{"phone":{"n":1}}"#).is_err());
    }

    #[test]
    fn test_submission_accepts_nulls_and_extra_fields() {
        let parsed: LeadSubmission = serde_json::from_str(
            r#"{"name":"A","email":null,"phone":"555","newsletter":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.name.as_deref(), Some("A"));
        assert!(parsed.email.is_none());
    }
}
