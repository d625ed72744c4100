use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::Product;

/// Raw `/submit` body as sent by the form. Everything is untrusted until it
/// passes through `validation::validate_submission`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub meeting_datetime: String,
    #[serde(default)]
    pub meeting_medium: String,
    /// Testing-only webhook override; requires a matching `_testSecret`.
    #[serde(rename = "_webhookUrl")]
    pub webhook_url: Option<String>,
    #[serde(rename = "_testSecret")]
    pub test_secret: Option<String>,
}

/// A submission after normalization and validation. Immutable from here on;
/// `product` being a closed enum guarantees a routing-table entry exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLead {
    pub full_name: String,
    pub email: String,
    /// Digits only, `05` prefix, 10 digits total.
    pub phone: String,
    pub product: Product,
    pub message: Option<String>,
    pub meeting: Option<Meeting>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub medium: Option<String>,
    pub datetime: Option<String>,
}

/// Canonical outbound payload. Built once per accepted submission and sent
/// at most once; the dispatcher never retries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub lead_id: String,
    pub created_at: String,
    pub source: String,
    pub contact: Contact,
    pub product: String,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingPayload>,
    pub routing: Routing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingPayload {
    pub medium: Option<String>,
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Routing {
    pub assignee: String,
}

pub const PAYLOAD_SOURCE: &str = "landing-page";

impl WebhookPayload {
    pub fn from_lead(lead: &ValidatedLead, lead_id: String, created_at: String) -> Self {
        Self {
            lead_id,
            created_at,
            source: PAYLOAD_SOURCE.to_string(),
            contact: Contact {
                full_name: lead.full_name.clone(),
                email: lead.email.clone(),
                phone: lead.phone.clone(),
            },
            product: lead.product.as_str().to_string(),
            message: lead.message.clone(),
            meeting: lead.meeting.as_ref().map(|m| MeetingPayload {
                medium: m.medium.clone(),
                datetime: m.datetime.clone(),
            }),
            routing: Routing {
                assignee: crate::routing::assignee(lead.product).to_string(),
            },
        }
    }
}

/// Uniform `/submit` response envelope. Held fixed across flows: `ok`,
/// `duplicate` and `error` all use the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Ok,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

impl SubmitResponse {
    pub fn ok(message: impl Into<String>, lead_id: String, next_url: String) -> Self {
        Self {
            status: SubmitStatus::Ok,
            message: message.into(),
            next_url: Some(next_url),
            lead_id: Some(lead_id),
            error: None,
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Duplicate,
            message: message.into(),
            next_url: None,
            lead_id: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>, error: ErrorBody) -> Self {
        Self {
            status: SubmitStatus::Error,
            message: message.into(),
            next_url: None,
            lead_id: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Product;

    fn lead() -> ValidatedLead {
        ValidatedLead {
            full_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            phone: "0541112222".to_string(),
            product: Product::Automation,
            message: None,
            meeting: Some(Meeting {
                medium: Some("online".to_string()),
                datetime: Some("2026-09-01T10:00".to_string()),
            }),
        }
    }

    #[test]
    fn payload_serializes_with_camel_case_wire_names() {
        let payload = WebhookPayload::from_lead(
            &lead(),
            "lead-1".to_string(),
            "2026-08-30T12:00:00+00:00".to_string(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["leadId"], "lead-1");
        assert_eq!(json["createdAt"], "2026-08-30T12:00:00+00:00");
        assert_eq!(json["source"], "landing-page");
        assert_eq!(json["contact"]["fullName"], "Jane Doe");
        assert_eq!(json["contact"]["phone"], "0541112222");
        assert_eq!(json["product"], "automation");
        assert_eq!(json["message"], serde_json::Value::Null);
        assert_eq!(json["meeting"]["medium"], "online");
        assert_eq!(json["routing"]["assignee"], "maor");
    }

    #[test]
    fn payload_omits_meeting_when_absent() {
        let mut no_meeting = lead();
        no_meeting.meeting = None;
        let payload = WebhookPayload::from_lead(
            &no_meeting,
            "lead-2".to_string(),
            "2026-08-30T12:00:00+00:00".to_string(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("meeting").is_none());
    }
}
