//! Product catalog and lead routing.
//!
//! Each product maps to exactly one assignee; the assignee decides where the
//! visitor is sent after a successful submission. Adding a branch means
//! adding a table entry, not new branching logic.

use std::fmt;

/// Closed product catalog. Unknown products are a validation error and never
/// reach the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    WebDevelopment,
    Fullstack,
    Automation,
}

pub const PRODUCTS: [Product; 3] = [
    Product::WebDevelopment,
    Product::Fullstack,
    Product::Automation,
];

const ASSIGNEE_TABLE: [(Product, &str); 3] = [
    (Product::WebDevelopment, "shlomi"),
    (Product::Fullstack, "shlomi"),
    (Product::Automation, "maor"),
];

/// Assignees whose leads are sent to the external scheduling questionnaire
/// instead of the local thank-you page.
const SCHEDULING_ASSIGNEE: &str = "maor";

const FILLOUT_MEETING_URL: &str = "https://forms.fillout.com/t/meeting-maor";
pub const THANK_YOU_URL: &str = "/thank-you";

impl Product {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web-development" => Some(Self::WebDevelopment),
            "fullstack" => Some(Self::Fullstack),
            "automation" => Some(Self::Automation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebDevelopment => "web-development",
            Self::Fullstack => "fullstack",
            Self::Automation => "automation",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn assignee(product: Product) -> &'static str {
    ASSIGNEE_TABLE
        .iter()
        .find(|(p, _)| *p == product)
        .map(|(_, a)| *a)
        .unwrap_or(SCHEDULING_ASSIGNEE)
}

/// Identifying fields embedded in the scheduling destination URL.
#[derive(Debug, Clone)]
pub struct NextUrlParams<'a> {
    pub lead_id: &'a str,
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub assignee: &'a str,
}

/// Post-submission destination: the scheduling assignee gets the prefilled
/// questionnaire, everyone else the static thank-you page.
pub fn next_url(params: &NextUrlParams<'_>) -> String {
    if params.assignee != SCHEDULING_ASSIGNEE {
        return THANK_YOU_URL.to_string();
    }
    format!(
        "{}?leadId={}&fullName={}&email={}&phone={}&assignee={}",
        FILLOUT_MEETING_URL,
        urlencoding::encode(params.lead_id),
        urlencoding::encode(params.full_name),
        urlencoding::encode(params.email),
        urlencoding::encode(params.phone),
        urlencoding::encode(params.assignee),
    )
}
