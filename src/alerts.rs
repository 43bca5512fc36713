use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How strongly a petition affects a subscriber's area of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tolerant parse for values produced by non-schema-bound upstreams.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetitionImpact {
    pub petition_number: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub distance_miles: Option<f64>,
}

/// One subscriber's notification: the petitions judged relevant to their
/// registered address and radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    pub email: String,
    pub address: String,
    #[serde(default)]
    pub radius_miles: Option<f64>,
    #[serde(default)]
    pub petitions: Vec<PetitionImpact>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertBatch {
    #[serde(default)]
    pub notifications: Vec<AlertNotification>,
}

impl AlertBatch {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

/// Pull an alert batch out of an upstream agent's reply. The reply is
/// markdown-ish prose that may wrap its JSON in a fenced block; an
/// unparseable reply degrades to an empty batch rather than failing the run.
pub fn parse_agent_message(message: &str) -> AlertBatch {
    let Some(block) = extract_json_block(message) else {
        warn!("no JSON block found in agent reply");
        return AlertBatch::default();
    };

    match serde_json::from_str::<AlertBatch>(block) {
        Ok(batch) => {
            debug!(notifications = batch.notifications.len(), "parsed alert batch");
            batch
        }
        Err(err) => {
            warn!(error = %err, "agent reply JSON did not match the alert schema");
            AlertBatch::default()
        }
    }
}

/// Candidate JSON regions in priority order: a ```json fence, any bare
/// ``` fence, then the outermost brace span.
fn extract_json_block(message: &str) -> Option<&str> {
    if let Some(block) = fenced_block(message, "```json") {
        return Some(block);
    }
    if let Some(block) = fenced_block(message, "```") {
        return Some(block);
    }

    let start = message.find('{')?;
    let end = message.rfind('}')?;
    (end > start).then(|| &message[start..=end])
}

fn fenced_block<'a>(message: &'a str, opener: &str) -> Option<&'a str> {
    let after_opener = message.find(opener)? + opener.len();
    let rest = &message[after_opener..];
    let close = rest.find("```")?;
    let block = rest[..close].trim();
    (!block.is_empty()).then_some(block)
}
