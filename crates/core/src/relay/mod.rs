use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{session::CHOICE_KEY, InterludeError, Result};

/// Payload sent to the submission endpoint once the visitor has answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// The choice made at the end of the experience, if any.
    #[serde(rename = "digDeeper", skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    /// Any other captured keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Submission {
    /// Builds a submission from captured session data. A name is required.
    pub fn from_captured(captured: &BTreeMap<String, String>) -> Result<Self> {
        let mut extra = captured.clone();
        let name = extra
            .remove("name")
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| InterludeError::Relay("name is required".to_string()))?;
        let contact = extra.remove("contact");
        let choice = extra.remove(CHOICE_KEY);

        Ok(Self {
            name,
            contact,
            choice,
            extra,
        })
    }
}

/// Response from the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub success: bool,
    pub message: String,
}

/// Delivers captured visitor data somewhere the site owner can see it.
pub trait SubmissionRelay {
    fn relay(&self, submission: &Submission) -> Result<Receipt>;
}

/// Relay that only writes the submission to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRelay;

impl SubmissionRelay for LogRelay {
    fn relay(&self, submission: &Submission) -> Result<Receipt> {
        tracing::info!(
            name = %submission.name,
            contact = submission.contact.as_deref().unwrap_or(""),
            choice = submission.choice.as_deref().unwrap_or(""),
            extra = submission.extra.len(),
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "form submission"
        );

        Ok(Receipt {
            success: true,
            message: "Thank you! We will be in touch soon.".to_string(),
        })
    }
}
