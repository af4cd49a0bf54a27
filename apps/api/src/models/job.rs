use serde::{Deserialize, Serialize};

/// One posting returned by job discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub snippet: String,
    pub url: String,
}

impl JobPosting {
    /// Job text used when the full posting could not be fetched.
    pub fn fallback_description(&self) -> String {
        format!("{} at {}\n\n{}", self.title, self.company, self.snippet)
    }
}
