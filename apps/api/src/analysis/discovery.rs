//! Job discovery: asks the oracle to search the web for current postings.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::analysis::prompts::{DISCOVERY_BATCH_SIZE, DISCOVERY_PROMPT_TEMPLATE};
use crate::errors::AppError;
use crate::llm_client::prompts::{date_anchor, fill_template};
use crate::llm_client::{parse_json_payload, ModelTier, Oracle, OracleRequest};
use crate::models::job::JobPosting;

/// Finds a small batch of postings matching `query`.
///
/// A response that does not parse is reported as "no results", not as an error.
/// Transport failures are returned to the caller.
pub async fn discover_jobs(
    query: &str,
    oracle: &dyn Oracle,
    today: NaiveDate,
) -> Result<Vec<JobPosting>, AppError> {
    let anchor = date_anchor(today);
    let count = DISCOVERY_BATCH_SIZE.to_string();
    let prompt = fill_template(
        DISCOVERY_PROMPT_TEMPLATE,
        &[
            ("date_anchor", anchor.as_str()),
            ("count", count.as_str()),
            ("query", query.trim()),
        ],
    );

    let request = OracleRequest::new(ModelTier::Fast)
        .text(prompt)
        .with_web_search();

    let text = oracle
        .generate(request)
        .await
        .map_err(|e| AppError::Llm(format!("Job discovery failed: {e}")))?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    match parse_json_payload::<Vec<JobPosting>>(&text) {
        Ok(postings) => {
            info!("Discovery for '{}' returned {} postings", query.trim(), postings.len());
            Ok(postings)
        }
        Err(e) => {
            warn!("Discovery response did not match the posting schema: {e}");
            Ok(Vec::new())
        }
    }
}
