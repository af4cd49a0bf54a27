//! Job detail fetch: condenses a posting page into four labelled sections.

use chrono::NaiveDate;
use tracing::info;

use crate::analysis::prompts::DETAIL_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::{date_anchor, fill_template};
use crate::llm_client::{ModelTier, Oracle, OracleRequest};

/// Fetches and summarizes the posting at `url`.
///
/// Best effort: the summary may be empty. Falling back to the discovery
/// snippet is the caller's job.
pub async fn fetch_job_detail(
    url: &str,
    company: &str,
    title: &str,
    oracle: &dyn Oracle,
    today: NaiveDate,
) -> Result<String, AppError> {
    let anchor = date_anchor(today);
    let prompt = fill_template(
        DETAIL_PROMPT_TEMPLATE,
        &[
            ("date_anchor", anchor.as_str()),
            ("url", url),
            ("title", title),
            ("company", company),
        ],
    );

    let request = OracleRequest::new(ModelTier::Fast)
        .text(prompt)
        .with_web_search();

    let summary = oracle
        .generate(request)
        .await
        .map_err(|e| AppError::Llm(format!("Job detail fetch failed: {e}")))?;

    let summary = summary.trim().to_string();
    info!(
        "Fetched detail for '{title}' at '{company}' ({} chars)",
        summary.len()
    );
    Ok(summary)
}
