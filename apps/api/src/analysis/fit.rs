//! Fit analysis: the deep oracle call that produces an `AnalysisResult`.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::analysis::prompts::{
    ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM_TEMPLATE, ATTACHED_RESUME_PLACEHOLDER,
};
use crate::errors::AppError;
use crate::llm_client::prompts::{date_anchor, fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{parse_json_payload, ModelTier, Oracle, OracleRequest};
use crate::models::analysis::AnalysisResult;
use crate::models::resume::ResumeInput;

pub const MISSING_INPUTS_MESSAGE: &str =
    "A job description and a resume (text or file) are required.";
pub const EMPTY_ANALYSIS_MESSAGE: &str = "Deep analysis failed to return data.";

const EXPECTED_RECOMMENDATIONS: usize = 3;
const EXPECTED_MASTERY_STEPS: usize = 3;

/// True when both inputs needed for an analysis are present.
pub fn inputs_ready(resume: &ResumeInput, job_text: &str) -> bool {
    resume.is_present() && !job_text.trim().is_empty()
}

/// Runs the fit analysis.
///
/// Returns `Validation` without contacting the oracle when inputs are missing.
/// A response without an executive summary counts as a failure.
pub async fn analyze_fit(
    resume: &ResumeInput,
    job_text: &str,
    oracle: &dyn Oracle,
    today: NaiveDate,
) -> Result<AnalysisResult, AppError> {
    if !inputs_ready(resume, job_text) {
        return Err(AppError::Validation(MISSING_INPUTS_MESSAGE.to_string()));
    }

    let request = build_request(resume, job_text, today);

    let text = oracle
        .generate(request)
        .await
        .map_err(|e| AppError::Llm(format!("Deep matching failed: {e}")))?;

    let result: AnalysisResult = parse_json_payload(&text)
        .map_err(|e| AppError::Llm(format!("Analysis response was malformed: {e}")))?;

    if result.executive_summary.trim().is_empty() {
        return Err(AppError::Llm(EMPTY_ANALYSIS_MESSAGE.to_string()));
    }

    check_recommendation_shape(&result);

    info!(
        "Fit analysis complete: match={}, selectivity={}, admission={}",
        result.match_score, result.selectivity_score, result.realistic_admission_probability
    );

    Ok(result)
}

fn build_request(resume: &ResumeInput, job_text: &str, today: NaiveDate) -> OracleRequest {
    let anchor = date_anchor(today);
    let system = fill_template(
        ANALYSIS_SYSTEM_TEMPLATE,
        &[("date_anchor", anchor.as_str()), ("json_only", JSON_ONLY_SYSTEM)],
    );

    let candidate = resume.text().unwrap_or(ATTACHED_RESUME_PLACEHOLDER);
    let prompt = fill_template(
        ANALYSIS_PROMPT_TEMPLATE,
        &[("job_text", job_text.trim()), ("candidate", candidate)],
    );

    let mut request = OracleRequest::new(ModelTier::Deep).system(system);
    if let Some(file) = resume.attachment() {
        request = request.attachment(file.clone());
    }
    request.text(prompt)
}

/// The oracle schema pins these counts; a deviation is logged, not rejected.
fn check_recommendation_shape(result: &AnalysisResult) {
    if result.recommendations.len() != EXPECTED_RECOMMENDATIONS {
        warn!(
            "Expected {EXPECTED_RECOMMENDATIONS} recommendations, got {}",
            result.recommendations.len()
        );
    }
    for rec in &result.recommendations {
        if rec.mastery_steps.len() != EXPECTED_MASTERY_STEPS {
            warn!(
                "Recommendation '{}' has {} mastery steps",
                rec.title,
                rec.mastery_steps.len()
            );
        }
    }
}
