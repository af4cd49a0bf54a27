//! Result projection: reshapes an `AnalysisResult` into the sections a
//! renderer shows. Filtering and selection only; no scoring happens here.

use serde::Serialize;

use crate::models::analysis::{
    AnalysisResult, BulletFeedback, CoverLetterTips, ExtractionSegment, InterviewPrep,
    Recommendation,
};

/// A term in a comparison panel, flagged when both sides share it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub text: String,
    pub overlap: bool,
}

/// Candidate terms against requirement terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPanel {
    pub candidate: Vec<Term>,
    pub requirements: Vec<Term>,
}

impl ComparisonPanel {
    pub fn from_segment(segment: &ExtractionSegment) -> Self {
        let highlight = |terms: &[String]| -> Vec<Term> {
            terms
                .iter()
                .map(|t| Term {
                    text: t.clone(),
                    overlap: in_overlap(&segment.overlap, t),
                })
                .collect()
        };
        Self {
            candidate: highlight(&segment.resume),
            requirements: highlight(&segment.job),
        }
    }
}

fn in_overlap(overlap: &[String], term: &str) -> bool {
    let term = term.trim();
    overlap.iter().any(|o| o.trim().eq_ignore_ascii_case(term))
}

/// One entry of the "needs work" list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedBullet {
    /// Position within the flagged list, used for selection.
    pub index: usize,
    pub original_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub admission_odds: String,
    pub executive_summary: String,
    pub skills: ComparisonPanel,
    pub experience: ComparisonPanel,
    pub improvement_cards: Vec<Recommendation>,
    pub flagged_bullets: Vec<FlaggedBullet>,
    pub selected_bullet: Option<BulletFeedback>,
    pub interview_prep: InterviewPrep,
    pub cover_letter: Option<CoverLetterTips>,
}

/// Renders a probability as `12%`. Whole numbers drop the decimal point.
pub fn admission_odds(probability: f64) -> String {
    format!("{probability}%")
}

/// Bullets the oracle flagged as needing improvement, in resume order.
pub fn flagged_bullets(result: &AnalysisResult) -> impl Iterator<Item = &BulletFeedback> {
    result.bullet_feedback.iter().filter(|b| b.needs_improvement)
}

pub fn flagged_count(result: &AnalysisResult) -> usize {
    flagged_bullets(result).count()
}

/// Projects a result. `selected` indexes the flagged list; out-of-range
/// selections render as nothing selected.
pub fn project(result: &AnalysisResult, selected: Option<usize>) -> ResultView {
    let flagged: Vec<&BulletFeedback> = flagged_bullets(result).collect();

    ResultView {
        admission_odds: admission_odds(result.realistic_admission_probability),
        executive_summary: result.executive_summary.clone(),
        skills: ComparisonPanel::from_segment(&result.extracted_skills),
        experience: ComparisonPanel::from_segment(&result.extracted_experience),
        improvement_cards: result.recommendations.clone(),
        flagged_bullets: flagged
            .iter()
            .enumerate()
            .map(|(index, b)| FlaggedBullet {
                index,
                original_text: b.original_text.clone(),
            })
            .collect(),
        selected_bullet: selected.and_then(|i| flagged.get(i)).map(|b| (*b).clone()),
        interview_prep: result.interview_prep.clone(),
        cover_letter: result.cover_letter_tips.clone(),
    }
}
