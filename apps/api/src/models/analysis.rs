use serde::{Deserialize, Serialize};

/// Side-by-side term lists: what the candidate shows, what the role asks for,
/// and where they meet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSegment {
    #[serde(default)]
    pub resume: Vec<String>,
    #[serde(default)]
    pub job: Vec<String>,
    #[serde(default)]
    pub overlap: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A targeted improvement with its mastery path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub difficulty: Difficulty,
    /// Exactly three steps per the oracle schema.
    pub mastery_steps: Vec<String>,
}

/// Critique of one resume line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletFeedback {
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_update: Option<String>,
    pub needs_improvement: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrep {
    pub technical_topics: Vec<String>,
    pub behavioral_prompts: Vec<String>,
    pub insider_tips: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterTips {
    #[serde(default)]
    pub key_narratives: Vec<String>,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub must_mention_skills: Vec<String>,
}

/// The full verdict of one fit analysis. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub match_score: f64,
    pub selectivity_score: f64,
    /// 0–100, not clamped locally.
    pub realistic_admission_probability: f64,
    /// Defaulted so that a missing summary reaches validation instead of
    /// failing as a generic parse error.
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub extracted_skills: ExtractionSegment,
    #[serde(default)]
    pub extracted_experience: ExtractionSegment,
    pub recommendations: Vec<Recommendation>,
    pub bullet_feedback: Vec<BulletFeedback>,
    pub interview_prep: InterviewPrep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter_tips: Option<CoverLetterTips>,
}
