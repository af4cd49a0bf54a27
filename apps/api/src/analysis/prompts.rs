// All LLM prompt constants for the analysis module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Number of postings requested per discovery call.
pub const DISCOVERY_BATCH_SIZE: usize = 5;

/// Discovery prompt. Replace: {date_anchor}, {count}, {query}
pub const DISCOVERY_PROMPT_TEMPLATE: &str = r#"{date_anchor} Find {count} RECENT internship postings for: "{query}".

Use web search. Only include postings that are currently open.

Return strictly as a JSON ARRAY with this EXACT schema (no extra fields, every field required):
[
  {
    "title": "Software Engineering Intern, Summer 2026",
    "company": "Stripe",
    "location": "San Francisco, CA",
    "snippet": "One or two sentences describing the role",
    "url": "https://direct-link-to-the-posting"
  }
]"#;

/// Detail-fetch prompt. Replace: {date_anchor}, {url}, {title}, {company}
pub const DETAIL_PROMPT_TEMPLATE: &str = r#"{date_anchor} Navigate to {url}. Provide a comprehensive summary for "{title}" at "{company}".
Focus on:
1. ROLE OVERVIEW: The primary purpose of the position.
2. KEY RESPONSIBILITIES: Bullet points of day-to-day tasks.
3. TECHNICAL SKILLS: Required tools, languages, or platforms.
4. QUALIFICATIONS: Degree or experience requirements.

Exclude company history or generic "equal opportunity" text."#;

/// Analysis system prompt. Replace: {date_anchor}, {json_only}
pub const ANALYSIS_SYSTEM_TEMPLATE: &str = "{date_anchor}
You are a very Honest High-Stakes Recruiter for top-tier tech firms (FAANG, OpenAI, NVIDIA, HFT).
Your goal is to provide a REALISTIC, ruthlessly accurate percentage of admission.

CRITICAL LOGIC:
1. PRESTIGE PENALTY: For prestigious firms, 1-3% chance for standard resumes.
2. BRUTAL FEEDBACK: Do not sugarcoat skill gaps.
3. TARGETED IMPROVEMENTS: Provide exactly 3 skills to improve with mastery paths.
4. RESUME REFINEMENT: Analyze resume text and identify high-impact gaps.
5. INTERVIEW PREP: Identify likely technical drill-down topics and specific behavioral scenarios based on the company's known culture.

{json_only}";

/// Stands in for resume text when the resume arrives as a file.
pub const ATTACHED_RESUME_PLACEHOLDER: &str = "See Attached Resume File";

/// Analysis prompt. Replace: {job_text}, {candidate}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"JOB CONTEXT: {job_text}
CANDIDATE DATA: {candidate}

Perform a ruthless correlation analysis. Return ONE JSON object with this EXACT schema:
{
  "matchScore": 0-100,
  "selectivityScore": 0-100,
  "realisticAdmissionProbability": 0-100,
  "executiveSummary": "Two or three blunt sentences",
  "extractedSkills": {"resume": ["string"], "job": ["string"], "overlap": ["string"]},
  "extractedExperience": {"resume": ["string"], "job": ["string"], "overlap": ["string"]},
  "recommendations": [
    {
      "title": "string",
      "description": "string",
      "priority": "High" | "Medium" | "Low",
      "difficulty": "Easy" | "Medium" | "Hard",
      "masterySteps": ["step 1", "step 2", "step 3"]
    }
  ],
  "bulletFeedback": [
    {
      "originalText": "resume line, verbatim",
      "feedback": "what is wrong (optional)",
      "suggestedUpdate": "rewritten line (optional)",
      "needsImprovement": true
    }
  ],
  "interviewPrep": {
    "technicalTopics": ["string"],
    "behavioralPrompts": ["string"],
    "insiderTips": ["string"]
  },
  "coverLetterTips": {
    "keyNarratives": ["string"],
    "tone": "string",
    "mustMentionSkills": ["string"]
  }
}

HARD RULES:
1. `recommendations` has EXACTLY 3 items; each has EXACTLY 3 `masterySteps`
2. Required fields: matchScore, selectivityScore, realisticAdmissionProbability, executiveSummary, recommendations, coverLetterTips, bulletFeedback, interviewPrep
3. `bulletFeedback` follows the resume's line order
4. Ensure 'interviewPrep' is highly tailored to the specific role and company provided"#;
