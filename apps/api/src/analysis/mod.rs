// Oracle adapters: job discovery, job detail fetch, fit analysis.
// Plus the read-only projection of a finished analysis.
// All LLM calls go through the Oracle trait; no direct Anthropic calls here.

pub mod discovery;
pub mod fit;
pub mod job_detail;
pub mod prompts;
pub mod view;
