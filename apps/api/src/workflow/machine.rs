//! The analysis workflow as a deterministic state machine.
//!
//! `Workflow::handle` maps an event to a new state plus the commands the
//! runner must execute. It performs no I/O, so every transition is testable
//! without an oracle or a clock.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::fit::{inputs_ready, MISSING_INPUTS_MESSAGE};
use crate::analysis::view::{self, ResultView};
use crate::models::analysis::AnalysisResult;
use crate::models::job::JobPosting;
use crate::models::resume::{is_supported_mime, Attachment, ResumeInput, ResumeSummary};
use crate::workflow::phases::{next_phase, PhaseView};

pub const DISCOVERY_FAILED_MESSAGE: &str = "Discovery failed. Try a more general search.";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Deep matching failed. Please review inputs.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Input,
    Searching,
    Analyzing,
    Result,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Input => "input",
            Step::Searching => "searching",
            Step::Analyzing => "analyzing",
            Step::Result => "result",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightKind {
    Search,
    Detail,
    Analysis,
}

impl fmt::Display for InFlightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InFlightKind::Search => "job search",
            InFlightKind::Detail => "job detail fetch",
            InFlightKind::Analysis => "fit analysis",
        };
        f.write_str(name)
    }
}

/// The one oracle call a workflow may have outstanding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InFlight {
    Search { ticket: u64 },
    Detail { ticket: u64, posting: JobPosting },
    Analysis { ticket: u64 },
}

impl InFlight {
    pub fn ticket(&self) -> u64 {
        match self {
            InFlight::Search { ticket }
            | InFlight::Detail { ticket, .. }
            | InFlight::Analysis { ticket } => *ticket,
        }
    }

    pub fn kind(&self) -> InFlightKind {
        match self {
            InFlight::Search { .. } => InFlightKind::Search,
            InFlight::Detail { .. } => InFlightKind::Detail,
            InFlight::Analysis { .. } => InFlightKind::Analysis,
        }
    }
}

/// User actions and oracle completions.
#[derive(Debug, Clone)]
pub enum Event {
    EditResumeText(String),
    AttachResume(Attachment),
    EditJobText(String),
    OpenDiscovery,
    ShowInput,
    Search(String),
    SearchCompleted {
        ticket: u64,
        outcome: Result<Vec<JobPosting>, String>,
    },
    SelectPosting(usize),
    DetailFetched {
        ticket: u64,
        outcome: Result<String, String>,
    },
    Analyze,
    AnalysisCompleted {
        ticket: u64,
        outcome: Result<AnalysisResult, String>,
    },
    PhaseTick {
        ticket: u64,
    },
    Reset,
    SelectBullet(Option<usize>),
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::EditResumeText(_) => "edit resume text",
            Event::AttachResume(_) => "attach resume",
            Event::EditJobText(_) => "edit job text",
            Event::OpenDiscovery => "open discovery",
            Event::ShowInput => "show input",
            Event::Search(_) => "search",
            Event::SearchCompleted { .. } => "search completed",
            Event::SelectPosting(_) => "select posting",
            Event::DetailFetched { .. } => "detail fetched",
            Event::Analyze => "analyze",
            Event::AnalysisCompleted { .. } => "analysis completed",
            Event::PhaseTick { .. } => "phase tick",
            Event::Reset => "reset",
            Event::SelectBullet(_) => "select bullet",
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Discover {
        ticket: u64,
        query: String,
    },
    FetchDetail {
        ticket: u64,
        posting: JobPosting,
    },
    Analyze {
        ticket: u64,
        resume: ResumeInput,
        job_text: String,
    },
    StartPhaseTimer {
        ticket: u64,
    },
    /// Only stops the timer started for `ticket`.
    StopPhaseTimer {
        ticket: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("A {0} is already in progress")]
    Busy(InFlightKind),

    #[error("{}", MISSING_INPUTS_MESSAGE)]
    MissingInputs,

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Nothing to select at index {0}")]
    InvalidSelection(usize),

    #[error("Unsupported resume file type '{0}'")]
    UnsupportedAttachment(String),

    #[error("Cannot {event} while in the {step} step")]
    NotAvailable { event: &'static str, step: Step },
}

/// Read model handed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub step: Step,
    pub resume: ResumeSummary,
    pub job_text: String,
    pub search_query: String,
    pub search_results: Vec<JobPosting>,
    pub busy: Option<InFlightKind>,
    pub error_message: Option<String>,
    pub phase: Option<PhaseView>,
    pub result: Option<ResultView>,
}

/// All state for one user's session. Resume and job text are shared between
/// the input and discovery views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    step: Step,
    resume: ResumeInput,
    job_text: String,
    search_query: String,
    search_results: Vec<JobPosting>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    error_message: Option<String>,
    result: Option<AnalysisResult>,
    phase_index: usize,
    selected_bullet: Option<usize>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step,
            resume: self.resume.summary(),
            job_text: self.job_text.clone(),
            search_query: self.search_query.clone(),
            search_results: self.search_results.clone(),
            busy: self.in_flight.as_ref().map(InFlight::kind),
            error_message: self.error_message.clone(),
            phase: (self.step == Step::Analyzing).then(|| PhaseView::at(self.phase_index)),
            result: match (&self.result, self.step) {
                (Some(result), Step::Result) => Some(view::project(result, self.selected_bullet)),
                _ => None,
            },
        }
    }

    /// Applies one event. Rejected events leave the state untouched.
    /// Completions for calls that are no longer outstanding are ignored.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Command>, WorkflowError> {
        let name = event.name();
        match event {
            Event::EditResumeText(text) => {
                self.ensure_editable(name)?;
                self.resume = ResumeInput::from_text(text);
                Ok(vec![])
            }
            Event::AttachResume(file) => {
                self.ensure_editable(name)?;
                if !is_supported_mime(&file.mime_type) {
                    return Err(WorkflowError::UnsupportedAttachment(file.mime_type));
                }
                self.resume = ResumeInput::File(file);
                Ok(vec![])
            }
            Event::EditJobText(text) => {
                self.ensure_editable(name)?;
                if let Some(InFlight::Detail { .. }) = self.in_flight {
                    return Err(WorkflowError::Busy(InFlightKind::Detail));
                }
                self.job_text = text;
                Ok(vec![])
            }
            Event::OpenDiscovery => Ok(self.navigate(Step::Searching)),
            Event::ShowInput => Ok(self.navigate(Step::Input)),
            Event::Search(query) => self.start_search(name, query),
            Event::SearchCompleted { ticket, outcome } => {
                if !matches!(self.in_flight, Some(InFlight::Search { ticket: t }) if t == ticket) {
                    return Ok(vec![]);
                }
                self.in_flight = None;
                match outcome {
                    Ok(results) => self.search_results = results,
                    Err(_) => {
                        self.search_results.clear();
                        self.error_message = Some(DISCOVERY_FAILED_MESSAGE.to_string());
                    }
                }
                Ok(vec![])
            }
            Event::SelectPosting(index) => self.select_posting(name, index),
            Event::DetailFetched { ticket, outcome } => {
                let posting = match self.in_flight.take() {
                    Some(InFlight::Detail { ticket: t, posting }) if t == ticket => posting,
                    other => {
                        self.in_flight = other;
                        return Ok(vec![]);
                    }
                };
                self.job_text = match outcome {
                    Ok(summary) if !summary.trim().is_empty() => summary,
                    _ => posting.fallback_description(),
                };
                Ok(vec![])
            }
            Event::Analyze => self.start_analysis(name),
            Event::AnalysisCompleted { ticket, outcome } => {
                if !self.awaiting_analysis(ticket) {
                    return Ok(vec![]);
                }
                self.in_flight = None;
                match outcome {
                    Ok(result) => {
                        self.result = Some(result);
                        self.selected_bullet = None;
                        self.step = Step::Result;
                    }
                    Err(message) => {
                        self.error_message = Some(if message.trim().is_empty() {
                            ANALYSIS_FAILED_MESSAGE.to_string()
                        } else {
                            message
                        });
                        self.step = Step::Input;
                    }
                }
                Ok(vec![Command::StopPhaseTimer { ticket }])
            }
            Event::PhaseTick { ticket } => {
                if self.awaiting_analysis(ticket) {
                    self.phase_index = next_phase(self.phase_index);
                }
                Ok(vec![])
            }
            Event::Reset => {
                self.ensure_step(name, Step::Result)?;
                *self = Workflow {
                    next_ticket: self.next_ticket,
                    ..Workflow::default()
                };
                Ok(vec![])
            }
            Event::SelectBullet(selection) => {
                self.ensure_step(name, Step::Result)?;
                if let (Some(index), Some(result)) = (selection, &self.result) {
                    if index >= view::flagged_count(result) {
                        return Err(WorkflowError::InvalidSelection(index));
                    }
                }
                self.selected_bullet = selection;
                Ok(vec![])
            }
        }
    }

    fn start_search(&mut self, name: &'static str, query: String) -> Result<Vec<Command>, WorkflowError> {
        self.ensure_not_analyzing(name)?;
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        self.ensure_idle()?;

        let ticket = self.issue_ticket();
        self.step = Step::Searching;
        self.search_query = query.clone();
        self.search_results.clear();
        self.error_message = None;
        self.in_flight = Some(InFlight::Search { ticket });
        Ok(vec![Command::Discover { ticket, query }])
    }

    fn select_posting(&mut self, name: &'static str, index: usize) -> Result<Vec<Command>, WorkflowError> {
        self.ensure_step(name, Step::Searching)?;
        self.ensure_idle()?;
        let posting = self
            .search_results
            .get(index)
            .cloned()
            .ok_or(WorkflowError::InvalidSelection(index))?;

        let ticket = self.issue_ticket();
        self.step = Step::Input;
        self.job_text.clear();
        self.in_flight = Some(InFlight::Detail {
            ticket,
            posting: posting.clone(),
        });
        Ok(vec![Command::FetchDetail { ticket, posting }])
    }

    fn start_analysis(&mut self, name: &'static str) -> Result<Vec<Command>, WorkflowError> {
        self.ensure_step(name, Step::Input)?;
        self.ensure_idle()?;
        if !inputs_ready(&self.resume, &self.job_text) {
            return Err(WorkflowError::MissingInputs);
        }

        let ticket = self.issue_ticket();
        self.step = Step::Analyzing;
        self.error_message = None;
        self.result = None;
        self.selected_bullet = None;
        self.phase_index = 0;
        self.in_flight = Some(InFlight::Analysis { ticket });
        Ok(vec![
            Command::StartPhaseTimer { ticket },
            Command::Analyze {
                ticket,
                resume: self.resume.clone(),
                job_text: self.job_text.clone(),
            },
        ])
    }

    /// Moves between views. Leaving the analyzing step abandons the analysis.
    fn navigate(&mut self, to: Step) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.step == Step::Analyzing && to != Step::Analyzing {
            if let Some(call) = self.in_flight.take() {
                commands.push(Command::StopPhaseTimer {
                    ticket: call.ticket(),
                });
            }
        }
        self.step = to;
        commands
    }

    /// True while `ticket` names the running analysis.
    pub fn awaiting_analysis(&self, ticket: u64) -> bool {
        self.step == Step::Analyzing
            && matches!(self.in_flight, Some(InFlight::Analysis { ticket: t }) if t == ticket)
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        match &self.in_flight {
            Some(call) => Err(WorkflowError::Busy(call.kind())),
            None => Ok(()),
        }
    }

    fn ensure_step(&self, event: &'static str, step: Step) -> Result<(), WorkflowError> {
        if self.step == step {
            Ok(())
        } else {
            Err(WorkflowError::NotAvailable {
                event,
                step: self.step,
            })
        }
    }

    fn ensure_not_analyzing(&self, event: &'static str) -> Result<(), WorkflowError> {
        if self.step == Step::Analyzing {
            Err(WorkflowError::NotAvailable {
                event,
                step: self.step,
            })
        } else {
            Ok(())
        }
    }

    /// Inputs can be edited from the input and discovery views.
    fn ensure_editable(&self, event: &'static str) -> Result<(), WorkflowError> {
        match self.step {
            Step::Input | Step::Searching => Ok(()),
            step => Err(WorkflowError::NotAvailable { event, step }),
        }
    }
}
