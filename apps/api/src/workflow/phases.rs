//! Progress phases shown while an analysis is running. Cosmetic only: they
//! advance on a timer and carry no control-flow weight.

use std::time::Duration;

use serde::Serialize;

/// Time between phase advances.
pub const PHASE_INTERVAL: Duration = Duration::from_secs(6);

pub const LOADING_PHASES: [&str; 6] = [
    "Initializing Reasoning Engine...",
    "Crawling job requirements & context...",
    "Factoring in company reputation & selectivity...",
    "Correlating candidate skills to market data...",
    "Calculating realistic admission odds...",
    "Finalizing strategy recommendations...",
];

pub const LAST_PHASE: usize = LOADING_PHASES.len() - 1;

/// Advances by one, holding at the last phase.
pub fn next_phase(index: usize) -> usize {
    (index + 1).min(LAST_PHASE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseView {
    pub index: usize,
    pub label: &'static str,
}

impl PhaseView {
    pub fn at(index: usize) -> Self {
        let index = index.min(LAST_PHASE);
        Self {
            index,
            label: LOADING_PHASES[index],
        }
    }
}
