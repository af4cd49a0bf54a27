//! Session runner: owns one `Workflow`, executes its commands against the
//! oracle, and feeds completions back as events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{discovery::discover_jobs, fit::analyze_fit, job_detail::fetch_job_detail};
use crate::llm_client::Oracle;
use crate::workflow::machine::{Command, Event, Snapshot, Workflow, WorkflowError};
use crate::workflow::phases::PHASE_INTERVAL;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The phase timer task and the analysis it belongs to.
struct Ticker {
    ticket: u64,
    handle: JoinHandle<()>,
}

pub struct Session {
    pub id: Uuid,
    workflow: Mutex<Workflow>,
    ticker: Mutex<Option<Ticker>>,
    last_seen: Mutex<Instant>,
    oracle: Arc<dyn Oracle>,
}

impl Session {
    pub fn new(oracle: Arc<dyn Oracle>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            workflow: Mutex::new(Workflow::new()),
            ticker: Mutex::new(None),
            last_seen: Mutex::new(Instant::now()),
            oracle,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.workflow).snapshot()
    }

    /// Applies `event` and starts whatever oracle calls it requests.
    ///
    /// Returns the spawned call tasks. Dropping them detaches the calls; their
    /// completions still reach the workflow.
    pub fn dispatch(self: &Arc<Self>, event: Event) -> Result<Vec<JoinHandle<()>>, WorkflowError> {
        *lock(&self.last_seen) = Instant::now();
        self.apply(event)
    }

    /// Commands run before the workflow lock is released, so timer starts and
    /// stops happen in the same order as the transitions that requested them.
    fn apply(self: &Arc<Self>, event: Event) -> Result<Vec<JoinHandle<()>>, WorkflowError> {
        let mut workflow = lock(&self.workflow);
        let commands = workflow.handle(event)?;
        let handles: Vec<_> = commands
            .into_iter()
            .filter_map(|command| self.execute(command))
            .collect();
        drop(workflow);
        Ok(handles)
    }

    fn execute(self: &Arc<Self>, command: Command) -> Option<JoinHandle<()>> {
        match command {
            Command::Discover { ticket, query } => {
                let session = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let outcome = discover_jobs(&query, session.oracle.as_ref(), today())
                        .await
                        .map_err(|e| e.message());
                    if let Err(message) = &outcome {
                        warn!("Session {} discovery failed: {message}", session.id);
                    }
                    session.complete(Event::SearchCompleted { ticket, outcome });
                }))
            }
            Command::FetchDetail { ticket, posting } => {
                let session = Arc::clone(self);
                Some(tokio::spawn(async move {
                    let outcome = fetch_job_detail(
                        &posting.url,
                        &posting.company,
                        &posting.title,
                        session.oracle.as_ref(),
                        today(),
                    )
                    .await
                    .map_err(|e| e.message());
                    if let Err(message) = &outcome {
                        warn!(
                            "Session {} detail fetch failed, using snippet: {message}",
                            session.id
                        );
                    }
                    session.complete(Event::DetailFetched { ticket, outcome });
                }))
            }
            Command::Analyze {
                ticket,
                resume,
                job_text,
            } => {
                let session = Arc::clone(self);
                Some(tokio::spawn(async move {
                    info!("Session {} analysis started (ticket {ticket})", session.id);
                    let outcome = analyze_fit(&resume, &job_text, session.oracle.as_ref(), today())
                        .await
                        .map_err(|e| e.message());
                    if let Err(message) = &outcome {
                        warn!("Session {} analysis failed: {message}", session.id);
                    }
                    session.complete(Event::AnalysisCompleted { ticket, outcome });
                }))
            }
            Command::StartPhaseTimer { ticket } => {
                self.start_ticker(ticket);
                None
            }
            Command::StopPhaseTimer { ticket } => {
                self.stop_ticker(ticket);
                None
            }
        }
    }

    /// Completions never start new calls, so the returned handles are empty.
    /// They do not count as activity for idle eviction.
    fn complete(self: &Arc<Self>, event: Event) {
        if let Err(e) = self.apply(event) {
            warn!("Session {} dropped a completion: {e}", self.id);
        }
    }

    /// The timer holds a weak reference so a closed session is not kept alive.
    fn start_ticker(self: &Arc<Self>, ticket: u64) {
        let session = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(PHASE_INTERVAL).await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if !session.tick(ticket) {
                    break;
                }
            }
        });
        if let Some(previous) = lock(&self.ticker).replace(Ticker { ticket, handle }) {
            previous.handle.abort();
        }
    }

    /// Advances the phase. Returns false once `ticket` is no longer the
    /// running analysis, which ends the timer loop.
    fn tick(&self, ticket: u64) -> bool {
        let mut workflow = lock(&self.workflow);
        workflow.awaiting_analysis(ticket) && workflow.handle(Event::PhaseTick { ticket }).is_ok()
    }

    fn stop_ticker(&self, ticket: u64) {
        let mut slot = lock(&self.ticker);
        if slot.as_ref().is_some_and(|ticker| ticker.ticket == ticket) {
            if let Some(ticker) = slot.take() {
                ticker.handle.abort();
            }
        }
    }

    #[cfg(test)]
    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }

    /// Stops background work. In-flight oracle calls finish on their own.
    pub fn close(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.handle.abort();
        }
    }
}

/// In-memory session registry. Nothing is persisted.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, oracle: Arc<dyn Oracle>) -> Arc<Session> {
        let session = Session::new(oracle);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        info!("Session {} created", session.id);
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        match self.sessions.write().await.remove(&id) {
            Some(session) => {
                session.close();
                info!("Session {id} closed");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions untouched for longer than `max_idle`. Returns how many.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            let keep = session.idle_for() <= max_idle;
            if !keep {
                session.close();
            }
            keep
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {evicted} idle sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedOracle;
    use crate::llm_client::ModelTier;
    use crate::models::analysis::fixtures::ANALYSIS_JSON;
    use crate::workflow::machine::Step;
    use crate::workflow::phases::LAST_PHASE;

    const FIVE_POSTINGS: &str = r#"[
        {"title": "SWE Intern", "company": "Ramp", "location": "NYC", "snippet": "Cards", "url": "https://ramp.example/1"},
        {"title": "Backend Intern", "company": "Stripe", "location": "SF", "snippet": "Payments APIs", "url": "https://stripe.example/2"},
        {"title": "Data Intern", "company": "Plaid", "location": "SF", "snippet": "Bank data", "url": "https://plaid.example/3"},
        {"title": "Infra Intern", "company": "Brex", "location": "NYC", "snippet": "Infra", "url": "https://brex.example/4"},
        {"title": "ML Intern", "company": "Affirm", "location": "Remote", "snippet": "Credit models", "url": "https://affirm.example/5"}
    ]"#;

    const STRIPE_SUMMARY: &str = "1. ROLE OVERVIEW: Build payments APIs.\n\
        2. KEY RESPONSIBILITIES: Ship services.\n\
        3. TECHNICAL SKILLS: Go, Kafka.\n\
        4. QUALIFICATIONS: BS in CS.";

    /// Routes each request by shape: discovery and detail share the fast tier
    /// but only discovery asks for a JSON array.
    fn fintech_oracle() -> ScriptedOracle {
        ScriptedOracle::new(|request| {
            let prompt = request.prompt_text();
            Ok(match request.tier {
                ModelTier::Deep => ANALYSIS_JSON.to_string(),
                ModelTier::Fast if prompt.contains("Navigate to") => STRIPE_SUMMARY.to_string(),
                ModelTier::Fast => FIVE_POSTINGS.to_string(),
            })
        })
    }

    async fn settle(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_end_to_end_fintech_scenario() {
        let oracle = Arc::new(fintech_oracle());
        let session = Session::new(oracle.clone());

        settle(
            session
                .dispatch(Event::Search("software engineering intern fintech".to_string()))
                .unwrap(),
        )
        .await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Searching);
        assert_eq!(snapshot.search_results.len(), 5);

        settle(session.dispatch(Event::SelectPosting(1)).unwrap()).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Input);
        assert_eq!(snapshot.job_text, STRIPE_SUMMARY);

        session
            .dispatch(Event::EditResumeText("Built 3 ML pipelines...".to_string()))
            .unwrap();
        let handles = session.dispatch(Event::Analyze).unwrap();
        assert_eq!(session.snapshot().step, Step::Analyzing);
        settle(handles).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Result);
        let view = snapshot.result.unwrap();
        assert_eq!(view.admission_odds, "12%");
        assert_eq!(view.improvement_cards.len(), 3);
        assert!(!session.is_ticking());

        let calls = oracle.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].prompt_text().contains("https://stripe.example/2"));
        assert!(calls[2]
            .prompt_text()
            .contains("JOB CONTEXT: 1. ROLE OVERVIEW: Build payments APIs."));
    }

    #[tokio::test]
    async fn test_malformed_discovery_shows_no_results_without_error() {
        let session = Session::new(Arc::new(ScriptedOracle::replying("not json at all")));
        settle(session.dispatch(Event::Search("quant".to_string())).unwrap()).await;
        let snapshot = session.snapshot();
        assert!(snapshot.search_results.is_empty());
        assert!(snapshot.error_message.is_none());
        assert!(snapshot.busy.is_none());
    }

    #[tokio::test]
    async fn test_discovery_transport_failure_sets_advisory() {
        let session = Session::new(Arc::new(ScriptedOracle::failing()));
        settle(session.dispatch(Event::Search("quant".to_string())).unwrap()).await;
        assert_eq!(
            session.snapshot().error_message.as_deref(),
            Some("Discovery failed. Try a more general search.")
        );
    }

    #[tokio::test]
    async fn test_detail_failure_falls_back_to_snippet() {
        let oracle = ScriptedOracle::new(|request| {
            if request.prompt_text().contains("Navigate to") {
                Err(crate::llm_client::LlmError::EmptyContent)
            } else {
                Ok(FIVE_POSTINGS.to_string())
            }
        });
        let session = Session::new(Arc::new(oracle));
        settle(session.dispatch(Event::Search("fintech".to_string())).unwrap()).await;
        settle(session.dispatch(Event::SelectPosting(1)).unwrap()).await;
        assert_eq!(
            session.snapshot().job_text,
            "Backend Intern at Stripe\n\nPayments APIs"
        );
    }

    #[tokio::test]
    async fn test_missing_summary_ends_in_input_with_error() {
        let mut value: serde_json::Value = serde_json::from_str(ANALYSIS_JSON).unwrap();
        value.as_object_mut().unwrap().remove("executiveSummary");
        let session = Session::new(Arc::new(ScriptedOracle::replying(&value.to_string())));

        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        session
            .dispatch(Event::EditJobText("job".to_string()))
            .unwrap();
        settle(session.dispatch(Event::Analyze).unwrap()).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Input);
        assert!(!snapshot.error_message.unwrap_or_default().is_empty());
        assert!(!session.is_ticking());
    }

    #[tokio::test]
    async fn test_no_oracle_call_without_inputs() {
        let oracle = Arc::new(ScriptedOracle::replying(ANALYSIS_JSON));
        let session = Session::new(oracle.clone());
        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        assert!(matches!(
            session.dispatch(Event::Analyze),
            Err(WorkflowError::MissingInputs)
        ));
        tokio::task::yield_now().await;
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_timer_advances_and_clamps() {
        let (oracle, gate) = ScriptedOracle::replying(ANALYSIS_JSON).gated();
        let session = Session::new(Arc::new(oracle));
        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        session
            .dispatch(Event::EditJobText("job".to_string()))
            .unwrap();
        let handles = session.dispatch(Event::Analyze).unwrap();
        assert!(session.is_ticking());

        let phase = |s: &Arc<Session>| s.snapshot().phase.unwrap().index;
        assert_eq!(phase(&session), 0);
        for expected in 1..=3 {
            tokio::time::sleep(PHASE_INTERVAL).await;
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(phase(&session), expected);
        }
        tokio::time::sleep(PHASE_INTERVAL * 10).await;
        assert_eq!(phase(&session), LAST_PHASE);

        gate.notify_one();
        settle(handles).await;
        assert_eq!(session.snapshot().step, Step::Result);
        assert!(!session.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigating_away_stops_timer_and_ignores_result() {
        let (oracle, gate) = ScriptedOracle::replying(ANALYSIS_JSON).gated();
        let session = Session::new(Arc::new(oracle));
        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        session
            .dispatch(Event::EditJobText("job".to_string()))
            .unwrap();
        let handles = session.dispatch(Event::Analyze).unwrap();

        session.dispatch(Event::OpenDiscovery).unwrap();
        assert!(!session.is_ticking());

        gate.notify_one();
        settle(handles).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Searching);
        assert!(snapshot.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_restarts_on_second_analysis() {
        let (oracle, gate) = ScriptedOracle::new(|_| Ok("{}".to_string())).gated();
        let session = Session::new(Arc::new(oracle));
        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        session
            .dispatch(Event::EditJobText("job".to_string()))
            .unwrap();

        let handles = session.dispatch(Event::Analyze).unwrap();
        tokio::time::sleep(PHASE_INTERVAL * 2 + Duration::from_millis(1)).await;
        assert_eq!(session.snapshot().phase.unwrap().index, 2);
        gate.notify_one();
        settle(handles).await;
        assert_eq!(session.snapshot().step, Step::Input);

        let handles = session.dispatch(Event::Analyze).unwrap();
        assert_eq!(session.snapshot().phase.unwrap().index, 0);
        gate.notify_one();
        settle(handles).await;
    }

    fn ready_session(oracle: ScriptedOracle) -> Arc<Session> {
        let session = Session::new(Arc::new(oracle));
        session
            .dispatch(Event::EditResumeText("resume".to_string()))
            .unwrap();
        session
            .dispatch(Event::EditJobText("job".to_string()))
            .unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_started_after_leaving_analysis_winds_down() {
        let (oracle, gate) = ScriptedOracle::replying(ANALYSIS_JSON).gated();
        let session = ready_session(oracle);

        // The analysis transition lands but its commands only run after the
        // user has already navigated away.
        let deferred = lock(&session.workflow).handle(Event::Analyze).unwrap();
        session.dispatch(Event::OpenDiscovery).unwrap();
        let handles: Vec<_> = deferred
            .into_iter()
            .filter_map(|command| session.execute(command))
            .collect();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!session.is_ticking());
        assert!(session.idle_for() >= Duration::from_secs(600));
        assert_eq!(session.snapshot().step, Step::Searching);

        gate.notify_one();
        settle(handles).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.step, Step::Searching);
        assert!(snapshot.result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_stop_from_previous_analysis_keeps_new_timer() {
        let (oracle, _gate) = ScriptedOracle::replying(ANALYSIS_JSON).gated();
        let session = ready_session(oracle);

        let first = lock(&session.workflow).handle(Event::Analyze).unwrap();
        let ticket = match first[0] {
            Command::StartPhaseTimer { ticket } => ticket,
            ref other => panic!("unexpected command {other:?}"),
        };
        assert!(session.execute(first[0].clone()).is_none());

        // The first analysis fails; its stop command is held back until the
        // second analysis has started its own timer.
        let late_stop = lock(&session.workflow)
            .handle(Event::AnalysisCompleted {
                ticket,
                outcome: Err("Deep matching failed: overloaded".to_string()),
            })
            .unwrap();
        assert_eq!(late_stop, vec![Command::StopPhaseTimer { ticket }]);

        let _handles = session.dispatch(Event::Analyze).unwrap();
        for command in late_stop {
            assert!(session.execute(command).is_none());
        }
        assert!(session.is_ticking());

        tokio::time::sleep(PHASE_INTERVAL * 3 + Duration::from_millis(1)).await;
        assert_eq!(session.snapshot().phase.unwrap().index, 3);
        assert!(session.idle_for() >= PHASE_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_running_timer() {
        let (oracle, _gate) = ScriptedOracle::replying(ANALYSIS_JSON).gated();
        let session = ready_session(oracle);
        let _handles = session.dispatch(Event::Analyze).unwrap();
        assert!(session.is_ticking());

        session.close();
        assert!(!session.is_ticking());
    }

    #[tokio::test]
    async fn test_store_create_get_remove() {
        let store = SessionStore::new();
        let session = store
            .create(Arc::new(ScriptedOracle::replying("[]")))
            .await;
        assert!(store.get(session.id).await.is_some());
        assert_eq!(store.len().await, 1);
        assert!(store.remove(session.id).await);
        assert!(!store.remove(session.id).await);
        assert!(store.get(session.id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_evicts_idle_sessions() {
        let store = SessionStore::new();
        let stale = store
            .create(Arc::new(ScriptedOracle::replying("[]")))
            .await;
        tokio::time::advance(Duration::from_secs(120)).await;
        let fresh = store
            .create(Arc::new(ScriptedOracle::replying("[]")))
            .await;

        let evicted = store.evict_idle(Duration::from_secs(60)).await;
        assert_eq!(evicted, 1);
        assert!(store.get(stale.id).await.is_none());
        assert!(store.get(fresh.id).await.is_some());
    }
}
