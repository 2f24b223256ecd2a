//! `vigil simulate`: replay a timed script through a full attempt.
//!
//! Time is simulated: a [`ManualClock`] advances in `tick_ms` steps and the
//! session is ticked at each one, so a script covering ten minutes runs
//! instantly and the same script always yields the same outcome.
//!
//! ```json
//! {
//!   "user_agent": "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0",
//!   "quiz": { "id": "algebra-1", "title": "Algebra", "questions": [] },
//!   "steps": [
//!     { "at_ms": 0, "action": "identity", "name": "Ada", "registration_id": "R-17" },
//!     { "at_ms": 0, "action": "start" },
//!     { "at_ms": 10000, "action": "event", "event": { "type": "window_blur" } },
//!     { "at_ms": 60000, "action": "submit" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vigil_detect::{
    Capability, CapabilityKind, CapabilityTable, DetectError, DetectorEnv, EnvironmentSnapshot,
    PageEvent, StaticEnvironment,
};
use vigil_keypool::{KeyPool, UpstreamError};
use vigil_proctor::{PageContext, ProctorEngine, ProctorNotice, ProctorSnapshot};
use vigil_session::{
    AiService, Collaborators, IntegrityVerdict, MemoryAttemptSink, MemoryViolationLog, QuizRequest,
    QuizSession, Quiz, ScriptedAiBackend, SessionEvent, SessionOutcome, SessionState,
};
use vigil_types::{
    AnswerChoice, AttemptId, Clock, ManualClock, Platform, QuestionId, SystemClock,
    ViolationLogEntry,
};

use crate::config::VigilConfig;

const DEFAULT_TICK_MS: u64 = 250;
const DEFAULT_TAIL_MS: u64 = 10_000;
const DEFAULT_URL: &str = "https://quiz.local/attempt";

/// A simulation script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub user_agent: String,

    #[serde(default = "default_url")]
    pub url: String,

    /// Quiz content. Either this or `generate` is required.
    #[serde(default)]
    pub quiz: Option<Quiz>,

    /// Generate the quiz through the AI collaborator instead.
    #[serde(default)]
    pub generate: Option<QuizRequest>,

    /// Simulated start time. Defaults to now.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Keep ticking after the last step until this offset, or until the
    /// attempt ends.
    #[serde(default)]
    pub run_until_ms: Option<u64>,

    /// Refuse the first N attempt writes.
    #[serde(default)]
    pub persist_failures: u32,

    /// Failures the AI backend returns before answering.
    #[serde(default)]
    pub ai_failures: Vec<UpstreamError>,

    #[serde(default)]
    pub integrity_verdict: Option<IntegrityVerdict>,

    pub steps: Vec<ScriptStep>,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

/// One timed step.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Offset from the simulated start.
    pub at_ms: u64,

    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Identity { name: String, registration_id: String },
    Start,
    Event { event: PageEvent },
    Answer { question: String, choice: AnswerChoice },
    Submit,
    /// Replace what the automation probe sees.
    Environment { snapshot: EnvironmentSnapshot },
    /// Call a page capability, e.g. a canvas export.
    Capability {
        capability: CapabilityKind,
        #[serde(default)]
        input: String,
    },
}

/// Something that happened during the run.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub entry: String,
}

/// What the simulation produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub attempt_id: AttemptId,
    pub platform: Platform,
    pub final_state: SessionState,
    pub outcome: Option<SessionOutcome>,
    pub proctor: ProctorSnapshot,
    pub violation_log: Vec<ViolationLogEntry>,
    pub suppressed_defaults: u32,
    pub integrity: Option<IntegrityVerdict>,
    pub timeline: Vec<TimelineEntry>,
}

/// Page capability that just echoes its input.
struct NativeCapability(CapabilityKind);

impl Capability for NativeCapability {
    fn invoke(&self, input: &str) -> Result<String, DetectError> {
        Ok(format!("{}:{}", self.0, input))
    }
}

pub async fn execute(path: &Path, config: &VigilConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("invalid script {}", path.display()))?;

    let pool = match KeyPool::from_source(
        &config.credentials.source(),
        config.pool.clone(),
        Arc::new(SystemClock),
    ) {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            info!(error = %e, "No AI credentials, integrity review disabled");
            None
        }
    };

    let report = run(script, config, pool).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

struct Simulation {
    session: QuizSession,
    clock: Arc<ManualClock>,
    probe: Arc<StaticEnvironment>,
    capabilities: Arc<CapabilityTable>,
    start: DateTime<Utc>,
    cursor_ms: u64,
    suppressed: u32,
    log: Vec<ViolationLogEntry>,
    timeline: Vec<TimelineEntry>,
}

impl Simulation {
    fn now(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.cursor_ms as i64)
    }

    fn note(&mut self, entry: impl Into<String>) {
        self.timeline.push(TimelineEntry {
            at_ms: self.cursor_ms,
            entry: entry.into(),
        });
    }

    fn record(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            if let SessionEvent::Proctor(ProctorNotice::ViolationLog(entry)) = &event {
                self.log.push(entry.clone());
                continue;
            }
            let line = describe(&event);
            self.note(line);
        }
    }

    async fn advance_to(&mut self, target_ms: u64, tick_ms: u64) {
        while self.cursor_ms < target_ms && !self.session.state().is_terminal() {
            self.cursor_ms = (self.cursor_ms + tick_ms).min(target_ms);
            let now = self.now();
            self.clock.set(now);
            match self.session.tick(now).await {
                Ok(events) => self.record(events),
                Err(e) => self.note(format!("error: {}", e)),
            }
        }
    }

    async fn apply(&mut self, action: StepAction) {
        let now = self.now();
        let result = match action {
            StepAction::Identity {
                name,
                registration_id,
            } => self
                .session
                .submit_identity(&name, &registration_id)
                .map(|()| self.note("identity submitted")),
            StepAction::Start => self.session.acknowledge(now).map(|events| {
                self.note("quiz started");
                self.record(events);
            }),
            StepAction::Event { event } => {
                let response = self.session.handle_event(&event, now);
                if response.suppress_default {
                    self.suppressed += 1;
                }
                self.record(response.events);
                Ok(())
            }
            StepAction::Answer { question, choice } => self
                .session
                .answer(QuestionId::new(question), choice),
            StepAction::Submit => self.session.submit(now).await.map(|outcome| {
                self.note(format!("submitted: {}", outcome.state));
            }),
            StepAction::Environment { snapshot } => {
                self.probe.set(snapshot);
                Ok(())
            }
            StepAction::Capability { capability, input } => {
                if let Err(e) = self.capabilities.invoke(capability, &input) {
                    self.note(format!("capability error: {}", e));
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Script step rejected");
            self.note(format!("rejected: {}", e));
        }
    }
}

/// Run a script to completion.
pub async fn run(
    script: Script,
    config: &VigilConfig,
    pool: Option<Arc<KeyPool>>,
) -> anyhow::Result<SimulationReport> {
    if script.tick_ms == 0 {
        bail!("tick_ms must be positive");
    }

    let mut backend = match script.integrity_verdict.clone() {
        Some(verdict) => ScriptedAiBackend::new(verdict),
        None => ScriptedAiBackend::default(),
    };
    for failure in script.ai_failures.iter().cloned() {
        backend = backend.fail_with(failure);
    }
    let ai = pool.map(|pool| Arc::new(AiService::new(Arc::new(backend), pool)));

    let quiz = match (script.quiz.clone(), script.generate.as_ref(), ai.as_ref()) {
        (Some(quiz), _, _) => quiz,
        (None, Some(request), Some(ai)) => ai.generate_quiz(request).await?,
        (None, Some(_), None) => bail!("quiz generation needs AI credentials"),
        (None, None, _) => bail!("script needs either `quiz` or `generate`"),
    };

    let start = script.start.unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let probe = Arc::new(StaticEnvironment::browser(script.user_agent.clone()));
    let capabilities = Arc::new(
        CapabilityTable::new()
            .with(
                CapabilityKind::CanvasExport,
                Arc::new(NativeCapability(CapabilityKind::CanvasExport)),
            )
            .with(
                CapabilityKind::ClipboardWrite,
                Arc::new(NativeCapability(CapabilityKind::ClipboardWrite)),
            ),
    );
    let env = DetectorEnv::new(capabilities.clone(), probe.clone(), clock.clone());

    let attempt_id = AttemptId::generate();
    let proctor = ProctorEngine::for_page(
        attempt_id,
        env,
        PageContext::new(script.user_agent.clone(), script.url.clone()),
        config.proctor.clone(),
    )?;
    let platform = proctor.platform();

    let mut collaborators = Collaborators::new(
        Arc::new(MemoryAttemptSink::failing(script.persist_failures)),
        Arc::new(MemoryViolationLog::new()),
    );
    if let Some(ai) = ai {
        collaborators = collaborators.with_integrity(ai);
    }

    info!(
        attempt_id = %attempt_id,
        platform = %platform,
        steps = script.steps.len(),
        "Simulation started"
    );

    let mut sim = Simulation {
        session: QuizSession::new(
            Arc::new(quiz),
            proctor,
            collaborators,
            config.session.clone(),
        ),
        clock,
        probe,
        capabilities,
        start,
        cursor_ms: 0,
        suppressed: 0,
        log: Vec::new(),
        timeline: Vec::new(),
    };

    let mut steps = script.steps;
    steps.sort_by_key(|step| step.at_ms);
    let last_ms = steps.last().map(|step| step.at_ms).unwrap_or(0);

    for step in steps {
        sim.advance_to(step.at_ms, script.tick_ms).await;
        if sim.session.state().is_terminal() {
            break;
        }
        sim.apply(step.action).await;
    }

    let until = script
        .run_until_ms
        .unwrap_or(last_ms + DEFAULT_TAIL_MS)
        .max(sim.cursor_ms);
    sim.advance_to(until, script.tick_ms).await;

    let integrity = match sim.session.take_integrity_task() {
        Some(task) => task.await.ok().flatten(),
        None => None,
    };

    let now = sim.clock.now();
    Ok(SimulationReport {
        attempt_id,
        platform,
        final_state: sim.session.state(),
        outcome: sim.session.outcome().cloned(),
        proctor: sim.session.proctor_snapshot(now),
        violation_log: sim.log,
        suppressed_defaults: sim.suppressed,
        integrity,
        timeline: sim.timeline,
    })
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Proctor(notice) => match notice {
            ProctorNotice::Warning { warnings } => format!("warning {}", warnings),
            ProctorNotice::Violation { record, count } => format!(
                "violation {}: {} ({})",
                count,
                record.category.as_str(),
                record.reason
            ),
            ProctorNotice::ViolationLog(entry) => format!("log posted: {}", entry.kind),
            ProctorNotice::Disabled { count, countdown } => format!(
                "disabled after {} violations, countdown {}s",
                count,
                countdown.as_secs()
            ),
            ProctorNotice::ThresholdExceeded { records } => {
                format!("threshold exceeded with {} records", records.len())
            }
        },
        SessionEvent::AutoSubmitStarted { deadline } => {
            format!("auto-submit scheduled for {}", deadline.to_rfc3339())
        }
        SessionEvent::TimeLimitReached => "time limit reached".to_string(),
        SessionEvent::Finished(outcome) => format!("finished: {}", outcome.state),
        SessionEvent::SubmissionFailed {
            submission,
            fatal,
            error,
        } => format!(
            "{:?} submission failed{}: {}",
            submission,
            if *fatal { " (fatal)" } else { "" },
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0";

    fn script(steps: serde_json::Value) -> Script {
        serde_json::from_value(serde_json::json!({
            "user_agent": DESKTOP,
            "start": "2026-01-05T09:00:00Z",
            "quiz": {
                "id": "algebra-1",
                "title": "Algebra",
                "questions": [
                    { "id": "q1", "prompt": "1 + 1", "options": ["1", "2"], "correct": 1 }
                ]
            },
            "steps": steps,
        }))
        .unwrap()
    }

    fn started(mut rest: Vec<serde_json::Value>) -> serde_json::Value {
        let mut steps = vec![
            serde_json::json!({ "at_ms": 0, "action": "identity", "name": "Ada", "registration_id": "R-17" }),
            serde_json::json!({ "at_ms": 0, "action": "start" }),
        ];
        steps.append(&mut rest);
        serde_json::Value::Array(steps)
    }

    fn blur_and_return(at_ms: u64) -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({ "at_ms": at_ms, "action": "event", "event": { "type": "window_blur" } }),
            serde_json::json!({ "at_ms": at_ms + 500, "action": "event", "event": { "type": "window_focus" } }),
        ]
    }

    #[tokio::test]
    async fn clean_attempt_completes() {
        let steps = started(vec![
            serde_json::json!({ "at_ms": 5000, "action": "answer", "question": "q1", "choice": 1 }),
            serde_json::json!({ "at_ms": 6000, "action": "submit" }),
        ]);
        let report = run(script(steps), &VigilConfig::default(), None).await.unwrap();

        assert_eq!(report.final_state, SessionState::Completed);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.attempt.score, 100);
        assert!(!outcome.attempt.is_flagged);
        assert!(report.violation_log.is_empty());
    }

    #[tokio::test]
    async fn three_departures_end_flagged() {
        let mut rest = Vec::new();
        for at in [10_000, 20_000, 30_000] {
            rest.extend(blur_and_return(at));
        }
        let report = run(script(started(rest)), &VigilConfig::default(), None)
            .await
            .unwrap();

        assert_eq!(report.final_state, SessionState::Flagged);
        let outcome = report.outcome.unwrap();
        assert!(outcome.attempt.violation_triggered);
        assert_eq!(outcome.attempt.violation_count, 3);
        assert_eq!(report.violation_log.len(), 3);
        assert!(report
            .timeline
            .iter()
            .any(|t| t.entry.starts_with("disabled after 3")));
    }

    #[tokio::test]
    async fn lost_auto_submit_keeps_its_timeline() {
        let mut rest = Vec::new();
        for at in [10_000, 20_000, 30_000] {
            rest.extend(blur_and_return(at));
        }
        let mut script = script(started(rest));
        script.persist_failures = 2;
        let report = run(script, &VigilConfig::default(), None).await.unwrap();

        assert_eq!(report.final_state, SessionState::Failed);
        assert!(report.outcome.is_none());
        let entries: Vec<&str> = report.timeline.iter().map(|t| t.entry.as_str()).collect();
        assert!(entries.iter().any(|e| e.starts_with("threshold exceeded")));
        assert!(entries.iter().any(|e| e.starts_with("auto-submit scheduled")));
        assert!(entries
            .iter()
            .any(|e| e.starts_with("ViolationTriggered submission failed (fatal)")));
    }

    #[tokio::test]
    async fn blocked_shortcut_and_canvas_export_are_counted() {
        let steps = started(vec![
            serde_json::json!({ "at_ms": 5000, "action": "event", "event": { "type": "key_down", "key": "PrintScreen" } }),
            serde_json::json!({ "at_ms": 6000, "action": "capability", "capability": "canvas_export", "input": "png" }),
        ]);
        let report = run(script(steps), &VigilConfig::default(), None).await.unwrap();

        assert_eq!(report.suppressed_defaults, 1);
        assert_eq!(report.proctor.violations, 2);
        assert_eq!(report.final_state, SessionState::Active);
    }

    #[tokio::test]
    async fn rejected_steps_are_noted() {
        let steps = started(vec![
            serde_json::json!({ "at_ms": 1000, "action": "submit" }),
        ]);
        let report = run(script(steps), &VigilConfig::default(), None).await.unwrap();
        assert!(report
            .timeline
            .iter()
            .any(|t| t.entry.starts_with("rejected")));
        assert_eq!(report.final_state, SessionState::Active);
    }

    #[tokio::test]
    async fn generation_requires_credentials() {
        let mut script = script(started(Vec::new()));
        script.quiz = None;
        script.generate = Some(QuizRequest::new("Algebra", 3));
        let err = run(script, &VigilConfig::default(), None).await.unwrap_err();
        assert!(err.to_string().contains("credentials"));
    }
}
