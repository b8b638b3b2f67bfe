//! Timed exam state machine.
//!
//! The controller is owned by the UI loop and is the only thing that mutates
//! the session. Background work (countdown ticks, document downloads, the
//! submission POST) runs in tokio tasks that report back through one channel;
//! the UI drains it with [`ExamController::check_background_tasks`] or awaits
//! [`ExamController::wait_for_event`].

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, PaperApi};
use crate::document::{DocumentError, DocumentHandle, DocumentLoader, DocumentSlot};
use crate::models::{Paper, SubmissionRecord};

use super::countdown::Countdown;
use super::session::{ExamSession, ExamState, SubmissionResult};
use super::ExamError;

/// Two hours, used when a paper carries no duration.
pub const DEFAULT_DURATION_SECS: u32 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct ExamSettings {
    /// Wall-clock length of one countdown second.
    pub tick_interval: Duration,
    /// Allotted time in seconds for papers without a duration.
    pub default_duration: u32,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            default_duration: DEFAULT_DURATION_SECS,
        }
    }
}

/// Results of background work, delivered to the owning controller.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Tick,
    DocumentLoaded {
        request: u64,
        result: Result<DocumentHandle, DocumentError>,
    },
    SubmissionFinished {
        result: Result<SubmissionRecord, ApiError>,
    },
}

/// What the UI can show for the exam document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Not requested yet, or no longer held.
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
struct PendingFetch {
    request: u64,
    task: JoinHandle<()>,
}

enum Phase {
    NotStarted,
    InProgress {
        countdown: Countdown,
        document: DocumentSlot,
        fetch: Option<PendingFetch>,
        failed: bool,
    },
    Ended {
        time_spent: u32,
    },
    Submitting {
        submission: SubmissionResult,
        // Detached on teardown; the POST is allowed to finish.
        _task: JoinHandle<()>,
    },
    Submitted {
        submission: SubmissionResult,
        record: SubmissionRecord,
    },
    SubmissionFailed {
        time_spent: u32,
    },
}

impl Phase {
    fn state(&self) -> ExamState {
        match self {
            Phase::NotStarted => ExamState::NotStarted,
            Phase::InProgress { .. } => ExamState::InProgress,
            Phase::Ended { .. } => ExamState::Ended,
            Phase::Submitting { .. } => ExamState::Submitting,
            Phase::Submitted { .. } => ExamState::Submitted,
            Phase::SubmissionFailed { .. } => ExamState::SubmissionFailed,
        }
    }
}

pub struct ExamController {
    api: PaperApi,
    loader: DocumentLoader,
    settings: ExamSettings,
    session: ExamSession,
    phase: Phase,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
    next_request: u64,
    last_error: Option<ExamError>,
}

impl ExamController {
    pub fn new(api: PaperApi, loader: DocumentLoader, paper: &Paper, settings: ExamSettings) -> Self {
        let session = ExamSession::new(paper, settings.default_duration);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        info!(
            paper_id = paper.id,
            duration = session.clock().initial(),
            "Exam session opened"
        );
        Self {
            api,
            loader,
            settings,
            session,
            phase: Phase::NotStarted,
            events_tx,
            events_rx,
            next_request: 0,
            last_error: None,
        }
    }

    /// Fetch the paper's metadata and open a session for it.
    pub async fn open(
        api: PaperApi,
        loader: DocumentLoader,
        paper_id: i64,
        settings: ExamSettings,
    ) -> Result<Self, ExamError> {
        let paper = api.fetch_paper(paper_id).await?;
        Ok(Self::new(api, loader, &paper, settings))
    }

    // ===== Observation =====

    pub fn state(&self) -> ExamState {
        self.phase.state()
    }

    pub fn paper_id(&self) -> i64 {
        self.session.paper_id()
    }

    pub fn title(&self) -> &str {
        self.session.title()
    }

    pub fn initial_duration(&self) -> u32 {
        self.session.clock().initial()
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.session.clock().remaining()
    }

    /// The countdown has reached zero. The exam keeps running until ended.
    pub fn time_elapsed(&self) -> bool {
        self.session.clock().is_elapsed()
    }

    pub fn marks(&self) -> Option<i64> {
        self.session.marks()
    }

    pub fn time_spent_seconds(&self) -> Option<u32> {
        match &self.phase {
            Phase::Ended { time_spent } | Phase::SubmissionFailed { time_spent } => {
                Some(*time_spent)
            }
            Phase::Submitting { submission, .. } | Phase::Submitted { submission, .. } => {
                Some(submission.time_spent())
            }
            Phase::NotStarted | Phase::InProgress { .. } => None,
        }
    }

    pub fn document_status(&self) -> DocumentStatus {
        match &self.phase {
            Phase::InProgress {
                document,
                fetch,
                failed,
                ..
            } => {
                if fetch.is_some() {
                    DocumentStatus::Loading
                } else if document.is_held() {
                    DocumentStatus::Ready
                } else if *failed {
                    DocumentStatus::Failed
                } else {
                    DocumentStatus::Idle
                }
            }
            _ => DocumentStatus::Idle,
        }
    }

    /// Local file of the displayed document, while one is held.
    pub fn document_path(&self) -> Option<&Path> {
        match &self.phase {
            Phase::InProgress { document, .. } => document.current().and_then(|h| h.path()),
            _ => None,
        }
    }

    pub fn submission_record(&self) -> Option<&SubmissionRecord> {
        match &self.phase {
            Phase::Submitted { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&ExamError> {
        self.last_error.as_ref()
    }

    /// Take the most recent background failure, if any.
    pub fn take_error(&mut self) -> Option<ExamError> {
        self.last_error.take()
    }

    // ===== Transitions =====

    /// Start the attempt, or retry a failed document load.
    ///
    /// From `NotStarted` this starts the countdown and the document fetch.
    /// In `InProgress` with no document held or loading it retries the fetch
    /// and leaves the countdown alone. Anything else is a no-op.
    pub fn show_paper(&mut self) {
        if matches!(self.phase, Phase::NotStarted) {
            let countdown = Countdown::start(self.settings.tick_interval, self.events_tx.clone());
            self.phase = Phase::InProgress {
                countdown,
                document: DocumentSlot::new(),
                fetch: None,
                failed: false,
            };
            info!(paper_id = self.paper_id(), "Exam started");
            self.start_fetch();
        } else if self.document_missing() {
            info!(paper_id = self.paper_id(), "Retrying document load");
            self.start_fetch();
        } else {
            debug!(state = %self.state(), "show_paper ignored");
        }
    }

    /// Fetch the document again. The held copy is released when the new one
    /// arrives.
    pub fn reload_paper(&mut self) -> Result<(), ExamError> {
        if !matches!(self.phase, Phase::InProgress { .. }) {
            return Err(self.invalid("reload the paper"));
        }
        info!(paper_id = self.paper_id(), "Reloading document");
        self.start_fetch();
        Ok(())
    }

    /// Stop the clock and release the document. Returns the time spent.
    pub fn end_paper(&mut self) -> Result<u32, ExamError> {
        // Ticks already delivered count towards the time spent.
        if matches!(self.phase, Phase::InProgress { .. }) {
            self.check_background_tasks();
        }
        match std::mem::replace(&mut self.phase, Phase::NotStarted) {
            Phase::InProgress {
                mut countdown,
                mut document,
                fetch,
                ..
            } => {
                countdown.stop();
                if let Some(fetch) = fetch {
                    fetch.task.abort();
                }
                document.release();

                let time_spent = self.session.clock().time_spent();
                self.phase = Phase::Ended { time_spent };
                info!(paper_id = self.paper_id(), time_spent, "Exam ended");
                Ok(time_spent)
            }
            other => {
                self.phase = other;
                Err(self.invalid("end the paper"))
            }
        }
    }

    /// Record the candidate's score. Range is checked on submit.
    pub fn set_marks(&mut self, marks: Option<i64>) -> Result<(), ExamError> {
        if !self.state().accepts_marks() {
            return Err(self.invalid("enter marks"));
        }
        self.session.set_marks(marks);
        Ok(())
    }

    /// Validate the marks and send the submission in the background.
    ///
    /// Validation failures leave the state unchanged and make no request.
    pub fn submit(&mut self) -> Result<(), ExamError> {
        let time_spent = match self.phase {
            Phase::Ended { time_spent } | Phase::SubmissionFailed { time_spent } => time_spent,
            _ => return Err(self.invalid("submit")),
        };
        let submission = SubmissionResult::new(time_spent, self.session.marks())?;

        let api = self.api.clone();
        let events = self.events_tx.clone();
        let paper_id = self.paper_id();
        let task = tokio::spawn(async move {
            let result = api.submit(paper_id, &submission).await;
            let _ = events.send(SessionEvent::SubmissionFinished { result });
        });

        info!(
            paper_id,
            time_spent,
            marks = submission.marks(),
            "Submitting exam"
        );
        self.last_error = None;
        self.phase = Phase::Submitting {
            submission,
            _task: task,
        };
        Ok(())
    }

    /// Stop the countdown, cancel any document fetch, and release the
    /// document. Dropping the controller does the same.
    pub fn close(self) {}

    // ===== Background results =====

    /// Apply every queued background result without blocking.
    /// Returns true if anything was applied.
    pub fn check_background_tasks(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            changed = true;
        }
        changed
    }

    /// Wait for the next background result, apply it and anything queued
    /// behind it.
    pub async fn wait_for_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
        self.check_background_tasks();
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Tick => self.on_tick(),
            SessionEvent::DocumentLoaded { request, result } => {
                self.on_document_loaded(request, result)
            }
            SessionEvent::SubmissionFinished { result } => self.on_submission_finished(result),
        }
    }

    fn on_tick(&mut self) {
        if !matches!(self.phase, Phase::InProgress { .. }) {
            return;
        }
        if self.session.clock_mut().tick() {
            info!(paper_id = self.paper_id(), "Time elapsed");
        }
    }

    fn on_document_loaded(&mut self, request: u64, result: Result<DocumentHandle, DocumentError>) {
        let paper_id = self.paper_id();
        let Phase::InProgress {
            document,
            fetch,
            failed,
            ..
        } = &mut self.phase
        else {
            discard(result);
            return;
        };
        if fetch.as_ref().map(|f| f.request) != Some(request) {
            debug!(request, "Discarding stale document result");
            discard(result);
            return;
        }

        *fetch = None;
        match result {
            Ok(handle) => {
                info!(paper_id, bytes = handle.len(), "Document ready");
                *failed = false;
                document.install(handle);
            }
            Err(e) => {
                warn!(paper_id, error = %e, "Document load failed");
                *failed = true;
                self.last_error = Some(ExamError::DocumentLoadFailed(e));
            }
        }
    }

    fn on_submission_finished(&mut self, result: Result<SubmissionRecord, ApiError>) {
        let submission = match self.phase {
            Phase::Submitting { submission, .. } => submission,
            _ => return,
        };
        match result {
            Ok(record) => {
                info!(paper_id = self.paper_id(), record_id = record.id, "Submission accepted");
                self.phase = Phase::Submitted { submission, record };
            }
            Err(e) => {
                warn!(paper_id = self.paper_id(), error = %e, "Submission failed");
                self.phase = Phase::SubmissionFailed {
                    time_spent: submission.time_spent(),
                };
                self.last_error = Some(ExamError::SubmissionNetworkFailure(e));
            }
        }
    }

    // ===== Helpers =====

    fn start_fetch(&mut self) {
        let request = self.next_request;
        self.next_request += 1;

        let loader = self.loader.clone();
        let events = self.events_tx.clone();
        let paper_id = self.paper_id();
        let task = tokio::spawn(async move {
            let result = loader.acquire(paper_id).await;
            let _ = events.send(SessionEvent::DocumentLoaded { request, result });
        });

        match &mut self.phase {
            Phase::InProgress { fetch, failed, .. } => {
                *failed = false;
                if let Some(previous) = fetch.replace(PendingFetch { request, task }) {
                    previous.task.abort();
                }
            }
            _ => task.abort(),
        }
    }

    fn document_missing(&self) -> bool {
        matches!(
            &self.phase,
            Phase::InProgress { document, fetch: None, .. } if !document.is_held()
        )
    }

    fn invalid(&self, action: &'static str) -> ExamError {
        ExamError::InvalidTransition {
            action,
            state: self.state(),
        }
    }
}

impl Drop for ExamController {
    fn drop(&mut self) {
        if let Phase::InProgress {
            countdown,
            document,
            fetch,
            ..
        } = &mut self.phase
        {
            countdown.stop();
            if let Some(fetch) = fetch.take() {
                fetch.task.abort();
            }
            document.release();
        }

        // Results that already arrived are released, never attached.
        self.events_rx.close();
        while let Ok(event) = self.events_rx.try_recv() {
            if let SessionEvent::DocumentLoaded { result, .. } = event {
                discard(result);
            }
        }
        debug!(paper_id = self.session.paper_id(), "Exam session closed");
    }
}

fn discard(result: Result<DocumentHandle, DocumentError>) {
    if let Ok(mut handle) = result {
        handle.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mockito::{Matcher, Mock, Server, ServerGuard};
    use tempfile::TempDir;

    use crate::api::AuthenticatedClient;
    use crate::auth::{CredentialStore, MemoryCredentialStore, SessionData, TokenManager};

    const PAPER_JSON: &str = r#"{
        "id": 1,
        "title": "Physics Paper 1",
        "description": "Mechanics",
        "duration_minutes": 120,
        "total_marks": 100,
        "pdf_path": "uploads/paper_1.pdf"
    }"#;

    struct Harness {
        server: ServerGuard,
        store: Arc<MemoryCredentialStore>,
        api: PaperApi,
        loader: DocumentLoader,
        dir: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            let server = Server::new_async().await;
            let store = Arc::new(MemoryCredentialStore::with_session(SessionData::new(
                "access-1".into(),
                Some("refresh-1".into()),
                Some("candidate".into()),
                false,
            )));
            let http = reqwest::Client::new();
            let tokens = TokenManager::new(http.clone(), server.url(), store.clone());
            let api = PaperApi::new(AuthenticatedClient::new(http, server.url(), tokens));
            let dir = tempfile::tempdir().unwrap();
            let loader = DocumentLoader::new(api.clone(), dir.path().join("documents"));
            Self {
                server,
                store,
                api,
                loader,
                dir,
            }
        }

        fn paper(&self) -> Paper {
            serde_json::from_str(PAPER_JSON).unwrap()
        }

        fn controller(&self) -> ExamController {
            ExamController::new(
                self.api.clone(),
                self.loader.clone(),
                &self.paper(),
                quiet_settings(),
            )
        }

        async fn mock_document(&mut self, body: &str) -> Mock {
            self.server
                .mock("GET", "/papers/1/pdf")
                .match_query(Matcher::UrlEncoded("token".into(), "access-1".into()))
                .with_status(200)
                .with_header("content-type", "application/pdf")
                .with_body(body)
                .create_async()
                .await
        }

        fn document_files(&self) -> usize {
            std::fs::read_dir(self.dir.path().join("documents"))
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    /// Countdown ticks are injected by the tests, so the real one never fires.
    fn quiet_settings() -> ExamSettings {
        ExamSettings {
            tick_interval: Duration::from_secs(3600),
            ..ExamSettings::default()
        }
    }

    fn tick(controller: &ExamController, n: u32) {
        for _ in 0..n {
            controller.events_tx.send(SessionEvent::Tick).unwrap();
        }
    }

    async fn settle(controller: &mut ExamController, done: impl Fn(&ExamController) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(&*controller) {
                controller.wait_for_event().await;
            }
        })
        .await
        .expect("controller did not settle");
    }

    async fn in_progress_with_document(harness: &mut Harness) -> ExamController {
        harness.mock_document("%PDF-1.4 physics").await;
        let mut controller = harness.controller();
        controller.show_paper();
        settle(&mut controller, |c| c.document_status() == DocumentStatus::Ready).await;
        controller
    }

    #[tokio::test]
    async fn test_full_attempt_submits_time_spent_and_marks() {
        let mut harness = Harness::new().await;
        harness
            .server
            .mock("GET", "/papers/1")
            .with_status(200)
            .with_body(PAPER_JSON)
            .create_async()
            .await;
        harness.mock_document("%PDF-1.4 physics").await;
        let submit = harness
            .server
            .mock("POST", "/papers/1/submit")
            .match_header("authorization", "Bearer access-1")
            .match_body(Matcher::Json(serde_json::json!({"time_spent": 45, "marks": 82})))
            .with_status(200)
            .with_body(r#"{"id": 9, "paper_id": 1, "user_id": 3, "time_spent": 45, "marks": 82}"#)
            .expect(1)
            .create_async()
            .await;

        let mut controller = ExamController::open(
            harness.api.clone(),
            harness.loader.clone(),
            1,
            quiet_settings(),
        )
        .await
        .expect("open");
        assert_eq!(controller.state(), ExamState::NotStarted);
        assert_eq!(controller.seconds_remaining(), 7200);
        assert_eq!(controller.document_path(), None);

        controller.show_paper();
        assert_eq!(controller.state(), ExamState::InProgress);
        settle(&mut controller, |c| c.document_status() == DocumentStatus::Ready).await;
        let path = controller.document_path().expect("document").to_path_buf();
        assert!(path.exists());

        tick(&controller, 45);
        controller.check_background_tasks();
        assert_eq!(controller.seconds_remaining(), 7155);

        assert_eq!(controller.end_paper().unwrap(), 45);
        assert_eq!(controller.state(), ExamState::Ended);
        assert_eq!(controller.time_spent_seconds(), Some(45));
        assert!(!path.exists());
        assert_eq!(controller.document_path(), None);

        controller.set_marks(Some(82)).unwrap();
        controller.submit().unwrap();
        assert_eq!(controller.state(), ExamState::Submitting);
        settle(&mut controller, |c| c.state() != ExamState::Submitting).await;

        assert_eq!(controller.state(), ExamState::Submitted);
        assert_eq!(controller.submission_record().map(|r| r.id), Some(9));
        assert_eq!(controller.time_spent_seconds(), Some(45));
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_requires_valid_marks() {
        let mut harness = Harness::new().await;
        let submit = harness
            .server
            .mock("POST", "/papers/1/submit")
            .expect(0)
            .create_async()
            .await;
        let mut controller = in_progress_with_document(&mut harness).await;
        tick(&controller, 10);
        controller.check_background_tasks();
        controller.end_paper().unwrap();

        assert!(matches!(controller.submit(), Err(ExamError::MissingMarks)));
        assert_eq!(controller.state(), ExamState::Ended);

        controller.set_marks(Some(150)).unwrap();
        assert!(matches!(controller.submit(), Err(ExamError::OutOfRange(150))));
        assert_eq!(controller.state(), ExamState::Ended);

        controller.set_marks(Some(-3)).unwrap();
        assert!(matches!(controller.submit(), Err(ExamError::OutOfRange(-3))));
        assert_eq!(controller.state(), ExamState::Ended);
        assert_eq!(controller.time_spent_seconds(), Some(10));

        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_actions_outside_their_states_are_rejected() {
        let mut harness = Harness::new().await;
        let mut controller = harness.controller();

        assert!(matches!(
            controller.end_paper(),
            Err(ExamError::InvalidTransition {
                state: ExamState::NotStarted,
                ..
            })
        ));
        assert!(matches!(
            controller.submit(),
            Err(ExamError::InvalidTransition { .. })
        ));
        assert!(matches!(
            controller.set_marks(Some(50)),
            Err(ExamError::InvalidTransition { .. })
        ));
        assert!(controller.reload_paper().is_err());
        assert_eq!(controller.state(), ExamState::NotStarted);
        drop(controller);

        let mut controller = in_progress_with_document(&mut harness).await;
        assert!(controller.submit().is_err());
        assert!(controller.set_marks(Some(10)).is_err());
        assert_eq!(controller.state(), ExamState::InProgress);

        controller.end_paper().unwrap();
        assert!(matches!(
            controller.end_paper(),
            Err(ExamError::InvalidTransition {
                state: ExamState::Ended,
                ..
            })
        ));

        // show paper after the attempt has ended does nothing
        controller.show_paper();
        assert_eq!(controller.state(), ExamState::Ended);
        assert_eq!(controller.document_status(), DocumentStatus::Idle);
    }

    #[tokio::test]
    async fn test_countdown_clamps_at_zero_and_freezes_after_end() {
        let mut harness = Harness::new().await;
        harness.mock_document("%PDF").await;
        let paper = Paper {
            duration_minutes: 1,
            ..harness.paper()
        };
        let mut controller = ExamController::new(
            harness.api.clone(),
            harness.loader.clone(),
            &paper,
            quiet_settings(),
        );
        assert_eq!(controller.initial_duration(), 60);

        controller.show_paper();
        tick(&controller, 75);
        controller.check_background_tasks();
        assert_eq!(controller.seconds_remaining(), 0);
        assert!(controller.time_elapsed());
        assert_eq!(controller.state(), ExamState::InProgress);

        assert_eq!(controller.end_paper().unwrap(), 60);
        tick(&controller, 5);
        controller.check_background_tasks();
        assert_eq!(controller.seconds_remaining(), 0);
        assert_eq!(controller.time_spent_seconds(), Some(60));
    }

    #[tokio::test]
    async fn test_end_paper_counts_ticks_not_yet_drained() {
        let mut harness = Harness::new().await;
        let mut controller = in_progress_with_document(&mut harness).await;
        tick(&controller, 12);
        controller.check_background_tasks();

        // Delivered but not yet applied by the UI loop.
        tick(&controller, 3);
        assert_eq!(controller.end_paper().unwrap(), 15);
        assert_eq!(controller.seconds_remaining(), 7185);
        assert_eq!(controller.time_spent_seconds(), Some(15));
    }

    #[tokio::test]
    async fn test_failed_document_load_can_be_retried() {
        let mut harness = Harness::new().await;
        let missing = harness
            .server
            .mock("GET", "/papers/1/pdf")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"detail": "PDF not found for this paper"}"#)
            .expect(1)
            .create_async()
            .await;

        let mut controller = harness.controller();
        controller.show_paper();
        settle(&mut controller, |c| c.document_status() == DocumentStatus::Failed).await;
        tick(&controller, 3);
        controller.check_background_tasks();

        let err = controller.take_error().expect("load error");
        assert!(matches!(err, ExamError::DocumentLoadFailed(_)));
        assert!(!err.is_auth_failure());
        assert_eq!(controller.state(), ExamState::InProgress);
        missing.assert_async().await;
        missing.remove_async().await;

        harness.mock_document("%PDF-1.4 second try").await;
        controller.show_paper();
        assert_eq!(controller.document_status(), DocumentStatus::Loading);
        settle(&mut controller, |c| c.document_status() == DocumentStatus::Ready).await;

        assert_eq!(controller.seconds_remaining(), 7197);
        assert_eq!(controller.state(), ExamState::InProgress);
    }

    #[tokio::test]
    async fn test_show_paper_with_document_held_is_a_no_op() {
        let mut harness = Harness::new().await;
        let mut controller = in_progress_with_document(&mut harness).await;
        let path = controller.document_path().unwrap().to_path_buf();

        controller.show_paper();
        assert_eq!(controller.document_status(), DocumentStatus::Ready);
        assert_eq!(controller.document_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_reload_replaces_the_held_document() {
        let mut harness = Harness::new().await;
        let mut controller = in_progress_with_document(&mut harness).await;
        let first = controller.document_path().unwrap().to_path_buf();

        controller.reload_paper().unwrap();
        settle(&mut controller, |c| c.document_status() == DocumentStatus::Ready).await;
        let second = controller.document_path().unwrap().to_path_buf();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(harness.document_files(), 1);
    }

    #[tokio::test]
    async fn test_teardown_releases_everything() {
        let mut harness = Harness::new().await;
        let controller = in_progress_with_document(&mut harness).await;
        let path = controller.document_path().unwrap().to_path_buf();

        controller.close();
        assert!(!path.exists());
        assert_eq!(harness.document_files(), 0);
    }

    #[tokio::test]
    async fn test_teardown_during_fetch_leaves_no_document() {
        let mut harness = Harness::new().await;
        harness.mock_document("%PDF-1.4 late").await;

        // Dropped before the download could be observed.
        let mut controller = harness.controller();
        controller.show_paper();
        drop(controller);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(harness.document_files(), 0);

        // Download finished but its result was never drained.
        let mut controller = harness.controller();
        controller.show_paper();
        tokio::time::timeout(Duration::from_secs(5), async {
            while harness.document_files() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("document written");
        drop(controller);
        assert_eq!(harness.document_files(), 0);
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_data_for_retry() {
        let mut harness = Harness::new().await;
        let broken = harness
            .server
            .mock("POST", "/papers/1/submit")
            .with_status(500)
            .with_body("Internal Server Error")
            .expect(1)
            .create_async()
            .await;

        let mut controller = in_progress_with_document(&mut harness).await;
        tick(&controller, 30);
        controller.check_background_tasks();
        controller.end_paper().unwrap();
        controller.set_marks(Some(64)).unwrap();
        controller.submit().unwrap();
        settle(&mut controller, |c| c.state() != ExamState::Submitting).await;

        assert_eq!(controller.state(), ExamState::SubmissionFailed);
        assert_eq!(controller.time_spent_seconds(), Some(30));
        assert_eq!(controller.marks(), Some(64));
        let err = controller.take_error().expect("submission error");
        assert!(matches!(
            err,
            ExamError::SubmissionNetworkFailure(ApiError::ServerError { status: 500, .. })
        ));
        assert!(!err.is_auth_failure());
        broken.assert_async().await;
        broken.remove_async().await;

        let accepted = harness
            .server
            .mock("POST", "/papers/1/submit")
            .match_body(Matcher::Json(serde_json::json!({"time_spent": 30, "marks": 64})))
            .with_status(200)
            .with_body(r#"{"id": 2, "paper_id": 1, "time_spent": 30, "marks": 64}"#)
            .expect(1)
            .create_async()
            .await;
        controller.submit().unwrap();
        settle(&mut controller, |c| c.state() != ExamState::Submitting).await;

        assert_eq!(controller.state(), ExamState::Submitted);
        assert!(controller.take_error().is_none());
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_session_during_submit_is_an_auth_failure() {
        let mut harness = Harness::new().await;
        harness
            .server
            .mock("POST", "/papers/1/submit")
            .with_status(401)
            .create_async()
            .await;
        harness
            .server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body(r#"{"detail": "Invalid refresh token"}"#)
            .create_async()
            .await;

        let mut controller = in_progress_with_document(&mut harness).await;
        controller.end_paper().unwrap();
        controller.set_marks(Some(70)).unwrap();
        controller.submit().unwrap();
        settle(&mut controller, |c| c.state() != ExamState::Submitting).await;

        assert_eq!(controller.state(), ExamState::SubmissionFailed);
        assert!(controller.take_error().unwrap().is_auth_failure());
        assert_eq!(harness.store.get().unwrap(), None);
    }
}
