//! Application state management for papertime.
//!
//! This module contains the `App` struct that owns the signed-in services,
//! the paper list, the login form, and the exam session currently on screen.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use papertime_core::api::{build_http_client, ApiError, AuthenticatedClient, PaperApi};
use papertime_core::auth::{CredentialStore, TokenManager};
use papertime_core::config::Config;
use papertime_core::document::DocumentLoader;
use papertime_core::exam::{ExamController, ExamError, ExamSettings, ExamState};
use papertime_core::models::{Paper, SubmissionRecord, UserProfile};
use papertime_core::utils::format_elapsed;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Marks are 0-100, so three digits are enough.
const MAX_MARKS_DIGITS: usize = 3;

const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    LoggingIn,
    PaperList,
    Profile,
    Exam,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results from background list refreshes.
enum RefreshResult {
    Papers(Vec<Paper>),
    Submissions(Vec<SubmissionRecord>),
    Profile(UserProfile),
    Error(ApiError),
}

/// Average, best and worst marks over the submission history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub attempts: usize,
    pub average: f64,
    pub highest: i64,
    pub lowest: i64,
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    tokens: TokenManager,
    api: PaperApi,
    loader: DocumentLoader,
    settings: ExamSettings,

    // UI State
    pub state: AppState,
    /// Screen to return to when a quit is cancelled
    pub previous_state: AppState,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Paper list
    pub papers: Vec<Paper>,
    pub paper_selection: usize,
    pub submissions: Vec<SubmissionRecord>,
    pub loading_papers: bool,

    // Profile screen
    pub profile: Option<UserProfile>,

    // Exam screen
    pub exam: Option<ExamController>,
    pub marks_input: String,

    // Background task channel
    refresh_rx: mpsc::Receiver<RefreshResult>,
    refresh_tx: mpsc::Sender<RefreshResult>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create the application from a loaded config, using the credential
    /// backend it selects.
    pub fn new(config: Config) -> Result<Self> {
        let store = config.credential_store()?;
        let documents_dir = config
            .documents_dir()
            .unwrap_or_else(|_| PathBuf::from("./documents"));
        Self::with_store(config, store, documents_dir)
    }

    pub fn with_store(
        config: Config,
        store: Arc<dyn CredentialStore>,
        documents_dir: PathBuf,
    ) -> Result<Self> {
        debug!(server = %config.server_url, ?documents_dir, "App starting");

        let http = build_http_client(config.request_timeout().as_secs())?;
        let tokens = TokenManager::new(http.clone(), config.server_url.clone(), store);
        let api = PaperApi::new(AuthenticatedClient::new(
            http,
            config.server_url.clone(),
            tokens.clone(),
        ));
        let loader = DocumentLoader::new(api.clone(), documents_dir);
        let settings = config.exam_settings();

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        // Get credentials from env vars or config
        let (env_username, env_password) = match Config::env_credentials() {
            Some((u, p)) => (Some(u), p),
            None => (None, String::new()),
        };
        let login_username = env_username
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();

        Ok(Self {
            config,
            tokens,
            api,
            loader,
            settings,

            state: AppState::LoggingIn,
            previous_state: AppState::LoggingIn,

            login_username,
            login_password: env_password,
            login_focus: LoginFocus::Username,
            login_error: None,

            papers: Vec::new(),
            paper_selection: 0,
            submissions: Vec::new(),
            loading_papers: false,

            profile: None,

            exam: None,
            marks_input: String::new(),

            refresh_rx: rx,
            refresh_tx: tx,

            status_message: None,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_signed_in()
    }

    /// Name of the signed-in user, for the title bar.
    pub fn username(&self) -> Option<String> {
        self.tokens
            .session()
            .ok()
            .flatten()
            .and_then(|s| s.username)
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Username and password required".to_string());
            return Err(anyhow::anyhow!("Username and password required"));
        }

        self.login_error = None;

        match self.tokens.login(&username, &password).await {
            Ok(_) => {
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.login_password.clear();
                self.enter_paper_list();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                let user_message = match &e {
                    ApiError::InvalidCredentials => "Invalid username or password".to_string(),
                    ApiError::NetworkError(inner) if inner.is_timeout() => {
                        "Connection timed out. Please try again.".to_string()
                    }
                    ApiError::NetworkError(_) => {
                        "Unable to connect to server. Check the server URL.".to_string()
                    }
                    other => format!("Login failed: {}", other),
                };
                self.login_error = Some(user_message);
                Err(e.into())
            }
        }
    }

    /// Start the login process (show login form)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
    }

    /// Sign out and return to the login form.
    pub fn logout(&mut self) {
        self.close_exam();
        if let Err(e) = self.tokens.logout() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.papers.clear();
        self.submissions.clear();
        self.profile = None;
        self.login_error = None;
        self.status_message = None;
        self.start_login();
    }

    /// The session can no longer be renewed; drop everything and ask for a
    /// fresh login.
    fn force_logout(&mut self, reason: &str) {
        warn!(reason, "Forcing logout");
        self.logout();
        self.login_error = Some(reason.to_string());
    }

    // =========================================================================
    // Paper list
    // =========================================================================

    pub fn enter_paper_list(&mut self) {
        self.state = AppState::PaperList;
        self.refresh_papers_background();
    }

    /// Fetch the paper list, submission history and account profile without
    /// blocking the UI.
    pub fn refresh_papers_background(&mut self) {
        self.loading_papers = true;
        self.status_message = Some("Loading papers...".to_string());

        let api = self.api.clone();
        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let (papers, submissions, profile) = tokio::join!(
                api.fetch_papers(),
                api.fetch_my_submissions(),
                api.fetch_me()
            );
            let results = [
                papers.map(RefreshResult::Papers),
                submissions.map(RefreshResult::Submissions),
                profile.map(RefreshResult::Profile),
            ];
            for result in results {
                let msg = result.unwrap_or_else(RefreshResult::Error);
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });
    }

    pub fn selected_paper(&self) -> Option<&Paper> {
        self.papers.get(self.paper_selection)
    }

    pub fn select_next_paper(&mut self) {
        if self.paper_selection + 1 < self.papers.len() {
            self.paper_selection += 1;
        }
    }

    pub fn select_previous_paper(&mut self) {
        self.paper_selection = self.paper_selection.saturating_sub(1);
    }

    /// Best recorded score for a paper, if the candidate has submitted it.
    pub fn best_marks(&self, paper_id: i64) -> Option<i64> {
        self.submissions
            .iter()
            .filter(|s| s.paper_id == paper_id)
            .map(|s| s.marks)
            .max()
    }

    // =========================================================================
    // Profile
    // =========================================================================

    pub fn show_profile(&mut self) {
        self.state = AppState::Profile;
    }

    pub fn leave_profile(&mut self) {
        self.state = AppState::PaperList;
    }

    /// Submissions newest first, paired with the paper title when known.
    pub fn submission_history(&self) -> Vec<(&SubmissionRecord, Option<&str>)> {
        let mut history: Vec<_> = self
            .submissions
            .iter()
            .map(|s| {
                let title = self
                    .papers
                    .iter()
                    .find(|p| p.id == s.paper_id)
                    .map(|p| p.title.as_str());
                (s, title)
            })
            .collect();
        history.sort_by(|(a, _), (b, _)| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then(b.id.cmp(&a.id))
        });
        history
    }

    pub fn score_summary(&self) -> Option<ScoreSummary> {
        let highest = self.submissions.iter().map(|s| s.marks).max()?;
        let lowest = self.submissions.iter().map(|s| s.marks).min()?;
        let total: i64 = self.submissions.iter().map(|s| s.marks).sum();
        let attempts = self.submissions.len();
        Some(ScoreSummary {
            attempts,
            average: total as f64 / attempts as f64,
            highest,
            lowest,
        })
    }

    // =========================================================================
    // Exam
    // =========================================================================

    /// Open an exam session for the selected paper.
    pub async fn open_selected_paper(&mut self) {
        let Some(paper_id) = self.selected_paper().map(|p| p.id) else {
            return;
        };

        match ExamController::open(
            self.api.clone(),
            self.loader.clone(),
            paper_id,
            self.settings.clone(),
        )
        .await
        {
            Ok(exam) => {
                info!(paper_id, "Exam opened");
                self.exam = Some(exam);
                self.marks_input.clear();
                self.status_message = None;
                self.state = AppState::Exam;
            }
            Err(e) => self.report_exam_error(e),
        }
    }

    pub fn exam_state(&self) -> Option<ExamState> {
        self.exam.as_ref().map(ExamController::state)
    }

    pub fn show_paper(&mut self) {
        if let Some(exam) = self.exam.as_mut() {
            exam.show_paper();
        }
    }

    pub fn reload_paper(&mut self) {
        let result = match self.exam.as_mut() {
            Some(exam) => exam.reload_paper(),
            None => return,
        };
        if let Err(e) = result {
            self.report_exam_error(e);
        }
    }

    pub fn end_paper(&mut self) {
        let result = match self.exam.as_mut() {
            Some(exam) => exam.end_paper(),
            None => return,
        };
        match result {
            Ok(time_spent) => {
                self.marks_input.clear();
                self.status_message =
                    Some(format!("Paper ended after {}", format_elapsed(time_spent)));
            }
            Err(e) => self.report_exam_error(e),
        }
    }

    pub fn push_marks_char(&mut self, c: char) {
        if can_add_marks_char(self.marks_input.len(), c) {
            self.marks_input.push(c);
            self.sync_marks();
        }
    }

    pub fn pop_marks_char(&mut self) {
        self.marks_input.pop();
        self.sync_marks();
    }

    fn sync_marks(&mut self) {
        let marks = parse_marks(&self.marks_input);
        let result = match self.exam.as_mut() {
            Some(exam) => exam.set_marks(marks),
            None => return,
        };
        if let Err(e) = result {
            self.report_exam_error(e);
        }
    }

    pub fn submit_marks(&mut self) {
        let result = match self.exam.as_mut() {
            Some(exam) => exam.submit(),
            None => return,
        };
        match result {
            Ok(()) => self.status_message = Some("Submitting...".to_string()),
            Err(e) => self.report_exam_error(e),
        }
    }

    /// Leave the exam screen. Not allowed while the clock is running or a
    /// submission is in flight.
    pub fn leave_exam(&mut self) {
        match self.exam_state() {
            Some(ExamState::InProgress) => {
                self.status_message = Some("End the paper before leaving".to_string());
            }
            Some(ExamState::Submitting) => {
                self.status_message = Some("Submission in progress".to_string());
            }
            _ => {
                self.close_exam();
                self.state = AppState::PaperList;
            }
        }
    }

    fn close_exam(&mut self) {
        if let Some(exam) = self.exam.take() {
            exam.close();
        }
        self.marks_input.clear();
    }

    fn report_exam_error(&mut self, e: ExamError) {
        if e.is_auth_failure() {
            self.force_logout(SESSION_EXPIRED);
        } else {
            debug!(error = %e, "Exam action failed");
            self.status_message = Some(e.to_string());
        }
    }

    // =========================================================================
    // Quit
    // =========================================================================

    pub fn request_quit(&mut self) {
        if self.state != AppState::ConfirmingQuit {
            self.previous_state = self.state;
            self.state = AppState::ConfirmingQuit;
        }
    }

    pub fn cancel_quit(&mut self) {
        self.state = self.previous_state;
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Apply finished background work: list refreshes and exam events.
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.refresh_rx.try_recv() {
            self.process_refresh_result(result);
        }

        let Some(exam) = self.exam.as_mut() else {
            return;
        };
        exam.check_background_tasks();
        let error = exam.take_error();
        let submitted = exam.submission_record().cloned();

        if let Some(e) = error {
            self.report_exam_error(e);
        }
        if let Some(record) = submitted {
            info!(paper_id = record.paper_id, "Submission recorded");
            self.close_exam();
            self.status_message = Some(format!(
                "Submitted: {} marks in {}",
                record.marks,
                format_elapsed(u32::try_from(record.time_spent).unwrap_or(0))
            ));
            self.submissions.push(record);
            if self.state == AppState::Exam {
                self.state = AppState::PaperList;
            } else if self.previous_state == AppState::Exam {
                self.previous_state = AppState::PaperList;
            }
        }
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Papers(papers) => {
                self.loading_papers = false;
                self.status_message = None;
                self.paper_selection = self.paper_selection.min(papers.len().saturating_sub(1));
                self.papers = papers;
            }
            RefreshResult::Submissions(submissions) => {
                self.submissions = submissions;
            }
            RefreshResult::Profile(profile) => {
                debug!(user = %profile.username, "Profile loaded");
                self.profile = Some(profile);
            }
            RefreshResult::Error(e) => {
                self.loading_papers = false;
                if e.is_auth_failure() {
                    self.force_logout(SESSION_EXPIRED);
                } else {
                    warn!(error = %e, "Background refresh failed");
                    self.status_message = Some(format!("Refresh failed: {}", e));
                }
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if a marks character should be accepted
pub fn can_add_marks_char(current_len: usize, c: char) -> bool {
    current_len < MAX_MARKS_DIGITS && c.is_ascii_digit()
}

/// Empty input means no marks entered yet.
pub fn parse_marks(input: &str) -> Option<i64> {
    input.trim().parse().ok()
}

// ============================================================================
// Tests
// ============================================================================
