//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use papertime_core::exam::ExamState;

use crate::app::{can_add_password_char, can_add_username_char, App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => handle_login_input(app, key).await,
        AppState::ConfirmingQuit => Ok(handle_quit_input(app, key)),
        AppState::PaperList => {
            handle_paper_list_input(app, key).await;
            Ok(false)
        }
        AppState::Profile => {
            handle_profile_input(app, key);
            Ok(false)
        }
        AppState::Exam => {
            handle_exam_input(app, key);
            Ok(false)
        }
        AppState::Quitting => Ok(true),
    }
}

fn handle_quit_input(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            app.state = AppState::Quitting;
            true
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.cancel_quit();
            false
        }
        _ => false,
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => {
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password | LoginFocus::Button => {
                // On failure login_error is set and the form stays up
                let _ = app.attempt_login().await;
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.len(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.len(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

async fn handle_paper_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.select_previous_paper(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_paper(),
        KeyCode::Home => app.paper_selection = 0,
        KeyCode::End => app.paper_selection = app.papers.len().saturating_sub(1),
        KeyCode::Enter => app.open_selected_paper().await,
        KeyCode::Char('p') => app.show_profile(),
        KeyCode::Char('u') => app.refresh_papers_background(),
        KeyCode::Char('l') => app.logout(),
        KeyCode::Char('q') | KeyCode::Esc => app.request_quit(),
        _ => {}
    }
}

fn handle_profile_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('p') => app.leave_profile(),
        KeyCode::Char('u') => app.refresh_papers_background(),
        KeyCode::Char('l') => app.logout(),
        KeyCode::Char('q') => app.request_quit(),
        _ => {}
    }
}

fn handle_exam_input(app: &mut App, key: KeyEvent) {
    let Some(state) = app.exam_state() else {
        app.state = AppState::PaperList;
        return;
    };

    if key.code == KeyCode::Char('q') {
        app.request_quit();
        return;
    }

    match state {
        ExamState::NotStarted => match key.code {
            KeyCode::Char('s') | KeyCode::Enter => app.show_paper(),
            KeyCode::Esc => app.leave_exam(),
            _ => {}
        },
        ExamState::InProgress => match key.code {
            KeyCode::Char('s') => app.show_paper(),
            KeyCode::Char('r') => app.reload_paper(),
            KeyCode::Char('e') => app.end_paper(),
            KeyCode::Esc => app.leave_exam(),
            _ => {}
        },
        ExamState::Ended | ExamState::SubmissionFailed => match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() => app.push_marks_char(c),
            KeyCode::Backspace => app.pop_marks_char(),
            KeyCode::Enter => app.submit_marks(),
            KeyCode::Esc => app.leave_exam(),
            _ => {}
        },
        ExamState::Submitting => {}
        ExamState::Submitted => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                app.leave_exam();
            }
        }
    }
}
