use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use papertime_core::exam::{DocumentStatus, ExamController, ExamState};
use papertime_core::utils::{format_countdown, format_elapsed, truncate_string};

use crate::app::{App, AppState, LoginFocus};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    let screen = if app.state == AppState::ConfirmingQuit {
        app.previous_state
    } else {
        app.state
    };
    match screen {
        AppState::PaperList => render_paper_list(frame, app, chunks[1]),
        AppState::Profile => render_profile(frame, app, chunks[1]),
        AppState::Exam => render_exam(frame, app, chunks[1]),
        AppState::LoggingIn | AppState::ConfirmingQuit | AppState::Quitting => {}
    }
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame, app);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  papertime";
    let user = app
        .username()
        .map(|u| format!("signed in as {}", u))
        .unwrap_or_else(|| app.config.server_url.clone());

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + user.len() + 2),
        )),
        Span::styled(user, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

// ============================================================================
// Paper list
// ============================================================================

fn render_paper_list(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let title_width = (columns[0].width as usize).saturating_sub(30).max(10);
    let mut lines: Vec<Line> = Vec::with_capacity(app.papers.len());
    for (i, paper) in app.papers.iter().enumerate() {
        let selected = i == app.paper_selection;
        let style = if selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let best = app
            .best_marks(paper.id)
            .map(|m| format!("{:>3}/100", m))
            .unwrap_or_else(|| "      -".to_string());
        lines.push(Line::from(vec![
            Span::styled(
                format!(
                    " {:<width$} ",
                    truncate_string(&paper.title, title_width),
                    width = title_width
                ),
                style,
            ),
            Span::styled(format!("{:>10} ", paper.duration_display()), styles::muted_style()),
            Span::styled(best, styles::success_style()),
        ]));
    }
    if lines.is_empty() {
        let text = if app.loading_papers {
            " Loading papers..."
        } else {
            " No papers available"
        };
        lines.push(Line::from(Span::styled(text, styles::muted_style())));
    }

    let list_block = Block::default()
        .title(" Papers ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(list_block), columns[0]);

    render_paper_detail(frame, app, columns[1]);
}

fn render_paper_detail(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if let Some(paper) = app.selected_paper() {
        lines.push(Line::from(Span::styled(
            paper.title.clone(),
            styles::title_style(),
        )));
        if !paper.description.is_empty() {
            lines.push(Line::from(paper.description.clone()));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Duration: ", styles::muted_style()),
            Span::raw(paper.duration_display()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Marks:    ", styles::muted_style()),
            Span::raw(paper.total_marks.to_string()),
        ]));

        let attempts: Vec<_> = app
            .submissions
            .iter()
            .filter(|s| s.paper_id == paper.id)
            .collect();
        if !attempts.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Attempts", styles::highlight_style())));
            for attempt in attempts {
                lines.push(Line::from(format!(
                    "  {}  {:>3} marks  {}",
                    attempt.submitted_display(),
                    attempt.marks,
                    format_elapsed(u32::try_from(attempt.time_spent).unwrap_or(0))
                )));
            }
        }
    }

    let block = Block::default()
        .title(" Details ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

// ============================================================================
// Profile
// ============================================================================

fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(4)])
        .split(area);

    let mut lines = Vec::new();
    match app.profile.as_ref() {
        Some(profile) => {
            lines.push(Line::from(vec![
                Span::styled(" Username: ", styles::muted_style()),
                Span::styled(profile.username.clone(), styles::title_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Email:    ", styles::muted_style()),
                Span::raw(profile.email.clone().unwrap_or_else(|| "-".to_string())),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Role:     ", styles::muted_style()),
                Span::raw(profile.role_display()),
            ]));
        }
        None => lines.push(Line::from(Span::styled(
            " Loading profile...",
            styles::muted_style(),
        ))),
    }
    lines.push(Line::from(""));
    match app.score_summary() {
        Some(summary) => lines.push(Line::from(vec![
            Span::styled(" Average ", styles::muted_style()),
            Span::styled(format!("{:.2}", summary.average), styles::highlight_style()),
            Span::styled("   Highest ", styles::muted_style()),
            Span::styled(summary.highest.to_string(), styles::success_style()),
            Span::styled("   Lowest ", styles::muted_style()),
            Span::styled(summary.lowest.to_string(), styles::error_style()),
            Span::styled(
                format!("   over {} attempts", summary.attempts),
                styles::muted_style(),
            ),
        ])),
        None => lines.push(Line::from(Span::styled(
            " No submissions yet",
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .title(" Profile ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), rows[0]);

    let title_width = (rows[1].width as usize).saturating_sub(40).max(10);
    let history: Vec<Line> = app
        .submission_history()
        .into_iter()
        .map(|(record, title)| {
            let title = title
                .map(str::to_string)
                .unwrap_or_else(|| format!("Paper #{}", record.paper_id));
            Line::from(vec![
                Span::styled(format!(" {:<12} ", record.submitted_display()), styles::muted_style()),
                Span::styled(
                    format!(
                        "{:<width$} ",
                        truncate_string(&title, title_width),
                        width = title_width
                    ),
                    styles::list_item_style(),
                ),
                Span::styled(format!("{:>3} marks  ", record.marks), styles::success_style()),
                Span::styled(
                    format_elapsed(u32::try_from(record.time_spent).unwrap_or(0)),
                    styles::muted_style(),
                ),
            ])
        })
        .collect();

    let block = Block::default()
        .title(" Submissions ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(history).block(block), rows[1]);
}

// ============================================================================
// Exam screen
// ============================================================================

fn render_exam(frame: &mut Frame, app: &App, area: Rect) {
    let Some(exam) = app.exam.as_ref() else {
        return;
    };

    let block = Block::default()
        .title(format!(" {} ", exam.title()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // State
            Constraint::Length(3), // Countdown
            Constraint::Min(4),    // Document / marks
        ])
        .split(inner);

    let state_line = Line::from(vec![
        Span::styled(" Status: ", styles::muted_style()),
        Span::styled(exam.state().label(), state_style(exam.state())),
    ]);
    frame.render_widget(Paragraph::new(state_line), rows[0]);

    let countdown = if exam.time_elapsed() {
        "TIME ELAPSED".to_string()
    } else {
        format_countdown(exam.seconds_remaining())
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            countdown,
            styles::countdown_style(exam.time_elapsed()),
        )))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP | Borders::BOTTOM).border_style(styles::muted_style())),
        rows[1],
    );

    let body = match exam.state() {
        ExamState::NotStarted => vec![
            Line::from(""),
            Line::from(format!(
                " You will have {} once the paper is shown.",
                format_elapsed(exam.initial_duration())
            )),
            Line::from(Span::styled(
                " Press [s] to show the paper and start the clock.",
                styles::highlight_style(),
            )),
        ],
        ExamState::InProgress => document_lines(exam),
        ExamState::Ended | ExamState::SubmissionFailed | ExamState::Submitting => {
            marks_lines(app, exam)
        }
        ExamState::Submitted => vec![Line::from(Span::styled(
            " Submitted.",
            styles::success_style(),
        ))],
    };
    frame.render_widget(Paragraph::new(body).wrap(Wrap { trim: false }), rows[2]);
}

fn state_style(state: ExamState) -> Style {
    match state {
        ExamState::InProgress | ExamState::Submitting => styles::highlight_style(),
        ExamState::Submitted => styles::success_style(),
        ExamState::SubmissionFailed => styles::error_style(),
        ExamState::NotStarted | ExamState::Ended => styles::list_item_style(),
    }
}

fn document_lines(exam: &ExamController) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];
    match exam.document_status() {
        DocumentStatus::Loading => {
            lines.push(Line::from(Span::styled(" Loading paper...", styles::muted_style())));
        }
        DocumentStatus::Ready => {
            let path = exam
                .document_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(" Paper: ", styles::muted_style()),
                Span::styled(path, styles::success_style()),
            ]));
            lines.push(Line::from(Span::styled(
                " Open the file in your PDF viewer.",
                styles::muted_style(),
            )));
        }
        DocumentStatus::Failed => {
            lines.push(Line::from(Span::styled(
                " The paper could not be loaded. Press [s] to try again.",
                styles::error_style(),
            )));
        }
        DocumentStatus::Idle => {}
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" [e]", styles::help_key_style()),
        Span::raw(" end paper   "),
        Span::styled("[r]", styles::help_key_style()),
        Span::raw(" reload paper"),
    ]));
    lines
}

fn marks_lines(app: &App, exam: &ExamController) -> Vec<Line<'static>> {
    let time_spent = exam.time_spent_seconds().unwrap_or(0);
    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(" Time spent: ", styles::muted_style()),
            Span::raw(format_elapsed(time_spent)),
        ]),
        Line::from(vec![
            Span::styled(" Marks (0-100): [", styles::muted_style()),
            Span::styled(format!("{:<3}▌", app.marks_input), styles::selected_style()),
            Span::styled("]", styles::muted_style()),
        ]),
    ];
    match exam.state() {
        ExamState::Submitting => lines.push(Line::from(Span::styled(
            " Submitting...",
            styles::muted_style(),
        ))),
        ExamState::SubmissionFailed => lines.push(Line::from(Span::styled(
            " Submission failed. Press Enter to try again.",
            styles::error_style(),
        ))),
        _ => lines.push(Line::from(Span::styled(
            " Type your marks and press Enter to submit.",
            styles::highlight_style(),
        ))),
    }
    lines
}

// ============================================================================
// Status bar and overlays
// ============================================================================

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.state {
        AppState::PaperList => "[Enter] open | [p]rofile | [u]pdate | [l]ogout | [q]uit",
        AppState::Profile => "[Esc] back | [u]pdate | [l]ogout | [q]uit",
        AppState::Exam => match app.exam_state() {
            Some(ExamState::NotStarted) => "[s]how paper | [Esc] back | [q]uit",
            Some(ExamState::InProgress) => "[s]how | [r]eload | [e]nd | [q]uit",
            Some(ExamState::Ended) | Some(ExamState::SubmissionFailed) => {
                "[0-9] marks | [Enter] submit | [Esc] back | [q]uit"
            }
            _ => "[q]uit",
        },
        AppState::LoggingIn => "[Tab] next field | [Esc] quit",
        AppState::ConfirmingQuit | AppState::Quitting => "",
    };

    let left_text = app
        .status_message
        .as_ref()
        .map(|msg| format!(" {} ", msg))
        .unwrap_or_default();
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("             papertime", styles::title_style())),
        Line::from(""),
    ];

    let username_focused = app.login_focus == LoginFocus::Username;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let username_display = format!("{:<16}", truncate_string(&app.login_username, 16));
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(format!("{}{}", username_display, cursor), username_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.len().min(16));
    let password_display = format!("{:<16}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let button_label = if button_focused {
        " ▶ Login ◀ "
    } else {
        "   Login   "
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(button_label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame, app: &App) {
    let exam_running = app.exam_state() == Some(ExamState::InProgress);
    let area = centered_rect_fixed(46, if exam_running { 8 } else { 7 }, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
    ];
    if exam_running {
        lines.push(Line::from(Span::styled(
            "   The current attempt will be lost.",
            styles::error_style(),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("   Press ", styles::muted_style()),
        Span::styled("[Y]", styles::help_key_style()),
        Span::styled(" to quit, ", styles::muted_style()),
        Span::styled("[N]", styles::help_key_style()),
        Span::styled(" to cancel", styles::muted_style()),
    ]));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
