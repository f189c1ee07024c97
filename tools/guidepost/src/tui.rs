use crate::controller::WizardController;
use crate::draft::{ResponseDraft, ValidationErrors};
use crate::errors::GuidepostError;
use crate::hotkeys::controls_legend;
use crate::recording::RecordingSignal;
use crate::steps::{spec_for, AnswerKind};
use crate::types::{Step, MAX_DIFFICULTY, MIN_DIFFICULTY};
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardView {
    pub task_title: String,
    pub task_instructions: String,
    pub step: Step,
    pub visible: bool,
    pub task_started: bool,
    pub draft: ResponseDraft,
    pub errors: ValidationErrors,
    pub signal: RecordingSignal,
    pub can_advance: bool,
    pub submitted: bool,
}

impl WizardView {
    pub fn from_controller(
        controller: &WizardController,
        task_title: &str,
        task_instructions: &str,
    ) -> Self {
        Self {
            task_title: task_title.to_string(),
            task_instructions: task_instructions.to_string(),
            step: controller.step(),
            visible: controller.state().visible,
            task_started: controller.state().task_started,
            draft: controller.draft().clone(),
            errors: controller.errors().clone(),
            signal: controller.signal().clone(),
            can_advance: controller.can_advance(),
            submitted: controller.has_submitted(),
        }
    }
}

pub fn render_wizard(view: &WizardView, width: u16, height: u16) -> Result<String, GuidepostError> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| GuidepostError::Io(e.to_string()))?;
    terminal
        .draw(|frame| {
            if !view.visible {
                let tab = Paragraph::new(format!(
                    "Task in progress: {}  |  {}  |  o reopen panel",
                    view.task_title,
                    view.signal.status_line()
                ))
                .block(Block::default().borders(Borders::ALL).title("Guidepost"));
                let area = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(3), Constraint::Min(0)])
                    .split(frame.area());
                frame.render_widget(tab, area[0]);
                return;
            }

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(6),
                    Constraint::Length(3),
                    Constraint::Length(3),
                ])
                .split(frame.area());

            let spec = spec_for(view.step);
            let header = Paragraph::new(Line::from(vec![
                Span::styled(
                    format!("Step {}/{} ", view.step.index() + 1, Step::ALL.len()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(spec.title, Style::default().add_modifier(Modifier::BOLD)),
            ]))
            .block(Block::default().borders(Borders::ALL).title("Guidepost"));
            frame.render_widget(header, chunks[0]);

            frame.render_widget(
                Paragraph::new(body_lines(view))
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL).title(view.task_title.as_str())),
                chunks[1],
            );

            let status_style = if view.signal.error.is_some() {
                Style::default().fg(Color::Red)
            } else if view.signal.active {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            };
            frame.render_widget(
                Paragraph::new(Span::styled(view.signal.status_line(), status_style))
                    .block(Block::default().borders(Borders::ALL).title("Recording")),
                chunks[2],
            );

            frame.render_widget(
                Paragraph::new(controls_legend(view.step))
                    .block(Block::default().borders(Borders::ALL).title("Controls")),
                chunks[3],
            );
        })
        .map_err(|e| GuidepostError::Io(e.to_string()))?;

    let mut out = String::new();
    let buffer = terminal.backend().buffer().clone();
    for y in 0..height {
        for x in 0..width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    Ok(out)
}

fn body_lines(view: &WizardView) -> Vec<Line<'static>> {
    let spec = spec_for(view.step);
    let mut lines = Vec::new();
    if !spec.body.is_empty() {
        lines.push(Line::from(spec.body));
    }

    match view.step {
        Step::Welcome => {
            if !view.signal.active {
                lines.push(Line::from("Press r to share your screen, then n to continue."));
            }
        }
        Step::TaskBrief => {
            lines.push(Line::from(""));
            lines.push(Line::from(view.task_instructions.clone()));
            if view.task_started {
                lines.push(Line::from("Task started. Press d when you are done."));
            }
        }
        _ => {}
    }

    match spec.answer {
        AnswerKind::None => {}
        AnswerKind::Choice(options) => {
            let selected = view.draft.task_success.map(|value| value.as_str());
            for (value, label) in options {
                let marker = if selected == Some(*value) { "(x)" } else { "( )" };
                lines.push(Line::from(format!("{marker} {label}")));
            }
        }
        AnswerKind::Rating => {
            let scale = (MIN_DIFFICULTY..=MAX_DIFFICULTY)
                .map(|value| {
                    if view.draft.difficulty == Some(value) {
                        format!("[{value}]")
                    } else {
                        format!(" {value} ")
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(Line::from(scale));
        }
        AnswerKind::FreeText => {
            let text = match view.step {
                Step::Q3Confusing => view.draft.confusing.as_str(),
                _ => view.draft.worked_well.as_str(),
            };
            lines.push(Line::from(format!("> {text}")));
        }
    }

    if let Some(rule) = spec.rule {
        if let Some(message) = view.errors.get(rule.field) {
            lines.push(Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(Color::Red),
            )));
        }
    }

    if view.submitted {
        lines.push(Line::from("Thanks! Your responses were submitted."));
    } else if view.step != Step::TaskBrief && !view.can_advance {
        lines.push(Line::from(Span::styled(
            "(continue disabled)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}
