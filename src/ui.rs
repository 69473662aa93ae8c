use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::{App, InputMode};
use crate::capability::Capability;

pub const TITLE: &str = "The Digital Oracle";
pub const INSTRUCTIONS: &str = "Enter your query below and behold the wisdom of the virtual sage. \
Don't worry, even simple minds can seek knowledge.";
pub const PLACEHOLDER: &str = "Seek your answer...";
pub const SUBMIT_LABEL: &str = "Reveal Truth";

/// The oracle's portrait.
const ORACLE_ART: [&str; 7] = [
    r"      .-~~~-.      ",
    r"    /  (o o)  \    ",
    r"   |    \_/    |   ",
    r"    \  '---'  /    ",
    r"  ~~~( ~~~~~ )~~~  ",
    r"   /  \_____/  \   ",
    r"  '-------------'  ",
];

/// Terminals shorter than this skip the portrait.
const MIN_HEIGHT_FOR_ART: u16 = 28;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_body(app, frame, body_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = match app.oracle.capability() {
        Capability::Available(factory) => {
            Span::styled(format!(" [{}]", factory.describe()), Style::default().fg(Color::Green))
        }
        Capability::Unavailable => {
            Span::styled(" [AI unavailable]", Style::default().fg(Color::Red))
        }
    };

    let title = Line::from(vec![
        Span::styled(format!(" {TITLE} "), Style::default().fg(Color::Cyan).bold()),
        status,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style, hints) = match app.input_mode {
        InputMode::Editing => (
            " ASK ",
            Style::default().bg(Color::Yellow).fg(Color::Black),
            " Enter: reveal truth | Ctrl+U: clear | PgUp/PgDn: scroll | Esc: browse | Ctrl+C: quit ",
        ),
        InputMode::Normal => (
            " READ ",
            Style::default().bg(Color::Blue).fg(Color::White),
            " j/k: scroll | g/G: top/bottom | i: ask | Enter: reveal truth | q: quit ",
        ),
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(footer), area);
}

fn render_body(app: &mut App, frame: &mut Frame, area: Rect) {
    let art_height = if area.height >= MIN_HEIGHT_FOR_ART {
        ORACLE_ART.len() as u16
    } else {
        0
    };
    let error = app.oracle.error_message();
    let error_height = if error.is_empty() { 0 } else { 1 };

    let [art_area, title_area, intro_area, input_area, error_area, response_area] =
        Layout::vertical([
            Constraint::Length(art_height),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(error_height),
            Constraint::Min(0),
        ])
        .areas(area);

    if art_height > 0 {
        let art: Vec<Line> = ORACLE_ART
            .iter()
            .map(|row| Line::from(Span::styled(*row, Style::default().fg(Color::Magenta))))
            .collect();
        frame.render_widget(Paragraph::new(art).alignment(Alignment::Center), art_area);
    }

    let title = Paragraph::new(Line::from(Span::styled(
        TITLE,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(title, title_area);

    let intro = Paragraph::new(INSTRUCTIONS)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(intro, intro_area);

    render_input(app, frame, input_area);

    if !error.is_empty() {
        let error_line = Paragraph::new(Line::from(Span::styled(
            error,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center);
        frame.render_widget(error_line, error_area);
    }

    render_response(app, frame, response_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Your query ")
        .title(
            ratatui::widgets::block::Title::from(Span::styled(
                format!(" [ {SUBMIT_LABEL} ⏎ ] "),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Right),
        );

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let query = app.oracle.query();
    let input = if query.is_empty() {
        Paragraph::new(Span::styled(
            PLACEHOLDER,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    } else {
        let visible_text: String = query
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_response(app: &mut App, frame: &mut Frame, area: Rect) {
    app.response_area = Some(area);
    app.response_height = area.height.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(" The oracle speaks ");

    let mut lines: Vec<Line> = Vec::new();
    if app.oracle.is_pending() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Consulting the oracle{dots}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    }
    if !app.oracle.response().is_empty() {
        lines.extend(app.response_lines.iter().cloned());
    }

    let content_len = lines.len();
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.response_scroll, 0));
    frame.render_widget(paragraph, area);

    if content_len > app.response_height as usize {
        let mut state = ScrollbarState::new(content_len.saturating_sub(app.response_height as usize))
            .position(app.response_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}
