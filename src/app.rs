use ratatui::layout::Rect;
use ratatui::text::Line;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::oracle::{Oracle, Outcome, Submission, Ticket};
use crate::render::markdown_to_lines;
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keys scroll the response.
    Normal,
    /// Keys edit the query.
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub oracle: Oracle,

    // Query input
    pub cursor: usize, // char position in the query

    // Response pane
    pub response_lines: Vec<Line<'static>>,
    pub response_scroll: u16,
    pub response_height: u16,
    pub response_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(oracle: Oracle, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            oracle,
            cursor: 0,
            response_lines: Vec::new(),
            response_scroll: 0,
            response_height: 0,
            response_area: None,
            animation_frame: 0,
            events,
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut String, &mut usize)) {
        let mut text = self.oracle.query().to_string();
        f(&mut text, &mut self.cursor);
        self.oracle.on_input_change(text);
    }

    pub fn insert_char(&mut self, c: char) {
        self.edit(|text, cursor| {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        });
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.edit(|text, cursor| {
            *cursor -= 1;
            let byte_pos = char_to_byte_index(text, *cursor);
            text.remove(byte_pos);
        });
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.oracle.query().chars().count() {
            return;
        }
        self.edit(|text, cursor| {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.remove(byte_pos);
        });
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.oracle.query().chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.oracle.query().chars().count();
    }

    pub fn clear_query(&mut self) {
        self.oracle.on_input_change(String::new());
        self.cursor = 0;
    }

    /// "Reveal Truth": validate and, when a request is needed, run it in the
    /// background. The outcome comes back as [`AppEvent::Outcome`].
    pub fn submit(&mut self) {
        if let Submission::Dispatched(ticket) = self.oracle.begin_submit() {
            self.animation_frame = 0;
            self.spawn(ticket);
        }
    }

    fn spawn(&self, ticket: Ticket) {
        debug!(generation = ticket.generation(), "spawning request");
        let tx = self.events.clone();
        tokio::spawn(async move {
            let outcome = ticket.execute().await;
            // The receiver is gone only when the app is shutting down.
            let _ = tx.send(AppEvent::Outcome(outcome));
        });
    }

    pub fn apply_outcome(&mut self, outcome: Outcome) {
        let generation = outcome.generation();
        let previous = self.oracle.response().to_string();
        if !self.oracle.apply(outcome) {
            debug!(generation, "outcome superseded");
            return;
        }
        if self.oracle.response() != previous {
            self.response_lines = markdown_to_lines(self.oracle.response());
            self.response_scroll = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.oracle.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn max_scroll(&self) -> u16 {
        let total = u16::try_from(self.response_lines.len()).unwrap_or(u16::MAX);
        total.saturating_sub(self.response_height)
    }

    pub fn scroll_down(&mut self, amount: u16) {
        self.response_scroll = self.response_scroll.saturating_add(amount).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.response_scroll = self.response_scroll.saturating_sub(amount);
    }

    pub fn scroll_top(&mut self) {
        self.response_scroll = 0;
    }

    pub fn scroll_bottom(&mut self) {
        self.response_scroll = self.max_scroll();
    }
}
