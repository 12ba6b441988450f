//! Console state: everything both the socket side and the keyboard side
//! read or write. The binary owns exactly one [`ConsoleState`] on its event
//! loop, so every mutation is serialized there.

use std::collections::VecDeque;

use chrono::Local;

use crate::classify::{Stats, Tag};
use crate::suggest;

pub const SCROLLBACK_CAPACITY: usize = 1000;
pub const HISTORY_CAPACITY: usize = 50;
pub const SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stamp: String,
    pub tag: Tag,
    pub text: String,
}

/// Fixed-capacity drop-oldest ring of formatted display lines. While
/// frozen the ring stops evicting, so a painted watermark counted from the
/// front stays anchored to the same lines; thawing trims back to capacity.
#[derive(Debug)]
pub struct Scrollback {
    lines: VecDeque<LogLine>,
    capacity: usize,
    frozen: bool,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            frozen: false,
        }
    }

    pub fn push(&mut self, line: LogLine) {
        if !self.frozen && self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn thaw(&mut self) {
        self.frozen = false;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }
}

/// Bounded command history, most-recent-last, plus the arrow-key cursor.
/// Cursor −1 is "empty buffer"; up walks toward older entries.
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    cursor: i64,
}

impl CommandHistory {
    pub fn push(&mut self, command: String) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(command);
        self.cursor = -1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    /// Move to the next older entry, returning the buffer text to show.
    /// `None` means the cursor was already at the oldest entry.
    pub fn up(&mut self) -> Option<String> {
        if self.entries.is_empty() || self.cursor >= self.entries.len() as i64 - 1 {
            return None;
        }
        self.cursor += 1;
        self.entry_at_cursor()
    }

    /// Move back toward newer entries; `Some("")` restores the empty
    /// buffer once the cursor passes the newest entry.
    pub fn down(&mut self) -> Option<String> {
        if self.cursor <= -1 {
            return None;
        }
        self.cursor -= 1;
        if self.cursor == -1 {
            Some(String::new())
        } else {
            self.entry_at_cursor()
        }
    }

    fn entry_at_cursor(&self) -> Option<String> {
        let idx = self.entries.len() as i64 - 1 - self.cursor;
        self.entries.get(idx as usize).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Help,
    Stats,
}

/// The aggregate console state.
pub struct ConsoleState {
    pub scrollback: Scrollback,
    pub filters: Vec<String>,
    pub stats: Stats,
    pub history: CommandHistory,
    pub input: String,
    pub overlay: Overlay,
    pub paused: bool,
    pub debug_mode: bool,
    pub decode_mode: bool,
    /// Scrollback length when painting froze (pause or an open overlay).
    /// The ring stops evicting while frozen, so the watermark keeps
    /// pointing at the same lines.
    frozen_len: Option<usize>,
    suggestions: Vec<String>,
    tab_index: Option<usize>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleState {
    pub fn new() -> Self {
        Self {
            scrollback: Scrollback::new(SCROLLBACK_CAPACITY),
            filters: Vec::new(),
            stats: Stats::default(),
            history: CommandHistory::default(),
            input: String::new(),
            overlay: Overlay::None,
            paused: false,
            debug_mode: false,
            decode_mode: true,
            frozen_len: None,
            suggestions: Vec::new(),
            tab_index: None,
        }
    }

    pub fn push_line(&mut self, tag: Tag, text: String) {
        let stamp = Local::now().format("%H:%M:%S%.3f").to_string();
        self.scrollback.push(LogLine { stamp, tag, text });
    }

    /// Lines eligible for painting: the whole ring, or the frozen tail
    /// while paused or under an overlay. Counters are never touched here.
    pub fn visible_len(&self) -> usize {
        match self.frozen_len {
            Some(frozen) => frozen.min(self.scrollback.len()),
            None => self.scrollback.len(),
        }
    }

    pub fn clear_view(&mut self) {
        self.scrollback.clear();
        if self.frozen_len.is_some() {
            self.frozen_len = Some(0);
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.update_freeze();
    }

    pub fn toggle_overlay(&mut self, overlay: Overlay) {
        self.overlay = if self.overlay == overlay {
            Overlay::None
        } else {
            overlay
        };
        self.update_freeze();
    }

    /// Painting is frozen while paused or while an overlay is open. The
    /// watermark is taken once on the freezing transition and holds until
    /// both conditions clear, so toggling one while the other stays active
    /// never moves the painted region.
    fn update_freeze(&mut self) {
        let freeze = self.paused || self.overlay != Overlay::None;
        match (freeze, self.frozen_len.is_some()) {
            (true, false) => {
                self.scrollback.freeze();
                self.frozen_len = Some(self.scrollback.len());
            }
            (false, true) => {
                self.scrollback.thaw();
                self.frozen_len = None;
            }
            _ => {}
        }
    }

    // Filter list: ordered, duplicates allowed, remove drops the first
    // occurrence and is a silent no-op when absent.

    pub fn add_filter(&mut self, pattern: &str) {
        self.filters.push(pattern.to_string());
    }

    pub fn remove_filter(&mut self, pattern: &str) -> bool {
        match self.filters.iter().position(|f| f == pattern) {
            Some(idx) => {
                self.filters.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    // Input buffer: append/pop only. Every edit invalidates the
    // suggestion cursor.

    pub fn push_char(&mut self, ch: char) {
        self.input.push(ch);
        self.reset_suggestions();
    }

    pub fn backspace(&mut self) {
        self.input.pop();
        self.reset_suggestions();
    }

    pub fn take_input(&mut self) -> String {
        self.reset_suggestions();
        std::mem::take(&mut self.input)
    }

    pub fn history_up(&mut self) {
        if let Some(entry) = self.history.up() {
            self.input = entry;
            self.reset_suggestions();
        }
    }

    pub fn history_down(&mut self) {
        if let Some(entry) = self.history.down() {
            self.input = entry;
            self.reset_suggestions();
        }
    }

    /// Tab press: compute candidates on the first press, then cycle
    /// modulo the list length. No candidates, no effect.
    pub fn press_tab(&mut self) {
        let index = match self.tab_index {
            None => {
                self.suggestions = suggest::suggestions(
                    &self.input,
                    &self.filters,
                    self.stats.recent_icaos(10),
                    &self.history,
                );
                if self.suggestions.is_empty() {
                    return;
                }
                0
            }
            Some(current) => (current + 1) % self.suggestions.len(),
        };
        self.tab_index = Some(index);
        self.input = self.suggestions[index].clone();
    }

    pub fn suggestion_cursor(&self) -> Option<(usize, &[String])> {
        self.tab_index.map(|idx| (idx, self.suggestions.as_slice()))
    }

    fn reset_suggestions(&mut self) {
        self.suggestions.clear();
        self.tab_index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrollback_drops_oldest_at_capacity() {
        let mut ring = Scrollback::new(3);
        for i in 0..5 {
            ring.push(LogLine {
                stamp: String::new(),
                tag: Tag::Plain,
                text: format!("line {i}"),
            });
        }
        let texts: Vec<&str> = ring.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn history_up_then_down_restores_empty_buffer() {
        let mut state = ConsoleState::new();
        for cmd in ["AT+FEED?", "/f MQTT", "AT+REBOOT"] {
            state.history.push(cmd.to_string());
        }

        for k in 1..=3 {
            let mut state2 = ConsoleState::new();
            for cmd in ["AT+FEED?", "/f MQTT", "AT+REBOOT"] {
                state2.history.push(cmd.to_string());
            }
            for _ in 0..k {
                state2.history_up();
            }
            for _ in 0..k {
                state2.history_down();
            }
            assert_eq!(state2.input, "", "k={k}");
        }

        state.history_up();
        assert_eq!(state.input, "AT+REBOOT");
        state.history_up();
        assert_eq!(state.input, "/f MQTT");
        state.history_up();
        assert_eq!(state.input, "AT+FEED?");
        // Bounded at the oldest entry.
        state.history_up();
        assert_eq!(state.input, "AT+FEED?");
    }

    #[test]
    fn history_is_bounded_most_recent_last() {
        let mut history = CommandHistory::default();
        for i in 0..(HISTORY_CAPACITY + 5) {
            history.push(format!("cmd {i}"));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.iter().next().map(String::as_str), Some("cmd 5"));
    }

    #[test]
    fn tab_cycles_through_candidates_and_wraps() {
        let mut state = ConsoleState::new();
        state.add_filter("MQTT");
        state.add_filter("Feed");
        state.input = "/rf ".to_string();

        state.press_tab();
        assert_eq!(state.input, "/rf MQTT");
        state.press_tab();
        assert_eq!(state.input, "/rf Feed");
        // N presses return to candidate 0.
        state.press_tab();
        assert_eq!(state.input, "/rf MQTT");
    }

    #[test]
    fn edits_invalidate_the_suggestion_cursor() {
        let mut state = ConsoleState::new();
        state.add_filter("MQTT");
        state.input = "/rf ".to_string();

        state.press_tab();
        assert!(state.suggestion_cursor().is_some());
        state.backspace();
        assert!(state.suggestion_cursor().is_none());
    }

    #[test]
    fn tab_with_no_candidates_is_a_no_op() {
        let mut state = ConsoleState::new();
        state.input = "/rf zz".to_string();
        state.press_tab();
        assert_eq!(state.input, "/rf zz");
        assert!(state.suggestion_cursor().is_none());
    }

    #[test]
    fn pause_freezes_the_visible_tail() {
        let mut state = ConsoleState::new();
        state.push_line(Tag::Plain, "one".into());
        state.toggle_pause();
        state.push_line(Tag::Plain, "two".into());
        assert_eq!(state.visible_len(), 1);
        assert_eq!(state.scrollback.len(), 2);
        state.toggle_pause();
        assert_eq!(state.visible_len(), 2);
    }

    #[test]
    fn frozen_view_survives_ring_wraparound() {
        let mut state = ConsoleState::new();
        for i in 0..SCROLLBACK_CAPACITY {
            state.push_line(Tag::Plain, format!("old {i}"));
        }
        state.toggle_pause();
        for i in 0..SCROLLBACK_CAPACITY {
            state.push_line(Tag::Plain, format!("new {i}"));
        }

        let visible = state.visible_len();
        assert_eq!(visible, SCROLLBACK_CAPACITY);
        let last_visible = state
            .scrollback
            .iter()
            .take(visible)
            .last()
            .expect("visible line");
        assert_eq!(last_visible.text, format!("old {}", SCROLLBACK_CAPACITY - 1));

        state.toggle_pause();
        // Thawing trims back to capacity and catches the view up.
        assert_eq!(state.scrollback.len(), SCROLLBACK_CAPACITY);
        assert_eq!(state.visible_len(), SCROLLBACK_CAPACITY);
        let newest = state.scrollback.iter().last().expect("line");
        assert_eq!(newest.text, format!("new {}", SCROLLBACK_CAPACITY - 1));
    }

    #[test]
    fn open_overlay_freezes_the_painted_region() {
        let mut state = ConsoleState::new();
        state.push_line(Tag::Plain, "one".into());
        state.toggle_overlay(Overlay::Help);
        state.push_line(Tag::Plain, "two".into());
        assert_eq!(state.visible_len(), 1);
        assert_eq!(state.scrollback.len(), 2);
        state.toggle_overlay(Overlay::Help);
        assert_eq!(state.visible_len(), 2);
    }

    #[test]
    fn freeze_point_holds_while_pause_and_overlay_trade_places() {
        let mut state = ConsoleState::new();
        state.push_line(Tag::Plain, "one".into());
        state.toggle_pause();
        state.push_line(Tag::Plain, "two".into());
        state.toggle_overlay(Overlay::Stats);
        state.push_line(Tag::Plain, "three".into());
        state.toggle_overlay(Overlay::Stats);
        // Still paused, so the original watermark holds.
        assert_eq!(state.visible_len(), 1);
        state.toggle_pause();
        assert_eq!(state.visible_len(), 3);
    }

    #[test]
    fn clear_view_empties_lines_but_not_counters() {
        let mut state = ConsoleState::new();
        state.stats.total = 7;
        state.push_line(Tag::Info, "INFO boot".into());
        state.clear_view();
        assert!(state.scrollback.is_empty());
        assert_eq!(state.stats.total, 7);
    }

    #[test]
    fn remove_filter_is_silent_when_absent() {
        let mut state = ConsoleState::new();
        state.add_filter("MQTT");
        assert!(!state.remove_filter("NOPE"));
        assert_eq!(state.filters, ["MQTT"]);
    }

    #[test]
    fn duplicate_filters_are_kept_and_removed_one_at_a_time() {
        let mut state = ConsoleState::new();
        state.add_filter("MQTT");
        state.add_filter("MQTT");
        assert_eq!(state.filters.len(), 2);
        assert!(state.remove_filter("MQTT"));
        assert_eq!(state.filters, ["MQTT"]);
    }

    #[test]
    fn overlays_are_mutually_exclusive_toggles() {
        let mut state = ConsoleState::new();
        state.toggle_overlay(Overlay::Help);
        assert_eq!(state.overlay, Overlay::Help);
        state.toggle_overlay(Overlay::Stats);
        assert_eq!(state.overlay, Overlay::Stats);
        state.toggle_overlay(Overlay::Stats);
        assert_eq!(state.overlay, Overlay::None);
    }
}
