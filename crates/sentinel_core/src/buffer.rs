use std::time::SystemTime;

/// Why a snippet was captured for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    SignificantPause,
    CharacterThreshold,
    Manual,
}

/// Immutable capture of the typing window, handed to the scheduler once.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSnippet {
    pub content: String,
    pub captured_at: SystemTime,
    pub trigger: TriggerReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSettings {
    /// Maximum number of characters kept in the sliding window.
    pub max_window_size: usize,
    /// No trigger fires until the window holds at least this many characters.
    pub min_chars_for_analysis: usize,
    /// Appended characters between forced `CharacterThreshold` triggers.
    pub chars_per_trigger: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            max_window_size: 120,
            min_chars_for_analysis: 5,
            chars_per_trigger: 25,
        }
    }
}

/// Characters that mark a natural pause in typing.
const PAUSE_CHARS: &[char] = &[' ', '\t', '\n', '.', ',', '!', '?', ';', ':'];

/// Bounded sliding window over recently typed characters.
///
/// Pure buffering and trigger classification; no timing or network logic.
/// Safe to call synchronously on the input thread. One buffer per active
/// typing surface.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    settings: BufferSettings,
    window: String,
    char_len: usize,
    since_last_trigger: usize,
}

impl InputBuffer {
    pub fn new(settings: BufferSettings) -> Self {
        Self {
            settings,
            window: String::new(),
            char_len: 0,
            since_last_trigger: 0,
        }
    }

    /// Appends one typed character, returning a snippet when the trigger
    /// policy decides enough signal has accumulated.
    pub fn append(&mut self, ch: char) -> Option<TextSnippet> {
        self.window.push(ch);
        self.char_len += 1;
        if self.char_len > self.settings.max_window_size {
            self.trim_front();
        }
        self.since_last_trigger += 1;

        if self.char_len < self.settings.min_chars_for_analysis {
            return None;
        }
        if PAUSE_CHARS.contains(&ch) {
            self.since_last_trigger = 0;
            return Some(self.snapshot(TriggerReason::SignificantPause));
        }
        if self.since_last_trigger >= self.settings.chars_per_trigger {
            self.since_last_trigger = 0;
            return Some(self.snapshot(TriggerReason::CharacterThreshold));
        }
        None
    }

    /// Removes the last character. Never triggers analysis.
    pub fn delete_last(&mut self) -> bool {
        if self.window.pop().is_some() {
            self.char_len -= 1;
            self.since_last_trigger = self.since_last_trigger.saturating_sub(1);
            true
        } else {
            false
        }
    }

    pub fn current_window(&self) -> &str {
        &self.window
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.char_len = 0;
        self.since_last_trigger = 0;
    }

    /// Captures the current window, e.g. for an explicit user-requested scan
    /// with `TriggerReason::Manual`.
    pub fn snapshot(&self, trigger: TriggerReason) -> TextSnippet {
        TextSnippet {
            content: self.window.clone(),
            captured_at: SystemTime::now(),
            trigger,
        }
    }

    /// Drops at least a quarter of the capacity from the front in one chunk,
    /// so overflow does not degrade into per-keystroke O(n) churn.
    fn trim_front(&mut self) {
        let chunk = (self.settings.max_window_size / 4).max(1);
        let target = self.settings.max_window_size.saturating_sub(chunk);
        let remove = self.char_len - target;
        let byte_idx = self
            .window
            .char_indices()
            .nth(remove)
            .map(|(idx, _)| idx)
            .unwrap_or(self.window.len());
        self.window.drain(..byte_idx);
        self.char_len -= remove;
    }
}
