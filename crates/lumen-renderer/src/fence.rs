//! Code fence recognition.
//!
//! A fence opens with three or more backticks or tildes and closes with a line
//! of the same character that is at least as long and carries nothing else.
//! Tracking the length lets a four-backtick fence contain triple backticks as
//! literal text.

/// An open code fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fence {
    /// Fence character (backtick or tilde).
    pub(crate) ch: char,
    /// Length of the opening run.
    pub(crate) len: usize,
}

impl Fence {
    /// Detect a fence opening on `line`.
    ///
    /// A backtick fence whose info string contains a backtick is inline code,
    /// not a fence.
    pub(crate) fn open(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        let ch = trimmed.chars().next()?;
        if ch != '`' && ch != '~' {
            return None;
        }

        let len = trimmed.chars().take_while(|&c| c == ch).count();
        if len < 3 {
            return None;
        }
        if ch == '`' && trimmed[len..].contains('`') {
            return None;
        }
        Some(Self { ch, len })
    }

    /// Check whether `line` closes this fence.
    pub(crate) fn is_closed_by(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let count = trimmed.chars().take_while(|&c| c == self.ch).count();
        if count < self.len {
            return false;
        }
        trimmed[count..].chars().all(char::is_whitespace)
    }
}

/// Tracks code fence state during line-by-line processing.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<Fence>,
}

impl FenceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn in_fence(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one line. Returns `true` if the line opened or closed a fence.
    pub(crate) fn update(&mut self, line: &str) -> bool {
        match self.open {
            Some(fence) => {
                if fence.is_closed_by(line) {
                    self.open = None;
                    return true;
                }
                false
            }
            None => {
                self.open = Fence::open(line);
                self.open.is_some()
            }
        }
    }
}
