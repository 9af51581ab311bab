use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Spans longer than this are verified by hash instead of by copy.
const HASH_VERIFY_THRESHOLD: usize = 1024;

/// Byte-span replacement against a document's text, with verification of the
/// text expected at the span.
///
/// Remediation actions are lists of `TextEdit`s computed from one snapshot;
/// verification stops them from being applied to a document that moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "TextEdit does nothing until applied"]
pub struct TextEdit {
    pub byte_start: usize,
    /// Exclusive.
    pub byte_end: usize,
    pub new_text: String,
    /// What the snapshot held at the span when the action was computed.
    pub expected_before: EditVerification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    ExactMatch(String),
    /// xxh3 of the expected span text.
    Hash(u64),
}

impl EditVerification {
    pub fn from_text(text: &str) -> Self {
        match text.len() {
            n if n > HASH_VERIFY_THRESHOLD => EditVerification::Hash(xxh3_64(text.as_bytes())),
            _ => EditVerification::ExactMatch(text.to_owned()),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => expected == text,
            EditVerification::Hash(hash) => *hash == xxh3_64(text.as_bytes()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}: found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in text of length {text_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        text_len: usize,
    },

    #[error("edits overlap at byte {byte_start}")]
    Overlapping { byte_start: usize },

    #[error("edit would split a UTF-8 character at byte {byte}")]
    NotCharBoundary { byte: usize },
}

impl TextEdit {
    /// Replace `byte_start..byte_end`, which is expected to hold
    /// `expected_before`.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Replace the span `range` of `source` with `new_text`.
    pub fn replace(source: &str, range: std::ops::Range<usize>, new_text: impl Into<String>) -> Self {
        let expected = source.get(range.clone()).unwrap_or_default();
        Self::new(range.start, range.end, new_text, expected)
    }

    /// Insert `new_text` at `offset`.
    pub fn insert(offset: usize, new_text: impl Into<String>) -> Self {
        Self::new(offset, offset, new_text, "")
    }

    /// Validate the edit against `text`, returning the current span text.
    fn validate<'a>(&self, text: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > text.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                text_len: text.len(),
            });
        }
        for byte in [self.byte_start, self.byte_end] {
            if !text.is_char_boundary(byte) {
                return Err(EditError::NotCharBoundary { byte });
            }
        }

        let current = &text[self.byte_start..self.byte_end];
        if current != self.new_text && !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }
        Ok(current)
    }

    /// Apply this edit to `text`, returning the new text.
    ///
    /// Applying an edit whose span already holds `new_text` is a no-op.
    pub fn apply_to(&self, text: &str) -> Result<String, EditError> {
        let current = self.validate(text)?;
        if current == self.new_text {
            return Ok(text.to_string());
        }

        let mut result =
            String::with_capacity(text.len() + self.new_text.len() - (self.byte_end - self.byte_start));
        result.push_str(&text[..self.byte_start]);
        result.push_str(&self.new_text);
        result.push_str(&text[self.byte_end..]);
        Ok(result)
    }

    /// Apply several non-overlapping edits computed against the same text.
    ///
    /// Edits are applied bottom-to-top so earlier offsets stay valid.
    pub fn apply_all(edits: &[TextEdit], text: &str) -> Result<String, EditError> {
        let mut ordered: Vec<&TextEdit> = edits.iter().collect();
        ordered.sort_by(|a, b| b.byte_start.cmp(&a.byte_start).then(b.byte_end.cmp(&a.byte_end)));

        for edit in &ordered {
            edit.validate(text)?;
        }
        for window in ordered.windows(2) {
            let (later, earlier) = (window[0], window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::Overlapping {
                    byte_start: later.byte_start,
                });
            }
        }

        let mut result = text.to_string();
        for edit in ordered {
            if result[edit.byte_start..edit.byte_end] == edit.new_text {
                continue;
            }
            result.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
        }
        Ok(result)
    }
}
