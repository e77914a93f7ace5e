/// Leading character of a key which registers a service as deferred
pub const DEFERRED_MARKER: char = '*';

/// Settings shared by `Container` and `SharedContainer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Keys starting with this character register services as deferred.
    /// `None` disables the marker convention, so keys are always taken literally.
    pub deferred_marker: Option<char>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            deferred_marker: Some(DEFERRED_MARKER),
        }
    }
}

impl Options {
    pub fn without_marker() -> Self {
        Self {
            deferred_marker: None,
        }
    }

    pub fn with_marker(marker: char) -> Self {
        Self {
            deferred_marker: Some(marker),
        }
    }
}

pub fn has_marker(key: &str, marker: Option<char>) -> bool {
    marker.is_some_and(|m| key.starts_with(m))
}

/// Removes the leading marker. Keys without marker are returned unchanged,
/// a key consisting of the marker only results in an empty key.
pub fn strip_marker(key: &str, marker: Option<char>) -> &str {
    match marker {
        Some(m) => key.strip_prefix(m).unwrap_or(key),
        None => key,
    }
}

/// Generates keys for appended entries, like pushing onto an array:
/// the next key is one above the highest integer key written so far.
/// Once `usize::MAX` was used, the lowest free integer key is handed out instead.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AutoIndex {
    // `None` when the index space is exhausted
    next: Option<usize>,
}

impl Default for AutoIndex {
    fn default() -> Self {
        Self { next: Some(0) }
    }
}

impl AutoIndex {
    pub(crate) fn observe(&mut self, key: &str) {
        if let (Some(index), Some(next)) = (canonical_index(key), self.next) {
            if index >= next {
                self.next = index.checked_add(1);
            }
        }
    }

    /// Returns a key for which `is_taken` is false
    pub(crate) fn next_key(&mut self, is_taken: impl Fn(&str) -> bool) -> String {
        if let Some(next) = self.next {
            let key = next.to_string();
            if !is_taken(&key) {
                self.next = next.checked_add(1);
                return key;
            }
            self.next = None;
        }
        // Terminates, because at most `usize::MAX` keys can be taken
        (0..=usize::MAX)
            .map(|i| i.to_string())
            .find(|key| !is_taken(key))
            .unwrap_or_default()
    }
}

// "7" is an index, "07", "+7" and "-7" are plain keys
fn canonical_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}
