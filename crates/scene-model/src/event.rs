//! Event caption annotations.
//!
//! Plain text, one `<second> <caption text>` per line. A later line for the
//! same second replaces the earlier caption.

use std::collections::BTreeMap;
use std::path::Path;

use crate::scene::SceneError;

/// Sparse mapping second → caption text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAnnotations {
    captions: BTreeMap<i64, String>,
}

impl EventAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, second: i64, caption: impl Into<String>) {
        self.captions.insert(second, caption.into());
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn get(&self, second: i64) -> Option<&str> {
        self.captions.get(&second).map(String::as_str)
    }

    /// Captions whose second lies in `[second - half_window, second + half_window]`,
    /// in ascending second order.
    pub fn active_at(&self, second: i64, half_window: i64) -> Vec<(i64, &str)> {
        let half_window = half_window.max(0);
        self.captions
            .range(second.saturating_sub(half_window)..=second.saturating_add(half_window))
            .map(|(s, text)| (*s, text.as_str()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.captions.iter().map(|(s, t)| (*s, t.as_str()))
    }

    /// Parse annotation text. Blank lines are ignored.
    pub fn parse(content: &str) -> Result<Self, (usize, String)> {
        let mut annotations = Self::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (second, text) = line.split_once(' ').unwrap_or((line, ""));
            let second: i64 = second
                .parse()
                .map_err(|_| (idx + 1, format!("expected a whole second, got `{second}`")))?;
            annotations.insert(second, text.trim());
        }
        Ok(annotations)
    }

    /// Load an annotation file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SceneError::Io {
            field: "events".to_string(),
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|(line, message)| SceneError::Events {
            path: path.to_path_buf(),
            line,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_second_and_text() {
        let events = EventAnnotations::parse("5 Doors open\n\n12 Band starts playing\n").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.get(5), Some("Doors open"));
        assert_eq!(events.get(12), Some("Band starts playing"));
    }

    #[test]
    fn later_line_replaces_earlier_caption() {
        let events = EventAnnotations::parse("3 first\n3 second\n").unwrap();
        assert_eq!(events.get(3), Some("second"));
    }

    #[test]
    fn non_numeric_second_reports_line() {
        let err = EventAnnotations::parse("1 ok\nsoon something\n").unwrap_err();
        assert_eq!(err.0, 2);
    }

    #[test]
    fn window_is_inclusive_on_both_sides() {
        let mut events = EventAnnotations::new();
        events.insert(10, "ten");
        events.insert(14, "fourteen");

        assert_eq!(events.active_at(12, 2), vec![(10, "ten"), (14, "fourteen")]);
        assert_eq!(events.active_at(12, 1), Vec::<(i64, &str)>::new());
        assert_eq!(events.active_at(10, 0), vec![(10, "ten")]);
    }
}
