//! User-visible feedback surface (toasts, banners)

use parking_lot::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Where the sync layer reports outcomes the user should see
pub trait FeedbackSurface: Send + Sync {
    fn notify(&self, level: FeedbackLevel, title: &str, message: &str);
}

/// Feedback surface that only logs. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl FeedbackSurface for TracingFeedback {
    fn notify(&self, level: FeedbackLevel, title: &str, message: &str) {
        match level {
            FeedbackLevel::Info | FeedbackLevel::Success => info!(title, message, "feedback"),
            FeedbackLevel::Warning => warn!(title, message, "feedback"),
            FeedbackLevel::Error => error!(title, message, "feedback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub level: FeedbackLevel,
    pub title: String,
    pub message: String,
}

/// Feedback surface that keeps every entry in memory
#[derive(Debug, Default)]
pub struct CollectingFeedback {
    entries: Mutex<Vec<FeedbackEntry>>,
}

impl CollectingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.lock().clone()
    }

    pub fn count(&self, level: FeedbackLevel) -> usize {
        self.entries.lock().iter().filter(|e| e.level == level).count()
    }
}

impl FeedbackSurface for CollectingFeedback {
    fn notify(&self, level: FeedbackLevel, title: &str, message: &str) {
        self.entries.lock().push(FeedbackEntry {
            level,
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_feedback_counts_by_level() {
        let feedback = CollectingFeedback::new();
        feedback.notify(FeedbackLevel::Success, "Refreshed", "Course list updated");
        feedback.notify(FeedbackLevel::Error, "Refresh failed", "timeout");
        feedback.notify(FeedbackLevel::Error, "Refresh failed", "timeout");

        assert_eq!(feedback.count(FeedbackLevel::Error), 2);
        assert_eq!(feedback.count(FeedbackLevel::Success), 1);
        assert_eq!(feedback.entries()[0].title, "Refreshed");
    }
}
