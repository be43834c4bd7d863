//! Transient user-visible messages.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    raised_at: Instant,
    delivered: bool,
}

impl Notice {
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.raised_at) >= ttl
    }
}

/// Notices that dismiss themselves after a fixed interval.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Duration,
    notices: Vec<Notice>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            notices: Vec::new(),
        }
    }

    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
            raised_at: Instant::now(),
            delivered: false,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Notices still on display at `now`. Expired ones are dropped.
    pub fn active_at(&mut self, now: Instant) -> Vec<Notice> {
        let ttl = self.ttl;
        self.notices.retain(|n| !n.is_expired(now, ttl));
        self.notices.clone()
    }

    pub fn active(&mut self) -> Vec<Notice> {
        self.active_at(Instant::now())
    }

    /// Notices raised since the last call, for one-shot display.
    pub fn take_undelivered(&mut self) -> Vec<Notice> {
        let mut fresh = Vec::new();
        for notice in self.notices.iter_mut().filter(|n| !n.delivered) {
            notice.delivered = true;
            fresh.push(notice.clone());
        }
        fresh
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_expire() {
        let mut board = NoticeBoard::new(Duration::from_secs(5));
        board.error("Upload failed");
        let now = Instant::now();

        assert_eq!(board.active_at(now).len(), 1);
        assert_eq!(board.active_at(now + Duration::from_secs(4)).len(), 1);
        assert!(board.active_at(now + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn test_undelivered_are_returned_once() {
        let mut board = NoticeBoard::default();
        board.warn("Batch size clamped to 50");
        board.info("Preprocessing skipped");

        let first = board.take_undelivered();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].level, NoticeLevel::Warning);
        assert!(board.take_undelivered().is_empty());

        board.error("again");
        assert_eq!(board.take_undelivered().len(), 1);
    }
}
