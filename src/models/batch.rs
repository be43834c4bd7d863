//! Batch cursor and progress.

/// Smallest accepted batch size.
pub const MIN_BATCH_SIZE: u32 = 1;
/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: u32 = 50;
/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 2;

/// Clamp a requested batch size into the accepted range.
///
/// Returns the clamped value and whether clamping changed it.
pub fn clamp_batch_size(requested: i64) -> (u32, bool) {
    let clamped = requested.clamp(MIN_BATCH_SIZE as i64, MAX_BATCH_SIZE as i64) as u32;
    (clamped, clamped as i64 != requested)
}

/// Which batch to request next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    pub batch_index: u32,
    batch_size: u32,
}

impl Default for BatchCursor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchCursor {
    /// Create a cursor at the first batch. The size is clamped into range.
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_index: 0,
            batch_size: clamp_batch_size(batch_size as i64).0,
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Change the batch size, clamping it. Returns true if clamping applied.
    pub fn set_batch_size(&mut self, requested: i64) -> bool {
        let (size, clamped) = clamp_batch_size(requested);
        self.batch_size = size;
        clamped
    }

    /// Inclusive 1-based page range covered by the current batch.
    ///
    /// Empty (`start > end`) once the cursor has moved past `total`.
    pub fn window(&self, total: u32) -> (u32, u32) {
        let offset = self.batch_index.saturating_mul(self.batch_size);
        let end = offset.saturating_add(self.batch_size).min(total);
        (offset.saturating_add(1), end)
    }

    /// Number of batches needed to cover `total` pages.
    pub fn batch_count(&self, total: u32) -> u32 {
        total.div_ceil(self.batch_size)
    }

    pub fn rewind(&mut self) {
        self.batch_index = 0;
    }
}

/// Aggregate OCR progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub processed: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(total: u32) -> Self {
        Self {
            processed: 0,
            total,
        }
    }

    /// Record a processed count reported by the backend, capped at the total.
    pub fn record(&mut self, processed: u32) {
        self.processed = processed.min(self.total);
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_batch_size() {
        assert_eq!(clamp_batch_size(0), (1, true));
        assert_eq!(clamp_batch_size(-4), (1, true));
        assert_eq!(clamp_batch_size(1), (1, false));
        assert_eq!(clamp_batch_size(50), (50, false));
        assert_eq!(clamp_batch_size(51), (50, true));
        assert_eq!(clamp_batch_size(i64::MAX), (50, true));
    }

    #[test]
    fn test_windows_cover_pages_once() {
        let mut cursor = BatchCursor::new(2);
        let mut windows = Vec::new();
        while cursor.window(5).0 <= 5 {
            windows.push(cursor.window(5));
            cursor.batch_index += 1;
        }
        assert_eq!(windows, vec![(1, 2), (3, 4), (5, 5)]);
        assert_eq!(BatchCursor::new(2).batch_count(5), 3);
    }

    #[test]
    fn test_window_far_past_the_end_is_empty() {
        let mut cursor = BatchCursor::new(50);
        cursor.batch_index = u32::MAX;
        let (first, last) = cursor.window(7);
        assert!(first > last);

        cursor.batch_index = u32::MAX / 50 + 1;
        let (first, last) = cursor.window(7);
        assert!(first > last);
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(BatchCursor::new(1).batch_count(1), 1);
        assert_eq!(BatchCursor::new(3).batch_count(7), 3);
        assert_eq!(BatchCursor::new(50).batch_count(50), 1);
        assert_eq!(BatchCursor::new(50).batch_count(51), 2);
        assert_eq!(BatchCursor::new(4).batch_count(0), 0);
    }

    #[test]
    fn test_cursor_size_is_clamped() {
        assert_eq!(BatchCursor::new(0).batch_size(), 1);
        assert_eq!(BatchCursor::new(500).batch_size(), 50);

        let mut cursor = BatchCursor::default();
        assert_eq!(cursor.batch_size(), DEFAULT_BATCH_SIZE);
        assert!(cursor.set_batch_size(99));
        assert_eq!(cursor.batch_size(), 50);
        assert!(!cursor.set_batch_size(10));
    }

    #[test]
    fn test_progress_never_exceeds_total() {
        let mut progress = Progress::new(5);
        progress.record(4);
        assert!(!progress.is_complete());
        progress.record(9);
        assert_eq!(progress.processed, 5);
        assert!(progress.is_complete());
    }
}
