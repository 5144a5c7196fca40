use std::cmp;

/// Visible window over the history rows and the cursor inside it.
///
/// The total row count grows while scrolling, so operations that need it
/// take it as an argument instead of caching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    /// Top row index (0-based)
    pub top: usize,
    /// Number of visible rows
    pub height: usize,
    /// Current cursor/selected row (absolute index)
    pub cursor: usize,
}

impl Viewport {
    pub fn new(height: usize) -> Self {
        Self {
            top: 0,
            height: height.max(1),
            cursor: 0,
        }
    }

    /// Visible rows as a half-open range
    pub fn visible_range(&self, total_rows: usize) -> (usize, usize) {
        let start = cmp::min(self.top, total_rows);
        let end = cmp::min(self.top + self.height, total_rows);
        (start, end)
    }

    pub fn is_visible(&self, row_idx: usize) -> bool {
        row_idx >= self.top && row_idx < self.top + self.height
    }

    pub fn resize(&mut self, height: usize) {
        self.height = height.max(1);
        self.follow_cursor();
    }

    pub fn cursor_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.follow_cursor();
        }
    }

    pub fn cursor_down(&mut self, total_rows: usize) {
        if self.cursor + 1 < total_rows {
            self.cursor += 1;
            self.follow_cursor();
        }
    }

    pub fn page_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(self.height);
        self.follow_cursor();
    }

    pub fn page_down(&mut self, total_rows: usize) {
        let last = total_rows.saturating_sub(1);
        self.cursor = cmp::min(self.cursor + self.height, last);
        self.follow_cursor();
    }

    /// Move the cursor to `row_idx`, clamped to the last row
    pub fn jump_to(&mut self, row_idx: usize, total_rows: usize) {
        self.cursor = cmp::min(row_idx, total_rows.saturating_sub(1));
        if !self.is_visible(self.cursor) {
            self.center_on_cursor(total_rows);
        }
    }

    pub fn center_on_cursor(&mut self, total_rows: usize) {
        if total_rows <= self.height {
            self.top = 0;
            return;
        }
        let center_offset = self.height / 2;
        let max_top = total_rows - self.height;
        self.top = cmp::min(self.cursor.saturating_sub(center_offset), max_top);
    }

    pub fn jump_to_top(&mut self) {
        self.cursor = 0;
        self.top = 0;
    }

    pub fn jump_to_bottom(&mut self, total_rows: usize) {
        self.cursor = total_rows.saturating_sub(1);
        self.top = total_rows.saturating_sub(self.height);
    }

    /// Scroll the minimum needed to keep the cursor on screen
    pub fn follow_cursor(&mut self) {
        if self.cursor < self.top {
            self.top = self.cursor;
        } else if self.cursor >= self.top + self.height {
            self.top = self.cursor + 1 - self.height;
        }
    }

    /// Cursor position as a percentage of the rows known so far
    pub fn progress(&self, total_rows: usize) -> f32 {
        if total_rows == 0 {
            return 0.0;
        }
        (self.cursor as f32 / total_rows as f32) * 100.0
    }
}
