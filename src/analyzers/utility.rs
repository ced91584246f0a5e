/// Running sum and count of the valid (non-negative) readings of one column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidMean {
    sum: i64,
    count: u32,
}

impl ValidMean {
    /// Adds a reading. Sentinels (negative values) are skipped.
    pub fn push(&mut self, value: i32) {
        if value >= 0 {
            self.sum += value as i64;
            self.count += 1;
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Arithmetic mean of the valid readings. Returns 0.0 when there are none
    /// or the mean is not finite.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let m = self.sum as f64 / self.count as f64;
        if m.is_finite() { m } else { 0.0 }
    }
}
