use crate::models::{DashboardStats, ScoreDistribution};

pub const BUCKET_LABELS: [&str; 5] = ["0-20", "21-40", "41-60", "61-80", "81-100"];

impl ScoreDistribution {
    pub fn counts(&self) -> [u32; 5] {
        [
            self.range_0_to_20,
            self.range_21_to_40,
            self.range_41_to_60,
            self.range_61_to_80,
            self.range_81_to_100,
        ]
    }

    pub fn buckets(&self) -> [(&'static str, u32); 5] {
        let counts = self.counts();
        std::array::from_fn(|i| (BUCKET_LABELS[i], counts[i]))
    }

    /// Largest bucket count, never below 1 so percentages stay defined.
    pub fn max_bucket(&self) -> u32 {
        self.counts().into_iter().max().unwrap_or(0).max(1)
    }

    /// Bar length for a bucket relative to the largest one.
    pub fn percent(&self, value: u32) -> f64 {
        value as f64 / self.max_bucket() as f64 * 100.0
    }
}

impl DashboardStats {
    pub fn total_pairs(&self) -> u64 {
        self.completed_pairs + self.in_progress_pairs
    }
}
