//! Consecutive-sample confirmation for current-based step changes

/// Samples needed before a low-current step change commits
pub const CURRENT_CONFIRM_COUNT: u32 = 3;

/// Counts consecutive qualifying samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentConfirmationCounter {
    streak: u32,
    required: u32,
}

impl Default for CurrentConfirmationCounter {
    fn default() -> Self {
        Self::new(CURRENT_CONFIRM_COUNT)
    }
}

impl CurrentConfirmationCounter {
    pub const fn new(required: u32) -> Self {
        Self {
            streak: 0,
            required,
        }
    }

    /// Record a sample; returns true once the streak reaches the requirement
    pub const fn record(&mut self, qualifies: bool) -> bool {
        if qualifies {
            self.streak = self.streak.saturating_add(1);
            self.streak >= self.required
        } else {
            self.streak = 0;
            false
        }
    }

    pub const fn reset(&mut self) {
        self.streak = 0;
    }

    pub const fn streak(&self) -> u32 {
        self.streak
    }
}
