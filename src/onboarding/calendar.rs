//! Which year a user is in, and what time it is.
//!
//! Timezone-aware date math lives outside the wizard; this is the seam it
//! plugs into. The default reads the UTC clock.

use chrono::{DateTime, Datelike, Utc};

pub trait Calendar: Send + Sync {
    /// The calendar year the user's year compass belongs to.
    fn current_year(&self, user_id: &str) -> i32;

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Calendar on the UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcCalendar;

impl Calendar for UtcCalendar {
    fn current_year(&self, _user_id: &str) -> i32 {
        self.now().year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_year_matches_clock() {
        assert_eq!(UtcCalendar.current_year("u1"), Utc::now().year());
    }
}
