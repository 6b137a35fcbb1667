use chrono::{DateTime, TimeDelta, Utc};

/// Bearer token with the issuer's stated absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Moment the token stops being served and a refresh is due.
    pub fn refresh_at(&self, margin: TimeDelta) -> DateTime<Utc> {
        self.expires_at
            .checked_sub_signed(margin)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Usable while `now < expires_at - margin`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        !self.value.is_empty() && now < self.refresh_at(margin)
    }
}
