//! Calendar and session-rule errors.

#[derive(Debug, Clone, PartialEq)]
pub enum CalendarError {
    UnknownVenue { mic: String },
    InvalidRange { start: String, end: String },
    InvalidTime { value: String },
    InvalidWindow { mic: String, detail: String },
    OverlappingRules { mic: String },
    NoCloseSource { mic: String, date: String },
    NaiveProviderTimestamp { mic: String, date: String },
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownVenue { mic } => write!(f, "unknown venue calendar: {mic}"),
            Self::InvalidRange { start, end } => {
                write!(f, "start {start} must be on or before end {end}")
            }
            Self::InvalidTime { value } => write!(f, "time must be HH:MM, got '{value}'"),
            Self::InvalidWindow { mic, detail } => {
                write!(f, "invalid session-rule window for {mic}: {detail}")
            }
            Self::OverlappingRules { mic } => {
                write!(f, "session rules for {mic} have overlapping validity windows")
            }
            Self::NoCloseSource { mic, date } => {
                write!(f, "no close source for {mic} on {date}: no session rule, baseline, or provider timestamp")
            }
            Self::NaiveProviderTimestamp { mic, date } => {
                write!(f, "provider timestamp for {mic} on {date} must be UTC")
            }
        }
    }
}

impl std::error::Error for CalendarError {}
