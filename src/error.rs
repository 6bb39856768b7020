use thiserror::Error;

/// Reasons a time expression could not be turned into a duration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No expression was given at all.
    #[error("no time expression was given")]
    Absent,

    /// The expression was empty after trimming.
    #[error("the time expression is empty")]
    Empty,

    /// Durations cannot run backwards.
    #[error("'{0}' is negative")]
    Negative(String),

    /// NaN or infinite numeric input.
    #[error("'{0}' is not a finite number")]
    NotFinite(String),

    /// A token did not match `<digits><optional unit>`.
    #[error("'{0}' is not of the form <digits><unit>")]
    InvalidToken(String),

    /// The unit suffix is not in the synonym table.
    #[error("unknown time unit '{unit}' in '{token}'")]
    UnknownUnit { token: String, unit: String },

    /// The total does not fit in a millisecond counter.
    #[error("'{0}' is too large")]
    Overflow(String),
}

/// Terminal failure reasons delivered to a timeout's rejection subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The time expression given at scheduling time could not be parsed.
    #[error("Could not recognise '{input}' as a valid indication of time.")]
    InvalidTime {
        input: String,
        #[source]
        reason: ParseError,
    },

    /// A `postpone` or `advance` delta could not be parsed.
    #[error("Could not recognise '{input}' as a valid adjustment of time.")]
    InvalidAdjustment {
        input: String,
        #[source]
        reason: ParseError,
    },

    /// The timeout was cleared by its owner.
    #[error("The timeout was cleared.")]
    Cleared,

    /// Every handle to a pending timeout was dropped.
    #[error("The timeout was dropped before it settled.")]
    Dropped,
}

/// A control command line that could not be understood.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a repeat count")]
    InvalidCount(String),
}
