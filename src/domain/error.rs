use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateKeyError {
    #[error("malformed date '{0}', expected YYYY-MM-DD or an ISO-8601 timestamp")]
    Malformed(String),

    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    Impossible { year: i32, month: u32, day: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min} characters long")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} must be at most {max} characters long")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must not be blank")]
    Blank { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("a change for {0} is still waiting for the store")]
    MutationInFlight(String),

    #[error("no change is staged")]
    NothingStaged,
}
