/// Errors raised by the receiving desk core

use thiserror::Error;

use crate::core::referral::Status;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Unknown referral: {0}")]
    UnknownReferral(String),

    #[error("Unknown facility: {0}")]
    UnknownFacility(String),

    #[error("Cannot {action} referral {id} while it is {status}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        status: Status,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Event log error: {0}")]
    EventLog(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DeskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DeskError::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;
