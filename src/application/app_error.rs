use thiserror::Error;

use crate::domain::{
    entities::payment_status::PaymentStatus, services::payment_service::PaymentRuleViolation,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found")]
    NotFound,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    #[error("Payment gateway error: {0}")]
    External(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures that may succeed if the same request is tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::External(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            AppError::InvalidPaymentStatus(_) => ErrorCode::InvalidPaymentStatus,
            AppError::AlreadyProcessed(_) => ErrorCode::AlreadyProcessed,
            AppError::External(_) => ErrorCode::GatewayError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<PaymentRuleViolation> for AppError {
    fn from(violation: PaymentRuleViolation) -> Self {
        match violation {
            PaymentRuleViolation::InvalidTransition { from, to } => {
                AppError::InvalidStatusTransition { from, to }
            }
            other => AppError::Validation(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InvalidStatusTransition,
    InvalidPaymentStatus,
    AlreadyProcessed,
    GatewayError,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            ErrorCode::InvalidPaymentStatus => "INVALID_PAYMENT_STATUS",
            ErrorCode::AlreadyProcessed => "ALREADY_PROCESSED",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
