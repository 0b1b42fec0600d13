use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use match_payment_engine::{flow::PaymentFlowError, traits::StoreError, MatchFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0}")]
    OutOfOrder(PaymentFlowError),
    #[error("{0}")]
    ParticipantError(PaymentFlowError),
    #[error("{0}")]
    InvalidMatch(String),
    #[error("Payment processing failed. {0}")]
    PaymentFailed(String),
    #[error("The service is temporarily unavailable. Please try again. {0}")]
    Unavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::OutOfOrder(_) => StatusCode::CONFLICT,
            Self::ParticipantError(e) => match e {
                PaymentFlowError::AlreadyJoined(_) | PaymentFlowError::AlreadyPaid(_) => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::InvalidMatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<MatchFlowError> for ServerError {
    fn from(e: MatchFlowError) -> Self {
        match e {
            MatchFlowError::Flow(PaymentFlowError::InvalidMatchConfiguration(msg)) => Self::InvalidMatch(msg),
            MatchFlowError::Flow(e) if e.is_participant_error() => Self::ParticipantError(e),
            MatchFlowError::Flow(e) => Self::OutOfOrder(e),
            MatchFlowError::Store(StoreError::MatchNotFound(id)) => Self::NoRecordFound(format!("Match {id}")),
            MatchFlowError::Store(StoreError::MatchAlreadyExists(id)) => Self::AlreadyExists(format!("Match {id}")),
            MatchFlowError::Store(e @ StoreError::CorruptRecord(_)) => {
                error!("💻️ {e}");
                Self::BackendError(e.to_string())
            },
            MatchFlowError::Store(e) => Self::Unavailable(e.to_string()),
            MatchFlowError::Capture(e) => Self::PaymentFailed(e.to_string()),
            e @ MatchFlowError::CompensationFailed { .. } => {
                error!("💻️ {e}");
                Self::BackendError(e.to_string())
            },
        }
    }
}
