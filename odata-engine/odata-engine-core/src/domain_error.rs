use std::fmt::Display;

use odata_runtime::expr::EvalError;
use thiserror::Error;

use crate::repository::Capability;

/// The error type of the query engine.
///
/// The kind is boxed to keep `DomainResult` small.
#[derive(Debug)]
pub struct DomainError {
    kind: Box<DomainErrorKind>,
}

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainErrorKind {
    #[error("unsupported query expression")]
    UnsupportedQuery,
    #[error("No repository found for {0}.")]
    RepositoryNotFound(String),
    #[error("The method {method} cannot be found on the repository {repository}.")]
    MethodNotFound {
        method: String,
        repository: String,
        capability: Capability,
    },
    #[error("navigation property `{property}` not found on {type_name}")]
    NavigationPropertyNotFound { type_name: String, property: String },
    #[error("entity type {0} not found")]
    EntityTypeNotFound(String),
    #[error("{0} has no declared keys")]
    NoDeclaredKeys(String),
    #[error("{type_name} entity has no value for its key `{key}`")]
    MissingKey { type_name: String, key: String },
    #[error("intermediate entity for `{0}` not found")]
    IntermediateNotFound(String),
    #[error("property `{property}` not found on {type_name}")]
    PropertyNotFound { type_name: String, property: String },
    #[error("no entity is being updated")]
    NoPendingEntity,
    #[error("invalid continuation token")]
    InvalidContinuationToken,
    #[error("expected an entity, found {0} value")]
    NotAnEntity(&'static str),
    #[error("expected element of type {expected}, found {actual}")]
    ElementTypeMismatch { expected: String, actual: String },
    #[error("values of kind {0} and {1} cannot be ordered")]
    Incomparable(&'static str, &'static str),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("data store: {0}")]
    DataStore(String),
    #[error("{0}")]
    Repository(anyhow::Error),
    #[error(transparent)]
    ServiceFault(ServiceFault),
}

/// The fault handed to the host when a request fails.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ServiceFault {
    pub status_code: u16,
    pub error_code: String,
    pub message: String,
    /// The error that caused the fault
    #[source]
    pub cause: Option<Box<DomainErrorKind>>,
}

impl ServiceFault {
    pub const INTERNAL_SERVER_ERROR: &'static str = "Internal Server Error";

    pub fn new(status_code: u16, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            error_code: error_code.into(),
            message: message.into(),
            cause: None,
        }
    }
}

impl DomainError {
    pub fn kind(&self) -> &DomainErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> DomainErrorKind {
        *self.kind
    }

    pub fn data_store(msg: impl Into<String>) -> Self {
        DomainErrorKind::DataStore(msg.into()).into_error()
    }

    pub fn repository(error: impl Into<anyhow::Error>) -> Self {
        DomainErrorKind::Repository(error.into()).into_error()
    }

    pub fn service_fault(fault: ServiceFault) -> Self {
        DomainErrorKind::ServiceFault(fault).into_error()
    }

    pub fn is_service_fault(&self) -> bool {
        matches!(self.kind(), DomainErrorKind::ServiceFault(_))
    }

    pub fn as_service_fault(&self) -> Option<&ServiceFault> {
        match self.kind() {
            DomainErrorKind::ServiceFault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Convert into a service fault, unless already one.
    ///
    /// Other errors become a `500 Internal Server Error` carrying the original message.
    pub fn into_service_fault(self) -> Self {
        if self.is_service_fault() {
            return self;
        }

        let message = self.to_string();
        Self::service_fault(ServiceFault {
            status_code: 500,
            error_code: ServiceFault::INTERNAL_SERVER_ERROR.to_string(),
            message,
            cause: Some(self.kind),
        })
    }
}

impl DomainErrorKind {
    pub fn into_error(self) -> DomainError {
        DomainError {
            kind: Box::new(self),
        }
    }
}

impl Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for DomainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.kind.as_ref())
    }
}

impl From<DomainErrorKind> for DomainError {
    fn from(value: DomainErrorKind) -> Self {
        value.into_error()
    }
}

impl From<EvalError> for DomainError {
    fn from(value: EvalError) -> Self {
        DomainErrorKind::Eval(value).into_error()
    }
}

impl From<anyhow::Error> for DomainError {
    fn from(value: anyhow::Error) -> Self {
        DomainErrorKind::Repository(value).into_error()
    }
}

impl From<ServiceFault> for DomainError {
    fn from(value: ServiceFault) -> Self {
        Self::service_fault(value)
    }
}
