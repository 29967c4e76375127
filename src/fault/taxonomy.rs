use thiserror::Error;

/// Faults in the form a caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfacedFault {
    /// The node cannot serve right now; the caller should retry elsewhere.
    #[error("node unavailable: {message}")]
    Unavailable { message: String },
    /// A client-caused fault passed back unchanged inside a wrapper.
    #[error("client fault: {0}")]
    WrappedClient(Box<SurfacedFault>),
    #[error("{message}")]
    Fault {
        message: String,
        remote: bool,
        retryable: bool,
    },
    #[error("session access denied: {message}")]
    SessionAccess { message: String },
    #[error("security fault: {message}")]
    Security { message: String },
    #[error("metadata not found: {message}")]
    MetadataNotFound { message: String },
}

impl SurfacedFault {
    pub fn is_retryable(&self) -> bool {
        match self {
            SurfacedFault::Unavailable { .. } => true,
            SurfacedFault::Fault { retryable, .. } => *retryable,
            SurfacedFault::WrappedClient(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

/// Every fault a hosted service operation can raise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceFault {
    /// Already in caller-visible form, usually forwarded from another node.
    #[error(transparent)]
    Surfaced(SurfacedFault),
    #[error("session access fault: {message}")]
    SessionAccess { message: String },
    #[error("security fault: {message}")]
    Security { message: String },
    #[error("metadata not found: {message}")]
    MetadataNotFound { message: String },
    /// A client-generated fault carried through the service.
    #[error("client access fault: {cause}")]
    ClientAccess { cause: SurfacedFault },
    /// The storage environment failed but another node can take the request.
    #[error("environment failure, retry elsewhere: {message}")]
    EnvironmentRetry { message: String },
    #[error("query runtime fault: {cause}")]
    QueryRuntime { cause: Box<ServiceFault> },
    #[error("table version mismatch: {message}")]
    TableVersion { message: String },
    #[error("environment failure (corrupted={corrupted}): {message}")]
    EnvironmentFailure { message: String, corrupted: bool },
    #[error("internal fault: {message}")]
    Internal { message: String },
}

impl ServiceFault {
    pub fn internal(message: impl Into<String>) -> Self {
        ServiceFault::Internal {
            message: message.into(),
        }
    }

    /// Short machine-friendly kind used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceFault::Surfaced(_) => "surfaced",
            ServiceFault::SessionAccess { .. } => "session_access",
            ServiceFault::Security { .. } => "security",
            ServiceFault::MetadataNotFound { .. } => "metadata_not_found",
            ServiceFault::ClientAccess { .. } => "client_access",
            ServiceFault::EnvironmentRetry { .. } => "environment_retry",
            ServiceFault::QueryRuntime { .. } => "query_runtime",
            ServiceFault::TableVersion { .. } => "table_version",
            ServiceFault::EnvironmentFailure { .. } => "environment_failure",
            ServiceFault::Internal { .. } => "internal",
        }
    }
}

impl From<SurfacedFault> for ServiceFault {
    fn from(fault: SurfacedFault) -> Self {
        ServiceFault::Surfaced(fault)
    }
}
