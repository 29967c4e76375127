use crate::config::ConfigError;
use crate::control_plane::{CheckError, DeployError, MetadataError, PortError, RemoteError};
use crate::fault::ServiceFault;
use crate::service::ServiceError;
use crate::topology::{DocumentError, TopologyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvPlaneError {
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Fault(#[from] ServiceFault),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("logger already installed: {0}")]
    Logging(#[from] log::SetLoggerError),
    #[error("{0}")]
    Other(String),
}
