//! Top-level error returned when opening an interface.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Failures that prevent an interface from starting.
///
/// Everything that goes wrong after `open` returns is logged and counted
/// instead of surfacing here.
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The native device could not be opened.
    #[error("failed to open device: {0}")]
    Link(#[source] io::Error),
    /// Native mode was requested but no device connector was supplied.
    #[error("native mode requires a device connector")]
    MissingConnector,
}
