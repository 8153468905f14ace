//! Crate-level error types.

use std::fmt;

use crate::light::LightId;

/// Errors produced by the candela crate.
#[derive(Debug)]
pub enum CandelaError {
    /// An add operation would push the light count past the configured
    /// capacity. Recoverable by removing lights first.
    Capacity {
        /// The configured maximum light count.
        max_lights: u32,
    },
    /// A lookup referenced a global light id that is not (or no longer)
    /// registered.
    NotFound(LightId),
    /// A required texture dimension or format exceeds what the GPU supports.
    /// Callers must fall back to a smaller configuration.
    UnsupportedGpu {
        /// Name of the resource that could not be created.
        what: &'static str,
        /// The dimension the engine needed.
        required: u32,
        /// The device limit that was exceeded.
        limit: u32,
    },
    /// Fixed allocations at engine startup would exceed the memory budget.
    ResourceExhausted {
        /// Bytes the requested configuration needs.
        required_bytes: usize,
        /// The configured budget.
        budget_bytes: usize,
    },
    /// A caller-supplied value the engine cannot normalize away (zero-length
    /// axis, missing splice marker, ...).
    InvalidArgument(&'static str),
    /// Generic I/O failure (options load/save).
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl fmt::Display for CandelaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capacity { max_lights } => {
                write!(f, "light capacity exhausted (max {max_lights})")
            }
            Self::NotFound(id) => write!(f, "unknown light id {id:?}"),
            Self::UnsupportedGpu {
                what,
                required,
                limit,
            } => {
                write!(
                    f,
                    "{what} needs dimension {required} but the device limit \
                     is {limit}"
                )
            }
            Self::ResourceExhausted {
                required_bytes,
                budget_bytes,
            } => {
                write!(
                    f,
                    "configuration needs {required_bytes} bytes, budget is \
                     {budget_bytes} bytes"
                )
            }
            Self::InvalidArgument(msg) => {
                write!(f, "invalid argument: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for CandelaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CandelaError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
