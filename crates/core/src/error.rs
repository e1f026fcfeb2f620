//! Error types for freewheel-core.

use thiserror::Error;

/// Why the device scan came up empty. Selects the troubleshooting text
/// shown by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    /// hiddev nodes were present and readable, but none matched the
    /// vendor/product whitelist.
    NoMatchingDevice,
    /// open(2) failed with EPERM/EACCES on at least one node.
    PermissionDenied { path: String },
    /// No hiddev node could be opened at all — driver missing or no
    /// device nodes created.
    DriverMissing,
}

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No whitelisted device discovered after the full scan.
    #[error("no supported mouse found")]
    NotFound(NotFoundReason),

    /// An ioctl against an opened handle was rejected.
    #[error("{action} report {report_id:02x}/{len}, {ioctl}: {source}")]
    Io {
        action: &'static str,
        ioctl: &'static str,
        report_id: u32,
        len: usize,
        #[source]
        source: nix::Error,
    },

    /// A query's echoed header did not match the request. Recoverable:
    /// callers print the diagnostic and treat the query as yielding no
    /// data.
    #[error("bad answer ({:02x} {:02x} {:02x}...)", .got[0], .got[1], .got[2])]
    BadAnswer { got: [u8; 3] },

    /// Malformed or out-of-range CLI token.
    #[error("{0}")]
    Argument(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
