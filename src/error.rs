//! Error kinds produced at the arranger boundary (spec §7).
//!
//! Every variant here is a programmer error: none is retried, and
//! classification itself never produces one just because a class vector
//! turned out to be all-MEMORY — that is a *successful* classification.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallArrangerError {
    /// An unknown layout node kind, a `Value` layout missing its ABI-class
    /// annotation, or an unhandled `TypeClass` kind in a binding calculator.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A leading X87UP was encountered while classifying a struct. Fatal
    /// for the call site.
    #[error("malformed layout: a leading X87UP was encountered during classification")]
    MalformedLayout,

    /// The host signature's arity disagrees with the C descriptor's.
    #[error(
        "arity mismatch: host signature declares {host_arity} argument(s), \
         C descriptor declares {c_arity}"
    )]
    ArityMismatch { host_arity: usize, c_arity: usize },

    /// The host signature's return presence disagrees with the C descriptor's.
    #[error(
        "return presence mismatch: host signature has_return={host_has_return}, \
         C descriptor has_return={c_has_return}"
    )]
    ReturnPresenceMismatch {
        host_has_return: bool,
        c_has_return: bool,
    },
}
