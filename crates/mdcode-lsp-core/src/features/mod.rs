//! Feature adapters.
//!
//! Each capability is a public function over a [`Session`](crate::Session)
//! that never fails: the work happens in a fallible inner function, and
//! [`degrade`] turns its error into an empty result after logging it.

mod completion;
mod definition;
mod diagnostics;
mod folding;
mod formatting;
mod hover;
pub mod previewer;
mod references;
mod rename;

pub use completion::{completion, completion_resolve};
pub use definition::{definition, type_definition};
pub use diagnostics::diagnostics;
pub use folding::folding_ranges;
pub use formatting::formatting;
pub use hover::hover;
pub use references::references;
pub use rename::{prepare_rename, rename};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Swallow an adapter error, logging it at a level matching its kind.
pub(crate) fn degrade<T: Default>(operation: &'static str, uri: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error @ (Error::EngineUnavailable | Error::OutsideBlock { .. })) => {
            debug!(operation, uri, %error, "no result");
            T::default()
        }
        Err(error @ (Error::StaleIdentity(_) | Error::UnknownDocument(_) | Error::InvalidUri(_))) => {
            debug!(operation, uri, %error, "request ignored");
            T::default()
        }
        Err(error) => {
            warn!(operation, uri, %error, "request failed");
            T::default()
        }
    }
}
