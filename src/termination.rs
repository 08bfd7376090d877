//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// [`std::process::Termination`] with an inspectable success/failure status.
///
/// Not every windowing platform lets the event loop handler return, so [`crate::run`] has to exit
/// the process itself once the application callback finishes. To pick the right exit code it needs
/// to know whether the returned value represents success, which the standard trait does not
/// expose.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}
