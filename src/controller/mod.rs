//! The reconcile loop and its driver.
//!
//! [`Controller::run`] is the only entry point embedders need: it starts the
//! watch source, gates on the initial cache sync, runs the worker pool and
//! tears everything down when the shutdown signal fires.

mod builder;
#[allow(clippy::module_inception)]
mod controller;
mod reconciler;
pub use builder::*;
pub use controller::*;
pub use reconciler::*;

#[cfg(test)]
mod controller_test;
