//! Local indexed cache of watched objects and the informer that keeps it
//! current from watch callbacks.

mod informer;
mod local_cache;
pub use informer::*;
pub use local_cache::*;

#[cfg(test)]
mod informer_test;
