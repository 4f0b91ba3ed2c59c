//! Event-driven reconcile loop that watches Kubernetes workloads and posts
//! their lifecycle changes to a chat channel.
//!
//! Pipeline: a [`WatchSource`] drives the [`Informer`], which keeps the
//! [`LocalCache`] current and feeds keys to the [`RateLimitingQueue`]; worker
//! tasks pull keys through the [`Reconciler`] and hand a rendered
//! [`ChangeNotice`] to the injected [`Notifier`]. [`Controller::run`] ties it
//! together.

mod cache;
mod config;
mod constants;
mod controller;
mod errors;
mod metrics;
mod notify;
mod queue;
mod resource;
mod watch;
pub(crate) mod utils;

pub use cache::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use metrics::*;
pub use notify::*;
pub use queue::*;
pub use resource::*;
pub use watch::*;
