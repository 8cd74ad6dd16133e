//! # resource-runtime
//!
//! Safe layer for writing script runtime modules on top of `capi-extra`.
//!
//! Module authors implement two traits:
//!
//! - [`ScriptRuntime`]: one per module, builds an implementation for every
//!   resource the host loads with this runtime.
//! - [`ResourceImplementation`]: one per resource, receives start/stop, events,
//!   ticks and base object notifications.
//!
//! The crate owns the `extern "C"` trampolines handed to the facade, routes
//! every host call to the right trait object, and keeps panics from crossing
//! the C boundary.
//!
//! ## Exporting a module
//!
//! ```ignore
//! use resource_runtime::{export_module, RuntimeConfig};
//!
//! export_module!(|config: &RuntimeConfig| MyRuntime::new(config));
//! ```
//!
//! The host then resolves `resource_module_main`, `GetSDKVersion` and
//! (optionally) `SkipSDKVersionCheck` from the loaded library.

pub mod config;
mod dispatch;
pub mod error;
pub mod guard;
pub mod logging;
mod macros;
pub mod refs;
pub mod resource;
pub mod runtime;

pub use capi_extra as capi;

pub use config::{RuntimeConfig, RuntimeSection};
pub use dispatch::{active_resource_count, has_resource};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{init_logging, LogLevel, LoggingConfig};
#[cfg(feature = "server-api")]
pub use refs::ClientRequest;
pub use refs::{BaseObjectRef, EventRef, ResourceRef};
pub use resource::ResourceImplementation;
pub use runtime::{bootstrap, register_runtime, ScriptRuntime, ScriptRuntimeRegistration};
