//! capi-host library
//!
//! Loads script runtime modules, checks their SDK version markers and drives
//! their resources through the capi-extra facade. The `capi-host` binary is a
//! thin CLI over these pieces; they are exported here for testing.

pub mod config;
pub mod driver;
pub mod loader;

pub use config::{HostConfig, HostSection, ModuleEntry};
#[cfg(feature = "server-api")]
pub use driver::ClientInfo;
pub use driver::{
    DriverError, DriverResult, HostBaseObject, HostDriver, HostEvent, HostResource, ResourceState,
};
pub use loader::{
    check_compatibility, Compatibility, LoadError, LoadedModule, ModuleLoader, ModuleReport,
    ModuleSymbols,
};
