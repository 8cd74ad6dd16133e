//! Script runtime trait and registration with the facade.

use crate::config::RuntimeConfig;
use crate::dispatch;
use crate::error::{RuntimeError, RuntimeResult};
use crate::guard::guard_with_default;
use crate::logging::init_logging;
use crate::refs::ResourceRef;
use crate::resource::ResourceImplementation;
use capi_extra::{alt_CAPIScriptRuntime_Create, alt_IScriptRuntime, ScriptRuntimeHandle};
use std::ptr;
use tracing::{error, info};

/// A scripting environment that hosts resources.
pub trait ScriptRuntime: Send {
    /// Build the implementation for a resource the host is loading.
    ///
    /// Returning an error makes the host see a null implementation.
    fn create_resource(
        &mut self,
        resource: ResourceRef,
    ) -> RuntimeResult<Box<dyn ResourceImplementation>>;

    /// Called after the resource's implementation has been dropped.
    fn destroy_resource(&mut self, resource: ResourceRef) {
        let _ = resource;
    }

    fn on_tick(&mut self) {}
}

/// A runtime registered with the facade.
///
/// Either hand the handle to the host with [`ScriptRuntimeRegistration::into_raw`]
/// or tear it down with [`ScriptRuntimeRegistration::unregister`].
#[derive(Debug)]
pub struct ScriptRuntimeRegistration {
    handle: *mut alt_IScriptRuntime,
    resource_type: String,
}

impl ScriptRuntimeRegistration {
    pub fn handle(&self) -> *mut alt_IScriptRuntime {
        self.handle
    }

    /// Resource type this runtime was registered for (e.g. `"rust"`).
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Give up ownership of the handle, typically to return it to the host.
    pub fn into_raw(self) -> *mut alt_IScriptRuntime {
        self.handle
    }

    /// Drop the runtime and free its handle.
    ///
    /// Implementations still registered for resources of this runtime are
    /// dropped as well.
    pub fn unregister(self) -> RuntimeResult<()> {
        let key = self.handle as usize;
        if !dispatch::remove_runtime(key) {
            return Err(RuntimeError::RuntimeNotRegistered(format!("{:#x}", key)));
        }
        let orphaned = dispatch::remove_resources_of(key);
        // SAFETY: the handle was created by `register_runtime` and is not used after this point.
        unsafe { ScriptRuntimeHandle::release(self.handle) };
        info!(
            resource_type = %self.resource_type,
            orphaned,
            "Unregistered script runtime"
        );
        Ok(())
    }
}

/// Register `runtime` with the facade under `resource_type`.
pub fn register_runtime<R>(resource_type: &str, runtime: R) -> ScriptRuntimeRegistration
where
    R: ScriptRuntime + 'static,
{
    let handle = alt_CAPIScriptRuntime_Create(
        Some(dispatch::create_impl),
        Some(dispatch::destroy_impl),
        Some(dispatch::runtime_tick),
    );
    dispatch::insert_runtime(handle as usize, Box::new(runtime));

    info!(resource_type, handle = ?handle, "Registered script runtime");
    ScriptRuntimeRegistration {
        handle,
        resource_type: resource_type.to_string(),
    }
}

/// Module entry used by [`export_module!`](crate::export_module).
///
/// Loads the configuration (see [`RuntimeConfig::from_env`]), installs logging,
/// builds the runtime and returns its handle to the host. Returns null if the
/// factory panics.
pub fn bootstrap<R, F>(factory: F) -> *mut alt_IScriptRuntime
where
    R: ScriptRuntime + 'static,
    F: FnOnce(&RuntimeConfig) -> R,
{
    guard_with_default("resource_module_main", ptr::null_mut(), || {
        let (config, load_error) = match RuntimeConfig::from_env() {
            Ok(config) => (config, None),
            Err(e) => (RuntimeConfig::default(), Some(e)),
        };
        init_logging(&config.logging);
        if let Some(e) = load_error {
            error!("Failed to load runtime configuration, using defaults: {}", e);
        }

        let runtime = factory(&config);
        register_runtime(&config.runtime.resource_type, runtime).into_raw()
    })
}
