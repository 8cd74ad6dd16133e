//! # module-unchecked
//!
//! A script runtime module exporting `SkipSDKVersionCheck`, so hosts accept it
//! whatever SDK version they were built against. Its resources accept every
//! lifecycle call and do nothing else.

use resource_runtime::{
    export_module, ResourceImplementation, ResourceRef, RuntimeConfig, RuntimeResult,
    ScriptRuntime,
};
use tracing::debug;

struct UncheckedRuntime {
    resource_type: String,
}

impl UncheckedRuntime {
    fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            resource_type: config.runtime.resource_type.clone(),
        }
    }
}

impl ScriptRuntime for UncheckedRuntime {
    fn create_resource(
        &mut self,
        resource: ResourceRef,
    ) -> RuntimeResult<Box<dyn ResourceImplementation>> {
        debug!(resource = %resource, resource_type = %self.resource_type, "Creating resource");
        Ok(Box::new(UncheckedResource))
    }
}

struct UncheckedResource;

impl ResourceImplementation for UncheckedResource {}

export_module!(UncheckedRuntime::from_config, skip_version_check);
