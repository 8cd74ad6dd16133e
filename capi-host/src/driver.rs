//! Host-side resource driver.
//!
//! The driver plays the host's part of the contract: it owns a script runtime
//! handle, allocates host resources, asks the runtime to implement them and
//! then drives every resource callback through the facade's invoke API.
//!
//! Host objects handed to the module (resources, events, base objects) are
//! boxed so their addresses stay stable; the module only ever sees them as
//! opaque pointers.

use capi_extra::{
    alt_CEvent, alt_IResource, alt_IResource_Impl, alt_IScriptRuntime,
    alt_RefBase_RefStore_IBaseObject, ResourceImplHandle, ScriptRuntimeHandle,
};
#[cfg(feature = "server-api")]
use capi_extra::{alt_Array_String, alt_IResource_CreationInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ptr::NonNull;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors raised while driving resources.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("script runtime handle is null")]
    NullRuntime,

    #[error("runtime did not implement resource '{0}'")]
    ImplementationRejected(String),

    #[error("unknown resource: {0}")]
    UnknownResource(Uuid),

    #[error("unknown base object: {0}")]
    UnknownObject(Uuid),

    #[error("resource '{0}' failed to start")]
    StartFailed(String),

    #[error("resource '{0}' failed to stop")]
    StopFailed(String),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A resource owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResource {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An event delivered to a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    pub id: Uuid,
    pub name: String,
}

/// A base object announced to every resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBaseObject {
    pub id: Uuid,
    pub kind: String,
}

/// Host-side record behind the opaque `alt_IResource_CreationInfo` pointer
/// passed to make-client.
///
/// Modules only see the pointer and have no accessor for its fields, so the
/// driver fills them in and reads nothing back.
#[cfg(feature = "server-api")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub resource_type: String,
    pub main: String,
}

/// Lifecycle state of a driven resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Created,
    Started,
    Stopped,
}

struct ResourceEntry {
    host: Box<HostResource>,
    implementation: NonNull<alt_IResource_Impl>,
    state: ResourceState,
}

impl ResourceEntry {
    fn handle(&self) -> Option<&ResourceImplHandle> {
        // SAFETY: the handle was returned by the runtime and is released only in `release`.
        unsafe { ResourceImplHandle::from_raw(self.implementation.as_ptr()) }
    }
}

fn opaque<T, U>(value: &T) -> *mut U {
    (value as *const T).cast_mut().cast()
}

/// Drives one script runtime and the resources it implements.
///
/// Dropping the driver destroys every remaining resource and releases the
/// runtime handle. The facade has no call that asks a module to drop the
/// runtime object behind a handle, so a runtime registered with
/// `resource-runtime` stays alive inside its module until the process exits.
/// Nothing calls into it once the driver is gone; unload the module only
/// after every driver over its runtimes has been dropped.
pub struct HostDriver {
    runtime: NonNull<alt_IScriptRuntime>,
    resources: Vec<ResourceEntry>,
    objects: Vec<Box<HostBaseObject>>,
    ticks: u64,
}

impl HostDriver {
    /// Take ownership of a script runtime handle.
    ///
    /// # Safety
    ///
    /// `runtime` must come from `alt_CAPIScriptRuntime_Create` (usually via a
    /// module entry) and the module behind it must outlive the driver.
    pub unsafe fn new(runtime: *mut alt_IScriptRuntime) -> DriverResult<Self> {
        let runtime = NonNull::new(runtime).ok_or(DriverError::NullRuntime)?;
        Ok(Self {
            runtime,
            resources: Vec::new(),
            objects: Vec::new(),
            ticks: 0,
        })
    }

    fn runtime(&self) -> Option<&ScriptRuntimeHandle> {
        // SAFETY: owned since `new`, released only on drop.
        unsafe { ScriptRuntimeHandle::from_raw(self.runtime.as_ptr()) }
    }

    fn entry(&self, id: Uuid) -> DriverResult<&ResourceEntry> {
        self.resources
            .iter()
            .find(|entry| entry.host.id == id)
            .ok_or(DriverError::UnknownResource(id))
    }

    fn entry_mut(&mut self, id: Uuid) -> DriverResult<&mut ResourceEntry> {
        self.resources
            .iter_mut()
            .find(|entry| entry.host.id == id)
            .ok_or(DriverError::UnknownResource(id))
    }

    /// Allocate a host resource and have the runtime implement it.
    pub fn create_resource(&mut self, name: &str) -> DriverResult<Uuid> {
        let host = Box::new(HostResource {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        });

        let resource_ptr: *mut alt_IResource = opaque(&*host);
        let raw = match self.runtime() {
            // SAFETY: the resource pointer stays valid until `destroy_resource`.
            Some(runtime) => unsafe { runtime.create_impl(resource_ptr) },
            None => return Err(DriverError::NullRuntime),
        };
        let implementation = NonNull::new(raw)
            .ok_or_else(|| DriverError::ImplementationRejected(name.to_string()))?;

        let id = host.id;
        info!(resource = %id, name, "Created resource");
        self.resources.push(ResourceEntry {
            host,
            implementation,
            state: ResourceState::Created,
        });
        Ok(id)
    }

    pub fn resource(&self, id: Uuid) -> Option<&HostResource> {
        self.entry(id).ok().map(|entry| &*entry.host)
    }

    pub fn resource_state(&self, id: Uuid) -> Option<ResourceState> {
        self.entry(id).ok().map(|entry| entry.state)
    }

    pub fn resource_ids(&self) -> Vec<Uuid> {
        self.resources.iter().map(|entry| entry.host.id).collect()
    }

    /// Raw implementation handle of a resource, e.g. to read its extra slot.
    pub fn implementation(&self, id: Uuid) -> Option<*mut alt_IResource_Impl> {
        self.entry(id).ok().map(|entry| entry.implementation.as_ptr())
    }

    /// Number of completed [`HostDriver::tick`] calls.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ask the resource to describe its client side.
    #[cfg(feature = "server-api")]
    pub fn make_client(
        &mut self,
        id: Uuid,
        info: &mut ClientInfo,
        files: &mut Vec<String>,
    ) -> DriverResult<bool> {
        let entry = self.entry(id)?;
        let info_ptr: *mut alt_IResource_CreationInfo = (info as *mut ClientInfo).cast();
        let files_ptr: *mut alt_Array_String = (files as *mut Vec<String>).cast();
        // SAFETY: both pointers outlive the call.
        let accepted = entry
            .handle()
            .is_some_and(|handle| unsafe { handle.make_client(info_ptr, files_ptr) });
        debug!(resource = %id, accepted, "make_client");
        Ok(accepted)
    }

    /// Start a resource.
    pub fn start(&mut self, id: Uuid) -> DriverResult<()> {
        let entry = self.entry_mut(id)?;
        let started = entry.handle().is_some_and(|handle| unsafe { handle.start() });
        if !started {
            return Err(DriverError::StartFailed(entry.host.name.clone()));
        }
        entry.state = ResourceState::Started;
        info!(resource = %id, name = %entry.host.name, "Started resource");
        Ok(())
    }

    /// Stop a started resource.
    pub fn stop(&mut self, id: Uuid) -> DriverResult<()> {
        let entry = self.entry_mut(id)?;
        let stopped = entry.handle().is_some_and(|handle| unsafe { handle.stop() });
        entry.state = ResourceState::Stopped;
        if !stopped {
            return Err(DriverError::StopFailed(entry.host.name.clone()));
        }
        info!(resource = %id, name = %entry.host.name, "Stopped resource");
        Ok(())
    }

    /// Deliver a named event to one resource. Returns the resource's verdict.
    pub fn emit_event(&mut self, id: Uuid, name: &str) -> DriverResult<bool> {
        let entry = self.entry(id)?;
        let event = Box::new(HostEvent {
            id: Uuid::new_v4(),
            name: name.to_string(),
        });
        let event_ptr: *mut alt_CEvent = opaque(&*event);
        // SAFETY: the event lives until the end of this call.
        let handled = entry
            .handle()
            .is_some_and(|handle| unsafe { handle.on_event(event_ptr) });
        debug!(resource = %id, event = name, handled, "Delivered event");
        Ok(handled)
    }

    /// Create a base object and announce it to every resource.
    pub fn create_base_object(&mut self, kind: &str) -> Uuid {
        let object = Box::new(HostBaseObject {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
        });
        let object_ptr: *mut alt_RefBase_RefStore_IBaseObject = opaque(&*object);
        for entry in &self.resources {
            if let Some(handle) = entry.handle() {
                // SAFETY: the object lives until `remove_base_object` or drop.
                unsafe { handle.on_create_base_object(object_ptr) };
            }
        }

        let id = object.id;
        debug!(object = %id, kind, "Created base object");
        self.objects.push(object);
        id
    }

    /// Announce the removal of a base object to every resource, then free it.
    pub fn remove_base_object(&mut self, id: Uuid) -> DriverResult<()> {
        let index = self
            .objects
            .iter()
            .position(|object| object.id == id)
            .ok_or(DriverError::UnknownObject(id))?;

        let object = self.objects.remove(index);
        let object_ptr: *mut alt_RefBase_RefStore_IBaseObject = opaque(&*object);
        for entry in &self.resources {
            if let Some(handle) = entry.handle() {
                // SAFETY: the object is freed only after this loop.
                unsafe { handle.on_remove_base_object(object_ptr) };
            }
        }
        debug!(object = %id, "Removed base object");
        Ok(())
    }

    pub fn base_object_count(&self) -> usize {
        self.objects.len()
    }

    /// Tick the runtime, then every started resource.
    pub fn tick(&mut self) {
        if let Some(runtime) = self.runtime() {
            // SAFETY: the runtime handle is owned by this driver.
            unsafe { runtime.tick() };
        }
        for entry in &self.resources {
            if entry.state != ResourceState::Started {
                continue;
            }
            if let Some(handle) = entry.handle() {
                // SAFETY: the implementation handle is owned by this driver.
                unsafe { handle.tick() };
            }
        }
        self.ticks += 1;
    }

    /// Tick `count` times, `period` apart.
    pub async fn run_ticks(&mut self, count: u64, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for _ in 0..count {
            ticker.tick().await;
            self.tick();
        }
        debug!(count, total = self.ticks, "Finished tick run");
    }

    /// Stop (if started) and destroy a resource.
    pub fn destroy_resource(&mut self, id: Uuid) -> DriverResult<()> {
        let index = self
            .resources
            .iter()
            .position(|entry| entry.host.id == id)
            .ok_or(DriverError::UnknownResource(id))?;

        if self.resources[index].state == ResourceState::Started {
            if let Err(e) = self.stop(id) {
                warn!(resource = %id, "Stopping before destroy failed: {}", e);
            }
        }

        let entry = self.resources.remove(index);
        self.release(entry);
        Ok(())
    }

    fn release(&self, entry: ResourceEntry) {
        if let Some(runtime) = self.runtime() {
            // SAFETY: the implementation came from this runtime and is not used afterwards.
            unsafe { runtime.destroy_impl(entry.implementation.as_ptr()) };
        }
        // SAFETY: the handle was created by the factory and is released exactly once.
        unsafe { ResourceImplHandle::release(entry.implementation.as_ptr()) };
        info!(resource = %entry.host.id, name = %entry.host.name, "Destroyed resource");
    }
}

impl Drop for HostDriver {
    fn drop(&mut self) {
        while let Some(entry) = self.resources.last() {
            let id = entry.host.id;
            if let Err(e) = self.destroy_resource(id) {
                warn!(resource = %id, "Failed to destroy resource: {}", e);
                self.resources.pop();
            }
        }
        // SAFETY: every implementation is gone; nothing references the runtime now.
        unsafe { ScriptRuntimeHandle::release(self.runtime.as_ptr()) };
        debug!(ticks = self.ticks, "Released script runtime");
    }
}
