//! Routing of facade callbacks to runtime and resource trait objects.
//!
//! Runtimes are keyed by their `alt_IScriptRuntime*` address and resource
//! implementations by their `alt_IResource*` address. While a trait method
//! runs, its object is checked out of the table so the lock is never held
//! across user code. The host may call back into the module from inside a
//! callback (creating a vehicle in `start` triggers `on_create_base_object`
//! synchronously); such base object notifications are queued on the slot and
//! delivered before the object is checked back in. Any other call that hits a
//! checked-out object is dropped with a warning and gets the neutral value.

use crate::guard::{guard_void, guard_with_default};
#[cfg(feature = "server-api")]
use crate::refs::ClientRequest;
use crate::refs::{BaseObjectRef, EventRef, ResourceRef};
use crate::resource::ResourceImplementation;
use crate::runtime::ScriptRuntime;
#[cfg(feature = "server-api")]
use capi_extra::{alt_Array_String, alt_IResource_CreationInfo};
use capi_extra::{
    alt_CAPIResource_Impl_Create, alt_CEvent, alt_IResource, alt_IResource_Impl,
    alt_IScriptRuntime, alt_RefBase_RefStore_IBaseObject, ResourceImplHandle,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

static RUNTIMES: Lazy<Mutex<HashMap<usize, RuntimeSlot>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static RESOURCES: Lazy<Mutex<HashMap<usize, ResourceSlot>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct RuntimeSlot {
    runtime: Option<Box<dyn ScriptRuntime>>,
}

struct ResourceSlot {
    /// Address of the owning runtime handle.
    runtime: usize,
    implementation: Option<Box<dyn ResourceImplementation>>,
    deferred: Vec<Deferred>,
}

#[derive(Debug, Clone, Copy)]
enum Deferred {
    CreateBaseObject(BaseObjectRef),
    RemoveBaseObject(BaseObjectRef),
}

impl Deferred {
    fn apply(self, implementation: &mut dyn ResourceImplementation) {
        match self {
            Deferred::CreateBaseObject(object) => implementation.on_create_base_object(object),
            Deferred::RemoveBaseObject(object) => implementation.on_remove_base_object(object),
        }
    }
}

enum Checkout<T> {
    Ready(T),
    Busy,
    Missing,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Runtime table
// =============================================================================

pub(crate) fn insert_runtime(key: usize, runtime: Box<dyn ScriptRuntime>) {
    let previous = lock(&RUNTIMES).insert(
        key,
        RuntimeSlot {
            runtime: Some(runtime),
        },
    );
    // A host that released a handle without unregistering leaves a stale slot
    // behind; the allocator may hand the same address out again.
    if previous.is_some() {
        debug!(runtime = key, "Replaced stale script runtime slot");
    }
}

pub(crate) fn remove_runtime(key: usize) -> bool {
    // The runtime's Drop may call back into the tables.
    let slot = lock(&RUNTIMES).remove(&key);
    slot.is_some()
}

fn checkout_runtime(key: usize) -> Checkout<Box<dyn ScriptRuntime>> {
    match lock(&RUNTIMES).get_mut(&key) {
        Some(slot) => match slot.runtime.take() {
            Some(runtime) => Checkout::Ready(runtime),
            None => Checkout::Busy,
        },
        None => Checkout::Missing,
    }
}

fn checkin_runtime(key: usize, runtime: Box<dyn ScriptRuntime>) {
    match lock(&RUNTIMES).get_mut(&key) {
        Some(slot) => slot.runtime = Some(runtime),
        None => debug!(runtime = key, "Runtime unregistered while running; dropping it"),
    }
}

fn with_runtime<R: Default>(
    op: &'static str,
    runtime: *mut alt_IScriptRuntime,
    f: impl FnOnce(&mut dyn ScriptRuntime) -> R,
) -> R {
    let key = runtime as usize;
    let mut checked_out = match checkout_runtime(key) {
        Checkout::Ready(runtime) => runtime,
        Checkout::Busy => {
            warn!(op, runtime = key, "Script runtime is busy; call dropped");
            return R::default();
        }
        Checkout::Missing => {
            error!(op, runtime = key, "Script runtime is not registered");
            return R::default();
        }
    };

    let result = guard_with_default(op, R::default(), || f(checked_out.as_mut()));
    checkin_runtime(key, checked_out);
    result
}

// =============================================================================
// Resource table
// =============================================================================

fn insert_resource(
    resource: ResourceRef,
    runtime: usize,
    implementation: Box<dyn ResourceImplementation>,
) {
    let previous = lock(&RESOURCES).insert(
        resource.addr(),
        ResourceSlot {
            runtime,
            implementation: Some(implementation),
            deferred: Vec::new(),
        },
    );
    if previous.is_some() {
        warn!(resource = %resource, "Replaced an existing implementation for resource");
    }
}

fn remove_resource(resource: ResourceRef) -> Option<ResourceSlot> {
    lock(&RESOURCES).remove(&resource.addr())
}

/// Drop every implementation owned by a runtime. Returns how many were removed.
pub(crate) fn remove_resources_of(runtime: usize) -> usize {
    let removed: Vec<ResourceSlot> = {
        let mut resources = lock(&RESOURCES);
        let keys: Vec<usize> = resources
            .iter()
            .filter(|(_, slot)| slot.runtime == runtime)
            .map(|(key, _)| *key)
            .collect();
        keys.iter().filter_map(|key| resources.remove(key)).collect()
    };
    // Implementations are dropped outside the lock.
    removed.len()
}

/// Number of resources that currently have an implementation registered.
pub fn active_resource_count() -> usize {
    lock(&RESOURCES).len()
}

/// Whether an implementation is registered for `resource`.
pub fn has_resource(resource: ResourceRef) -> bool {
    lock(&RESOURCES).contains_key(&resource.addr())
}

fn checkout_resource(
    resource: ResourceRef,
    defer: Option<Deferred>,
) -> Checkout<Box<dyn ResourceImplementation>> {
    match lock(&RESOURCES).get_mut(&resource.addr()) {
        Some(slot) => match slot.implementation.take() {
            Some(implementation) => Checkout::Ready(implementation),
            None => {
                if let Some(deferred) = defer {
                    slot.deferred.push(deferred);
                }
                Checkout::Busy
            }
        },
        None => Checkout::Missing,
    }
}

/// Put the implementation back, unless notifications queued up meanwhile.
fn checkin_resource(
    resource: ResourceRef,
    implementation: Box<dyn ResourceImplementation>,
) -> Option<(Box<dyn ResourceImplementation>, Vec<Deferred>)> {
    let mut resources = lock(&RESOURCES);
    match resources.get_mut(&resource.addr()) {
        Some(slot) if !slot.deferred.is_empty() => {
            Some((implementation, std::mem::take(&mut slot.deferred)))
        }
        Some(slot) => {
            slot.implementation = Some(implementation);
            None
        }
        None => {
            debug!(resource = %resource, "Resource destroyed while running; dropping implementation");
            None
        }
    }
}

fn with_resource<R: Default>(
    op: &'static str,
    resource: *mut alt_IResource,
    defer: impl FnOnce() -> Option<Deferred>,
    f: impl FnOnce(&mut dyn ResourceImplementation) -> R,
) -> R {
    // SAFETY: the host passes its own resource pointer; it is only used as a key.
    let Some(resource) = (unsafe { ResourceRef::from_raw(resource) }) else {
        error!(op, "Resource is null");
        return R::default();
    };

    let deferred = defer();
    let queued = deferred.is_some();
    let mut implementation = match checkout_resource(resource, deferred) {
        Checkout::Ready(implementation) => implementation,
        Checkout::Busy if queued => {
            debug!(op, resource = %resource, "Queued notification for busy resource");
            return R::default();
        }
        Checkout::Busy => {
            warn!(op, resource = %resource, "Resource implementation is busy; call dropped");
            return R::default();
        }
        Checkout::Missing => {
            error!(op, resource = %resource, "No implementation registered for resource");
            return R::default();
        }
    };

    let result = guard_with_default(op, R::default(), || f(implementation.as_mut()));

    while let Some((returned, deferred)) = checkin_resource(resource, implementation) {
        implementation = returned;
        for item in deferred {
            guard_void(op, || item.apply(implementation.as_mut()));
        }
    }
    result
}

// =============================================================================
// Script runtime trampolines
// =============================================================================

pub(crate) unsafe extern "C" fn create_impl(
    runtime: *mut alt_IScriptRuntime,
    resource: *mut alt_IResource,
) -> *mut alt_IResource_Impl {
    guard_with_default("create_impl", ptr::null_mut(), || {
        let Some(resource) = ResourceRef::from_raw(resource) else {
            error!("create_impl called with a null resource");
            return ptr::null_mut();
        };

        let created = with_runtime("create_impl", runtime, |rt| Some(rt.create_resource(resource)));
        match created {
            Some(Ok(implementation)) => {
                insert_resource(resource, runtime as usize, implementation);
                let handle = alt_CAPIResource_Impl_Create(
                    resource.as_ptr(),
                    #[cfg(feature = "server-api")]
                    Some(res_make_client),
                    Some(res_start),
                    Some(res_stop),
                    Some(res_on_event),
                    Some(res_on_tick),
                    Some(res_on_create_base_object),
                    Some(res_on_remove_base_object),
                );
                debug!(resource = %resource, "Created resource implementation");
                handle
            }
            Some(Err(e)) => {
                error!(resource = %resource, "Failed to create resource implementation: {}", e);
                ptr::null_mut()
            }
            None => ptr::null_mut(),
        }
    })
}

pub(crate) unsafe extern "C" fn destroy_impl(
    runtime: *mut alt_IScriptRuntime,
    implementation: *mut alt_IResource_Impl,
) {
    guard_void("destroy_impl", || {
        let Some(handle) = ResourceImplHandle::from_raw(implementation) else {
            error!("destroy_impl called with a null implementation");
            return;
        };
        let Some(resource) = ResourceRef::from_raw(handle.resource()) else {
            error!("destroy_impl called for an implementation without resource");
            return;
        };

        match remove_resource(resource) {
            Some(slot) if slot.implementation.is_none() => {
                warn!(resource = %resource, "Resource destroyed while its implementation was running")
            }
            Some(_) => debug!(resource = %resource, "Destroyed resource implementation"),
            None => warn!(resource = %resource, "destroy_impl for unknown resource"),
        }

        with_runtime("destroy_impl", runtime, |rt| rt.destroy_resource(resource));
    })
}

pub(crate) unsafe extern "C" fn runtime_tick(runtime: *mut alt_IScriptRuntime) {
    with_runtime("runtime_tick", runtime, |rt| rt.on_tick());
}

// =============================================================================
// Resource trampolines
// =============================================================================

#[cfg(feature = "server-api")]
pub(crate) unsafe extern "C" fn res_make_client(
    resource: *mut alt_IResource,
    info: *mut alt_IResource_CreationInfo,
    files: *mut alt_Array_String,
) -> bool {
    with_resource("make_client", resource, || None, |imp| {
        imp.make_client(ClientRequest { info, files })
    })
}

pub(crate) unsafe extern "C" fn res_start(resource: *mut alt_IResource) -> bool {
    with_resource("start", resource, || None, |imp| imp.start())
}

pub(crate) unsafe extern "C" fn res_stop(resource: *mut alt_IResource) -> bool {
    with_resource("stop", resource, || None, |imp| imp.stop())
}

pub(crate) unsafe extern "C" fn res_on_event(
    resource: *mut alt_IResource,
    event: *mut alt_CEvent,
) -> bool {
    let Some(event) = EventRef::from_raw(event) else {
        error!("on_event called with a null event");
        return false;
    };
    with_resource("on_event", resource, || None, |imp| imp.on_event(event))
}

pub(crate) unsafe extern "C" fn res_on_tick(resource: *mut alt_IResource) {
    with_resource("on_tick", resource, || None, |imp| imp.on_tick())
}

pub(crate) unsafe extern "C" fn res_on_create_base_object(
    resource: *mut alt_IResource,
    object: *mut alt_RefBase_RefStore_IBaseObject,
) {
    let Some(object) = BaseObjectRef::from_raw(object) else {
        error!("on_create_base_object called with a null object");
        return;
    };
    with_resource(
        "on_create_base_object",
        resource,
        || Some(Deferred::CreateBaseObject(object)),
        |imp| imp.on_create_base_object(object),
    )
}

pub(crate) unsafe extern "C" fn res_on_remove_base_object(
    resource: *mut alt_IResource,
    object: *mut alt_RefBase_RefStore_IBaseObject,
) {
    let Some(object) = BaseObjectRef::from_raw(object) else {
        error!("on_remove_base_object called with a null object");
        return;
    };
    with_resource(
        "on_remove_base_object",
        resource,
        || Some(Deferred::RemoveBaseObject(object)),
        |imp| imp.on_remove_base_object(object),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RuntimeError, RuntimeResult};
    use crate::runtime::register_runtime;
    use capi_extra::ScriptRuntimeHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counters shared between a test and the objects it registers.
    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        created_objects: AtomicUsize,
        removed_objects: AtomicUsize,
        destroyed: AtomicUsize,
    }

    struct ReentrantResource {
        resource: ResourceRef,
        object: usize,
        counters: Arc<Counters>,
    }

    impl ResourceImplementation for ReentrantResource {
        fn start(&mut self) -> bool {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            // The host notifies about the object this start just created.
            let object = self.object as *mut alt_RefBase_RefStore_IBaseObject;
            unsafe {
                res_on_create_base_object(self.resource.as_ptr(), object);
                // Nested start is refused while the first one runs.
                assert!(!res_start(self.resource.as_ptr()));
            }
            // Not delivered yet: we are still inside `start`.
            assert_eq!(self.counters.created_objects.load(Ordering::SeqCst), 0);
            true
        }

        fn on_create_base_object(&mut self, _object: BaseObjectRef) {
            self.counters.created_objects.fetch_add(1, Ordering::SeqCst);
            let object = self.object as *mut alt_RefBase_RefStore_IBaseObject;
            // Removal raised while handling creation is queued as well.
            unsafe { res_on_remove_base_object(self.resource.as_ptr(), object) };
        }

        fn on_remove_base_object(&mut self, _object: BaseObjectRef) {
            self.counters.removed_objects.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingRuntime {
        object: usize,
        counters: Arc<Counters>,
        reject: bool,
    }

    impl ScriptRuntime for CountingRuntime {
        fn create_resource(
            &mut self,
            resource: ResourceRef,
        ) -> RuntimeResult<Box<dyn ResourceImplementation>> {
            if self.reject {
                return Err(RuntimeError::ImplementationFailed("rejected".to_string()));
            }
            Ok(Box::new(ReentrantResource {
                resource,
                object: self.object,
                counters: Arc::clone(&self.counters),
            }))
        }

        fn destroy_resource(&mut self, _resource: ResourceRef) {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_reentrant_notifications_are_deferred() {
        let counters = Arc::new(Counters::default());
        let mut object = 0u8;
        let mut res = 0u8;
        let resource: *mut alt_IResource = (&mut res as *mut u8).cast();

        let registration = register_runtime(
            "rust",
            CountingRuntime {
                object: &mut object as *mut u8 as usize,
                counters: Arc::clone(&counters),
                reject: false,
            },
        );

        unsafe {
            let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
            let implementation = runtime.create_impl(resource);
            assert!(!implementation.is_null());

            let handle = ResourceImplHandle::from_raw(implementation).unwrap();
            assert!(handle.start());

            assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
            assert_eq!(counters.created_objects.load(Ordering::SeqCst), 1);
            assert_eq!(counters.removed_objects.load(Ordering::SeqCst), 1);

            runtime.destroy_impl(implementation);
            ResourceImplHandle::release(implementation);
        }

        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert!(!lock(&RESOURCES).contains_key(&(resource as usize)));
        registration.unregister().unwrap();
    }

    #[test]
    fn test_rejected_resource_yields_null() {
        let counters = Arc::new(Counters::default());
        let mut res = 0u8;
        let resource: *mut alt_IResource = (&mut res as *mut u8).cast();

        let registration = register_runtime(
            "rust",
            CountingRuntime {
                object: 0,
                counters,
                reject: true,
            },
        );

        unsafe {
            let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
            assert!(runtime.create_impl(resource).is_null());
            assert!(!res_start(resource));
        }
        registration.unregister().unwrap();
    }

    #[test]
    fn test_null_arguments_are_rejected() {
        unsafe {
            assert!(!res_start(ptr::null_mut()));
            assert!(!res_stop(ptr::null_mut()));
            res_on_tick(ptr::null_mut());

            let mut res = 0u8;
            let resource: *mut alt_IResource = (&mut res as *mut u8).cast();
            assert!(!res_on_event(resource, ptr::null_mut()));
            res_on_create_base_object(resource, ptr::null_mut());
        }
    }

    /// Registers another runtime while being dropped.
    struct RegisteringOnDrop {
        registered: Arc<AtomicUsize>,
    }

    impl ScriptRuntime for RegisteringOnDrop {
        fn create_resource(
            &mut self,
            _resource: ResourceRef,
        ) -> RuntimeResult<Box<dyn ResourceImplementation>> {
            Err(RuntimeError::ImplementationFailed("unused".to_string()))
        }
    }

    impl Drop for RegisteringOnDrop {
        fn drop(&mut self) {
            let inner = register_runtime(
                "inner",
                CountingRuntime {
                    object: 0,
                    counters: Arc::new(Counters::default()),
                    reject: true,
                },
            );
            self.registered.store(inner.into_raw() as usize, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_runtime_drop_may_touch_runtime_table() {
        let registered = Arc::new(AtomicUsize::new(0));
        let outer = register_runtime(
            "outer",
            RegisteringOnDrop {
                registered: Arc::clone(&registered),
            },
        );

        outer.unregister().unwrap();

        let inner = registered.load(Ordering::SeqCst);
        assert_ne!(inner, 0);
        assert!(remove_runtime(inner));
        unsafe { ScriptRuntimeHandle::release(inner as *mut alt_IScriptRuntime) };
    }

    #[test]
    fn test_unknown_runtime_tick_is_ignored() {
        let mut bogus = 0u8;
        unsafe { runtime_tick((&mut bogus as *mut u8).cast()) };
    }
}
