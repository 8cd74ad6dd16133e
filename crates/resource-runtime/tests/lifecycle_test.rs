//! Integration tests for resource-runtime.
//!
//! These tests drive registered runtimes the way a host does, through the
//! facade handles:
//! - Full resource lifecycle: create → start → events/ticks → stop → destroy
//! - Several resources sharing one runtime
//! - Panicking implementations
//! - Unregistering a runtime with live resources

use resource_runtime::capi::{
    alt_CAPIResource_Impl_GetExtra, alt_CAPIResource_Impl_SetExtra, alt_CEvent, alt_IResource,
    alt_IResource_Impl, alt_RefBase_RefStore_IBaseObject, ResourceImplHandle, ScriptRuntimeHandle,
};
use resource_runtime::{
    has_resource, register_runtime, BaseObjectRef, EventRef, ResourceImplementation, ResourceRef,
    RuntimeError, RuntimeResult, ScriptRuntime,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

// ==============================================================================
// Test Fixture Helpers
// ==============================================================================

/// Everything the test runtime observed, in order.
#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

struct JournalResource {
    name: String,
    journal: Arc<Journal>,
    objects: HashSet<BaseObjectRef>,
    panic_on_tick: bool,
}

impl ResourceImplementation for JournalResource {
    fn start(&mut self) -> bool {
        self.journal.push(format!("start:{}", self.name));
        true
    }

    fn stop(&mut self) -> bool {
        self.journal.push(format!("stop:{}", self.name));
        true
    }

    fn on_event(&mut self, _event: EventRef) -> bool {
        self.journal.push(format!("event:{}", self.name));
        true
    }

    fn on_tick(&mut self) {
        if self.panic_on_tick {
            panic!("tick failed for {}", self.name);
        }
        self.journal.push(format!("tick:{}", self.name));
    }

    fn on_create_base_object(&mut self, object: BaseObjectRef) {
        self.objects.insert(object);
        self.journal
            .push(format!("objects:{}:{}", self.name, self.objects.len()));
    }

    fn on_remove_base_object(&mut self, object: BaseObjectRef) {
        self.objects.remove(&object);
        self.journal
            .push(format!("objects:{}:{}", self.name, self.objects.len()));
    }
}

struct JournalRuntime {
    journal: Arc<Journal>,
    created: usize,
    panic_on_tick: bool,
    refuse: bool,
}

impl JournalRuntime {
    fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            created: 0,
            panic_on_tick: false,
            refuse: false,
        }
    }
}

impl ScriptRuntime for JournalRuntime {
    fn create_resource(
        &mut self,
        _resource: ResourceRef,
    ) -> RuntimeResult<Box<dyn ResourceImplementation>> {
        if self.refuse {
            return Err(RuntimeError::ImplementationFailed(
                "runtime refuses new resources".to_string(),
            ));
        }
        self.created += 1;
        let name = format!("res{}", self.created);
        self.journal.push(format!("create:{name}"));
        Ok(Box::new(JournalResource {
            name,
            journal: Arc::clone(&self.journal),
            objects: HashSet::new(),
            panic_on_tick: self.panic_on_tick,
        }))
    }

    fn destroy_resource(&mut self, _resource: ResourceRef) {
        self.journal.push("destroy");
    }

    fn on_tick(&mut self) {
        self.journal.push("runtime-tick");
    }
}

/// A stand-in for a host object: any stable, non-null address works.
fn host_object<T>() -> *mut T {
    Box::into_raw(Box::new(0u64)).cast()
}

unsafe fn free_host_object<T>(ptr: *mut T) {
    drop(Box::from_raw(ptr.cast::<u64>()));
}

unsafe fn resource_handle<'a>(raw: *mut alt_IResource_Impl) -> &'a ResourceImplHandle {
    ResourceImplHandle::from_raw(raw).expect("non-null implementation")
}

// ==============================================================================
// Lifecycle Tests
// ==============================================================================

#[test]
fn test_full_resource_lifecycle() {
    let journal = Arc::new(Journal::default());
    let registration = register_runtime("rust", JournalRuntime::new(Arc::clone(&journal)));
    assert_eq!(registration.resource_type(), "rust");

    let resource: *mut alt_IResource = host_object();
    let event: *mut alt_CEvent = host_object();
    let object: *mut alt_RefBase_RefStore_IBaseObject = host_object();

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        let raw = runtime.create_impl(resource);
        assert!(!raw.is_null());
        assert!(has_resource(ResourceRef::from_raw(resource).unwrap()));

        let handle = resource_handle(raw);
        assert_eq!(handle.resource(), resource);

        assert!(handle.start());
        assert!(handle.on_event(event));
        handle.tick();
        runtime.tick();
        handle.on_create_base_object(object);
        handle.on_remove_base_object(object);
        assert!(handle.stop());

        runtime.destroy_impl(raw);
        ResourceImplHandle::release(raw);
        assert!(!has_resource(ResourceRef::from_raw(resource).unwrap()));

        free_host_object(resource);
        free_host_object(event);
        free_host_object(object);
    }

    assert_eq!(
        journal.entries(),
        vec![
            "create:res1",
            "start:res1",
            "event:res1",
            "tick:res1",
            "runtime-tick",
            "objects:res1:1",
            "objects:res1:0",
            "stop:res1",
            "destroy",
        ]
    );

    registration.unregister().unwrap();
}

#[test]
fn test_resources_are_routed_independently() {
    let journal = Arc::new(Journal::default());
    let registration = register_runtime("rust", JournalRuntime::new(Arc::clone(&journal)));

    let first: *mut alt_IResource = host_object();
    let second: *mut alt_IResource = host_object();

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        let first_impl = runtime.create_impl(first);
        let second_impl = runtime.create_impl(second);
        assert_ne!(first_impl, second_impl);

        resource_handle(second_impl).start();
        resource_handle(first_impl).tick();
        resource_handle(second_impl).tick();
        resource_handle(second_impl).tick();

        runtime.destroy_impl(first_impl);
        // The remaining resource keeps working.
        resource_handle(second_impl).tick();

        runtime.destroy_impl(second_impl);
        ResourceImplHandle::release(first_impl);
        ResourceImplHandle::release(second_impl);
        free_host_object(first);
        free_host_object(second);
    }

    assert_eq!(journal.count("start:res1"), 0);
    assert_eq!(journal.count("start:res2"), 1);
    assert_eq!(journal.count("tick:res1"), 1);
    assert_eq!(journal.count("tick:res2"), 3);
    assert_eq!(journal.count("destroy"), 2);

    registration.unregister().unwrap();
}

#[test]
fn test_extra_slot_on_created_implementation() {
    let journal = Arc::new(Journal::default());
    let registration = register_runtime("rust", JournalRuntime::new(journal));
    let resource: *mut alt_IResource = host_object();
    let mut state = String::from("plugin-owned");

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        let raw = runtime.create_impl(resource);

        assert!(alt_CAPIResource_Impl_GetExtra(raw).is_null());
        alt_CAPIResource_Impl_SetExtra(raw, (&mut state as *mut String).cast());
        let extra = alt_CAPIResource_Impl_GetExtra(raw).cast::<String>();
        assert_eq!(&*extra, "plugin-owned");

        runtime.destroy_impl(raw);
        ResourceImplHandle::release(raw);
        free_host_object(resource);
    }

    // Releasing the handle never touches the extra value.
    assert_eq!(state, "plugin-owned");
    registration.unregister().unwrap();
}

// ==============================================================================
// Failure Tests
// ==============================================================================

#[test]
fn test_refused_resource_returns_null() {
    let journal = Arc::new(Journal::default());
    let mut runtime = JournalRuntime::new(Arc::clone(&journal));
    runtime.refuse = true;
    let registration = register_runtime("rust", runtime);
    let resource: *mut alt_IResource = host_object();

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        assert!(runtime.create_impl(resource).is_null());
        assert!(!has_resource(ResourceRef::from_raw(resource).unwrap()));
        free_host_object(resource);
    }

    assert!(journal.entries().is_empty());
    registration.unregister().unwrap();
}

#[test]
fn test_panicking_tick_does_not_poison_resource() {
    let journal = Arc::new(Journal::default());
    let mut runtime = JournalRuntime::new(Arc::clone(&journal));
    runtime.panic_on_tick = true;
    let registration = register_runtime("rust", runtime);
    let resource: *mut alt_IResource = host_object();

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        let raw = runtime.create_impl(resource);
        let handle = resource_handle(raw);

        handle.tick();
        // Still reachable after the panic was caught.
        assert!(handle.start());
        assert!(handle.stop());

        runtime.destroy_impl(raw);
        ResourceImplHandle::release(raw);
        free_host_object(resource);
    }

    assert_eq!(journal.count("start:res1"), 1);
    assert_eq!(journal.count("tick:"), 0);
    registration.unregister().unwrap();
}

#[test]
fn test_unregister_drops_live_resources() {
    let journal = Arc::new(Journal::default());
    let registration = register_runtime("rust", JournalRuntime::new(journal));
    let resource: *mut alt_IResource = host_object();

    unsafe {
        let runtime = ScriptRuntimeHandle::from_raw(registration.handle()).unwrap();
        let raw = runtime.create_impl(resource);
        assert!(has_resource(ResourceRef::from_raw(resource).unwrap()));

        registration.unregister().unwrap();
        assert!(!has_resource(ResourceRef::from_raw(resource).unwrap()));

        ResourceImplHandle::release(raw);
        free_host_object(resource);
    }
}
