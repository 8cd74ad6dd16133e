//! # module-dummy
//!
//! A dummy script runtime module for testing and development.
//!
//! The runtime accepts every resource and only counts what the host asks of
//! it. It exercises the whole registration path (module entry, version
//! markers, resource callbacks) without running any actual scripts, which
//! makes it the fixture for host-side tests.

use chrono::{DateTime, Utc};
use resource_runtime::{
    export_module, BaseObjectRef, EventRef, ResourceImplementation, ResourceRef, RuntimeConfig,
    RuntimeResult, RuntimeSection, ScriptRuntime,
};
#[cfg(feature = "server-api")]
use resource_runtime::ClientRequest;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Counters shared by a runtime and all of its resources.
#[derive(Debug, Default)]
pub struct DummyStats {
    resources_created: AtomicUsize,
    resources_destroyed: AtomicUsize,
    clients_made: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    events: AtomicUsize,
    resource_ticks: AtomicUsize,
    runtime_ticks: AtomicUsize,
    live_objects: AtomicUsize,
}

/// Point-in-time copy of [`DummyStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub resources_created: usize,
    pub resources_destroyed: usize,
    pub clients_made: usize,
    pub starts: usize,
    pub stops: usize,
    pub events: usize,
    pub resource_ticks: usize,
    pub runtime_ticks: usize,
    pub live_objects: usize,
}

impl DummyStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            resources_created: self.resources_created.load(Ordering::Relaxed),
            resources_destroyed: self.resources_destroyed.load(Ordering::Relaxed),
            clients_made: self.clients_made.load(Ordering::Relaxed),
            starts: self.starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            resource_ticks: self.resource_ticks.load(Ordering::Relaxed),
            runtime_ticks: self.runtime_ticks.load(Ordering::Relaxed),
            live_objects: self.live_objects.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Stats of the runtime created through the exported module entry.
pub fn global_stats() -> Arc<DummyStats> {
    static STATS: OnceLock<Arc<DummyStats>> = OnceLock::new();
    Arc::clone(STATS.get_or_init(|| Arc::new(DummyStats::default())))
}

/// A script runtime that hands out [`DummyResource`]s.
pub struct DummyRuntime {
    section: RuntimeSection,
    stats: Arc<DummyStats>,
}

impl DummyRuntime {
    /// Create a runtime reporting into `stats`.
    pub fn new(section: RuntimeSection, stats: Arc<DummyStats>) -> Self {
        Self { section, stats }
    }

    /// Create the runtime behind the module entry point.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.runtime.clone(), global_stats())
    }

    pub fn resource_type(&self) -> &str {
        &self.section.resource_type
    }

    pub fn stats(&self) -> Arc<DummyStats> {
        Arc::clone(&self.stats)
    }
}

impl ScriptRuntime for DummyRuntime {
    fn create_resource(
        &mut self,
        resource: ResourceRef,
    ) -> RuntimeResult<Box<dyn ResourceImplementation>> {
        bump(&self.stats.resources_created);
        debug!(resource = %resource, resource_type = %self.section.resource_type, "Creating dummy resource");
        Ok(Box::new(DummyResource::new(resource, Arc::clone(&self.stats))))
    }

    fn destroy_resource(&mut self, resource: ResourceRef) {
        bump(&self.stats.resources_destroyed);
        debug!(resource = %resource, "Destroyed dummy resource");
    }

    fn on_tick(&mut self) {
        bump(&self.stats.runtime_ticks);
    }
}

/// A resource that records its lifecycle and tracks the base objects it saw.
pub struct DummyResource {
    resource: ResourceRef,
    stats: Arc<DummyStats>,
    objects: HashSet<BaseObjectRef>,
    started_at: Option<DateTime<Utc>>,
}

impl DummyResource {
    fn new(resource: ResourceRef, stats: Arc<DummyStats>) -> Self {
        Self {
            resource,
            stats,
            objects: HashSet::new(),
            started_at: None,
        }
    }

    fn sync_live_objects(&self, before: usize) {
        let after = self.objects.len();
        if after > before {
            self.stats.live_objects.fetch_add(after - before, Ordering::Relaxed);
        } else if before > after {
            self.stats.live_objects.fetch_sub(before - after, Ordering::Relaxed);
        }
    }
}

impl ResourceImplementation for DummyResource {
    #[cfg(feature = "server-api")]
    fn make_client(&mut self, request: ClientRequest) -> bool {
        bump(&self.stats.clients_made);
        debug!(
            resource = %self.resource,
            ?request,
            "Client resource requested"
        );
        true
    }

    fn start(&mut self) -> bool {
        bump(&self.stats.starts);
        self.started_at = Some(Utc::now());
        info!(resource = %self.resource, "Dummy resource started");
        true
    }

    fn stop(&mut self) -> bool {
        bump(&self.stats.stops);
        if let Some(started_at) = self.started_at.take() {
            let uptime = Utc::now() - started_at;
            info!(
                resource = %self.resource,
                uptime_ms = uptime.num_milliseconds(),
                "Dummy resource stopped"
            );
        }
        true
    }

    fn on_event(&mut self, _event: EventRef) -> bool {
        bump(&self.stats.events);
        true
    }

    fn on_tick(&mut self) {
        bump(&self.stats.resource_ticks);
    }

    fn on_create_base_object(&mut self, object: BaseObjectRef) {
        let before = self.objects.len();
        self.objects.insert(object);
        self.sync_live_objects(before);
    }

    fn on_remove_base_object(&mut self, object: BaseObjectRef) {
        let before = self.objects.len();
        self.objects.remove(&object);
        self.sync_live_objects(before);
    }
}

impl Drop for DummyResource {
    fn drop(&mut self) {
        // Objects the host never removed die with the resource.
        if !self.objects.is_empty() {
            self.stats
                .live_objects
                .fetch_sub(self.objects.len(), Ordering::Relaxed);
        }
    }
}

export_module!(DummyRuntime::from_config);
