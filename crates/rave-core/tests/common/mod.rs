//! Mock plugins, interfaces and environments shared by integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rave_core::plugin::InterfaceMap;
use rave_core::prelude::*;

pub struct TestEnv(pub u32);

impl Environment for TestEnv {
    fn id(&self) -> u32 {
        self.0
    }
}

pub fn env() -> EnvironmentPtr {
    Arc::new(TestEnv(1))
}

/// Interface object that reports whatever it is told to.
#[derive(Debug)]
pub struct MockInterface {
    pub declared: InterfaceType,
    pub robot: bool,
    pub params: String,
}

impl Interface for MockInterface {
    fn interface_type(&self) -> InterfaceType {
        self.declared
    }

    fn is_robot(&self) -> bool {
        self.robot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What a mock plugin does when asked for an interface.
#[derive(Debug, Clone, Copy)]
pub enum Produce {
    /// Return an instance declaring this type. Robots report `is_robot`.
    Instance(InterfaceType),
    /// Return a robot-typed instance that denies being a robot.
    FakeRobot,
    Nothing,
    Error,
    Panic,
}

/// Shared, ordered record of hook invocations across plugins.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub struct MockPlugin {
    name: String,
    interfaces: InterfaceMap,
    produce: Produce,
    version: String,
    calls: Arc<AtomicUsize>,
    events: EventLog,
    panic_in_hooks: bool,
}

impl MockPlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interfaces: InterfaceMap::new(),
            produce: Produce::Nothing,
            version: rave_core::plugin::HOST_VERSION.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
            panic_in_hooks: false,
        }
    }

    pub fn provides(mut self, interface_type: InterfaceType, name: &str) -> Self {
        self.interfaces
            .entry(interface_type)
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn produces(mut self, produce: Produce) -> Self {
        self.produce = produce;
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn panic_in_hooks(mut self) -> Self {
        self.panic_in_hooks = true;
        self
    }

    /// Counter of `create_interface` calls, readable after the plugin moves.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn record(&self, hook: &str) {
        self.events.lock().push(format!("{}:{}", self.name, hook));
        if self.panic_in_hooks {
            panic!("{} hook {} failed", self.name, hook);
        }
    }
}

impl RavePlugin for MockPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> &InterfaceMap {
        &self.interfaces
    }

    fn host_version(&self) -> &str {
        &self.version
    }

    fn create_interface(
        &self,
        interface_type: InterfaceType,
        name: &str,
        _interface_hash: &str,
        _environment_hash: &str,
        _env: &EnvironmentPtr,
    ) -> Result<Option<InterfacePtr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let params = name.split_once(' ').map(|(_, p)| p).unwrap_or("").to_string();

        match self.produce {
            Produce::Instance(declared) => Ok(Some(Arc::new(MockInterface {
                declared,
                robot: declared == InterfaceType::Robot,
                params,
            }) as InterfacePtr)),
            Produce::FakeRobot => Ok(Some(Arc::new(MockInterface {
                declared: InterfaceType::Robot,
                robot: false,
                params,
            }) as InterfacePtr)),
            Produce::Nothing => Ok(None),
            Produce::Error => Err(PluginError::CreationFailed {
                interface_type,
                name: name.to_string(),
                reason: "mock failure".to_string(),
            }),
            Produce::Panic => panic!("mock plugin {} panicked", self.name),
        }
    }

    fn on_initialized(&self) -> Result<()> {
        self.record("initialized");
        Ok(())
    }

    fn on_pre_destroy(&self) -> Result<()> {
        self.record("pre_destroy");
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.record("destroy");
        Ok(())
    }
}

/// Virtual factory producing plain bodies and counting its calls.
pub fn counting_body_factory() -> (VirtualFactory, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let factory: VirtualFactory = Arc::new(move |env: &EnvironmentPtr, _params: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(KinBody::new(env)) as InterfacePtr)
    });
    (factory, calls)
}

/// Write a file with the platform module suffix that is not a loadable library.
pub fn write_fake_module(dir: &std::path::Path, stem: &str) -> std::path::PathBuf {
    let path = dir.join(format!("{}.{}", stem, std::env::consts::DLL_EXTENSION));
    std::fs::write(&path, b"not a shared object").unwrap();
    path
}
