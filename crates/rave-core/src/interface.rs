//! Interface types and the narrow object contract shared with plugins.
//!
//! The registry never interprets the objects plugins create. It only needs to
//! know each object's declared [`InterfaceType`], whether a robot really is a
//! robot, and how to hand the object back to the caller.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PluginError;

/// Revision of the interface object contract. Bump when [`Interface`] or
/// [`crate::plugin::RavePlugin`] change shape.
pub const INTERFACE_ABI_REVISION: u32 = 1;

/// Interface category a plugin can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Planner,
    Robot,
    SensorSystem,
    Controller,
    Module,
    IkSolver,
    KinBody,
    PhysicsEngine,
    Sensor,
    CollisionChecker,
    Trajectory,
    Viewer,
    SpaceSampler,
}

impl InterfaceType {
    /// All interface types, in declaration order.
    pub const ALL: [InterfaceType; 13] = [
        InterfaceType::Planner,
        InterfaceType::Robot,
        InterfaceType::SensorSystem,
        InterfaceType::Controller,
        InterfaceType::Module,
        InterfaceType::IkSolver,
        InterfaceType::KinBody,
        InterfaceType::PhysicsEngine,
        InterfaceType::Sensor,
        InterfaceType::CollisionChecker,
        InterfaceType::Trajectory,
        InterfaceType::Viewer,
        InterfaceType::SpaceSampler,
    ];

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Planner => "planner",
            InterfaceType::Robot => "robot",
            InterfaceType::SensorSystem => "sensorsystem",
            InterfaceType::Controller => "controller",
            InterfaceType::Module => "module",
            InterfaceType::IkSolver => "iksolver",
            InterfaceType::KinBody => "kinbody",
            InterfaceType::PhysicsEngine => "physicsengine",
            InterfaceType::Sensor => "sensor",
            InterfaceType::CollisionChecker => "collisionchecker",
            InterfaceType::Trajectory => "trajectory",
            InterfaceType::Viewer => "viewer",
            InterfaceType::SpaceSampler => "spacesampler",
        }
    }

    /// Name of the generic implementation used when a caller asks for this
    /// type without naming one.
    ///
    /// `KinBody` has no entry: an unnamed body is synthesised by the database
    /// itself without consulting any plugin.
    pub fn default_name(&self) -> Option<&'static str> {
        match self {
            InterfaceType::PhysicsEngine => Some("GenericPhysicsEngine"),
            InterfaceType::CollisionChecker => Some("GenericCollisionChecker"),
            InterfaceType::Robot => Some("GenericRobot"),
            InterfaceType::Trajectory => Some("GenericTrajectory"),
            _ => None,
        }
    }

    /// Whether an object declared as `self` may be handed to a caller that
    /// asked for `requested`. Robots are also bodies; nothing else converts.
    pub fn is_substitutable_for(&self, requested: InterfaceType) -> bool {
        *self == requested
            || (*self == InterfaceType::Robot && requested == InterfaceType::KinBody)
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceType {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InterfaceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                PluginError::InvalidConfiguration(format!("Unknown interface type: {}", s))
            })
    }
}

static INTERFACE_HASHES: Lazy<HashMap<InterfaceType, String>> = Lazy::new(|| {
    InterfaceType::ALL
        .iter()
        .map(|t| {
            let seed = format!("interface:{}:{}", t.as_str(), INTERFACE_ABI_REVISION);
            (*t, fingerprint(&seed))
        })
        .collect()
});

static ENVIRONMENT_HASH: Lazy<String> = Lazy::new(|| {
    fingerprint(&format!(
        "environment:{}.{}:{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        INTERFACE_ABI_REVISION
    ))
});

fn fingerprint(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    format!("{:x}", digest)[..32].to_string()
}

/// Compatibility fingerprint for one interface type, passed to every factory
/// call so a plugin built against a different contract can refuse.
pub fn interface_hash(interface_type: InterfaceType) -> &'static str {
    INTERFACE_HASHES
        .get(&interface_type)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Compatibility fingerprint of the hosting runtime.
pub fn environment_hash() -> &'static str {
    ENVIRONMENT_HASH.as_str()
}

/// The simulation environment an interface is created in.
pub trait Environment: Send + Sync {
    /// Environment identifier, used in diagnostics.
    fn id(&self) -> u32;
}

/// Shared environment handle.
pub type EnvironmentPtr = Arc<dyn Environment>;

/// An object created by a plugin.
pub trait Interface: Any + Send + Sync {
    /// Declared interface type of this object.
    fn interface_type(&self) -> InterfaceType;

    /// Robot objects must report `true` here to be accepted as robots.
    fn is_robot(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Shared interface handle.
pub type InterfacePtr = Arc<dyn Interface>;

/// Default body returned for an unnamed `KinBody` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinBody {
    environment_id: u32,
}

impl KinBody {
    pub fn new(env: &EnvironmentPtr) -> Self {
        Self {
            environment_id: env.id(),
        }
    }

    pub fn environment_id(&self) -> u32 {
        self.environment_id
    }
}

impl Interface for KinBody {
    fn interface_type(&self) -> InterfaceType {
        InterfaceType::KinBody
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An interface instance together with the attribution stamped on it by the
/// plugin database.
#[derive(Clone)]
pub struct CreatedInterface {
    interface: InterfacePtr,
    plugin_name: String,
    plugin_path: Option<PathBuf>,
    xml_id: String,
}

impl CreatedInterface {
    pub(crate) fn new(
        interface: InterfacePtr,
        plugin_name: impl Into<String>,
        plugin_path: Option<PathBuf>,
        xml_id: impl Into<String>,
    ) -> Self {
        Self {
            interface,
            plugin_name: plugin_name.into(),
            plugin_path,
            xml_id: xml_id.into(),
        }
    }

    /// Declared type of the wrapped object.
    pub fn interface_type(&self) -> InterfaceType {
        self.interface.interface_type()
    }

    /// Name of the plugin that produced the object. Empty for bodies
    /// synthesised by the database.
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Library path of the producing plugin; `None` for in-process plugins.
    pub fn plugin_path(&self) -> Option<&Path> {
        self.plugin_path.as_deref()
    }

    /// The full name the object was requested under, parameters included.
    pub fn xml_id(&self) -> &str {
        &self.xml_id
    }

    pub fn interface(&self) -> &InterfacePtr {
        &self.interface
    }

    pub fn into_interface(self) -> InterfacePtr {
        self.interface
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.interface.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for CreatedInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedInterface")
            .field("interface_type", &self.interface_type())
            .field("plugin_name", &self.plugin_name)
            .field("plugin_path", &self.plugin_path)
            .field("xml_id", &self.xml_id)
            .finish()
    }
}
