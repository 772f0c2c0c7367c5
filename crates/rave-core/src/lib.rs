//! Rave plugin core.
//!
//! Discovers native plugin libraries on configured search paths, registers
//! the interfaces each one provides, and creates interface instances by
//! `(type, name)` on demand.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rave_core::prelude::*;
//!
//! struct World;
//!
//! impl Environment for World {
//!     fn id(&self) -> u32 {
//!         1
//!     }
//! }
//!
//! let db = PluginDatabase::new();
//! db.init();
//!
//! let env: EnvironmentPtr = Arc::new(World);
//! if let Some(checker) = db.create(&env, InterfaceType::CollisionChecker, "fcl") {
//!     println!("created by {}", checker.plugin_name());
//! }
//! db.destroy();
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod interface;
pub mod plugin;

pub use config::PluginDbConfig;
pub use database::PluginDatabase;
pub use error::{PluginError, Result};
pub use interface::{
    CreatedInterface, Environment, EnvironmentPtr, Interface, InterfacePtr, InterfaceType,
    KinBody,
};
pub use plugin::{InterfaceMap, PluginDescriptor, PluginInfo, RavePlugin};

/// Common imports for hosts and plugin authors.
pub mod prelude {
    pub use crate::config::PluginDbConfig;
    pub use crate::database::PluginDatabase;
    pub use crate::error::{PluginError, Result};
    pub use crate::interface::{
        environment_hash, interface_hash, CreatedInterface, Environment, EnvironmentPtr,
        Interface, InterfacePtr, InterfaceType, KinBody,
    };
    pub use crate::plugin::{InterfaceMap, RavePlugin, VirtualFactory};
}
