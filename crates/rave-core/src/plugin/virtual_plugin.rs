//! In-process plugins backed by a single factory closure.

use std::fmt;
use std::sync::Arc;

use super::{InterfaceMap, RavePlugin};
use crate::error::Result;
use crate::interface::{EnvironmentPtr, InterfacePtr, InterfaceType};

/// Factory invoked with the target environment and the parameter string that
/// followed the interface name in the request.
pub type VirtualFactory =
    Arc<dyn Fn(&EnvironmentPtr, &str) -> Option<InterfacePtr> + Send + Sync>;

/// A plugin providing exactly one interface through a closure.
pub struct VirtualPlugin {
    name: String,
    interfaces: InterfaceMap,
    factory: VirtualFactory,
}

impl VirtualPlugin {
    pub fn new(interface_type: InterfaceType, name: impl Into<String>, factory: VirtualFactory) -> Self {
        let name = name.into();
        let mut interfaces = InterfaceMap::new();
        interfaces.insert(interface_type, vec![name.clone()]);
        Self {
            name,
            interfaces,
            factory,
        }
    }
}

impl RavePlugin for VirtualPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> &InterfaceMap {
        &self.interfaces
    }

    fn create_interface(
        &self,
        interface_type: InterfaceType,
        name: &str,
        _interface_hash: &str,
        _environment_hash: &str,
        env: &EnvironmentPtr,
    ) -> Result<Option<InterfacePtr>> {
        if !self.interfaces.contains_key(&interface_type) {
            return Ok(None);
        }
        let params = super::split_interface_name(name)
            .map(|(_, params)| params)
            .unwrap_or_default();
        Ok((self.factory)(env, params))
    }
}

impl fmt::Debug for VirtualPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualPlugin")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .finish()
    }
}
