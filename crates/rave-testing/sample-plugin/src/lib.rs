//! Sample plugin loaded from disk by the loader tests.
//!
//! Provides two planners: `Steady` always constructs, `Flaky` never does.

use std::any::Any;
use std::sync::Arc;

use rave_core::prelude::*;

pub const PLUGIN_NAME: &str = "sample";

/// Planner handed out for `Steady`.
#[derive(Debug)]
pub struct SamplePlanner {
    pub params: String,
}

impl Interface for SamplePlanner {
    fn interface_type(&self) -> InterfaceType {
        InterfaceType::Planner
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct SamplePlugin {
    interfaces: InterfaceMap,
}

impl SamplePlugin {
    pub fn new() -> Self {
        let mut interfaces = InterfaceMap::new();
        interfaces.insert(
            InterfaceType::Planner,
            vec!["Steady".to_string(), "Flaky".to_string()],
        );
        Self { interfaces }
    }
}

impl Default for SamplePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl RavePlugin for SamplePlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn interfaces(&self) -> &InterfaceMap {
        &self.interfaces
    }

    fn create_interface(
        &self,
        interface_type: InterfaceType,
        name: &str,
        iface_hash: &str,
        env_hash: &str,
        _env: &EnvironmentPtr,
    ) -> Result<Option<InterfacePtr>> {
        if iface_hash != interface_hash(interface_type) || env_hash != environment_hash() {
            return Ok(None);
        }

        let (key, params) = name.split_once(' ').unwrap_or((name, ""));
        if interface_type != InterfaceType::Planner || !key.eq_ignore_ascii_case("steady") {
            return Ok(None);
        }
        Ok(Some(Arc::new(SamplePlanner {
            params: params.to_string(),
        }) as InterfacePtr))
    }
}

rave_core::declare_plugin!(SamplePlugin::new);
