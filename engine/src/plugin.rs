use crate::recall::Family;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginEcosystem {
    Ladspa,
    Dssi,
    Lv2,
}

impl fmt::Display for PluginEcosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PluginEcosystem::Ladspa => "LADSPA",
            PluginEcosystem::Dssi => "DSSI",
            PluginEcosystem::Lv2 => "LV2",
        })
    }
}

/// Identifies one effect inside a plugin binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginRef {
    pub filename: String,
    pub effect: String,
}

impl PluginRef {
    pub fn new(filename: impl Into<String>, effect: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            effect: effect.into(),
        }
    }
}

/// Presence check against one plugin ecosystem's installed plugins.
pub trait PluginRegistry: Send + Sync {
    fn ecosystem(&self) -> PluginEcosystem;
    fn contains(&self, plugin: &PluginRef) -> bool;
}

#[derive(Debug, Clone)]
pub struct StaticPluginRegistry {
    ecosystem: PluginEcosystem,
    plugins: HashSet<PluginRef>,
}

impl StaticPluginRegistry {
    pub fn new(ecosystem: PluginEcosystem) -> Self {
        Self {
            ecosystem,
            plugins: HashSet::new(),
        }
    }

    pub fn with(mut self, filename: &str, effect: &str) -> Self {
        self.plugins.insert(PluginRef::new(filename, effect));
        self
    }
}

impl PluginRegistry for StaticPluginRegistry {
    fn ecosystem(&self) -> PluginEcosystem {
        self.ecosystem
    }

    fn contains(&self, plugin: &PluginRef) -> bool {
        self.plugins.contains(plugin)
    }
}

/// Every registry the factory and the project reader consult.
#[derive(Clone, Default)]
pub struct PluginManagers {
    registries: Vec<Arc<dyn PluginRegistry>>,
}

impl PluginManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registry: Arc<dyn PluginRegistry>) {
        self.registries.push(registry);
    }

    pub fn contains(&self, ecosystem: PluginEcosystem, plugin: &PluginRef) -> bool {
        self.registries
            .iter()
            .filter(|r| r.ecosystem() == ecosystem)
            .any(|r| r.contains(plugin))
    }

    /// Generic family hosting `plugin`, checking LADSPA, DSSI, then LV2.
    pub fn resolve_family(&self, plugin: &PluginRef) -> Option<Family> {
        [Family::Ladspa, Family::Dssi, Family::Lv2]
            .into_iter()
            .find(|family| {
                family
                    .plugin_ecosystem()
                    .is_some_and(|ecosystem| self.contains(ecosystem, plugin))
            })
    }
}

impl fmt::Debug for PluginManagers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.registries.iter().map(|r| r.ecosystem()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn managers() -> PluginManagers {
        let mut managers = PluginManagers::new();
        managers.register(Arc::new(
            StaticPluginRegistry::new(PluginEcosystem::Ladspa).with("cmt.so", "delay_5s"),
        ));
        managers.register(Arc::new(
            StaticPluginRegistry::new(PluginEcosystem::Lv2)
                .with("http://calf.sourceforge.net/plugins/Reverb", "Reverb")
                .with("cmt.so", "delay_5s"),
        ));
        managers
    }

    #[test]
    fn resolves_first_ecosystem_that_knows_plugin() {
        let managers = managers();
        assert_eq!(
            managers.resolve_family(&PluginRef::new("cmt.so", "delay_5s")),
            Some(Family::Ladspa)
        );
        assert_eq!(
            managers.resolve_family(&PluginRef::new(
                "http://calf.sourceforge.net/plugins/Reverb",
                "Reverb"
            )),
            Some(Family::Lv2)
        );
    }

    #[test]
    fn unknown_plugin_resolves_to_nothing() {
        assert_eq!(
            managers().resolve_family(&PluginRef::new("cmt.so", "missing")),
            None
        );
    }
}
