//! Metadata directory for element classes, used to instantiate elements
//! by name (spec §2/§4.9 Registry/Factory).

use crate::element::Element;
use crate::pad::PadTemplate;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type ElementConstructor = Arc<dyn Fn(&str) -> Element + Send + Sync>;

#[derive(Clone)]
pub struct ElementFactory {
    pub name: String,
    pub rank: i32,
    pub pad_templates: Vec<PadTemplate>,
    constructor: ElementConstructor,
}

impl ElementFactory {
    pub fn new(
        name: impl Into<String>,
        rank: i32,
        pad_templates: Vec<PadTemplate>,
        constructor: ElementConstructor,
    ) -> Self {
        Self {
            name: name.into(),
            rank,
            pad_templates,
            constructor,
        }
    }

    pub fn instantiate(&self, instance_name: &str) -> Element {
        (self.constructor)(instance_name)
    }
}

/// Process-wide registry, mirroring the teacher's `once_cell`-backed
/// global managers (e.g. `backend::detector::DETECTION_CACHE`).
pub struct Registry {
    factories: RwLock<HashMap<String, ElementFactory>>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

impl Registry {
    fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    /// `element_register(plugin, name, rank, type)` (spec §6). Keeps the
    /// highest-rank factory when names collide, the way the original
    /// registry resolves competing plugins (spec §4.9).
    pub fn register(&self, factory: ElementFactory) {
        let mut factories = self.factories.write();
        match factories.get(&factory.name) {
            Some(existing) if existing.rank >= factory.rank => {
                log::debug!(
                    target: "corestream::registry",
                    "keeping existing factory {} (rank {}) over incoming rank {}",
                    factory.name, existing.rank, factory.rank
                );
            }
            _ => {
                log::info!(target: "corestream::registry", "registered element factory {}", factory.name);
                factories.insert(factory.name.clone(), factory);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ElementFactory> {
        self.factories.read().get(name).cloned()
    }

    /// `element_factory_make(name, instance_name)` (spec §6).
    pub fn make(&self, name: &str, instance_name: &str) -> Option<Element> {
        self.lookup(name).map(|f| f.instantiate(instance_name))
    }

    pub fn factory_names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    #[test]
    fn register_then_make_instantiates_by_name() {
        let registry = Registry::new();
        registry.register(ElementFactory::new(
            "testidentity",
            0,
            vec![],
            Arc::new(|name| Element::new(name)),
        ));
        let e = registry.make("testidentity", "my-instance").unwrap();
        assert_eq!(e.name(), "my-instance");
    }

    #[test]
    fn higher_rank_factory_wins_on_collision() {
        let registry = Registry::new();
        registry.register(ElementFactory::new(
            "dup",
            0,
            vec![],
            Arc::new(|name| Element::new(format!("low-{name}"))),
        ));
        registry.register(ElementFactory::new(
            "dup",
            10,
            vec![],
            Arc::new(|name| Element::new(format!("high-{name}"))),
        ));
        let e = registry.make("dup", "x").unwrap();
        assert_eq!(e.name(), "high-x");
    }

    #[test]
    fn lower_rank_does_not_displace_existing() {
        let registry = Registry::new();
        registry.register(ElementFactory::new(
            "dup2",
            10,
            vec![],
            Arc::new(|name| Element::new(format!("high-{name}"))),
        ));
        registry.register(ElementFactory::new(
            "dup2",
            0,
            vec![],
            Arc::new(|name| Element::new(format!("low-{name}"))),
        ));
        let e = registry.make("dup2", "x").unwrap();
        assert_eq!(e.name(), "high-x");
    }
}
