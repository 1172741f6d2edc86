use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::behavior::{Behavior, BehaviorSlot};
use crate::component::ComponentBox;
use crate::error::WorldError;
use crate::object::{TemplateMeta, WorldObject};

type ComponentFactory = Box<dyn Fn() -> Vec<ComponentBox>>;
type BehaviorFactory = Box<dyn Fn() -> BehaviorSlot>;

/// Recipe for building objects of one kind.
///
/// Factories run exactly once per instantiated object.
pub struct Template {
    key: String,
    queryable: bool,
    tags: BTreeSet<String>,
    components: Option<ComponentFactory>,
    behavior: Option<BehaviorFactory>,
}

impl Template {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            queryable: false,
            tags: BTreeSet::new(),
            components: None,
            behavior: None,
        }
    }

    pub fn queryable(mut self, queryable: bool) -> Self {
        self.queryable = queryable;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn components<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Vec<ComponentBox> + 'static,
    {
        self.components = Some(Box::new(factory));
        self
    }

    pub fn behavior<B, F>(mut self, factory: F) -> Self
    where
        B: Behavior,
        F: Fn() -> B + 'static,
    {
        self.behavior = Some(Box::new(move || BehaviorSlot::new(factory())));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn meta(&self) -> TemplateMeta {
        TemplateMeta {
            key: self.key.clone(),
            queryable: self.queryable,
            tags: self.tags.clone(),
        }
    }

    /// Build a fresh, unadmitted object.
    pub fn instantiate(&self) -> Result<WorldObject, WorldError> {
        let components = self.components.as_ref().map(|factory| factory()).unwrap_or_default();
        let object = WorldObject::with_components(self.meta(), components)?;
        Ok(match &self.behavior {
            Some(factory) => object.with_behavior_slot(factory()),
            None => object,
        })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("key", &self.key)
            .field("queryable", &self.queryable)
            .field("tags", &self.tags)
            .field("has_components", &self.components.is_some())
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

/// Key to template lookup.
///
/// Constructed explicitly and passed to whoever needs it, so separate worlds
/// and tests never share registrations.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, returning the one it replaced.
    pub fn register(&mut self, template: Template) -> Option<Template> {
        self.templates.insert(template.key.clone(), template)
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn clear(&mut self) {
        self.templates.clear();
    }

    pub fn instantiate(&self, key: &str) -> Result<WorldObject, WorldError> {
        self.get(key)
            .ok_or_else(|| WorldError::UnknownTemplate(key.to_string()))?
            .instantiate()
    }
}
