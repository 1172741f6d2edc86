use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of an object inside one world.
///
/// Allocated by the world at admission time from a monotonically increasing
/// counter. An id is never handed out twice by the same world, so ordering
/// by id is the same as ordering by admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a world instance.
///
/// Objects hold this as their back-reference to the owning world. It is an
/// identifier, never a pointer, so it can outlive the world safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.0.to_string())
    }
}

/// Structural snapshot of a single object.
///
/// Serialized as
/// `{ "templateKey": "...", "position": [x, y], "components": { name: payload } }`.
/// Component payloads are opaque to everything but the component that wrote
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSnapshot {
    pub template_key: String,
    pub position: Vec2,
    #[serde(default)]
    pub components: BTreeMap<String, serde_json::Value>,
}

impl ObjectSnapshot {
    pub fn new(template_key: impl Into<String>, position: Vec2) -> Self {
        Self {
            template_key: template_key.into(),
            position,
            components: BTreeMap::new(),
        }
    }
}

/// Ordered sequence of object snapshots making up a whole world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldSnapshot {
    pub objects: Vec<ObjectSnapshot>,
}

impl WorldSnapshot {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_id_uniqueness() {
        let a = WorldId::new();
        let b = WorldId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn object_ids_order_by_allocation() {
        assert!(ObjectId(1) < ObjectId(2));
        assert_eq!(ObjectId(7).to_string(), "#7");
    }

    #[test]
    fn snapshot_wire_format() {
        let mut snap = ObjectSnapshot::new("crate", Vec2::new(150.0, 200.0));
        snap.components
            .insert("Example".into(), serde_json::json!({ "test": "hello" }));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["templateKey"], "crate");
        assert_eq!(json["position"], serde_json::json!([150.0, 200.0]));
        assert_eq!(json["components"]["Example"]["test"], "hello");
    }

    #[test]
    fn snapshot_without_components_parses() {
        let snap: ObjectSnapshot =
            serde_json::from_str(r#"{ "templateKey": "rock", "position": [1.0, 2.0] }"#).unwrap();
        assert_eq!(snap.template_key, "rock");
        assert_eq!(snap.position, Vec2::new(1.0, 2.0));
        assert!(snap.components.is_empty());
    }

    #[test]
    fn world_snapshot_is_a_plain_array() {
        let world = WorldSnapshot {
            objects: vec![ObjectSnapshot::new("a", Vec2::ZERO)],
        };
        let json = serde_json::to_value(&world).unwrap();
        assert!(json.is_array());
        assert_eq!(world.len(), 1);
    }
}
