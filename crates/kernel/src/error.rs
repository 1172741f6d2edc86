use std::fmt;
use worldkit_common::ObjectId;

/// Structural errors surfaced synchronously to the caller.
///
/// These are programming errors at composition time and are never routed
/// through the hook failure handlers.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A second component of an already mounted concrete type.
    #[error("component `{name}` is already mounted on this owner")]
    DuplicateComponent { name: &'static str },

    /// The object is not owned by the world that was asked about it.
    #[error("object {0} is not owned by this world")]
    NotOwned(ObjectId),

    /// The id was never admitted here, or has already been purged.
    #[error("object {0} is not in the live table")]
    UnknownObject(ObjectId),

    #[error("no template registered under `{0}`")]
    UnknownTemplate(String),

    /// A component rejected its snapshot payload.
    #[error("component `{name}` failed to load its payload: {reason}")]
    ComponentLoad { name: String, reason: String },
}

/// Which lifecycle hook a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    Add,
    Remove,
    Purge,
    Step,
    Destroy,
}

impl HookKind {
    pub const ALL: [HookKind; 5] = [
        HookKind::Add,
        HookKind::Remove,
        HookKind::Purge,
        HookKind::Step,
        HookKind::Destroy,
    ];
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::Add => "on_add",
            HookKind::Remove => "on_remove",
            HookKind::Purge => "on_purge",
            HookKind::Step => "step",
            HookKind::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Who a hook ran on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// A world-level component.
    World,
    Object(ObjectId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::World => f.write_str("world"),
            Owner::Object(id) => write!(f, "object {id}"),
        }
    }
}

/// A hook returned an error.
///
/// Caught at the kernel's dispatch point and handed to the handler for its
/// [`HookKind`]. Never propagated to the caller of `add`, `remove`, `purge`
/// or `step`, and never retried.
#[derive(Debug)]
pub struct HookFailure {
    pub kind: HookKind,
    pub owner: Owner,
    /// Set when the failing hook belongs to a component rather than a behavior.
    pub component: Option<&'static str>,
    pub error: anyhow::Error,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            Some(name) => write!(
                f,
                "{} hook of component `{}` failed on {}: {:#}",
                self.kind, name, self.owner, self.error
            ),
            None => write!(
                f,
                "{} hook failed on {}: {:#}",
                self.kind, self.owner, self.error
            ),
        }
    }
}

impl std::error::Error for HookFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source: &(dyn std::error::Error + 'static) = self.error.as_ref();
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_failure_display_names_the_component() {
        let failure = HookFailure {
            kind: HookKind::Step,
            owner: Owner::Object(ObjectId(4)),
            component: Some("Health"),
            error: anyhow::anyhow!("negative hit points"),
        };
        assert_eq!(
            failure.to_string(),
            "step hook of component `Health` failed on object #4: negative hit points"
        );
    }

    #[test]
    fn world_error_messages() {
        let err = WorldError::DuplicateComponent { name: "Health" };
        assert!(err.to_string().contains("Health"));
        assert_eq!(
            WorldError::NotOwned(ObjectId(9)).to_string(),
            "object #9 is not owned by this world"
        );
    }
}
