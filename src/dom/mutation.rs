//! Mutation observation types
//!
//! Mirrors the browser's `MutationObserver` contract closely enough for the
//! recorder: subtree registration, per-type filters and optional old values.

use super::NodeId;
use std::fmt;

/// Handle for a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Which mutations an observer is interested in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Child additions and removals
    pub child_list: bool,

    /// Attribute changes
    pub attributes: bool,

    /// Text node data changes
    pub character_data: bool,

    /// Observe the whole subtree instead of only the root
    pub subtree: bool,

    /// Keep previous attribute values in records
    pub attribute_old_value: bool,

    /// Keep previous text data in records
    pub character_data_old_value: bool,
}

impl ObserveOptions {
    /// Structural changes anywhere below the root
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Default::default()
        }
    }

    /// Everything below the root, with old values
    pub fn all() -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
            attribute_old_value: true,
            character_data_old_value: true,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.child_list && !self.attributes && !self.character_data
    }
}

/// A single queued mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
    CharacterData {
        target: NodeId,
        old_value: Option<String>,
    },
}

impl MutationRecord {
    /// The node the mutation was recorded on
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::Attributes { target, .. }
            | MutationRecord::CharacterData { target, .. } => *target,
        }
    }

    pub(crate) fn wanted_by(&self, options: &ObserveOptions) -> bool {
        match self {
            MutationRecord::ChildList { .. } => options.child_list,
            MutationRecord::Attributes { .. } => options.attributes,
            MutationRecord::CharacterData { .. } => options.character_data,
        }
    }

    pub(crate) fn shaped_for(&self, options: &ObserveOptions) -> Self {
        match self {
            MutationRecord::Attributes { target, name, .. } if !options.attribute_old_value => {
                MutationRecord::Attributes {
                    target: *target,
                    name: name.clone(),
                    old_value: None,
                }
            }
            MutationRecord::CharacterData { target, .. } if !options.character_data_old_value => {
                MutationRecord::CharacterData {
                    target: *target,
                    old_value: None,
                }
            }
            other => other.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Observer {
    pub(crate) id: ObserverId,
    pub(crate) root: NodeId,
    pub(crate) options: ObserveOptions,
    pub(crate) queue: Vec<MutationRecord>,
}
