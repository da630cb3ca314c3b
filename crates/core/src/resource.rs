//! Resource sets and the resource registry.
//!
//! A resource is an exclusive-access token (movement, logic, animation...)
//! represented by one bit in a fixed-width mask. Indices are handed out by a
//! [`ResourceRegistry`] owned by whoever sets up the scheduler, never by
//! hidden global state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error};

/// Upper bound on the number of distinct resource kinds.
pub const MAX_RESOURCES: usize = 16;

type FlagContainer = u16;

/// Index of a resource kind inside a [`ResourceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(u8);

impl ResourceId {
    /// Create an id, returning `None` if it does not fit in a set.
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < MAX_RESOURCES).then_some(Self(index))
    }

    /// Bit index of this resource.
    pub fn index(self) -> u8 {
        self.0
    }

    fn bit(self) -> FlagContainer {
        1 << self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Value-type set of resource ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceSet {
    flags: FlagContainer,
}

impl ResourceSet {
    /// The empty set.
    pub const EMPTY: Self = Self { flags: 0 };

    /// Create an empty set.
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a set from raw bits.
    pub const fn from_bits(flags: u16) -> Self {
        Self { flags }
    }

    /// Build a set containing the given ids.
    pub fn from_ids(ids: &[ResourceId]) -> Self {
        ids.iter().fold(Self::EMPTY, |set, id| set.with_id(*id))
    }

    /// Raw bits.
    pub const fn bits(self) -> u16 {
        self.flags
    }

    /// Add one id.
    pub fn add_id(&mut self, id: ResourceId) -> &mut Self {
        self.flags |= id.bit();
        self
    }

    /// Remove one id.
    pub fn remove_id(&mut self, id: ResourceId) -> &mut Self {
        self.flags &= !id.bit();
        self
    }

    /// Copy of this set with `id` added.
    pub fn with_id(mut self, id: ResourceId) -> Self {
        self.add_id(id);
        self
    }

    /// Add every id of `other`.
    pub fn add_set(&mut self, other: ResourceSet) -> &mut Self {
        self.flags |= other.flags;
        self
    }

    /// Remove every id of `other`.
    pub fn remove_set(&mut self, other: ResourceSet) -> &mut Self {
        self.flags &= !other.flags;
        self
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.flags = 0;
    }

    /// Whether `id` is in the set.
    pub fn has_id(self, id: ResourceId) -> bool {
        self.flags & id.bit() != 0
    }

    /// True iff every id of `other` is in this set.
    pub fn has_all_ids(self, other: ResourceSet) -> bool {
        self.flags & other.flags == other.flags
    }

    /// True iff the sets share at least one id.
    pub fn has_any_id(self, other: ResourceSet) -> bool {
        self.flags & other.flags != 0
    }

    /// Ids present in both sets.
    pub fn overlap(self, other: ResourceSet) -> ResourceSet {
        Self::from_bits(self.flags & other.flags)
    }

    /// Ids present in either set.
    pub fn union(self, other: ResourceSet) -> ResourceSet {
        Self::from_bits(self.flags | other.flags)
    }

    /// Ids of this set that are not in `other`.
    pub fn difference(self, other: ResourceSet) -> ResourceSet {
        Self::from_bits(self.flags & !other.flags)
    }

    /// Whether the set is empty.
    pub fn is_empty(self) -> bool {
        self.flags == 0
    }

    /// Number of ids in the set.
    pub fn len(self) -> usize {
        self.flags.count_ones() as usize
    }

    /// Iterate over the ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ResourceId> {
        (0..MAX_RESOURCES as u8)
            .map(ResourceId)
            .filter(move |id| self.has_id(*id))
    }
}

impl std::fmt::Display for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let ids: Vec<String> = self.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", ids.join(", "))
    }
}

impl FromIterator<ResourceId> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = ResourceId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |set, id| set.with_id(id))
    }
}

/// Errors from resource registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// All indices are taken
    #[error("resource '{name}' cannot be registered: all {MAX_RESOURCES} resource ids are in use")]
    Exhausted {
        /// Name that failed to register
        name: String,
    },

    /// Requested index does not fit in a resource set
    #[error("resource id {index} for '{name}' exceeds the maximum of {MAX_RESOURCES}")]
    OutOfRange {
        /// Name that failed to register
        name: String,
        /// Requested index
        index: u8,
    },

    /// Requested index is already taken by another resource
    #[error("resource id {index} requested by '{name}' is already used by '{existing}'")]
    IdTaken {
        /// Name that failed to register
        name: String,
        /// Requested index
        index: u8,
        /// Resource currently holding the index
        existing: String,
    },

    /// Name lookup failed
    #[error("unknown resource '{0}'")]
    Unknown(String),
}

/// Maps resource names to stable bit indices.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    by_name: HashMap<String, ResourceId>,
    names: [Option<String>; MAX_RESOURCES],
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` under the lowest free index.
    ///
    /// Registering a known name returns its existing id.
    pub fn register(&mut self, name: &str) -> Result<ResourceId, ResourceError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }

        let Some(index) = self.names.iter().position(Option::is_none) else {
            let err = ResourceError::Exhausted { name: name.to_string() };
            error!("{}", err);
            return Err(err);
        };

        Ok(self.insert(name, ResourceId(index as u8)))
    }

    /// Register `name` under a fixed index.
    pub fn register_with_id(&mut self, name: &str, index: u8) -> Result<ResourceId, ResourceError> {
        let Some(id) = ResourceId::new(index) else {
            let err = ResourceError::OutOfRange { name: name.to_string(), index };
            error!("{}", err);
            return Err(err);
        };

        if self.by_name.get(name) == Some(&id) {
            return Ok(id);
        }

        if let Some(existing) = &self.names[index as usize] {
            let err = ResourceError::IdTaken {
                name: name.to_string(),
                index,
                existing: existing.clone(),
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(self.insert(name, id))
    }

    fn insert(&mut self, name: &str, id: ResourceId) -> ResourceId {
        if let Some(previous) = self.by_name.insert(name.to_string(), id) {
            self.names[previous.index() as usize] = None;
        }
        self.names[id.index() as usize] = Some(name.to_string());
        debug!("Registered resource '{}' as {}", name, id);
        id
    }

    /// Look up a resource by name.
    pub fn id(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(name).copied()
    }

    /// Name registered for `id`.
    pub fn name(&self, id: ResourceId) -> Option<&str> {
        self.names[id.index() as usize].as_deref()
    }

    /// Build a set from resource names.
    pub fn set_of(&self, names: &[&str]) -> Result<ResourceSet, ResourceError> {
        names.iter().try_fold(ResourceSet::EMPTY, |set, name| {
            self.id(name)
                .map(|id| set.with_id(id))
                .ok_or_else(|| ResourceError::Unknown(name.to_string()))
        })
    }

    /// Human readable description of a set, using registered names.
    pub fn describe(&self, set: ResourceSet) -> String {
        if set.is_empty() {
            return "None".to_string();
        }
        set.iter()
            .map(|id| match self.name(id) {
                Some(name) => name.to_string(),
                None => id.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
