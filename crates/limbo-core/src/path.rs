use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Path to a host node, optionally followed by `:property` sub-names.
///
/// `"Enemy/Weapon:ammo"` names the node `Enemy/Weapon` and the sub-name `ammo`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodePath {
    path: String,
}

impl NodePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Node names, without sub-names. `"."` segments are dropped.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let node_part = self.path.split(':').next().unwrap_or("");
        node_part
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
    }

    pub fn subnames(&self) -> impl Iterator<Item = &str> {
        self.path.split(':').skip(1).filter(|s| !s.is_empty())
    }

    pub fn subname_count(&self) -> usize {
        self.subnames().count()
    }

    /// The node part of the path with sub-names stripped.
    pub fn concatenated_names(&self) -> NodePath {
        NodePath::new(self.path.split(':').next().unwrap_or(""))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        NodePath::new(path)
    }
}

impl From<String> for NodePath {
    fn from(path: String) -> Self {
        NodePath::new(path)
    }
}
