//! Department directory lookup

use crate::DepartmentId;
use std::collections::HashMap;

/// Resolves department ids to display names. Presentation only.
pub trait DepartmentDirectory: Send + Sync {
    fn display_name(&self, id: DepartmentId) -> Option<String>;
}

/// Fixed in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    names: HashMap<DepartmentId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: DepartmentId, name: impl Into<String>) -> Self {
        self.names.insert(id, name.into());
        self
    }
}

impl FromIterator<(DepartmentId, String)> for StaticDirectory {
    fn from_iter<T: IntoIterator<Item = (DepartmentId, String)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl DepartmentDirectory for StaticDirectory {
    fn display_name(&self, id: DepartmentId) -> Option<String> {
        self.names.get(&id).cloned()
    }
}
