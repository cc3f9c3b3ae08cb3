//! Session registry and dependency resolution
//!
//! The session is an arena of [`SessionEntry`] values in dependency-first
//! order plus a name index. Dependencies are stored by name and looked up
//! lazily, so cyclic declarations never create cyclic data.

use crate::error::Result;
use crate::hooks::Hooks;
use crate::paths::Layout;
use crate::spec::{self, PluginSpec};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// A plugin as registered in the session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub name: String,
    /// Expanded source URL, if any declaration named one
    pub source: Option<String>,
    /// Install directory
    pub path: PathBuf,
    pub checkout: Option<String>,
    pub monitor: Option<String>,
    /// Names of dependencies, in first-declared order
    pub depends: Vec<String>,
    pub hooks: Hooks,
}

impl SessionEntry {
    fn new(name: String, path: PathBuf) -> Self {
        Self {
            name,
            source: None,
            path,
            checkout: None,
            monitor: None,
            depends: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Whether the install directory exists.
    pub fn is_installed(&self) -> bool {
        self.path.exists()
    }
}

/// Ordered registry of every plugin declared since the last reset.
#[derive(Debug, Default)]
pub struct Session {
    entries: Vec<SessionEntry>,
    by_name: HashMap<String, usize>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SessionEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&SessionEntry> {
        self.position(name).map(|i| &self.entries[i])
    }

    /// Entries in dependency-first order.
    pub fn iter(&self) -> impl Iterator<Item = &SessionEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
    }

    /// Register a declaration and, first, all of its dependencies.
    ///
    /// The whole spec tree is validated before the session is touched.
    /// Returns the indices merged by this call, in merge order.
    pub fn add(&mut self, spec: PluginSpec, layout: &Layout) -> Result<Vec<usize>> {
        spec.validate()?;

        let mut visiting = HashSet::new();
        let mut touched = Vec::new();
        self.resolve(&spec, layout, &mut visiting, &mut touched)?;

        let mut seen = HashSet::new();
        touched.retain(|i| seen.insert(*i));
        Ok(touched)
    }

    fn resolve(
        &mut self,
        spec: &PluginSpec,
        layout: &Layout,
        visiting: &mut HashSet<String>,
        touched: &mut Vec<usize>,
    ) -> Result<String> {
        let name = spec.resolved_name()?;

        if visiting.contains(&name) {
            // Cyclic edge: keep the reference, do not walk it again
            log::warn!("Dependency cycle detected through '{}'", name);
            return Ok(name);
        }
        visiting.insert(name.clone());

        let mut dependency_names = Vec::with_capacity(spec.depends.len());
        for dependency in &spec.depends {
            let dependency_name = self.resolve(dependency, layout, visiting, touched)?;
            dependency_names.push(dependency_name);
        }

        let index = match self.by_name.get(&name) {
            Some(&index) => index,
            None => {
                let path = layout.plugin_path(&name);
                self.entries.push(SessionEntry::new(name.clone(), path));
                let index = self.entries.len() - 1;
                self.by_name.insert(name.clone(), index);
                index
            }
        };
        spec::merge(&mut self.entries[index], spec, &dependency_names);
        touched.push(index);

        visiting.remove(&name);
        Ok(name)
    }
}
