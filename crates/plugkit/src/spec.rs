//! Plugin declarations and how they merge into session entries

use crate::error::{Error, Result};
use crate::hooks::{Hook, HookKind, Hooks};
use crate::session::SessionEntry;

/// A (possibly partial) plugin declaration.
///
/// Every field is optional so that re-declaring a plugin only touches the
/// fields it names. At least one of `name` and `source` must be present.
#[derive(Debug, Clone, Default)]
pub struct PluginSpec {
    /// Directory name of the plugin (derived from `source` when absent)
    pub name: Option<String>,
    /// Git URL or `owner/repo` GitHub shorthand
    pub source: Option<String>,
    /// Branch, tag or revision to check out
    pub checkout: Option<String>,
    /// Branch whose new commits are reported but not checked out
    pub monitor: Option<String>,
    /// Plugins that must be registered before this one
    pub depends: Vec<PluginSpec>,
    pub hooks: Hooks,
}

impl PluginSpec {
    /// A spec identified by source.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// A spec identified by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_checkout(mut self, checkout: impl Into<String>) -> Self {
        self.checkout = Some(checkout.into());
        self
    }

    pub fn with_monitor(mut self, monitor: impl Into<String>) -> Self {
        self.monitor = Some(monitor.into());
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<PluginSpec>) -> Self {
        self.depends.push(dependency.into());
        self
    }

    pub fn with_hook(mut self, kind: HookKind, hook: Hook) -> Self {
        self.hooks.set(kind, hook);
        self
    }

    /// Source with GitHub shorthand expanded.
    pub fn resolved_source(&self) -> Option<String> {
        self.source.as_deref().map(expand_source)
    }

    /// Explicit name, or the one derived from the source.
    pub fn resolved_name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        self.source
            .as_deref()
            .and_then(name_from_source)
            .ok_or_else(|| Error::invalid_spec("name", "is missing and cannot be derived from `source`"))
    }

    /// Validate this spec and all nested dependencies.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_none() && self.source.is_none() {
            return Err(Error::invalid_spec(
                "source",
                "or `name` must be present",
            ));
        }

        if let Some(source) = &self.source
            && source.trim().is_empty()
        {
            return Err(Error::invalid_spec("source", "must be a non-empty string"));
        }

        let name = self.resolved_name()?;
        validate_name(&name)?;

        if let Some(checkout) = &self.checkout
            && checkout.trim().is_empty()
        {
            return Err(Error::invalid_spec("checkout", "must be a non-empty string"));
        }

        if let Some(monitor) = &self.monitor
            && monitor.trim().is_empty()
        {
            return Err(Error::invalid_spec("monitor", "must be a non-empty string"));
        }

        for dependency in &self.depends {
            dependency.validate()?;
        }

        Ok(())
    }
}

impl From<&str> for PluginSpec {
    /// A bare string is a source when it looks like one (`/` or `:`),
    /// otherwise a name.
    fn from(value: &str) -> Self {
        if value.contains('/') || value.contains(':') {
            PluginSpec::from_source(value)
        } else {
            PluginSpec::named(value)
        }
    }
}

impl From<String> for PluginSpec {
    fn from(value: String) -> Self {
        PluginSpec::from(value.as_str())
    }
}

/// Reject empty names and names containing path separators.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_spec("name", "must be a non-empty string"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::invalid_spec(
            "name",
            format!("must not contain path separators: {name:?}"),
        ));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid_spec("name", format!("is not a valid directory name: {name:?}")));
    }
    Ok(())
}

/// Expand `owner/repo` GitHub shorthand into a full URL.
pub fn expand_source(source: &str) -> String {
    if is_github_shorthand(source) {
        format!("https://github.com/{source}")
    } else {
        source.to_string()
    }
}

fn is_github_shorthand(source: &str) -> bool {
    let Some((owner, repo)) = source.split_once('/') else {
        return false;
    };
    shorthand_part(owner) && shorthand_part(repo)
}

/// Letters, digits, `-`, `_` and `.`, but not a relative path component.
fn shorthand_part(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Derive a plugin name from its source: last path component, no `.git`.
pub fn name_from_source(source: &str) -> Option<String> {
    let trimmed = source.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Merge a declaration into an existing session entry.
///
/// Fields present in `spec` overwrite the entry; omitted fields are kept.
/// `depends` is the union of both lists: existing order first, then names not
/// seen before.
pub fn merge(existing: &mut SessionEntry, spec: &PluginSpec, dependency_names: &[String]) {
    if let Some(source) = spec.resolved_source() {
        existing.source = Some(source);
    }
    if let Some(checkout) = &spec.checkout {
        existing.checkout = Some(checkout.clone());
    }
    if let Some(monitor) = &spec.monitor {
        existing.monitor = Some(monitor.clone());
    }
    for name in dependency_names {
        if !existing.depends.contains(name) {
            existing.depends.push(name.clone());
        }
    }
    existing.hooks.merge(&spec.hooks);
}
