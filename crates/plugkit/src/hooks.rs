//! User hooks around install and checkout

use crate::error::Error;
use crate::session::Session;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// When a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreInstall,
    PostInstall,
    PreCheckout,
    PostCheckout,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::PreInstall => "pre_install",
            HookKind::PostInstall => "post_install",
            HookKind::PreCheckout => "pre_checkout",
            HookKind::PostCheckout => "post_checkout",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook is told about the plugin it runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub name: String,
    pub path: PathBuf,
    pub source: Option<String>,
}

/// A user callable attached to a plugin.
pub type Hook = Arc<dyn Fn(&HookContext) -> anyhow::Result<()> + Send + Sync>;

/// The four optional hooks of a plugin.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_install: Option<Hook>,
    pub post_install: Option<Hook>,
    pub pre_checkout: Option<Hook>,
    pub post_checkout: Option<Hook>,
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> Option<&Hook> {
        match kind {
            HookKind::PreInstall => self.pre_install.as_ref(),
            HookKind::PostInstall => self.post_install.as_ref(),
            HookKind::PreCheckout => self.pre_checkout.as_ref(),
            HookKind::PostCheckout => self.post_checkout.as_ref(),
        }
    }

    pub fn set(&mut self, kind: HookKind, hook: Hook) {
        let slot = match kind {
            HookKind::PreInstall => &mut self.pre_install,
            HookKind::PostInstall => &mut self.post_install,
            HookKind::PreCheckout => &mut self.pre_checkout,
            HookKind::PostCheckout => &mut self.post_checkout,
        };
        *slot = Some(hook);
    }

    /// Overwrite every hook that `other` defines, keep the rest.
    pub fn merge(&mut self, other: &Hooks) {
        for kind in [
            HookKind::PreInstall,
            HookKind::PostInstall,
            HookKind::PreCheckout,
            HookKind::PostCheckout,
        ] {
            if let Some(hook) = other.get(kind) {
                self.set(kind, Arc::clone(hook));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pre_install.is_none()
            && self.post_install.is_none()
            && self.pre_checkout.is_none()
            && self.post_checkout.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_install", &self.pre_install.is_some())
            .field("post_install", &self.post_install.is_some())
            .field("pre_checkout", &self.pre_checkout.is_some())
            .field("post_checkout", &self.post_checkout.is_some())
            .finish()
    }
}

/// Run `kind` hooks for the given session indices, in session order.
///
/// Every hook is attempted; failures are returned with the session index of
/// their plugin, not raised.
pub fn run_in_session_order(
    session: &Session,
    indices: &[usize],
    kind: HookKind,
) -> Vec<(usize, Error)> {
    let mut ordered = indices.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let mut errors = Vec::new();
    for index in ordered {
        let Some(entry) = session.get(index) else {
            continue;
        };
        let Some(hook) = entry.hooks.get(kind) else {
            continue;
        };

        log::debug!("Running {} hook for {}", kind, entry.name);
        let ctx = HookContext {
            name: entry.name.clone(),
            path: entry.path.clone(),
            source: entry.source.clone(),
        };

        if let Err(e) = hook(&ctx) {
            let error = Error::Hook {
                plugin: entry.name.clone(),
                kind,
                message: format!("{e:#}"),
            };
            log::warn!("{error}");
            errors.push((index, error));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Layout;
    use crate::spec::PluginSpec;
    use std::sync::Mutex;

    fn recording_hook(log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Hook {
        let log = Arc::clone(log);
        Arc::new(move |ctx: &HookContext| {
            log.lock().unwrap().push(ctx.name.clone());
            if fail {
                anyhow::bail!("boom");
            }
            Ok(())
        })
    }

    #[test]
    fn test_hooks_merge_keeps_unspecified() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut base = Hooks::default();
        base.set(HookKind::PreInstall, recording_hook(&log, false));

        let mut update = Hooks::default();
        update.set(HookKind::PostCheckout, recording_hook(&log, false));

        base.merge(&update);
        assert!(base.pre_install.is_some());
        assert!(base.post_checkout.is_some());
        assert!(base.post_install.is_none());
    }

    #[test]
    fn test_run_in_session_order_ignores_input_order_and_continues_after_failure() {
        let layout = Layout::new("/tmp/plugkit-hooks");
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut session = Session::new();

        for (name, fail) in [("a", false), ("b", true), ("c", false)] {
            let spec = PluginSpec::named(name)
                .with_hook(HookKind::PostInstall, recording_hook(&log, fail));
            session.add(spec, &layout).unwrap();
        }

        let errors = run_in_session_order(&session, &[2, 0, 1], HookKind::PostInstall);

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 1);
        assert!(errors[0].1.to_string().contains("post_install"));
        assert!(errors[0].1.to_string().contains("boom"));
    }

    #[test]
    fn test_missing_hook_is_skipped() {
        let layout = Layout::new("/tmp/plugkit-hooks");
        let mut session = Session::new();
        session.add(PluginSpec::named("plain"), &layout).unwrap();
        let errors = run_in_session_order(&session, &[0], HookKind::PreCheckout);
        assert!(errors.is_empty());
    }
}
