//! `plugins.toml`: settings and plugin declarations
//!
//! ```toml
//! [settings.path]
//! package = "~/.local/share/nvim/site"
//!
//! [[plugin]]
//! source = "nvim-telescope/telescope.nvim"
//! checkout = "0.1.8"
//! depends = ["nvim-lua/plenary.nvim"]
//! hooks.post_install = "make"
//! ```

use anyhow::{Context, Result, bail};
use plugkit::{
    CommandRunner, ConfigOverride, Hook, HookContext, HookKind, Job, PluginSpec, ProcessRunner,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Build steps such as `make` outlive the git timeout.
const HOOK_TIMEOUT: Duration = Duration::from_secs(600);

/// Default location of the declarations file.
pub fn default_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("plugman").join("plugins.toml"))
}

/// Expand a leading `~`.
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsFile {
    pub settings: ConfigOverride,
    pub plugin: Vec<PluginDecl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginDecl {
    pub name: Option<String>,
    pub source: Option<String>,
    pub checkout: Option<String>,
    pub monitor: Option<String>,
    pub depends: Vec<DependencyDecl>,
    pub hooks: HookDecls,
}

/// A dependency is a bare name/source or a full inline declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
    Short(String),
    Full(PluginDecl),
}

/// Shell commands run in the plugin directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookDecls {
    pub pre_install: Option<String>,
    pub post_install: Option<String>,
    pub pre_checkout: Option<String>,
    pub post_checkout: Option<String>,
}

impl PluginsFile {
    /// Load `path`, or the default file when `None`.
    ///
    /// A missing default file is an empty declaration set; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (expand(p), true),
            None => (default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                bail!("Plugin file not found: {}", path.display());
            }
            log::info!("No plugin file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid plugin file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut file: Self = toml::from_str(content)?;
        file.expand_paths();
        Ok(file)
    }

    fn expand_paths(&mut self) {
        let path = &mut self.settings.path;
        for field in [
            &mut path.package,
            &mut path.snapshot,
            &mut path.log,
            &mut path.trash,
        ] {
            if let Some(p) = field.as_mut() {
                *p = expand(p);
            }
        }
    }

    /// Declarations converted to specs, in file order.
    pub fn specs(&self) -> Vec<PluginSpec> {
        self.plugin.iter().map(PluginDecl::to_spec).collect()
    }
}

impl PluginDecl {
    pub fn to_spec(&self) -> PluginSpec {
        let mut spec = PluginSpec {
            name: self.name.clone(),
            source: self.source.as_deref().map(expand_source),
            checkout: self.checkout.clone(),
            monitor: self.monitor.clone(),
            ..Default::default()
        };
        for dep in &self.depends {
            spec = spec.with_dependency(match dep {
                DependencyDecl::Short(s) => PluginSpec::from(expand_source(s)),
                DependencyDecl::Full(decl) => decl.to_spec(),
            });
        }
        for (kind, command) in self.hooks.iter() {
            spec = spec.with_hook(kind, shell_hook(command, Arc::new(ProcessRunner)));
        }
        spec
    }
}

impl HookDecls {
    fn iter(&self) -> impl Iterator<Item = (HookKind, &str)> {
        [
            (HookKind::PreInstall, &self.pre_install),
            (HookKind::PostInstall, &self.post_install),
            (HookKind::PreCheckout, &self.pre_checkout),
            (HookKind::PostCheckout, &self.post_checkout),
        ]
        .into_iter()
        .filter_map(|(kind, cmd)| cmd.as_deref().map(|c| (kind, c)))
    }
}

/// Local sources may use `~`; URLs and shorthands pass through.
fn expand_source(source: &str) -> String {
    if source.starts_with('~') {
        shellexpand::tilde(source).into_owned()
    } else {
        source.to_string()
    }
}

fn shell_job(command: &str) -> Job {
    if cfg!(windows) {
        Job::new("cmd", ["/C", command])
    } else {
        Job::new("sh", ["-c", command])
    }
}

/// A hook that runs `command` through the shell in the plugin directory.
pub fn shell_hook(command: &str, runner: Arc<dyn CommandRunner>) -> Hook {
    let command = command.to_string();
    Arc::new(move |ctx: &HookContext| {
        let job = shell_job(&command)
            .with_cwd(&ctx.path)
            .with_timeout(HOOK_TIMEOUT);
        let result = runner.run(&job);
        if result.exit_code != 0 {
            bail!(
                "`{command}` exited with {}: {}",
                result.exit_code,
                result.stderr.trim()
            );
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let file = PluginsFile::parse(
            r#"
            [settings]
            silent = true

            [settings.job]
            n_threads = 4

            [settings.path]
            package = "/tmp/site"

            [[plugin]]
            source = "nvim-telescope/telescope.nvim"
            checkout = "0.1.8"
            depends = ["nvim-lua/plenary.nvim", { source = "a/b", checkout = "v1" }]

            [plugin.hooks]
            post_install = "make"

            [[plugin]]
            name = "local"
            monitor = "main"
            "#,
        )
        .unwrap();

        assert_eq!(file.settings.silent, Some(true));
        assert_eq!(file.settings.job.n_threads, Some(4));
        assert_eq!(file.settings.path.package, Some(PathBuf::from("/tmp/site")));

        let specs = file.specs();
        assert_eq!(specs.len(), 2);
        let telescope = &specs[0];
        assert_eq!(telescope.checkout.as_deref(), Some("0.1.8"));
        assert_eq!(telescope.depends.len(), 2);
        assert_eq!(
            telescope.depends[0].source.as_deref(),
            Some("nvim-lua/plenary.nvim")
        );
        assert_eq!(telescope.depends[1].checkout.as_deref(), Some("v1"));
        assert!(telescope.hooks.get(HookKind::PostInstall).is_some());
        assert!(telescope.hooks.get(HookKind::PreCheckout).is_none());

        assert_eq!(specs[1].name.as_deref(), Some("local"));
        assert_eq!(specs[1].monitor.as_deref(), Some("main"));
    }

    #[test]
    fn test_bare_dependency_name() {
        let file = PluginsFile::parse(
            r#"
            [[plugin]]
            source = "a/b"
            depends = ["plenary"]
            "#,
        )
        .unwrap();
        let dep = &file.specs()[0].depends[0];
        assert_eq!(dep.name.as_deref(), Some("plenary"));
        assert!(dep.source.is_none());
    }

    #[test]
    fn test_tilde_expansion() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let file = PluginsFile::parse(
            r#"
            [settings.path]
            snapshot = "~/snap.toml"

            [[plugin]]
            source = "~/dev/local.nvim"
            "#,
        )
        .unwrap();
        assert_eq!(file.settings.path.snapshot, Some(home.join("snap.toml")));
        assert_eq!(
            file.specs()[0].source,
            Some(home.join("dev/local.nvim").display().to_string())
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(PluginsFile::parse("[[plugin]]\nsorce = \"a/b\"\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginsFile::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.toml");
        fs::write(&path, "[[plugin]]\nsource = \"a/b\"\n").unwrap();
        let file = PluginsFile::load(Some(path.as_path())).unwrap();
        assert_eq!(file.plugin.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_hook_runs_in_plugin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let hook = shell_hook("echo built > marker", Arc::new(ProcessRunner));
        let ctx = HookContext {
            name: "p".to_string(),
            path: dir.path().to_path_buf(),
            source: None,
        };
        hook(&ctx).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("marker")).unwrap(),
            "built\n"
        );

        let failing = shell_hook("echo nope >&2; exit 3", Arc::new(ProcessRunner));
        let err = failing(&ctx).unwrap_err().to_string();
        assert!(err.contains("exited with 3"), "{err}");
        assert!(err.contains("nope"), "{err}");
    }
}
