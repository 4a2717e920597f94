use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use hdas_common::{Anchor, Rule, RuleTable, Rules};
use log::{debug, warn};
use serde::{Deserialize, Deserializer};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hdas/config.toml";

/// How `excluded` names are matched against a path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionMode {
    /// The name must be a whole path component.
    #[default]
    Boundary,
    /// The name may appear anywhere, including inside a longer component.
    Substring,
}

impl From<ExclusionMode> for Anchor {
    fn from(mode: ExclusionMode) -> Self {
        match mode {
            ExclusionMode::Boundary => Anchor::Boundary,
            ExclusionMode::Substring => Anchor::Substring,
        }
    }
}

/// A watched directory. Names without a leading `/` are dot-directories
/// (`cache` and `.cache` are the same); names with one are absolute roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredDir {
    pub path: String,
    /// Overrides `tracking_depth` for this directory.
    pub depth: Option<u32>,
}

impl MonitoredDir {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            depth: None,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// `/etc/` becomes `/etc`; `cache`, `.cache` and `.cache/` become `.cache`.
    pub fn base(&self) -> anyhow::Result<String> {
        let name = self.path.trim_matches('/');
        if self.is_absolute() {
            if name.is_empty() {
                bail!("monitored directory {:?} names the filesystem root", self.path);
            }
            return Ok(format!("/{name}"));
        }
        let name = name.trim_start_matches('.');
        if name.is_empty() {
            bail!("monitored directory {:?} has an empty name", self.path);
        }
        Ok(format!(".{name}"))
    }
}

impl<'de> Deserialize<'de> for MonitoredDir {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Name(String),
            Full { path: String, depth: Option<u32> },
        }

        Ok(match Entry::deserialize(deserializer)? {
            Entry::Name(path) => Self { path, depth: None },
            Entry::Full { path, depth } => Self { path, depth },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Literal path prefixes, reported in full (depth 0).
    #[serde(default = "default_absolute_prefixes")]
    pub absolute_prefixes: Vec<String>,

    #[serde(default = "default_monitored_dirs")]
    pub monitored_dirs: Vec<MonitoredDir>,

    /// Path components kept after a monitored directory; 0 keeps everything.
    #[serde(default = "default_tracking_depth")]
    pub tracking_depth: u32,

    #[serde(default = "default_excluded")]
    pub excluded: Vec<String>,

    #[serde(default)]
    pub exclusion_mode: ExclusionMode,

    /// Command names whose events are dropped by the collector.
    #[serde(default = "default_ignored_processes")]
    pub ignored_processes: Vec<String>,

    /// Read from existing files; package attribution is not done here.
    #[serde(default)]
    pub ignored_packages: Vec<String>,

    /// Read from existing files; there is no attribution database to prune.
    #[serde(default = "default_auto_prune")]
    pub auto_prune: bool,
}

fn default_absolute_prefixes() -> Vec<String> {
    vec!["/etc/".to_string()]
}

fn default_monitored_dirs() -> Vec<MonitoredDir> {
    vec![
        MonitoredDir::new(".cache"),
        MonitoredDir::new(".local"),
        MonitoredDir::new(".config"),
    ]
}

fn default_tracking_depth() -> u32 {
    1
}

fn default_excluded() -> Vec<String> {
    vec!["hdas".to_string()]
}

fn default_ignored_processes() -> Vec<String> {
    [
        "nvim", "vim", "vi", "nano", "emacs", "code", "subl", "hx", "kate", "gedit", "cat", "bat",
        "less", "more", "head", "tail", "ls", "find", "fd", "rg", "grep", "ag", "file", "stat",
        "wc", "du", "tree", "bash", "zsh", "fish",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_auto_prune() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            absolute_prefixes: default_absolute_prefixes(),
            monitored_dirs: default_monitored_dirs(),
            tracking_depth: default_tracking_depth(),
            excluded: default_excluded(),
            exclusion_mode: ExclusionMode::default(),
            ignored_processes: default_ignored_processes(),
            ignored_packages: Vec::new(),
            auto_prune: default_auto_prune(),
        }
    }
}

impl Config {
    /// Reads `path`, falling back to the built-in defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        if !config.ignored_packages.is_empty() {
            warn!(
                "ignored_packages ({} entries) has no effect: events are not attributed to packages",
                config.ignored_packages.len()
            );
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the fixed-capacity tables the eBPF program reads.
    pub fn rules(&self) -> anyhow::Result<Rules> {
        let mut interesting = RuleTable::EMPTY;
        for prefix in &self.absolute_prefixes {
            push(&mut interesting, prefix, Anchor::Prefix)?;
        }
        for dir in &self.monitored_dirs {
            let base = dir.base()?;
            match dir.is_absolute() {
                true => push(&mut interesting, &format!("{base}/"), Anchor::Prefix)?,
                false => push(&mut interesting, &base, Anchor::Boundary)?,
            }
        }

        let anchor = Anchor::from(self.exclusion_mode);
        let mut excluded = RuleTable::EMPTY;
        for name in &self.excluded {
            let name = match self.exclusion_mode {
                ExclusionMode::Boundary => name.trim_matches('/'),
                ExclusionMode::Substring => name.as_str(),
            };
            push(&mut excluded, name, anchor)?;
        }
        Ok(Rules::new(interesting, excluded))
    }
}

fn push(table: &mut RuleTable, pattern: &str, anchor: Anchor) -> anyhow::Result<()> {
    let rule = Rule::new(pattern.as_bytes(), anchor)
        .with_context(|| format!("bad {anchor} rule {pattern:?}"))?;
    table
        .push(rule)
        .with_context(|| format!("cannot add {anchor} rule {pattern:?}"))
}
