use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;

/// `.local` subdirectories that hold per-app directories one level down.
const LOCAL_NESTS: [&str; 3] = ["share", "state", "lib"];

/// A reported path folded down to the directory that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tracked {
    pub path: String,
    /// The monitored directory or absolute prefix that matched.
    pub dir: String,
    pub depth: u32,
}

#[derive(Debug, Clone)]
struct Root {
    /// Expanded base without a trailing `/`.
    base: String,
    label: String,
    depth: u32,
    local: bool,
}

impl Root {
    /// `path` relative to `base`, when `path` is `base` itself or below it.
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(&self.base)?;
        match rest.is_empty() || rest.starts_with('/') {
            true => Some(rest.trim_start_matches('/')),
            false => None,
        }
    }

    fn fold(&self, path: &str, rest: &str) -> Tracked {
        let mut keep = self.depth as usize;
        let parts: Vec<&str> = rest.split('/').filter(|part| !part.is_empty()).collect();
        if self.local && keep > 0 && parts.first().is_some_and(|first| LOCAL_NESTS.contains(first)) {
            keep += 1;
        }
        let path = match keep {
            0 => path.trim_end_matches('/').to_string(),
            _ if parts.is_empty() => self.base.clone(),
            _ => {
                let kept = &parts[..keep.min(parts.len())];
                format!("{}/{}", self.base, kept.join("/"))
            }
        };
        Tracked {
            path,
            dir: self.label.clone(),
            depth: self.depth,
        }
    }
}

/// Maps reported paths onto the directories they belong to.
///
/// Absolute roots are tried first in configuration order, then dot-directories
/// directly under `home`.
#[derive(Debug, Clone)]
pub struct Tracker {
    home: PathBuf,
    absolute: Vec<Root>,
    relative: Vec<Root>,
}

impl Tracker {
    pub fn new(config: &Config, home: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let home = home.into();
        let home_str = home.to_string_lossy().trim_end_matches('/').to_string();

        let mut absolute = Vec::new();
        let mut relative = Vec::new();
        for dir in &config.monitored_dirs {
            let base = dir.base()?;
            let depth = dir.depth.unwrap_or(config.tracking_depth);
            if dir.is_absolute() {
                absolute.push(Root {
                    base,
                    label: dir.path.clone(),
                    depth,
                    local: false,
                });
            } else {
                relative.push(Root {
                    local: base == ".local",
                    base: format!("{home_str}/{base}"),
                    label: dir.path.clone(),
                    depth,
                });
            }
        }
        for prefix in &config.absolute_prefixes {
            let base = prefix.trim_end_matches('/');
            if base.is_empty() || !base.starts_with('/') {
                continue;
            }
            absolute.push(Root {
                base: base.to_string(),
                label: prefix.clone(),
                depth: 0,
                local: false,
            });
        }

        Ok(Self {
            home,
            absolute,
            relative,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Resolves `~`, `~/x` and relative input against the home directory.
    pub fn expand(&self, input: &str) -> String {
        if input.starts_with('/') {
            return input.to_string();
        }
        let joined = match input {
            "~" => self.home.clone(),
            _ => match input.strip_prefix("~/") {
                Some(rest) => self.home.join(rest),
                None => self.home.join(input),
            },
        };
        joined.to_string_lossy().into_owned()
    }

    /// The folded path for `path`, or `None` when no monitored root owns it.
    pub fn track(&self, path: &str) -> Option<Tracked> {
        self.absolute
            .iter()
            .chain(&self.relative)
            .find_map(|root| root.strip(path).map(|rest| root.fold(path, rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitoredDir;

    fn tracker(config: &Config) -> Tracker {
        Tracker::new(config, "/home/alice").unwrap()
    }

    fn tracked(tracker: &Tracker, path: &str) -> Option<String> {
        tracker.track(path).map(|tracked| tracked.path)
    }

    #[test]
    fn default_depth_keeps_the_app_directory() {
        let tracker = tracker(&Config::default());
        let hit = tracker.track("/home/alice/.cache/mozilla/firefox/abc/cache2").unwrap();
        assert_eq!(
            hit,
            Tracked {
                path: "/home/alice/.cache/mozilla".to_string(),
                dir: ".cache".to_string(),
                depth: 1,
            }
        );
        assert_eq!(
            tracked(&tracker, "/home/alice/.config/app.toml").as_deref(),
            Some("/home/alice/.config/app.toml")
        );
        assert_eq!(tracked(&tracker, "/home/alice/.config").as_deref(), Some("/home/alice/.config"));
    }

    #[test]
    fn local_nests_add_a_level() {
        let tracker = tracker(&Config::default());
        assert_eq!(
            tracked(&tracker, "/home/alice/.local/share/Steam/logs/x.txt").as_deref(),
            Some("/home/alice/.local/share/Steam")
        );
        assert_eq!(
            tracked(&tracker, "/home/alice/.local/bin/tool").as_deref(),
            Some("/home/alice/.local/bin")
        );
    }

    #[test]
    fn per_directory_depth_wins() {
        let config = Config {
            monitored_dirs: vec![
                MonitoredDir { path: "cache".to_string(), depth: Some(2) },
                MonitoredDir { path: ".config".to_string(), depth: Some(0) },
            ],
            tracking_depth: 1,
            ..Config::default()
        };
        let tracker = tracker(&config);
        let hit = tracker.track("/home/alice/.cache/mozilla/firefox/abc").unwrap();
        assert_eq!(hit.path, "/home/alice/.cache/mozilla/firefox");
        assert_eq!(hit.dir, "cache");
        assert_eq!(hit.depth, 2);
        assert_eq!(
            tracked(&tracker, "/home/alice/.config/a/b/c.toml").as_deref(),
            Some("/home/alice/.config/a/b/c.toml")
        );
    }

    #[test]
    fn absolute_roots_before_home() {
        let config = Config {
            monitored_dirs: vec![
                MonitoredDir::new(".cache"),
                MonitoredDir { path: "/home/alice/.cache/".to_string(), depth: Some(2) },
            ],
            ..Config::default()
        };
        let tracker = tracker(&config);
        let hit = tracker.track("/home/alice/.cache/a/b/c").unwrap();
        assert_eq!(hit.path, "/home/alice/.cache/a/b");
        assert_eq!(hit.dir, "/home/alice/.cache/");
    }

    #[test]
    fn absolute_prefixes_keep_the_full_path() {
        let tracker = tracker(&Config::default());
        let hit = tracker.track("/etc/pacman.d/mirrorlist").unwrap();
        assert_eq!(hit.path, "/etc/pacman.d/mirrorlist");
        assert_eq!(hit.dir, "/etc/");
        assert_eq!(hit.depth, 0);
        assert_eq!(tracker.track("/etcetera/x"), None);
    }

    #[test]
    fn paths_outside_every_root_are_untracked() {
        let tracker = tracker(&Config::default());
        assert_eq!(tracker.track("/home/alice/.cachefoo/x"), None);
        assert_eq!(tracker.track("/home/bob/.cache/x"), None);
        assert_eq!(tracker.track("/var/lib/x/.cache/y"), None);
        assert_eq!(tracker.track(""), None);
    }

    #[test]
    fn expands_home_relative_input() {
        let tracker = tracker(&Config::default());
        assert_eq!(tracker.expand("/etc/hosts"), "/etc/hosts");
        assert_eq!(tracker.expand("~"), "/home/alice");
        assert_eq!(tracker.expand("~/.cache/x"), "/home/alice/.cache/x");
        assert_eq!(tracker.expand(".config/y"), "/home/alice/.config/y");
        assert_eq!(tracker.home(), Path::new("/home/alice"));
    }

    #[test]
    fn trailing_slash_on_home_is_ignored() {
        let tracker = Tracker::new(&Config::default(), "/root/").unwrap();
        assert_eq!(tracked(&tracker, "/root/.cache/pip/http").as_deref(), Some("/root/.cache/pip"));
    }

    #[test]
    fn empty_directory_names_fail() {
        let config = Config {
            monitored_dirs: vec![MonitoredDir::new("/")],
            ..Config::default()
        };
        assert!(Tracker::new(&config, "/home/alice").is_err());
    }
}
