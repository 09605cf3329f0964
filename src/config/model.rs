// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::reload::ReloadScope;
use crate::watch::patterns::ChangeKind;

/// Top-level configuration as read from a `Pipewatch.toml` file:
///
/// ```toml
/// [settings]
/// settle_delay_ms = 300
/// default_target = "build"
///
/// [task.css]
/// cmd = "sass _dev/assets/sass:_dev/assets/css"
///
/// [task.js]
/// cmd = "esbuild --bundle _dev/assets/javascript/app.js --outdir=_build"
///
/// [parallel.assets]
/// steps = ["css", "js"]
///
/// [series.build]
/// steps = ["assets"]
///
/// [watch.styles]
/// pattern = "_dev/assets/sass/**/*.scss"
/// target = "css"
/// reload = "style"
///
/// [serve]
/// dir = "_build"
/// ```
///
/// All sections except `[task]` are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Global defaults from `[settings]`.
    #[serde(default)]
    pub settings: Settings,

    /// Leaf tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Series composites from `[series.<name>]`.
    #[serde(default)]
    pub series: BTreeMap<String, GroupConfig>,

    /// Parallel composites from `[parallel.<name>]`.
    #[serde(default)]
    pub parallel: BTreeMap<String, GroupConfig>,

    /// Watch rules from `[watch.<name>]`.
    #[serde(default)]
    pub watch: BTreeMap<String, WatchConfig>,

    /// Optional static file server for watch mode.
    #[serde(default)]
    pub serve: Option<ServeConfig>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Settle delay applied to watch rules that do not set their own.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Node run by `pipewatch run` when no name is given.
    #[serde(default)]
    pub default_target: Option<String>,

    /// Port the reload WebSocket listens on in watch mode. Falls back to an
    /// ephemeral port when taken.
    #[serde(default = "default_reload_port")]
    pub reload_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            default_target: None,
            reload_port: default_reload_port(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_reload_port() -> u16 {
    35729
}

/// `[task.<name>]`: a leaf task bound to a shell command.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute.
    pub cmd: String,
}

/// `[series.<name>]` / `[parallel.<name>]`: ordered child node names.
///
/// Children may be tasks or other composites; the same child can appear in
/// several groups.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub steps: Vec<String>,
}

/// `[watch.<name>]`: a filesystem trigger bound to a target node.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Glob matched against paths relative to the watch root.
    pub pattern: String,

    /// Globs that suppress a match.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Which event kinds trigger the rule.
    #[serde(default = "default_events")]
    pub events: Vec<ChangeKind>,

    /// Node to run once the rule settles.
    pub target: String,

    /// Per-rule settle delay; falls back to `settings.settle_delay_ms`.
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,

    /// Reload broadcast sent after a successful run.
    #[serde(default)]
    pub reload: ReloadSetting,
}

fn default_events() -> Vec<ChangeKind> {
    vec![ChangeKind::Created, ChangeKind::Changed, ChangeKind::Deleted]
}

/// Per-rule reload behaviour: `"none"`, `"full"` or `"style"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadSetting {
    #[default]
    None,
    Full,
    Style,
}

impl ReloadSetting {
    /// Broadcast scope, if any.
    pub fn scope(self) -> Option<ReloadScope> {
        match self {
            ReloadSetting::None => None,
            ReloadSetting::Full => Some(ReloadScope::Full),
            ReloadSetting::Style => Some(ReloadScope::Style),
        }
    }
}

/// `[serve]`: minimal static file server for watch mode.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// Directory to serve.
    pub dir: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_port() -> u16 {
    8080
}
