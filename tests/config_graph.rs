use std::error::Error;
use std::time::Duration;

use pipewatch::config::model::ConfigFile;
use pipewatch::config::validate::validate_config;
use pipewatch::graph::TaskGraph;
use pipewatch::reload::ReloadScope;
use pipewatch::watch::patterns::{ChangeKind, compile_rules};

type TestResult = Result<(), Box<dyn Error>>;

const FULL_CONFIG: &str = r#"
[settings]
settle_delay_ms = 250
default_target = "build"

[task.clean]
cmd = "rm -rf _build"

[task.css]
cmd = "sass _dev/assets/sass:_dev/assets/css"

[task.js]
cmd = "esbuild --bundle _dev/assets/javascript/app.js --outdir=_build"

[parallel.assets]
steps = ["css", "js"]

[series.build]
steps = ["clean", "assets"]

[watch.markup]
pattern = "_dev/**/*.html"
target = "build"
reload = "full"

[watch.styles]
pattern = "_dev/assets/sass/**/*.scss"
events = ["created", "changed"]
target = "css"
settle_delay_ms = 300
reload = "style"

[serve]
dir = "_build"
port = 4000
"#;

#[test]
fn full_config_parses_validates_and_compiles() -> TestResult {
    let cfg: ConfigFile = toml::from_str(FULL_CONFIG)?;
    validate_config(&cfg)?;

    let graph = TaskGraph::from_config(&cfg)?;
    assert_eq!(graph.len(), 5);
    assert!(graph.resolve("build").is_ok());

    let rules = compile_rules(&cfg, &graph)?;
    assert_eq!(rules.len(), 2);

    // Rules come out in section order (BTreeMap): markup, styles.
    let markup = &rules[0];
    assert_eq!(markup.target(), "build");
    assert_eq!(markup.settle_delay(), Duration::from_millis(250));
    assert_eq!(markup.reload(), Some(ReloadScope::Full));
    assert!(markup.matches(ChangeKind::Deleted, "_dev/pages/index.html"));

    let styles = &rules[1];
    assert_eq!(styles.settle_delay(), Duration::from_millis(300));
    assert_eq!(styles.reload(), Some(ReloadScope::Style));
    assert!(styles.matches(ChangeKind::Changed, "_dev/assets/sass/main.scss"));
    // Deleted is not in the rule's event filter.
    assert!(!styles.matches(ChangeKind::Deleted, "_dev/assets/sass/main.scss"));
    assert!(!styles.matches(ChangeKind::Changed, "_dev/assets/css/main.css"));

    let serve = cfg.serve.expect("serve section");
    assert_eq!(serve.dir, "_build");
    assert_eq!(serve.port, 4000);

    Ok(())
}

#[test]
fn minimal_config_gets_defaults() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [task.css]
        cmd = "true"

        [watch.styles]
        pattern = "*.scss"
        target = "css"
        "#,
    )?;
    validate_config(&cfg)?;

    assert_eq!(cfg.settings.settle_delay_ms, 300);
    assert_eq!(cfg.settings.reload_port, 35729);
    assert!(cfg.settings.default_target.is_none());

    let graph = TaskGraph::from_config(&cfg)?;
    let rules = compile_rules(&cfg, &graph)?;
    let rule = &rules[0];

    assert_eq!(rule.settle_delay(), Duration::from_millis(300));
    assert_eq!(rule.reload(), None);
    // Default event filter covers all three kinds.
    for kind in [ChangeKind::Created, ChangeKind::Changed, ChangeKind::Deleted] {
        assert!(rule.matches(kind, "main.scss"));
    }

    Ok(())
}

#[test]
fn unknown_step_fails_validation() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [task.css]
        cmd = "true"

        [series.build]
        steps = ["css", "missing"]
        "#,
    )?;

    let err = validate_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("unknown node"), "got: {err:#}");

    Ok(())
}

#[test]
fn composite_cycle_fails_validation() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [task.css]
        cmd = "true"

        [series.a]
        steps = ["b"]

        [series.b]
        steps = ["a"]
        "#,
    )?;

    let err = validate_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("cycle"), "got: {err:#}");

    Ok(())
}

#[test]
fn unknown_watch_target_fails_validation() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [task.css]
        cmd = "true"

        [watch.styles]
        pattern = "*.scss"
        target = "nope"
        "#,
    )?;

    let err = validate_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("no node named"), "got: {err:#}");

    Ok(())
}

#[test]
fn empty_event_filter_fails_validation() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [task.css]
        cmd = "true"

        [watch.styles]
        pattern = "*.scss"
        events = []
        target = "css"
        "#,
    )?;

    let err = validate_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("empty event filter"), "got: {err:#}");

    Ok(())
}

#[test]
fn unknown_default_target_fails_validation() -> TestResult {
    let cfg: ConfigFile = toml::from_str(
        r#"
        [settings]
        default_target = "ghost"

        [task.css]
        cmd = "true"
        "#,
    )?;

    let err = validate_config(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("ghost"), "got: {err:#}");

    Ok(())
}
