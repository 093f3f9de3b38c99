// tests/config_env.rs
//
// Config lookup order and env overrides. Tests mutate process env/CWD,
// so they run serially.

use ainews::config::{AppConfig, ENV_CONFIG_PATH};
use std::{env, fs};

const OVERRIDES: &[&str] = &[
    ENV_CONFIG_PATH,
    "AINEWS_DB_PATH",
    "AINEWS_SCHEDULER_ENABLED",
    "AINEWS_DAILY_SCRAPE_TIME",
    "AINEWS_TIMEZONE",
    "AINEWS_TRANSLATE",
    "AI_ENABLED",
    "AI_TEST_MODE",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
];

/// Clears the relevant variables and restores them on drop.
struct EnvSnapshot(Vec<(&'static str, Option<String>)>);

impl EnvSnapshot {
    fn take() -> Self {
        let saved = OVERRIDES.iter().map(|k| (*k, env::var(k).ok())).collect();
        for k in OVERRIDES {
            env::remove_var(k);
        }
        Self(saved)
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, v) in &self.0 {
            match v {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
    }
}

const SAMPLE: &str = r#"
[[sources.rss]]
name = "OpenAI Blog"
url = "https://openai.com/blog/rss.xml"
weight = 0.4

[scheduler]
daily_scrape_time = "08:15"
timezone = "Asia/Shanghai"

[database]
path = "from-file.db"

[ai]
enabled = true
api_key = "ENV"
"#;

#[serial_test::serial]
#[test]
fn default_lookup_env_then_file_then_builtin() {
    let _env = EnvSnapshot::take();
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) nothing on disk → built-in defaults
    let cfg = AppConfig::load_default().unwrap();
    assert!(cfg.sources.rss.is_empty());
    assert_eq!(cfg.scheduler.daily_scrape_time, "09:00");

    // 2) ./config/ainews.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/ainews.toml"), SAMPLE).unwrap();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.sources.rss.len(), 1);
    assert_eq!(cfg.database.path, "from-file.db");
    // enabled but no key → generation switched off
    assert!(!cfg.ai.enabled);

    // 3) env path wins
    let other = tmp.path().join("other.toml");
    fs::write(&other, "[scheduler]\ntimezone = \"Europe/Prague\"\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, other.display().to_string());
    let cfg = AppConfig::load_default().unwrap();
    assert!(cfg.sources.rss.is_empty());
    assert_eq!(cfg.scheduler.timezone, "Europe/Prague");

    // 4) env path must exist
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(AppConfig::load_default().is_err());

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_file() {
    let _env = EnvSnapshot::take();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("ainews.toml");
    fs::write(&p, SAMPLE).unwrap();

    env::set_var("AINEWS_DB_PATH", "/tmp/override.db");
    env::set_var("AINEWS_SCHEDULER_ENABLED", "false");
    env::set_var("AINEWS_DAILY_SCRAPE_TIME", "21:45");
    env::set_var("AINEWS_TIMEZONE", "America/New_York");
    env::set_var("AINEWS_TRANSLATE", "0");
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("OPENAI_MODEL", "gpt-4.1-mini");

    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(cfg.database.path, "/tmp/override.db");
    assert!(!cfg.scheduler.enabled);
    assert_eq!(cfg.scheduler.daily_scrape_time, "21:45");
    assert_eq!(cfg.scheduler.tz().unwrap(), chrono_tz::America::New_York);
    assert!(!cfg.processing.summarization.translate_to_chinese);
    assert!(cfg.ai.enabled);
    assert_eq!(cfg.ai.api_key, "sk-test");
    assert_eq!(cfg.ai.model, "gpt-4.1-mini");
}

#[serial_test::serial]
#[test]
fn invalid_override_fails_validation() {
    let _env = EnvSnapshot::take();
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("ainews.toml");
    fs::write(&p, SAMPLE).unwrap();

    env::set_var("AINEWS_TIMEZONE", "Atlantis/Capital");
    assert!(AppConfig::load_from(&p).is_err());
}
