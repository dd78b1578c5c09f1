use super::*;
use std::ffi::OsString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

static ENV_LOCK: Mutex<()> = Mutex::new(());
static TEMP_CONFIG_COUNTER: AtomicU64 = AtomicU64::new(0);

#[test]
fn market_data_defaults_match_upstream_limits() {
    let market_data = MarketDataConfig::default();
    assert!((market_data.rate_limit_per_second - 4.7).abs() <= f64::EPSILON);
    assert!((market_data.rate_limit_burst - 5.0).abs() <= f64::EPSILON);
    assert_eq!(market_data.max_attempts, 3);
    assert_eq!(market_data.retry_base_ms, 1_000);
    assert_eq!(market_data.retry_after_cap_ms, 60_000);
    assert_eq!(market_data.limiter_wait_timeout_ms, 15_000);
    assert_eq!(market_data.cooldown_seconds, 100);
    assert_eq!(market_data.request_timeout_ms, 10_000);
}

#[test]
fn tracker_defaults_are_unbounded() {
    let tracker = TrackerConfig::default();
    assert_eq!(tracker.interval_seconds, 120);
    assert_eq!(tracker.inter_token_delay_ms, 200);
    assert_eq!(tracker.min_milestone_level, 2);
    assert_eq!(tracker.max_tracked_tokens, 0);
    assert_eq!(tracker.max_tracked_age_hours, 0);
}

#[test]
fn partial_toml_keeps_section_defaults() {
    with_temp_config_file(
        "[criteria]\nmin_liquidity_usd = 2500.0\n\n[volume]\nthreshold_usd = 1000.0\n",
        |config_path| {
            let cfg = load_from_path(config_path).expect("parse partial config");
            assert!((cfg.criteria.min_liquidity_usd - 2_500.0).abs() <= f64::EPSILON);
            assert!((cfg.criteria.imbalance_max_ratio - 0.9).abs() <= f64::EPSILON);
            assert!((cfg.volume.threshold_usd - 1_000.0).abs() <= f64::EPSILON);
            assert_eq!(cfg.volume.retention_seconds, 1_800);
            assert_eq!(cfg.signals.trigger_mode, "first_seen");
        },
    );
}

#[test]
fn load_from_env_applies_criteria_and_notifier_overrides() {
    with_temp_config_file("", |config_path| {
        with_clean_mintwatch_env(|| {
            with_env_var("MINTWATCH_CRITERIA_MIN_LIQUIDITY_USD", "1234.5", || {
                with_env_var("MINTWATCH_SIGNALS_TRIGGER_MODE", " Volume ", || {
                    with_env_var("MINTWATCH_NOTIFIER_MODE", "telegram", || {
                        with_env_var("MINTWATCH_TELEGRAM_BOT_TOKEN", "123:abc", || {
                            with_env_var("MINTWATCH_TELEGRAM_CHAT_ID", "-100200", || {
                                let (cfg, _) = load_from_env_or_default(config_path)
                                    .expect("load config with env overrides");
                                assert!(
                                    (cfg.criteria.min_liquidity_usd - 1_234.5).abs()
                                        <= f64::EPSILON
                                );
                                assert_eq!(cfg.signals.trigger_mode, "volume");
                                assert_eq!(cfg.notifier.mode, "telegram");
                                assert_eq!(cfg.notifier.telegram_chat_id, "-100200");
                            });
                        });
                    });
                });
            });
        });
    });
}

#[test]
fn load_from_env_rejects_invalid_numeric_override() {
    with_temp_config_file("", |config_path| {
        with_clean_mintwatch_env(|| {
            with_env_var("MINTWATCH_WEBHOOK_PORT", "not-a-port", || {
                let err = load_from_env_or_default(config_path)
                    .expect_err("invalid port must fail at config load")
                    .to_string();
                assert!(err.contains("MINTWATCH_WEBHOOK_PORT"), "unexpected error: {err}");
                assert!(err.contains("invalid numeric value"), "unexpected error: {err}");
            });
        });
    });
}

#[test]
fn load_rejects_inverted_market_cap_band() {
    with_temp_config_file(
        "[criteria]\nmin_market_cap_usd = 900000.0\nmax_market_cap_usd = 1000.0\n",
        |config_path| {
            with_clean_mintwatch_env(|| {
                let err = load_from_env_or_default(config_path)
                    .expect_err("inverted band must fail")
                    .to_string();
                assert!(
                    err.contains("exceeds criteria.max_market_cap_usd"),
                    "unexpected error: {err}"
                );
            });
        },
    );
}

#[test]
fn load_rejects_telegram_mode_without_credentials() {
    with_temp_config_file("[notifier]\nmode = \"telegram\"\n", |config_path| {
        with_clean_mintwatch_env(|| {
            let err = load_from_env_or_default(config_path)
                .expect_err("telegram without token must fail")
                .to_string();
            assert!(err.contains("telegram_bot_token"), "unexpected error: {err}");
        });
    });
}

#[test]
fn load_rejects_unknown_trigger_mode() {
    with_temp_config_file("[signals]\ntrigger_mode = \"sometimes\"\n", |config_path| {
        with_clean_mintwatch_env(|| {
            let err = load_from_env_or_default(config_path)
                .expect_err("unknown trigger mode must fail")
                .to_string();
            assert!(err.contains("signals.trigger_mode=sometimes"), "unexpected error: {err}");
        });
    });
}

#[test]
fn load_rejects_cooldown_beyond_a_day() {
    with_temp_config_file("", |config_path| {
        with_clean_mintwatch_env(|| {
            with_env_var(
                "MINTWATCH_MARKET_DATA_COOLDOWN_SECONDS",
                "18446744073709551615",
                || {
                    let err = load_from_env_or_default(config_path)
                        .expect_err("huge cooldown must fail")
                        .to_string();
                    assert!(err.contains("cooldown_seconds"), "unexpected error: {err}");
                },
            );
        });
    });
}

#[test]
fn load_rejects_zero_rate_limit() {
    with_temp_config_file("", |config_path| {
        with_clean_mintwatch_env(|| {
            with_env_var("MINTWATCH_MARKET_DATA_RATE_LIMIT_PER_SECOND", "0", || {
                let err = load_from_env_or_default(config_path)
                    .expect_err("zero rate must fail")
                    .to_string();
                assert!(err.contains("rate_limit_per_second"), "unexpected error: {err}");
            });
        });
    });
}

fn with_env_var<T>(key: &'static str, value: &str, run: impl FnOnce() -> T) -> T {
    let previous = std::env::var_os(key);
    std::env::set_var(key, value);
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
    restore_env_var(key, previous);
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn restore_env_var(key: &'static str, previous: Option<OsString>) {
    match previous {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

fn with_clean_mintwatch_env<T>(run: impl FnOnce() -> T) -> T {
    // Serialize all MINTWATCH_* env mutations in this test module.
    let _guard = ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let saved: Vec<(OsString, OsString)> = std::env::vars_os()
        .filter(|(key, _)| key.to_string_lossy().starts_with("MINTWATCH_"))
        .collect();
    for (key, _) in &saved {
        std::env::remove_var(key);
    }
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
    for (key, value) in saved {
        std::env::set_var(key, value);
    }
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn with_temp_config_file<T>(contents: &str, run: impl FnOnce(&Path) -> T) -> T {
    let path = unique_temp_path();
    fs::write(&path, contents).expect("write temp config");
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(&path)));
    let _ = fs::remove_file(&path);
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn unique_temp_path() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    let seq = TEMP_CONFIG_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    std::env::temp_dir().join(format!("mintwatch-config-test-{pid}-{nanos}-{seq}.toml"))
}
