//! Various configuration details associated with the updateapp instance.

use std::time::Duration;

use config::{File, FileFormat};
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::base::{MAIN_ABILITY_NAME, PACKAGE_NAME};

pub const DEFAULT_CONFIG: &str = r#"
    package_name = "com.ohos.updateapp"
    main_ability_name = "com.ohos.updateapp.MainAbility"
    sub_type = 1

    # Bound on every query sent to the update service
    call_timeout_ms = 30000

    # Identical statuses seen within this window are duplicates
    status_alive_time_ms = 1000

    start_ability_delay_ms = 500
    foreground_prepare_ms = 1500
    service_terminate_delay_ms = 2000
    page_switch_delay_ms = 100

    # "attach" keeps the callback's error next to successful data,
    # "on_failure_only" reports it only when the call failed
    description_error_policy = "attach"

    [toast]
    duration_ms = 2000
    bottom = "120vp"

    [simulator]
    new_version = "OpenHarmony 5.0.1.100"
    download_step_ms = 300
    install_step_ms = 500
    duplicate_events = true
"#;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// How `get_current_version_description` reports the callback's error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionErrorPolicy {
    /// Always attach the error codes passed to the callback, even on success
    Attach,
    /// Attach them only when the call is reported as failed
    OnFailureOnly,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ToastConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "duration_ms")]
    pub duration: Duration,
    pub bottom: String,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self { duration: Duration::from_millis(2000), bottom: "120vp".to_owned() }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SimulatorConfig {
    pub new_version: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "download_step_ms")]
    pub download_step: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "install_step_ms")]
    pub install_step: Duration,
    /// Deliver every event twice, the way the service does under load
    pub duplicate_events: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            new_version: "OpenHarmony 5.0.1.100".to_owned(),
            download_step: Duration::from_millis(300),
            install_step: Duration::from_millis(500),
            duplicate_events: true,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub package_name: String,
    pub main_ability_name: String,
    pub sub_type: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "call_timeout_ms")]
    pub call_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "status_alive_time_ms")]
    pub status_alive_time: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "start_ability_delay_ms")]
    pub start_ability_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "foreground_prepare_ms")]
    pub foreground_prepare: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "service_terminate_delay_ms")]
    pub service_terminate_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "page_switch_delay_ms")]
    pub page_switch_delay: Duration,
    pub description_error_policy: DescriptionErrorPolicy,
    #[serde(default)]
    pub toast: ToastConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package_name: PACKAGE_NAME.to_owned(),
            main_ability_name: MAIN_ABILITY_NAME.to_owned(),
            sub_type: 1,
            call_timeout: Duration::from_millis(30000),
            status_alive_time: Duration::from_millis(1000),
            start_ability_delay: Duration::from_millis(500),
            foreground_prepare: Duration::from_millis(1500),
            service_terminate_delay: Duration::from_millis(2000),
            page_switch_delay: Duration::from_millis(100),
            description_error_policy: DescriptionErrorPolicy::Attach,
            toast: ToastConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Reads the default config and merges the optional config file over it
pub fn get_config(path: Option<&str>) -> Result<Config, Error> {
    let mut builder =
        config::Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    if let Some(path) = path {
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    }

    let config = builder.build()?.try_deserialize()?;
    Ok(config)
}
