use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod context;
pub mod platform;
pub mod updater;

pub use context::{AppContext, StartOptions, Want};
pub use platform::{Dialog, DialogKind, NetBearType, NotificationRequest, Platform, PlatformError, RetryAction, Toast};
pub use updater::{EventId, EventInfo, TaskInfo, Updater, UpdateService};

/// Bundle name of the update application
pub const PACKAGE_NAME: &str = "com.ohos.updateapp";

/// Main ability of the update application
pub const MAIN_ABILITY_NAME: &str = "com.ohos.updateapp.MainAbility";

/// Service extension started by the update service
pub const SERVICE_ABILITY_NAME: &str = "com.ohos.updateapp.ServiceExtAbility";

/// Upgrade states, as reported by the update service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    Init,
    CheckSuccess,
    Downloading,
    DownloadPause,
    DownloadCancel,
    DownloadFailed,
    DownloadSuccess,
    Installing,
    InstallFailed,
    InstallSuccess,
    Upgrading,
    UpgradeFailed,
    UpgradeSuccess,
}

impl UpdateState {
    pub fn from_code(code: i32) -> Option<Self> {
        let state = match code {
            0 => Self::Init,
            12 => Self::CheckSuccess,
            20 => Self::Downloading,
            21 => Self::DownloadPause,
            22 => Self::DownloadCancel,
            23 => Self::DownloadFailed,
            24 => Self::DownloadSuccess,
            80 => Self::Installing,
            81 => Self::InstallFailed,
            82 => Self::InstallSuccess,
            90 => Self::Upgrading,
            91 => Self::UpgradeFailed,
            92 => Self::UpgradeSuccess,
            _ => return None,
        };

        Some(state)
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Init => 0,
            Self::CheckSuccess => 12,
            Self::Downloading => 20,
            Self::DownloadPause => 21,
            Self::DownloadCancel => 22,
            Self::DownloadFailed => 23,
            Self::DownloadSuccess => 24,
            Self::Installing => 80,
            Self::InstallFailed => 81,
            Self::InstallSuccess => 82,
            Self::Upgrading => 90,
            Self::UpgradeFailed => 91,
            Self::UpgradeSuccess => 92,
        }
    }

    /// States whose progress percentage carries meaning
    pub fn is_progress_bearing(self) -> bool {
        matches!(self, Self::Downloading | Self::Installing)
    }

    /// No task is running in the update service
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Downloading | Self::Installing | Self::Upgrading)
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Snapshot of upgrade progress at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaStatus {
    pub status: Option<UpdateState>,
    pub percent: u8,
    pub end_reason: Option<String>,
}

impl OtaStatus {
    pub fn new(status: UpdateState, percent: u8) -> Self {
        Self { status: Some(status), percent, end_reason: None }
    }

    pub fn with_end_reason<S: Into<String>>(mut self, end_reason: S) -> Self {
        self.end_reason = Some(end_reason.into());
        self
    }

    /// Error code carried in `end_reason`, if it parses as one
    pub fn error_code(&self) -> Option<ErrorCode> {
        let code = self.end_reason.as_deref()?.trim().parse::<i64>().ok()?;
        ErrorCode::from_code(code)
    }
}

/// Failure reasons reported by the update service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DefaultError,
    CheckNetworkErr,
    CheckSystemBusy,
    AuthFail,
    AuthServerError,
    AuthSystemError,
    NetworkError,
    NoEnoughMemory,
    VerifyPackageFail,
    UpdatePartFail,
    NoEnoughBattery,
    NetworkNotAllow,
}

impl ErrorCode {
    pub fn from_code(code: i64) -> Option<Self> {
        let error = match code {
            -1 => Self::DefaultError,
            -2 => Self::CheckNetworkErr,
            -207 => Self::CheckSystemBusy,
            -208 => Self::AuthFail,
            -209 => Self::AuthServerError,
            -210 => Self::AuthSystemError,
            -301 => Self::NetworkError,
            -304 => Self::NoEnoughMemory,
            -305 => Self::VerifyPackageFail,
            -409 => Self::UpdatePartFail,
            -830 => Self::NoEnoughBattery,
            3148800 => Self::NetworkNotAllow,
            _ => return None,
        };

        Some(error)
    }

    pub fn code(self) -> i64 {
        match self {
            Self::DefaultError => -1,
            Self::CheckNetworkErr => -2,
            Self::CheckSystemBusy => -207,
            Self::AuthFail => -208,
            Self::AuthServerError => -209,
            Self::AuthSystemError => -210,
            Self::NetworkError => -301,
            Self::NoEnoughMemory => -304,
            Self::VerifyPackageFail => -305,
            Self::UpdatePartFail => -409,
            Self::NoEnoughBattery => -830,
            Self::NetworkNotAllow => 3148800,
        }
    }
}

/// Actions carried by notification wants
pub mod action {
    pub const NOTIFICATION_LATER: &str = "com.ohos.updateapp.later";
    pub const NOTIFICATION_CHECK: &str = "com.ohos.updateapp.check";
    pub const NOTIFICATION_DOWNLOAD: &str = "com.ohos.updateapp.download";
    pub const NOTIFICATION_INSTALL: &str = "com.ohos.updateapp.install";
    pub const NOTIFICATION_DETAIL: &str = "com.ohos.updateapp.detail";
    pub const NOTIFICATION_HOT_UPGRADE_FAILED: &str = "com.ohos.updateapp.hot_upgrade_failed";
}

/// Pages of the main ability
pub mod page {
    pub const INDEX: &str = "pages/index";
    pub const NEW_VERSION: &str = "pages/newVersion";
    pub const CURRENT_VERSION: &str = "pages/currentVersion";
    pub const SETTING: &str = "pages/setting";
}

/// Outcome of a call into the update service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpgradeCallResult {
    Ok,
    Error,
    TimeOut,
}

impl UpgradeCallResult {
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 1,
            Self::Error => -1,
            Self::TimeOut => -2,
        }
    }
}

/// Envelope returned by every query against the update service. A timeout, a
/// failure and a success all arrive through this one type.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeData<T> {
    pub call_result: UpgradeCallResult,
    pub data: Option<T>,
    pub error: Option<BusinessError>,
}

impl<T> UpgradeData<T> {
    pub fn ok(data: T) -> Self {
        Self { call_result: UpgradeCallResult::Ok, data: Some(data), error: None }
    }

    pub fn error(error: Option<BusinessError>) -> Self {
        Self { call_result: UpgradeCallResult::Error, data: None, error }
    }

    pub fn time_out() -> Self {
        Self { call_result: UpgradeCallResult::TimeOut, data: None, error: None }
    }

    pub fn is_ok(&self) -> bool {
        self.call_result == UpgradeCallResult::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrCode {
    pub error_code: i64,
}

/// Error reported by the update service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Business error, code = {code:?}, message = {message:?}, data = {data:?}")]
pub struct BusinessError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Vec<ErrCode>,
}

impl BusinessError {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self { code: Some(code), message: message.into(), data: vec![] }
    }

    pub fn with_error_code(mut self, error_code: i64) -> Self {
        self.data.push(ErrCode { error_code });
        self
    }

    /// First error code carried in `data`
    pub fn error_code(&self) -> Option<i64> {
        self.data.first().map(|e| e.error_code)
    }
}

/// Milliseconds since unix epoch
pub fn clock() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn state_codes_survive_conversion() {
        for code in [0, 12, 20, 21, 22, 23, 24, 80, 81, 82, 90, 91, 92] {
            let state = UpdateState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(UpdateState::from_code(13), None);
    }

    #[test]
    fn end_reason_maps_to_error_code() {
        let status = OtaStatus::new(UpdateState::DownloadFailed, 0).with_end_reason("-304");
        assert_eq!(status.error_code(), Some(ErrorCode::NoEnoughMemory));

        let status = OtaStatus::new(UpdateState::DownloadFailed, 0).with_end_reason("oops");
        assert_eq!(status.error_code(), None);

        let status = OtaStatus::new(UpdateState::DownloadFailed, 0);
        assert_eq!(status.error_code(), None);
    }

    #[test]
    fn business_error_reports_first_code() {
        let err = BusinessError::new(11500104, "busy").with_error_code(-301).with_error_code(-1);
        assert_eq!(err.error_code(), Some(-301));
        assert_eq!(BusinessError::default().error_code(), None);
    }
}
