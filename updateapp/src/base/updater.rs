//! Interface of the platform update service. Checking, downloading, verifying and
//! applying packages all happen behind [`Updater`], this crate only consumes it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BusinessError, OtaStatus, UpdateState, PACKAGE_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessVendor {
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessType {
    pub vendor: BusinessVendor,
    pub sub_type: u32,
}

/// Identifies the application asking for an updater
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeInfo {
    pub upgrade_app: String,
    pub business_type: BusinessType,
}

impl UpgradeInfo {
    pub fn new(sub_type: u32, package_name: Option<&str>) -> Self {
        Self {
            upgrade_app: package_name.unwrap_or(PACKAGE_NAME).to_owned(),
            business_type: BusinessType { vendor: BusinessVendor::Public, sub_type },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDigestInfo {
    pub version_digest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptionFormat {
    Standard,
    SimplifiedString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionOptions {
    pub format: DescriptionFormat,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionInfo {
    pub description_type: u8,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescription {
    pub component_id: String,
    pub description_info: DescriptionInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionComponent {
    pub component_id: String,
    pub component_type: u8,
    pub upgrade_action: String,
    pub display_version: String,
    pub inner_version: String,
    pub size: u64,
    pub effective_mode: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersionInfo {
    pub version_digest_info: VersionDigestInfo,
    pub version_components: Vec<VersionComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub is_exist_new_version: bool,
    pub new_version_info: Option<NewVersionInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVersionInfo {
    pub os_version: String,
    pub device_name: String,
    pub version_components: Vec<VersionComponent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub allow_network: u8,
    pub order: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeDownloadOptions {
    pub allow_network: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOptions {
    pub order: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_code: i64,
    pub error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBody {
    pub version_digest_info: VersionDigestInfo,
    /// Raw upgrade status code, see [`UpdateState`]
    pub status: i32,
    pub sub_status: i32,
    pub progress: u8,
    pub install_mode: u8,
    pub error_messages: Vec<ErrorMessage>,
    pub version_components: Vec<VersionComponent>,
}

impl TaskBody {
    pub fn ota_status(&self) -> OtaStatus {
        OtaStatus {
            status: UpdateState::from_code(self.status),
            percent: self.progress,
            end_reason: self.error_messages.first().map(|e| e.error_code.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub exist_task: bool,
    pub task_body: Option<TaskBody>,
}

impl TaskInfo {
    /// Status of the running task, [`UpdateState::Init`] when there is none
    pub fn ota_status(&self) -> OtaStatus {
        match (&self.task_body, self.exist_task) {
            (Some(body), true) => body.ota_status(),
            (body, _) => OtaStatus {
                status: Some(UpdateState::Init),
                percent: body.as_ref().map(|b| b.progress).unwrap_or(0),
                end_reason: body
                    .as_ref()
                    .and_then(|b| b.error_messages.first())
                    .map(|e| e.error_code.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventClassify {
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventClassifyInfo {
    pub event_classify: EventClassify,
    pub extra_info: String,
}

impl EventClassifyInfo {
    pub fn task() -> Self {
        Self { event_classify: EventClassify::Task, extra_info: String::new() }
    }
}

/// Task events pushed by the update service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventId {
    TaskBase,
    TaskReceive,
    TaskCancel,
    DownloadWait,
    DownloadStart,
    DownloadUpdate,
    DownloadPause,
    DownloadResume,
    DownloadSuccess,
    DownloadFail,
    UpgradeWait,
    UpgradeStart,
    UpgradeUpdate,
    ApplyWait,
    ApplyStart,
    UpgradeSuccess,
    UpgradeFail,
}

impl EventId {
    pub fn code(self) -> u32 {
        const BASE: u32 = 0x0100_0000;
        let offset = match self {
            Self::TaskBase => 0,
            Self::TaskReceive => 1,
            Self::TaskCancel => 2,
            Self::DownloadWait => 3,
            Self::DownloadStart => 4,
            Self::DownloadUpdate => 5,
            Self::DownloadPause => 6,
            Self::DownloadResume => 7,
            Self::DownloadSuccess => 8,
            Self::DownloadFail => 9,
            Self::UpgradeWait => 10,
            Self::UpgradeStart => 11,
            Self::UpgradeUpdate => 12,
            Self::ApplyWait => 13,
            Self::ApplyStart => 14,
            Self::UpgradeSuccess => 15,
            Self::UpgradeFail => 16,
        };

        BASE + offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub event_id: EventId,
    pub task_body: TaskBody,
}

/// Push style callback for task events
pub type TaskCallback = Arc<dyn Fn(EventInfo) + Send + Sync>;

/// Single shot callback of [`Updater::get_current_version_description`]
pub type DescriptionCallback =
    Box<dyn FnOnce(Option<BusinessError>, Option<Vec<ComponentDescription>>) + Send>;

/// Online updater handed out by the update service
#[async_trait]
pub trait Updater: Send + Sync {
    async fn get_task_info(&self) -> Result<TaskInfo, BusinessError>;

    async fn get_new_version_info(&self) -> Result<NewVersionInfo, BusinessError>;

    async fn get_new_version_description(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &DescriptionOptions,
    ) -> Result<Vec<ComponentDescription>, BusinessError>;

    /// Callback style, `callback` is invoked exactly once by a well behaved service
    fn get_current_version_description(
        &self,
        options: &DescriptionOptions,
        callback: DescriptionCallback,
    );

    async fn check_new_version(&self) -> Result<CheckResult, BusinessError>;

    async fn get_current_version_info(&self) -> Result<CurrentVersionInfo, BusinessError>;

    async fn download(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &DownloadOptions,
    ) -> Result<(), BusinessError>;

    async fn resume_download(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &ResumeDownloadOptions,
    ) -> Result<(), BusinessError>;

    async fn upgrade(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &UpgradeOptions,
    ) -> Result<(), BusinessError>;

    fn cancel(&self);

    fn on(&self, info: &EventClassifyInfo, callback: TaskCallback) -> Result<(), BusinessError>;

    fn off(&self, info: &EventClassifyInfo, callback: &TaskCallback) -> Result<(), BusinessError>;
}

/// Entry point of the update service
pub trait UpdateService: Send + Sync {
    fn get_online_updater(&self, info: &UpgradeInfo) -> Result<Arc<dyn Updater>, BusinessError>;
}

#[cfg(test)]
mod test {
    use super::*;

    fn body(status: i32, progress: u8, codes: &[i64]) -> TaskBody {
        TaskBody {
            status,
            progress,
            error_messages: codes
                .iter()
                .map(|c| ErrorMessage { error_code: *c, error_message: String::new() })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn running_task_reports_its_own_status() {
        let info = TaskInfo { exist_task: true, task_body: Some(body(20, 42, &[])) };
        assert_eq!(info.ota_status(), OtaStatus::new(UpdateState::Downloading, 42));
    }

    #[test]
    fn missing_task_reports_init() {
        let info = TaskInfo { exist_task: false, task_body: None };
        assert_eq!(info.ota_status(), OtaStatus::new(UpdateState::Init, 0));
    }

    #[test]
    fn end_reason_is_first_error_code() {
        let info = TaskInfo { exist_task: true, task_body: Some(body(23, 0, &[-304, -301])) };
        let status = info.ota_status();
        assert_eq!(status.status, Some(UpdateState::DownloadFailed));
        assert_eq!(status.end_reason.as_deref(), Some("-304"));
    }

    #[test]
    fn unknown_status_code_is_absent() {
        let status = body(55, 3, &[]).ota_status();
        assert_eq!(status.status, None);
    }
}
