//! Host runtime operations the presentation shells depend on. The host owns
//! rendering, this trait only describes what gets shown.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{StartOptions, UpdateState, Want};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    #[error("Failed to start ability: {0}")]
    StartAbility(String),
    #[error("Failed to terminate ability: {0}")]
    Terminate(String),
    #[error("Network query failed: {0}")]
    Network(String),
}

/// Dialogs shown on failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    DownloadNotEnoughSpace,
    DownloadNoNetwork,
    VerifyFail,
    DownloadFail,
    UpgradeNotEnoughSpace,
    AuthServerConnectFail,
    UpgradeNotEnoughBattery,
    AuthFail,
    UpgradeFail,
}

/// What happens once the user closes a dialog, confirm and cancel alike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Fall back to the given state so the user can retry from there
    SetState(UpdateState),
    /// Clear the page stack and go back to the home page
    HomePage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub retry: Option<RetryAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub duration: Duration,
    pub bottom: String,
}

/// Notification posted to the notification bar. Tapping it delivers `action`
/// back to the service ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub action: &'static str,
    pub status: UpdateState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetBearType {
    Cellular,
    Wifi,
    Ethernet,
}

#[async_trait]
pub trait Platform: Send + Sync {
    async fn start_ability(&self, want: &Want, options: Option<&StartOptions>) -> Result<(), PlatformError>;

    /// Terminates a running ability of this application
    async fn terminate_ability(&self, ability_name: &str) -> Result<(), PlatformError>;

    /// Loads the first page of a freshly created window stage
    fn load_content(&self, page: &str);

    fn router_push(&self, url: &str);

    fn router_replace(&self, url: &str);

    fn router_clear(&self);

    fn show_toast(&self, toast: &Toast);

    fn show_dialog(&self, dialog: &Dialog);

    fn publish_notification(&self, request: &NotificationRequest);

    fn cancel_all_notifications(&self);

    /// Bearers of the default network
    async fn default_net_bearers(&self) -> Result<Vec<NetBearType>, PlatformError>;
}
