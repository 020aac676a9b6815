//! Turns upgrade statuses into what the user sees.
//!
//! The update service pushes a task event for every step and repeats itself. Each
//! event is converted into an [`OtaStatus`], filtered through the
//! [`OtaStatusHolder`] and then shown: failures as dialogs, a found or downloaded
//! version as a notification. The last status shown is kept as the app's update
//! state, which gates the actions offered to the user.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::base::{action, AppContext, EventId, OtaStatus, Platform, PlatformError, RetryAction, UpdateState};
use crate::config::Config;
use crate::queue::{self, Message, MessageHandler};
use crate::shell::{DialogUtils, NotificationManager, RouterUtils};
use crate::status::OtaStatusHolder;

/// Actions the user can trigger from the pages or notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateAction {
    Check,
    Download,
    Cancel,
    Resume,
    Install,
    ShowNewVersion,
    ShowProcessView,
}

pub struct StateManager {
    dialogs: DialogUtils,
    router: Arc<RouterUtils>,
    notifications: Arc<NotificationManager>,
    state: Mutex<UpdateState>,
    holder: Mutex<OtaStatusHolder>,
}

impl StateManager {
    pub fn new(
        platform: Arc<dyn Platform>,
        router: Arc<RouterUtils>,
        notifications: Arc<NotificationManager>,
        config: &Config,
    ) -> Self {
        Self {
            dialogs: DialogUtils::new(platform, config),
            router,
            notifications,
            state: Mutex::new(UpdateState::Init),
            holder: Mutex::new(OtaStatusHolder::new(config.status_alive_time)),
        }
    }

    /// Whether `action` may be offered while in `status`
    pub fn is_allow_execute(status: Option<UpdateState>, action: UpdateAction) -> bool {
        use UpdateAction::*;
        use UpdateState::*;

        let Some(status) = status else {
            return false;
        };

        let allowed: &[UpdateAction] = match status {
            Init => &[Check],
            CheckSuccess => &[Check, Download, ShowNewVersion],
            Downloading => &[Cancel, ShowNewVersion, ShowProcessView],
            DownloadPause => &[Resume, Cancel, ShowNewVersion, ShowProcessView],
            DownloadCancel | UpgradeFailed | UpgradeSuccess => &[Check],
            DownloadFailed => &[Check, Download, ShowNewVersion],
            DownloadSuccess => &[Install, ShowNewVersion],
            Installing | Upgrading => &[ShowProcessView],
            InstallFailed => &[Check, Install, ShowNewVersion],
            InstallSuccess => &[ShowProcessView],
        };

        allowed.contains(&action)
    }

    pub fn update_state(&self) -> UpdateState {
        *self.state()
    }

    pub fn set_update_state(&self, state: UpdateState) {
        debug!("setUpdateState {state}");
        *self.state() = state;
    }

    /// No upgrade task is running, the service ability may stop
    pub fn is_terminal(&self) -> bool {
        self.update_state().is_terminal()
    }

    fn state(&self) -> MutexGuard<'_, UpdateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when `status` differs from what was last seen
    pub fn is_status_changed(&self, status: &OtaStatus, event_id: Option<EventId>) -> bool {
        self.holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_status_changed_and_refresh(status, event_id)
    }

    /// Shows `status` to the user
    pub async fn notify(
        &self,
        context: &AppContext,
        status: &OtaStatus,
        event_id: Option<EventId>,
    ) -> Result<(), PlatformError> {
        let Some(state) = status.status else {
            warn!("notify without status, event = {event_id:?}");
            return Ok(());
        };

        info!("notify status = {state}, end reason = {:?}", status.end_reason);
        self.set_update_state(state);
        match state {
            UpdateState::DownloadFailed => {
                self.dialogs.show_download_fail(context, status, event_id).await?
            }
            UpdateState::InstallFailed | UpdateState::UpgradeFailed => {
                self.dialogs.show_upgrade_fail(context, status, event_id).await?
            }
            UpdateState::CheckSuccess => {
                self.notifications.publish(action::NOTIFICATION_DETAIL, state)
            }
            UpdateState::DownloadSuccess => {
                self.notifications.publish(action::NOTIFICATION_INSTALL, state)
            }
            _ => {}
        }

        Ok(())
    }

    /// Called by the platform once the user closes a dialog
    pub async fn on_dialog_closed(&self, retry: RetryAction) {
        match retry {
            RetryAction::SetState(state) => self.set_update_state(state),
            RetryAction::HomePage => self.router.singleton_home_page().await,
        }
    }
}

#[async_trait]
impl MessageHandler for StateManager {
    async fn handle_message(&self, message: Message) -> Result<(), queue::Error> {
        let event_id = message.event_info.event_id;
        let body = &message.event_info.task_body;
        let status = body.ota_status();
        if status.status.is_none() {
            return Err(queue::Error::UnknownStatus(body.status));
        }

        if !self.is_status_changed(&status, Some(event_id)) {
            debug!("duplicate {event_id:?} dropped");
            return Ok(());
        }

        self.notify(&message.context, &status, Some(event_id)).await?;
        Ok(())
    }
}
