//! Failure dialogs.
//!
//! A dialog can only be drawn by the main ability while it is in foreground. When
//! it isn't, the status is parked in [`AppContext`], the main ability is killed and
//! restarted at the new version page, which replays the parked status once it
//! comes to foreground.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time::sleep;

use crate::base::{
    page, AppContext, Dialog, DialogKind, ErrorCode, EventId, OtaStatus, Platform, PlatformError,
    RetryAction, UpdateState, Want,
};
use crate::config::Config;

use super::START_OPTIONS;

pub struct DialogUtils {
    platform: Arc<dyn Platform>,
    package_name: String,
    main_ability_name: String,
    start_ability_delay: Duration,
}

impl DialogUtils {
    pub fn new(platform: Arc<dyn Platform>, config: &Config) -> Self {
        Self {
            platform,
            package_name: config.package_name.clone(),
            main_ability_name: config.main_ability_name.clone(),
            start_ability_delay: config.start_ability_delay,
        }
    }

    pub async fn show_download_fail(
        &self,
        context: &AppContext,
        status: &OtaStatus,
        event_id: Option<EventId>,
    ) -> Result<(), PlatformError> {
        self.show(context, status, event_id, download_fail_dialog(status.error_code())).await
    }

    pub async fn show_upgrade_fail(
        &self,
        context: &AppContext,
        status: &OtaStatus,
        event_id: Option<EventId>,
    ) -> Result<(), PlatformError> {
        self.show(context, status, event_id, upgrade_fail_dialog(status.error_code())).await
    }

    async fn show(
        &self,
        context: &AppContext,
        status: &OtaStatus,
        event_id: Option<EventId>,
        dialog: Dialog,
    ) -> Result<(), PlatformError> {
        if !context.is_foreground() {
            self.restart_main_ability(context, status, event_id).await;
            return Ok(());
        }

        info!("show {:?}", dialog.kind);
        self.platform.show_dialog(&dialog);
        Ok(())
    }

    async fn restart_main_ability(
        &self,
        context: &AppContext,
        status: &OtaStatus,
        event_id: Option<EventId>,
    ) {
        info!("do startMainAbilityIndex.");
        context.park_notify(status.clone(), event_id);
        if let Err(e) = self.platform.terminate_ability(&self.main_ability_name).await {
            error!("terminateSelf failed: {e}");
        }

        let platform = self.platform.clone();
        let delay = self.start_ability_delay;
        let want =
            Want::new(&self.package_name, &self.main_ability_name).with_uri(page::NEW_VERSION);
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = platform.start_ability(&want, Some(&START_OPTIONS)).await {
                error!("startMainAbilityIndex failed: {e}");
            }
        });
    }
}

pub fn download_fail_dialog(code: Option<ErrorCode>) -> Dialog {
    match code {
        Some(ErrorCode::NoEnoughMemory) => Dialog {
            kind: DialogKind::DownloadNotEnoughSpace,
            retry: Some(RetryAction::SetState(UpdateState::CheckSuccess)),
        },
        Some(ErrorCode::NetworkError) => Dialog { kind: DialogKind::DownloadNoNetwork, retry: None },
        Some(ErrorCode::VerifyPackageFail) => {
            Dialog { kind: DialogKind::VerifyFail, retry: Some(RetryAction::HomePage) }
        }
        _ => Dialog { kind: DialogKind::DownloadFail, retry: Some(RetryAction::HomePage) },
    }
}

pub fn upgrade_fail_dialog(code: Option<ErrorCode>) -> Dialog {
    match code {
        Some(ErrorCode::NoEnoughMemory) => Dialog {
            kind: DialogKind::UpgradeNotEnoughSpace,
            retry: Some(RetryAction::SetState(UpdateState::DownloadSuccess)),
        },
        Some(ErrorCode::NoEnoughBattery) => {
            Dialog { kind: DialogKind::UpgradeNotEnoughBattery, retry: None }
        }
        Some(ErrorCode::AuthServerError) => {
            Dialog { kind: DialogKind::AuthServerConnectFail, retry: None }
        }
        Some(ErrorCode::AuthFail) => {
            Dialog { kind: DialogKind::AuthFail, retry: Some(RetryAction::HomePage) }
        }
        _ => Dialog { kind: DialogKind::UpgradeFail, retry: Some(RetryAction::HomePage) },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn download_failures_pick_dialog_by_reason() {
        let dialog = download_fail_dialog(Some(ErrorCode::NoEnoughMemory));
        assert_eq!(dialog.kind, DialogKind::DownloadNotEnoughSpace);
        assert_eq!(dialog.retry, Some(RetryAction::SetState(UpdateState::CheckSuccess)));

        assert_eq!(download_fail_dialog(Some(ErrorCode::NetworkError)).retry, None);
        assert_eq!(
            download_fail_dialog(Some(ErrorCode::VerifyPackageFail)).kind,
            DialogKind::VerifyFail
        );

        for code in [None, Some(ErrorCode::DefaultError), Some(ErrorCode::AuthFail)] {
            let dialog = download_fail_dialog(code);
            assert_eq!(dialog.kind, DialogKind::DownloadFail);
            assert_eq!(dialog.retry, Some(RetryAction::HomePage));
        }
    }

    #[test]
    fn upgrade_failures_pick_dialog_by_reason() {
        let dialog = upgrade_fail_dialog(Some(ErrorCode::NoEnoughMemory));
        assert_eq!(dialog.kind, DialogKind::UpgradeNotEnoughSpace);
        assert_eq!(dialog.retry, Some(RetryAction::SetState(UpdateState::DownloadSuccess)));

        assert_eq!(
            upgrade_fail_dialog(Some(ErrorCode::NoEnoughBattery)).kind,
            DialogKind::UpgradeNotEnoughBattery
        );
        assert_eq!(
            upgrade_fail_dialog(Some(ErrorCode::AuthServerError)).kind,
            DialogKind::AuthServerConnectFail
        );
        assert_eq!(
            upgrade_fail_dialog(Some(ErrorCode::AuthFail)).retry,
            Some(RetryAction::HomePage)
        );
        assert_eq!(upgrade_fail_dialog(None).kind, DialogKind::UpgradeFail);
    }
}
