use std::sync::Arc;

use log::{error, info};

use crate::base::{action, page, NotificationRequest, Platform, UpdateState, Want};
use crate::config::Config;

use super::{RouterUtils, START_OPTIONS};

/// Posts notifications and handles the actions delivered when one is tapped
pub struct NotificationManager {
    platform: Arc<dyn Platform>,
    router: Arc<RouterUtils>,
    package_name: String,
    main_ability_name: String,
}

impl NotificationManager {
    pub fn new(platform: Arc<dyn Platform>, router: Arc<RouterUtils>, config: &Config) -> Self {
        Self {
            platform,
            router,
            package_name: config.package_name.clone(),
            main_ability_name: config.main_ability_name.clone(),
        }
    }

    /// Returns false for actions this manager doesn't handle
    pub async fn handle_action(&self, action: &str) -> bool {
        match action {
            action::NOTIFICATION_CHECK => {
                info!("handleCheckAction");
                self.start_ability(page::INDEX).await;
                true
            }
            action::NOTIFICATION_DETAIL => {
                info!("handleDetailAction");
                let uri = match self.router.is_can_to_new_version().await {
                    true => page::NEW_VERSION,
                    false => page::INDEX,
                };
                self.start_ability(uri).await;
                true
            }
            _ => false,
        }
    }

    pub async fn start_to_new_version(&self) {
        if self.router.is_can_to_new_version().await {
            self.start_ability(page::NEW_VERSION).await;
        }
    }

    pub fn publish(&self, action: &'static str, status: UpdateState) {
        info!("publish {action} for status {status}");
        self.platform.publish_notification(&NotificationRequest { action, status });
    }

    pub fn cancel_all(&self) {
        self.platform.cancel_all_notifications();
    }

    async fn start_ability(&self, uri: &str) {
        let want = Want::new(&self.package_name, &self.main_ability_name).with_uri(uri);
        if let Err(e) = self.platform.start_ability(&want, Some(&START_OPTIONS)).await {
            error!("startAbility failed: {e}");
        }
    }
}
