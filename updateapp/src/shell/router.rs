use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::time::sleep;

use crate::base::{page, Platform, UpdateState};
use crate::config::Config;
use crate::manager::UpdateManager;
use crate::state::{StateManager, UpdateAction};

/// Page navigation inside the main ability
pub struct RouterUtils {
    platform: Arc<dyn Platform>,
    manager: Arc<UpdateManager>,
    page_switch_delay: Duration,
}

impl RouterUtils {
    pub fn new(platform: Arc<dyn Platform>, manager: Arc<UpdateManager>, config: &Config) -> Self {
        Self { platform, manager, page_switch_delay: config.page_switch_delay }
    }

    /// Clears the page stack and shows the home page alone
    pub async fn singleton_home_page(&self) {
        info!("singletonHomePage");
        self.platform.router_clear();
        sleep(self.page_switch_delay).await;
        self.platform.router_replace(page::INDEX);
    }

    pub fn open_new_version_page(&self) {
        self.platform.router_push(page::NEW_VERSION);
    }

    pub fn open_current_version(&self) {
        self.platform.router_push(page::CURRENT_VERSION);
    }

    pub fn clear_all_page(&self) {
        self.platform.router_clear();
    }

    /// Whether the new version page makes sense for the current upgrade status.
    /// Never while upgrading, and never when the status can't be read.
    pub async fn is_can_to_new_version(&self) -> bool {
        let data = self.manager.get_ota_status().await;
        if !data.is_ok() {
            return false;
        }

        match data.data.and_then(|status| status.status) {
            Some(UpdateState::Upgrading) => false,
            status => StateManager::is_allow_execute(status, UpdateAction::ShowNewVersion),
        }
    }
}
