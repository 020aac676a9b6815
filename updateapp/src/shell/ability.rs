//! Lifecycles of the two abilities of the application. The host calls into these,
//! they never drive themselves.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::base::{page, AppContext, Platform, PlatformError, Want, SERVICE_ABILITY_NAME};
use crate::config::Config;
use crate::state::StateManager;

use super::NotificationManager;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown start id {0}")]
    UnknownStartId(u32),
    #[error("Platform error {0}")]
    Platform(#[from] PlatformError),
}

/// Handles wants delivered to the service ability
#[async_trait]
pub trait WantHandler: Send + Sync {
    async fn handle_want(&self, want: &Want) -> bool;

    /// No upgrade is running, the service ability may stop
    fn is_terminal(&self) -> bool;
}

/// Routes notification actions and reports the update state
pub struct OtaWantHandler {
    notifications: Arc<NotificationManager>,
    state: Arc<StateManager>,
}

impl OtaWantHandler {
    pub fn new(notifications: Arc<NotificationManager>, state: Arc<StateManager>) -> Self {
        Self { notifications, state }
    }
}

#[async_trait]
impl WantHandler for OtaWantHandler {
    async fn handle_want(&self, want: &Want) -> bool {
        match &want.action {
            Some(action) => self.notifications.handle_action(action).await,
            None => false,
        }
    }

    fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// The UI ability. Owns the page stack and is the only place dialogs can be shown.
pub struct MainAbility {
    context: Arc<AppContext>,
    platform: Arc<dyn Platform>,
    state: Arc<StateManager>,
    notifications: Arc<NotificationManager>,
    foreground_prepare: Duration,
}

impl MainAbility {
    pub fn new(
        context: Arc<AppContext>,
        platform: Arc<dyn Platform>,
        state: Arc<StateManager>,
        notifications: Arc<NotificationManager>,
        config: &Config,
    ) -> Self {
        Self { context, platform, state, notifications, foreground_prepare: config.foreground_prepare }
    }

    pub fn on_create(&self, want: Want, language: &str) {
        info!("onCreate: {want:?}");
        self.context.set_ability_want(want);
        self.context.set_foreground(false);
        self.context.update_language(language);
    }

    pub fn on_destroy(&self) {
        info!("onDestroy");
        self.context.set_foreground(false);
    }

    /// Loads the page asked for by the launching want. Returns the loaded page.
    pub fn on_window_stage_create(&self) -> &'static str {
        self.context.set_foreground(false);
        let uri = self.context.ability_want().and_then(|want| want.uri);
        let page = match uri.as_deref() {
            Some(page::NEW_VERSION) => page::NEW_VERSION,
            Some(page::SETTING) => page::SETTING,
            _ => page::INDEX,
        };

        self.platform.load_content(page);
        self.context.set_current_page(page);
        page
    }

    pub fn on_window_stage_destroy(&self) {
        info!("onWindowStageDestroy");
        self.context.set_foreground(false);
    }

    pub fn on_new_want(&self, want: Want) {
        info!("onNewWant: {want:?}");
        self.context.set_new_page(want.uri);
        if self.context.is_foreground() {
            self.route_page();
        }
    }

    pub fn on_configuration_update(&self, language: &str) {
        if self.context.update_language(language) {
            info!(
                "language changed to {language}, currentPage = {:?}",
                self.context.current_page()
            );
        }
    }

    /// Pending routes and a parked status are only handled once the window had
    /// time to settle, see the returned handle.
    pub fn on_foreground(self: &Arc<Self>) -> JoinHandle<()> {
        info!("onForeground");
        self.notifications.cancel_all();
        self.context.set_foreground(true);

        let ability = self.clone();
        tokio::spawn(async move {
            sleep(ability.foreground_prepare).await;
            ability.route_page();
            ability.replay_parked_notify().await;
        })
    }

    pub fn on_background(&self) {
        info!("onBackground");
        self.context.set_foreground(false);
    }

    fn route_page(&self) {
        if let Some(page) = self.context.take_route() {
            info!("router.push page: {page}");
            self.platform.router_push(&page);
            self.context.set_current_page(page);
        }
    }

    async fn replay_parked_notify(&self) {
        let Some(parked) = self.context.take_parked_notify() else {
            return;
        };

        info!(
            "handleReceivedUpdatePageMessage otaStatus {:?} eventId is {:?}",
            parked.status,
            parked.event_id
        );
        if let Err(e) = self.state.notify(&self.context, &parked.status, parked.event_id).await {
            error!("replay failed: {e}");
        }
    }
}

/// Background ability started by the update service. Stops itself a while after
/// the last request if no upgrade is running.
pub struct ServiceExtAbility {
    platform: Arc<dyn Platform>,
    handler: Arc<dyn WantHandler>,
    start_ids: Arc<Mutex<Vec<u32>>>,
    terminate_delay: Duration,
}

impl ServiceExtAbility {
    pub fn new(platform: Arc<dyn Platform>, handler: Arc<dyn WantHandler>, config: &Config) -> Self {
        Self {
            platform,
            handler,
            start_ids: Arc::new(Mutex::new(vec![])),
            terminate_delay: config.service_terminate_delay,
        }
    }

    fn start_ids(&self) -> MutexGuard<'_, Vec<u32>> {
        self.start_ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests being handled
    pub fn pending(&self) -> usize {
        self.start_ids().len()
    }

    /// Handles `want` then releases `start_id`. Returns the termination task if
    /// this was the last request.
    pub async fn on_request(
        &self,
        want: Want,
        start_id: u32,
    ) -> Result<Option<JoinHandle<()>>, Error> {
        info!("onRequest, want: {}", want.ability_name);
        self.start_ids().push(start_id);
        if !self.handler.handle_want(&want).await {
            info!("unhandled action {:?}", want.action);
        }

        self.stop_self(start_id)
    }

    fn stop_self(&self, start_id: u32) -> Result<Option<JoinHandle<()>>, Error> {
        let remaining = {
            let mut start_ids = self.start_ids();
            let index = start_ids
                .iter()
                .position(|id| *id == start_id)
                .ok_or(Error::UnknownStartId(start_id))?;
            start_ids.remove(index);
            start_ids.len()
        };

        info!("stopSelf length {remaining}");
        if remaining > 0 || !self.handler.is_terminal() {
            return Ok(None);
        }

        let platform = self.platform.clone();
        let start_ids = self.start_ids.clone();
        let delay = self.terminate_delay;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            // a request that arrived meanwhile keeps the ability alive
            if !start_ids.lock().unwrap_or_else(PoisonError::into_inner).is_empty() {
                return;
            }

            info!("stopSelf");
            if let Err(e) = platform.terminate_ability(SERVICE_ABILITY_NAME).await {
                error!("stopSelf err is {e}");
            }
        });

        Ok(Some(handle))
    }
}
