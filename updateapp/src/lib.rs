//! updateapp is the core of the system update application: it talks to the platform
//! update service, turns the service's task events into what the user sees and keeps
//! the pages, dialogs and notifications consistent with the upgrade status.
//!
//! Queries go through [`UpdateManager`], which bounds every call with a timeout and
//! answers with an [`UpgradeData`] envelope. Task events pushed by the service are
//! serialized by the [`MessageQueue`] and handed to the [`StateManager`], which drops
//! duplicates through the [`OtaStatusHolder`] and shows the rest through the
//! [`Platform`].
//!
//!```text
//!                    ┌──────────────┐
//!                    │Update service│
//!                    └──┬────────▲──┘
//!          task events  │        │ queries
//!                       │   ┌────┴────────┐  UpgradeData   ┌──────────────┐
//!                       │   │UpdateManager├───────────────►│Router / Toast│
//!                       │   └─────────────┘                └──────┬───────┘
//!               ┌───────▼──────┐                                  │
//!               │ MessageQueue │                                  │
//!               └───────┬──────┘                                  │
//!                       │ one at a time                           │
//!               ┌───────▼──────┐ dialogs, notifications    ┌──────▼───┐
//!               │ StateManager ├──────────────────────────►│ Platform │
//!               └───────┬──────┘                           └──────▲───┘
//!                       │ duplicate?                              │ pages
//!              ┌────────▼───────┐                   ┌─────────────┴──────────┐
//!              │ OtaStatusHolder│                   │MainAbility / ServiceExt│
//!              └────────────────┘                   └────────────────────────┘
//!```

use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info, warn};
use tokio::runtime::Handle;

pub mod base;
pub mod config;
pub mod manager;
pub mod queue;
pub mod shell;
pub mod simulator;
pub mod state;
pub mod status;
pub mod utils;

pub use base::{AppContext, BusinessError, OtaStatus, Platform, UpdateState, UpgradeCallResult, UpgradeData};
pub use config::Config;
pub use manager::{with_timeout, UpdateManager};
pub use queue::{Message, MessageHandler, MessageQueue};
pub use state::{StateManager, UpdateAction};
pub use status::OtaStatusHolder;

use base::updater::{CheckResult, TaskCallback};
use base::UpdateService;
use shell::{MainAbility, NotificationManager, OtaWantHandler, RouterUtils, ServiceExtAbility, ToastUtils};

/// Networks a download may use, as understood by the update service
const NET_CELLULAR: u8 = 1;
const NET_WIFI: u8 = 6;

const INSTALL_ORDER: u8 = 2;
const DOWNLOAD_ORDER: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{action:?} not allowed in state {state}")]
    NotAllowed { action: UpdateAction, state: UpdateState },
    #[error("No new version to act on")]
    NoNewVersion,
    #[error("Update service timed out")]
    TimeOut,
    #[error("Business error {0}")]
    Business(#[from] BusinessError),
}

/// Owns the app wide state and wires the components together
pub struct UpdateApp {
    config: Arc<Config>,
    context: Arc<AppContext>,
    platform: Arc<dyn Platform>,
    manager: Arc<UpdateManager>,
    toast: ToastUtils,
    state: Arc<StateManager>,
    queue: Arc<MessageQueue>,
    main_ability: Arc<MainAbility>,
    service_ability: ServiceExtAbility,
    callback: Mutex<Option<TaskCallback>>,
}

impl UpdateApp {
    pub fn new(config: Config, service: &dyn UpdateService, platform: Arc<dyn Platform>) -> Self {
        let manager = UpdateManager::new(service, &config);
        Self::with_manager(config, manager, platform)
    }

    pub fn with_manager(config: Config, manager: UpdateManager, platform: Arc<dyn Platform>) -> Self {
        let config = Arc::new(config);
        let context = Arc::new(AppContext::new());
        let manager = Arc::new(manager);
        let router = Arc::new(RouterUtils::new(platform.clone(), manager.clone(), &config));
        let notifications =
            Arc::new(NotificationManager::new(platform.clone(), router.clone(), &config));
        let state = Arc::new(StateManager::new(
            platform.clone(),
            router,
            notifications.clone(),
            &config,
        ));
        let queue = Arc::new(MessageQueue::new(state.clone()));
        let main_ability = Arc::new(MainAbility::new(
            context.clone(),
            platform.clone(),
            state.clone(),
            notifications.clone(),
            &config,
        ));
        let handler = Arc::new(OtaWantHandler::new(notifications, state.clone()));
        let service_ability = ServiceExtAbility::new(platform.clone(), handler, &config);
        let toast = ToastUtils::new(platform.clone(), config.toast.clone());

        Self {
            config,
            context,
            platform,
            manager,
            toast,
            state,
            queue,
            main_ability,
            service_ability,
            callback: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    pub fn manager(&self) -> &Arc<UpdateManager> {
        &self.manager
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn main_ability(&self) -> &Arc<MainAbility> {
        &self.main_ability
    }

    pub fn service_ability(&self) -> &ServiceExtAbility {
        &self.service_ability
    }

    /// Subscribes to task events. Must be called from within the runtime, events
    /// are handled on it whichever thread the service calls back on.
    pub fn start(&self) {
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        if callback.is_some() {
            warn!("already started");
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("start outside of a runtime: {e}");
                return;
            }
        };

        let queue = self.queue.clone();
        let context = self.context.clone();
        let on_event: TaskCallback = Arc::new(move |event_info| {
            let message = Message { context: context.clone(), event_info };
            queue.execute_detached(message, &handle);
        });

        self.manager.on(on_event.clone());
        *callback = Some(on_event);
        info!("listening for task events");
    }

    pub fn stop(&self) {
        let callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(callback) = callback {
            self.manager.off(&callback);
        }
    }

    /// Checks for a new version, telling the user when there is none or the
    /// service doesn't answer
    pub async fn check_for_update(&self) -> UpgradeData<CheckResult> {
        if !utils::is_net_available(&*self.platform).await {
            self.toast.show_toast("Network unavailable");
            return UpgradeData::error(None);
        }

        let data = self.manager.check_new_version().await;
        match data.call_result {
            UpgradeCallResult::Ok => self.state.set_update_state(UpdateState::CheckSuccess),
            UpgradeCallResult::TimeOut => self.toast.show_toast("Checking for updates timed out"),
            UpgradeCallResult::Error if data.data.is_some() => {
                self.toast.show_toast("Already the latest version")
            }
            UpgradeCallResult::Error => {
                error!("check failed: {:?}", data.error);
                self.toast.show_toast("Checking for updates failed")
            }
        }

        data
    }

    /// Starts downloading the new version
    pub async fn download(&self) -> Result<(), Error> {
        self.allow(UpdateAction::Download)?;
        let digest = self.new_version_digest().await?;
        let allow_network = self.allow_network().await;
        self.manager.download(&digest, allow_network, DOWNLOAD_ORDER).await?;
        Ok(())
    }

    pub async fn resume_download(&self) -> Result<(), Error> {
        self.allow(UpdateAction::Resume)?;
        let digest = self.new_version_digest().await?;
        let allow_network = self.allow_network().await;
        self.manager.resume_download(&digest, allow_network).await?;
        Ok(())
    }

    pub fn cancel(&self) -> Result<(), Error> {
        self.allow(UpdateAction::Cancel)?;
        self.manager.cancel();
        Ok(())
    }

    pub async fn install(&self) -> Result<(), Error> {
        self.allow(UpdateAction::Install)?;
        let digest = self.new_version_digest().await?;
        self.manager.upgrade(&digest, INSTALL_ORDER).await?;
        Ok(())
    }

    fn allow(&self, action: UpdateAction) -> Result<(), Error> {
        let state = self.state.update_state();
        if !StateManager::is_allow_execute(Some(state), action) {
            return Err(Error::NotAllowed { action, state });
        }

        Ok(())
    }

    // Cellular only when it's the only network available
    async fn allow_network(&self) -> u8 {
        match utils::is_cellular_network(&*self.platform).await {
            true => NET_CELLULAR,
            false => NET_WIFI,
        }
    }

    async fn new_version_digest(&self) -> Result<String, Error> {
        let data = self.manager.get_new_version().await;
        match data.call_result {
            UpgradeCallResult::TimeOut => Err(Error::TimeOut),
            _ => data
                .data
                .map(|info| info.version_digest_info.version_digest)
                .filter(|digest| !digest.is_empty())
                .ok_or(Error::NoNewVersion),
        }
    }
}

impl Drop for UpdateApp {
    fn drop(&mut self) {
        self.stop();
    }
}
