//! In process stand-ins for the update service and the host runtime, used by the
//! binary to run the whole app on a desktop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{info, warn};
use rand::Rng;
use tokio::time::sleep;

use crate::base::updater::{
    CheckResult, ComponentDescription, CurrentVersionInfo, DescriptionCallback, DescriptionInfo,
    DescriptionOptions, DownloadOptions, EventClassifyInfo, NewVersionInfo, ResumeDownloadOptions,
    TaskBody, TaskCallback, UpgradeInfo, UpgradeOptions, VersionComponent, VersionDigestInfo,
};
use crate::base::{
    BusinessError, Dialog, EventId, EventInfo, NetBearType, NotificationRequest, Platform,
    PlatformError, StartOptions, TaskInfo, Toast, UpdateService, UpdateState, Updater, Want,
};
use crate::config::SimulatorConfig;

const CURRENT_VERSION: &str = "OpenHarmony 5.0.0.100";

struct Inner {
    config: SimulatorConfig,
    task: Mutex<TaskBody>,
    new_version: Mutex<Option<NewVersionInfo>>,
    callbacks: Mutex<Vec<TaskCallback>>,
    cancelled: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn set_task(&self, state: UpdateState, progress: u8) -> TaskBody {
        let mut task = lock(&self.task);
        task.status = state.code();
        task.progress = progress;
        task.clone()
    }

    fn emit(&self, event_id: EventId, task_body: TaskBody) {
        let callbacks = lock(&self.callbacks).clone();
        let times = if self.config.duplicate_events { 2 } else { 1 };
        for _ in 0..times {
            for callback in &callbacks {
                callback(EventInfo { event_id, task_body: task_body.clone() });
            }
        }
    }

    fn progress(&self, state: UpdateState, event_id: EventId, progress: u8) {
        let body = self.set_task(state, progress);
        self.emit(event_id, body);
    }

    // Walks the download from `from` to completion, false if cancelled on the way
    async fn download(&self, from: u8) -> bool {
        let mut progress = from;
        self.progress(UpdateState::Downloading, EventId::DownloadStart, progress);
        while progress < 100 {
            sleep(self.config.download_step).await;
            if self.cancelled.swap(false, Ordering::SeqCst) {
                self.progress(UpdateState::DownloadCancel, EventId::TaskCancel, progress);
                return false;
            }

            let step: u8 = rand::thread_rng().gen_range(5..=20);
            progress = progress.saturating_add(step).min(100);
            self.progress(UpdateState::Downloading, EventId::DownloadUpdate, progress);
        }

        self.progress(UpdateState::DownloadSuccess, EventId::DownloadSuccess, 100);
        true
    }

    async fn upgrade(&self) {
        let mut progress = 0;
        self.progress(UpdateState::Installing, EventId::UpgradeStart, progress);
        while progress < 100 {
            sleep(self.config.install_step).await;
            let step: u8 = rand::thread_rng().gen_range(10..=30);
            progress = progress.saturating_add(step).min(100);
            self.progress(UpdateState::Installing, EventId::UpgradeUpdate, progress);
        }

        self.progress(UpdateState::Upgrading, EventId::ApplyStart, 100);
        sleep(self.config.install_step).await;
        self.progress(UpdateState::UpgradeSuccess, EventId::UpgradeSuccess, 100);
    }

    fn digest(&self) -> String {
        format!("sim-{}", self.config.new_version.replace(' ', "-"))
    }

    fn check_digest(&self, digest: &VersionDigestInfo) -> Result<(), BusinessError> {
        if lock(&self.new_version).is_none() || digest.version_digest != self.digest() {
            return Err(BusinessError::new(11500104, "unknown version digest")
                .with_error_code(-1));
        }

        Ok(())
    }
}

/// Update service that finds a new version on every check and walks download and
/// upgrade through timed progress events
#[derive(Clone)]
pub struct SimulatedUpdater {
    inner: Arc<Inner>,
}

impl SimulatedUpdater {
    pub fn new(config: SimulatorConfig) -> Self {
        let inner = Inner {
            config,
            task: Mutex::new(TaskBody::default()),
            new_version: Mutex::new(None),
            callbacks: Mutex::new(vec![]),
            cancelled: AtomicBool::new(false),
        };

        Self { inner: Arc::new(inner) }
    }

    fn new_version_info(&self) -> NewVersionInfo {
        let size = rand::thread_rng().gen_range(512..2048) * 1024 * 1024;
        NewVersionInfo {
            version_digest_info: VersionDigestInfo { version_digest: self.inner.digest() },
            version_components: vec![VersionComponent {
                component_id: "system".to_owned(),
                component_type: 1,
                upgrade_action: "upgrade".to_owned(),
                display_version: self.inner.config.new_version.clone(),
                inner_version: self.inner.config.new_version.clone(),
                size,
                effective_mode: 1,
            }],
        }
    }

    fn descriptions(content: &str) -> Vec<ComponentDescription> {
        vec![ComponentDescription {
            component_id: "system".to_owned(),
            description_info: DescriptionInfo { description_type: 0, content: content.to_owned() },
        }]
    }
}

#[async_trait]
impl Updater for SimulatedUpdater {
    async fn get_task_info(&self) -> Result<TaskInfo, BusinessError> {
        let task = lock(&self.inner.task).clone();
        Ok(TaskInfo { exist_task: task.status != UpdateState::Init.code(), task_body: Some(task) })
    }

    async fn get_new_version_info(&self) -> Result<NewVersionInfo, BusinessError> {
        lock(&self.inner.new_version)
            .clone()
            .ok_or_else(|| BusinessError::new(11500104, "no new version").with_error_code(-1))
    }

    async fn get_new_version_description(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &DescriptionOptions,
    ) -> Result<Vec<ComponentDescription>, BusinessError> {
        self.inner.check_digest(version_digest_info)?;
        let content = format!("[{}] {} release notes", options.language, self.inner.config.new_version);
        Ok(Self::descriptions(&content))
    }

    fn get_current_version_description(
        &self,
        options: &DescriptionOptions,
        callback: DescriptionCallback,
    ) {
        let content = format!("[{}] {CURRENT_VERSION} release notes", options.language);
        callback(None, Some(Self::descriptions(&content)));
    }

    async fn check_new_version(&self) -> Result<CheckResult, BusinessError> {
        sleep(self.inner.config.download_step).await;
        let info = self.new_version_info();
        *lock(&self.inner.new_version) = Some(info.clone());
        {
            let mut task = lock(&self.inner.task);
            task.version_digest_info = info.version_digest_info.clone();
            task.version_components = info.version_components.clone();
        }

        let body = self.inner.set_task(UpdateState::CheckSuccess, 0);
        self.inner.emit(EventId::TaskReceive, body);
        Ok(CheckResult { is_exist_new_version: true, new_version_info: Some(info) })
    }

    async fn get_current_version_info(&self) -> Result<CurrentVersionInfo, BusinessError> {
        Ok(CurrentVersionInfo {
            os_version: CURRENT_VERSION.to_owned(),
            device_name: "simulator".to_owned(),
            version_components: vec![],
        })
    }

    async fn download(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &DownloadOptions,
    ) -> Result<(), BusinessError> {
        self.inner.check_digest(version_digest_info)?;
        info!("download over network type {}", options.allow_network);
        self.inner.cancelled.store(false, Ordering::SeqCst);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.download(0).await;
        });

        Ok(())
    }

    async fn resume_download(
        &self,
        version_digest_info: &VersionDigestInfo,
        _options: &ResumeDownloadOptions,
    ) -> Result<(), BusinessError> {
        self.inner.check_digest(version_digest_info)?;
        let from = lock(&self.inner.task).progress;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.download(from).await;
        });

        Ok(())
    }

    async fn upgrade(
        &self,
        version_digest_info: &VersionDigestInfo,
        _options: &UpgradeOptions,
    ) -> Result<(), BusinessError> {
        self.inner.check_digest(version_digest_info)?;
        let status = lock(&self.inner.task).status;
        if status != UpdateState::DownloadSuccess.code() {
            return Err(BusinessError::new(11500104, "package not downloaded").with_error_code(-1));
        }

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.upgrade().await });
        Ok(())
    }

    fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    fn on(&self, _info: &EventClassifyInfo, callback: TaskCallback) -> Result<(), BusinessError> {
        lock(&self.inner.callbacks).push(callback);
        Ok(())
    }

    fn off(&self, _info: &EventClassifyInfo, callback: &TaskCallback) -> Result<(), BusinessError> {
        lock(&self.inner.callbacks).retain(|c| !Arc::ptr_eq(c, callback));
        Ok(())
    }
}

pub struct SimulatedService {
    updater: SimulatedUpdater,
}

impl SimulatedService {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { updater: SimulatedUpdater::new(config) }
    }
}

impl UpdateService for SimulatedService {
    fn get_online_updater(&self, info: &UpgradeInfo) -> Result<Arc<dyn Updater>, BusinessError> {
        info!("online updater for {}", info.upgrade_app);
        Ok(Arc::new(self.updater.clone()))
    }
}

/// Host that writes everything it is asked to show to the log
pub struct LogPlatform;

#[async_trait]
impl Platform for LogPlatform {
    async fn start_ability(&self, want: &Want, options: Option<&StartOptions>) -> Result<(), PlatformError> {
        info!("startAbility {want:?}, options = {options:?}");
        Ok(())
    }

    async fn terminate_ability(&self, ability_name: &str) -> Result<(), PlatformError> {
        info!("terminate {ability_name}");
        Ok(())
    }

    fn load_content(&self, page: &str) {
        info!("loadContent {page}");
    }

    fn router_push(&self, url: &str) {
        info!("router.push {url}");
    }

    fn router_replace(&self, url: &str) {
        info!("router.replace {url}");
    }

    fn router_clear(&self) {
        info!("router.clear");
    }

    fn show_toast(&self, toast: &Toast) {
        info!("toast: {}", toast.message);
    }

    fn show_dialog(&self, dialog: &Dialog) {
        warn!("dialog: {:?}", dialog.kind);
    }

    fn publish_notification(&self, request: &NotificationRequest) {
        info!("notification {} for status {}", request.action, request.status);
    }

    fn cancel_all_notifications(&self) {
        info!("cancel all notifications");
    }

    async fn default_net_bearers(&self) -> Result<Vec<NetBearType>, PlatformError> {
        Ok(vec![NetBearType::Wifi])
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            download_step: Duration::from_millis(10),
            install_step: Duration::from_millis(10),
            duplicate_events: false,
            ..Default::default()
        }
    }

    fn listen(updater: &SimulatedUpdater) -> flume::Receiver<EventInfo> {
        let (tx, rx) = flume::unbounded();
        let callback: TaskCallback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        updater.on(&EventClassifyInfo::task(), callback).unwrap();
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn download_runs_to_success() {
        let updater = SimulatedUpdater::new(config());
        let rx = listen(&updater);

        let result = updater.check_new_version().await.unwrap();
        let digest = result.new_version_info.unwrap().version_digest_info;
        updater.download(&digest, &DownloadOptions { allow_network: 6, order: 1 }).await.unwrap();

        loop {
            let event = rx.recv_async().await.unwrap();
            if event.event_id == EventId::DownloadSuccess {
                assert_eq!(event.task_body.progress, 100);
                break;
            }
        }

        let info = updater.get_task_info().await.unwrap();
        assert_eq!(info.ota_status().status, Some(UpdateState::DownloadSuccess));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_download() {
        let updater = SimulatedUpdater::new(config());
        let rx = listen(&updater);

        let result = updater.check_new_version().await.unwrap();
        let digest = result.new_version_info.unwrap().version_digest_info;
        updater.download(&digest, &DownloadOptions { allow_network: 6, order: 1 }).await.unwrap();
        updater.cancel();

        loop {
            let event = rx.recv_async().await.unwrap();
            assert_ne!(event.event_id, EventId::DownloadSuccess);
            if event.event_id == EventId::TaskCancel {
                break;
            }
        }
    }

    #[tokio::test]
    async fn unknown_digest_is_rejected() {
        let updater = SimulatedUpdater::new(config());
        let digest = VersionDigestInfo { version_digest: "nope".to_owned() };
        let err = updater.upgrade(&digest, &UpgradeOptions { order: 2 }).await.unwrap_err();
        assert_eq!(err.error_code(), Some(-1));
    }
}
