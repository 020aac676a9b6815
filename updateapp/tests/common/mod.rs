#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flume::{Receiver, Sender};
use tokio::time::sleep;

use updateapp::base::updater::{
    CheckResult, ComponentDescription, CurrentVersionInfo, DescriptionCallback, DescriptionInfo,
    DescriptionOptions, DownloadOptions, ErrorMessage, EventClassifyInfo, NewVersionInfo,
    ResumeDownloadOptions, TaskBody, TaskCallback, UpgradeInfo, UpgradeOptions, VersionDigestInfo,
};
use updateapp::base::{
    BusinessError, Dialog, EventId, EventInfo, NetBearType, NotificationRequest, Platform,
    PlatformError, StartOptions, TaskInfo, Toast, UpdateService, UpdateState, Updater, Want,
};

/// Everything the app asked the host to do
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    StartAbility(Want, Option<StartOptions>),
    Terminate(String),
    LoadContent(String),
    Push(String),
    Replace(String),
    Clear,
    Toast(String),
    Dialog(Dialog),
    Notification(NotificationRequest),
    CancelNotifications,
}

pub struct MockPlatform {
    tx: Sender<Shown>,
    pub bearers: Mutex<Vec<NetBearType>>,
    pub terminate_error: Mutex<Option<PlatformError>>,
}

impl MockPlatform {
    pub fn new() -> (Arc<Self>, Receiver<Shown>) {
        let (tx, rx) = flume::unbounded();
        let platform = MockPlatform {
            tx,
            bearers: Mutex::new(vec![NetBearType::Wifi]),
            terminate_error: Mutex::new(None),
        };
        (Arc::new(platform), rx)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn start_ability(&self, want: &Want, options: Option<&StartOptions>) -> Result<(), PlatformError> {
        let _ = self.tx.send(Shown::StartAbility(want.clone(), options.copied()));
        Ok(())
    }

    async fn terminate_ability(&self, ability_name: &str) -> Result<(), PlatformError> {
        if let Some(e) = self.terminate_error.lock().unwrap().clone() {
            return Err(e);
        }

        let _ = self.tx.send(Shown::Terminate(ability_name.to_owned()));
        Ok(())
    }

    fn load_content(&self, page: &str) {
        let _ = self.tx.send(Shown::LoadContent(page.to_owned()));
    }

    fn router_push(&self, url: &str) {
        let _ = self.tx.send(Shown::Push(url.to_owned()));
    }

    fn router_replace(&self, url: &str) {
        let _ = self.tx.send(Shown::Replace(url.to_owned()));
    }

    fn router_clear(&self) {
        let _ = self.tx.send(Shown::Clear);
    }

    fn show_toast(&self, toast: &Toast) {
        let _ = self.tx.send(Shown::Toast(toast.message.clone()));
    }

    fn show_dialog(&self, dialog: &Dialog) {
        let _ = self.tx.send(Shown::Dialog(*dialog));
    }

    fn publish_notification(&self, request: &NotificationRequest) {
        let _ = self.tx.send(Shown::Notification(request.clone()));
    }

    fn cancel_all_notifications(&self) {
        let _ = self.tx.send(Shown::CancelNotifications);
    }

    async fn default_net_bearers(&self) -> Result<Vec<NetBearType>, PlatformError> {
        Ok(self.bearers.lock().unwrap().clone())
    }
}

/// How the current version description callback answers
#[derive(Clone)]
pub enum DescriptionReply {
    Reply(Option<BusinessError>, Option<Vec<ComponentDescription>>),
    Never,
}

/// Calls that change the service's state
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Download(String, u8),
    ResumeDownload(String, u8),
    Upgrade(String),
    Cancel,
}

pub struct MockUpdater {
    pub delay: Mutex<Duration>,
    pub task_info: Mutex<Result<TaskInfo, BusinessError>>,
    pub check: Mutex<Result<CheckResult, BusinessError>>,
    pub new_version: Mutex<Result<NewVersionInfo, BusinessError>>,
    pub description: Mutex<DescriptionReply>,
    callbacks: Mutex<Vec<TaskCallback>>,
    calls: Sender<Call>,
}

impl MockUpdater {
    pub fn new() -> (Arc<Self>, Receiver<Call>) {
        let (calls, rx) = flume::unbounded();
        let updater = MockUpdater {
            delay: Mutex::new(Duration::ZERO),
            task_info: Mutex::new(Ok(task_info(UpdateState::Init, 0))),
            check: Mutex::new(Ok(CheckResult { is_exist_new_version: true, new_version_info: Some(new_version()) })),
            new_version: Mutex::new(Ok(new_version())),
            description: Mutex::new(DescriptionReply::Reply(None, Some(descriptions()))),
            callbacks: Mutex::new(vec![]),
            calls,
        };

        (Arc::new(updater), rx)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_status(&self, state: UpdateState) {
        *self.task_info.lock().unwrap() = Ok(task_info(state, 0));
    }

    pub fn listeners(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    /// Pushes a task event to every registered callback
    pub fn emit(&self, event_id: EventId, task_body: TaskBody) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        for callback in callbacks {
            callback(EventInfo { event_id, task_body: task_body.clone() });
        }
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl Updater for MockUpdater {
    async fn get_task_info(&self) -> Result<TaskInfo, BusinessError> {
        self.wait().await;
        self.task_info.lock().unwrap().clone()
    }

    async fn get_new_version_info(&self) -> Result<NewVersionInfo, BusinessError> {
        self.wait().await;
        self.new_version.lock().unwrap().clone()
    }

    async fn get_new_version_description(
        &self,
        _version_digest_info: &VersionDigestInfo,
        _options: &DescriptionOptions,
    ) -> Result<Vec<ComponentDescription>, BusinessError> {
        self.wait().await;
        Ok(descriptions())
    }

    fn get_current_version_description(&self, _options: &DescriptionOptions, callback: DescriptionCallback) {
        let reply = self.description.lock().unwrap().clone();
        match reply {
            DescriptionReply::Reply(err, data) => callback(err, data),
            // dropping the callback without calling it
            DescriptionReply::Never => {}
        }
    }

    async fn check_new_version(&self) -> Result<CheckResult, BusinessError> {
        self.wait().await;
        self.check.lock().unwrap().clone()
    }

    async fn get_current_version_info(&self) -> Result<CurrentVersionInfo, BusinessError> {
        self.wait().await;
        Ok(CurrentVersionInfo { os_version: "OpenHarmony 5.0.0.100".to_owned(), ..Default::default() })
    }

    async fn download(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &DownloadOptions,
    ) -> Result<(), BusinessError> {
        let _ = self.calls.send(Call::Download(version_digest_info.version_digest.clone(), options.allow_network));
        Ok(())
    }

    async fn resume_download(
        &self,
        version_digest_info: &VersionDigestInfo,
        options: &ResumeDownloadOptions,
    ) -> Result<(), BusinessError> {
        let _ = self.calls.send(Call::ResumeDownload(
            version_digest_info.version_digest.clone(),
            options.allow_network,
        ));
        Ok(())
    }

    async fn upgrade(
        &self,
        version_digest_info: &VersionDigestInfo,
        _options: &UpgradeOptions,
    ) -> Result<(), BusinessError> {
        let _ = self.calls.send(Call::Upgrade(version_digest_info.version_digest.clone()));
        Ok(())
    }

    fn cancel(&self) {
        let _ = self.calls.send(Call::Cancel);
    }

    fn on(&self, _info: &EventClassifyInfo, callback: TaskCallback) -> Result<(), BusinessError> {
        self.callbacks.lock().unwrap().push(callback);
        Ok(())
    }

    fn off(&self, _info: &EventClassifyInfo, callback: &TaskCallback) -> Result<(), BusinessError> {
        self.callbacks.lock().unwrap().retain(|c| !Arc::ptr_eq(c, callback));
        Ok(())
    }
}

/// Service that hands out the given updater, or refuses to
pub struct MockService(pub Option<Arc<MockUpdater>>);

impl UpdateService for MockService {
    fn get_online_updater(&self, _info: &UpgradeInfo) -> Result<Arc<dyn Updater>, BusinessError> {
        match &self.0 {
            Some(updater) => Ok(updater.clone()),
            None => Err(BusinessError::new(11500101, "service unavailable")),
        }
    }
}

pub const DIGEST: &str = "sha256-new";

pub fn new_version() -> NewVersionInfo {
    NewVersionInfo {
        version_digest_info: VersionDigestInfo { version_digest: DIGEST.to_owned() },
        version_components: vec![],
    }
}

pub fn descriptions() -> Vec<ComponentDescription> {
    vec![ComponentDescription {
        component_id: "system".to_owned(),
        description_info: DescriptionInfo { description_type: 0, content: "Bug fixes".to_owned() },
    }]
}

pub fn body(state: UpdateState, progress: u8, end_reason: Option<i64>) -> TaskBody {
    TaskBody {
        status: state.code(),
        progress,
        error_messages: end_reason
            .map(|error_code| vec![ErrorMessage { error_code, error_message: String::new() }])
            .unwrap_or_default(),
        ..Default::default()
    }
}

pub fn task_info(state: UpdateState, progress: u8) -> TaskInfo {
    TaskInfo { exist_task: state != UpdateState::Init, task_body: Some(body(state, progress, None)) }
}
