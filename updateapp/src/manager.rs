//! Client of the platform update service.
//!
//! Every query is raced against a timer by [`with_timeout`] and resolves to an
//! [`UpgradeData`] envelope, so callers never see a raw service error and never wait
//! past the configured bound. The query itself runs in a detached task: when the
//! timer wins, the task is abandoned rather than cancelled and whatever it produces
//! later is dropped.
//!
//! ```text
//!   caller ──query()──► with_timeout ──spawn──► Updater::*()
//!                           │                       │
//!                           ├── timer fires ────────┼──► UpgradeData { TimeOut }
//!                           │                       │
//!                           └── call settles ◄──────┘──► UpgradeData { Ok | Error }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::base::updater::{
    CheckResult, ComponentDescription, CurrentVersionInfo, DescriptionFormat, DescriptionOptions,
    DownloadOptions, EventClassifyInfo, NewVersionInfo, ResumeDownloadOptions, TaskCallback,
    UpgradeInfo, UpgradeOptions, VersionDigestInfo,
};
use crate::base::{
    BusinessError, ErrCode, OtaStatus, UpgradeCallResult, UpgradeData, Updater, UpdateService,
};
use crate::config::{Config, DescriptionErrorPolicy};

/// Default bound on a query
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30000);

/// Races `call` against a timer of length `duration`.
///
/// `call` either fails synchronously, in which case the envelope is `Error` right
/// away and no timer is started, or hands back the future to await. Exactly one
/// envelope is produced: whichever of the call and the timer settles first.
pub async fn with_timeout<T, F, Fut>(duration: Duration, call: F) -> UpgradeData<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<Fut, BusinessError>,
    Fut: Future<Output = UpgradeData<T>> + Send + 'static,
{
    let operation = match call() {
        Ok(operation) => operation,
        Err(e) => {
            error!("error: {e}");
            return UpgradeData::error(Some(e));
        }
    };

    let handle = tokio::spawn(operation);
    match timeout(duration, handle).await {
        Ok(Ok(data)) => data,
        Ok(Err(e)) => {
            error!("err: call aborted: {e}");
            UpgradeData::error(None)
        }
        Err(_) => {
            warn!("call timed out after {}ms", duration.as_millis());
            UpgradeData::time_out()
        }
    }
}

fn no_updater() -> BusinessError {
    BusinessError::new(-1, "online updater unavailable")
}

/// Wraps the online updater with timeouts and error normalization
pub struct UpdateManager {
    updater: Option<Arc<dyn Updater>>,
    timeout: Duration,
    description_policy: DescriptionErrorPolicy,
}

impl UpdateManager {
    /// Asks the update service for an online updater. Failing to get one is logged,
    /// every later call then resolves to `Error`.
    pub fn new(service: &dyn UpdateService, config: &Config) -> Self {
        let info = UpgradeInfo::new(config.sub_type, Some(config.package_name.as_str()));
        let updater = match service.get_online_updater(&info) {
            Ok(updater) => Some(updater),
            Err(e) => {
                error!("getOnlineUpdater fail {:?} {}", e.code, e.message);
                None
            }
        };

        Self {
            updater,
            timeout: config.call_timeout,
            description_policy: config.description_error_policy,
        }
    }

    pub fn with_updater(updater: Arc<dyn Updater>) -> Self {
        Self {
            updater: Some(updater),
            timeout: DEFAULT_TIMEOUT,
            description_policy: DescriptionErrorPolicy::Attach,
        }
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_description_policy(mut self, policy: DescriptionErrorPolicy) -> Self {
        self.description_policy = policy;
        self
    }

    fn updater(&self) -> Result<Arc<dyn Updater>, BusinessError> {
        self.updater.clone().ok_or_else(no_updater)
    }

    /// Registers `callback` for task events
    pub fn on(&self, callback: TaskCallback) {
        let Some(updater) = &self.updater else {
            error!("otaUpdater on fail: no updater");
            return;
        };

        if let Err(e) = updater.on(&EventClassifyInfo::task(), callback) {
            error!("otaUpdater on fail {:?} {}", e.code, e.message);
        }
    }

    /// Unregisters a callback previously passed to [`on`](Self::on)
    pub fn off(&self, callback: &TaskCallback) {
        let Some(updater) = &self.updater else {
            error!("otaUpdater off fail: no updater");
            return;
        };

        if let Err(e) = updater.off(&EventClassifyInfo::task(), callback) {
            error!("otaUpdater off fail {:?} {}", e.code, e.message);
        }
    }

    /// Status of the upgrade task, `Init` when there is no task
    pub async fn get_ota_status(&self) -> UpgradeData<OtaStatus> {
        let updater = self.updater();
        with_timeout(self.timeout, move || {
            let updater = updater?;
            Ok(async move {
                match updater.get_task_info().await {
                    Ok(info) => {
                        debug!("getOtaStatus result is {info:?}");
                        UpgradeData::ok(info.ota_status())
                    }
                    Err(e) => {
                        error!("getOtaStatus error is {e}");
                        UpgradeData::error(Some(e))
                    }
                }
            })
        })
        .await
    }

    /// New version info stored by the update service
    pub async fn get_new_version(&self) -> UpgradeData<NewVersionInfo> {
        let updater = self.updater();
        with_timeout(self.timeout, move || {
            let updater = updater?;
            Ok(async move {
                match updater.get_new_version_info().await {
                    Ok(info) => {
                        debug!("getNewVersion result: {info:?}");
                        UpgradeData::ok(info)
                    }
                    Err(e) => {
                        error!("getNewVersion error: {e}");
                        UpgradeData::error(Some(e))
                    }
                }
            })
        })
        .await
    }

    pub async fn get_new_version_description(
        &self,
        version_digest: &str,
        format: DescriptionFormat,
        language: &str,
    ) -> UpgradeData<Vec<ComponentDescription>> {
        let updater = self.updater();
        let digest = VersionDigestInfo { version_digest: version_digest.to_owned() };
        let options = DescriptionOptions { format, language: language.to_owned() };
        with_timeout(self.timeout, move || {
            let updater = updater?;
            Ok(async move {
                match updater.get_new_version_description(&digest, &options).await {
                    Ok(descriptions) => {
                        debug!("getNewVersionDescription result: {descriptions:?}");
                        UpgradeData::ok(descriptions)
                    }
                    Err(e) => {
                        error!("getNewVersionDescription err: {e}");
                        UpgradeData::error(Some(e))
                    }
                }
            })
        })
        .await
    }

    /// Changelog of the running version. The service answers through a callback,
    /// which is bridged into the envelope through a one shot channel.
    pub async fn get_current_version_description(
        &self,
        format: DescriptionFormat,
        language: &str,
    ) -> UpgradeData<Vec<ComponentDescription>> {
        let updater = self.updater();
        let options = DescriptionOptions { format, language: language.to_owned() };
        let policy = self.description_policy;
        with_timeout(self.timeout, move || {
            let updater = updater?;
            let (tx, rx) = flume::bounded(1);
            updater.get_current_version_description(
                &options,
                Box::new(move |err, result| {
                    let _ = tx.send((err, result));
                }),
            );

            Ok(async move {
                let Ok((err, result)) = rx.recv_async().await else {
                    error!("getCurrentVersionDescription callback dropped");
                    return UpgradeData::error(None);
                };
                debug!("getCurrentVersionDescription result: {result:?}");
                describe_current_version(err, result, policy)
            })
        })
        .await
    }

    /// Asks the server for a new version. A successful check that finds no new
    /// version is reported as `Error`, with the check result kept in `data`.
    pub async fn check_new_version(&self) -> UpgradeData<CheckResult> {
        let updater = self.updater();
        with_timeout(self.timeout, move || {
            let updater = updater?;
            Ok(async move {
                match updater.check_new_version().await {
                    Ok(result) => {
                        info!("checkNewVersion result: {result:?}");
                        let exists = result.is_exist_new_version && result.new_version_info.is_some();
                        let mut data = UpgradeData::ok(result);
                        if !exists {
                            data.call_result = UpgradeCallResult::Error;
                        }
                        data
                    }
                    Err(e) => {
                        error!("checkNewVersion err: {e}");
                        UpgradeData::error(Some(e))
                    }
                }
            })
        })
        .await
    }

    pub async fn get_current_version_info(&self) -> UpgradeData<CurrentVersionInfo> {
        let updater = self.updater();
        with_timeout(self.timeout, move || {
            let updater = updater?;
            Ok(async move {
                match updater.get_current_version_info().await {
                    Ok(info) => {
                        debug!("getCurrentVersionInfo result: {info:?}");
                        UpgradeData::ok(info)
                    }
                    Err(e) => {
                        error!("getCurrentVersionInfo err: {e}");
                        UpgradeData::error(Some(e))
                    }
                }
            })
        })
        .await
    }

    pub async fn upgrade(&self, version_digest: &str, order: u8) -> Result<(), BusinessError> {
        let updater = self.updater()?;
        let digest = VersionDigestInfo { version_digest: version_digest.to_owned() };
        updater.upgrade(&digest, &UpgradeOptions { order }).await.map_err(|e| {
            error!("upgrade err: {e}");
            e
        })
    }

    pub async fn download(
        &self,
        version_digest: &str,
        allow_network: u8,
        order: u8,
    ) -> Result<(), BusinessError> {
        let updater = self.updater()?;
        let digest = VersionDigestInfo { version_digest: version_digest.to_owned() };
        match updater.download(&digest, &DownloadOptions { allow_network, order }).await {
            Ok(()) => {
                info!("download succeeded.");
                Ok(())
            }
            Err(e) => {
                error!("download err: {e}");
                Err(e)
            }
        }
    }

    pub async fn resume_download(
        &self,
        version_digest: &str,
        allow_network: u8,
    ) -> Result<(), BusinessError> {
        let updater = self.updater()?;
        let digest = VersionDigestInfo { version_digest: version_digest.to_owned() };
        match updater.resume_download(&digest, &ResumeDownloadOptions { allow_network }).await {
            Ok(()) => {
                info!("resumeDownload succeeded.");
                Ok(())
            }
            Err(e) => {
                error!("resumeDownload err: {e}");
                Err(e)
            }
        }
    }

    /// Fire and forget
    pub fn cancel(&self) {
        match &self.updater {
            Some(updater) => updater.cancel(),
            None => error!("cancel fail: no updater"),
        }
    }
}

// The callback may carry an error next to valid data, the call only counts as
// failed when there is no data at all.
fn describe_current_version(
    err: Option<BusinessError>,
    result: Option<Vec<ComponentDescription>>,
    policy: DescriptionErrorPolicy,
) -> UpgradeData<Vec<ComponentDescription>> {
    let failed = result.is_none() && err.is_some();
    let codes = BusinessError {
        data: err
            .as_ref()
            .and_then(BusinessError::error_code)
            .map(|error_code| vec![ErrCode { error_code }])
            .unwrap_or_default(),
        ..Default::default()
    };

    if failed {
        error!("getCurrentVersionDescription error is {err:?}");
    }

    let error = match policy {
        DescriptionErrorPolicy::Attach => Some(codes),
        DescriptionErrorPolicy::OnFailureOnly if failed => Some(codes),
        DescriptionErrorPolicy::OnFailureOnly => None,
    };

    let call_result = if failed {
        UpgradeCallResult::Error
    } else {
        UpgradeCallResult::Ok
    };

    UpgradeData { call_result, data: result, error }
}

#[cfg(test)]
mod test {
    use super::*;

    fn description() -> Vec<ComponentDescription> {
        vec![ComponentDescription {
            component_id: "system".to_owned(),
            description_info: crate::base::updater::DescriptionInfo {
                description_type: 0,
                content: "Fixes".to_owned(),
            },
        }]
    }

    #[test]
    fn attach_keeps_error_next_to_data() {
        let err = BusinessError::new(1, "partial").with_error_code(-409);
        let data = describe_current_version(Some(err), Some(description()), DescriptionErrorPolicy::Attach);
        assert_eq!(data.call_result, UpgradeCallResult::Ok);
        assert_eq!(data.data, Some(description()));
        assert_eq!(data.error.unwrap().error_code(), Some(-409));
    }

    #[test]
    fn attach_without_error_has_empty_codes() {
        let data = describe_current_version(None, Some(description()), DescriptionErrorPolicy::Attach);
        assert_eq!(data.call_result, UpgradeCallResult::Ok);
        assert_eq!(data.error, Some(BusinessError::default()));
    }

    #[test]
    fn on_failure_only_drops_error_on_success() {
        let err = BusinessError::new(1, "partial").with_error_code(-409);
        let data =
            describe_current_version(Some(err), Some(description()), DescriptionErrorPolicy::OnFailureOnly);
        assert_eq!(data.call_result, UpgradeCallResult::Ok);
        assert!(data.error.is_none());
    }

    #[test]
    fn error_without_data_fails() {
        let err = BusinessError::new(1, "fail").with_error_code(-1);
        for policy in [DescriptionErrorPolicy::Attach, DescriptionErrorPolicy::OnFailureOnly] {
            let data = describe_current_version(Some(err.clone()), None, policy);
            assert_eq!(data.call_result, UpgradeCallResult::Error);
            assert_eq!(data.error.unwrap().error_code(), Some(-1));
        }
    }

    #[test]
    fn neither_error_nor_data_is_ok() {
        let data = describe_current_version(None, None, DescriptionErrorPolicy::OnFailureOnly);
        assert_eq!(data.call_result, UpgradeCallResult::Ok);
        assert!(data.data.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_wins_over_slow_call() {
        let data: UpgradeData<u8> = with_timeout(Duration::from_millis(100), || {
            Ok(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                UpgradeData::ok(1)
            })
        })
        .await;
        assert_eq!(data, UpgradeData::time_out());
    }

    #[tokio::test(start_paused = true)]
    async fn call_wins_over_timer() {
        let data = with_timeout(Duration::from_millis(100), || {
            Ok(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                UpgradeData::ok(7u8)
            })
        })
        .await;
        assert_eq!(data, UpgradeData::ok(7));
    }

    #[tokio::test]
    async fn synchronous_failure_skips_timer() {
        let start = tokio::time::Instant::now();
        let data: UpgradeData<u8> = with_timeout(Duration::from_secs(30), || {
            Err::<std::future::Ready<UpgradeData<u8>>, _>(BusinessError::new(-1, "boom"))
        })
        .await;
        assert_eq!(data.call_result, UpgradeCallResult::Error);
        assert_eq!(data.error.unwrap().message, "boom");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn panicking_call_is_an_error() {
        let data: UpgradeData<u8> = with_timeout(Duration::from_secs(1), || {
            Ok(async {
                let response: Option<UpgradeData<u8>> = None;
                response.expect("service crashed")
            })
        })
        .await;
        assert_eq!(data.call_result, UpgradeCallResult::Error);
    }
}
