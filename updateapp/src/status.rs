use std::time::Duration;

use log::trace;

use crate::base::{clock, EventId, OtaStatus};

/// Statuses repeated within this window are duplicates
pub const STATUS_ALIVE_TIME: Duration = Duration::from_millis(1000);

/// Fingerprint of one status observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHolder {
    pub status: String,
    /// Time of observation, ms
    pub init_time: u64,
}

impl StatusHolder {
    /// Progress only counts for downloading and installing, so progress ticks
    /// in other states never make two fingerprints differ.
    pub fn new(status: &OtaStatus, event_id: Option<EventId>, init_time: u64) -> Self {
        let mut fingerprint = String::new();
        if let Some(state) = status.status {
            fingerprint.push_str(&state.code().to_string());
        }
        fingerprint.push('_');

        if status.status.map_or(false, |s| s.is_progress_bearing()) {
            fingerprint.push_str(&status.percent.to_string());
        }
        fingerprint.push('_');

        if let Some(end_reason) = &status.end_reason {
            fingerprint.push_str(end_reason);
        }
        if let Some(event_id) = event_id {
            fingerprint.push_str(&event_id.code().to_string());
        }

        Self { status: fingerprint, init_time }
    }
}

/// Remembers the last seen status to filter out rapid fire duplicates from the
/// update service. Only the most recent observation is kept.
#[derive(Debug)]
pub struct OtaStatusHolder {
    last: Option<StatusHolder>,
    alive_time: Duration,
}

impl Default for OtaStatusHolder {
    fn default() -> Self {
        Self::new(STATUS_ALIVE_TIME)
    }
}

impl OtaStatusHolder {
    pub fn new(alive_time: Duration) -> Self {
        Self { last: None, alive_time }
    }

    /// Compares `status` with the last observation and replaces it.
    ///
    /// Returns false only if the fingerprints match and less than the alive time
    /// passed since the last observation.
    pub fn is_status_changed_and_refresh(
        &mut self,
        status: &OtaStatus,
        event_id: Option<EventId>,
    ) -> bool {
        self.is_status_changed_and_refresh_at(status, event_id, clock())
    }

    /// Same as [`is_status_changed_and_refresh`](Self::is_status_changed_and_refresh)
    /// with an explicit observation time in ms
    pub fn is_status_changed_and_refresh_at(
        &mut self,
        status: &OtaStatus,
        event_id: Option<EventId>,
        now: u64,
    ) -> bool {
        let holder = StatusHolder::new(status, event_id, now);
        let alive_time = self.alive_time.as_millis() as u64;
        let changed = match &self.last {
            Some(last) => {
                now.saturating_sub(last.init_time) >= alive_time || holder.status != last.status
            }
            None => true,
        };

        trace!("status = {}, changed = {changed}", holder.status);
        self.last = Some(holder);
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::UpdateState;

    #[test]
    fn fingerprint_layout() {
        let status = OtaStatus::new(UpdateState::Downloading, 55).with_end_reason("-301");
        let holder = StatusHolder::new(&status, Some(EventId::DownloadUpdate), 0);
        assert_eq!(holder.status, format!("20_55_-301{}", EventId::DownloadUpdate.code()));

        let status = OtaStatus::new(UpdateState::CheckSuccess, 99);
        assert_eq!(StatusHolder::new(&status, None, 0).status, "12__");

        let status = OtaStatus { status: None, percent: 30, end_reason: None };
        assert_eq!(StatusHolder::new(&status, None, 0).status, "__");
    }

    #[test]
    fn first_observation_is_a_change() {
        let mut holder = OtaStatusHolder::default();
        let status = OtaStatus::new(UpdateState::Init, 0);
        assert!(holder.is_status_changed_and_refresh_at(&status, None, 10_000));
    }

    #[test]
    fn different_state_is_a_change() {
        let mut holder = OtaStatusHolder::default();
        let a = OtaStatus::new(UpdateState::CheckSuccess, 0);
        let b = OtaStatus::new(UpdateState::Downloading, 0);
        holder.is_status_changed_and_refresh_at(&a, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&b, None, 10_001));
    }

    #[test]
    fn repeat_within_window_is_a_duplicate() {
        let mut holder = OtaStatusHolder::default();
        let status = OtaStatus::new(UpdateState::DownloadSuccess, 100);
        holder.is_status_changed_and_refresh_at(&status, None, 10_000);
        assert!(!holder.is_status_changed_and_refresh_at(&status, None, 10_999));
    }

    #[test]
    fn repeat_after_window_is_a_change() {
        let mut holder = OtaStatusHolder::default();
        let status = OtaStatus::new(UpdateState::DownloadSuccess, 100);
        holder.is_status_changed_and_refresh_at(&status, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&status, None, 11_000));
    }

    #[test]
    fn window_is_measured_from_last_seen() {
        let mut holder = OtaStatusHolder::default();
        let status = OtaStatus::new(UpdateState::Upgrading, 0);
        assert!(holder.is_status_changed_and_refresh_at(&status, None, 10_000));
        assert!(!holder.is_status_changed_and_refresh_at(&status, None, 10_900));
        // 1800ms after the first, but only 900ms after the duplicate
        assert!(!holder.is_status_changed_and_refresh_at(&status, None, 11_800));
    }

    #[test]
    fn progress_counts_while_downloading() {
        let mut holder = OtaStatusHolder::default();
        let a = OtaStatus::new(UpdateState::Downloading, 10);
        let b = OtaStatus::new(UpdateState::Downloading, 55);
        holder.is_status_changed_and_refresh_at(&a, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&b, None, 10_200));
        assert!(!holder.is_status_changed_and_refresh_at(&b, None, 10_300));
    }

    #[test]
    fn progress_counts_while_installing() {
        let mut holder = OtaStatusHolder::default();
        let a = OtaStatus::new(UpdateState::Installing, 10);
        let b = OtaStatus::new(UpdateState::Installing, 11);
        holder.is_status_changed_and_refresh_at(&a, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&b, None, 10_010));
    }

    #[test]
    fn progress_is_ignored_in_other_states() {
        let mut holder = OtaStatusHolder::default();
        let a = OtaStatus::new(UpdateState::CheckSuccess, 0);
        let b = OtaStatus::new(UpdateState::CheckSuccess, 99);
        holder.is_status_changed_and_refresh_at(&a, None, 10_000);
        assert!(!holder.is_status_changed_and_refresh_at(&b, None, 10_050));
    }

    #[test]
    fn end_reason_and_event_are_part_of_fingerprint() {
        let mut holder = OtaStatusHolder::default();
        let a = OtaStatus::new(UpdateState::DownloadFailed, 0).with_end_reason("-301");
        let b = OtaStatus::new(UpdateState::DownloadFailed, 0).with_end_reason("-304");
        holder.is_status_changed_and_refresh_at(&a, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&b, None, 10_010));
        assert!(holder.is_status_changed_and_refresh_at(&b, Some(EventId::DownloadFail), 10_020));
        assert!(!holder.is_status_changed_and_refresh_at(&b, Some(EventId::DownloadFail), 10_030));
    }

    #[test]
    fn custom_alive_time() {
        let mut holder = OtaStatusHolder::new(Duration::from_millis(50));
        let status = OtaStatus::new(UpdateState::Upgrading, 0);
        holder.is_status_changed_and_refresh_at(&status, None, 10_000);
        assert!(holder.is_status_changed_and_refresh_at(&status, None, 10_050));
    }
}
