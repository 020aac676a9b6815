use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::{EventId, OtaStatus};

/// Request to start an ability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Want {
    pub bundle_name: String,
    pub ability_name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl Want {
    pub fn new<B: Into<String>, A: Into<String>>(bundle_name: B, ability_name: A) -> Self {
        Self { bundle_name: bundle_name.into(), ability_name: ability_name.into(), ..Default::default() }
    }

    pub fn with_uri<S: Into<String>>(mut self, uri: S) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_action<S: Into<String>>(mut self, action: S) -> Self {
        self.action = Some(action.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    pub window_mode: u8,
    pub display_id: u8,
}

/// Status that couldn't be shown because the main ability was in background
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParkedNotify {
    pub status: OtaStatus,
    pub event_id: Option<EventId>,
}

#[derive(Debug, Default)]
struct State {
    foreground: bool,
    ability_want: Option<Want>,
    current_page: Option<String>,
    new_page: Option<String>,
    parked: Option<ParkedNotify>,
    language: String,
}

/// Process wide state shared between abilities, dialogs and the coordinator.
/// Owned by [`UpdateApp`](crate::UpdateApp) and handed around by `Arc`.
#[derive(Debug, Default)]
pub struct AppContext {
    state: Mutex<State>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_foreground(&self) -> bool {
        self.state().foreground
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.state().foreground = foreground;
    }

    pub fn set_ability_want(&self, want: Want) {
        self.state().ability_want = Some(want);
    }

    pub fn ability_want(&self) -> Option<Want> {
        self.state().ability_want.clone()
    }

    pub fn set_current_page<S: Into<String>>(&self, page: S) {
        self.state().current_page = Some(page.into());
    }

    pub fn current_page(&self) -> Option<String> {
        self.state().current_page.clone()
    }

    /// Page requested while the main ability was busy or in background
    pub fn set_new_page(&self, page: Option<String>) {
        self.state().new_page = page;
    }

    pub fn new_page(&self) -> Option<String> {
        self.state().new_page.clone()
    }

    /// Takes the pending page if both the pending and current page are known.
    /// Returns the page only when it differs from the current one.
    pub fn take_route(&self) -> Option<String> {
        let mut state = self.state();
        if state.new_page.is_none() || state.current_page.is_none() {
            return None;
        }

        let new_page = state.new_page.take();
        if new_page == state.current_page {
            return None;
        }

        new_page
    }

    pub fn park_notify(&self, status: OtaStatus, event_id: Option<EventId>) {
        self.state().parked = Some(ParkedNotify { status, event_id });
    }

    pub fn take_parked_notify(&self) -> Option<ParkedNotify> {
        self.state().parked.take()
    }

    pub fn language(&self) -> String {
        self.state().language.clone()
    }

    /// Returns true if the language differs from the previous one
    pub fn update_language(&self, language: &str) -> bool {
        let mut state = self.state();
        if state.language == language {
            return false;
        }

        state.language = language.to_owned();
        true
    }
}
