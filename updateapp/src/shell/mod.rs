//! Presentation shells around the core: abilities, dialogs, notifications, pages
//! and toasts. Everything visible goes through [`Platform`](crate::base::Platform).

use crate::base::StartOptions;

pub mod ability;
pub mod dialog;
pub mod notify;
pub mod router;
pub mod toast;

pub use ability::{MainAbility, OtaWantHandler, ServiceExtAbility, WantHandler};
pub use dialog::DialogUtils;
pub use notify::NotificationManager;
pub use router::RouterUtils;
pub use toast::ToastUtils;

/// Window options for abilities started from notifications and dialogs
pub const START_OPTIONS: StartOptions = StartOptions { window_mode: 0, display_id: 2 };
