use std::sync::Arc;

use log::info;

use crate::base::{Platform, Toast};
use crate::config::ToastConfig;

pub struct ToastUtils {
    platform: Arc<dyn Platform>,
    config: ToastConfig,
}

impl ToastUtils {
    pub fn new(platform: Arc<dyn Platform>, config: ToastConfig) -> Self {
        Self { platform, config }
    }

    pub fn show_toast(&self, message: &str) {
        info!("start showToast");
        self.platform.show_toast(&Toast {
            message: message.to_owned(),
            duration: self.config.duration,
            bottom: self.config.bottom.clone(),
        });
    }
}
