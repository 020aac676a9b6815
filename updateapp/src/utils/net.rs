use log::info;

use crate::base::{NetBearType, Platform};

/// Whether the default network has any bearer
pub async fn is_net_available(platform: &dyn Platform) -> bool {
    match platform.default_net_bearers().await {
        Ok(bearers) => !bearers.is_empty(),
        Err(e) => {
            info!("getNetCapabilities err {e}");
            false
        }
    }
}

/// Whether the default network runs over cellular only
pub async fn is_cellular_network(platform: &dyn Platform) -> bool {
    match platform.default_net_bearers().await {
        Ok(bearers) => bearers == [NetBearType::Cellular],
        Err(e) => {
            info!("getNetCapabilities err {e}");
            false
        }
    }
}
