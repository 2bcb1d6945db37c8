//! Periodic liveness sweep: ages out devices that stop heartbeating.
//!
//! Each tick costs every device one unit of budget; a device pinging at
//! least once per [`crate::registry::LIVENESS_BUDGET`] ticks is never
//! evicted.

use std::time::Duration;

use crate::registry::DeviceRegistry;

pub async fn run(registry: DeviceRegistry, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        registry.decrement_all().await;
        let devices = registry.count().await;
        tracing::debug!(devices, "sweep tick");
    }
}
