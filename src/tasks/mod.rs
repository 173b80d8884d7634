//! Background scheduled tasks for the application.
//!
//! Call `spawn_all` once during startup to launch them.

use crate::services::EntitlementService;
use chrono::Utc;

const EXPIRY_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Spawn all background tasks.
///
/// Notes
/// - The sweep only keeps the stored `is_premium` flag tidy; the entitlement
///   gate checks the expiry itself and never depends on it.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(entitlement_service: EntitlementService) {
    // 会员过期检查（每小时）
    {
        let svc = entitlement_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.expire_stale(Utc::now()).await {
                    Ok(n) if n > 0 => log::info!("Expired premium grants cleared: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to clear expired premium grants: {e:?}"),
                }
                tokio::time::sleep(std::time::Duration::from_secs(EXPIRY_SWEEP_INTERVAL_SECS))
                    .await;
            }
        });
    }
}
