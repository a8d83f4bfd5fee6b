use super::AssignmentManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(250);

/// Run [`AssignmentManager::scan`] on a fixed period until the task is
/// aborted. Scans run on the blocking pool since opening devices can stall.
pub fn spawn_scanner(manager: Arc<AssignmentManager>, period: Duration) -> JoinHandle<()> {
    info!("Scanning for physical devices every {:?}", period);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let manager = Arc::clone(&manager);
            match tokio::task::spawn_blocking(move || manager.scan()).await {
                Ok(report) if report.bound > 0 || report.failed > 0 => {
                    debug!("Scan bound {} and failed {} devices", report.bound, report.failed);
                }
                Ok(_) => {}
                Err(e) => warn!("Scan task failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::SimulatedBackend;

    #[tokio::test]
    async fn test_scanner_picks_up_hotplug() {
        let backend = SimulatedBackend::new();
        let manager = Arc::new(AssignmentManager::new(Arc::new(backend.clone()), 2));
        let task = spawn_scanner(Arc::clone(&manager), Duration::from_millis(10));

        backend.attach_standard("pad0");
        let mut bound = false;
        for _ in 0..100 {
            if !manager.assignments().is_empty() {
                bound = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(bound);
        assert_eq!(manager.free_slots(), vec![1]);
    }
}
