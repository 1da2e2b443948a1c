use std::time::Duration;

use tracing::{info, warn};

use localnews_api::auth::AppState;
use localnews_db::unix_now;

/// Periodically drops admin sessions past their `expires_at`.
pub async fn run_session_cleanup(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let st = state.clone();
        match tokio::task::spawn_blocking(move || st.db.purge_expired_sessions(unix_now())).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }
    }
}
