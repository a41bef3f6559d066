//! Upstream API health checks.

use crate::client::HttpTimelineApi;
use tracing::{debug, error};

/// Check that the upstream host is reachable and accepts our key.
pub async fn check_connection(api: &HttpTimelineApi) -> Result<(), String> {
    match api.probe().await {
        Ok(()) => {
            debug!("Upstream API connection healthy");
            Ok(())
        }
        Err(e) => {
            error!("Upstream API health check failed: {}", e);
            Err(e.to_string())
        }
    }
}
