//! Object store health checks.

use crate::writer::S3ObjectStore;
use tracing::{debug, error};

/// Check that the destination bucket is reachable.
pub async fn check_connection(store: &S3ObjectStore) -> Result<(), String> {
    match store.head_bucket().await {
        Ok(()) => {
            debug!("Object store connection healthy");
            Ok(())
        }
        Err(e) => {
            error!("Object store health check failed: {}", e);
            Err(e.to_string())
        }
    }
}
