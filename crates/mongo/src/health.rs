//! Document store health checks.

use crate::client::MongoClient;
use tracing::{debug, error};

/// Check document store connection health.
pub async fn check_connection(client: &MongoClient) -> Result<(), String> {
    match client.ping().await {
        Ok(()) => {
            debug!("Document store connection healthy");
            Ok(())
        }
        Err(e) => {
            error!("Document store health check failed: {}", e);
            Err(e.to_string())
        }
    }
}
