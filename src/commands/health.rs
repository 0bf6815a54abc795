//! Store connectivity check.

use serde::Serialize;

use crate::output::{self, OutputFormat};
use notifyhub_core::config::AppConfig;
use notifyhub_core::error::AppError;

#[derive(Debug, Serialize)]
struct HealthReport {
    database: &'static str,
    version: &'static str,
}

/// Execute the health command
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::create_service(config).await?;
    let healthy = service.health_check().await?;

    let report = HealthReport {
        database: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
    };
    output::print_item(&report, format);

    if healthy {
        Ok(())
    } else {
        Err(AppError::service_unavailable("Database health check failed"))
    }
}
