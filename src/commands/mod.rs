//! CLI command definitions and dispatch.

pub mod health;
pub mod migrate;
pub mod notification;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use notifyhub_core::config::AppConfig;
use notifyhub_core::error::AppError;
use notifyhub_database::{DatabasePool, PgNotificationStore};
use notifyhub_service::{LogMailer, NotificationService};

/// NotifyHub: aggregating social notifications
#[derive(Debug, Parser)]
#[command(name = "notifyhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// List a recipient's notifications
    List(notification::ListArgs),
    /// Unread and total counts per notification type
    Counts(notification::RecipientArgs),
    /// Mark all unread notifications as read
    ReadAll(notification::ReadAllArgs),
    /// Set the read state of one notification
    Toggle(notification::ToggleArgs),
    /// Delete every notification of a recipient
    Purge(notification::PurgeArgs),
    /// Check database connectivity
    Health,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::List(args) => notification::list(args, config, self.format).await,
            Commands::Counts(args) => notification::counts(args, config, self.format).await,
            Commands::ReadAll(args) => notification::read_all(args, config, self.format).await,
            Commands::Toggle(args) => notification::toggle(args, config, self.format).await,
            Commands::Purge(args) => notification::purge(args, config).await,
            Commands::Health => health::execute(config, self.format).await,
        }
    }
}

/// Helper: create database pool from config
pub async fn create_db_pool(config: &AppConfig) -> Result<sqlx::PgPool, AppError> {
    let pool = DatabasePool::connect(&config.database).await?;
    Ok(pool.into_pool())
}

/// Helper: wire the notification service against PostgreSQL
pub async fn create_service(config: &AppConfig) -> Result<NotificationService, AppError> {
    let pool = create_db_pool(config).await?;
    Ok(NotificationService::new(
        Arc::new(PgNotificationStore::new(pool)),
        Arc::new(LogMailer),
        config.notifications.clone(),
    ))
}
