//! Notification inspection and maintenance commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use notifyhub_core::config::AppConfig;
use notifyhub_core::error::AppError;
use notifyhub_core::types::id::{NotificationId, UserId};
use notifyhub_database::NotificationQuery;
use notifyhub_service::ListParams;

/// A command scoped to one recipient
#[derive(Debug, Args)]
pub struct RecipientArgs {
    /// Recipient user ID
    #[arg(long)]
    pub recipient: UserId,
}

/// Arguments for `list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Recipient user ID
    #[arg(long)]
    pub recipient: UserId,
    /// Only this type tag (e.g. `comment_on_post`)
    #[arg(long = "type")]
    pub type_tag: Option<String>,
    /// Only unread notifications
    #[arg(long)]
    pub unread: bool,
    /// Page number
    #[arg(long, default_value_t = 1)]
    pub page: u64,
    /// Page size (configured default when omitted)
    #[arg(long)]
    pub per_page: Option<u64>,
}

/// Arguments for `read-all`
#[derive(Debug, Args)]
pub struct ReadAllArgs {
    /// Recipient user ID
    #[arg(long)]
    pub recipient: UserId,
    /// Only this type tag
    #[arg(long = "type")]
    pub type_tag: Option<String>,
}

/// Arguments for `toggle`
#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Recipient user ID
    #[arg(long)]
    pub recipient: UserId,
    /// Notification ID
    #[arg(long)]
    pub id: NotificationId,
    /// Mark as unread instead of read
    #[arg(long)]
    pub unread: bool,
}

/// Arguments for `purge`
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Recipient user ID
    #[arg(long)]
    pub recipient: UserId,
    /// Skip confirmation
    #[arg(long)]
    pub force: bool,
}

/// Notification display row
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// Creation day
    day: String,
    /// Notification ID
    id: String,
    /// Type tag
    #[tabled(rename = "type")]
    kind: String,
    /// Target
    target: String,
    /// Number of actors
    actors: usize,
    /// Read state
    unread: String,
    /// Created at
    created: String,
}

/// Per-type count row
#[derive(Debug, Serialize, Tabled)]
struct CountRow {
    /// Type tag
    #[tabled(rename = "type")]
    kind: String,
    /// Unread notifications
    unread: u64,
    /// All notifications
    total: u64,
}

/// List a recipient's notifications, grouped by day
pub async fn list(args: &ListArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let service = super::create_service(config).await?;

    let params = ListParams {
        type_tag: args.type_tag.clone(),
        unread_only: args.unread,
        page: Some(args.page),
        per_page: args.per_page,
        ..ListParams::default()
    };

    let index = service.index(args.recipient, &params).await?;

    match format {
        OutputFormat::Json => output::print_item(&index, format),
        OutputFormat::Table => {
            let rows: Vec<NotificationRow> = index
                .days
                .iter()
                .flat_map(|group| {
                    group.notifications.iter().map(move |n| NotificationRow {
                        day: group.day.to_string(),
                        id: n.id.to_string(),
                        kind: n.type_tag().to_string(),
                        target: n.target.to_string(),
                        actors: n.actors.count(),
                        unread: if n.unread { "●" } else { "" }.to_string(),
                        created: n.created_at.format("%H:%M:%S").to_string(),
                    })
                })
                .collect();

            output::print_list(&rows, format);
            let page = &index.notifications;
            println!();
            output::print_kv(
                "Page",
                &format!("{} of {} ({} total)", page.page, page.total_pages.max(1), page.total_items),
            );
            output::print_kv("Unread", &index.unread_count.to_string());
        }
    }

    Ok(())
}

/// Show unread and total counts for every type
pub async fn counts(
    args: &RecipientArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config).await?;

    let unread = service
        .group_by_type(args.recipient, &NotificationQuery::new().unread_only(true))
        .await?;
    let total = service
        .group_by_type(args.recipient, &NotificationQuery::new())
        .await?;

    let rows: Vec<CountRow> = total
        .iter()
        .map(|(tag, total)| CountRow {
            kind: (*tag).to_string(),
            unread: unread.get(tag).copied().unwrap_or(0),
            total: *total,
        })
        .collect();

    output::print_list(&rows, format);
    Ok(())
}

/// Mark every unread notification (optionally of one type) as read
pub async fn read_all(
    args: &ReadAllArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config).await?;
    let outcome = service
        .mark_all_read(args.recipient, args.type_tag.as_deref())
        .await?;

    match format {
        OutputFormat::Json => output::print_item(&outcome, format),
        OutputFormat::Table => {
            output::print_success(&format!("Marked {} notifications as read", outcome.marked));
            if outcome.remaining_unread > 0 {
                output::print_kv("Still unread", &outcome.remaining_unread.to_string());
            }
        }
    }
    Ok(())
}

/// Set one notification's read state
pub async fn toggle(
    args: &ToggleArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let service = super::create_service(config).await?;

    match service
        .toggle_read_state(args.recipient, args.id, args.unread)
        .await?
    {
        Some(change) => output::print_item(&change, format),
        None => output::print_warning(&format!(
            "Notification {} not found for recipient {}",
            args.id, args.recipient
        )),
    }
    Ok(())
}

/// Delete every notification of a recipient
pub async fn purge(args: &PurgeArgs, config: &AppConfig) -> Result<(), AppError> {
    if !args.force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete ALL notifications of recipient {}?",
                args.recipient
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let service = super::create_service(config).await?;
    let removed = service.purge_recipient(args.recipient).await?;
    output::print_success(&format!("Deleted {} notifications", removed));
    Ok(())
}
