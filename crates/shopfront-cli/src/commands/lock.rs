use std::sync::Arc;

use shopfront_core::models::{Lock, LOCK_LEASE};
use shopfront_core::remote::HttpDocumentStore;
use shopfront_core::util::millis_to_datetime;
use shopfront_core::ItemLockManager;

use crate::cli::LockCommands;
use crate::commands::common::{format_timestamp, normalize_name, CliContext};
use crate::error::CliError;

pub async fn run_lock(context: &CliContext, command: LockCommands) -> Result<(), CliError> {
    let remote = HttpDocumentStore::new(&context.remote_config()?)?;
    let manager = ItemLockManager::new(Arc::new(remote));

    match command {
        LockCommands::Acquire {
            collection,
            item_id,
            json,
        } => {
            let (collection, item_id) = normalize_target(&collection, &item_id)?;
            let (owner_id, owner_name) = require_owner(context)?;
            let outcome = manager
                .try_acquire(&collection, &item_id, &owner_id, &owner_name)
                .await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.granted {
                println!("Lock granted on {collection}/{item_id}");
            } else {
                println!(
                    "{collection}/{item_id} is being edited by {}",
                    outcome.held_by.as_deref().unwrap_or("another user")
                );
            }
        }
        LockCommands::Release {
            collection,
            item_id,
        } => {
            let (collection, item_id) = normalize_target(&collection, &item_id)?;
            let (owner_id, _) = require_owner(context)?;
            if manager.release(&collection, &item_id, &owner_id).await? {
                println!("Released lock on {collection}/{item_id}");
            } else {
                println!("No lock held by this profile on {collection}/{item_id}");
            }
        }
        LockCommands::Show {
            collection,
            item_id,
            json,
        } => {
            let (collection, item_id) = normalize_target(&collection, &item_id)?;
            let holder = manager.holder(&collection, &item_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&holder)?);
            } else {
                println!("{}", format_holder_line(&collection, &item_id, holder.as_ref()));
            }
        }
    }
    Ok(())
}

fn normalize_target(collection: &str, item_id: &str) -> Result<(String, String), CliError> {
    let collection = normalize_name(collection).ok_or(CliError::EmptyCollection)?;
    let item_id = normalize_name(item_id).ok_or(CliError::EmptyItemId)?;
    Ok((collection, item_id))
}

fn require_owner(context: &CliContext) -> Result<(String, String), CliError> {
    context.owner().ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{}' has no owner id. Run `shopfront config init` first.",
            context.profile_name
        ))
    })
}

pub fn format_holder_line(collection: &str, item_id: &str, holder: Option<&Lock>) -> String {
    match holder {
        Some(lock) => {
            let acquired_at = millis_to_datetime(lock.acquired_at_ms);
            let lease = chrono::Duration::from_std(LOCK_LEASE).unwrap_or_default();
            let expires_at = acquired_at + lease;
            format!(
                "{collection}/{item_id} locked by {} since {} (expires {})",
                lock.owner_name,
                format_timestamp(acquired_at),
                format_timestamp(expires_at)
            )
        }
        None => format!("{collection}/{item_id} is not locked"),
    }
}
