// ABOUTME: Button presses on confirmation prompts: resolve, apply or abort, then report on the prompt
// ABOUTME: A confirmed reboot holds the event loop for the staged delay before calling the rebooter

use anyhow::Result;
use std::time::Duration;

use smarthomebot_core::confirm::{Pending, PendingAction, Resolution};
use smarthomebot_core::metrics;
use smarthomebot_core::registry::RoleOp;
use smarthomebot_core::traits::IncomingCallback;

use super::App;

pub const NOT_YOURS: &str = "This confirmation belongs to someone else.";
pub const EXPIRED: &str = "This confirmation has expired.";
pub const ABORTED: &str = "Aborted: nothing was changed.";
pub const NOT_SAVED: &str = "Sorry, the change could not be saved.";

pub async fn handle_callback(app: &App, cb: IncomingCallback) -> Result<()> {
    let resolution = app
        .confirmations()?
        .resolve(cb.chat_id, cb.sender.id, &cb.data);

    tracing::debug!(
        chat_id = cb.chat_id,
        presser = cb.sender.id,
        outcome = resolution.outcome_label(),
        "Callback resolved"
    );

    match resolution {
        Resolution::Ignored => app.platform.answer_callback(&cb.callback_id, None).await,
        Resolution::NotYours => {
            metrics::record_confirmation("not_yours");
            app.platform
                .answer_callback(&cb.callback_id, Some(NOT_YOURS))
                .await
        }
        Resolution::Expired => {
            metrics::record_confirmation("expired");
            app.platform
                .answer_callback(&cb.callback_id, Some(EXPIRED))
                .await?;
            if let Some(message_id) = cb.message_id {
                if let Err(e) = app.platform.edit_prompt(cb.chat_id, message_id, EXPIRED).await {
                    tracing::debug!(error = %e, "Failed to close expired prompt");
                }
            }
            Ok(())
        }
        Resolution::Abort(pending) => {
            metrics::record_confirmation("aborted");
            app.platform.answer_callback(&cb.callback_id, None).await?;
            tracing::info!(
                action = pending.action.name(),
                issuer = pending.issuer,
                "Confirmation aborted"
            );
            report(app, &cb, &pending, ABORTED).await
        }
        Resolution::Apply(pending) => {
            app.platform.answer_callback(&cb.callback_id, None).await?;
            match pending.action {
                PendingAction::Role(op) => apply_role(app, &cb, &pending, &op).await,
                PendingAction::Reboot { delay_secs } => {
                    reboot(app, &cb, &pending, delay_secs).await
                }
            }
        }
    }
}

async fn apply_role(
    app: &App,
    cb: &IncomingCallback,
    pending: &Pending,
    op: &RoleOp,
) -> Result<()> {
    let text = match app.state.apply_role(op).await {
        Ok(Ok(())) => {
            metrics::record_confirmation("applied");
            op.success_text()
        }
        Ok(Err(reason)) => {
            metrics::record_confirmation("rejected");
            format!("Rejected: {}.", reason)
        }
        Err(e) => {
            metrics::record_confirmation("failed");
            tracing::error!(error = %e, op = ?op, "Failed to persist role change");
            NOT_SAVED.to_string()
        }
    };
    report(app, cb, pending, &text).await
}

async fn reboot(
    app: &App,
    cb: &IncomingCallback,
    pending: &Pending,
    delay_secs: u64,
) -> Result<()> {
    tracing::warn!(issuer = pending.issuer, delay_secs, "Reboot confirmed");
    report(
        app,
        cb,
        pending,
        &format!("Rebooting in {} seconds.", delay_secs),
    )
    .await?;

    tokio::time::sleep(Duration::from_secs(delay_secs)).await;

    match app.collaborators.rebooter.reboot().await {
        Ok(()) => {
            metrics::record_confirmation("applied");
            Ok(())
        }
        Err(e) => {
            metrics::record_confirmation("failed");
            tracing::error!(error = %e, "Reboot failed");
            app.reply(cb.chat_id, format!("Reboot failed: {}", e)).await
        }
    }
}

/// Append the outcome to the prompt and drop its buttons; send it instead when
/// the prompt cannot be edited
async fn report(app: &App, cb: &IncomingCallback, pending: &Pending, outcome: &str) -> Result<()> {
    if let Some(message_id) = cb.message_id {
        let text = format!("{}\n\n{}", pending.action.prompt_text(), outcome);
        match app.platform.edit_prompt(cb.chat_id, message_id, &text).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, message_id, "Failed to edit prompt, sending instead")
            }
        }
    }
    app.reply(cb.chat_id, outcome).await
}
