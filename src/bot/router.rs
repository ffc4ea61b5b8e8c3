// ABOUTME: Inbound message routing: chat filter, banned and not-allowed senders, then the command table
// ABOUTME: Only /join reaches the handlers for senders without access

use anyhow::Result;

use smarthomebot_core::commands::{lookup, parse_message, ParseError, ParseResult, Role};
use smarthomebot_core::metrics;
use smarthomebot_core::traits::IncomingMessage;

use super::{handlers, App};

pub const NOT_UNDERSTOOD: &str =
    "Sorry, I can't understand that. Type /help to list all available commands.";
pub const NOT_ALLOWED: &str =
    "Sorry, you are not allowed to use this bot. Send /join to ask the admins for access.";
pub const BANNED: &str = "Sorry, you are banned from using this bot.";

pub async fn handle_message(app: &App, msg: IncomingMessage) -> Result<()> {
    if !msg.is_direct && !app.state.is_chat_allowed(msg.chat_id).await {
        tracing::debug!(chat_id = msg.chat_id, "Ignoring message from chat not in allowlist");
        return Ok(());
    }

    let parsed = parse_message(&msg.body, app.platform.bot_username());
    let sender = msg.sender.id;
    let roles = app.state.roles().await;

    if roles.is_banned(sender) || !roles.is_allowed(sender) {
        return not_allowed(app, &msg, parsed, roles.is_banned(sender)).await;
    }

    let command = match parsed {
        Err(e) => return app.reply(msg.chat_id, e.to_string()).await,
        Ok(ParseResult::Ignore) => return Ok(()),
        Ok(ParseResult::Message(_)) => return app.reply(msg.chat_id, NOT_UNDERSTOOD).await,
        Ok(ParseResult::Command(command)) => command,
    };

    let Some(spec) = lookup(&command.name) else {
        return app
            .reply(
                msg.chat_id,
                format!(
                    "Sorry, /{} is not a real command. Type /help to list all available commands.",
                    command.name
                ),
            )
            .await;
    };

    if spec.role == Role::Admin && !roles.is_admin(sender) {
        metrics::record_rejection("not_admin");
        return app
            .reply(
                msg.chat_id,
                format!("Sorry, /{} is reserved for admins.", spec.name),
            )
            .await;
    }

    let argument = match spec.check_argument(command.argument()) {
        Ok(argument) => argument,
        Err(usage) => return app.reply(msg.chat_id, usage).await,
    };

    metrics::record_command(spec.name);
    tracing::info!(
        platform = app.platform.platform_id(),
        event_id = %msg.event_id,
        command = spec.name,
        sender,
        chat_id = msg.chat_id,
        "Handling command"
    );
    handlers::run(app, &msg, spec, argument).await
}

/// Banned or not-allowed senders: /join is honored, anything else gets a hint.
/// Not-allowed senders are remembered as chat members.
async fn not_allowed(
    app: &App,
    msg: &IncomingMessage,
    parsed: Result<ParseResult, ParseError>,
    banned: bool,
) -> Result<()> {
    if matches!(parsed, Ok(ParseResult::Ignore)) {
        return Ok(());
    }

    if !banned {
        match app.state.record_chat_member(msg.sender.id).await {
            Ok(true) => tracing::info!(user = msg.sender.id, "Recorded new chat member"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "Failed to persist chat member"),
        }
    }

    let wants_join = matches!(&parsed, Ok(ParseResult::Command(cmd)) if cmd.name == "join");
    if wants_join {
        metrics::record_command("join");
        return handlers::join(app, msg).await;
    }

    if banned {
        metrics::record_rejection("banned");
        tracing::info!(sender = msg.sender.id, chat_id = msg.chat_id, "Message from banned user");
        return app.reply(msg.chat_id, BANNED).await;
    }

    metrics::record_rejection("not_allowed");
    app.reply(msg.chat_id, NOT_ALLOWED).await
}
