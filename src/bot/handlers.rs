// ABOUTME: Command handlers: listings, time, timers and alarms, version, stats, and staging of confirmations
// ABOUTME: Handlers run after routing has checked access, role and argument shape

use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeSet;

use smarthomebot_core::commands::{command_list, Argument, CommandKind, CommandSpec, Role};
use smarthomebot_core::confirm::PendingAction;
use smarthomebot_core::registry::{Rejection, RoleOp};
use smarthomebot_core::system::compare_versions;
use smarthomebot_core::timers::{describe_pending, parse_alarm, parse_timer, TimerKind, TimerRecord};
use smarthomebot_core::traits::{IncomingMessage, MessageContent, UserId};
use smarthomebot_core::utils::{human_join, markdown_to_telegram_html};

use super::router::BANNED;
use super::App;

/// Help documentation loaded at compile time
const HELP_MD: &str = include_str!("../../docs/HELP.md");

pub const START_TEXT: &str = "SmartHomeBot is running. Type /help to list all available commands.";

/// Run the handler for a routed command
pub async fn run(
    app: &App,
    msg: &IncomingMessage,
    spec: &CommandSpec,
    argument: Argument,
) -> Result<()> {
    let chat_id = msg.chat_id;
    match spec.kind {
        CommandKind::Start => app.reply(chat_id, START_TEXT).await,
        CommandKind::Help => help(app, msg).await,
        CommandKind::Users => {
            let users = app.state.read(|s| s.users.allowed.clone()).await;
            let text =
                listing(app, &users, "Allowed users", "There are no allowed users yet.").await;
            app.reply(chat_id, text).await
        }
        CommandKind::Admins => {
            let admins = app
                .state
                .read(|s| {
                    let mut admins = s.users.admins.clone();
                    admins.insert(s.users.owner);
                    admins
                })
                .await;
            let text = listing(app, &admins, "Admins", "There are no admins.").await;
            app.reply(chat_id, text).await
        }
        CommandKind::Members => {
            let members = app.state.read(|s| s.users.chat_members.clone()).await;
            let text = listing(
                app,
                &members,
                "Chat members without access",
                "There are no chat members waiting for access.",
            )
            .await;
            app.reply(chat_id, text).await
        }
        CommandKind::Requests => {
            let requests = app.state.read(|s| s.users.pending_requests.clone()).await;
            if requests.is_empty() {
                return app.reply(chat_id, "There are no pending join requests.").await;
            }
            let text = listing(app, &requests, "Pending join requests", "").await;
            app.reply(
                chat_id,
                format!("{}\nUse /approve <user id> or /dismiss <user id>.", text),
            )
            .await
        }
        CommandKind::Banned => {
            let banned = app.state.read(|s| s.users.banned.clone()).await;
            let text = listing(app, &banned, "Banned users", "There are no banned users.").await;
            app.reply(chat_id, text).await
        }
        CommandKind::Join => join(app, msg).await,
        CommandKind::Time => {
            let now = Utc::now().with_timezone(&app.settings.timezone);
            let text = format!(
                "It is {} ({}).",
                now.format("%A %d %B %Y, %H:%M:%S"),
                app.settings.timezone
            );
            app.reply(chat_id, text).await
        }
        CommandKind::Timer => schedule(app, msg, TimerKind::Timer, argument).await,
        CommandKind::Alarm => schedule(app, msg, TimerKind::Alarm, argument).await,
        CommandKind::Version => version(app, msg).await,
        CommandKind::Stats => match app.collaborators.stats.snapshot().await {
            Ok(snapshot) => app.reply(chat_id, snapshot.render()).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read system stats");
                app.reply(chat_id, "Sorry, the system stats could not be read.").await
            }
        },
        CommandKind::Approve
        | CommandKind::Dismiss
        | CommandKind::AddUser
        | CommandKind::RemoveUser
        | CommandKind::Ban
        | CommandKind::Unban
        | CommandKind::Promote
        | CommandKind::Demote
        | CommandKind::Reboot => {
            let Some(action) = staged_action(app, msg.sender.id, spec.kind, &argument) else {
                return app.reply(chat_id, spec.usage()).await;
            };
            stage(app, msg, action).await
        }
    }
}

/// Handle /join from a sender without access
pub async fn join(app: &App, msg: &IncomingMessage) -> Result<()> {
    let user = msg.sender.id;
    let outcome = match app.state.request_join(user).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, user, "Failed to persist join request");
            return app
                .reply(msg.chat_id, "Sorry, your request could not be saved. Try again later.")
                .await;
        }
    };

    let text = match outcome {
        Ok(()) => {
            tracing::info!(user, "Join request recorded");
            notify_admins(app, msg).await;
            "Your request has been sent to the admins.".to_string()
        }
        Err(Rejection::AlreadyAllowed) => "You are already allowed to use this bot.".to_string(),
        Err(Rejection::RequestPending) => {
            "Your request is already waiting for an admin.".to_string()
        }
        Err(Rejection::Banned) => BANNED.to_string(),
        Err(other) => format!("Sorry, your request could not be sent: {}.", other),
    };
    app.reply(msg.chat_id, text).await
}

async fn notify_admins(app: &App, msg: &IncomingMessage) {
    let user = msg.sender.id;
    let admins: BTreeSet<UserId> = app
        .state
        .read(|s| {
            let mut admins = s.users.admins.clone();
            admins.insert(s.users.owner);
            admins
        })
        .await;

    let label = msg.sender.label();
    let who = if label == user.to_string() {
        label
    } else {
        format!("{} ({})", label, user)
    };
    let text = format!(
        "{} asks to use the bot. Send /approve {} to let them in or /dismiss {} to refuse.",
        who, user, user
    );
    for admin in admins {
        // private chat id equals the user id
        if let Err(e) = app.platform.send(admin, MessageContent::plain(text.clone())).await {
            tracing::warn!(error = %e, admin, "Failed to notify admin about join request");
        }
    }
}

async fn help(app: &App, msg: &IncomingMessage) -> Result<()> {
    let role = if app.state.roles().await.is_admin(msg.sender.id) {
        Role::Admin
    } else {
        Role::User
    };
    let markdown = format!("{}\n{}\n", HELP_MD, command_list(role));
    let html = markdown_to_telegram_html(&markdown);
    app.platform
        .send(msg.chat_id, MessageContent::html(markdown, html))
        .await
}

/// "Allowed users (2): Ann (1) and 42." or `empty` when there is nobody
async fn listing(app: &App, users: &BTreeSet<UserId>, title: &str, empty: &str) -> String {
    if users.is_empty() {
        return empty.to_string();
    }
    let mut labels = Vec::with_capacity(users.len());
    for user in users {
        labels.push(app.user_label(*user).await);
    }
    format!("{} ({}): {}.", title, labels.len(), human_join(&labels))
}

async fn schedule(
    app: &App,
    msg: &IncomingMessage,
    kind: TimerKind,
    argument: Argument,
) -> Result<()> {
    let chat_id = msg.chat_id;
    let Argument::Text(input) = argument else {
        let records = app.state.timers(kind).await;
        let mine: Vec<TimerRecord> = records.into_iter().filter(|r| r.chat_id == chat_id).collect();
        return app
            .reply(chat_id, describe_pending(kind, &mine, app.settings.timezone))
            .await;
    };

    let now = Utc::now();
    let parsed = match kind {
        TimerKind::Timer => {
            parse_timer(&input).map(|offset| TimerRecord::timer(now, &offset, chat_id))
        }
        TimerKind::Alarm => parse_alarm(&input)
            .map(|time| TimerRecord::alarm(now, app.settings.timezone, time, chat_id)),
    };
    let record = match parsed {
        Ok(record) => record,
        Err(e) => return app.reply(chat_id, format!("Sorry, {}.", e)).await,
    };

    if let Err(e) = app.state.add_timer(record.clone()).await {
        tracing::error!(error = %e, kind = %kind, "Failed to persist timer");
        return app
            .reply(chat_id, format!("Sorry, the {} could not be saved.", kind))
            .await;
    }

    let at = record.fire_at.with_timezone(&app.settings.timezone);
    let text = match kind {
        TimerKind::Timer => format!(
            "Timer set for {}. It ends at {}.",
            record.label,
            at.format("%H:%M:%S")
        ),
        TimerKind::Alarm => format!(
            "Alarm set for {} on {}.",
            record.label,
            at.format("%A %d %B")
        ),
    };
    app.scheduler.arm(record);
    app.reply(chat_id, text).await
}

async fn version(app: &App, msg: &IncomingMessage) -> Result<()> {
    let running = &app.settings.version;
    let Some(source) = &app.collaborators.versions else {
        return app
            .reply(
                msg.chat_id,
                format!(
                    "SmartHomeBot {} is running. \
                     Release checks are disabled: no [updates] repo is configured.",
                    running
                ),
            )
            .await;
    };
    match source.latest_version().await {
        Ok(tag) => {
            let status = compare_versions(running, &tag);
            tracing::info!(running = %running, latest = %tag, status = ?status, "Version checked");
            app.reply(msg.chat_id, status.render(running)).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch latest release");
            app.reply(
                msg.chat_id,
                format!(
                    "SmartHomeBot {} is running. The latest release could not be fetched.",
                    running
                ),
            )
            .await
        }
    }
}

/// Build the staged action for a confirmation command
fn staged_action(
    app: &App,
    actor: UserId,
    kind: CommandKind,
    argument: &Argument,
) -> Option<PendingAction> {
    if kind == CommandKind::Reboot {
        let delay_secs = match argument {
            Argument::Seconds(secs) => *secs,
            _ => app.settings.reboot_delay_secs,
        };
        return Some(PendingAction::Reboot { delay_secs });
    }

    let user = argument.user()?;
    let op = match kind {
        CommandKind::Approve => RoleOp::ApproveJoin(user),
        CommandKind::Dismiss => RoleOp::DismissJoin(user),
        CommandKind::AddUser => RoleOp::AddUser(user),
        CommandKind::RemoveUser => RoleOp::RemoveUser { user, actor },
        CommandKind::Ban => RoleOp::BanUser { user, actor },
        CommandKind::Unban => RoleOp::UnbanUser(user),
        CommandKind::Promote => RoleOp::Promote(user),
        CommandKind::Demote => RoleOp::Demote { user, actor },
        _ => return None,
    };
    Some(PendingAction::Role(op))
}

async fn stage(app: &App, msg: &IncomingMessage, action: PendingAction) -> Result<()> {
    let prompt = app
        .confirmations()?
        .stage(msg.chat_id, msg.sender.id, action);
    tracing::info!(
        action = action.name(),
        issuer = msg.sender.id,
        chat_id = msg.chat_id,
        superseded = prompt.superseded.is_some(),
        "Confirmation staged"
    );
    app.platform
        .send(
            msg.chat_id,
            MessageContent::confirm(prompt.text, prompt.yes, prompt.no),
        )
        .await
}
