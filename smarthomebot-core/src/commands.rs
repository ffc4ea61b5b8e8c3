// ABOUTME: Slash-command parsing and the command descriptor table
// ABOUTME: Each command declares its required role, argument arity and whether it needs confirmation

use thiserror::Error;

use crate::traits::UserId;

/// Represents a parsed command from a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command name, lowercased, without `/` or `@botname`
    pub name: String,
    /// The single optional argument token
    pub argument: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, argument: Option<String>) -> Self {
        Self {
            name: name.into(),
            argument,
        }
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

/// Result of parsing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A command was recognized
    Command(Command),
    /// A regular message (not a command)
    Message(String),
    /// Message should be ignored (empty, or addressed to another bot)
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Too many arguments: /{command} takes at most one argument")]
    MalformedCommand { command: String },
}

/// Parse a chat message into a command and its optional argument.
///
/// Commands start with `/`. A `@botname` suffix is stripped when it matches
/// `bot_username`; commands addressed to a different bot are ignored. More
/// than one argument token is a [`ParseError::MalformedCommand`].
pub fn parse_message(body: &str, bot_username: Option<&str>) -> Result<ParseResult, ParseError> {
    let trimmed = body.trim();
    let mut tokens = trimmed.split_whitespace();

    let Some(head) = tokens.next() else {
        return Ok(ParseResult::Ignore);
    };

    let Some(after_slash) = head.strip_prefix('/') else {
        return Ok(ParseResult::Message(trimmed.to_string()));
    };
    // Must start with an alphabetic character
    if !after_slash.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return Ok(ParseResult::Message(trimmed.to_string()));
    }

    let name = match after_slash.split_once('@') {
        Some((name, target)) => {
            let target = target.trim_start_matches('@');
            let addressed_to_us = bot_username.is_some_and(|me| me.eq_ignore_ascii_case(target));
            if !addressed_to_us {
                return Ok(ParseResult::Ignore);
            }
            name
        }
        None => after_slash,
    };
    let name = name.to_lowercase();

    let argument = tokens.next().map(str::to_string);
    if tokens.next().is_some() {
        return Err(ParseError::MalformedCommand { command: name });
    }

    Ok(ParseResult::Command(Command::new(name, argument)))
}

/// Parse a numeric Telegram user id
pub fn parse_user_id(argument: &str) -> Option<UserId> {
    argument.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}

// ---------------------------------------------------------------------------
// Command table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// What a command accepts after its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    /// Free-form optional argument, validated by the handler
    Optional,
    /// Required numeric user id
    UserId,
    /// Optional number of seconds
    OptionalSeconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Help,
    Users,
    Admins,
    Members,
    Join,
    Time,
    Timer,
    Alarm,
    Requests,
    Approve,
    Dismiss,
    AddUser,
    RemoveUser,
    Ban,
    Unban,
    Promote,
    Demote,
    Banned,
    Version,
    Stats,
    Reboot,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub kind: CommandKind,
    pub role: Role,
    pub arity: Arity,
    pub needs_confirmation: bool,
    pub summary: &'static str,
}

/// Validated command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    None,
    Text(String),
    User(UserId),
    Seconds(u64),
}

impl Argument {
    pub fn user(&self) -> Option<UserId> {
        match self {
            Argument::User(id) => Some(*id),
            _ => None,
        }
    }
}

impl CommandSpec {
    /// One-line usage, e.g. `/ban <user id>`
    pub fn usage(&self) -> String {
        match self.arity {
            Arity::None => format!("/{}", self.name),
            Arity::Optional => format!("/{} [time]", self.name),
            Arity::UserId => format!("/{} <user id>", self.name),
            Arity::OptionalSeconds => format!("/{} [seconds]", self.name),
        }
    }

    /// Check the argument against this command's arity. `Err` carries the usage text.
    pub fn check_argument(&self, argument: Option<&str>) -> Result<Argument, String> {
        let usage = || format!("Usage: {}", self.usage());
        match (self.arity, argument) {
            (Arity::None, None) => Ok(Argument::None),
            (Arity::None, Some(_)) => Err(format!("/{} takes no argument. {}", self.name, usage())),
            (Arity::Optional, None) | (Arity::OptionalSeconds, None) => Ok(Argument::None),
            (Arity::Optional, Some(text)) => Ok(Argument::Text(text.to_string())),
            (Arity::UserId, None) => Err(format!("Missing user id. {}", usage())),
            (Arity::UserId, Some(text)) => parse_user_id(text)
                .map(Argument::User)
                .ok_or_else(|| format!("'{}' is not a numeric user id. {}", text, usage())),
            (Arity::OptionalSeconds, Some(text)) => text
                .parse::<u64>()
                .map(Argument::Seconds)
                .map_err(|_| format!("'{}' is not a number of seconds. {}", text, usage())),
        }
    }
}

const fn spec(
    name: &'static str,
    kind: CommandKind,
    role: Role,
    arity: Arity,
    needs_confirmation: bool,
    summary: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        kind,
        role,
        arity,
        needs_confirmation,
        summary,
    }
}

#[rustfmt::skip]
pub const COMMANDS: &[CommandSpec] = &[
    spec("start", CommandKind::Start, Role::User, Arity::None, false, "check that the bot is running"),
    spec("help", CommandKind::Help, Role::User, Arity::None, false, "show this help"),
    spec("users", CommandKind::Users, Role::User, Arity::None, false, "list allowed users"),
    spec("admins", CommandKind::Admins, Role::User, Arity::None, false, "list admins"),
    spec("members", CommandKind::Members, Role::User, Arity::None, false, "list chat members who are not allowed yet"),
    spec("join", CommandKind::Join, Role::User, Arity::None, false, "ask the admins for access"),
    spec("time", CommandKind::Time, Role::User, Arity::None, false, "show the current date and time"),
    spec("timer", CommandKind::Timer, Role::User, Arity::Optional, false, "set a timer (30s, 5m, 1h30m, 01:30) or list timers"),
    spec("alarm", CommandKind::Alarm, Role::User, Arity::Optional, false, "set an alarm (07:30) or list alarms"),
    spec("requests", CommandKind::Requests, Role::Admin, Arity::None, false, "list pending join requests"),
    spec("approve", CommandKind::Approve, Role::Admin, Arity::UserId, true, "approve a join request"),
    spec("dismiss", CommandKind::Dismiss, Role::Admin, Arity::UserId, true, "dismiss a join request"),
    spec("adduser", CommandKind::AddUser, Role::Admin, Arity::UserId, true, "allow a user directly"),
    spec("removeuser", CommandKind::RemoveUser, Role::Admin, Arity::UserId, true, "remove an allowed user"),
    spec("ban", CommandKind::Ban, Role::Admin, Arity::UserId, true, "ban a user"),
    spec("unban", CommandKind::Unban, Role::Admin, Arity::UserId, true, "lift a ban"),
    spec("promote", CommandKind::Promote, Role::Admin, Arity::UserId, true, "make an allowed user admin"),
    spec("demote", CommandKind::Demote, Role::Admin, Arity::UserId, true, "revoke admin rights"),
    spec("banned", CommandKind::Banned, Role::Admin, Arity::None, false, "list banned users"),
    spec("version", CommandKind::Version, Role::Admin, Arity::None, false, "compare the running version with the latest release"),
    spec("stats", CommandKind::Stats, Role::Admin, Arity::None, false, "show CPU temperature, CPU and RAM load"),
    spec("reboot", CommandKind::Reboot, Role::Admin, Arity::OptionalSeconds, true, "reboot the host after a delay"),
];

/// Look up a command descriptor by (lowercased) name
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Markdown list of the commands available to `role`
pub fn command_list(role: Role) -> String {
    COMMANDS
        .iter()
        .filter(|c| role == Role::Admin || c.role == Role::User)
        .map(|c| format!("- `{}` - {}", c.usage(), c.summary))
        .collect::<Vec<_>>()
        .join("\n")
}
