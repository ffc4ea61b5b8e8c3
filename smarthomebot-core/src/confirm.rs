// ABOUTME: Pending yes/no confirmations keyed per (chat, issuer) with nonce-tagged button payloads
// ABOUTME: Staging replaces only the issuer's own pending action; stale button presses resolve as expired

use std::collections::HashMap;

use crate::registry::RoleOp;
use crate::traits::{ChatId, UserId};

const PAYLOAD_PREFIX: &str = "confirm";
const NONCE_LEN: usize = 12;

/// An action staged behind a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Role(RoleOp),
    Reboot { delay_secs: u64 },
}

impl PendingAction {
    pub fn describe(&self) -> String {
        match self {
            Self::Role(op) => op.describe(),
            Self::Reboot { delay_secs } => format!("reboot the host in {} seconds", delay_secs),
        }
    }

    /// Question shown above the yes/no buttons
    pub fn prompt_text(&self) -> String {
        format!("Do you really want to {}?", self.describe())
    }

    /// Label used for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Role(RoleOp::ApproveJoin(_)) => "approve",
            Self::Role(RoleOp::DismissJoin(_)) => "dismiss",
            Self::Role(RoleOp::AddUser(_)) => "adduser",
            Self::Role(RoleOp::RemoveUser { .. }) => "removeuser",
            Self::Role(RoleOp::BanUser { .. }) => "ban",
            Self::Role(RoleOp::UnbanUser(_)) => "unban",
            Self::Role(RoleOp::Promote(_)) => "promote",
            Self::Role(RoleOp::Demote { .. }) => "demote",
            Self::Reboot { .. } => "reboot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub action: PendingAction,
    pub issuer: UserId,
    pub chat_id: ChatId,
    pub nonce: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
        }
    }
}

/// Decoded `confirm:<yes|no>:<issuer>:<nonce>` callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub answer: Answer,
    pub issuer: UserId,
    pub nonce: String,
}

impl CallbackPayload {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            PAYLOAD_PREFIX,
            self.answer.as_str(),
            self.issuer,
            self.nonce
        )
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        if parts.next()? != PAYLOAD_PREFIX {
            return None;
        }
        let answer = match parts.next()? {
            "yes" => Answer::Yes,
            "no" => Answer::No,
            _ => return None,
        };
        let issuer = parts.next()?.parse().ok()?;
        let nonce = parts.next()?.to_string();
        if nonce.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            answer,
            issuer,
            nonce,
        })
    }
}

/// Everything the transport needs to render a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub yes: String,
    pub no: String,
    /// Set when this prompt replaced an older one from the same issuer
    pub superseded: Option<PendingAction>,
}

/// How a button press was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Data was not a confirmation payload
    Ignored,
    /// Someone other than the issuer pressed the button
    NotYours,
    /// No matching pending action (already resolved or superseded)
    Expired,
    Abort(Pending),
    Apply(Pending),
}

impl Resolution {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Resolution::Ignored => "ignored",
            Resolution::NotYours => "not_yours",
            Resolution::Expired => "expired",
            Resolution::Abort(_) => "aborted",
            Resolution::Apply(_) => "applied",
        }
    }
}

fn new_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..NONCE_LEN].to_string()
}

/// Pending confirmations, one per (chat, issuer). Not persisted.
#[derive(Debug, Default)]
pub struct ConfirmationBook {
    pending: HashMap<(ChatId, UserId), Pending>,
}

impl ConfirmationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `action` for `issuer` in `chat_id`, replacing that issuer's previous one
    pub fn stage(&mut self, chat_id: ChatId, issuer: UserId, action: PendingAction) -> Prompt {
        let nonce = new_nonce();
        let payload = |answer| {
            CallbackPayload {
                answer,
                issuer,
                nonce: nonce.clone(),
            }
            .encode()
        };
        let prompt_text = action.prompt_text();
        let yes = payload(Answer::Yes);
        let no = payload(Answer::No);

        let superseded = self
            .pending
            .insert(
                (chat_id, issuer),
                Pending {
                    action,
                    issuer,
                    chat_id,
                    nonce: nonce.clone(),
                },
            )
            .map(|old| old.action);

        if let Some(old) = &superseded {
            tracing::debug!(chat_id, issuer, old = ?old, "Pending confirmation superseded");
        }

        Prompt {
            text: prompt_text,
            yes,
            no,
            superseded,
        }
    }

    /// Resolve a button press by `presser` in `chat_id`
    pub fn resolve(&mut self, chat_id: ChatId, presser: UserId, data: &str) -> Resolution {
        let Some(payload) = CallbackPayload::parse(data) else {
            return Resolution::Ignored;
        };
        if payload.issuer != presser {
            return Resolution::NotYours;
        }
        let key = (chat_id, presser);
        match self.pending.get(&key) {
            Some(pending) if pending.nonce == payload.nonce => {}
            _ => return Resolution::Expired,
        }
        let Some(pending) = self.pending.remove(&key) else {
            return Resolution::Expired;
        };
        match payload.answer {
            Answer::Yes => Resolution::Apply(pending),
            Answer::No => Resolution::Abort(pending),
        }
    }

    pub fn pending_for(&self, chat_id: ChatId, issuer: UserId) -> Option<&Pending> {
        self.pending.get(&(chat_id, issuer))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
