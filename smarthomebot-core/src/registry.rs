// ABOUTME: Role registry - owner, admins, allowed, banned, chat members and join requests.
// ABOUTME: Every mutation checks its preconditions in a fixed order and returns a Rejection on failure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::traits::UserId;

/// Why a role mutation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    AlreadyAllowed,
    RequestPending,
    Banned,
    IsOwner,
    SelfTarget,
    IsAdmin,
    NotAllowed,
    NotBanned,
    AlreadyBanned,
    NoSuchRequest,
    AlreadyAdmin,
    NotAdmin,
}

impl Rejection {
    /// Stable snake_case code, used as a metrics label
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyAllowed => "already_allowed",
            Self::RequestPending => "request_pending",
            Self::Banned => "banned",
            Self::IsOwner => "is_owner",
            Self::SelfTarget => "self_target",
            Self::IsAdmin => "is_admin",
            Self::NotAllowed => "not_allowed",
            Self::NotBanned => "not_banned",
            Self::AlreadyBanned => "already_banned",
            Self::NoSuchRequest => "no_such_request",
            Self::AlreadyAdmin => "already_admin",
            Self::NotAdmin => "not_admin",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::AlreadyAllowed => "user is already allowed",
            Self::RequestPending => "a join request from this user is already pending",
            Self::Banned => "user is banned",
            Self::IsOwner => "the bot owner cannot be changed",
            Self::SelfTarget => "you cannot do that to yourself",
            Self::IsAdmin => "user is an admin, demote them first",
            Self::NotAllowed => "user is not in the allowed list",
            Self::NotBanned => "user is not banned",
            Self::AlreadyBanned => "user is already banned",
            Self::NoSuchRequest => "there is no pending join request from this user",
            Self::AlreadyAdmin => "user is already an admin",
            Self::NotAdmin => "user is not an admin",
        };
        f.write_str(text)
    }
}

/// Result of a role mutation: applied, or refused with a reason
pub type Outcome = Result<(), Rejection>;

/// A registry mutation that an admin can stage behind a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOp {
    ApproveJoin(UserId),
    DismissJoin(UserId),
    AddUser(UserId),
    RemoveUser { user: UserId, actor: UserId },
    BanUser { user: UserId, actor: UserId },
    UnbanUser(UserId),
    Promote(UserId),
    Demote { user: UserId, actor: UserId },
}

impl RoleOp {
    /// The user this operation targets
    pub fn target(&self) -> UserId {
        match *self {
            Self::ApproveJoin(user)
            | Self::DismissJoin(user)
            | Self::AddUser(user)
            | Self::UnbanUser(user)
            | Self::Promote(user) => user,
            Self::RemoveUser { user, .. }
            | Self::BanUser { user, .. }
            | Self::Demote { user, .. } => user,
        }
    }

    /// Imperative phrase used in prompts, e.g. "ban user 42"
    pub fn describe(&self) -> String {
        let user = self.target();
        match self {
            Self::ApproveJoin(_) => format!("approve the join request of user {}", user),
            Self::DismissJoin(_) => format!("dismiss the join request of user {}", user),
            Self::AddUser(_) => format!("add user {}", user),
            Self::RemoveUser { .. } => format!("remove user {}", user),
            Self::BanUser { .. } => format!("ban user {}", user),
            Self::UnbanUser(_) => format!("unban user {}", user),
            Self::Promote(_) => format!("promote user {} to admin", user),
            Self::Demote { .. } => format!("revoke the admin rights of user {}", user),
        }
    }

    /// Past-tense report after the operation was applied
    pub fn success_text(&self) -> String {
        let user = self.target();
        match self {
            Self::ApproveJoin(_) => format!("Join request of user {} approved.", user),
            Self::DismissJoin(_) => format!("Join request of user {} dismissed.", user),
            Self::AddUser(_) => format!("User {} added to the allowed users.", user),
            Self::RemoveUser { .. } => format!("User {} removed from the allowed users.", user),
            Self::BanUser { .. } => format!("User {} banned.", user),
            Self::UnbanUser(_) => format!("User {} unbanned.", user),
            Self::Promote(_) => format!("User {} is now an admin.", user),
            Self::Demote { .. } => format!("User {} is no longer an admin.", user),
        }
    }
}

/// Role sets persisted in the USERS section of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub owner: UserId,
    #[serde(default)]
    pub admins: BTreeSet<UserId>,
    #[serde(default, rename = "allowed_users")]
    pub allowed: BTreeSet<UserId>,
    #[serde(default, rename = "banned_users")]
    pub banned: BTreeSet<UserId>,
    #[serde(default)]
    pub chat_members: BTreeSet<UserId>,
    #[serde(default, rename = "user_requests")]
    pub pending_requests: BTreeSet<UserId>,
    #[serde(default, rename = "user_rejects")]
    pub rejected_requests: BTreeSet<UserId>,
}

impl Roles {
    /// Fresh registry where the owner is the only allowed user and admin
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            admins: BTreeSet::from([owner]),
            allowed: BTreeSet::from([owner]),
            banned: BTreeSet::new(),
            chat_members: BTreeSet::new(),
            pending_requests: BTreeSet::new(),
            rejected_requests: BTreeSet::new(),
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        user == self.owner
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.is_owner(user) || self.admins.contains(&user)
    }

    pub fn is_allowed(&self, user: UserId) -> bool {
        self.is_admin(user) || self.allowed.contains(&user)
    }

    pub fn is_banned(&self, user: UserId) -> bool {
        self.banned.contains(&user)
    }

    pub fn has_pending_request(&self, user: UserId) -> bool {
        self.pending_requests.contains(&user)
    }

    /// Restore the set invariants on a registry read from disk.
    ///
    /// Returns the list of repairs made so the caller can log them.
    pub fn normalize(&mut self) -> Vec<&'static str> {
        let mut repairs = Vec::new();
        if self.banned.remove(&self.owner) {
            repairs.push("owner removed from banned users");
        }
        if self.admins.insert(self.owner) {
            repairs.push("owner added to admins");
        }
        let admins_missing: Vec<UserId> = self.admins.difference(&self.allowed).copied().collect();
        if !admins_missing.is_empty() {
            self.allowed.extend(admins_missing);
            repairs.push("admins added to allowed users");
        }
        let banned_allowed: Vec<UserId> =
            self.allowed.intersection(&self.banned).copied().collect();
        if !banned_allowed.is_empty() {
            for user in banned_allowed {
                self.banned.remove(&user);
            }
            repairs.push("allowed users removed from banned users");
        }
        let before = self.pending_requests.len();
        let allowed = &self.allowed;
        self.pending_requests.retain(|u| !allowed.contains(u));
        if self.pending_requests.len() != before {
            repairs.push("requests of allowed users dropped");
        }
        let before = self.chat_members.len();
        self.chat_members.retain(|u| !allowed.contains(u));
        if self.chat_members.len() != before {
            repairs.push("allowed users dropped from chat members");
        }
        repairs
    }

    // -------------------------------------------------------------------------
    // Join requests
    // -------------------------------------------------------------------------

    pub fn request_join(&mut self, user: UserId) -> Outcome {
        if self.is_allowed(user) {
            return Err(Rejection::AlreadyAllowed);
        }
        if self.has_pending_request(user) {
            return Err(Rejection::RequestPending);
        }
        if self.is_banned(user) {
            return Err(Rejection::Banned);
        }
        self.pending_requests.insert(user);
        Ok(())
    }

    pub fn approve_join(&mut self, user: UserId) -> Outcome {
        if !self.pending_requests.remove(&user) {
            return Err(Rejection::NoSuchRequest);
        }
        self.allowed.insert(user);
        self.chat_members.remove(&user);
        Ok(())
    }

    pub fn dismiss_join(&mut self, user: UserId) -> Outcome {
        if !self.pending_requests.remove(&user) {
            return Err(Rejection::NoSuchRequest);
        }
        self.rejected_requests.insert(user);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Allowed users and bans
    // -------------------------------------------------------------------------

    pub fn add_user(&mut self, user: UserId) -> Outcome {
        if self.is_allowed(user) {
            return Err(Rejection::AlreadyAllowed);
        }
        if self.is_banned(user) {
            return Err(Rejection::Banned);
        }
        self.allowed.insert(user);
        self.pending_requests.remove(&user);
        self.chat_members.remove(&user);
        Ok(())
    }

    /// Shared ordered guard for remove and ban: owner, self, admin
    fn check_removable(&self, user: UserId, actor: UserId) -> Outcome {
        if self.is_owner(user) {
            return Err(Rejection::IsOwner);
        }
        if user == actor {
            return Err(Rejection::SelfTarget);
        }
        if self.is_admin(user) {
            return Err(Rejection::IsAdmin);
        }
        Ok(())
    }

    pub fn remove_user(&mut self, user: UserId, actor: UserId) -> Outcome {
        self.check_removable(user, actor)?;
        if !self.allowed.remove(&user) {
            return Err(Rejection::NotAllowed);
        }
        Ok(())
    }

    pub fn ban_user(&mut self, user: UserId, actor: UserId) -> Outcome {
        self.check_removable(user, actor)?;
        if self.is_banned(user) {
            return Err(Rejection::AlreadyBanned);
        }
        self.allowed.remove(&user);
        self.pending_requests.remove(&user);
        self.chat_members.remove(&user);
        self.banned.insert(user);
        Ok(())
    }

    pub fn unban_user(&mut self, user: UserId) -> Outcome {
        if !self.banned.remove(&user) {
            return Err(Rejection::NotBanned);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Admins
    // -------------------------------------------------------------------------

    pub fn promote(&mut self, user: UserId) -> Outcome {
        if self.is_admin(user) {
            return Err(Rejection::AlreadyAdmin);
        }
        if !self.allowed.contains(&user) {
            return Err(Rejection::NotAllowed);
        }
        self.admins.insert(user);
        Ok(())
    }

    pub fn demote(&mut self, user: UserId, actor: UserId) -> Outcome {
        if self.is_owner(user) {
            return Err(Rejection::IsOwner);
        }
        if user == actor {
            return Err(Rejection::SelfTarget);
        }
        if !self.admins.remove(&user) {
            return Err(Rejection::NotAdmin);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Chat members
    // -------------------------------------------------------------------------

    /// Remember a non-allowed user who talked to the bot.
    ///
    /// Returns true when the set changed.
    pub fn record_chat_member(&mut self, user: UserId) -> bool {
        if self.is_allowed(user) {
            return false;
        }
        self.chat_members.insert(user)
    }

    /// Apply a staged operation
    pub fn apply(&mut self, op: &RoleOp) -> Outcome {
        match *op {
            RoleOp::ApproveJoin(user) => self.approve_join(user),
            RoleOp::DismissJoin(user) => self.dismiss_join(user),
            RoleOp::AddUser(user) => self.add_user(user),
            RoleOp::RemoveUser { user, actor } => self.remove_user(user, actor),
            RoleOp::BanUser { user, actor } => self.ban_user(user, actor),
            RoleOp::UnbanUser(user) => self.unban_user(user),
            RoleOp::Promote(user) => self.promote(user),
            RoleOp::Demote { user, actor } => self.demote(user, actor),
        }
    }
}
