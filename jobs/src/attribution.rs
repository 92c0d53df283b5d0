//! Who a change is attributed to, and how it is flagged.

use bulkedit_core::{ActorId, EditFlags};
use serde::{Deserialize, Serialize};

/// Identity, summary and moderation preferences a change is committed under.
///
/// Resolved once when jobs are created and carried inside each job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Acting identity.
    pub actor: ActorId,

    /// Edit summary or move reason.
    pub summary: String,

    /// Request the bot flag even without the bot right.
    #[serde(default)]
    pub bot_edit: bool,

    /// Show the change in recent-changes feeds.
    #[serde(default = "default_announce")]
    pub announce: bool,
}

fn default_announce() -> bool {
    true
}

impl Attribution {
    /// Create an attribution that announces its changes and is not a bot edit.
    pub fn new(actor: impl Into<ActorId>, summary: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            summary: summary.into(),
            bot_edit: false,
            announce: true,
        }
    }

    /// Mark the change as a bot edit.
    pub fn with_bot_edit(mut self, bot_edit: bool) -> Self {
        self.bot_edit = bot_edit;
        self
    }

    /// Show or hide the change in recent-changes feeds.
    pub fn with_announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// Flags for a committed revision, given the actor's current rights.
    ///
    /// Edits are always minor.
    pub fn edit_flags(&self, has_bot_right: bool, is_patroller: bool) -> EditFlags {
        EditFlags {
            minor: true,
            bot: has_bot_right || self.bot_edit,
            patrolled: is_patroller,
            suppress_recent_changes: !self.announce,
        }
    }
}
