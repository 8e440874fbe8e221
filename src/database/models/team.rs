use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named collaboration group, owned by its creator. Public teams are
/// visible to anyone; private teams are gated by an opaque password.
/// The owner is always a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub members: Vec<String>,
    pub created: DateTime<Utc>,
    pub public: bool,
    pub password: Option<String>,
}

impl Team {
    /// Build a new team. A blank or whitespace-only password leaves the team
    /// public; a real password makes it private. The creator becomes the
    /// first member in the same record, so the owner-membership invariant
    /// holds from the moment the row exists.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: &str,
        password: Option<String>,
    ) -> Self {
        let password = password.filter(|p| !p.trim().is_empty());
        Self {
            name: name.into(),
            description: description.into(),
            created_by: created_by.to_string(),
            members: vec![created_by.to_string()],
            created: Utc::now(),
            public: password.is_none(),
            password,
        }
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.created_by == username || self.members.iter().any(|m| m == username)
    }

    /// Re-assert the owner-in-members invariant after membership edits.
    pub fn ensure_owner_membership(&mut self) {
        if !self.members.iter().any(|m| m == &self.created_by) {
            self.members.push(self.created_by.clone());
        }
    }

    /// A non-blank password flips the team private. Blank input is ignored;
    /// it does not toggle an already-private team back to public.
    pub fn set_password(&mut self, password: &str) {
        if !password.trim().is_empty() {
            self.public = false;
            self.password = Some(password.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_is_owner_and_member() {
        let team = Team::new("lolcats", "internet memes", "alice", None);
        assert_eq!(team.created_by, "alice");
        assert!(team.is_member("alice"));
        assert!(!team.is_member("bob"));
    }

    #[test]
    fn blank_password_leaves_team_public() {
        assert!(Team::new("a", "", "alice", None).public);
        assert!(Team::new("b", "", "alice", Some("".into())).public);
        assert!(Team::new("c", "", "alice", Some("   ".into())).public);
    }

    #[test]
    fn real_password_makes_team_private() {
        let team = Team::new("secret", "", "alice", Some("cheezeburger".into()));
        assert!(!team.public);
        assert_eq!(team.password.as_deref(), Some("cheezeburger"));
    }

    #[test]
    fn set_password_ignores_blank_input() {
        let mut team = Team::new("t", "", "alice", Some("secret".into()));
        team.set_password("   ");
        assert!(!team.public, "blank password must not reopen the team");
        assert_eq!(team.password.as_deref(), Some("secret"));
    }

    #[test]
    fn owner_membership_is_restored() {
        let mut team = Team::new("t", "", "alice", None);
        team.members.clear();
        team.ensure_owner_membership();
        assert!(team.is_member("alice"));
    }
}
