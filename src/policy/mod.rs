//! Access policy predicates.
//!
//! Pure functions over a principal and the resources already fetched by the
//! caller. Handlers resolve existence first and only then consult these, so
//! an unknown name or hash surfaces as a client input error rather than a
//! permission failure.
//!
//! Teams and dragables deliberately follow different mutation rules: a team
//! is owned (only its creator may change or delete it), while a dragable is
//! collectively editable by every member of its team.

use crate::auth::Principal;
use crate::database::models::{Dragable, Team};

/// Membership lookup; the owner always counts as a member.
pub fn is_team_member(principal: &Principal, team: &Team) -> bool {
    principal
        .username()
        .map_or(false, |username| team.is_member(username))
}

/// Public teams are visible to anyone, private teams to members only.
pub fn can_view_team(principal: &Principal, team: &Team) -> bool {
    team.public || is_team_member(principal, team)
}

/// Owner-only: update and delete.
pub fn can_mutate_team(principal: &Principal, team: &Team) -> bool {
    principal.username() == Some(team.created_by.as_str())
}

/// Dragable visibility is strictly team-scoped; there is no public bypass.
pub fn can_view_dragable(principal: &Principal, owning_team: &Team) -> bool {
    is_team_member(principal, owning_team)
}

/// The creator or any member of the owning team may edit or delete.
pub fn can_mutate_dragable(principal: &Principal, dragable: &Dragable, owning_team: &Team) -> bool {
    principal.username() == Some(dragable.created_by.as_str())
        || is_team_member(principal, owning_team)
}

/// Annotations are visible exactly when their dragable is.
pub fn can_view_annotation(principal: &Principal, owning_team: &Team) -> bool {
    can_view_dragable(principal, owning_team)
}

/// Creating an annotation requires membership in the dragable's team.
pub fn can_create_annotation(principal: &Principal, owning_team: &Team) -> bool {
    is_team_member(principal, owning_team)
}
