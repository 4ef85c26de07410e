//! Result-visibility gate and capability resolution.
//!
//! All authorization questions funnel through [`Capabilities`]; request
//! handlers never match on role values directly. Tally visibility is
//! applied by building a [`PollView`] through [`sanitize`] — every read
//! path goes through it except the response returned to a voter for
//! their own just-cast ballot, which uses [`full_view`].

use std::collections::HashSet;

use serde::Serialize;
use univote_db::entities::{poll, poll_option, user};

/// Resolved permissions for one requester.
#[derive(Debug, Clone)]
pub struct Capabilities {
    user_id: String,
    role: user::UserRole,
    admin_class: bool,
    /// `Some` only for sub-admins limited to an explicit poll set.
    managed_poll_ids: Option<HashSet<String>>,
}

impl Capabilities {
    /// Resolve a user's capability set from its role and scope data.
    #[must_use]
    pub fn resolve(user: &user::Model) -> Self {
        let admin_class = matches!(
            user.role,
            user::UserRole::SubAdmin | user::UserRole::Admin | user::UserRole::SuperAdmin
        );

        let managed_poll_ids = if user.role == user::UserRole::SubAdmin {
            user.managed_poll_ids
                .as_ref()
                .and_then(serde_json::Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
        } else {
            None
        };

        Self {
            user_id: user.id.clone(),
            role: user.role,
            admin_class,
            managed_poll_ids,
        }
    }

    /// The requester's user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Administrative roles always see tallies, published or not.
    #[must_use]
    pub const fn sees_hidden_results(&self) -> bool {
        self.admin_class
    }

    /// Only students and faculty cast ballots.
    #[must_use]
    pub const fn may_vote(&self) -> bool {
        matches!(self.role, user::UserRole::Student | user::UserRole::Faculty)
    }

    /// Faculty and administrative roles create polls.
    #[must_use]
    pub const fn may_create_polls(&self) -> bool {
        self.admin_class || matches!(self.role, user::UserRole::Faculty)
    }

    /// Whether the requester may manage (edit settings, publish,
    /// delete) this specific poll.
    #[must_use]
    pub fn may_manage(&self, poll: &poll::Model) -> bool {
        if self.admin_class {
            return match &self.managed_poll_ids {
                None => true,
                Some(ids) => ids.contains(&poll.id),
            };
        }
        matches!(self.role, user::UserRole::Faculty) && poll.created_by == self.user_id
    }

    /// Audience filter for listings. `None` means the requester sees
    /// every audience.
    #[must_use]
    pub const fn audience_filter(&self) -> Option<poll::TargetAudience> {
        match self.role {
            user::UserRole::Student => Some(poll::TargetAudience::Student),
            user::UserRole::Faculty => Some(poll::TargetAudience::Faculty),
            _ => None,
        }
    }
}

/// One option on a ballot, with its tally when visible.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: String,
    pub option_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<i32>,
}

/// Wire view of a poll. Tallies and the total are `None` (and absent
/// from the JSON) when the visibility gate hides them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: String,
    pub question: String,
    pub poll_type: poll::PollType,
    pub target_audience: poll::TargetAudience,
    pub status: poll::PollStatus,
    pub expires_at: String,
    pub results_published: bool,
    pub results_hidden: bool,
    pub created_by: String,
    pub created_at: String,
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<i64>,
}

fn view(poll: &poll::Model, options: &[poll_option::Model], tallies_visible: bool) -> PollView {
    let option_views = options
        .iter()
        .map(|o| OptionView {
            id: o.id.clone(),
            option_text: o.option_text.clone(),
            votes: tallies_visible.then_some(o.votes),
        })
        .collect();

    let total_votes =
        tallies_visible.then(|| options.iter().map(|o| i64::from(o.votes)).sum());

    PollView {
        id: poll.id.clone(),
        question: poll.question.clone(),
        poll_type: poll.poll_type,
        target_audience: poll.target_audience,
        status: poll.status,
        expires_at: poll.expires_at.to_rfc3339(),
        results_published: poll.results_published,
        results_hidden: !tallies_visible,
        created_by: poll.created_by.clone(),
        created_at: poll.created_at.to_rfc3339(),
        options: option_views,
        total_votes,
    }
}

/// Build a poll view with the visibility gate applied: tallies are
/// stripped unless results are published or the requester's
/// capabilities allow seeing hidden results.
#[must_use]
pub fn sanitize(
    poll: &poll::Model,
    options: &[poll_option::Model],
    caps: &Capabilities,
) -> PollView {
    let tallies_visible = poll.results_published || caps.sees_hidden_results();
    view(poll, options, tallies_visible)
}

/// Build a poll view with tallies included regardless of publication
/// state. Used for the voter's own cast-vote response and for the
/// broadcast payload.
#[must_use]
pub fn full_view(poll: &poll::Model, options: &[poll_option::Model]) -> PollView {
    view(poll, options, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn make_user(role: user::UserRole) -> user::Model {
        user::Model {
            id: "u1".to_string(),
            username: "u1".to_string(),
            name: "User One".to_string(),
            email: "u1@example.edu".to_string(),
            role,
            managed_poll_ids: None,
            token: None,
            created_at: Utc::now().into(),
        }
    }

    fn make_poll(published: bool) -> poll::Model {
        poll::Model {
            id: "p1".to_string(),
            question: "Cafeteria hours?".to_string(),
            poll_type: poll::PollType::SingleChoice,
            target_audience: poll::TargetAudience::All,
            status: poll::PollStatus::Active,
            expires_at: Utc::now().into(),
            results_published: published,
            created_by: "creator".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn make_options() -> Vec<poll_option::Model> {
        vec![
            poll_option::Model {
                id: "o1".to_string(),
                poll_id: "p1".to_string(),
                option_text: "Longer".to_string(),
                votes: 3,
                display_order: 0,
            },
            poll_option::Model {
                id: "o2".to_string(),
                poll_id: "p1".to_string(),
                option_text: "Shorter".to_string(),
                votes: 1,
                display_order: 1,
            },
        ]
    }

    #[test]
    fn test_student_never_sees_unpublished_tallies() {
        let caps = Capabilities::resolve(&make_user(user::UserRole::Student));
        let view = sanitize(&make_poll(false), &make_options(), &caps);

        assert!(view.results_hidden);
        assert!(view.total_votes.is_none());
        assert!(view.options.iter().all(|o| o.votes.is_none()));
    }

    #[test]
    fn test_published_tallies_visible_to_all_roles() {
        let caps = Capabilities::resolve(&make_user(user::UserRole::Student));
        let view = sanitize(&make_poll(true), &make_options(), &caps);

        assert!(!view.results_hidden);
        assert_eq!(view.total_votes, Some(4));
        assert_eq!(view.options[0].votes, Some(3));
    }

    #[test]
    fn test_admin_sees_hidden_tallies() {
        for role in [
            user::UserRole::SubAdmin,
            user::UserRole::Admin,
            user::UserRole::SuperAdmin,
        ] {
            let caps = Capabilities::resolve(&make_user(role));
            let view = sanitize(&make_poll(false), &make_options(), &caps);
            assert!(!view.results_hidden);
            assert_eq!(view.options[1].votes, Some(1));
        }
    }

    #[test]
    fn test_full_view_bypasses_gate() {
        let view = full_view(&make_poll(false), &make_options());
        assert!(!view.results_hidden);
        assert_eq!(view.total_votes, Some(4));
    }

    #[test]
    fn test_hidden_tallies_absent_from_json() {
        let caps = Capabilities::resolve(&make_user(user::UserRole::Student));
        let view = sanitize(&make_poll(false), &make_options(), &caps);
        let json = serde_json::to_value(&view).unwrap();

        assert!(json["options"][0].get("votes").is_none());
        assert!(json.get("totalVotes").is_none());
        assert_eq!(json["resultsHidden"], json!(true));
    }

    #[test]
    fn test_scoped_sub_admin_manages_only_assigned_polls() {
        let mut admin = make_user(user::UserRole::SubAdmin);
        admin.managed_poll_ids = Some(json!(["p1"]));
        let caps = Capabilities::resolve(&admin);

        let mine = make_poll(false);
        let mut other = make_poll(false);
        other.id = "p2".to_string();

        assert!(caps.may_manage(&mine));
        assert!(!caps.may_manage(&other));
        // Scope limits management, not result visibility.
        assert!(caps.sees_hidden_results());
    }

    #[test]
    fn test_faculty_manages_own_polls_only() {
        let mut faculty = make_user(user::UserRole::Faculty);
        faculty.id = "creator".to_string();
        let caps = Capabilities::resolve(&faculty);

        let own = make_poll(false);
        let mut foreign = make_poll(false);
        foreign.created_by = "someone-else".to_string();

        assert!(caps.may_manage(&own));
        assert!(!caps.may_manage(&foreign));
        assert!(!caps.sees_hidden_results());
    }

    #[test]
    fn test_audience_filters() {
        let student = Capabilities::resolve(&make_user(user::UserRole::Student));
        let faculty = Capabilities::resolve(&make_user(user::UserRole::Faculty));
        let admin = Capabilities::resolve(&make_user(user::UserRole::Admin));

        assert_eq!(
            student.audience_filter(),
            Some(poll::TargetAudience::Student)
        );
        assert_eq!(
            faculty.audience_filter(),
            Some(poll::TargetAudience::Faculty)
        );
        assert_eq!(admin.audience_filter(), None);
    }

    #[test]
    fn test_voting_roles() {
        assert!(Capabilities::resolve(&make_user(user::UserRole::Student)).may_vote());
        assert!(Capabilities::resolve(&make_user(user::UserRole::Faculty)).may_vote());
        assert!(!Capabilities::resolve(&make_user(user::UserRole::Admin)).may_vote());
    }
}
