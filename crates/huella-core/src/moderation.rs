//! Report moderation state machine.
//!
//! States are `pending` (initial), `approved` and `rejected`. Moderators can
//! approve or reject from any state; only admins can send reports back to
//! `pending`, and only in bulk.
//!
//! [`apply`] turns a [`Transition`] into an [`Effect`] describing exactly what
//! the storage layer must write. The storage layer applies the report update
//! and the audit log entry in a single transaction.
//!
//! ```
//! use huella_core::moderation::{apply, Transition};
//! use huella_core::report::{LogAction, ReportState};
//!
//! let effect = apply(&Transition::Reject { reason: "Duplicate".into() }).unwrap();
//! assert_eq!(effect.state, Some(ReportState::Rejected));
//! assert_eq!(effect.log.unwrap().action, LogAction::Rejected);
//!
//! assert!(apply(&Transition::Reject { reason: "  ".into() }).is_err());
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::access::Requirement;
use crate::report::{AnimalType, LogAction, ReportState, Severity};

/// Comment stored on a report when it is approved.
pub const APPROVED_COMMENT: &str = "Report approved and published.";

/// Reason recorded in the audit trail for approvals.
pub const APPROVED_LOG_REASON: &str = "Approved by moderator";

/// Number of reports per moderation queue page.
pub const QUEUE_PAGE_SIZE: usize = 5;

/// Moderation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModerationError {
    /// Reject or comment without a reason.
    #[error("A reason is required.")]
    MissingReason,
}

/// A requested moderation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject { reason: String },
    /// Back to `pending`. Only offered as a bulk admin action.
    ResetToPending,
    /// Internal note; leaves the report state alone.
    Comment { reason: String },
}

impl Transition {
    /// Role needed to perform this transition.
    pub fn requirement(&self) -> Requirement {
        match self {
            Self::ResetToPending => Requirement::Admin,
            _ => Requirement::Moderator,
        }
    }
}

/// Log entry to append for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDraft {
    pub action: LogAction,
    pub reason: String,
}

/// What a transition writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    /// New report state, if the state changes.
    pub state: Option<ReportState>,
    /// Stamp the acting moderator and the moderation time.
    pub stamp_moderator: bool,
    /// New moderation comment, if it changes.
    pub comment: Option<String>,
    /// Audit entry to append.
    pub log: Option<LogDraft>,
}

/// Compute the effect of a transition.
pub fn apply(transition: &Transition) -> Result<Effect, ModerationError> {
    match transition {
        Transition::Approve => Ok(Effect {
            state: Some(ReportState::Approved),
            stamp_moderator: true,
            comment: Some(APPROVED_COMMENT.to_string()),
            log: Some(LogDraft {
                action: LogAction::Verified,
                reason: APPROVED_LOG_REASON.to_string(),
            }),
        }),
        Transition::Reject { reason } => {
            let reason = required_reason(reason)?;
            Ok(Effect {
                state: Some(ReportState::Rejected),
                stamp_moderator: true,
                comment: Some(reason.clone()),
                log: Some(LogDraft {
                    action: LogAction::Rejected,
                    reason,
                }),
            })
        }
        Transition::ResetToPending => Ok(Effect {
            state: Some(ReportState::Pending),
            stamp_moderator: false,
            comment: None,
            log: None,
        }),
        Transition::Comment { reason } => Ok(Effect {
            state: None,
            stamp_moderator: false,
            comment: None,
            log: Some(LogDraft {
                action: LogAction::Comment,
                reason: required_reason(reason)?,
            }),
        }),
    }
}

fn required_reason(reason: &str) -> Result<String, ModerationError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ModerationError::MissingReason);
    }
    Ok(reason.to_string())
}

/// Filters for the moderation queue. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueFilter {
    pub state: Option<ReportState>,
    pub severity: Option<Severity>,
    pub animal_type: Option<AnimalType>,
    pub anonymous: Option<bool>,
}

impl QueueFilter {
    /// Build a filter from raw query values.
    ///
    /// Missing, empty, `"all"` and unrecognized values all mean no filter.
    pub fn from_query(
        state: Option<&str>,
        severity: Option<&str>,
        animal_type: Option<&str>,
        anonymous: Option<&str>,
    ) -> Self {
        Self {
            state: selected(state).and_then(ReportState::parse),
            severity: selected(severity).and_then(Severity::parse),
            animal_type: selected(animal_type).and_then(AnimalType::parse),
            anonymous: selected(anonymous).and_then(|v| match v {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            }),
        }
    }
}

fn selected(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "all" && *v != "todos")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_effect() {
        let effect = apply(&Transition::Approve).unwrap();

        assert_eq!(effect.state, Some(ReportState::Approved));
        assert!(effect.stamp_moderator);
        assert_eq!(effect.comment.as_deref(), Some(APPROVED_COMMENT));
        assert_eq!(
            effect.log,
            Some(LogDraft {
                action: LogAction::Verified,
                reason: APPROVED_LOG_REASON.to_string(),
            })
        );
    }

    #[test]
    fn test_reject_uses_trimmed_reason() {
        let effect = apply(&Transition::Reject {
            reason: "  Photo unrelated to incident ".to_string(),
        })
        .unwrap();

        assert_eq!(effect.state, Some(ReportState::Rejected));
        assert_eq!(effect.comment.as_deref(), Some("Photo unrelated to incident"));
        assert_eq!(effect.log.unwrap().reason, "Photo unrelated to incident");
    }

    #[test]
    fn test_reject_without_reason_fails() {
        for reason in ["", "   ", "\n\t"] {
            let err = apply(&Transition::Reject {
                reason: reason.to_string(),
            })
            .unwrap_err();
            assert_eq!(err, ModerationError::MissingReason);
        }
    }

    #[test]
    fn test_reset_writes_no_log() {
        let effect = apply(&Transition::ResetToPending).unwrap();

        assert_eq!(effect.state, Some(ReportState::Pending));
        assert!(!effect.stamp_moderator);
        assert!(effect.comment.is_none());
        assert!(effect.log.is_none());
    }

    #[test]
    fn test_comment_keeps_state() {
        let effect = apply(&Transition::Comment {
            reason: "Called the reporter".to_string(),
        })
        .unwrap();

        assert!(effect.state.is_none());
        assert_eq!(effect.log.unwrap().action, LogAction::Comment);
        assert!(apply(&Transition::Comment {
            reason: String::new()
        })
        .is_err());
    }

    #[test]
    fn test_requirements() {
        assert_eq!(Transition::Approve.requirement(), Requirement::Moderator);
        assert_eq!(
            Transition::ResetToPending.requirement(),
            Requirement::Admin
        );
    }

    #[test]
    fn test_queue_filter_from_query() {
        let filter = QueueFilter::from_query(Some("pending"), Some("all"), Some("cat"), Some("true"));
        assert_eq!(filter.state, Some(ReportState::Pending));
        assert_eq!(filter.severity, None);
        assert_eq!(filter.animal_type, Some(AnimalType::Cat));
        assert_eq!(filter.anonymous, Some(true));

        let all = QueueFilter::from_query(Some("todos"), None, Some(""), Some("all"));
        assert_eq!(all, QueueFilter::default());
    }
}
