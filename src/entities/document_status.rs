/// Lifecycle shared by all four document kinds.
///
/// `draft → ready → done`, with cancellation allowed from `draft` and
/// `ready`. `done` and `cancelled` are terminal. `ready` exists as a hook
/// for a future approval step; validation currently accepts it on equal
/// footing with `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Draft,
    Ready,
    Done,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Done => "done",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DocumentStatus::Draft),
            "ready" => Some(DocumentStatus::Ready),
            "done" => Some(DocumentStatus::Done),
            "cancelled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Done | DocumentStatus::Cancelled)
    }

    /// Editable means header and lines may still be replaced.
    pub fn is_editable(&self) -> bool {
        matches!(self, DocumentStatus::Draft)
    }

    pub fn can_validate(&self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::Ready)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_everything() {
        for status in [DocumentStatus::Done, DocumentStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(!status.is_editable());
            assert!(!status.can_validate());
            assert!(!status.can_cancel());
        }
    }

    #[test]
    fn ready_validates_like_draft() {
        assert!(DocumentStatus::Draft.can_validate());
        assert!(DocumentStatus::Ready.can_validate());
        assert!(DocumentStatus::Ready.can_cancel());
        assert!(!DocumentStatus::Ready.is_editable());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Ready,
            DocumentStatus::Done,
            DocumentStatus::Cancelled,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::from_str("archived"), None);
    }
}
