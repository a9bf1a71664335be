use crate::attachments::ImageRef;
use crate::types::ResponseId;

/// Per-session conversation state.
///
/// Holds the identifier the next turn continues from and the attachments
/// queued for it. Each presentation context owns its own value; nothing here is
/// shared between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    current_response_id: Option<ResponseId>,
    pending: Vec<ImageRef>,
}

impl SessionState {
    /// Fresh session that starts a new conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Session continuing from an existing response
    pub fn resume(id: ResponseId) -> Self {
        Self {
            current_response_id: Some(id),
            pending: Vec::new(),
        }
    }

    pub fn current_response_id(&self) -> Option<&ResponseId> {
        self.current_response_id.as_ref()
    }

    pub fn set_response_id(&mut self, id: ResponseId) {
        self.current_response_id = Some(id);
    }

    /// Forgets the current identifier so the next turn starts a new conversation
    pub fn reset(&mut self) {
        self.current_response_id = None;
    }

    pub fn queue_attachment(&mut self, attachment: ImageRef) {
        self.pending.push(attachment);
    }

    pub fn clear_attachments(&mut self) {
        self.pending.clear();
    }

    pub fn pending_attachments(&self) -> &[ImageRef] {
        &self.pending
    }

    /// (local files, remote URLs) currently queued
    pub fn pending_counts(&self) -> (usize, usize) {
        let remote = self.pending.iter().filter(|a| a.is_remote()).count();
        (self.pending.len() - remote, remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ResponseId {
        ResponseId::parse(raw).unwrap()
    }

    #[test]
    fn test_new_session_has_no_id() {
        let session = SessionState::new();
        assert!(session.current_response_id().is_none());
        assert!(session.pending_attachments().is_empty());
    }

    #[test]
    fn test_set_overwrites_and_reset_is_idempotent() {
        let mut session = SessionState::resume(id("resp_1"));
        session.set_response_id(id("resp_2"));
        assert_eq!(session.current_response_id(), Some(&id("resp_2")));

        session.reset();
        assert!(session.current_response_id().is_none());
        session.reset();
        assert!(session.current_response_id().is_none());
    }

    #[test]
    fn test_attachment_queue_keeps_order_and_duplicates() {
        let mut session = SessionState::new();
        session.queue_attachment(ImageRef::path("a.png"));
        session.queue_attachment(ImageRef::url("https://x/y.png"));
        session.queue_attachment(ImageRef::path("a.png"));

        assert_eq!(
            session.pending_attachments(),
            &[
                ImageRef::path("a.png"),
                ImageRef::url("https://x/y.png"),
                ImageRef::path("a.png"),
            ]
        );
        assert_eq!(session.pending_counts(), (2, 1));

        session.clear_attachments();
        assert!(session.pending_attachments().is_empty());
    }

    #[test]
    fn test_reset_keeps_pending_attachments() {
        let mut session = SessionState::resume(id("resp_1"));
        session.queue_attachment(ImageRef::url("https://x/y.png"));
        session.reset();
        assert_eq!(session.pending_attachments().len(), 1);
    }
}
