use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::candidate::MatchCandidate;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
    Stopped,
}

impl SessionStatus {
    /// Terminal states are absorbing: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// One in-progress multi-turn dialogue.
///
/// A session has exactly one active topic and at most one pending step.
/// All mutation goes through [`super::DialogueEngine`], except candidate
/// pinning, which the driving caller performs between a lookup and the
/// selection turn that consumes it.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub(crate) topic: String,
    pub(crate) variables: BTreeMap<String, String>,
    pub(crate) status: SessionStatus,
    pub(crate) pending_step: Option<usize>,
    candidates: Vec<MatchCandidate>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        topic: impl Into<String>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            topic: topic.into(),
            variables,
            status: SessionStatus::Active,
            pending_step: None,
            candidates: Vec::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn pending_step(&self) -> Option<usize> {
        self.pending_step
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub(crate) fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Pins the candidate list fetched for the current turn. Selection must
    /// resolve against this list rather than re-querying, so a typed id always
    /// refers to what the user was actually shown.
    pub fn pin_candidates(&mut self, candidates: Vec<MatchCandidate>) {
        self.candidates = candidates;
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::domain::candidate::MatchCandidate;

    use super::{Session, SessionId, SessionStatus};

    #[test]
    fn generated_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn terminal_states_are_recognized() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
    }

    #[test]
    fn pinned_candidates_replace_previous_turn() {
        let mut session =
            Session::new(SessionId("s-1".to_owned()), "default", BTreeMap::new());
        session.pin_candidates(vec![MatchCandidate {
            id: "1".to_owned(),
            display_name: "Alpha".to_owned(),
            correlation_token: "tok-1".to_owned(),
        }]);
        session.pin_candidates(vec![MatchCandidate {
            id: "2".to_owned(),
            display_name: "Beta".to_owned(),
            correlation_token: "tok-2".to_owned(),
        }]);

        assert_eq!(session.candidates().len(), 1);
        assert_eq!(session.candidates()[0].id, "2");
    }

    #[test]
    fn later_variable_writes_overwrite() {
        let mut session =
            Session::new(SessionId("s-2".to_owned()), "default", BTreeMap::new());
        session.set_var("query", "alpha");
        session.set_var("query", "beta");
        assert_eq!(session.var("query"), Some("beta"));
    }
}
