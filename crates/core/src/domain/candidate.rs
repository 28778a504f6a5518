use serde::{Deserialize, Serialize};

/// One remotely fetched channel offered to the user for selection.
///
/// Candidates are recomputed on every lookup and live only as long as the
/// question-answer round trip they were fetched for; they are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
    pub display_name: String,
    pub correlation_token: String,
}
