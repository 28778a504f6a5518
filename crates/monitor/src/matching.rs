use curator_core::domain::candidate::MatchCandidate;

use crate::client::Channel;

/// Bound to the display variable when a lookup matched nothing.
pub const NO_MATCH_SENTINEL: &str = "no match";

/// Filters the channel directory by case-insensitive substring match on the
/// channel name, preserving directory order.
pub fn match_channels(channels: &[Channel], query: &str) -> Vec<MatchCandidate> {
    let needle = query.to_lowercase();
    channels
        .iter()
        .filter(|channel| channel.name.to_lowercase().contains(&needle))
        .map(|channel| MatchCandidate {
            id: channel.id.clone(),
            display_name: channel.name.clone(),
            correlation_token: channel.token.clone(),
        })
        .collect()
}

/// Renders candidates for prompt display: `[id] name ;` per candidate,
/// concatenated without separators.
pub fn display_list(candidates: &[MatchCandidate]) -> String {
    let mut output = String::new();
    for candidate in candidates {
        output.push_str(&format!("[{}] {} ;", candidate.id, candidate.display_name));
    }
    output
}
