/// One raw inbound chat message, already scoped to a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub conversation_id: String,
    pub user_id: String,
    pub text: String,
}

impl IncomingMessage {
    pub fn new(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            text: text.into(),
        }
    }
}
