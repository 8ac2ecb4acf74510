/// Commands the view sends down to the chat session.
#[derive(Debug, Clone)]
pub enum ChatCommand {
    SendMessage(String),
    /// The chat view became visible; mark the conversation as read.
    OpenView,
    /// Tear the channel down and stop the session.
    Shutdown,
}
