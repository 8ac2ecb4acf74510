use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::{ConnectionState, ConnectionTracker, NextStep, Reconciled, ReconnectPolicy, Transcript};
use crate::common::{ChatCommand, ChatEvent, ChatMessage, OutgoingMessage, SenderType};
use crate::error::{ClientError, Result, ValidationError};

use super::api::ChatBackend;
use super::transport::{Channel, ClientFrame, Connector, ServerFrame};

const CHANNEL_CAPACITY: usize = 100;

/// Who the local side of the conversation is.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_id: String,
    pub sender_type: SenderType,
    pub reconnect: ReconnectPolicy,
    /// Chat id remembered from an earlier run, used when history cannot be loaded.
    pub known_chat_id: Option<String>,
}

enum Connect<T> {
    Established(T),
    Unavailable,
    Shutdown,
}

enum Served {
    Dropped,
    Shutdown,
}

/// Chat session event loop: owns the transcript and the real-time channel.
pub struct ChatSession<C: Connector, B: ChatBackend> {
    connector: C,
    backend: Arc<B>,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    options: SessionOptions,
    transcript: Transcript,
    tracker: ConnectionTracker,
}

impl<C: Connector, B: ChatBackend + 'static> ChatSession<C, B> {
    pub fn new(
        connector: C,
        backend: Arc<B>,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        options: SessionOptions,
    ) -> Self {
        Self {
            connector,
            backend,
            event_sender,
            command_receiver,
            transcript: Transcript::new(options.sender_type),
            tracker: ConnectionTracker::new(options.reconnect),
            options,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.load_history().await;

        loop {
            let mut channel = match self.connect().await {
                Connect::Established(channel) => channel,
                Connect::Shutdown => {
                    let state = self.tracker.teardown();
                    self.emit(ChatEvent::ConnectionChanged(state)).await;
                    return Ok(());
                }
                Connect::Unavailable => {
                    self.serve_offline().await;
                    return Ok(());
                }
            };

            match self.serve(&mut channel).await {
                Served::Shutdown => {
                    channel.close().await;
                    let state = self.tracker.teardown();
                    self.emit(ChatEvent::ConnectionChanged(state)).await;
                    log::info!("Chat session closed");
                    return Ok(());
                }
                Served::Dropped => {
                    log::warn!("Chat channel dropped; reconnecting");
                    let state = self.tracker.on_dropped();
                    self.emit(ChatEvent::ConnectionChanged(state)).await;
                    if !self.wait_offline(self.tracker.policy().delay()).await {
                        log::info!("Chat session closed while reconnecting");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn load_history(&mut self) {
        match self.backend.chat_history().await {
            Ok(Some(history)) => {
                log::info!(
                    "Loaded chat {} with {} messages",
                    history.chat_id,
                    history.messages.len()
                );
                let chat_id = history.chat_id.clone();
                self.transcript.load_history(&chat_id, history.messages);
                self.emit(ChatEvent::SessionAssigned(chat_id)).await;
                self.emit_transcript().await;
            }
            Ok(None) => log::debug!("No chat session yet"),
            Err(err) => {
                log::warn!("Failed to load chat history: {err}");
                self.emit(ChatEvent::Notice(format!("Could not load chat history: {err}")))
                    .await;
                if let Some(chat_id) = self.options.known_chat_id.clone() {
                    self.assign_chat_id(&chat_id).await;
                }
            }
        }
    }

    async fn connect(&mut self) -> Connect<C::Channel> {
        loop {
            let Some(state) = self.tracker.begin_attempt() else {
                return Connect::Unavailable;
            };
            self.emit(ChatEvent::ConnectionChanged(state)).await;

            let err = match self.open_channel().await {
                Ok(channel) => {
                    let state = self.tracker.on_connected();
                    self.emit(ChatEvent::ConnectionChanged(state)).await;
                    return Connect::Established(channel);
                }
                Err(err) => err,
            };

            match self.tracker.on_attempt_failed() {
                NextStep::RetryAfter(delay) => {
                    log::warn!(
                        "Chat connection attempt {} failed: {err}; retrying in {delay:?}",
                        self.tracker.failed_attempts()
                    );
                    self.emit(ChatEvent::ConnectionChanged(self.tracker.state()))
                        .await;
                    if !self.wait_offline(delay).await {
                        return Connect::Shutdown;
                    }
                }
                NextStep::GiveUp { attempts } => {
                    log::error!("Chat unavailable after {attempts} attempts: {err}");
                    self.emit(ChatEvent::ConnectionChanged(ConnectionState::Unavailable))
                        .await;
                    self.emit(ChatEvent::Unavailable { attempts }).await;
                    return Connect::Unavailable;
                }
            }
        }
    }

    /// Connects and announces membership so the server can route to this session.
    async fn open_channel(&self) -> Result<C::Channel> {
        let mut channel = self.connector.connect().await?;
        let join = ClientFrame::Join {
            user_id: self.options.user_id.clone(),
        };
        if let Err(err) = channel.send(join).await {
            channel.close().await;
            return Err(err);
        }
        log::info!("Joined chat as {}", self.options.user_id);
        Ok(channel)
    }

    /// Sleeps for the retry delay while still handling commands.
    /// Returns `false` when the session should stop.
    async fn wait_offline(&mut self, delay: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.command_receiver.recv() => match command {
                    None | Some(ChatCommand::Shutdown) => return false,
                    Some(command) => self.handle_command(command, None).await,
                }
            }
        }
    }

    /// Degraded mode once the channel is unavailable: sends go over REST.
    async fn serve_offline(&mut self) {
        while let Some(command) = self.command_receiver.recv().await {
            if matches!(command, ChatCommand::Shutdown) {
                break;
            }
            self.handle_command(command, None).await;
        }
        log::info!("Chat session closed while unavailable");
    }

    async fn serve(&mut self, channel: &mut C::Channel) -> Served {
        loop {
            tokio::select! {
                command = self.command_receiver.recv() => match command {
                    None | Some(ChatCommand::Shutdown) => return Served::Shutdown,
                    Some(command) => self.handle_command(command, Some(&mut *channel)).await,
                },
                frame = channel.next_frame() => match frame {
                    Some(Ok(frame)) => self.handle_frame(frame).await,
                    Some(Err(ClientError::Decode(err))) => {
                        log::warn!("Ignoring malformed chat frame: {err}");
                    }
                    Some(Err(err)) => {
                        log::warn!("Chat channel error: {err}");
                        return Served::Dropped;
                    }
                    None => return Served::Dropped,
                }
            }
        }
    }

    async fn handle_command(&mut self, command: ChatCommand, channel: Option<&mut C::Channel>) {
        match command {
            ChatCommand::SendMessage(text) => self.send_message(text, channel).await,
            ChatCommand::OpenView => self.open_view().await,
            ChatCommand::Shutdown => {}
        }
    }

    async fn send_message(&mut self, text: String, channel: Option<&mut C::Channel>) {
        if text.trim().is_empty() {
            self.emit(ChatEvent::Notice(ValidationError::EmptyMessage.to_string()))
                .await;
            return;
        }

        let local = ChatMessage::optimistic(text, self.options.sender_type);
        let client_id = self.transcript.insert_optimistic(local.clone());
        self.emit_transcript().await;

        let outgoing = OutgoingMessage {
            user_id: self.options.user_id.clone(),
            message: local.message,
            sender_type: self.options.sender_type,
            client_id: Some(client_id),
        };

        if let Some(channel) = channel {
            match channel.send(ClientFrame::SendMessage(outgoing.clone())).await {
                Ok(()) => return,
                Err(err) => log::warn!("Real-time send failed, using REST fallback: {err}"),
            }
        }

        match self.backend.send_message(&outgoing).await {
            Ok(history) => {
                self.assign_chat_id(&history.chat_id).await;
                for message in history.messages {
                    self.transcript.apply_server_message(message);
                }
            }
            Err(err) => {
                log::warn!("Failed to send chat message: {err}");
                self.transcript.mark_failed(client_id);
                self.emit(ChatEvent::Notice(format!("Message not sent: {err}")))
                    .await;
            }
        }
        self.emit_transcript().await;
    }

    async fn open_view(&mut self) {
        if self.transcript.mark_all_read() > 0 {
            self.emit_transcript().await;
        }

        let Some(chat_id) = self.transcript.chat_id().map(str::to_string) else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(err) = backend.mark_read(&chat_id).await {
                log::warn!("Failed to mark chat {chat_id} as read: {err}");
            }
        });
    }

    async fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::ReceiveMessage { chat_id, message } => {
                if let Some(chat_id) = chat_id {
                    self.assign_chat_id(&chat_id).await;
                }
                match self.transcript.apply_server_message(message) {
                    Reconciled::Duplicate => return,
                    Reconciled::Acknowledged(client_id) => {
                        log::debug!("Message {client_id} confirmed by server");
                    }
                    Reconciled::Appended => log::debug!("New chat message received"),
                }
                self.emit_transcript().await;
            }
            ServerFrame::Unknown(event) => log::debug!("Ignoring chat event `{event}`"),
        }
    }

    async fn assign_chat_id(&mut self, chat_id: &str) {
        if self.transcript.assign_chat_id(chat_id) {
            self.emit(ChatEvent::SessionAssigned(chat_id.to_string()))
                .await;
        }
    }

    async fn emit_transcript(&self) {
        self.emit(ChatEvent::TranscriptUpdated(self.transcript.snapshot()))
            .await;
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::debug!("Chat view is gone, dropping event: {err}");
        }
    }
}

/// Owning handle of a running chat session.
///
/// Dropping the handle aborts the session task, which tears the channel down.
pub struct ChatHandle {
    commands: mpsc::Sender<ChatCommand>,
    events: mpsc::Receiver<ChatEvent>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ChatHandle {
    pub fn spawn<C, B>(connector: C, backend: Arc<B>, options: SessionOptions) -> Self
    where
        C: Connector + 'static,
        C::Channel: 'static,
        B: ChatBackend + 'static,
    {
        let (command_sender, command_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_sender, event_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        let session = ChatSession::new(connector, backend, event_sender, command_receiver, options);
        let task = tokio::spawn(session.run());

        Self {
            commands: command_sender,
            events: event_receiver,
            task: Some(task),
        }
    }

    /// Queues a message; blank text is rejected before it reaches the session.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.command(ChatCommand::SendMessage(text)).await
    }

    pub async fn open_view(&self) -> Result<()> {
        self.command(ChatCommand::OpenView).await
    }

    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.recv().await
    }

    /// Stops the session and waits for the channel to be closed.
    pub async fn close(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        // The session may already have stopped on its own.
        let _ = self.commands.send(ChatCommand::Shutdown).await;
        task.await
            .map_err(|err| ClientError::Channel(format!("chat task failed: {err}")))?
    }

    async fn command(&self, command: ChatCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Channel("chat session has stopped".to_string()))
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
    use tokio::time::Instant;

    use crate::chat::{Delivery, TranscriptEntry};
    use crate::common::ChatHistory;

    /// Server side of one accepted mock connection.
    struct ServerEnd {
        from_client: UnboundedReceiver<ClientFrame>,
        to_client: UnboundedSender<ServerFrame>,
    }

    struct MockChannel {
        outbound: UnboundedSender<ClientFrame>,
        inbound: UnboundedReceiver<ServerFrame>,
    }

    #[async_trait]
    impl Channel for MockChannel {
        async fn send(&mut self, frame: ClientFrame) -> Result<()> {
            self.outbound
                .send(frame)
                .map_err(|_| ClientError::Channel("server end closed".into()))
        }

        async fn next_frame(&mut self) -> Option<Result<ServerFrame>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            self.inbound.close();
        }
    }

    /// Fails the first `failures` attempts, then accepts.
    struct MockConnector {
        failures: Mutex<usize>,
        attempts: Arc<Mutex<Vec<Instant>>>,
        accepted: UnboundedSender<ServerEnd>,
    }

    impl MockConnector {
        fn new(failures: usize) -> (Self, UnboundedReceiver<ServerEnd>, Arc<Mutex<Vec<Instant>>>) {
            let (accepted, accepted_rx) = unbounded_channel();
            let attempts = Arc::new(Mutex::new(Vec::new()));
            let connector = Self {
                failures: Mutex::new(failures),
                attempts: Arc::clone(&attempts),
                accepted,
            };
            (connector, accepted_rx, attempts)
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Channel = MockChannel;

        async fn connect(&self) -> Result<MockChannel> {
            self.attempts.lock().unwrap().push(Instant::now());
            {
                let mut remaining = self.failures.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ClientError::Channel("connection refused".into()));
                }
            }
            let (outbound, from_client) = unbounded_channel();
            let (to_client, inbound) = unbounded_channel();
            let _ = self.accepted.send(ServerEnd {
                from_client,
                to_client,
            });
            Ok(MockChannel { outbound, inbound })
        }
    }

    #[derive(Default)]
    struct MockBackend {
        history: Option<ChatHistory>,
        fail_history: bool,
        fail_send: bool,
        fail_mark_read: bool,
        sent: Mutex<Vec<OutgoingMessage>>,
        marked: Mutex<Option<UnboundedSender<String>>>,
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn chat_history(&self) -> Result<Option<ChatHistory>> {
            if self.fail_history {
                return Err(ClientError::Status {
                    status: 503,
                    message: "maintenance".into(),
                });
            }
            Ok(self.history.clone())
        }

        async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatHistory> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail_send {
                return Err(ClientError::Status {
                    status: 502,
                    message: "bad gateway".into(),
                });
            }
            Ok(ChatHistory {
                chat_id: "chat-rest".into(),
                messages: vec![ChatMessage {
                    id: Some(format!("rest-{}", message.message)),
                    client_id: None,
                    message: message.message.clone(),
                    sender_type: message.sender_type,
                    timestamp: Utc::now(),
                    read: false,
                }],
            })
        }

        async fn mark_read(&self, chat_id: &str) -> Result<()> {
            if let Some(tx) = self.marked.lock().unwrap().as_ref() {
                let _ = tx.send(chat_id.to_string());
            }
            if self.fail_mark_read {
                return Err(ClientError::Status {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            user_id: "user-1".into(),
            sender_type: SenderType::User,
            reconnect: ReconnectPolicy::default(),
            known_chat_id: None,
        }
    }

    fn welcome(chat_id: &str) -> ChatHistory {
        ChatHistory {
            chat_id: chat_id.into(),
            messages: vec![ChatMessage {
                id: Some("m1".into()),
                client_id: None,
                message: "Welcome!".into(),
                sender_type: SenderType::Admin,
                timestamp: Utc::now() - chrono::Duration::minutes(5),
                read: false,
            }],
        }
    }

    async fn wait_for<F>(handle: &mut ChatHandle, mut predicate: F) -> ChatEvent
    where
        F: FnMut(&ChatEvent) -> bool,
    {
        loop {
            let event = handle.next_event().await.expect("session ended early");
            if predicate(&event) {
                return event;
            }
        }
    }

    async fn next_transcript(handle: &mut ChatHandle) -> Vec<TranscriptEntry> {
        match wait_for(handle, |event| matches!(event, ChatEvent::TranscriptUpdated(_))).await {
            ChatEvent::TranscriptUpdated(entries) => entries,
            _ => unreachable!(),
        }
    }

    async fn wait_connected(handle: &mut ChatHandle) {
        wait_for(handle, |event| {
            matches!(event, ChatEvent::ConnectionChanged(ConnectionState::Connected))
        })
        .await;
    }

    #[tokio::test]
    async fn optimistic_send_is_confirmed_without_duplication() {
        let (connector, mut accepted, _) = MockConnector::new(0);
        let backend = Arc::new(MockBackend::default());
        let mut handle = ChatHandle::spawn(connector, Arc::clone(&backend), options());

        wait_connected(&mut handle).await;
        let mut server = accepted.recv().await.unwrap();
        assert_eq!(
            server.from_client.recv().await,
            Some(ClientFrame::Join {
                user_id: "user-1".into()
            })
        );

        handle.send("hello").await.unwrap();
        let optimistic = next_transcript(&mut handle).await;
        assert_eq!(optimistic.len(), 1);
        assert_eq!(optimistic[0].message.message, "hello");
        assert_eq!(optimistic[0].message.id, None);
        assert!(!optimistic[0].message.read);
        assert_eq!(optimistic[0].delivery, Delivery::Pending);

        let Some(ClientFrame::SendMessage(outgoing)) = server.from_client.recv().await else {
            panic!("expected send-message frame");
        };
        assert_eq!(outgoing.client_id, optimistic[0].message.client_id);

        server
            .to_client
            .send(ServerFrame::ReceiveMessage {
                chat_id: Some("chat-1".into()),
                message: ChatMessage {
                    id: Some("srv-1".into()),
                    client_id: outgoing.client_id,
                    message: "hello".into(),
                    sender_type: SenderType::User,
                    timestamp: Utc::now(),
                    read: false,
                },
            })
            .unwrap();

        let confirmed = next_transcript(&mut handle).await;
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].message.id.as_deref(), Some("srv-1"));
        assert_eq!(confirmed[0].delivery, Delivery::Confirmed);

        server
            .to_client
            .send(ServerFrame::ReceiveMessage {
                chat_id: Some("chat-1".into()),
                message: ChatMessage {
                    id: Some("srv-2".into()),
                    client_id: None,
                    message: "hi, how can we help?".into(),
                    sender_type: SenderType::Admin,
                    timestamp: Utc::now(),
                    read: false,
                },
            })
            .unwrap();
        assert_eq!(next_transcript(&mut handle).await.len(), 2);
        assert!(backend.sent.lock().unwrap().is_empty());

        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_attempts_and_keeps_serving_over_rest() {
        let (connector, _accepted, attempts) = MockConnector::new(usize::MAX);
        let backend = Arc::new(MockBackend {
            history: Some(welcome("chat-rest")),
            ..Default::default()
        });
        let mut handle = ChatHandle::spawn(connector, Arc::clone(&backend), options());

        let event = wait_for(&mut handle, |event| {
            matches!(event, ChatEvent::Unavailable { .. })
        })
        .await;
        assert!(matches!(event, ChatEvent::Unavailable { attempts: 5 }));

        {
            let attempts = attempts.lock().unwrap();
            assert_eq!(attempts.len(), 5);
            for pair in attempts.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::from_millis(1000));
            }
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(attempts.lock().unwrap().len(), 5);

        // buffered history survives the terminal state
        handle.send("still there?").await.unwrap();
        let optimistic = next_transcript(&mut handle).await;
        assert_eq!(optimistic.len(), 2);
        assert_eq!(optimistic[0].message.id.as_deref(), Some("m1"));
        assert_eq!(optimistic[0].message.message, "Welcome!");
        assert_eq!(optimistic[1].delivery, Delivery::Pending);

        let confirmed = next_transcript(&mut handle).await;
        assert_eq!(confirmed.len(), 2);
        assert_eq!(confirmed[0].message.id.as_deref(), Some("m1"));
        assert_eq!(
            confirmed[1].message.id.as_deref(),
            Some("rest-still there?")
        );
        assert_eq!(confirmed[1].delivery, Delivery::Confirmed);
        assert_eq!(backend.sent.lock().unwrap().len(), 1);

        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rest_failure_marks_entry_failed() {
        let (connector, _accepted, _) = MockConnector::new(usize::MAX);
        let backend = Arc::new(MockBackend {
            fail_send: true,
            ..Default::default()
        });
        let mut handle = ChatHandle::spawn(connector, backend, options());

        wait_for(&mut handle, |event| {
            matches!(event, ChatEvent::Unavailable { .. })
        })
        .await;

        handle.send("lost").await.unwrap();
        assert_eq!(
            next_transcript(&mut handle).await[0].delivery,
            Delivery::Pending
        );
        let notice = wait_for(&mut handle, |event| matches!(event, ChatEvent::Notice(_))).await;
        assert!(matches!(notice, ChatEvent::Notice(text) if text.starts_with("Message not sent")));

        let after = next_transcript(&mut handle).await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].delivery, Delivery::Failed);
        assert_eq!(after[0].message.message, "lost");

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn blank_message_is_rejected_by_handle() {
        let (connector, _accepted, _) = MockConnector::new(0);
        let backend = Arc::new(MockBackend::default());
        let handle = ChatHandle::spawn(connector, Arc::clone(&backend), options());

        let err = handle.send("   ").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyMessage)
        ));
        assert!(backend.sent.lock().unwrap().is_empty());

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn remembered_chat_id_is_used_when_history_fails() {
        let (marked_tx, mut marked_rx) = unbounded_channel();
        let backend = Arc::new(MockBackend {
            fail_history: true,
            marked: Mutex::new(Some(marked_tx)),
            ..Default::default()
        });
        let (connector, _accepted, _) = MockConnector::new(0);
        let mut session_options = options();
        session_options.known_chat_id = Some("chat-saved".into());
        let mut handle = ChatHandle::spawn(connector, backend, session_options);

        let event = wait_for(&mut handle, |event| {
            matches!(event, ChatEvent::SessionAssigned(_))
        })
        .await;
        assert!(matches!(event, ChatEvent::SessionAssigned(id) if id == "chat-saved"));

        handle.open_view().await.unwrap();
        assert_eq!(marked_rx.recv().await.as_deref(), Some("chat-saved"));

        handle.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rejoins_after_channel_drop() {
        let (connector, mut accepted, attempts) = MockConnector::new(1);
        let backend = Arc::new(MockBackend::default());
        let mut handle = ChatHandle::spawn(connector, backend, options());

        wait_connected(&mut handle).await;
        assert_eq!(attempts.lock().unwrap().len(), 2);

        let first = accepted.recv().await.unwrap();
        drop(first);

        wait_for(&mut handle, |event| {
            matches!(event, ChatEvent::ConnectionChanged(ConnectionState::Disconnected))
        })
        .await;
        wait_connected(&mut handle).await;

        let mut second = accepted.recv().await.unwrap();
        assert!(matches!(
            second.from_client.recv().await,
            Some(ClientFrame::Join { .. })
        ));

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn opening_view_marks_known_chat_as_read() {
        let (marked_tx, mut marked_rx) = unbounded_channel();
        let backend = Arc::new(MockBackend {
            history: Some(welcome("chat-7")),
            fail_mark_read: true,
            marked: Mutex::new(Some(marked_tx)),
            ..Default::default()
        });
        let (connector, _accepted, _) = MockConnector::new(0);
        let mut handle = ChatHandle::spawn(connector, backend, options());

        let history = next_transcript(&mut handle).await;
        assert_eq!(history.len(), 1);
        assert!(!history[0].message.read);
        wait_connected(&mut handle).await;

        handle.open_view().await.unwrap();
        let read = next_transcript(&mut handle).await;
        assert!(read[0].message.read);
        assert_eq!(marked_rx.recv().await.as_deref(), Some("chat-7"));

        // the failed mark-read is only logged; the session keeps working
        handle.send("thanks").await.unwrap();
        loop {
            match handle.next_event().await.expect("session ended early") {
                ChatEvent::Notice(notice) => panic!("mark-read failure surfaced: {notice}"),
                ChatEvent::TranscriptUpdated(entries) if entries.len() == 2 => break,
                _ => {}
            }
        }

        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_tears_the_channel_down() {
        let (connector, mut accepted, _) = MockConnector::new(0);
        let mut handle = ChatHandle::spawn(connector, Arc::new(MockBackend::default()), options());
        wait_connected(&mut handle).await;
        let mut server = accepted.recv().await.unwrap();

        handle.close().await.unwrap();

        // join, then nothing: the client side of the channel is gone
        assert!(matches!(server.from_client.recv().await, Some(ClientFrame::Join { .. })));
        assert_eq!(server.from_client.recv().await, None);
    }
}
