//! Chat sessions.
//!
//! A session is a single logical thread of control: one task owns the
//! [`SyncController`] and is the only code that touches it. Connectivity
//! readings, channel snapshots and user commands all funnel into that task.
//! [`SessionHandle`] is the cloneable front end the UI talks to.

use crate::controller::SyncController;
use crate::error::{Result, SdkError};
use crate::events::SessionEvent;
use crate::media::{notice_for, DeviceAction, MediaActions};
use crate::view::ChatView;
use parley_core::{Author, ConnectivityState, Message, MessageList, Payload, SyncMode};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Observable state of a session, republished after every change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub messages: MessageList,
    pub mode: SyncMode,
    pub connectivity: ConnectivityState,
    pub closed: bool,
}

impl SessionState {
    fn capture(controller: &SyncController) -> Self {
        Self {
            messages: controller.messages().clone(),
            mode: controller.sync_mode(),
            connectivity: controller.connectivity(),
            closed: controller.is_torn_down(),
        }
    }
}

pub(crate) enum SessionCommand {
    Send {
        payload: Payload,
        reply: oneshot::Sender<Result<Message>>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    author: Author,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    state: watch::Receiver<SessionState>,
    media: MediaActions,
}

impl SessionHandle {
    /// Spawn the session task around an initialized controller.
    pub(crate) fn spawn(
        session_id: String,
        author: Author,
        controller: SyncController,
        connectivity: mpsc::UnboundedReceiver<ConnectivityState>,
        media: MediaActions,
        command_capacity: usize,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(command_capacity.max(1));
        let (state_tx, state) = watch::channel(SessionState::capture(&controller));
        let events = controller.event_sender();

        tokio::spawn(run_session(
            controller,
            author.clone(),
            command_rx,
            connectivity,
            state_tx,
        ));

        Self {
            session_id,
            author,
            commands,
            events,
            state,
            media,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The user this session sends as.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Send a message. It is at the head of the list once this returns.
    pub async fn send(&self, payload: Payload) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Send { payload, reply }).await?;
        rx.await.map_err(|_| SdkError::SessionClosed)?
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<Message> {
        self.send(Payload::text(text)).await
    }

    /// Run an attachment-sheet action and send its result.
    ///
    /// Failures are also published as a notice. `Ok(None)` means the user
    /// cancelled.
    pub async fn share(&self, action: DeviceAction) -> Result<Option<Message>> {
        match self.media.perform(action, &self.author.id).await {
            Ok(Some(payload)) => self.send(payload).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                if let Some(notice) = notice_for(&e) {
                    let _ = self.events.send(SessionEvent::Notice(notice));
                }
                Err(e)
            }
        }
    }

    /// Current message list, newest first.
    pub fn messages(&self) -> MessageList {
        self.state.borrow().messages.clone()
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.state.borrow().mode
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.state.borrow().connectivity
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Render the chat screen for this session's user.
    pub fn view(&self) -> ChatView {
        let state = self.state.borrow();
        ChatView::render(
            &self.author.name,
            &self.author.id,
            state.connectivity,
            state.mode,
            &state.messages,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Watch the session state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until background writes and publishes have finished and every
    /// delivered snapshot has been applied.
    pub async fn flush(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Flush { reply }).await?;
        rx.await.map_err(|_| SdkError::SessionClosed)
    }

    /// Tear the session down. Fails if it is already closed.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Close { reply }).await?;
        rx.await.map_err(|_| SdkError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SdkError::SessionClosed)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("author", &self.author)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_session(
    mut controller: SyncController,
    author: Author,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut connectivity: mpsc::UnboundedReceiver<ConnectivityState>,
    state: watch::Sender<SessionState>,
) {
    let mut watching = true;
    tracing::debug!(user = %author.id, "Session started");

    loop {
        // Connectivity first, then channel deliveries, so a command always
        // sees the latest state.
        tokio::select! {
            biased;

            reading = connectivity.recv(), if watching => match reading {
                Some(reading) => controller.on_connectivity_change(reading).await,
                None => {
                    tracing::debug!("Connectivity monitor dropped");
                    watching = false;
                    continue;
                }
            },

            event = controller.next_channel_event() => {
                controller.handle_channel_event(event);
            }

            command = commands.recv() => match command {
                Some(SessionCommand::Send { payload, reply }) => {
                    let result = controller.send(&author.id, &author.name, payload);
                    publish(&controller, &state);
                    let _ = reply.send(result);
                    continue;
                }
                Some(SessionCommand::Flush { reply }) => {
                    settle(&mut controller).await;
                    publish(&controller, &state);
                    let _ = reply.send(());
                    continue;
                }
                Some(SessionCommand::Close { reply }) => {
                    shut_down(&mut controller, &state).await;
                    let _ = reply.send(());
                    break;
                }
                None => {
                    tracing::debug!("All session handles dropped");
                    shut_down(&mut controller, &state).await;
                    break;
                }
            },
        }
        publish(&controller, &state);
    }
}

/// Await background work and apply whatever it caused to be delivered.
async fn settle(controller: &mut SyncController) {
    loop {
        controller.flush().await;
        if controller.drain_channel() == 0 {
            break;
        }
    }
}

async fn shut_down(controller: &mut SyncController, state: &watch::Sender<SessionState>) {
    controller.teardown();
    controller.flush().await;
    publish(controller, state);
}

fn publish(controller: &SyncController, state: &watch::Sender<SessionState>) {
    let next = SessionState::capture(controller);
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
