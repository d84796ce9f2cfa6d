//! State reconciler for one processor.
//!
//! A [`Session`] owns the current [`Connection`] and a background task that
//! reads messages from it and folds them into a [`DeviceState`]. Every change
//! is broadcast to subscribers as a [`StateUpdate`].

use crate::connection::{Connection, ConnectionFactory};
use crate::error::{Result, RotelError};
use crate::messages::Message;
use crate::model::RotelModelMeta;
use crate::state::{DeviceState, PowerState};
use crate::subscription::{StateReceiver, StateUpdate};
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// State shared between the session and its read task
struct Shared {
    unique_id: String,
    meta: &'static RotelModelMeta,
    state: std::sync::Mutex<DeviceState>,
    update_tx: broadcast::Sender<StateUpdate>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, update: StateUpdate) {
        // No subscribers is fine
        let _ = self.update_tx.send(update);
    }

    /// Apply one message to the state and tell subscribers about it
    fn handle_message(&self, message: Message) -> Result<()> {
        let update = {
            let mut state = self.lock_state();
            match message {
                Message::Feedback(feedback) => {
                    state.apply_feedback(&feedback, self.meta)?;
                    StateUpdate::Feedback(Box::new(state.clone()))
                }
                Message::Trigger(trigger) => {
                    state.apply_trigger(&trigger);
                    StateUpdate::Trigger(Box::new(state.clone()))
                }
                Message::SmartDisplay(display) => {
                    state.apply_smart_display(&display)?;
                    StateUpdate::SmartDisplay(Box::new(state.clone()))
                }
                Message::Other(other) => {
                    let error = RotelError::UnknownMessageVariant(other.message_type);
                    tracing::error!(unique_id = %self.unique_id, error = %error, "Ignoring message");
                    return Ok(());
                }
            }
        };
        tracing::debug!(unique_id = %self.unique_id, update = ?update, "State updated");
        self.notify(update);
        Ok(())
    }
}

struct ReaderHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

/// Read loop: ask for a display refresh, then apply messages until
/// cancelled or the stream fails
async fn read_messages(shared: Arc<Shared>, connection: Arc<Connection>, cancel: CancellationToken) -> Result<()> {
    let mut messages = connection.read_messages().await?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!(unique_id = %shared.unique_id, "Reader cancelled");
            return Ok(());
        }
        sent = connection.send_command("DISPLAY_REFRESH") => sent?,
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(unique_id = %shared.unique_id, "Reader cancelled");
                return Ok(());
            }
            next = messages.next_message() => next,
        };

        match next {
            Some(Ok(message)) => shared.handle_message(message)?,
            Some(Err(e)) => return Err(e),
            None => return Err(RotelError::ConnectionClosed),
        }
    }
}

/// A live session with one processor
pub struct Session {
    factory: ConnectionFactory,
    shared: Arc<Shared>,
    connection: std::sync::Mutex<Arc<Connection>>,
    /// Also serialises start, reconnect and shutdown
    reader: Mutex<Option<ReaderHandle>>,
}

impl Session {
    /// Create a session; nothing is opened until [`Session::start`]
    pub fn new(unique_id: impl Into<String>, factory: ConnectionFactory) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let connection = Arc::new(factory.make_conn());
        Self {
            shared: Arc::new(Shared {
                unique_id: unique_id.into(),
                meta: factory.meta(),
                state: std::sync::Mutex::new(DeviceState::new()),
                update_tx,
            }),
            factory,
            connection: std::sync::Mutex::new(connection),
            reader: Mutex::new(None),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.shared.unique_id
    }

    pub fn meta(&self) -> &'static RotelModelMeta {
        self.shared.meta
    }

    fn current_connection(&self) -> Arc<Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn spawn_reader(&self, connection: Arc<Connection>) -> ReaderHandle {
        let cancel = CancellationToken::new();
        let shared = self.shared.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let unique_id = shared.unique_id.clone();
            let result = read_messages(shared, connection, token).await;
            if let Err(e) = &result {
                tracing::warn!(unique_id = %unique_id, error = %e, "Reader stopped");
            }
            result
        });
        ReaderHandle { cancel, task }
    }

    /// Open the connection and start reading.
    ///
    /// Calling it again while the reader runs does nothing. Once the reader
    /// has stopped on a fault this fails with `ConnectionClosed`; only
    /// [`Session::reconnect`] brings the session back.
    pub async fn start(&self) -> Result<()> {
        let mut reader = self.reader.lock().await;
        if let Some(handle) = reader.as_ref() {
            if handle.task.is_finished() {
                tracing::warn!(unique_id = %self.shared.unique_id, "Reader has stopped, reconnect to restart it");
                return Err(RotelError::ConnectionClosed);
            }
            tracing::debug!(unique_id = %self.shared.unique_id, "Session already started");
            return Ok(());
        }

        let connection = self.current_connection();
        connection.open().await?;
        *reader = Some(self.spawn_reader(connection));
        tracing::info!(unique_id = %self.shared.unique_id, port = %self.factory.port(), "Session started");
        Ok(())
    }

    /// Cancel the read task, wait for it and log how it ended
    async fn stop_reader(&self, handle: Option<ReaderHandle>) {
        let Some(handle) = handle else {
            return;
        };
        handle.cancel.cancel();
        match handle.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(unique_id = %self.shared.unique_id, error = %e, "Reader had failed");
            }
            Err(e) => {
                let error = RotelError::Task(e.to_string());
                tracing::error!(unique_id = %self.shared.unique_id, error = %error, "Reader task failed");
            }
        }
    }

    async fn close_connection(&self) {
        if let Err(e) = self.current_connection().close().await {
            tracing::warn!(unique_id = %self.shared.unique_id, error = %e, "Error closing connection");
        }
    }

    /// Drop the current connection and start over on a new one.
    ///
    /// The device is assumed off until its feedback says otherwise.
    pub async fn reconnect(&self) -> Result<()> {
        let mut reader = self.reader.lock().await;
        tracing::info!(unique_id = %self.shared.unique_id, "Reconnecting");

        self.stop_reader(reader.take()).await;
        self.close_connection().await;

        let update = {
            let mut state = self.shared.lock_state();
            state.power = PowerState::Off;
            StateUpdate::Reset(Box::new(state.clone()))
        };
        self.shared.notify(update);

        let connection = Arc::new(self.factory.make_conn());
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = connection.clone();
        connection.open().await?;
        *reader = Some(self.spawn_reader(connection));
        Ok(())
    }

    /// Stop reading and close the connection
    pub async fn shutdown(&self) {
        let mut reader = self.reader.lock().await;
        self.stop_reader(reader.take()).await;
        self.close_connection().await;
        tracing::info!(unique_id = %self.shared.unique_id, "Session shut down");
    }

    /// Whether the read task is running
    pub async fn is_reading(&self) -> bool {
        self.reader
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Send a named command on the current connection
    pub async fn send_command(&self, name: &str) -> Result<()> {
        self.current_connection().send_command(name).await
    }

    /// Set the absolute volume of a zone on the current connection
    pub async fn send_volume_direct(&self, zone: u8, level: u8) -> Result<()> {
        self.current_connection().send_volume_direct(zone, level).await
    }

    /// Record a power state the device has not confirmed yet
    pub fn assume_power(&self, power: PowerState) {
        self.shared.lock_state().power = power;
    }

    /// Copy of the current state
    pub fn state(&self) -> DeviceState {
        self.shared.lock_state().clone()
    }

    pub fn subscribe(&self) -> StateReceiver {
        StateReceiver::new(self.shared.update_tx.subscribe())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.cancel.cancel();
            // In case it is stuck in a write
            handle.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::tests::{feedback_frame, status_line};
    use crate::messages::FeedbackMessage;
    use crate::mock::{read_frame, MockConnector};
    use crate::model::{RSP1570, RSP1572};
    use crate::protocol::{encode_frame, Frame, MSG_TYPE_PRIMARY_COMMAND, MSG_TYPE_SMART_DISPLAY, MSG_TYPE_TRIGGER};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn session(meta: &'static RotelModelMeta) -> (Session, Arc<MockConnector>, tokio::sync::mpsc::UnboundedReceiver<tokio::io::DuplexStream>) {
        let (connector, devices) = MockConnector::new();
        let factory = ConnectionFactory::new("/dev/ttyUSB0", meta, connector.clone());
        (Session::new("rotel-1", factory), connector, devices)
    }

    fn refresh_frame(meta: &RotelModelMeta) -> Frame {
        Frame::new(meta.device_id, MSG_TYPE_PRIMARY_COMMAND, vec![0xFF])
    }

    async fn wait_until_stopped(session: &Session) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.is_reading().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reader did not stop");
    }

    #[tokio::test]
    async fn reader_sends_display_refresh_first() {
        let (session, _connector, mut devices) = session(&RSP1570);
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        assert_eq!(read_frame(&mut device).await, refresh_frame(&RSP1570));
        assert!(session.is_reading().await);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn updates_follow_message_order() {
        let (session, _connector, mut devices) = session(&RSP1570);
        let mut updates = session.subscribe();
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        let feedback = FeedbackMessage::new(status_line("CD", false, "VOL 48"), "", [0; 5]);
        let mut bytes = feedback_frame(&RSP1570, &feedback).encode();
        bytes.extend(encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x02]));
        let last = FeedbackMessage::new(status_line("TUNER", false, "VOL 24"), "", [0; 5]);
        bytes.extend(feedback_frame(&RSP1570, &last).encode());
        device.write_all(&bytes).await.unwrap();

        let first = updates.recv().await.unwrap();
        assert!(matches!(first, StateUpdate::Feedback(_)));
        assert_eq!(first.state().power, PowerState::On);
        assert_eq!(first.state().volume_level, Some(0.5));
        let second = updates.recv().await.unwrap();
        assert!(matches!(second, StateUpdate::Trigger(_)));
        assert_eq!(second.state().triggers, Some(vec!["2".to_string()]));
        assert_eq!(second.state().source.as_deref(), Some("CD"));
        let third = updates.recv().await.unwrap();
        assert!(matches!(third, StateUpdate::Feedback(_)));

        let state = session.state();
        assert_eq!(state.source.as_deref(), Some("TUNER"));
        assert_eq!(state.device_volume, Some(24));
        assert_eq!(state.triggers, Some(vec!["2".to_string()]));
        session.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_messages_are_skipped() {
        let (session, _connector, mut devices) = session(&RSP1570);
        let mut updates = session.subscribe();
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        let mut bytes = encode_frame(0xA3, MSG_TYPE_SMART_DISPLAY, &[0x01, b'x']);
        bytes.extend(encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x01]));
        device.write_all(&bytes).await.unwrap();

        assert!(matches!(updates.recv().await.unwrap(), StateUpdate::Trigger(_)));
        assert!(session.is_reading().await);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn smart_display_is_merged_on_rsp1572() {
        let (session, _connector, mut devices) = session(&RSP1572);
        let mut updates = session.subscribe();
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        let mut data = vec![0x02];
        data.extend(format!("{:<21}", "Line 2").bytes());
        device
            .write_all(&encode_frame(0xA5, MSG_TYPE_SMART_DISPLAY, &data))
            .await
            .unwrap();

        let update = updates.recv().await.unwrap();
        let display = update.state().smart_display.clone().unwrap();
        assert_eq!(display.lines()[0], "");
        assert_eq!(display.lines()[1], "Line 2");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_resets_power_and_restarts_reader() {
        let (session, connector, mut devices) = session(&RSP1570);
        let mut updates = session.subscribe();
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        let feedback = FeedbackMessage::new(status_line("CD", false, "VOL 20"), "", [0; 5]);
        device
            .write_all(&feedback_frame(&RSP1570, &feedback).encode())
            .await
            .unwrap();
        assert_eq!(updates.recv().await.unwrap().state().power, PowerState::On);

        session.reconnect().await.unwrap();
        let reset = updates.recv().await.unwrap();
        assert!(matches!(reset, StateUpdate::Reset(_)));
        assert_eq!(reset.state().power, PowerState::Off);
        assert_eq!(session.state().power, PowerState::Off);
        assert_eq!(connector.connects(), 2);

        let mut device = devices.recv().await.unwrap();
        assert_eq!(read_frame(&mut device).await, refresh_frame(&RSP1570));
        assert!(session.is_reading().await);

        session.send_command("POWER_ON").await.unwrap();
        assert_eq!(
            read_frame(&mut device).await,
            Frame::new(0xA3, MSG_TYPE_PRIMARY_COMMAND, vec![0x4B])
        );
        session.shutdown().await;
    }

    #[tokio::test]
    async fn decode_fault_stops_reader_until_reconnect() {
        let (session, _connector, mut devices) = session(&RSP1570);
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        device
            .write_all(&encode_frame(0xA5, MSG_TYPE_TRIGGER, &[0x01]))
            .await
            .unwrap();
        wait_until_stopped(&session).await;
        assert!(matches!(session.start().await, Err(RotelError::ConnectionClosed)));

        session.reconnect().await.unwrap();
        assert!(session.is_reading().await);
        session.start().await.unwrap();
        session.shutdown().await;
    }

    #[tokio::test]
    async fn dropping_session_releases_link() {
        let (session, _connector, mut devices) = session(&RSP1570);
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;
        drop(session);

        let mut byte = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(1), device.read(&mut byte))
            .await
            .expect("link still held after drop")
            .unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn out_of_range_volume_is_a_fault() {
        let (session, _connector, mut devices) = session(&RSP1570);
        session.start().await.unwrap();
        let mut device = devices.recv().await.unwrap();
        read_frame(&mut device).await;

        let feedback = FeedbackMessage::new(status_line("CD", false, "VOL 97"), "", [0; 5]);
        device
            .write_all(&feedback_frame(&RSP1570, &feedback).encode())
            .await
            .unwrap();
        wait_until_stopped(&session).await;
        assert_eq!(session.state(), DeviceState::new());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_reader_promptly() {
        let (session, _connector, mut devices) = session(&RSP1570);
        session.start().await.unwrap();
        let _device = devices.recv().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), session.shutdown())
            .await
            .expect("shutdown hung");
        assert!(!session.is_reading().await);
        assert!(matches!(
            session.send_command("POWER_ON").await,
            Err(RotelError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn open_failure_propagates() {
        let (session, connector, _devices) = session(&RSP1570);
        connector.fail_next_connect();
        assert!(matches!(session.start().await, Err(RotelError::Connection { .. })));
        assert!(!session.is_reading().await);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_open_failure_propagates() {
        let (session, connector, _devices) = session(&RSP1570);
        session.start().await.unwrap();
        connector.fail_next_connect();
        assert!(matches!(session.reconnect().await, Err(RotelError::Connection { .. })));
        assert!(!session.is_reading().await);
    }

    #[tokio::test]
    async fn assumed_power_is_not_broadcast() {
        let (session, _connector, _devices) = session(&RSP1570);
        let mut updates = session.subscribe();
        session.assume_power(PowerState::On);
        assert_eq!(session.state().power, PowerState::On);
        assert!(updates.try_recv().unwrap().is_none());
    }
}
