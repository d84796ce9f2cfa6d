use crate::error::{Result, RotelError};
use crate::state::DeviceState;
use tokio::sync::broadcast;

/// State update from a subscription.
///
/// Each variant carries a copy of the state right after the change.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Front panel feedback was applied
    Feedback(Box<DeviceState>),

    /// The 12V trigger list changed
    Trigger(Box<DeviceState>),

    /// Smart display lines were merged
    SmartDisplay(Box<DeviceState>),

    /// The session reset the state while reconnecting
    Reset(Box<DeviceState>),
}

impl StateUpdate {
    /// State after the update
    pub fn state(&self) -> &DeviceState {
        match self {
            StateUpdate::Feedback(state)
            | StateUpdate::Trigger(state)
            | StateUpdate::SmartDisplay(state)
            | StateUpdate::Reset(state) => state,
        }
    }
}

/// Receiver for state updates
pub struct StateReceiver {
    rx: broadcast::Receiver<StateUpdate>,
}

impl StateReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<StateUpdate>) -> Self {
        Self { rx }
    }

    /// Receive the next state update
    ///
    /// Fails with `ConnectionClosed` once the session is gone.
    pub async fn recv(&mut self) -> Result<StateUpdate> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => RotelError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => RotelError::Lagged(n),
        })
    }

    /// Try to receive a state update without blocking
    ///
    /// Returns `None` if no update is available.
    pub fn try_recv(&mut self) -> Result<Option<StateUpdate>> {
        match self.rx.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(RotelError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(RotelError::Lagged(n)),
        }
    }
}
