// Connection lifetime shared by every background task of a flow

use tokio::sync::watch;

/// Owner side of a connected session. Disconnecting (or dropping the
/// session) stops gas polling and confirmation watchers.
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<bool>,
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { rx: self.tx.subscribe() }
    }

    pub fn disconnect(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_connected(&self) -> bool {
        !*self.tx.borrow()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side held by tasks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn is_disconnected(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the session is disconnected or dropped.
    pub async fn disconnected(&mut self) {
        let _ = self.rx.wait_for(|gone| *gone).await;
    }
}
