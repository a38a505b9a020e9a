use std::sync::Arc;

use tokio::sync::watch::{self, Receiver, Sender};

/// Stops every virtual user at once, interrupting the iteration in flight.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender: Arc::new(sender) }
    }

    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        self.sender.send_replace(true);
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener { receiver: self.sender.subscribe() }
    }

    /// Shut down on the first Ctrl-C.
    pub fn listen_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => handle.shutdown(),
                Err(e) => tracing::warn!("cannot listen for ctrl-c: {}", e),
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: Receiver<bool>,
}

impl ShutdownListener {
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown is requested, never if the handle is gone without requesting it.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
