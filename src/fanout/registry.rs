use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::ClientHandle;
use crate::muxer::{FanoutMultiplexer, SubscribeOutcome, UnsubscribeOutcome};
use crate::notify::IngestNotifier;

/// Tracks live client connections and their symbol interest.
///
/// Registering a client subscribes it on the fan-out multiplexer to every
/// symbol in its portfolio; unregistering reverses that, tearing down
/// channel streams the client was the last follower of. A reconnecting
/// client supersedes and closes its predecessor. First/last interest
/// transitions are reported to the ingest service best-effort.
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<Uuid, Arc<ClientHandle>>>,
    muxer: FanoutMultiplexer,
    notifier: Arc<IngestNotifier>,
}

impl ConnectionRegistry {
    pub fn new(muxer: FanoutMultiplexer, notifier: Arc<IngestNotifier>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            muxer,
            notifier,
        }
    }

    /// Install `client`, superseding any live connection with the same
    /// identity, and follow every symbol in its portfolio.
    pub fn register(&self, client: Arc<ClientHandle>) {
        {
            let mut clients = self.clients.lock();
            if let Some(old) = clients.insert(client.user_id, Arc::clone(&client)) {
                tracing::warn!(user_id = %client.user_id, "client re-registering, closing previous connection");
                old.close();
            }
        }
        tracing::info!(user_id = %client.user_id, "new client registered");

        let subscriber = client.user_id.to_string();
        for holding in &client.holdings {
            let outcome = self.muxer.add_subscriber(&holding.symbol, &subscriber);
            if outcome == SubscribeOutcome::Started {
                self.notifier.notify_follow(client.user_id, &holding.symbol);
            }
        }
    }

    /// Remove `client` and unfollow its symbols. A handle that was already
    /// superseded is left alone: the identity now belongs to the newer
    /// connection.
    pub fn unregister(&self, client: &Arc<ClientHandle>) {
        {
            let mut clients = self.clients.lock();
            match clients.get(&client.user_id) {
                Some(current) if Arc::ptr_eq(current, client) => {
                    clients.remove(&client.user_id);
                }
                _ => return,
            }
        }

        client.close();
        let subscriber = client.user_id.to_string();
        for holding in &client.holdings {
            let outcome = self.muxer.remove_subscriber(&holding.symbol, &subscriber);
            if outcome == UnsubscribeOutcome::Stopped {
                self.notifier.notify_unfollow(client.user_id, &holding.symbol);
            }
        }
        tracing::info!(user_id = %client.user_id, "client unregistered");
    }

    pub fn get(&self, user_id: &Uuid) -> Option<Arc<ClientHandle>> {
        self.clients.lock().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
