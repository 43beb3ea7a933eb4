//! Event hub actor and its handle
//!
//! One task owns the subscriber registry. Every subscribe, unsubscribe and
//! publish is a command on a single channel, so registry mutations are
//! serialized without locks. Delivery into subscriber queues never waits: a
//! full queue marks the subscriber unresponsive and removes it.

use crate::config::HubConfig;
use crate::hub::event::CrawlEvent;
use crate::hub::sink::MessageSink;
use crate::hub::HubError;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Identifies one registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which subscribers a publish reaches
#[derive(Debug, Clone, PartialEq, Eq)]
enum Audience {
    Everyone,
    Owner(String),
}

impl Audience {
    fn includes(&self, owner: Option<&str>) -> bool {
        match self {
            Self::Everyone => true,
            Self::Owner(target) => owner == Some(target.as_str()),
        }
    }
}

enum HubCommand {
    Subscribe {
        id: SubscriberId,
        owner: Option<String>,
        queue: mpsc::Sender<Arc<str>>,
        close: oneshot::Sender<()>,
    },
    Unsubscribe {
        id: SubscriberId,
    },
    Publish {
        audience: Audience,
        event: CrawlEvent,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Registry entry; dropping it closes the subscriber's queue and stops its pump
struct Subscriber {
    owner: Option<String>,
    queue: mpsc::Sender<Arc<str>>,
    _close: oneshot::Sender<()>,
}

/// Cloneable handle to the event hub task
///
/// The hub task runs until every handle is dropped.
#[derive(Debug, Clone)]
pub struct EventHub {
    commands: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe { id, owner, .. } => f
                .debug_struct("Subscribe")
                .field("id", id)
                .field("owner", owner)
                .finish(),
            Self::Unsubscribe { id } => f.debug_struct("Unsubscribe").field("id", id).finish(),
            Self::Publish { audience, event } => f
                .debug_struct("Publish")
                .field("audience", audience)
                .field("type", &event.kind())
                .finish(),
            Self::Count { .. } => f.write_str("Count"),
        }
    }
}

impl EventHub {
    /// Spawns the hub task and returns a handle to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &HubConfig) -> Self {
        let (commands, receiver) = mpsc::channel(config.command_buffer.max(1));
        tokio::spawn(run_hub(receiver));

        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: config.subscriber_queue_capacity.max(1),
        }
    }

    /// Registers a connection for an owner
    ///
    /// The connection receives every broadcast and every event published to
    /// `owner` from now on.
    pub async fn subscribe<S: MessageSink>(
        &self,
        owner: impl Into<String>,
        sink: S,
    ) -> Result<SubscriberId, HubError> {
        self.register(Some(owner.into()), sink).await
    }

    /// Registers a connection that only receives broadcasts
    pub async fn subscribe_broadcast<S: MessageSink>(&self, sink: S) -> Result<SubscriberId, HubError> {
        self.register(None, sink).await
    }

    /// Removes a subscriber; undelivered messages for it are discarded
    pub async fn unsubscribe(&self, id: SubscriberId) -> Result<(), HubError> {
        self.send(HubCommand::Unsubscribe { id }).await
    }

    /// Delivers an event to every subscriber
    pub async fn publish(&self, event: CrawlEvent) -> Result<(), HubError> {
        self.send(HubCommand::Publish {
            audience: Audience::Everyone,
            event,
        })
        .await
    }

    /// Delivers an event to the subscribers registered for `owner`
    pub async fn publish_to_owner(&self, owner: &str, event: CrawlEvent) -> Result<(), HubError> {
        self.send(HubCommand::Publish {
            audience: Audience::Owner(owner.to_string()),
            event,
        })
        .await
    }

    /// Number of live subscribers, after every command sent before this call
    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubCommand::Count { reply }).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    async fn register<S: MessageSink>(
        &self,
        owner: Option<String>,
        sink: S,
    ) -> Result<SubscriberId, HubError> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, pending) = mpsc::channel(self.queue_capacity);
        let (close, closed) = oneshot::channel();

        tokio::spawn(run_pump(id, pending, closed, sink, self.commands.downgrade()));

        self.send(HubCommand::Subscribe {
            id,
            owner,
            queue,
            close,
        })
        .await?;

        Ok(id)
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }
}

/// The hub's coordinating loop; sole owner of the registry
async fn run_hub(mut commands: mpsc::Receiver<HubCommand>) {
    let mut registry: HashMap<SubscriberId, Subscriber> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Subscribe {
                id,
                owner,
                queue,
                close,
            } => {
                tracing::debug!("Subscriber {} connected (owner: {:?})", id, owner);
                registry.insert(
                    id,
                    Subscriber {
                        owner,
                        queue,
                        _close: close,
                    },
                );
                tracing::info!("Subscriber connected. Total subscribers: {}", registry.len());
            }

            HubCommand::Unsubscribe { id } => {
                if registry.remove(&id).is_some() {
                    tracing::info!(
                        "Subscriber {} disconnected. Total subscribers: {}",
                        id,
                        registry.len()
                    );
                }
            }

            HubCommand::Publish { audience, event } => {
                fan_out(&mut registry, &audience, &event);
            }

            HubCommand::Count { reply } => {
                let _ = reply.send(registry.len());
            }
        }
    }

    tracing::debug!("Event hub stopped with {} subscribers", registry.len());
}

/// Serializes once and enqueues onto every matching subscriber
fn fan_out(registry: &mut HashMap<SubscriberId, Subscriber>, audience: &Audience, event: &CrawlEvent) {
    let message: Arc<str> = match serde_json::to_string(event) {
        Ok(json) => json.into(),
        Err(e) => {
            tracing::error!("Dropping '{}' event for {}: {}", event.kind(), event.url, e);
            return;
        }
    };

    registry.retain(|id, subscriber| {
        if !audience.includes(subscriber.owner.as_deref()) {
            return true;
        }

        match subscriber.queue.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Subscriber {} queue is full, dropping unresponsive subscriber", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Subscriber {} queue closed, removing", id);
                false
            }
        }
    });
}

/// Drains one subscriber's queue into its connection
///
/// Stops when the hub drops the subscriber (queued messages are discarded) or
/// when the connection fails, in which case it asks the hub to unsubscribe it.
async fn run_pump<S: MessageSink>(
    id: SubscriberId,
    mut pending: mpsc::Receiver<Arc<str>>,
    mut closed: oneshot::Receiver<()>,
    mut sink: S,
    hub: mpsc::WeakSender<HubCommand>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = &mut closed => break,
            message = pending.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let delivered = tokio::select! {
            biased;
            _ = &mut closed => break,
            delivered = sink.deliver(message) => delivered,
        };

        if let Err(e) = delivered {
            tracing::debug!("Subscriber {} connection failed: {}", id, e);
            if let Some(hub) = hub.upgrade() {
                let _ = hub.send(HubCommand::Unsubscribe { id }).await;
            }
            break;
        }
    }
}
