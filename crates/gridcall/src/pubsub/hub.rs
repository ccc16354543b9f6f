//! In-process topics backed by `tokio::sync::broadcast`.

use super::{Channel, ChannelError, Delivery, PublishOptions};
use crate::participant::Sender;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Per-topic broadcast buffer. Slower receivers skip ahead past this.
const CHANNEL_CAPACITY: usize = 256;

/// Hub-wide behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubOptions {
    /// Persisted messages kept per topic; the oldest is dropped first.
    pub retain_limit: usize,
    /// Whether members receive their own messages live.
    pub echo_to_sender: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            retain_limit: 256,
            echo_to_sender: false,
        }
    }
}

/// A live delivery stamped with the membership that published it.
#[derive(Debug, Clone)]
struct Envelope {
    member: u64,
    delivery: Delivery,
}

#[derive(Debug)]
struct Topic {
    tx: broadcast::Sender<Envelope>,
    retained: VecDeque<Delivery>,
    members: HashMap<u64, Sender>,
    headcount: watch::Sender<usize>,
}

impl Topic {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            retained: VecDeque::new(),
            members: HashMap::new(),
            headcount: watch::Sender::new(0),
        }
    }
}

/// Registry of live topics. Cheap to clone; clones share topics.
#[derive(Debug, Clone, Default)]
pub struct ChannelHub {
    topics: Arc<Mutex<HashMap<String, Topic>>>,
    next_member: Arc<AtomicU64>,
    options: HubOptions,
}

impl ChannelHub {
    /// Creates an empty hub.
    #[instrument]
    pub fn new(options: HubOptions) -> Self {
        Self {
            topics: Arc::default(),
            next_member: Arc::default(),
            options,
        }
    }

    /// Returns the hub options.
    pub fn options(&self) -> HubOptions {
        self.options
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins `topic` as `sender`, creating the topic if needed.
    ///
    /// The returned channel first yields every retained message, including
    /// ones `sender` published under an earlier membership, then live
    /// deliveries.
    #[instrument(skip(self), fields(sender_id = %sender.id))]
    pub fn join(&self, topic: &str, sender: Sender) -> HubChannel {
        let member = self.next_member.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.lock();
        let entry = topics.entry(topic.to_string()).or_insert_with(|| {
            info!(topic, "Opening topic");
            Topic::new()
        });

        // Subscribe and snapshot under one lock so nothing falls in between.
        let rx = entry.tx.subscribe();
        let backlog: VecDeque<Delivery> = entry.retained.iter().cloned().collect();
        entry.members.insert(member, sender.clone());
        entry.headcount.send_replace(entry.members.len());
        debug!(
            topic,
            members = entry.members.len(),
            replay = backlog.len(),
            "Member joined"
        );

        HubChannel {
            hub: self.clone(),
            topic: topic.to_string(),
            member,
            sender,
            rx,
            backlog,
        }
    }

    #[instrument(skip(self, delivery), fields(sender_id = %delivery.sender.id))]
    fn publish(
        &self,
        topic: &str,
        member: u64,
        delivery: Delivery,
        persist: bool,
    ) -> Result<(), ChannelError> {
        let mut topics = self.lock();
        let entry = topics.get_mut(topic).ok_or(ChannelError::Closed)?;
        if persist && self.options.retain_limit > 0 {
            entry.retained.push_back(delivery.clone());
            while entry.retained.len() > self.options.retain_limit {
                entry.retained.pop_front();
            }
        }
        // Only fails when nobody is subscribed, which is not an error here.
        let receivers = entry.tx.send(Envelope { member, delivery }).unwrap_or(0);
        debug!(topic, receivers, persist, "Published");
        Ok(())
    }

    fn leave(&self, topic: &str, member: u64) {
        let mut topics = self.lock();
        let Some(entry) = topics.get_mut(topic) else {
            return;
        };
        entry.members.remove(&member);
        entry.headcount.send_replace(entry.members.len());
        if entry.members.is_empty() {
            topics.remove(topic);
            info!(topic, "Closed topic after last member left");
        } else {
            debug!(topic, members = entry.members.len(), "Member left");
        }
    }

    /// Current members of `topic`, in no particular order.
    pub fn members(&self, topic: &str) -> Vec<Sender> {
        self.lock()
            .get(topic)
            .map(|t| t.members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Watches the number of members in `topic`; `None` when it is not open.
    ///
    /// The watch closes once the topic does.
    pub fn watch_headcount(&self, topic: &str) -> Option<watch::Receiver<usize>> {
        self.lock().get(topic).map(|t| t.headcount.subscribe())
    }

    /// Names of the open topics.
    pub fn topics(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// Membership in a hub topic. Leaves the topic when dropped.
#[derive(Debug)]
pub struct HubChannel {
    hub: ChannelHub,
    topic: String,
    member: u64,
    sender: Sender,
    rx: broadcast::Receiver<Envelope>,
    backlog: VecDeque<Delivery>,
}

impl HubChannel {
    /// Topic this channel belongs to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl Channel for HubChannel {
    async fn publish(
        &mut self,
        payload: String,
        options: PublishOptions,
    ) -> Result<(), ChannelError> {
        let delivery = Delivery {
            payload,
            sender: self.sender.clone(),
        };
        self.hub
            .publish(&self.topic, self.member, delivery, options.persist)
    }

    async fn recv(&mut self) -> Option<Delivery> {
        if let Some(delivery) = self.backlog.pop_front() {
            return Some(delivery);
        }
        loop {
            match self.rx.recv().await {
                Ok(envelope)
                    if envelope.member == self.member && !self.hub.options.echo_to_sender => {}
                Ok(envelope) => return Some(envelope.delivery),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "Receiver lagged; messages dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn local(&self) -> &Sender {
        &self.sender
    }
}

impl Drop for HubChannel {
    fn drop(&mut self) {
        self.hub.leave(&self.topic, self.member);
    }
}
