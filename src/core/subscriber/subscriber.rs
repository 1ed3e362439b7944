use flume::{Receiver, RecvError, TryRecvError};
use std::fmt;
use std::ops::Deref;

use crate::core::message::Message;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        SubscriberId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        SubscriberId(s.to_owned())
    }
}

impl From<String> for SubscriberId {
    fn from(s: String) -> Self {
        SubscriberId(s)
    }
}

impl AsRef<str> for SubscriberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SubscriberId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Receiving end of one subscriber's bounded delivery channel.
///
/// Dropping it disconnects the subscriber; the sink prunes it on the next
/// delivery.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<Message>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, receiver: Receiver<Message>) -> Self {
        Self { id, receiver }
    }

    #[inline(always)]
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    #[inline(always)]
    pub fn receiver(&self) -> &Receiver<Message> {
        &self.receiver
    }

    pub async fn recv(&self) -> Result<Message, RecvError> {
        self.receiver.recv_async().await
    }

    pub fn try_recv(&self) -> Result<Message, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Messages already delivered but not yet consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}
