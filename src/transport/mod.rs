//! Carrier abstraction
//!
//! A carrier only moves envelope bytes between participants. It never
//! looks inside a frame; routing uses the participant's public key, which
//! is also what relays read from the plaintext `RECIPIENT_KEY`.
//!
//! [`memory`] provides an in-process hub used by tests and by embedders
//! that run both sides in one process.

use async_trait::async_trait;
use thiserror::Error;

use crate::participant::Participant;

/// Carrier errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CarrierError {
    /// Nobody with the target's key is attached
    #[error("no route to {0}")]
    UnknownTarget(String),

    /// The receiving side is not accepting frames
    #[error("carrier is not receiving")]
    NotReceiving,

    /// The carrier has been shut down
    #[error("carrier is shut down")]
    Closed,
}

/// Result type for carrier operations
pub type CarrierResult<T> = Result<T, CarrierError>;

/// One frame as seen by the receiving side
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Who handed the frame to the carrier
    pub sender: Participant,
    /// Envelope bytes, untouched
    pub bytes: Vec<u8>,
}

/// Moves envelope bytes between participants
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Send `bytes` to `target`
    async fn deliver(&self, bytes: Vec<u8>, target: &Participant) -> CarrierResult<()>;

    /// Accept `bytes` that arrived from `sender`
    async fn receive(&self, bytes: Vec<u8>, sender: &Participant) -> CarrierResult<()>;

    /// Begin accepting inbound frames
    async fn start_receiving(&self) -> CarrierResult<()>;

    /// Stop accepting inbound frames; already queued frames stay queued
    async fn stop_receiving(&self) -> CarrierResult<()>;

    /// Detach for good
    async fn shutdown(&self) -> CarrierResult<()>;

    /// Whether inbound frames are currently accepted
    fn is_receiving(&self) -> bool;
}

/// In-memory carrier
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::{mpsc, RwLock};
    use tracing::debug;

    use crate::crypto::PublicKey;

    const INBOX_CAPACITY: usize = 100;

    struct Endpoint {
        receiving: AtomicBool,
        inbox: mpsc::Sender<Frame>,
    }

    impl Endpoint {
        async fn accept(&self, frame: Frame) -> CarrierResult<()> {
            if !self.receiving.load(Ordering::Acquire) {
                return Err(CarrierError::NotReceiving);
            }
            self.inbox.send(frame).await.map_err(|_| CarrierError::Closed)
        }
    }

    /// Routes frames between attached carriers by public key
    #[derive(Clone, Default)]
    pub struct MemoryHub {
        routes: Arc<RwLock<HashMap<PublicKey, Arc<Endpoint>>>>,
    }

    impl MemoryHub {
        /// Create an empty hub
        pub fn new() -> Self {
            Self::default()
        }

        /// Attach `local` and return its carrier plus the stream of
        /// frames addressed to it. A later attach with the same key
        /// replaces the earlier route.
        pub async fn attach(&self, local: Participant) -> (MemoryCarrier, mpsc::Receiver<Frame>) {
            let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
            let endpoint = Arc::new(Endpoint {
                receiving: AtomicBool::new(false),
                inbox: tx,
            });
            self.routes
                .write()
                .await
                .insert(*local.public_key(), endpoint.clone());
            debug!(local = %local, "carrier attached");

            let carrier = MemoryCarrier {
                local: local.to_remote(),
                hub: self.clone(),
                endpoint,
                closed: AtomicBool::new(false),
            };
            (carrier, rx)
        }

        /// Number of attached carriers
        pub async fn len(&self) -> usize {
            self.routes.read().await.len()
        }

        /// Whether no carrier is attached
        pub async fn is_empty(&self) -> bool {
            self.routes.read().await.is_empty()
        }

        async fn route(&self, key: &PublicKey) -> Option<Arc<Endpoint>> {
            self.routes.read().await.get(key).cloned()
        }
    }

    /// One participant's attachment to a [`MemoryHub`]
    pub struct MemoryCarrier {
        local: Participant,
        hub: MemoryHub,
        endpoint: Arc<Endpoint>,
        closed: AtomicBool,
    }

    impl MemoryCarrier {
        /// The attached participant, without private key
        pub fn local(&self) -> &Participant {
            &self.local
        }

        fn ensure_open(&self) -> CarrierResult<()> {
            if self.closed.load(Ordering::Acquire) {
                Err(CarrierError::Closed)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Carrier for MemoryCarrier {
        async fn deliver(&self, bytes: Vec<u8>, target: &Participant) -> CarrierResult<()> {
            self.ensure_open()?;
            let endpoint = self
                .hub
                .route(target.public_key())
                .await
                .ok_or_else(|| CarrierError::UnknownTarget(target.to_string()))?;

            debug!(from = %self.local, to = %target, bytes = bytes.len(), "frame delivered");
            endpoint
                .accept(Frame {
                    sender: self.local.clone(),
                    bytes,
                })
                .await
        }

        async fn receive(&self, bytes: Vec<u8>, sender: &Participant) -> CarrierResult<()> {
            self.ensure_open()?;
            self.endpoint
                .accept(Frame {
                    sender: sender.to_remote(),
                    bytes,
                })
                .await
        }

        async fn start_receiving(&self) -> CarrierResult<()> {
            self.ensure_open()?;
            self.endpoint.receiving.store(true, Ordering::Release);
            Ok(())
        }

        async fn stop_receiving(&self) -> CarrierResult<()> {
            self.ensure_open()?;
            self.endpoint.receiving.store(false, Ordering::Release);
            Ok(())
        }

        async fn shutdown(&self) -> CarrierResult<()> {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            self.endpoint.receiving.store(false, Ordering::Release);

            let mut routes = self.hub.routes.write().await;
            if routes
                .get(self.local.public_key())
                .is_some_and(|e| Arc::ptr_eq(e, &self.endpoint))
            {
                routes.remove(self.local.public_key());
            }
            debug!(local = %self.local, "carrier shut down");
            Ok(())
        }

        fn is_receiving(&self) -> bool {
            !self.closed.load(Ordering::Acquire) && self.endpoint.receiving.load(Ordering::Acquire)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryHub;
    use super::*;
    use crate::crypto::KeyPair;

    fn participant() -> Participant {
        Participant::local_server(KeyPair::generate())
    }

    #[tokio::test]
    async fn test_memory_delivery() {
        let hub = MemoryHub::new();
        let (alice, bob) = (participant(), participant());
        let (alice_carrier, mut alice_rx) = hub.attach(alice.clone()).await;
        let (bob_carrier, mut bob_rx) = hub.attach(bob.clone()).await;
        alice_carrier.start_receiving().await.unwrap();
        bob_carrier.start_receiving().await.unwrap();

        alice_carrier.deliver(b"Hello Bob".to_vec(), &bob).await.unwrap();
        let frame = bob_rx.recv().await.unwrap();
        assert_eq!(frame.bytes, b"Hello Bob");
        assert_eq!(frame.sender, alice);
        assert!(!frame.sender.is_local());

        bob_carrier.deliver(b"Hello Alice".to_vec(), &alice).await.unwrap();
        assert_eq!(alice_rx.recv().await.unwrap().bytes, b"Hello Alice");
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let hub = MemoryHub::new();
        let (carrier, _rx) = hub.attach(participant()).await;
        let nobody = participant();

        assert_eq!(
            carrier.deliver(vec![1], &nobody).await,
            Err(CarrierError::UnknownTarget(nobody.to_string()))
        );
    }

    #[tokio::test]
    async fn test_not_receiving_drops_frame() {
        let hub = MemoryHub::new();
        let (alice, bob) = (participant(), participant());
        let (alice_carrier, _a) = hub.attach(alice).await;
        let (bob_carrier, mut bob_rx) = hub.attach(bob.clone()).await;

        assert!(!bob_carrier.is_receiving());
        assert_eq!(
            alice_carrier.deliver(vec![1], &bob).await,
            Err(CarrierError::NotReceiving)
        );

        bob_carrier.start_receiving().await.unwrap();
        alice_carrier.deliver(vec![2], &bob).await.unwrap();
        bob_carrier.stop_receiving().await.unwrap();
        assert!(alice_carrier.deliver(vec![3], &bob).await.is_err());

        assert_eq!(bob_rx.recv().await.unwrap().bytes, vec![2]);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_receive_injects_frame() {
        let hub = MemoryHub::new();
        let relay = participant();
        let (carrier, mut rx) = hub.attach(participant()).await;
        carrier.start_receiving().await.unwrap();

        carrier.receive(b"from relay".to_vec(), &relay).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.sender, relay);
        assert!(frame.sender.key_pair().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_detaches() {
        let hub = MemoryHub::new();
        let (alice, bob) = (participant(), participant());
        let (alice_carrier, _a) = hub.attach(alice.clone()).await;
        let (bob_carrier, _b) = hub.attach(bob.clone()).await;
        bob_carrier.start_receiving().await.unwrap();
        assert_eq!(hub.len().await, 2);

        bob_carrier.shutdown().await.unwrap();
        bob_carrier.shutdown().await.unwrap();

        assert_eq!(hub.len().await, 1);
        assert!(!bob_carrier.is_receiving());
        assert_eq!(bob_carrier.start_receiving().await, Err(CarrierError::Closed));
        assert_eq!(bob_carrier.stop_receiving().await, Err(CarrierError::Closed));
        assert_eq!(
            bob_carrier.deliver(vec![1], &alice).await,
            Err(CarrierError::Closed)
        );
        assert!(matches!(
            alice_carrier.deliver(vec![1], &bob).await,
            Err(CarrierError::UnknownTarget(_))
        ));
    }
}
