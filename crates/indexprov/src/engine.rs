//! The engine: links advertisements into a chain and publishes them.
//!
//! Each advertisement points at the one published before it through
//! `previous_id`. Reading the head, linking, publishing and advancing the head
//! happen under one async mutex, so concurrent publishes never link to the
//! same head. That sequence runs on a task owned by the engine, so dropping a
//! caller's future never leaves the head behind what the publisher persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use indexprov_core::{
    canonical_bytes, decode_advertisement, validate_advertisement_structure, AdBuilder, AdParams,
    Advertisement, Keypair, Link, PeerId,
};

use crate::error::{EngineError, Result};
use crate::publisher::Publisher;

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Verify every extended provider signature before publishing.
    pub validate_extended_signatures: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_extended_signatures: true,
        }
    }
}

/// Publishes advertisements for one provider identity.
pub struct Engine<P: Publisher> {
    /// The identity keypair for this engine.
    keypair: Keypair,
    publisher: Arc<P>,
    config: EngineConfig,
    /// Current chain head. Only written by [`link_and_publish`].
    head: Arc<Mutex<Option<Link>>>,
    closed: Arc<AtomicBool>,
}

impl<P: Publisher + 'static> Engine<P> {
    /// Start an engine, resuming from the publisher's persisted head.
    pub async fn start(keypair: Keypair, publisher: P, config: EngineConfig) -> Result<Self> {
        let head = publisher.head().await?;
        match &head {
            Some(link) => tracing::info!(head = %link, "engine resumed chain"),
            None => tracing::info!("engine started with empty chain"),
        }
        Ok(Self {
            keypair,
            publisher: Arc::new(publisher),
            config,
            head: Arc::new(Mutex::new(head)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The engine's provider identity.
    pub fn provider(&self) -> PeerId {
        self.keypair.peer_id()
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Link `ad` to the current head, publish it and advance the head.
    ///
    /// `ad` must be signed by the engine's identity. It is re-signed after
    /// `previous_id` is set. On any failure the head is unchanged.
    ///
    /// Once validation passes, the publication completes even if the
    /// returned future is dropped.
    pub async fn publish(&self, ad: Advertisement) -> Result<Link> {
        self.ensure_open()?;

        validate_advertisement_structure(&ad)?;
        let signer = ad.verify_signature().map_err(EngineError::Signature)?;
        if signer != self.provider() {
            return Err(EngineError::ForeignProvider(signer));
        }
        if self.config.validate_extended_signatures {
            ad.verify_extended_signatures()?;
        }

        let keypair = self.keypair.clone();
        let publisher = self.publisher.clone();
        let head = self.head.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move { link_and_publish(ad, &keypair, &*publisher, &head, &closed).await })
            .await?
    }

    /// Publish a removal advertisement for `context_id`.
    pub async fn publish_removal(&self, context_id: impl Into<Bytes>) -> Result<Link> {
        let ad = AdBuilder::new(self.keypair.clone(), Vec::new()).build_and_sign(AdParams {
            context_id: context_id.into(),
            is_rm: true,
            ..AdParams::default()
        })?;
        self.publish(ad).await
    }

    /// The current chain head.
    pub async fn latest(&self) -> Option<Link> {
        self.head.lock().await.clone()
    }

    /// A published advertisement by link.
    pub async fn get_advertisement(&self, link: &Link) -> Result<Option<Advertisement>> {
        match self.publisher.get(link).await? {
            Some(bytes) => Ok(Some(decode_advertisement(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` advertisements, newest first, walking from the head.
    pub async fn chain(&self, limit: usize) -> Result<Vec<(Link, Advertisement)>> {
        let mut out = Vec::new();
        let mut next = self.latest().await;
        while let Some(link) = next {
            if out.len() >= limit {
                break;
            }
            let ad = self
                .get_advertisement(&link)
                .await?
                .ok_or_else(|| EngineError::NotFound(link.to_string()))?;
            next = ad.previous_id.clone();
            out.push((link, ad));
        }
        Ok(out)
    }

    /// Stop accepting publishes. Waits for an in-flight publish to finish.
    pub async fn shutdown(&self) -> Result<()> {
        let _head = self.head.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("engine shut down");
        self.publisher.close().await
    }

    fn ensure_open(&self) -> Result<()> {
        ensure_open(&self.closed)
    }
}

fn ensure_open(closed: &AtomicBool) -> Result<()> {
    if closed.load(Ordering::SeqCst) {
        return Err(EngineError::Closed);
    }
    Ok(())
}

/// Read the head, link and re-sign `ad`, publish it, then advance the head.
async fn link_and_publish<P: Publisher + ?Sized>(
    mut ad: Advertisement,
    keypair: &Keypair,
    publisher: &P,
    head: &Mutex<Option<Link>>,
    closed: &AtomicBool,
) -> Result<Link> {
    let mut head = head.lock().await;
    // Shutdown may have completed while waiting on the lock.
    ensure_open(closed)?;

    ad.previous_id = head.clone();
    ad.sign(keypair);
    let link = ad.link();

    publisher
        .publish(&link, Bytes::from(canonical_bytes(&ad)))
        .await?;
    tracing::info!(
        %link,
        previous = ?head.as_ref().map(|l| l.to_string()),
        removal = ad.is_rm,
        "published advertisement"
    );
    *head = Some(link.clone());
    Ok(link)
}
