//! Weighted audio cache with single-flight loads
//!
//! Decoded fragments are cached by audio id, weighted by decoded byte
//! size, and bounded by a declared maximum total weight. On a miss exactly
//! one load runs per key even under concurrent requesters: the first
//! requester installs a Pending slot and loads; everyone else subscribes
//! under the same lock and waits for the publish. Eviction walks
//! least-recently-used items, dropping the decoded buffer and the on-disk
//! staging file.
//!
//! The byte-fetch collaborator is the [`AudioFetcher`] trait; production
//! wiring uses [`LocalFileFetcher`], tests substitute their own.

pub mod loader;

use crate::error::{Error, Result};
use crate::mix::Source;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;
use weft_common::content::InstrumentAudio;

/// Byte-fetch collaborator: resolves a waveform key to raw encoded audio
pub trait AudioFetcher: Send + Sync {
    /// Fetch the encoded bytes behind a waveform key
    ///
    /// # Errors
    ///
    /// A descriptive [`Error::CacheLoad`] when the bytes are unavailable.
    fn fetch(&self, waveform_key: &str) -> Result<Vec<u8>>;
}

/// Fetcher reading waveform keys as paths under a root folder
pub struct LocalFileFetcher {
    root: PathBuf,
}

impl LocalFileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AudioFetcher for LocalFileFetcher {
    fn fetch(&self, waveform_key: &str) -> Result<Vec<u8>> {
        let path = self.root.join(waveform_key);
        std::fs::read(&path)
            .map_err(|e| Error::CacheLoad(format!("cannot read {}: {}", path.display(), e)))
    }
}

/// One cached decoded fragment
///
/// Owned exclusively by the cache until handed out; the decoded buffer
/// lives as long as any outstanding Arc, the staging file only as long as
/// the cache entry.
#[derive(Debug)]
pub struct CacheItem {
    audio_id: Uuid,
    source: Arc<Source>,
    weight_bytes: u64,
    staging_path: PathBuf,
}

impl CacheItem {
    pub fn audio_id(&self) -> Uuid {
        self.audio_id
    }

    pub fn source(&self) -> Arc<Source> {
        Arc::clone(&self.source)
    }

    pub fn weight_bytes(&self) -> u64 {
        self.weight_bytes
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }
}

/// Hit/miss/eviction counters for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct ReadySlot {
    item: Arc<CacheItem>,
    last_access: u64,
}

enum Slot {
    /// A load is in flight; subscribe and wait for the publish
    Pending(broadcast::Sender<()>),
    Ready(ReadySlot),
}

/// Bounded, weighted, single-flight audio cache
pub struct AudioCache {
    max_bytes: u64,
    output_rate: u32,
    staging_dir: PathBuf,
    fetcher: Arc<dyn AudioFetcher>,
    slots: Mutex<HashMap<Uuid, Slot>>,
    access_clock: AtomicU64,
    total_bytes: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AudioCache {
    /// Create the cache, ensuring the staging directory exists
    pub fn new(
        max_bytes: u64,
        output_rate: u32,
        staging_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn AudioFetcher>,
    ) -> Result<Self> {
        let staging_dir = staging_dir.into();
        std::fs::create_dir_all(&staging_dir).map_err(|e| {
            Error::Config(format!(
                "cannot create staging dir {}: {}",
                staging_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            max_bytes,
            output_rate,
            staging_dir,
            fetcher,
            slots: Mutex::new(HashMap::new()),
            access_clock: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Load-or-return the cached decode for one audio
    pub async fn get(&self, audio: &InstrumentAudio) -> Result<Arc<CacheItem>> {
        loop {
            let mut receiver = {
                let mut slots = self.slots.lock().await;
                match slots.get_mut(&audio.id) {
                    Some(Slot::Ready(ready)) => {
                        ready.last_access = self.access_clock.fetch_add(1, Ordering::Relaxed);
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(Arc::clone(&ready.item));
                    }
                    Some(Slot::Pending(tx)) => tx.subscribe(),
                    None => {
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        let (tx, _) = broadcast::channel(1);
                        slots.insert(audio.id, Slot::Pending(tx.clone()));
                        drop(slots);
                        return self.load_and_publish(audio, tx).await;
                    }
                }
            };
            // a load is in flight for this key; wait for it to publish
            let _ = receiver.recv().await;
        }
    }

    /// Force a re-decode, e.g. on detected content change
    ///
    /// Waits out any in-flight load first, then loads fresh.
    pub async fn refresh(&self, audio: &InstrumentAudio) -> Result<Arc<CacheItem>> {
        loop {
            let mut receiver = {
                let mut slots = self.slots.lock().await;
                match slots.get(&audio.id) {
                    Some(Slot::Pending(tx)) => tx.subscribe(),
                    Some(Slot::Ready(_)) | None => {
                        if let Some(Slot::Ready(ready)) = slots.remove(&audio.id) {
                            self.release(&ready.item);
                        }
                        let (tx, _) = broadcast::channel(1);
                        slots.insert(audio.id, Slot::Pending(tx.clone()));
                        drop(slots);
                        return self.load_and_publish(audio, tx).await;
                    }
                }
            };
            let _ = receiver.recv().await;
        }
    }

    /// Current total decoded bytes held
    pub fn estimated_size(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Run the fetch/stage/decode, publish the slot, wake waiters
    async fn load_and_publish(
        &self,
        audio: &InstrumentAudio,
        tx: broadcast::Sender<()>,
    ) -> Result<Arc<CacheItem>> {
        let result = self.load_item(audio).await;

        let mut slots = self.slots.lock().await;
        match result {
            Ok(item) => {
                self.total_bytes.fetch_add(item.weight_bytes, Ordering::Relaxed);
                slots.insert(
                    audio.id,
                    Slot::Ready(ReadySlot {
                        item: Arc::clone(&item),
                        last_access: self.access_clock.fetch_add(1, Ordering::Relaxed),
                    }),
                );
                self.evict_over_capacity(&mut slots);
                drop(slots);
                let _ = tx.send(());
                Ok(item)
            }
            Err(e) => {
                // waiters retry and surface their own load error
                slots.remove(&audio.id);
                drop(slots);
                let _ = tx.send(());
                Err(e)
            }
        }
    }

    async fn load_item(&self, audio: &InstrumentAudio) -> Result<Arc<CacheItem>> {
        let bytes = self.fetcher.fetch(&audio.waveform_key)?;

        let extension = Path::new(&audio.waveform_key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let staging_path = self.staging_dir.join(format!("{}.{}", audio.id, extension));
        std::fs::write(&staging_path, &bytes).map_err(|e| {
            Error::CacheLoad(format!(
                "cannot stage {}: {}",
                staging_path.display(),
                e
            ))
        })?;

        // decode is CPU-bound; keep it off the scheduler threads
        let decode_path = staging_path.clone();
        let output_rate = self.output_rate;
        let waveform = tokio::task::spawn_blocking(move || {
            loader::decode_file(&decode_path, output_rate)
        })
        .await
        .map_err(|e| Error::Internal(format!("decode task panicked: {}", e)))??;

        let source = Arc::new(Source::new(
            audio.id,
            waveform.frame_rate,
            waveform.channels,
            waveform.samples,
        )?);
        let weight_bytes = source.weight_bytes();
        debug!(
            "cached audio {} ({} bytes decoded from {})",
            audio.id, weight_bytes, audio.waveform_key
        );

        Ok(Arc::new(CacheItem {
            audio_id: audio.id,
            source,
            weight_bytes,
            staging_path,
        }))
    }

    /// Evict least-recently-used Ready items until within the weight bound
    fn evict_over_capacity(&self, slots: &mut HashMap<Uuid, Slot>) {
        while self.total_bytes.load(Ordering::Relaxed) > self.max_bytes {
            let victim = slots
                .iter()
                .filter_map(|(id, slot)| match slot {
                    Slot::Ready(ready) => Some((*id, ready.last_access)),
                    Slot::Pending(_) => None,
                })
                .min_by_key(|(_, access)| *access)
                .map(|(id, _)| id);

            let Some(victim) = victim else {
                break; // nothing evictable
            };
            if let Some(Slot::Ready(ready)) = slots.remove(&victim) {
                debug!(
                    "evicting audio {} ({} bytes)",
                    victim, ready.item.weight_bytes
                );
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.release(&ready.item);
            }
        }
    }

    /// Drop a cached item's accounting and staging file
    fn release(&self, item: &CacheItem) {
        self.total_bytes
            .fetch_sub(item.weight_bytes, Ordering::Relaxed);
        if let Err(e) = std::fs::remove_file(&item.staging_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "could not remove staging file {}: {}",
                    item.staging_path.display(),
                    e
                );
            }
        }
    }
}

// ========================================
// Tests
// ========================================
