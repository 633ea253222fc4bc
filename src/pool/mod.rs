//! Shape-keyed texture pool.
//!
//! Temporaries are keyed by [`TextureDesc`]; a request for a shape that was released earlier reuses
//! the most recently released texture of that shape, otherwise the device allocates a new one.
//! Callers that already own a texture (the host's output target) may contribute it for the current
//! frame; such foreign textures are handed out like any other but forgotten at
//! [`TexturePool::flush_textures`] and never destroyed by the pool.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::device::{RenderDevice, Texture, TextureId};
use crate::foundation::core::TextureDesc;
use crate::foundation::error::{ChainError, ChainResult};
use crate::lending::{Lease, Lendable};

/// Pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolOpts {
    /// Maximum number of retained textures per shape.
    pub max_textures_per_bucket: usize,
    /// Maximum bytes retained across all shapes.
    pub max_pool_bytes: u64,
    /// Shapes not requested for more than this many flushes are returned to the device.
    pub max_idle_frames: u64,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_textures_per_bucket: 8,
            max_pool_bytes: 256 * 1024 * 1024,
            max_idle_frames: 2,
        }
    }
}

/// Pool counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Textures waiting in buckets.
    pub retained_textures: usize,
    /// Bytes waiting in buckets (foreign textures excluded).
    pub retained_bytes: u64,
    /// Textures currently handed out.
    pub loaned_textures: usize,
    /// Device allocations performed by the pool.
    pub allocations: u64,
    /// Requests served from a bucket.
    pub reuses: u64,
    /// Textures returned to the device because a cap was hit on release.
    pub dropped_on_release: u64,
    /// Textures returned to the device because their shape went idle.
    pub evictions: u64,
    /// Loans still outstanding when the frame was flushed.
    pub reclaimed_at_flush: u64,
    /// Reclaimed loans whose lease came back after the flush.
    pub stray_releases: u64,
    /// Completed flushes.
    pub flushes: u64,
}

struct Bucket {
    textures: Vec<Texture>,
    last_used_frame: u64,
}

struct PoolState {
    device: Rc<dyn RenderDevice>,
    opts: PoolOpts,
    stats: PoolStats,
    frame: u64,
    buckets: HashMap<TextureDesc, Bucket>,
    loaned: HashMap<TextureId, Texture>,
    foreign: HashSet<TextureId>,
    // Loans outstanding at a flush; kept out of circulation until their lease comes back.
    quarantined: HashMap<TextureId, Texture>,
}

impl PoolState {
    fn is_pooled(&self, id: TextureId) -> bool {
        self.buckets
            .values()
            .any(|b| b.textures.iter().any(|t| t.id() == id))
    }

    fn retained_bytes_of(&self, texture: &Texture) -> u64 {
        if self.foreign.contains(&texture.id()) {
            0
        } else {
            texture.desc().byte_len()
        }
    }

    fn push_available(&mut self, texture: Texture) {
        let foreign = self.foreign.contains(&texture.id());
        let bytes = self.retained_bytes_of(&texture);
        let frame = self.frame;
        let bucket = self.buckets.entry(texture.desc()).or_insert_with(|| Bucket {
            textures: Vec::new(),
            last_used_frame: frame,
        });

        let over_bucket = bucket.textures.len() >= self.opts.max_textures_per_bucket;
        let over_bytes = self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes;
        if !foreign && (over_bucket || over_bytes) {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            tracing::trace!(desc = %texture.desc(), "pool cap hit; texture returned to device");
            self.device.release_texture(&texture);
            return;
        }

        bucket.last_used_frame = frame;
        bucket.textures.push(texture);
        self.stats.retained_textures += 1;
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }

    fn pop_available(&mut self, desc: TextureDesc) -> Option<Texture> {
        let frame = self.frame;
        let bucket = self.buckets.get_mut(&desc)?;
        bucket.last_used_frame = frame;
        let texture = bucket.textures.pop()?;
        let bytes = self.retained_bytes_of(&texture);
        self.stats.retained_textures = self.stats.retained_textures.saturating_sub(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(bytes);
        Some(texture)
    }

    /// Return every owned texture retained for shapes other than `keep` to the device.
    ///
    /// Foreign textures stay; dropping them frees nothing on the device.
    fn drain_except(&mut self, keep: TextureDesc) -> usize {
        let mut freed = Vec::new();
        for (desc, bucket) in &mut self.buckets {
            if *desc == keep {
                continue;
            }
            let (foreign, owned): (Vec<Texture>, Vec<Texture>) = bucket
                .textures
                .drain(..)
                .partition(|t| self.foreign.contains(&t.id()));
            bucket.textures = foreign;
            freed.extend(owned);
        }
        let n = freed.len();
        for texture in freed {
            self.forget_or_release(texture);
        }
        n
    }

    fn forget_or_release(&mut self, texture: Texture) {
        let bytes = self.retained_bytes_of(&texture);
        self.stats.retained_textures = self.stats.retained_textures.saturating_sub(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(bytes);
        if !self.foreign.remove(&texture.id()) {
            self.device.release_texture(&texture);
        }
    }
}

impl Drop for PoolState {
    fn drop(&mut self) {
        let textures: Vec<Texture> = self
            .buckets
            .drain()
            .flat_map(|(_, bucket)| bucket.textures)
            .chain(self.quarantined.drain().map(|(_, t)| t))
            .collect();
        for texture in textures {
            if !self.foreign.contains(&texture.id()) {
                self.device.release_texture(&texture);
            }
        }
        if !self.loaned.is_empty() {
            tracing::warn!(loaned = self.loaned.len(), "texture pool dropped with textures on loan");
        }
    }
}

/// Shared handle to a texture pool. Clones refer to the same pool.
#[derive(Clone)]
pub struct TexturePool {
    state: Rc<RefCell<PoolState>>,
}

impl TexturePool {
    pub fn new(device: Rc<dyn RenderDevice>, opts: PoolOpts) -> Self {
        Self {
            state: Rc::new(RefCell::new(PoolState {
                device,
                opts,
                stats: PoolStats::default(),
                frame: 0,
                buckets: HashMap::new(),
                loaned: HashMap::new(),
                foreign: HashSet::new(),
                quarantined: HashMap::new(),
            })),
        }
    }

    pub fn opts(&self) -> PoolOpts {
        self.state.borrow().opts
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.borrow();
        PoolStats {
            loaned_textures: state.loaned.len(),
            ..state.stats.clone()
        }
    }

    /// Number of textures currently on loan.
    pub fn loaned_count(&self) -> usize {
        self.state.borrow().loaned.len()
    }

    /// Take a texture of exactly `desc`, reusing a released one when possible.
    ///
    /// If the device is out of room, retained textures of other shapes are returned to it and the
    /// allocation is retried once.
    pub fn get_temp_texture(&self, desc: TextureDesc) -> ChainResult<Texture> {
        let mut state = self.state.borrow_mut();
        if let Some(texture) = state.pop_available(desc) {
            state.stats.reuses = state.stats.reuses.saturating_add(1);
            state.loaned.insert(texture.id(), texture.clone());
            return Ok(texture);
        }

        let texture = match state.device.create_texture(desc) {
            Ok(texture) => texture,
            Err(err) if err.is_resource_exhaustion() => {
                let freed = state.drain_except(desc);
                if freed == 0 {
                    return Err(err);
                }
                tracing::debug!(freed, %desc, "device exhausted; released idle textures and retrying");
                state.device.create_texture(desc)?
            }
            Err(err) => return Err(err),
        };
        state.stats.allocations = state.stats.allocations.saturating_add(1);
        state.loaned.insert(texture.id(), texture.clone());
        tracing::trace!(id = texture.id().0, %desc, "pool allocated texture");
        Ok(texture)
    }

    /// Return `texture` to the pool.
    ///
    /// Textures the pool did not hand out are accepted as foreign for the rest of the frame.
    /// Returning a texture that is already waiting in the pool is a contract violation.
    pub fn put_temp_texture(&self, texture: Texture) -> ChainResult<()> {
        let mut state = self.state.borrow_mut();
        let id = texture.id();
        if let Some(texture) = state.quarantined.remove(&id) {
            state.stats.stray_releases = state.stats.stray_releases.saturating_add(1);
            tracing::warn!(id = id.0, "late release of a texture reclaimed at flush");
            state.push_available(texture);
            return Ok(());
        }
        if state.loaned.remove(&id).is_none() {
            if state.is_pooled(id) {
                return Err(ChainError::contract(format!(
                    "texture {} ({}) returned to the pool twice",
                    id.0,
                    texture.desc()
                )));
            }
            state.foreign.insert(id);
        }
        state.push_available(texture);
        Ok(())
    }

    /// Lease a texture of `desc`; the lease returns it to the pool when dropped.
    pub fn lease(&self, desc: TextureDesc) -> ChainResult<Lease<Texture>> {
        let texture = self.get_temp_texture(desc)?;
        let pool = self.clone();
        let returned = texture.clone();
        Ok(Lease::new(texture, move || {
            if let Err(err) = pool.put_temp_texture(returned) {
                tracing::error!(error = %err, "texture lease release failed");
            }
        }))
    }

    /// A lendable slot producing pool textures of `desc`.
    pub fn slot(&self, desc: TextureDesc) -> TextureSlot {
        TextureSlot {
            pool: self.clone(),
            desc,
        }
    }

    /// End-of-frame housekeeping.
    ///
    /// Reclaims loans that were never returned, forgets foreign textures and returns shapes idle
    /// for more than `max_idle_frames` flushes to the device.
    pub fn flush_textures(&self) {
        let mut state = self.state.borrow_mut();

        let leaked: Vec<Texture> = state.loaned.drain().map(|(_, t)| t).collect();
        if !leaked.is_empty() {
            tracing::warn!(count = leaked.len(), "textures still on loan at flush; reclaiming");
        }
        for texture in leaked {
            state.stats.reclaimed_at_flush = state.stats.reclaimed_at_flush.saturating_add(1);
            if !state.foreign.remove(&texture.id()) {
                state.quarantined.insert(texture.id(), texture);
            }
        }

        let foreign: Vec<TextureId> = state.foreign.iter().copied().collect();
        for bucket in state.buckets.values_mut() {
            bucket.textures.retain(|t| !foreign.contains(&t.id()));
        }
        state.stats.retained_textures = state.buckets.values().map(|b| b.textures.len()).sum();
        state.foreign.clear();

        let frame = state.frame;
        let idle_limit = state.opts.max_idle_frames;
        let idle: Vec<TextureDesc> = state
            .buckets
            .iter()
            .filter(|(_, b)| frame.saturating_sub(b.last_used_frame) > idle_limit)
            .map(|(desc, _)| *desc)
            .collect();
        for desc in idle {
            if let Some(bucket) = state.buckets.remove(&desc) {
                let n = bucket.textures.len() as u64;
                for texture in bucket.textures {
                    state.forget_or_release(texture);
                }
                state.stats.evictions = state.stats.evictions.saturating_add(n);
                if n > 0 {
                    tracing::debug!(%desc, count = n, "evicted idle texture shape");
                }
            }
        }

        state.frame = frame.saturating_add(1);
        state.stats.flushes = state.stats.flushes.saturating_add(1);
    }

    /// Return every idle texture to the device.
    ///
    /// Quarantined textures still have a live lease somewhere; they stay put until it returns.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        let textures: Vec<Texture> = state
            .buckets
            .drain()
            .flat_map(|(_, bucket)| bucket.textures)
            .collect();
        for texture in textures {
            state.forget_or_release(texture);
        }
        if !state.quarantined.is_empty() {
            tracing::debug!(
                count = state.quarantined.len(),
                "pool cleared; quarantined textures wait for their leases"
            );
        }
    }
}

impl std::fmt::Debug for TexturePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TexturePool")
            .field("stats", &self.stats())
            .finish()
    }
}

/// [`Lendable`] view of the pool for one texture shape.
#[derive(Clone)]
pub struct TextureSlot {
    pool: TexturePool,
    desc: TextureDesc,
}

impl TextureSlot {
    pub fn desc(&self) -> TextureDesc {
        self.desc
    }
}

impl Lendable<Texture> for TextureSlot {
    fn lease(&self) -> ChainResult<Lease<Texture>> {
        self.pool.lease(self.desc)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/pool.rs"]
mod tests;
