//! Bounded cache of built height fields.

use std::sync::{Arc, Mutex, MutexGuard};

use millpath_mesh::Mesh;
use tracing::debug;

use super::{HeightField, UniformGrid};
use crate::control::JobControl;

/// Entries kept by [`HeightFieldCache::default`].
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

const RESOLUTION_EPS: f64 = 1e-6;

#[derive(Debug)]
struct Entry {
    mesh: usize,
    resolution: f64,
    vertex_count: usize,
    index_count: usize,
    field: Arc<HeightField>,
}

impl Entry {
    fn matches(&self, key: &Key) -> bool {
        self.mesh == key.mesh
            && (self.resolution - key.resolution).abs() <= RESOLUTION_EPS
            && self.vertex_count == key.vertex_count
            && self.index_count == key.index_count
    }
}

struct Key {
    mesh: usize,
    resolution: f64,
    vertex_count: usize,
    index_count: usize,
}

impl Key {
    fn of(mesh: &Mesh, resolution: f64) -> Self {
        Self {
            mesh: mesh as *const Mesh as usize,
            resolution,
            vertex_count: mesh.num_vertices(),
            index_count: mesh.indices.len(),
        }
    }
}

/// Result of [`HeightFieldCache::acquire`].
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The height field.
    pub field: Arc<HeightField>,
    /// True if the field came from the cache.
    pub reused: bool,
}

/// Height fields keyed by mesh identity and resolution.
///
/// Identity is the mesh's address plus its vertex and index counts, so a
/// mesh must not be mutated in place while its fields are cached.
#[derive(Debug)]
pub struct HeightFieldCache {
    entries: Mutex<Vec<Entry>>,
    capacity: usize,
}

impl Default for HeightFieldCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl HeightFieldCache {
    /// Cache holding at most `capacity` fields (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of cached fields.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every cached field.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Return the cached field for (`mesh`, `resolution`), building it on a miss.
    ///
    /// The lock is not held while building. A cancelled build is not cached
    /// and yields `None`.
    pub fn acquire(&self, mesh: &Mesh, resolution: f64, control: &JobControl) -> Option<CacheHit> {
        let key = Key::of(mesh, resolution);
        if let Some(entry) = self
            .lock()
            .iter()
            .find(|e| e.matches(&key) && e.field.is_valid())
        {
            debug!(resolution, "height field cache hit");
            return Some(CacheHit {
                field: Arc::clone(&entry.field),
                reused: true,
            });
        }

        if control.is_cancelled() {
            return None;
        }
        let grid = UniformGrid::new(mesh, resolution);
        if control.is_cancelled() {
            return None;
        }
        let mut field = HeightField::new();
        if !field.build(&grid, resolution, control) {
            return None;
        }
        let field = Arc::new(field);

        let mut entries = self.lock();
        entries.retain(|e| {
            !(e.mesh == key.mesh && (e.resolution - key.resolution).abs() <= RESOLUTION_EPS)
        });
        while entries.len() >= self.capacity {
            entries.remove(0);
        }
        entries.push(Entry {
            mesh: key.mesh,
            resolution: key.resolution,
            vertex_count: key.vertex_count,
            index_count: key.index_count,
            field: Arc::clone(&field),
        });
        debug!(resolution, cached = entries.len(), "height field cached");
        Some(CacheHit {
            field,
            reused: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn square(size: f32) -> Mesh {
        Mesh::from_positions(
            vec![0.0, 0.0, 0.0, size, 0.0, 0.0, size, size, 0.0, 0.0, size, 0.0],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_second_acquire_reuses() {
        let cache = HeightFieldCache::default();
        let mesh = square(4.0);
        let control = JobControl::new();
        let first = cache.acquire(&mesh, 0.5, &control).unwrap();
        assert!(!first.reused);
        let second = cache.acquire(&mesh, 0.5, &control).unwrap();
        assert!(second.reused);
        assert!(Arc::ptr_eq(&first.field, &second.field));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_different_resolution_builds_new_entry() {
        let cache = HeightFieldCache::default();
        let mesh = square(4.0);
        let control = JobControl::new();
        cache.acquire(&mesh, 0.5, &control).unwrap();
        let other = cache.acquire(&mesh, 0.25, &control).unwrap();
        assert!(!other.reused);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = HeightFieldCache::with_capacity(2);
        let mesh = square(4.0);
        let control = JobControl::new();
        for res in [0.2, 0.3, 0.4] {
            cache.acquire(&mesh, res, &control).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.acquire(&mesh, 0.2, &control).unwrap().reused);
        assert!(cache.acquire(&mesh, 0.4, &control).unwrap().reused);
    }

    #[test]
    fn test_cancelled_build_not_cached() {
        let cache = HeightFieldCache::default();
        let mesh = square(4.0);
        let flag = AtomicBool::new(true);
        let control = JobControl::new().with_cancel(&flag);
        assert!(cache.acquire(&mesh, 0.5, &control).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = HeightFieldCache::default();
        let mesh = square(4.0);
        cache.acquire(&mesh, 0.5, &JobControl::new()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
