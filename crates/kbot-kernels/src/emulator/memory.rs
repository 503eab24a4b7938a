//! Emulated device memory: a capacity-limited pool of host slabs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{DeviceBuffer, DeviceError};

pub(crate) struct Pool {
    slabs: HashMap<u64, Vec<u8>>,
    next_id: u64,
    used: usize,
    capacity: usize,
}

pub(crate) type SharedPool = Arc<Mutex<Pool>>;

impl Pool {
    pub(crate) fn shared(capacity: usize) -> SharedPool {
        Arc::new(Mutex::new(Pool {
            slabs: HashMap::new(),
            next_id: 0,
            used: 0,
            capacity,
        }))
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.slabs.len()
    }

    pub(crate) fn slab(&self, id: u64) -> Result<&Vec<u8>, DeviceError> {
        self.slabs
            .get(&id)
            .ok_or_else(|| DeviceError::Transfer(format!("buffer {id} is not allocated")))
    }

    pub(crate) fn slab_mut(&mut self, id: u64) -> Result<&mut Vec<u8>, DeviceError> {
        self.slabs
            .get_mut(&id)
            .ok_or_else(|| DeviceError::Transfer(format!("buffer {id} is not allocated")))
    }
}

/// A buffer in emulated device memory. Released back to the pool on drop.
pub struct EmulatedBuffer {
    pub(crate) id: u64,
    nbytes: usize,
    pool: SharedPool,
}

impl EmulatedBuffer {
    /// Allocate zeroed memory from the pool.
    pub(crate) fn zeros(pool: &SharedPool, nbytes: usize) -> Result<Self, DeviceError> {
        let mut p = pool.lock();
        let available = p.capacity.saturating_sub(p.used);
        if nbytes > available {
            return Err(DeviceError::ResourceExhausted { requested: nbytes, available });
        }
        let id = p.next_id;
        p.next_id += 1;
        p.used += nbytes;
        p.slabs.insert(id, vec![0u8; nbytes]);
        Ok(Self { id, nbytes, pool: Arc::clone(pool) })
    }
}

impl DeviceBuffer for EmulatedBuffer {
    fn len(&self) -> usize {
        self.nbytes
    }
}

impl std::fmt::Debug for EmulatedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatedBuffer")
            .field("id", &self.id)
            .field("nbytes", &self.nbytes)
            .finish()
    }
}

impl Drop for EmulatedBuffer {
    fn drop(&mut self) {
        let mut p = self.pool.lock();
        if p.slabs.remove(&self.id).is_some() {
            p.used -= self.nbytes;
        }
    }
}
