use std::{
    collections::VecDeque,
    fmt::Debug,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// How the memory handed out by a [`BufferFactory`] is owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocator {
    /// Pooled, reference-counted memory. Buffers may alias transport receive
    /// buffers without copying.
    Pooled,
    /// Plain heap memory with no aliasing guarantee.
    Heap,
}

pub trait BufferFactory: Debug + Send + Sync + 'static {
    fn allocate(&self, capacity: usize) -> DataBuffer;

    fn allocator(&self) -> Allocator;
}

/// Writable buffer obtained from a [`BufferFactory`].
///
/// Pooled buffers go back to their pool on drop unless frozen.
pub struct DataBuffer {
    buf: Option<BytesMut>,
    pool: Option<Pool>,
}

impl DataBuffer {
    pub fn unpooled(buf: BytesMut) -> Self {
        Self {
            buf: Some(buf),
            pool: None,
        }
    }

    fn pooled(pool: Pool, buf: BytesMut) -> Self {
        Self {
            buf: Some(buf),
            pool: Some(pool),
        }
    }

    /// Converts into immutable bytes. The memory leaves the pool.
    pub fn freeze(mut self) -> Bytes {
        self.buf.take().expect("data buffer is none").freeze()
    }
}

impl Drop for DataBuffer {
    fn drop(&mut self) {
        let (Some(buf), Some(pool)) = (self.buf.take(), self.pool.take()) else {
            return;
        };
        pool.put(buf)
    }
}

impl Deref for DataBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref().expect("data buffer is none")
    }
}

impl DerefMut for DataBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("data buffer is none")
    }
}

impl Debug for DataBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBuffer")
            .field("len", &self.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[derive(Clone)]
struct Pool {
    buffers: Arc<Mutex<VecDeque<BytesMut>>>,
    max_pooled: usize,
}

impl Pool {
    fn new(max_pooled: usize) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(VecDeque::new())),
            max_pooled,
        }
    }

    fn get(&self, capacity: usize) -> DataBuffer {
        let reused = {
            let mut buffers = self.buffers.lock();
            buffers.pop_front()
        };
        let mut buf = reused.unwrap_or_default();
        buf.reserve(capacity);
        DataBuffer::pooled(self.clone(), buf)
    }

    fn put(&self, mut buf: BytesMut) {
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push_back(buf);
        }
    }

    fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// Buffer factory backed by a reuse pool.
#[derive(Clone)]
pub struct PooledBufferFactory {
    pool: Pool,
}

impl PooledBufferFactory {
    pub const DEFAULT_MAX_POOLED: usize = 64;

    pub fn new(max_pooled: usize) -> Self {
        Self {
            pool: Pool::new(max_pooled),
        }
    }

    /// Number of buffers waiting in the pool.
    pub fn idle(&self) -> usize {
        self.pool.idle()
    }
}

impl Default for PooledBufferFactory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_POOLED)
    }
}

impl Debug for PooledBufferFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBufferFactory")
            .field("idle", &self.idle())
            .field("max_pooled", &self.pool.max_pooled)
            .finish()
    }
}

impl BufferFactory for PooledBufferFactory {
    fn allocate(&self, capacity: usize) -> DataBuffer {
        self.pool.get(capacity)
    }

    fn allocator(&self) -> Allocator {
        Allocator::Pooled
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeapBufferFactory;

impl BufferFactory for HeapBufferFactory {
    fn allocate(&self, capacity: usize) -> DataBuffer {
        DataBuffer::unpooled(BytesMut::with_capacity(capacity))
    }

    fn allocator(&self) -> Allocator {
        Allocator::Heap
    }
}
