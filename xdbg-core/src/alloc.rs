//! Zero-initializing allocator with a process-wide live-buffer counter.
//!
//! Every buffer handed out by a [`Tracker`] bumps its counter; releasing or
//! dropping the buffer brings it back down. At shutdown the counter should be
//! zero, anything else is reported by [`Tracker::checkpoint`] as a leak.
//!
//! Allocation failure is not something callers handle. [`Tracker::allocate`]
//! reports the failure and exits the process; [`Tracker::try_allocate`] only
//! exists so the failure travels as a value up to that single exit point.

use once_cell::sync::OnceCell;
use std::alloc::Layout;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicIsize, Ordering};

/// Alignment of every tracked buffer.
pub const BUFFER_ALIGN: usize = 16;

static GLOBAL: Tracker = Tracker::new();

/// The tracker shared by the whole process.
pub fn global() -> &'static Tracker {
    &GLOBAL
}

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("zero-sized allocation requested ({reason})")]
    ZeroSize { reason: &'static str },

    #[error("cannot lay out {size} bytes ({reason})")]
    Layout { size: usize, reason: &'static str },

    #[error("could not allocate {size} bytes ({reason})")]
    Exhausted { size: usize, reason: &'static str },
}

/// Reports an allocation failure and terminates the process with status 1.
pub fn fatal_alloc_failure(err: &AllocError) -> ! {
    log::error!("{}", err);
    eprintln!("Could not allocate memory: {}", err);
    std::process::exit(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocEventKind {
    Allocate,
    Release,
}

/// What an [`AllocObserver`] is told about each allocation and release.
#[derive(Debug, Clone, Copy)]
pub struct AllocEvent<'a> {
    pub kind: AllocEventKind,
    pub address: usize,
    pub size: usize,
    pub reason: &'a str,
    /// Counter value after the operation.
    pub live: isize,
}

/// Instrumentation hook, invoked synchronously on every allocate and release.
pub trait AllocObserver: Send + Sync {
    fn on_allocate(&self, _event: &AllocEvent<'_>) {}

    fn on_release(&self, _event: &AllocEvent<'_>) {}
}

/// Result of the shutdown checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakReport {
    pub live: isize,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.live == 0
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.live {
            0 => write!(f, "no leaks"),
            n if n > 0 => write!(f, "{} buffer(s) leaked", n),
            n => write!(f, "{} buffer(s) over-released", -n),
        }
    }
}

pub struct Tracker {
    live: AtomicIsize,
    observer: OnceCell<Box<dyn AllocObserver>>,
}

impl Tracker {
    pub const fn new() -> Self {
        Self {
            live: AtomicIsize::new(0),
            observer: OnceCell::new(),
        }
    }

    /// Installs the observer. Only one can be installed per tracker; a second
    /// call hands the rejected observer back.
    pub fn set_observer(
        &self,
        observer: Box<dyn AllocObserver>,
    ) -> Result<(), Box<dyn AllocObserver>> {
        self.observer.set(observer)
    }

    /// Allocates `size` zeroed bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    ///
    /// Exits the process if the allocator cannot satisfy the request.
    pub fn allocate(&self, size: usize, reason: &'static str) -> TrackedBuffer<'_> {
        assert!(size != 0, "zero-sized allocation requested ({reason})");
        self.try_allocate(size, reason)
            .unwrap_or_else(|e| fatal_alloc_failure(&e))
    }

    pub fn try_allocate(
        &self,
        size: usize,
        reason: &'static str,
    ) -> Result<TrackedBuffer<'_>, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize { reason });
        }
        let layout = Layout::from_size_align(size, BUFFER_ALIGN)
            .map_err(|_| AllocError::Layout { size, reason })?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocError::Exhausted { size, reason })?;

        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
        let buffer = TrackedBuffer {
            ptr,
            layout,
            reason,
            tracker: self,
        };
        self.notify(&AllocEvent {
            kind: AllocEventKind::Allocate,
            address: ptr.as_ptr() as usize,
            size,
            reason,
            live,
        });
        Ok(buffer)
    }

    /// Returns `buffer` to the allocator, tagging the release with `reason`.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` was allocated by another tracker. The buffer is
    /// still released, against the tracker that allocated it.
    pub fn release(&self, mut buffer: TrackedBuffer<'_>, reason: &'static str) {
        assert!(
            std::ptr::eq(buffer.tracker, self),
            "buffer released to a tracker that did not allocate it"
        );
        buffer.reason = reason;
        drop(buffer);
    }

    /// Releases `buffer` (if any) and allocates a fresh zeroed one.
    ///
    /// The old contents are not carried over.
    ///
    /// # Panics
    ///
    /// Panics if `new_size` is zero, before `buffer` is released.
    pub fn reallocate(
        &self,
        buffer: Option<TrackedBuffer<'_>>,
        new_size: usize,
        reason: &'static str,
    ) -> TrackedBuffer<'_> {
        assert!(new_size != 0, "zero-sized reallocation requested ({reason})");
        if let Some(buffer) = buffer {
            self.release(buffer, reason);
        }
        self.allocate(new_size, reason)
    }

    /// Number of buffers currently outstanding.
    pub fn leak_count(&self) -> isize {
        self.live.load(Ordering::Relaxed)
    }

    /// Reads the counter at shutdown and logs the outcome.
    pub fn checkpoint(&self) -> LeakReport {
        let report = LeakReport {
            live: self.live.load(Ordering::SeqCst),
        };
        if report.is_clean() {
            log::info!("allocation checkpoint: {}", report);
        } else {
            log::warn!("allocation checkpoint: {}", report);
        }
        report
    }

    fn notify(&self, event: &AllocEvent<'_>) {
        log::trace!(
            "{:?}: {:#x}:{}:{:#x} live={}",
            event.kind,
            event.address,
            event.reason,
            event.size,
            event.live
        );
        if let Some(observer) = self.observer.get() {
            match event.kind {
                AllocEventKind::Allocate => observer.on_allocate(event),
                AllocEventKind::Release => observer.on_release(event),
            }
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("live", &self.leak_count())
            .field("observer", &self.observer.get().is_some())
            .finish()
    }
}

/// A zeroed heap buffer owned by the caller and counted by its [`Tracker`].
///
/// Dropping it releases it under the reason it was allocated with.
pub struct TrackedBuffer<'t> {
    ptr: NonNull<u8>,
    layout: Layout,
    reason: &'static str,
    tracker: &'t Tracker,
}

// SAFETY: the buffer uniquely owns its allocation and the tracker is Sync.
unsafe impl Send for TrackedBuffer<'_> {}
unsafe impl Sync for TrackedBuffer<'_> {}

impl TrackedBuffer<'_> {
    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Gives up ownership without releasing. The tracker keeps counting the
    /// buffer, so it shows up at the checkpoint.
    pub fn leak(self) -> &'static mut [u8] {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: the allocation is never freed, so it lives for 'static.
        unsafe { std::slice::from_raw_parts_mut(this.ptr.as_ptr(), this.layout.size()) }
    }
}

impl Deref for TrackedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid and initialized for layout.size() bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for TrackedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and we hold the only reference.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl fmt::Debug for TrackedBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.layout.size())
            .field("reason", &self.reason)
            .finish()
    }
}

impl Drop for TrackedBuffer<'_> {
    fn drop(&mut self) {
        let live = self.tracker.live.fetch_sub(1, Ordering::Relaxed) - 1;
        self.tracker.notify(&AllocEvent {
            kind: AllocEventKind::Release,
            address: self.ptr.as_ptr() as usize,
            size: self.layout.size(),
            reason: self.reason,
            live,
        });
        // SAFETY: ptr came from alloc_zeroed with this exact layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Allocates from the process-wide tracker. See [`Tracker::allocate`].
pub fn emalloc(size: usize, reason: &'static str) -> TrackedBuffer<'static> {
    global().allocate(size, reason)
}

/// Reallocates on the process-wide tracker. See [`Tracker::reallocate`].
pub fn erealloc(
    buffer: Option<TrackedBuffer<'static>>,
    size: usize,
    reason: &'static str,
) -> TrackedBuffer<'static> {
    global().reallocate(buffer, size, reason)
}

/// Releases to the process-wide tracker.
pub fn efree(buffer: TrackedBuffer<'static>, reason: &'static str) {
    global().release(buffer, reason)
}

/// Outstanding buffers on the process-wide tracker. Only meaningful at shutdown.
pub fn memleaks() -> isize {
    global().leak_count()
}
