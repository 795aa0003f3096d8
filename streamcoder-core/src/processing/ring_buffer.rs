//! Lock-free single-producer/single-consumer ring buffer for interleaved PCM.
//!
//! The buffer is a power-of-two sized byte array with two cursors. The write
//! cursor is only ever stored by the producer and the read cursor only by the
//! consumer, so the two sides never contend: each publishes its cursor with a
//! release store and observes the other side's cursor with an acquire load.
//!
//! One byte of capacity is permanently unusable so that `write == read` always
//! means "empty":
//!
//! ```text
//! readable = w - r                      if w > r
//!            (w - r + size) & mask      otherwise
//! writable = ((r - w + size) & mask) - 1   if w > r
//!            r - w - 1                     if w < r
//!            size - 1                      if w == r
//! ```
//!
//! A `RingBuffer` owns both halves and can be used from a single thread (the
//! codec does this for its resampled stream). `split()` hands the halves to the
//! two threads that share it; neither half is `Clone`, which keeps the
//! single-writer/single-reader discipline in the type system.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Size in bytes of one interleaved sample.
pub const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Smallest backing allocation handed out, in bytes.
const MIN_SIZE: usize = 2;

struct Shared {
    buf: Box<[UnsafeCell<u8>]>,
    size: usize,
    size_mask: usize,
    channels: usize,
    write_ptr: AtomicUsize,
    read_ptr: AtomicUsize,
}

// SAFETY: the backing bytes are only touched through `RingWriter` (bytes in
// the writable region) and `RingReader` (bytes in the readable region). The
// regions are disjoint and handed over through release/acquire cursor stores.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    fn new(requested_bytes: usize, channels: usize) -> Self {
        let size = requested_bytes.max(MIN_SIZE).next_power_of_two();
        let buf: Box<[UnsafeCell<u8>]> = (0..size).map(|_| UnsafeCell::new(0u8)).collect();
        Self {
            buf,
            size,
            size_mask: size - 1,
            channels: channels.max(1),
            write_ptr: AtomicUsize::new(0),
            read_ptr: AtomicUsize::new(0),
        }
    }

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.buf.as_ptr())
    }

    fn frame_bytes(&self) -> usize {
        self.channels * SAMPLE_BYTES
    }

    fn readable(&self, w: usize, r: usize) -> usize {
        if w > r {
            w - r
        } else {
            (w + self.size - r) & self.size_mask
        }
    }

    fn writable(&self, w: usize, r: usize) -> usize {
        if w > r {
            ((r + self.size - w) & self.size_mask) - 1
        } else if w < r {
            r - w - 1
        } else {
            self.size - 1
        }
    }

    fn cursors(&self) -> (usize, usize) {
        (
            self.write_ptr.load(Ordering::Acquire),
            self.read_ptr.load(Ordering::Acquire),
        )
    }

    fn read_space_bytes(&self) -> usize {
        let (w, r) = self.cursors();
        self.readable(w, r)
    }

    fn write_space_bytes(&self) -> usize {
        let (w, r) = self.cursors();
        self.writable(w, r)
    }

    /// Splits a run of `cnt` bytes starting at `pos` into the part before the
    /// end of the array and the part that wraps to the front.
    fn segments(&self, pos: usize, cnt: usize) -> (usize, usize) {
        let end = pos + cnt;
        if end > self.size {
            (self.size - pos, end & self.size_mask)
        } else {
            (cnt, 0)
        }
    }

    /// Copies up to `cnt` bytes from `src` into the writable region.
    ///
    /// # Safety
    /// Only the single producer may call this, and `src` must be valid for
    /// reads of `cnt` bytes.
    unsafe fn push(&self, src: *const u8, cnt: usize) -> usize {
        let w = self.write_ptr.load(Ordering::Relaxed);
        let r = self.read_ptr.load(Ordering::Acquire);
        let to_write = cnt.min(self.writable(w, r));
        if to_write == 0 {
            return 0;
        }
        let (n1, n2) = self.segments(w, to_write);
        ptr::copy_nonoverlapping(src, self.base().add(w), n1);
        if n2 > 0 {
            ptr::copy_nonoverlapping(src.add(n1), self.base(), n2);
        }
        self.write_ptr
            .store((w + to_write) & self.size_mask, Ordering::Release);
        to_write
    }

    /// Copies up to `cnt` bytes out of the readable region, advancing the
    /// read cursor when `consume` is set.
    ///
    /// # Safety
    /// Only the single consumer may call this, and `dest` must be valid for
    /// writes of `cnt` bytes.
    unsafe fn pull(&self, dest: *mut u8, cnt: usize, consume: bool) -> usize {
        let r = self.read_ptr.load(Ordering::Relaxed);
        let w = self.write_ptr.load(Ordering::Acquire);
        let to_read = cnt.min(self.readable(w, r));
        if to_read == 0 {
            return 0;
        }
        let (n1, n2) = self.segments(r, to_read);
        ptr::copy_nonoverlapping(self.base().add(r), dest, n1);
        if n2 > 0 {
            ptr::copy_nonoverlapping(self.base(), dest.add(n1), n2);
        }
        if consume {
            self.read_ptr
                .store((r + to_read) & self.size_mask, Ordering::Release);
        }
        to_read
    }

    fn advance_read(&self, cnt: usize) -> usize {
        let r = self.read_ptr.load(Ordering::Relaxed);
        let w = self.write_ptr.load(Ordering::Acquire);
        let cnt = cnt.min(self.readable(w, r));
        self.read_ptr
            .store((r + cnt) & self.size_mask, Ordering::Release);
        cnt
    }

    fn advance_write(&self, cnt: usize) -> usize {
        let w = self.write_ptr.load(Ordering::Relaxed);
        let r = self.read_ptr.load(Ordering::Acquire);
        let cnt = cnt.min(self.writable(w, r));
        self.write_ptr
            .store((w + cnt) & self.size_mask, Ordering::Release);
        cnt
    }
}

/// The readable region of a ring buffer, as at most two contiguous runs.
#[derive(Debug)]
pub struct ReadSegments<'a> {
    pub first: &'a [u8],
    pub second: &'a [u8],
}

impl ReadSegments<'_> {
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The writable region of a ring buffer, as at most two contiguous runs.
#[derive(Debug)]
pub struct WriteSegments<'a> {
    pub first: &'a mut [u8],
    pub second: &'a mut [u8],
}

impl WriteSegments<'_> {
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Producer half. Owned by whatever context delivers captured audio.
pub struct RingWriter {
    shared: Arc<Shared>,
}

impl RingWriter {
    /// Writes up to `frames` whole frames from `samples`.
    ///
    /// Returns the number of frames actually written, which is less than
    /// requested when the buffer is short of space. Never blocks.
    pub fn write(&mut self, samples: &[f32], frames: usize) -> usize {
        let frame_bytes = self.shared.frame_bytes();
        let frames = frames
            .min(samples.len() / self.shared.channels)
            .min(self.shared.write_space_bytes() / frame_bytes);
        if frames == 0 {
            return 0;
        }
        // SAFETY: this is the only producer handle and `samples` holds at
        // least `frames * channels` floats.
        let written = unsafe { self.shared.push(samples.as_ptr().cast(), frames * frame_bytes) };
        written / frame_bytes
    }

    /// Copies raw bytes in. Not frame-quantized.
    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        // SAFETY: sole producer; `data` is valid for `data.len()` bytes.
        unsafe { self.shared.push(data.as_ptr(), data.len()) }
    }

    /// Exposes the writable region for in-place filling. Follow with
    /// [`RingWriter::write_advance`] to publish what was written.
    pub fn write_vector(&mut self) -> WriteSegments<'_> {
        let (w, r) = self.shared.cursors();
        let free = self.shared.writable(w, r);
        let (n1, n2) = self.shared.segments(w, free);
        let base = self.shared.base();
        // SAFETY: the writable region belongs to the producer until the
        // write cursor is advanced past it, and `&mut self` keeps a second
        // view from being created meanwhile.
        unsafe {
            WriteSegments {
                first: std::slice::from_raw_parts_mut(base.add(w), n1),
                second: std::slice::from_raw_parts_mut(base, n2),
            }
        }
    }

    /// Publishes `bytes` bytes filled through [`RingWriter::write_vector`].
    pub fn write_advance(&mut self, bytes: usize) -> usize {
        self.shared.advance_write(bytes)
    }

    pub fn write_space(&self) -> usize {
        self.shared.write_space_bytes() / self.shared.frame_bytes()
    }

    pub fn read_space(&self) -> usize {
        self.shared.read_space_bytes() / self.shared.frame_bytes()
    }

    pub fn channels(&self) -> usize {
        self.shared.channels
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }
}

/// Consumer half. Owned by the codec.
pub struct RingReader {
    shared: Arc<Shared>,
}

impl RingReader {
    /// Reads up to `frames` whole frames into `dest`.
    ///
    /// Returns fewer frames than requested when less data is buffered.
    pub fn read(&mut self, dest: &mut [f32], frames: usize) -> usize {
        self.copy_frames(dest, frames, true)
    }

    /// Like [`RingReader::read`] but leaves the data in place.
    pub fn peek(&self, dest: &mut [f32], frames: usize) -> usize {
        self.copy_frames(dest, frames, false)
    }

    fn copy_frames(&self, dest: &mut [f32], frames: usize, consume: bool) -> usize {
        let frame_bytes = self.shared.frame_bytes();
        let frames = frames
            .min(dest.len() / self.shared.channels)
            .min(self.shared.read_space_bytes() / frame_bytes);
        if frames == 0 {
            return 0;
        }
        // SAFETY: this is the only consumer handle and `dest` has room for
        // `frames * channels` floats.
        let read = unsafe {
            self.shared
                .pull(dest.as_mut_ptr().cast(), frames * frame_bytes, consume)
        };
        read / frame_bytes
    }

    pub fn read_bytes(&mut self, dest: &mut [u8]) -> usize {
        // SAFETY: sole consumer; `dest` is valid for `dest.len()` bytes.
        unsafe { self.shared.pull(dest.as_mut_ptr(), dest.len(), true) }
    }

    pub fn peek_bytes(&self, dest: &mut [u8]) -> usize {
        // SAFETY: sole consumer; `dest` is valid for `dest.len()` bytes.
        unsafe { self.shared.pull(dest.as_mut_ptr(), dest.len(), false) }
    }

    /// Discards up to `frames` frames without copying them.
    pub fn dump(&mut self, frames: usize) -> usize {
        let frame_bytes = self.shared.frame_bytes();
        let available = self.shared.read_space_bytes() / frame_bytes;
        let frames = frames.min(available);
        self.shared.advance_read(frames * frame_bytes) / frame_bytes
    }

    /// Exposes the readable region without copying. Follow with
    /// [`RingReader::read_advance`] to release what was consumed.
    pub fn read_vector(&self) -> ReadSegments<'_> {
        let (w, r) = self.shared.cursors();
        let available = self.shared.readable(w, r);
        let (n1, n2) = self.shared.segments(r, available);
        let base = self.shared.base();
        // SAFETY: the readable region is not touched by the producer until
        // the read cursor moves past it, which needs `&mut self`.
        unsafe {
            ReadSegments {
                first: std::slice::from_raw_parts(base.add(r), n1),
                second: std::slice::from_raw_parts(base, n2),
            }
        }
    }

    pub fn read_advance(&mut self, bytes: usize) -> usize {
        self.shared.advance_read(bytes)
    }

    /// Most whole frames the ring can hold at once.
    pub fn usable_frames(&self) -> usize {
        (self.shared.size - 1) / self.shared.frame_bytes()
    }

    pub fn read_space(&self) -> usize {
        self.shared.read_space_bytes() / self.shared.frame_bytes()
    }

    pub fn write_space(&self) -> usize {
        self.shared.write_space_bytes() / self.shared.frame_bytes()
    }

    pub fn channels(&self) -> usize {
        self.shared.channels
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }
}

/// A ring buffer with both halves held by one owner.
pub struct RingBuffer {
    writer: RingWriter,
    reader: RingReader,
}

impl RingBuffer {
    /// Creates a buffer of at least `requested_bytes` bytes, rounded up to the
    /// next power of two, holding frames of `channels` interleaved floats.
    ///
    /// Allocation failure aborts the process.
    pub fn new(requested_bytes: usize, channels: usize) -> Self {
        let shared = Arc::new(Shared::new(requested_bytes, channels));
        Self {
            writer: RingWriter {
                shared: Arc::clone(&shared),
            },
            reader: RingReader { shared },
        }
    }

    /// Hands the producer and consumer halves to separate owners.
    pub fn split(self) -> (RingWriter, RingReader) {
        (self.writer, self.reader)
    }

    /// Empties the buffer and zeroes the storage.
    ///
    /// Needs both halves, so it can only happen before `split()`.
    pub fn reset(&mut self) {
        let shared = &self.writer.shared;
        shared.read_ptr.store(0, Ordering::Release);
        shared.write_ptr.store(0, Ordering::Release);
        // SAFETY: both halves are borrowed mutably through `self`.
        unsafe { ptr::write_bytes(shared.base(), 0, shared.size) };
    }

    pub fn write(&mut self, samples: &[f32], frames: usize) -> usize {
        self.writer.write(samples, frames)
    }

    pub fn read(&mut self, dest: &mut [f32], frames: usize) -> usize {
        self.reader.read(dest, frames)
    }

    pub fn dump(&mut self, frames: usize) -> usize {
        self.reader.dump(frames)
    }

    pub fn read_space(&self) -> usize {
        self.reader.read_space()
    }

    pub fn write_space(&self) -> usize {
        self.writer.write_space()
    }

    pub fn writer(&mut self) -> &mut RingWriter {
        &mut self.writer
    }

    pub fn reader(&mut self) -> &mut RingReader {
        &mut self.reader
    }

    /// Capacity of the backing storage in bytes.
    pub fn size(&self) -> usize {
        self.writer.size()
    }

    /// Whole frames that fit in the backing storage (one less is usable).
    pub fn capacity_frames(&self) -> usize {
        self.size() / self.writer.shared.frame_bytes()
    }

    pub fn channels(&self) -> usize {
        self.writer.channels()
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("size", &self.size())
            .field("channels", &self.channels())
            .field("read_space", &self.read_space())
            .field("write_space", &self.write_space())
            .finish()
    }
}
