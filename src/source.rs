//! Clip sources: where frame bytes come from.
//!
//! A [`ClipSource`] identifies one clip, either as a filesystem path or as an
//! in-memory byte buffer. The memory variant exists for staging pipelines
//! that synthesize or receive clips without touching disk; it is served to
//! FFmpeg through a small custom AVIO context that implements exactly the
//! read and seek operations the demuxer needs. The byte source is fully
//! owned here, so no foreign type has to be patched to lift position limits
//! and the buffer lives precisely as long as the decode session that reads
//! it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framefeed::ClipSource;
//!
//! let from_disk = ClipSource::path("sportclip_0.mp4");
//!
//! let bytes: Arc<[u8]> = std::fs::read("sportclip_0.mp4")?.into();
//! let from_memory = ClipSource::memory(bytes);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;

use ffmpeg_next::format::context::Input;
use ffmpeg_sys_next::{
    AVERROR_EOF, AVFMT_FLAG_CUSTOM_IO, AVIOContext, AVSEEK_SIZE, av_free, av_freep, av_malloc,
    avformat_alloc_context, avformat_close_input, avformat_find_stream_info,
    avformat_open_input, avio_alloc_context, avio_context_free,
};

use crate::error::FramefeedError;

/// Size of the intermediate I/O buffer handed to `avio_alloc_context`.
const AVIO_BUFFER_SIZE: usize = 4096;

const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;
const SEEK_END: c_int = 2;

/// Identifies one video clip to decode.
///
/// Cloning is cheap: the memory variant shares its bytes through an
/// [`Arc`]. A source carries no decode state; opening it produces a fresh
/// session each time.
#[derive(Debug, Clone)]
pub enum ClipSource {
    /// A clip on the filesystem.
    Path(PathBuf),
    /// A clip held entirely in memory.
    Memory(Arc<[u8]>),
}

impl ClipSource {
    /// A source backed by a file on disk.
    pub fn path<P: AsRef<Path>>(path: P) -> Self {
        ClipSource::Path(path.as_ref().to_path_buf())
    }

    /// A source backed by an in-memory byte buffer.
    pub fn memory<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        ClipSource::Memory(bytes.into())
    }

    /// A path-shaped identifier for error reporting.
    pub fn describe(&self) -> PathBuf {
        match self {
            ClipSource::Path(path) => path.clone(),
            ClipSource::Memory(bytes) => PathBuf::from(format!("<memory clip, {} bytes>", bytes.len())),
        }
    }

    /// Open a demuxer over this source.
    pub(crate) fn open_input(&self) -> Result<OpenedInput, FramefeedError> {
        match self {
            ClipSource::Path(path) => {
                let input = ffmpeg_next::format::input(path).map_err(|error| {
                    FramefeedError::SourceUnreadable {
                        path: path.clone(),
                        reason: error.to_string(),
                    }
                })?;
                Ok(OpenedInput { input, io: None })
            }
            ClipSource::Memory(bytes) => {
                let (input, io) = open_memory_input(Arc::clone(bytes)).map_err(|reason| {
                    FramefeedError::SourceUnreadable {
                        path: self.describe(),
                        reason,
                    }
                })?;
                Ok(OpenedInput {
                    input,
                    io: Some(io),
                })
            }
        }
    }
}

/// An opened demuxer paired with the I/O guard that must outlive it.
///
/// Field order matters: struct fields drop in declaration order, so the
/// demuxer closes before the custom AVIO context is freed. Keep `input`
/// first here and in any struct these fields move into.
pub(crate) struct OpenedInput {
    pub(crate) input: Input,
    pub(crate) io: Option<MemoryIo>,
}

/// Read/seek state shared with the AVIO callbacks.
struct MemoryCursor {
    data: Arc<[u8]>,
    position: usize,
}

/// Owns the custom AVIO context and its callback state.
///
/// Must be dropped **after** the demuxer that uses it has closed; with
/// `AVFMT_FLAG_CUSTOM_IO` set, `avformat_close_input` leaves the AVIO
/// context alone and the owner frees it.
pub(crate) struct MemoryIo {
    avio_context: *mut AVIOContext,
    cursor: *mut MemoryCursor,
}

impl Drop for MemoryIo {
    fn drop(&mut self) {
        // SAFETY: the demuxer reading through this context has already been
        // dropped (guaranteed by field order in the session that owns both).
        // FFmpeg may have replaced the I/O buffer we allocated, so free
        // whatever buffer the context holds now, then the context itself,
        // then the callback state.
        unsafe {
            if !self.avio_context.is_null() {
                av_freep(&mut (*self.avio_context).buffer as *mut _ as *mut c_void);
                avio_context_free(&mut self.avio_context);
            }
            drop(Box::from_raw(self.cursor));
        }
    }
}

/// AVIO read callback: copy the next run of bytes into FFmpeg's buffer.
unsafe extern "C" fn read_memory(opaque: *mut c_void, buffer: *mut u8, buffer_size: c_int) -> c_int {
    let cursor = unsafe { &mut *(opaque as *mut MemoryCursor) };
    let remaining = cursor.data.len().saturating_sub(cursor.position);
    if remaining == 0 {
        return AVERROR_EOF;
    }
    let count = remaining.min(buffer_size.max(0) as usize);
    unsafe {
        ptr::copy_nonoverlapping(cursor.data.as_ptr().add(cursor.position), buffer, count);
    }
    cursor.position += count;
    count as c_int
}

/// AVIO seek callback: reposition the cursor, reporting the buffer length
/// for `AVSEEK_SIZE` queries.
unsafe extern "C" fn seek_memory(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    let cursor = unsafe { &mut *(opaque as *mut MemoryCursor) };
    let length = cursor.data.len() as i64;

    if whence & AVSEEK_SIZE != 0 {
        return length;
    }

    // AVSEEK_FORCE may be OR'd into the whence value; only the low bits
    // select the origin.
    let target = match whence & 0xFFFF {
        SEEK_SET => offset,
        SEEK_CUR => cursor.position as i64 + offset,
        SEEK_END => length + offset,
        _ => return -1,
    };

    if target < 0 || target > length {
        return -1;
    }
    cursor.position = target as usize;
    target
}

/// Open a demuxer over an owned byte buffer via a custom AVIO context.
fn open_memory_input(data: Arc<[u8]>) -> Result<(Input, MemoryIo), String> {
    ffmpeg_next::init().map_err(|error| format!("FFmpeg initialisation failed: {error}"))?;

    // ── Memory-backed demuxing via avio_alloc_context ──────────────
    //
    // SAFETY: We use raw FFmpeg C API calls to attach our own read/seek
    // callbacks to a demuxer. The sequence is:
    //   1. av_malloc              — intermediate I/O buffer (owned by the
    //                               AVIO context once attached)
    //   2. avio_alloc_context     — read-only context over MemoryCursor
    //   3. avformat_alloc_context — demuxer shell, pb = our context,
    //                               AVFMT_FLAG_CUSTOM_IO set so close_input
    //                               leaves the context to us
    //   4. avformat_open_input + avformat_find_stream_info
    //
    // On every failure path below, whatever has been allocated so far is
    // freed here; on success, `MemoryIo` frees the context and cursor after
    // the wrapped `Input` has closed the demuxer.
    unsafe {
        let io_buffer = av_malloc(AVIO_BUFFER_SIZE) as *mut u8;
        if io_buffer.is_null() {
            return Err("av_malloc failed for the I/O buffer".to_string());
        }

        let cursor = Box::into_raw(Box::new(MemoryCursor { data, position: 0 }));

        let avio_context = avio_alloc_context(
            io_buffer,
            AVIO_BUFFER_SIZE as c_int,
            0,
            cursor as *mut c_void,
            Some(read_memory),
            None,
            Some(seek_memory),
        );
        if avio_context.is_null() {
            av_free(io_buffer as *mut c_void);
            drop(Box::from_raw(cursor));
            return Err("avio_alloc_context failed".to_string());
        }

        let io = MemoryIo {
            avio_context,
            cursor,
        };

        let mut format_context = avformat_alloc_context();
        if format_context.is_null() {
            return Err("avformat_alloc_context failed".to_string());
        }
        (*format_context).pb = io.avio_context;
        (*format_context).flags |= AVFMT_FLAG_CUSTOM_IO;

        // On failure avformat_open_input frees the format context itself;
        // the custom AVIO context stays ours either way.
        let open_result =
            avformat_open_input(&mut format_context, ptr::null(), ptr::null(), ptr::null_mut());
        if open_result < 0 {
            return Err(format!(
                "avformat_open_input failed: {}",
                ffmpeg_next::Error::from(open_result)
            ));
        }

        let info_result = avformat_find_stream_info(format_context, ptr::null_mut());
        if info_result < 0 {
            avformat_close_input(&mut format_context);
            return Err(format!(
                "avformat_find_stream_info failed: {}",
                ffmpeg_next::Error::from(info_result)
            ));
        }

        // From here `Input` closes the demuxer and `io` cleans up the AVIO
        // pieces, in that order.
        Ok((Input::wrap(format_context), io))
    }
}
