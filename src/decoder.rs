//! Frame decoding: sequential sessions and direct frame access.
//!
//! [`FrameDecoder`] is the entry point for turning a [`ClipSource`] into
//! decoded pictures. The preferred path is a [`DecoderSession`]: seek once to
//! the window start, then pull frames sequentially with
//! [`next_frame`](DecoderSession::next_frame). When a sequential decode fails
//! for a single frame, the extractor retries that one frame through
//! [`FrameDecoder::frame_at`], which opens a fresh session, seeks, and
//! decodes just the requested frame.
//!
//! A session is owned decode state — demuxer, open video decoder, scaler,
//! current position — and must be driven by a single logical sequence of
//! calls. It is finite and not restartable: re-reading a clip means opening
//! a new session.
//!
//! # Example
//!
//! ```no_run
//! use framefeed::{ClipSource, FrameDecoder};
//!
//! let source = ClipSource::path("sportclip_0.mp4");
//! let mut session = FrameDecoder::open(&source, (168, 168))?;
//! session.seek_to(5)?;
//! while let Some(picture) = session.next_frame()? {
//!     println!("decoded a {}x{} picture", picture.width(), picture.height());
//! }
//! # Ok::<(), framefeed::FramefeedError>(())
//! ```

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    media::Type as MediaType,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use log::{debug, warn};

use crate::error::FramefeedError;
use crate::metadata::VideoMetadata;
use crate::picture::DecodedPicture;
use crate::source::{ClipSource, OpenedInput};
use crate::utilities::{
    frame_number_to_seek_timestamp, frame_to_rgb_buffer, pts_to_frame_number,
    seconds_to_nearest_frame,
};

/// Entry point for opening decode sessions and direct frame access.
///
/// `FrameDecoder` itself is stateless; all decode state lives in the
/// [`DecoderSession`] it produces.
pub struct FrameDecoder;

impl FrameDecoder {
    /// Open a sequential decode session over `source`.
    ///
    /// Decoded frames are scaled to `target_dimensions` (width, height) with
    /// bilinear filtering before being handed over as pictures.
    ///
    /// # Errors
    ///
    /// - [`FramefeedError::SourceUnreadable`] if the source cannot be opened.
    /// - [`FramefeedError::NoVideoStream`] if it contains no video stream.
    pub fn open(
        source: &ClipSource,
        target_dimensions: (u32, u32),
    ) -> Result<DecoderSession, FramefeedError> {
        ffmpeg_next::init().map_err(|error| FramefeedError::SourceUnreadable {
            path: source.describe(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let opened = source.open_input()?;
        DecoderSession::from_opened(source.clone(), opened, target_dimensions)
    }

    /// Decode exactly one frame through a fresh session.
    ///
    /// This is the fallback path: a new demuxer is opened, positioned at
    /// `frame_number`, and the single frame is decoded and returned. Slower
    /// than sequential access, but independent of whatever state the failing
    /// session was in.
    ///
    /// # Errors
    ///
    /// Any open error propagates; a `frame_number` at or past the clip's
    /// reported frame count is [`FramefeedError::FrameOutOfRange`]; a frame
    /// that still fails to decode becomes
    /// [`FramefeedError::FrameDecodeFailed`].
    pub fn frame_at(
        source: &ClipSource,
        frame_number: u64,
        target_dimensions: (u32, u32),
    ) -> Result<DecodedPicture, FramefeedError> {
        let mut session = Self::open(source, target_dimensions)?;
        session.seek_to(frame_number)?;
        session
            .next_frame()?
            .ok_or_else(|| FramefeedError::FrameDecodeFailed {
                frame_number,
                reason: "stream ended before the requested frame".to_string(),
            })
    }

    /// Read a clip's video metadata without keeping a session open.
    pub fn probe(source: &ClipSource) -> Result<VideoMetadata, FramefeedError> {
        ffmpeg_next::init().map_err(|error| FramefeedError::SourceUnreadable {
            path: source.describe(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let opened = source.open_input()?;
        let stream_index = opened
            .input
            .streams()
            .best(MediaType::Video)
            .ok_or_else(|| FramefeedError::NoVideoStream {
                path: source.describe(),
            })?
            .index();
        VideoMetadata::from_input(&opened.input, stream_index, &source.describe())
    }
}

/// Owned decode state for one pass over one clip.
///
/// Created by [`FrameDecoder::open`]. The session tracks its current frame
/// position; [`next_frame`](DecoderSession::next_frame) advances it by one.
/// Sessions are not restartable and must not be shared across threads while
/// a decode sequence is in flight.
pub struct DecoderSession {
    source: ClipSource,
    // Demuxer first: struct fields drop in declaration order, and the custom
    // AVIO context inside `opened.io` must outlive the demuxer.
    opened: OpenedInput,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    time_base: Rational,
    metadata: VideoMetadata,
    target_width: u32,
    target_height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    /// The frame number the next successful `next_frame` call will return.
    position: u64,
    /// Decoded frames below this number are discarded (post-seek catch-up).
    discard_below: u64,
    eof_sent: bool,
    finished: bool,
}

impl DecoderSession {
    fn from_opened(
        source: ClipSource,
        opened: OpenedInput,
        (target_width, target_height): (u32, u32),
    ) -> Result<Self, FramefeedError> {
        let path = source.describe();

        let stream = opened
            .input
            .streams()
            .best(MediaType::Video)
            .ok_or_else(|| FramefeedError::NoVideoStream { path: path.clone() })?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let metadata = VideoMetadata::from_input(&opened.input, video_stream_index, &path)?;

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                FramefeedError::SourceUnreadable {
                    path: path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder = decoder_context.decoder().video().map_err(|error| {
            FramefeedError::SourceUnreadable {
                path: path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            }
        })?;

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| FramefeedError::SourceUnreadable {
            path,
            reason: format!("Failed to create scaler: {error}"),
        })?;

        Ok(Self {
            source,
            opened,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            metadata,
            target_width,
            target_height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            position: 0,
            discard_below: 0,
            eof_sent: false,
            finished: false,
        })
    }

    /// Metadata of the clip this session reads.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// The frame number the next [`next_frame`](DecoderSession::next_frame)
    /// call will return, assuming it succeeds.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Position the session so that `frame_number` is the next frame
    /// returned.
    ///
    /// Seeks the container to the nearest prior keyframe, flushes the
    /// decoder, and marks intermediate frames for discard; the decode-forward
    /// happens lazily inside `next_frame`.
    ///
    /// # Errors
    ///
    /// - [`FramefeedError::FrameOutOfRange`] if the clip reports a frame
    ///   count and `frame_number` is not below it. The session position is
    ///   unchanged.
    /// - [`FramefeedError::SeekFailed`] if the container seek fails. This is
    ///   fatal for the extraction pass that issued it: there is no sequencing
    ///   point to recover.
    pub fn seek_to(&mut self, frame_number: u64) -> Result<(), FramefeedError> {
        // Some containers report no frame count; those fall through and hit
        // end-of-stream during the decode instead.
        let total_frames = self.metadata.frame_count;
        if total_frames > 0 && frame_number >= total_frames {
            return Err(FramefeedError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }

        let fps = self.metadata.frames_per_second;
        let timestamp = frame_number_to_seek_timestamp(frame_number, fps.max(1.0));

        self.opened
            .input
            .seek(timestamp, ..timestamp)
            .map_err(|error| FramefeedError::SeekFailed {
                frame_number,
                reason: error.to_string(),
            })?;

        self.decoder.flush();
        self.position = frame_number;
        self.discard_below = frame_number;
        self.eof_sent = false;
        self.finished = false;
        debug!("seeked to frame {frame_number} (ts {timestamp})");
        Ok(())
    }

    /// Decode the next frame in sequence.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// [`FramefeedError::FrameDecodeFailed`] with the current position when
    /// the decoder rejects a packet or the decoded data cannot be converted.
    /// The session stays usable; the caller decides whether to retry the
    /// frame through [`FrameDecoder::frame_at`] or give up.
    pub fn next_frame(&mut self) -> Result<Option<DecodedPicture>, FramefeedError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            // Drain frames the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let pts = self.decoded_frame.pts().unwrap_or(0);
                let current = pts_to_frame_number(
                    pts,
                    self.time_base,
                    self.metadata.frames_per_second,
                );

                if current < self.discard_below {
                    // Keyframe catch-up after a seek.
                    continue;
                }

                let picture = self.convert_current()?;
                self.position = current + 1;
                self.discard_below = self.position;
                return Ok(Some(picture));
            }

            if self.eof_sent {
                self.finished = true;
                return Ok(None);
            }

            // Decoder is empty. Feed it more packets.
            let mut packet = Packet::empty();
            match packet.read(&mut self.opened.input) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            FramefeedError::FrameDecodeFailed {
                                frame_number: self.position,
                                reason: error.to_string(),
                            }
                        })?;
                    }
                    // Packets of other streams are skipped.
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof().map_err(|error| {
                        FramefeedError::FrameDecodeFailed {
                            frame_number: self.position,
                            reason: error.to_string(),
                        }
                    })?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    warn!(
                        "packet read error near frame {} of {}: {error}",
                        self.position,
                        self.source.describe().display()
                    );
                    // Transient read errors: try the next packet.
                }
            }
        }
    }

    /// Decode the frame nearest a timestamp.
    ///
    /// Used by time-based sampling, which calls this with monotonically
    /// increasing timestamps. Every call seeks, so there is no fallback
    /// path: a failure here is fatal for the sampling pass.
    pub fn frame_at_time(&mut self, seconds: f64) -> Result<DecodedPicture, FramefeedError> {
        let fps = self.metadata.frames_per_second;
        if fps <= 0.0 {
            return Err(FramefeedError::SourceUnreadable {
                path: self.source.describe(),
                reason: "clip reports no frame rate; time-based sampling impossible".to_string(),
            });
        }

        let frame_number = seconds_to_nearest_frame(seconds, fps);
        self.seek_to(frame_number)?;
        self.next_frame()?
            .ok_or_else(|| FramefeedError::FrameDecodeFailed {
                frame_number,
                reason: format!("stream ended before the frame nearest t={seconds:.3}s"),
            })
    }

    /// Scale the current decoded frame and repack it as a signed-domain
    /// picture.
    fn convert_current(&mut self) -> Result<DecodedPicture, FramefeedError> {
        self.scaler
            .run(&self.decoded_frame, &mut self.scaled_frame)
            .map_err(|error| FramefeedError::FrameDecodeFailed {
                frame_number: self.position,
                reason: format!("scaling failed: {error}"),
            })?;

        let rgb = frame_to_rgb_buffer(&self.scaled_frame, self.target_width, self.target_height);
        DecodedPicture::from_rgb24(self.target_width, self.target_height, &rgb)
    }
}
