//! Async read-ahead batch streaming.
//!
//! [`BatchStream`] wraps a [`LabeledSequenceBatcher`] (or any `Send` batch
//! source) so the next mini-batch is assembled on a background blocking
//! thread while the consumer works on the current one. The hand-off is a
//! bounded `mpsc` channel of capacity 1 — exactly one batch may be
//! outstanding, which keeps memory bounded and preserves ordering: batches
//! arrive exactly once, in assembly order, and the consumer awaits a batch
//! that is not ready yet rather than receiving a partial result.
//!
//! Decoding is CPU-heavy FFmpeg work, so it runs under
//! `tokio::task::spawn_blocking` instead of tying up the runtime's
//! cooperative task budget. Dropping the stream closes the channel, which
//! stops the producer at the next batch boundary.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use framefeed::{BatchStream, ClipSet, FrameWindow, FramefeedError, LabeledSequenceBatcher};
//!
//! # async fn example() -> Result<(), FramefeedError> {
//! let clips = ClipSet::new("video_data/training", "sportclip_{}", 0, 100)?;
//! let window = FrameWindow::frames(0, 10).with_target_size(168, 168);
//! let batcher = LabeledSequenceBatcher::for_clip_set(clips, window, 16, 11)?;
//!
//! let mut stream = BatchStream::new(batcher);
//! while let Some(batch) = stream.next().await {
//!     let batch = batch?;
//!     println!("got a batch of {} row(s)", batch.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::batcher::MiniBatch;
use crate::error::FramefeedError;

/// Queue depth of the producer/consumer hand-off: one outstanding batch.
const READ_AHEAD_DEPTH: usize = 1;

/// A stream of mini-batches assembled by a background blocking task.
///
/// Implements [`tokio_stream::Stream`], so the usual
/// [`StreamExt`](tokio_stream::StreamExt) combinators apply.
pub struct BatchStream {
    receiver: Receiver<Result<MiniBatch, FramefeedError>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl BatchStream {
    /// Spawn the read-ahead producer over `batches`.
    ///
    /// The producer pulls one batch at a time and blocks once the single
    /// read-ahead slot is full, so it never runs more than one batch ahead
    /// of the consumer.
    pub fn new<B>(batches: B) -> Self
    where
        B: Iterator<Item = Result<MiniBatch, FramefeedError>> + Send + 'static,
    {
        let (sender, receiver) = tokio::sync::mpsc::channel(READ_AHEAD_DEPTH);

        let handle = tokio::task::spawn_blocking(move || {
            for batch in batches {
                // A send error means the consumer dropped the stream; stop
                // at this batch boundary.
                if sender.blocking_send(batch).is_err() {
                    return;
                }
            }
        });

        Self { receiver, handle }
    }
}

impl Stream for BatchStream {
    type Item = Result<MiniBatch, FramefeedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
