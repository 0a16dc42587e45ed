//! Async read-ahead streaming tests.

#![cfg(feature = "async")]

use framefeed::{BatchStream, FramefeedError, MiniBatch};
use tokio_stream::StreamExt;

/// Synthetic batch iterator: `count` single-row batches whose first feature
/// value encodes the batch's position.
struct NumberedBatches {
    count: usize,
    next: usize,
}

impl Iterator for NumberedBatches {
    type Item = Result<MiniBatch, FramefeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let position = self.next;
        self.next += 1;
        Some(Ok(MiniBatch {
            features: vec![vec![position as f32; 4]],
            labels: vec![vec![1.0]],
            last: self.next == self.count,
        }))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batches_arrive_exactly_once_in_order() {
    let mut stream = BatchStream::new(NumberedBatches { count: 8, next: 0 });

    let mut positions = Vec::new();
    while let Some(batch) = stream.next().await {
        let batch = batch.expect("batch assembles");
        positions.push(batch.features[0][0] as usize);
    }

    assert_eq!(positions, (0..8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn the_final_batch_carries_the_last_flag() {
    let mut stream = BatchStream::new(NumberedBatches { count: 3, next: 0 });

    let mut batches = Vec::new();
    while let Some(batch) = stream.next().await {
        batches.push(batch.expect("batch assembles"));
    }

    assert_eq!(batches.len(), 3);
    assert!(!batches[0].last);
    assert!(!batches[1].last);
    assert!(batches[2].last);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn errors_pass_through_the_stream() {
    struct FailsSecond {
        next: usize,
    }

    impl Iterator for FailsSecond {
        type Item = Result<MiniBatch, FramefeedError>;

        fn next(&mut self) -> Option<Self::Item> {
            self.next += 1;
            match self.next {
                1 => Some(Ok(MiniBatch {
                    features: vec![vec![0.0]],
                    labels: vec![vec![1.0]],
                    last: false,
                })),
                2 => Some(Err(FramefeedError::Cancelled)),
                _ => None,
            }
        }
    }

    let mut stream = BatchStream::new(FailsSecond { next: 0 });

    assert!(stream.next().await.expect("first item").is_ok());
    assert!(matches!(
        stream.next().await,
        Some(Err(FramefeedError::Cancelled))
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_stream_stops_the_producer() {
    // An effectively unbounded producer: dropping the stream must not hang
    // the runtime on shutdown, which it would if the producer kept filling
    // an open channel.
    let mut stream = BatchStream::new(NumberedBatches {
        count: usize::MAX,
        next: 0,
    });

    assert!(stream.next().await.is_some());
    drop(stream);
}
