//! Streaming Sink (C3) — an ordered, terminal-sentinel-delimited chunk
//! buffer produced by the Agent Loop Engine and consumed by the Job
//! Executor for broker fan-out.
//!
//! Modeled as a shared buffer with fanout rather than per-subscriber
//! queues: every [`StreamReader`] keeps its own read cursor into the same
//! backing `Vec`, so late subscribers still observe the full history from
//! the beginning. Chunks are opaque strings, each representing one SSE
//! data frame.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner {
    chunks: Vec<String>,
    finished: bool,
}

/// A writer handle into the sink. Cheap to clone; all clones share the
/// same backing buffer.
#[derive(Clone)]
pub struct StreamingSink {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl StreamingSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                chunks: Vec::new(),
                finished: false,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Append one chunk and wake any readers blocked on `next()`.
    ///
    /// No-op once the sink has finished — a writer racing the terminal
    /// sentinel loses silently rather than panicking.
    pub fn push(&self, chunk: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.finished {
            return;
        }
        inner.chunks.push(chunk.into());
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Append an optional final chunk and mark the sink finished. Once
    /// finished, no further `push` takes effect and every reader's
    /// `next()` eventually returns `None` after draining buffered chunks.
    pub fn finish(&self, final_text: Option<String>) {
        let mut inner = self.inner.lock();
        if inner.finished {
            return;
        }
        if let Some(text) = final_text {
            inner.chunks.push(text);
        }
        inner.finished = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Open a new reader starting at the beginning of the buffer.
    pub fn reader(&self) -> StreamReader {
        StreamReader {
            inner: self.inner.clone(),
            notify: self.notify.clone(),
            cursor: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }
}

impl Default for StreamingSink {
    fn default() -> Self {
        Self::new()
    }
}

/// One reader's cursor into a [`StreamingSink`]'s buffer. Multiple readers
/// opened from the same sink each observe the identical chunk sequence
/// independently (broadcast semantics).
pub struct StreamReader {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    cursor: usize,
}

impl StreamReader {
    /// Yield the next unread chunk, waiting for one to arrive. Returns
    /// `None` once the sink has finished and every buffered chunk has
    /// been delivered.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            {
                let inner = self.inner.lock();
                if self.cursor < inner.chunks.len() {
                    let chunk = inner.chunks[self.cursor].clone();
                    self.cursor += 1;
                    return Some(chunk);
                }
                if inner.finished {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_sees_pushed_chunks_in_order() {
        let sink = StreamingSink::new();
        let mut reader = sink.reader();
        sink.push("a");
        sink.push("b");
        assert_eq!(reader.next().await, Some("a".to_string()));
        assert_eq!(reader.next().await, Some("b".to_string()));
    }

    #[tokio::test]
    async fn next_returns_none_after_finish_drains() {
        let sink = StreamingSink::new();
        let mut reader = sink.reader();
        sink.push("a");
        sink.finish(Some("final".into()));
        assert_eq!(reader.next().await, Some("a".to_string()));
        assert_eq!(reader.next().await, Some("final".to_string()));
        assert_eq!(reader.next().await, None);
    }

    #[tokio::test]
    async fn multiple_readers_each_see_full_sequence() {
        let sink = StreamingSink::new();
        sink.push("a");
        let mut late_reader = sink.reader();
        sink.push("b");
        sink.finish(None);

        assert_eq!(late_reader.next().await, Some("a".to_string()));
        assert_eq!(late_reader.next().await, Some("b".to_string()));
        assert_eq!(late_reader.next().await, None);
    }

    #[tokio::test]
    async fn push_after_finish_is_ignored() {
        let sink = StreamingSink::new();
        sink.finish(None);
        sink.push("too late");
        let mut reader = sink.reader();
        assert_eq!(reader.next().await, None);
    }

    #[tokio::test]
    async fn reader_blocks_until_chunk_arrives() {
        let sink = StreamingSink::new();
        let mut reader = sink.reader();
        let sink2 = sink.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            sink2.push("delayed");
        });
        assert_eq!(reader.next().await, Some("delayed".to_string()));
        handle.await.unwrap();
    }
}
