//! Background batching writer for index points.
//!
//! Points are handed to a dedicated thread over a channel. The thread
//! flushes when `batch_size` points are pending, when the jittered flush
//! deadline passes, on an explicit flush request, and on shutdown. Failed
//! writes are retried with exponential backoff on the writer thread, never
//! on the caller's.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::WritePolicy;
use crate::error::{IndexError, StoreError, StoreResult};
use crate::point::IndexPoint;
use crate::sink::LineSink;

/// Terminal status of a submitted point.
pub type WriteStatus = Result<(), IndexError>;

/// Lines flushed together in one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBatch {
    lines: Vec<String>,
}

impl LineBatch {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Request body: one line per point, newline separated.
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

/// Context passed to the retry hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based number of the retry about to be made.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
}

/// Hooks invoked on the writer thread.
///
/// Every hook receives the batch and error explicitly; implementations
/// must not rely on state shared with the code that submitted the points.
pub trait WriteCallbacks: Send + Sync {
    fn on_success(&self, batch: &LineBatch);
    /// Retries exhausted, or the failure was not retriable.
    fn on_error(&self, batch: &LineBatch, error: &IndexError);
    fn on_retry(&self, batch: &LineBatch, error: &IndexError, retry: RetryAttempt);
}

/// Handle on the eventual outcome of one submitted point.
#[derive(Debug)]
pub struct WriteTicket {
    rx: Receiver<WriteStatus>,
}

impl WriteTicket {
    /// Block until the point's batch succeeds or is abandoned.
    pub fn wait(self) -> WriteStatus {
        self.rx.recv().unwrap_or_else(|_| {
            Err(IndexError::Unavailable(
                "index writer stopped before reporting".to_string(),
            ))
        })
    }

    /// Non-blocking status check.
    pub fn try_status(&self) -> Option<WriteStatus> {
        self.rx.try_recv().ok()
    }
}

enum WriterCmd {
    Point {
        line: String,
        ack: SyncSender<WriteStatus>,
    },
    Flush,
}

/// Batching index writer backed by a dedicated thread.
///
/// Dropping the writer flushes pending points and joins the thread.
pub struct BatchingIndexWriter {
    tx: Option<Sender<WriterCmd>>,
    handle: Option<JoinHandle<()>>,
}

impl BatchingIndexWriter {
    pub fn start(
        sink: Arc<dyn LineSink>,
        callbacks: Arc<dyn WriteCallbacks>,
        policy: WritePolicy,
    ) -> StoreResult<Self> {
        policy.validate()?;
        let (tx, rx) = mpsc::channel();
        let worker = WriterLoop {
            rx,
            sink,
            callbacks,
            policy,
            pending: Vec::new(),
        };
        let handle = thread::Builder::new()
            .name("index-writer".to_string())
            .spawn(move || worker.run())
            .map_err(StoreError::Startup)?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a point. Returns once the writer has accepted it.
    pub fn submit(&self, point: &IndexPoint) -> Result<WriteTicket, IndexError> {
        let (ack, rx) = mpsc::sync_channel(1);
        self.send(WriterCmd::Point {
            line: point.to_line_protocol(),
            ack,
        })?;
        Ok(WriteTicket { rx })
    }

    /// Ask the writer to flush pending points now. Does not wait.
    pub fn flush(&self) -> Result<(), IndexError> {
        self.send(WriterCmd::Flush)
    }

    /// Flush pending points and stop the writer thread.
    pub fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Index writer thread panicked");
            }
        }
    }

    fn send(&self, cmd: WriterCmd) -> Result<(), IndexError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| IndexError::Unavailable("index writer is closed".to_string()))?;
        tx.send(cmd)
            .map_err(|_| IndexError::Unavailable("index writer thread has stopped".to_string()))
    }
}

impl Drop for BatchingIndexWriter {
    fn drop(&mut self) {
        self.close();
    }
}

struct PendingLine {
    line: String,
    ack: SyncSender<WriteStatus>,
}

struct WriterLoop {
    rx: Receiver<WriterCmd>,
    sink: Arc<dyn LineSink>,
    callbacks: Arc<dyn WriteCallbacks>,
    policy: WritePolicy,
    pending: Vec<PendingLine>,
}

impl WriterLoop {
    fn run(mut self) {
        debug!(backend = %self.sink.describe(), "Index writer started");
        let mut rng = rand::thread_rng();
        let mut deadline = Instant::now() + self.policy.flush_delay(&mut rng);

        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(timeout) {
                Ok(WriterCmd::Point { line, ack }) => {
                    self.pending.push(PendingLine { line, ack });
                    if self.pending.len() < self.policy.batch_size && Instant::now() < deadline
                    {
                        continue;
                    }
                }
                Ok(WriterCmd::Flush) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush_pending();
                    break;
                }
            }
            self.flush_pending();
            deadline = Instant::now() + self.policy.flush_delay(&mut rng);
        }

        debug!("Index writer stopped (channel closed)");
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let (lines, acks): (Vec<String>, Vec<SyncSender<WriteStatus>>) = std::mem::take(
            &mut self.pending,
        )
        .into_iter()
        .map(|pending| (pending.line, pending.ack))
        .unzip();

        let batch = LineBatch::new(lines);
        let status = self.write_with_retry(&batch);
        for ack in acks {
            let _ = ack.try_send(status.clone());
        }
    }

    fn write_with_retry(&self, batch: &LineBatch) -> WriteStatus {
        let body = batch.body();
        let mut attempt = 0u32;
        loop {
            match self.sink.write_lines(&body) {
                Ok(()) => {
                    self.callbacks.on_success(batch);
                    return Ok(());
                }
                Err(err) if err.is_retriable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.retry_delay(attempt);
                    attempt += 1;
                    self.callbacks.on_retry(
                        batch,
                        &err,
                        RetryAttempt {
                            attempt,
                            max_retries: self.policy.max_retries,
                            delay,
                        },
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    if attempt > 0 {
                        info!(retries = attempt, "Giving up on index batch");
                    }
                    self.callbacks.on_error(batch, &err);
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Sink that replays scripted results, then succeeds.
    #[derive(Default)]
    struct ScriptedSink {
        script: Mutex<VecDeque<WriteStatus>>,
        bodies: Mutex<Vec<String>>,
    }

    impl ScriptedSink {
        fn with_script(script: Vec<WriteStatus>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn bodies(&self) -> Vec<String> {
            self.bodies.lock().unwrap().clone()
        }
    }

    impl LineSink for ScriptedSink {
        fn write_lines(&self, body: &str) -> Result<(), IndexError> {
            self.bodies.lock().unwrap().push(body.to_string());
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Success(usize),
        Error(usize, IndexError),
        Retry(usize, RetryAttempt),
    }

    #[derive(Default)]
    struct RecordingCallbacks {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingCallbacks {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl WriteCallbacks for RecordingCallbacks {
        fn on_success(&self, batch: &LineBatch) {
            self.events.lock().unwrap().push(Event::Success(batch.len()));
        }

        fn on_error(&self, batch: &LineBatch, error: &IndexError) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Error(batch.len(), error.clone()));
        }

        fn on_retry(&self, batch: &LineBatch, _error: &IndexError, retry: RetryAttempt) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Retry(batch.len(), retry));
        }
    }

    fn fast_policy() -> WritePolicy {
        WritePolicy {
            batch_size: 100,
            flush_interval_ms: 60_000,
            jitter_interval_ms: 0,
            retry_interval_ms: 1,
            max_retries: 3,
            max_retry_delay_ms: 4,
            exponential_base: 2,
        }
    }

    fn point(second: i64) -> IndexPoint {
        IndexPoint::new("solar_spectra", Utc.timestamp_opt(second, 0).unwrap())
            .tag("spectrometer", "SP01")
            .field("object_key", format!("spectra/SP01/{}.csv", second))
    }

    #[test]
    fn close_flushes_pending_points_in_one_batch() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let mut writer =
            BatchingIndexWriter::start(sink.clone(), callbacks.clone(), fast_policy()).unwrap();

        let t1 = writer.submit(&point(1)).unwrap();
        let t2 = writer.submit(&point(2)).unwrap();
        writer.close();

        assert_eq!(t1.wait(), Ok(()));
        assert_eq!(t2.wait(), Ok(()));
        let bodies = sink.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].lines().count(), 2);
        assert_eq!(callbacks.events(), vec![Event::Success(2)]);
    }

    #[test]
    fn batch_size_triggers_flush_without_waiting_for_interval() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let policy = WritePolicy {
            batch_size: 2,
            ..fast_policy()
        };
        let writer = BatchingIndexWriter::start(sink.clone(), callbacks.clone(), policy).unwrap();

        let t1 = writer.submit(&point(1)).unwrap();
        let t2 = writer.submit(&point(2)).unwrap();
        assert_eq!(t1.wait(), Ok(()));
        assert_eq!(t2.wait(), Ok(()));
        assert_eq!(sink.bodies().len(), 1);
    }

    #[test]
    fn flush_interval_elapses_for_small_batches() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let policy = WritePolicy {
            flush_interval_ms: 10,
            jitter_interval_ms: 5,
            ..fast_policy()
        };
        let writer = BatchingIndexWriter::start(sink.clone(), callbacks, policy).unwrap();

        let ticket = writer.submit(&point(1)).unwrap();
        assert_eq!(ticket.wait(), Ok(()));
        assert_eq!(sink.bodies().len(), 1);
    }

    #[test]
    fn explicit_flush_writes_immediately() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let writer = BatchingIndexWriter::start(sink.clone(), callbacks, fast_policy()).unwrap();

        let ticket = writer.submit(&point(1)).unwrap();
        writer.flush().unwrap();
        assert_eq!(ticket.wait(), Ok(()));
    }

    #[test]
    fn transient_failures_are_retried_with_backoff() {
        let sink = Arc::new(ScriptedSink::with_script(vec![
            Err(IndexError::Retriable("503".into())),
            Err(IndexError::Retriable("503".into())),
        ]));
        let callbacks = Arc::new(RecordingCallbacks::default());
        let mut writer =
            BatchingIndexWriter::start(sink.clone(), callbacks.clone(), fast_policy()).unwrap();

        let ticket = writer.submit(&point(1)).unwrap();
        writer.close();

        assert_eq!(ticket.wait(), Ok(()));
        assert_eq!(sink.bodies().len(), 3);
        assert_eq!(
            callbacks.events(),
            vec![
                Event::Retry(
                    1,
                    RetryAttempt {
                        attempt: 1,
                        max_retries: 3,
                        delay: Duration::from_millis(1)
                    }
                ),
                Event::Retry(
                    1,
                    RetryAttempt {
                        attempt: 2,
                        max_retries: 3,
                        delay: Duration::from_millis(2)
                    }
                ),
                Event::Success(1),
            ]
        );
    }

    #[test]
    fn exhausted_retries_report_error() {
        let failure = IndexError::Retriable("connection refused".into());
        let sink = Arc::new(ScriptedSink::with_script(vec![Err(failure.clone()); 10]));
        let callbacks = Arc::new(RecordingCallbacks::default());
        let mut writer =
            BatchingIndexWriter::start(sink.clone(), callbacks.clone(), fast_policy()).unwrap();

        let ticket = writer.submit(&point(1)).unwrap();
        writer.close();

        assert_eq!(ticket.wait(), Err(failure.clone()));
        // initial attempt + max_retries
        assert_eq!(sink.bodies().len(), 4);
        let events = callbacks.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&Event::Error(1, failure)));
        let delays: Vec<Duration> = events
            .iter()
            .filter_map(|e| match e {
                Event::Retry(_, retry) => Some(retry.delay),
                _ => None,
            })
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(4)
            ]
        );
    }

    #[test]
    fn rejected_writes_are_not_retried() {
        let rejection = IndexError::Rejected("400 bad line".into());
        let sink = Arc::new(ScriptedSink::with_script(vec![Err(rejection.clone())]));
        let callbacks = Arc::new(RecordingCallbacks::default());
        let mut writer =
            BatchingIndexWriter::start(sink.clone(), callbacks.clone(), fast_policy()).unwrap();

        let ticket = writer.submit(&point(1)).unwrap();
        writer.close();

        assert_eq!(ticket.wait(), Err(rejection.clone()));
        assert_eq!(sink.bodies().len(), 1);
        assert_eq!(callbacks.events(), vec![Event::Error(1, rejection)]);
    }

    #[test]
    fn submit_after_close_is_unavailable() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let mut writer = BatchingIndexWriter::start(sink, callbacks, fast_policy()).unwrap();
        writer.close();

        assert!(matches!(
            writer.submit(&point(1)),
            Err(IndexError::Unavailable(_))
        ));
        assert!(matches!(writer.flush(), Err(IndexError::Unavailable(_))));
    }

    #[test]
    fn start_rejects_invalid_policy() {
        let sink = Arc::new(ScriptedSink::default());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let policy = WritePolicy {
            batch_size: 0,
            ..fast_policy()
        };
        assert!(BatchingIndexWriter::start(sink, callbacks, policy).is_err());
    }
}
