use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};

use crate::pipeline::event_handler::EventHandler;
use crate::pipeline::messages::{CaptionEvent, InboundEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Counters for one executed stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub lines_read: usize,
    pub events_handled: usize,
    pub events_dropped: usize,
    pub captions_emitted: usize,
    pub entries_evicted: usize,
}

/// Runs a JSON-lines event stream through worker threads.
///
/// Layout: `reader → worker[hash(session, user) % n] → main [sink, sweep]`
///
/// Events for one (session, user) always land on the same worker, so their
/// captions come out in arrival order; different keys are processed in
/// parallel.
pub struct ThreadedEventExecutor {
    workers: usize,
    channel_capacity: usize,
    sweep_interval: Option<Duration>,
}

impl ThreadedEventExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sweep_interval: None,
        }
    }

    /// Periodically evicts idle session state while the stream runs.
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn execute(
        &self,
        handler: Arc<EventHandler>,
        input: Box<dyn BufRead + Send>,
        sink: &mut dyn FnMut(&CaptionEvent) -> Result<(), SendError>,
    ) -> Result<StreamStats, Box<dyn std::error::Error>> {
        let cap = self.channel_capacity;
        let (caption_tx, caption_rx) = crossbeam_channel::bounded::<CaptionEvent>(cap);

        let mut event_txs = Vec::with_capacity(self.workers);
        let mut worker_handles = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let (event_tx, event_rx) = crossbeam_channel::bounded::<InboundEvent>(cap);
            event_txs.push(event_tx);
            worker_handles.push(spawn_worker(
                index,
                handler.clone(),
                event_rx,
                caption_tx.clone(),
            ));
        }
        drop(caption_tx);

        let reader_handle = spawn_reader(input, event_txs);

        let mut stats = StreamStats::default();
        let main_error = run_main_loop(&caption_rx, sink, &handler, self.sweep_interval, &mut stats);
        drop(caption_rx);

        join_threads(reader_handle, worker_handles, main_error, stats)
    }
}

impl Default for ThreadedEventExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

struct ReaderStats {
    lines_read: usize,
    dropped: usize,
}

struct WorkerStats {
    handled: usize,
    dropped: usize,
}

/// Picks the worker that owns a (session, user) key.
pub fn route(session: &str, user: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    session.hash(&mut hasher);
    user.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

fn spawn_reader(
    mut input: Box<dyn BufRead + Send>,
    event_txs: Vec<Sender<InboundEvent>>,
) -> JoinHandle<Result<ReaderStats, SendError>> {
    std::thread::spawn(move || {
        let mut stats = ReaderStats {
            lines_read: 0,
            dropped: 0,
        };
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            stats.lines_read += 1;
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Dropping line {}: {e}", stats.lines_read);
                    stats.dropped += 1;
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event = match EventHandler::parse(trimmed) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Dropping line {}: {e}", stats.lines_read);
                    stats.dropped += 1;
                    continue;
                }
            };
            let worker = route(event.session(), event.user(), event_txs.len());
            if event_txs[worker].send(event).is_err() {
                break;
            }
        }
        Ok(stats)
    })
}

fn spawn_worker(
    index: usize,
    handler: Arc<EventHandler>,
    event_rx: Receiver<InboundEvent>,
    caption_tx: Sender<CaptionEvent>,
) -> JoinHandle<WorkerStats> {
    std::thread::spawn(move || {
        let mut stats = WorkerStats {
            handled: 0,
            dropped: 0,
        };
        for event in event_rx {
            match handler.handle(event) {
                Ok(Some(caption)) => {
                    stats.handled += 1;
                    if caption_tx.send(caption).is_err() {
                        break;
                    }
                }
                Ok(None) => stats.handled += 1,
                Err(e) => {
                    log::warn!("Worker {index} dropping event: {e}");
                    stats.dropped += 1;
                }
            }
        }
        stats
    })
}

/// Forwards captions to the sink until every worker is done, sweeping idle
/// sessions on each tick.
fn run_main_loop(
    caption_rx: &Receiver<CaptionEvent>,
    sink: &mut dyn FnMut(&CaptionEvent) -> Result<(), SendError>,
    handler: &EventHandler,
    sweep_interval: Option<Duration>,
    stats: &mut StreamStats,
) -> Option<Box<dyn std::error::Error>> {
    let ticker = match sweep_interval {
        Some(interval) => crossbeam_channel::tick(interval),
        None => crossbeam_channel::never(),
    };

    loop {
        select! {
            recv(caption_rx) -> msg => match msg {
                Ok(caption) => {
                    if let Err(e) = sink(&caption) {
                        return Some(e.to_string().into());
                    }
                    stats.captions_emitted += 1;
                }
                Err(_) => return None,
            },
            recv(ticker) -> _ => {
                stats.entries_evicted += handler.pipeline().evict_idle(Instant::now());
            }
        }
    }
}

/// Joins reader and worker threads and coalesces the first error encountered.
fn join_threads(
    reader_handle: JoinHandle<Result<ReaderStats, SendError>>,
    worker_handles: Vec<JoinHandle<WorkerStats>>,
    mut first_error: Option<Box<dyn std::error::Error>>,
    mut stats: StreamStats,
) -> Result<StreamStats, Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    match reader_handle.join() {
        Ok(Ok(r)) => {
            stats.lines_read = r.lines_read;
            stats.events_dropped += r.dropped;
        }
        Ok(Err(e)) => set_if_none(&mut first_error, e.to_string().into()),
        Err(_) => set_if_none(&mut first_error, "Reader thread panicked".into()),
    }

    for (index, handle) in worker_handles.into_iter().enumerate() {
        match handle.join() {
            Ok(w) => {
                stats.events_handled += w.handled;
                stats.events_dropped += w.dropped;
            }
            Err(_) => set_if_none(
                &mut first_error,
                format!("Worker thread {index} panicked").into(),
            ),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::caption_pipeline::CaptionPipeline;
    use crate::pipeline::event_handler::NoHandsExtractor;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::recognition::domain::prototype_classifier::{PrototypeClassifier, PrototypeConfig};
    use crate::shared::landmarks::test_support::wave_frames;
    use crate::shared::session_store::NeverEvict;
    use crate::shared::settings::Settings;
    use crate::translation::domain::caption_generator::UnavailableCaptionGenerator;
    use std::io::Cursor;

    fn handler() -> Arc<EventHandler> {
        let pipeline = CaptionPipeline::new(
            &Settings::default(),
            Box::new(PrototypeClassifier::new(
                PrototypeConfig::default(),
                Arc::new(NeverEvict),
            )),
            Arc::new(UnavailableCaptionGenerator),
            Box::new(NullPipelineLogger),
        );
        Arc::new(EventHandler::new(Arc::new(pipeline), Box::new(NoHandsExtractor)))
    }

    /// Interleaved wave streams for `users` on one call.
    fn stream(users: &[&str], frames: usize) -> String {
        let wave = wave_frames(frames);
        let mut lines = Vec::new();
        for (i, f) in wave.iter().enumerate() {
            for user in users {
                lines.push(
                    serde_json::json!({
                        "type": "frame",
                        "session": "call",
                        "user": user,
                        "ts": i as i64,
                        "landmarks": **f,
                    })
                    .to_string(),
                );
            }
        }
        lines.join("\n")
    }

    fn run(executor: &ThreadedEventExecutor, input: String) -> (StreamStats, Vec<CaptionEvent>) {
        let mut out = Vec::new();
        let stats = executor
            .execute(
                handler(),
                Box::new(Cursor::new(input.into_bytes())),
                &mut |c| {
                    out.push(c.clone());
                    Ok(())
                },
            )
            .unwrap();
        (stats, out)
    }

    #[test]
    fn test_single_worker_emits_in_order() {
        let (stats, captions) = run(&ThreadedEventExecutor::new(1), stream(&["alice"], 15));
        assert_eq!(stats.lines_read, 15);
        assert_eq!(stats.events_handled, 15);
        assert_eq!(stats.captions_emitted, 6);
        let ts: Vec<i64> = captions.iter().map(|c| c.ts).collect();
        assert_eq!(ts, vec![9, 10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_per_key_order_holds_across_workers() {
        let users = ["alice", "bob", "carol", "dave"];
        let (stats, captions) = run(&ThreadedEventExecutor::new(3), stream(&users, 12));
        assert_eq!(stats.captions_emitted, 12);
        for user in users {
            let ts: Vec<i64> = captions.iter().filter(|c| c.user == user).map(|c| c.ts).collect();
            assert_eq!(ts, vec![9, 10, 11], "{user}");
        }
    }

    #[test]
    fn test_malformed_lines_are_counted_and_skipped() {
        let input = format!("garbage\n\n{}\n{{\"type\":\"nope\"}}", stream(&["alice"], 10));
        let (stats, captions) = run(&ThreadedEventExecutor::new(2), input);
        assert_eq!(stats.events_dropped, 2);
        assert_eq!(captions.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_is_dropped() {
        let mut input = b"\xff\xfe not utf8\n".to_vec();
        input.extend_from_slice(stream(&["alice"], 12).as_bytes());
        let mut captions = Vec::new();
        let stats = ThreadedEventExecutor::new(1)
            .execute(handler(), Box::new(Cursor::new(input)), &mut |c| {
                captions.push(c.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(stats.lines_read, 13);
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(captions.len(), 3);
    }

    #[test]
    fn test_sink_error_stops_the_run() {
        let executor = ThreadedEventExecutor::new(2);
        let result = executor.execute(
            handler(),
            Box::new(Cursor::new(stream(&["alice"], 40).into_bytes())),
            &mut |_| Err("closed pipe".into()),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("closed pipe"));
    }

    #[test]
    fn test_route_is_stable_and_in_range() {
        for workers in 1..6 {
            let a = route("call", "alice", workers);
            assert!(a < workers);
            assert_eq!(a, route("call", "alice", workers));
        }
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        assert_eq!(ThreadedEventExecutor::new(0).workers(), 1);
    }

    #[test]
    fn test_sweep_runs_without_disturbing_output() {
        let executor =
            ThreadedEventExecutor::new(2).with_sweep_interval(Some(Duration::from_millis(1)));
        let (_, captions) = run(&executor, stream(&["alice"], 12));
        assert_eq!(captions.len(), 3);
    }
}
