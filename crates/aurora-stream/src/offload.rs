//! Background offload protocol for chunk generation.
//!
//! Generation requests can run on a dedicated worker thread so field
//! sampling stays off the per-tick critical path. Every request carries a
//! monotonically increasing correlation id; responses are matched back by
//! id, and a response whose id no longer matches a pending request is
//! silently discarded (the chunk was evicted or timed out mid-flight).
//!
//! The channel never degrades correctness: if the worker is disabled,
//! missing, or dies, requests are answered by the caller computing
//! synchronously through the same [`build_geometry`] path, which produces
//! bit-identical buffers. A dead worker is restarted on fault detection,
//! so one crash costs only the requests in flight; a fault that keeps
//! recurring disables background offload for the rest of the session and
//! leaves every request synchronous.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use aurora_common::ChunkCoord;
use aurora_field::FieldCache;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::mesh::{build_geometry, vertex_count, DetailLevel, GeometryBuffers};

/// In-flight request capacity; beyond this, submission falls back to
/// synchronous computation rather than blocking.
const CHANNEL_CAPACITY: usize = 64;

/// Worker restarts allowed before a recurring fault disables background
/// offload for the rest of the session.
const MAX_WORKER_RESTARTS: u32 = 3;

/// A generation request dispatched to the worker.
#[derive(Debug, Clone, Copy)]
pub struct GeometryRequest {
    /// Correlates the response back to the requesting chunk.
    pub correlation_id: u64,
    /// Chunk to generate.
    pub coord: ChunkCoord,
    /// Detail level to sample at.
    pub lod: DetailLevel,
}

/// A finished generation response.
#[derive(Debug)]
pub struct GeometryResponse {
    /// Correlation id of the originating request.
    pub correlation_id: u64,
    /// Chunk that was generated.
    pub coord: ChunkCoord,
    /// Detail level the buffers were sampled at.
    pub lod: DetailLevel,
    /// Finished geometry, ready to copy into a pool slot.
    pub buffers: GeometryBuffers,
}

/// Request/response channel to the background generation worker.
///
/// `submit` returning `None` means the caller must compute synchronously;
/// callers cannot tell a disabled channel from one mid-restart, which
/// keeps the fallback path behaviorally identical everywhere.
#[derive(Debug)]
pub struct OffloadChannel {
    requests: Option<Sender<GeometryRequest>>,
    responses: Receiver<GeometryResponse>,
    worker: Option<JoinHandle<()>>,
    next_correlation: u64,
    /// Retained so a crashed worker can be respawned; `None` for channels
    /// that never restart (disabled, test doubles).
    respawn: Option<(Arc<FieldCache>, StreamConfig)>,
    /// Faults detected so far; past the restart limit the channel stays
    /// synchronous.
    faults: u32,
}

impl OffloadChannel {
    /// Spawns the background worker and returns the channel to it.
    ///
    /// Falls back to a disabled (always-synchronous) channel if the
    /// thread cannot be spawned.
    #[must_use]
    pub fn spawn(cache: Arc<FieldCache>, config: StreamConfig) -> Self {
        let mut channel = Self::disabled();
        channel.respawn = Some((cache, config));
        channel.start_worker();
        channel
    }

    /// Creates a channel with no background worker: every request is
    /// answered synchronously by the caller from the start.
    #[must_use]
    pub fn disabled() -> Self {
        let (_, resp_rx) = bounded(1);
        Self {
            requests: None,
            responses: resp_rx,
            worker: None,
            next_correlation: 0,
            respawn: None,
            faults: 0,
        }
    }

    /// Whether requests are currently dispatched to a live worker.
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.requests.is_some()
    }

    /// Submits a generation request.
    ///
    /// Returns the correlation id the response will carry, or `None` when
    /// the caller must compute synchronously (no worker or the request
    /// channel is full).
    pub fn submit(&mut self, coord: ChunkCoord, lod: DetailLevel) -> Option<u64> {
        let sender = self.requests.as_ref()?;

        let correlation_id = self.next_correlation;
        let request = GeometryRequest {
            correlation_id,
            coord,
            lod,
        };

        match sender.try_send(request) {
            Ok(()) => {
                self.next_correlation += 1;
                Some(correlation_id)
            },
            Err(TrySendError::Full(_)) => {
                debug!("Offload queue full, generating chunk {coord:?} synchronously");
                None
            },
            Err(TrySendError::Disconnected(_)) => {
                self.recover("request channel disconnected");
                None
            },
        }
    }

    /// Drains every response that has arrived so far. Never blocks.
    pub fn try_collect(&mut self) -> Vec<GeometryResponse> {
        let mut responses = Vec::new();
        loop {
            match self.responses.try_recv() {
                Ok(response) => responses.push(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.requests.is_some() {
                        self.recover("worker exited");
                    }
                    break;
                },
            }
        }
        responses
    }

    /// Handles a worker fault. Requests that were in flight are lost; the
    /// manager's request timeout recovers them synchronously. The first
    /// few faults restart the worker over fresh channels; once the
    /// restart limit is reached the channel stays synchronous for the
    /// rest of the session.
    fn recover(&mut self, reason: &str) {
        self.requests = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.faults += 1;
        if self.faults > MAX_WORKER_RESTARTS {
            warn!(
                "Offload worker fault ({reason}); restart limit reached, \
                 disabling background offload for this session"
            );
            self.respawn = None;
            return;
        }

        warn!("Offload worker fault ({reason}); restarting");
        self.start_worker();
    }

    /// Spawns a fresh worker over fresh channels. Leaves the channel in
    /// synchronous mode if there is nothing to respawn or the spawn fails.
    fn start_worker(&mut self) {
        let Some((cache, config)) = self.respawn.clone() else {
            return;
        };

        let (req_tx, req_rx) = bounded::<GeometryRequest>(CHANNEL_CAPACITY);
        let (resp_tx, resp_rx) = bounded::<GeometryResponse>(CHANNEL_CAPACITY);

        let spawned = thread::Builder::new()
            .name("aurora-offload".into())
            .spawn(move || worker_loop(&cache, &config, &req_rx, &resp_tx));

        match spawned {
            Ok(handle) => {
                info!("Offload worker started");
                self.requests = Some(req_tx);
                self.responses = resp_rx;
                self.worker = Some(handle);
            },
            Err(e) => {
                warn!("Failed to spawn offload worker, running synchronously: {e}");
            },
        }
    }

    /// Worker that swallows every request and never responds, for
    /// exercising the timeout fallback.
    #[cfg(test)]
    #[must_use]
    pub fn unresponsive() -> Self {
        let (req_tx, req_rx) = bounded::<GeometryRequest>(CHANNEL_CAPACITY);
        let (resp_tx, resp_rx) = bounded::<GeometryResponse>(CHANNEL_CAPACITY);

        let handle = thread::Builder::new()
            .name("aurora-offload-stalled".into())
            .spawn(move || {
                // Keep the response sender alive so the channel never
                // reports disconnection, but drop every request.
                let _keep_alive = resp_tx;
                while req_rx.recv().is_ok() {}
            })
            .ok();

        Self {
            requests: Some(req_tx),
            responses: resp_rx,
            worker: handle,
            next_correlation: 0,
            respawn: None,
            faults: 0,
        }
    }
}

impl Drop for OffloadChannel {
    fn drop(&mut self) {
        // Dropping the sender ends the worker's receive loop
        self.requests = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Worker loop: receive requests until the manager drops its sender.
fn worker_loop(
    cache: &Arc<FieldCache>,
    config: &StreamConfig,
    requests: &Receiver<GeometryRequest>,
    responses: &Sender<GeometryResponse>,
) {
    for request in requests.iter() {
        let mut buffers = GeometryBuffers::with_capacity(vertex_count(config, request.lod));
        build_geometry(cache, request.coord, request.lod, config, &mut buffers);

        let response = GeometryResponse {
            correlation_id: request.correlation_id,
            coord: request.coord,
            lod: request.lod,
            buffers,
        };

        // Manager gone; nothing left to do
        if responses.send(response).is_err() {
            break;
        }
    }
    debug!("Offload worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_common::WorldSeed;
    use aurora_field::Field;
    use std::time::Duration;

    fn shared_cache() -> Arc<FieldCache> {
        Arc::new(FieldCache::new(
            Arc::new(Field::new(WorldSeed::new(42))),
            4096,
        ))
    }

    #[test]
    fn test_disabled_channel_never_accepts() {
        let mut channel = OffloadChannel::disabled();
        assert!(!channel.is_background());
        assert!(channel.submit(ChunkCoord::new(0, 0), DetailLevel::High).is_none());
        assert!(channel.try_collect().is_empty());
    }

    #[test]
    fn test_worker_round_trip_matches_synchronous() {
        let cache = shared_cache();
        let config = StreamConfig::default();
        let mut channel = OffloadChannel::spawn(Arc::clone(&cache), config.clone());

        let coord = ChunkCoord::new(1, -2);
        let id = channel
            .submit(coord, DetailLevel::Medium)
            .expect("worker accepts request");

        // Wait for the response (bounded; the worker is live)
        let mut responses = Vec::new();
        for _ in 0..200 {
            responses = channel.try_collect();
            if !responses.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(responses.len(), 1);
        let response = &responses[0];
        assert_eq!(response.correlation_id, id);
        assert_eq!(response.coord, coord);

        let mut expected = GeometryBuffers::default();
        build_geometry(&cache, coord, DetailLevel::Medium, &config, &mut expected);
        assert_eq!(response.buffers, expected);
    }

    #[test]
    fn test_correlation_ids_increase() {
        let mut channel = OffloadChannel::spawn(shared_cache(), StreamConfig::default());
        let a = channel.submit(ChunkCoord::new(0, 0), DetailLevel::Low);
        let b = channel.submit(ChunkCoord::new(1, 0), DetailLevel::Low);
        match (a, b) {
            (Some(a), Some(b)) => assert!(b > a),
            _ => panic!("worker should accept both requests"),
        }
    }

    #[test]
    fn test_recurring_faults_disable_background_offload() {
        let mut channel = OffloadChannel::spawn(shared_cache(), StreamConfig::default());
        assert!(channel.is_background());

        // Each fault below the limit gets a fresh worker
        for _ in 0..MAX_WORKER_RESTARTS {
            channel.recover("fault injected by test");
            assert!(channel.is_background());
        }

        // One more and the channel stays synchronous for good
        channel.recover("fault injected by test");
        assert!(!channel.is_background());
        assert!(channel.submit(ChunkCoord::new(0, 0), DetailLevel::High).is_none());
        assert!(channel.try_collect().is_empty());
    }

    #[test]
    fn test_unresponsive_worker_accepts_but_never_replies() {
        let mut channel = OffloadChannel::unresponsive();
        assert!(channel.submit(ChunkCoord::new(0, 0), DetailLevel::High).is_some());
        thread::sleep(Duration::from_millis(20));
        assert!(channel.try_collect().is_empty());
        assert!(channel.is_background());
    }
}
