//! Per-sensor reader handle.
//!
//! [`SensorReader`] turns the host's callback API into async methods. One
//! FIFO-fair lock per reader serializes every host operation, so at most one
//! enumerate, record or fetch call is outstanding at a time and waiters are
//! served in arrival order.
//!
//! Two fetch flavours are offered:
//!
//! - [`SensorReader::fetch`] collects every result and resolves once the host
//!   completes. A mid-fetch failure discards the partial results.
//! - [`SensorReader::fetch_stream`] hands results over one at a time through a
//!   single-slot mailbox. The host thread blocks until the consumer takes
//!   each result, or until the stream is stopped.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedMutexGuard, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sensorkit_types::{Device, RawBatch, RawFetchResult, Sensor, TimeRange};

use crate::error::{Error, Operation, Result};
use crate::host::{
    AuthorizationStatus, FetchDelegate, FetchRequest, HostError, HostErrorCode, ReaderHost, Reply,
    SensorHost,
};

/// Build a host completion callback and the receiver that observes it.
fn reply_channel<T: Send + 'static>() -> (Reply<T>, oneshot::Receiver<std::result::Result<T, HostError>>)
{
    let (tx, rx) = oneshot::channel();
    let reply: Reply<T> = Box::new(move |result| {
        // The caller may have given up waiting.
        let _ = tx.send(result);
    });
    (reply, rx)
}

/// Maps host errors onto the core taxonomy for one sensor.
#[derive(Clone)]
struct Classifier {
    sensor: Sensor,
    host: Arc<dyn SensorHost>,
}

impl Classifier {
    /// Authorization failures are recognised either by the host's error code
    /// or by the sensor's current status being `Denied`.
    fn classify(&self, operation: Operation, error: HostError) -> Error {
        if error.code == HostErrorCode::AuthorizationDenied
            || self.host.authorization_status(self.sensor) == AuthorizationStatus::Denied
        {
            debug!(sensor = %self.sensor, %operation, %error, "Host refused access");
            Error::authorization_denied(self.sensor, operation)
        } else {
            Error::host(self.sensor, operation, error)
        }
    }
}

/// Async handle for one sensor's reader.
#[derive(Clone)]
pub struct SensorReader {
    classifier: Classifier,
    inner: Arc<dyn ReaderHost>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl SensorReader {
    /// Wrap a host reader.
    pub fn new(host: Arc<dyn SensorHost>, inner: Arc<dyn ReaderHost>) -> Self {
        Self {
            classifier: Classifier {
                sensor: inner.sensor(),
                host,
            },
            inner,
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[must_use]
    pub fn sensor(&self) -> Sensor {
        self.classifier.sensor
    }

    /// List the devices that recorded this sensor.
    pub async fn fetch_devices(&self) -> Result<Vec<Device>> {
        let _guard = self.lock.lock().await;
        let (reply, rx) = reply_channel();
        self.inner.fetch_devices(reply);
        self.await_reply(Operation::FetchDevices, rx).await
    }

    pub async fn start_recording(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let (reply, rx) = reply_channel();
        self.inner.start_recording(reply);
        self.await_reply(Operation::StartRecording, rx).await
    }

    pub async fn stop_recording(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let (reply, rx) = reply_channel();
        self.inner.stop_recording(reply);
        self.await_reply(Operation::StopRecording, rx).await
    }

    /// Fetch every result for `range` on `device`.
    ///
    /// Results are returned in host delivery order. Nothing is returned if the
    /// host fails part-way through.
    pub async fn fetch(&self, device: &Device, range: TimeRange) -> Result<Vec<RawFetchResult>> {
        let _guard = self.lock.lock().await;
        let request = FetchRequest::new(device.clone(), range);
        debug!(sensor = %self.sensor(), device = %device.product_type, %range, "Starting fetch");

        let (tx, rx) = oneshot::channel();
        let delegate = Arc::new(CollectingDelegate {
            state: Mutex::new(Some(Collecting {
                results: Vec::new(),
                done: tx,
            })),
        });
        self.inner.fetch(request, delegate);

        let results = self.await_reply(Operation::Fetch, rx).await?;
        debug!(sensor = %self.sensor(), count = results.len(), "Fetch completed");
        Ok(results)
    }

    /// Start a fetch whose results are pulled one at a time.
    ///
    /// The reader lock is held until the returned stream is dropped, so no
    /// other operation on this reader can start while it is alive.
    pub async fn fetch_stream(&self, device: &Device, range: TimeRange) -> FetchStream {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        let request = FetchRequest::new(device.clone(), range);
        debug!(sensor = %self.sensor(), device = %device.product_type, %range, "Starting streaming fetch");

        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let delegate = Arc::new(StreamingDelegate {
            sender: Mutex::new(Some(tx)),
            token: token.clone(),
        });
        self.inner.fetch(request.clone(), delegate);

        FetchStream {
            request,
            receiver: rx,
            token,
            finished: false,
            classifier: self.classifier.clone(),
            _guard: guard,
        }
    }

    async fn await_reply<T>(
        &self,
        operation: Operation,
        rx: oneshot::Receiver<std::result::Result<T, HostError>>,
    ) -> Result<T> {
        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(self.classifier.classify(operation, error)),
            Err(_) => {
                warn!(sensor = %self.sensor(), %operation, "Host dropped the completion without replying");
                Err(Error::Cancelled)
            }
        }
    }
}

struct Collecting {
    results: Vec<RawFetchResult>,
    done: oneshot::Sender<std::result::Result<Vec<RawFetchResult>, HostError>>,
}

/// Copies every delivered result and resolves the waiting future at the end.
struct CollectingDelegate {
    state: Mutex<Option<Collecting>>,
}

impl FetchDelegate for CollectingDelegate {
    fn did_fetch(&self, _request: &FetchRequest, batch: RawBatch<'_>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.as_mut() {
            // Stop early if the caller stopped waiting.
            Some(collecting) if !collecting.done.is_closed() => {
                collecting.results.push(batch.to_fetch_result());
                true
            }
            _ => false,
        }
    }

    fn did_complete(&self, _request: &FetchRequest) {
        let finished = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(collecting) = finished {
            let _ = collecting.done.send(Ok(collecting.results));
        }
    }

    fn did_fail(&self, _request: &FetchRequest, error: HostError) {
        let finished = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(collecting) = finished {
            // Partial results are dropped here.
            let _ = collecting.done.send(Err(error));
        }
    }
}

/// Event passed from the host thread to a [`FetchStream`].
#[derive(Debug)]
enum StreamEvent {
    Result(RawFetchResult),
    Completed,
    Failed(HostError),
}

/// Hands results to a single-slot mailbox, blocking the host thread until
/// the consumer has room or the stream is stopped.
struct StreamingDelegate {
    // Taken by the first terminal callback; later callbacks see `None`.
    sender: Mutex<Option<mpsc::Sender<StreamEvent>>>,
    token: CancellationToken,
}

impl StreamingDelegate {
    fn deliver(&self, sender: mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
        let token = self.token.clone();
        futures::executor::block_on(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => false,
                sent = sender.send(event) => sent.is_ok(),
            }
        })
    }

    fn finish(&self, event: StreamEvent) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            self.deliver(sender, event);
        }
    }
}

impl FetchDelegate for StreamingDelegate {
    fn did_fetch(&self, _request: &FetchRequest, batch: RawBatch<'_>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let sender = match self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(sender) => sender.clone(),
            None => return false,
        };
        self.deliver(sender, StreamEvent::Result(batch.to_fetch_result()))
    }

    fn did_complete(&self, _request: &FetchRequest) {
        self.finish(StreamEvent::Completed);
    }

    fn did_fail(&self, _request: &FetchRequest, error: HostError) {
        self.finish(StreamEvent::Failed(error));
    }
}

/// A fetch whose results are pulled one at a time.
///
/// Dropping the stream (or calling [`stop`](Self::stop)) cancels delivery:
/// a host callback blocked on the mailbox returns `false`, as do all later
/// callbacks. The reader lock is released on drop.
pub struct FetchStream {
    request: FetchRequest,
    receiver: mpsc::Receiver<StreamEvent>,
    token: CancellationToken,
    finished: bool,
    classifier: Classifier,
    _guard: OwnedMutexGuard<()>,
}

impl FetchStream {
    /// The request this stream serves.
    #[must_use]
    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Receive the next result.
    ///
    /// Returns `Ok(None)` once the host has completed, and keeps returning it
    /// afterwards. A host failure is returned once, classified like
    /// [`SensorReader::fetch`] errors; a stopped stream yields
    /// [`Error::Cancelled`].
    pub async fn recv(&mut self) -> Result<Option<RawFetchResult>> {
        if self.finished {
            return Ok(None);
        }
        let event = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.receiver.recv() => event,
        };
        match event {
            Some(StreamEvent::Result(result)) => Ok(Some(result)),
            Some(StreamEvent::Completed) => {
                self.finished = true;
                Ok(None)
            }
            Some(StreamEvent::Failed(error)) => {
                self.finished = true;
                Err(self.classifier.classify(Operation::Fetch, error))
            }
            None => {
                self.finished = true;
                Err(Error::Cancelled)
            }
        }
    }

    /// Stop delivery. Pending and future host callbacks return `false`.
    pub fn stop(&mut self) {
        if !self.token.is_cancelled() {
            debug!(sensor = %self.classifier.sensor, "Stopping streaming fetch");
        }
        self.token.cancel();
        self.receiver.close();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for FetchStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
