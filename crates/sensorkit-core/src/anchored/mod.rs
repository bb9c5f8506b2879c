//! Resumable, checkpointed batch fetching.
//!
//! An [`AnchoredFetch`] walks every device that recorded a sensor and, for
//! each, fetches the history between its checkpoint and the quarantine cutoff
//! in bounded batches. The checkpoint is persisted after every delivered
//! batch, so a later pass resumes exactly where this one stopped.
//!
//! # Batch policies
//!
//! - [`BatchPolicy::ByTime`]: one host fetch per fixed window. The window that
//!   reaches the cutoff is the last of the pass, regardless of how far the
//!   clock has moved meanwhile.
//! - [`BatchPolicy::ByCount`]: one streaming host fetch for the whole window;
//!   a batch is emitted whenever enough samples are pending, and the rest
//!   when the host completes.
//!
//! # Errors
//!
//! The first error ends the sequence. Checkpoints reflect exactly the batches
//! that were delivered, so calling
//! [`SensorModule::fetch_anchored`](crate::SensorModule::fetch_anchored)
//! again resumes from there.

mod count;
mod interval;

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use sensorkit_types::{
    BatchPolicy, Checkpoint, CheckpointKey, Device, RawFetchResult, SafeSample, Sensor, TimeRange,
};

use crate::checkpoint::{Anchor, CheckpointStore};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::processor::SampleProcessor;
use crate::reader::SensorReader;
use crate::results::FetchResults;

use count::CountCursor;
use interval::IntervalCursor;

/// Describes one delivered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInfo {
    /// The device the samples came from.
    pub device: Device,
    /// How the checkpoint moved: from its value before the batch to its value
    /// after. For time-based batches this is the fetched window.
    pub range: TimeRange,
    /// Earliest and latest sample start in the batch; `None` when empty.
    pub samples_span: Option<SampleSpan>,
    /// The policy that produced the batch.
    pub policy: BatchPolicy,
}

/// The closed interval `[earliest, latest]` of sample starts in a batch.
///
/// Unlike [`TimeRange`], both ends belong to the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    pub earliest: OffsetDateTime,
    pub latest: OffsetDateTime,
}

impl SampleSpan {
    /// Whether `instant` lies in `[earliest, latest]`.
    #[must_use]
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.earliest <= instant && instant <= self.latest
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.latest - self.earliest
    }
}

/// One step of an anchored fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub info: BatchInfo,
    pub samples: Vec<SafeSample>,
}

/// Everything the cursors of one anchored fetch share.
pub(crate) struct FetchContext {
    pub(crate) sensor: Sensor,
    pub(crate) reader: SensorReader,
    pub(crate) store: CheckpointStore,
    pub(crate) processor: Arc<dyn SampleProcessor>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) backfill: Duration,
    pub(crate) policy: BatchPolicy,
}

impl FetchContext {
    /// Recomputed on every call; the boundary moves with the clock.
    fn cutoff(&self) -> OffsetDateTime {
        self.sensor
            .descriptor()
            .quarantine_cutoff_at(self.clock.now())
    }

    fn process(&self, raw: Vec<RawFetchResult>) -> Result<Vec<SafeSample>> {
        let mut flat = FetchResults::new(raw);
        self.processor
            .process(self.sensor, &mut flat)
            .map_err(|e| Error::processing(self.sensor, e))
    }

    /// Load the device's anchor, seeding a missing one to `cutoff - backfill`.
    ///
    /// Returns the anchor and its instant.
    fn open_anchor(&self, device: &Device, cutoff: OffsetDateTime) -> Result<(Anchor, OffsetDateTime)> {
        let key = CheckpointKey::new(self.sensor, device.product_type.clone());
        let mut anchor = self.store.anchor(key);
        if let Checkpoint::At(instant) = anchor.current() {
            return Ok((anchor, instant));
        }
        let seed = cutoff.checked_sub(self.backfill).ok_or_else(|| {
            Error::invalid_config(format!(
                "backfill of {} reaches past the earliest representable instant",
                self.backfill
            ))
        })?;
        anchor.update(Checkpoint::At(seed))?;
        info!(sensor = %self.sensor, device = %device.product_type, checkpoint = %anchor.current(), "Seeded checkpoint");
        Ok((anchor, seed))
    }
}

/// Earliest and latest sample start, in one pass.
pub(crate) fn samples_span(samples: &[SafeSample]) -> Option<SampleSpan> {
    let mut starts = samples.iter().map(SafeSample::start);
    let first = starts.next()?;
    let (earliest, latest) = starts.fold((first, first), |(lo, hi), start| {
        (lo.min(start), hi.max(start))
    });
    Some(SampleSpan { earliest, latest })
}

enum Cursor {
    Interval(IntervalCursor),
    Count(CountCursor),
}

impl Cursor {
    fn new(ctx: &Arc<FetchContext>, device: Device) -> Self {
        match ctx.policy {
            BatchPolicy::ByTime(span) => {
                Cursor::Interval(IntervalCursor::new(Arc::clone(ctx), device, span))
            }
            BatchPolicy::ByCount(threshold) => {
                Cursor::Count(CountCursor::new(Arc::clone(ctx), device, threshold))
            }
        }
    }

    async fn next(&mut self) -> Option<Result<Batch>> {
        match self {
            Cursor::Interval(cursor) => cursor.next().await,
            Cursor::Count(cursor) => cursor.next().await,
        }
    }
}

enum Phase {
    Initial,
    Device {
        cursor: Cursor,
        remaining: VecDeque<Device>,
    },
    Done,
}

/// A lazy, single-pass sequence of batches for one sensor.
///
/// Obtained from [`SensorModule::fetch_anchored`](crate::SensorModule::fetch_anchored).
/// Nothing is fetched until the first call to [`next`](Self::next). Dropping
/// the sequence stops any in-flight streaming fetch.
pub struct AnchoredFetch {
    ctx: Arc<FetchContext>,
    phase: Phase,
}

impl AnchoredFetch {
    pub(crate) fn new(ctx: FetchContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            phase: Phase::Initial,
        }
    }

    #[must_use]
    pub fn sensor(&self) -> Sensor {
        self.ctx.sensor
    }

    #[must_use]
    pub fn policy(&self) -> BatchPolicy {
        self.ctx.policy
    }

    /// Fetch the next batch.
    ///
    /// Returns `None` once every device is caught up to the quarantine cutoff,
    /// and after the first error.
    pub async fn next(&mut self) -> Option<Result<Batch>> {
        loop {
            match &mut self.phase {
                Phase::Done => return None,
                Phase::Initial => {
                    let devices = match self.ctx.reader.fetch_devices().await {
                        Ok(devices) => devices,
                        Err(e) => {
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                    };
                    info!(sensor = %self.ctx.sensor, devices = devices.len(), policy = %self.ctx.policy, "Starting anchored fetch");
                    let mut remaining = VecDeque::from(devices);
                    self.phase = match remaining.pop_front() {
                        Some(device) => Phase::Device {
                            cursor: Cursor::new(&self.ctx, device),
                            remaining,
                        },
                        None => Phase::Done,
                    };
                }
                Phase::Device { cursor, remaining } => match cursor.next().await {
                    Some(Ok(batch)) => return Some(Ok(batch)),
                    Some(Err(e)) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                    None => match remaining.pop_front() {
                        Some(device) => {
                            debug!(sensor = %self.ctx.sensor, device = %device.product_type, "Moving to next device");
                            *cursor = Cursor::new(&self.ctx, device);
                        }
                        None => {
                            debug!(sensor = %self.ctx.sensor, "Anchored fetch caught up");
                            self.phase = Phase::Done;
                        }
                    },
                },
            }
        }
    }

    /// Drain the sequence into a vector, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<Batch>> {
        let mut batches = Vec::new();
        while let Some(batch) = self.next().await {
            batches.push(batch?);
        }
        Ok(batches)
    }

    /// Adapt the sequence to a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Batch>> + Send {
        stream::unfold(self, |mut fetch| async move {
            let item = fetch.next().await?;
            Some((item, fetch))
        })
    }
}

impl std::fmt::Debug for AnchoredFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Initial => "initial",
            Phase::Device { .. } => "device",
            Phase::Done => "done",
        };
        f.debug_struct("AnchoredFetch")
            .field("sensor", &self.ctx.sensor)
            .field("policy", &self.ctx.policy)
            .field("phase", &phase)
            .finish()
    }
}
