use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use sensorkit_types::{Checkpoint, Device, RawFetchResult, TimeRange};

use super::{Batch, BatchInfo, FetchContext, samples_span};
use crate::checkpoint::Anchor;
use crate::error::Result;
use crate::reader::FetchStream;

/// Raw results received since the last flush.
#[derive(Default)]
struct Pending {
    results: Vec<RawFetchResult>,
    samples: usize,
    latest: Option<OffsetDateTime>,
}

impl Pending {
    fn push(&mut self, result: RawFetchResult) {
        self.samples += result.samples.len();
        self.latest = Some(
            self.latest
                .map_or(result.timestamp, |latest| latest.max(result.timestamp)),
        );
        self.results.push(result);
    }
}

enum State {
    Initial,
    Streaming {
        anchor: Anchor,
        stream: FetchStream,
        pending: Pending,
        upper: OffsetDateTime,
    },
    Done,
}

/// Drives one device through a single streaming fetch, cutting a batch
/// whenever enough samples are pending.
///
/// Checkpoints move to the latest framework timestamp of each flushed batch,
/// and to the fetch's upper bound when the host completes. Dropping the
/// cursor stops the stream.
pub(super) struct CountCursor {
    ctx: Arc<FetchContext>,
    device: Device,
    threshold: usize,
    state: State,
}

impl CountCursor {
    pub(super) fn new(ctx: Arc<FetchContext>, device: Device, threshold: usize) -> Self {
        Self {
            ctx,
            device,
            threshold,
            state: State::Initial,
        }
    }

    pub(super) async fn next(&mut self) -> Option<Result<Batch>> {
        loop {
            match &mut self.state {
                State::Done => return None,
                State::Initial => {
                    let cutoff = self.ctx.cutoff();
                    let (anchor, from) = match self.ctx.open_anchor(&self.device, cutoff) {
                        Ok(opened) => opened,
                        Err(e) => {
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                    };
                    let Some(range) = TimeRange::new(from, cutoff).ok().filter(|r| !r.is_empty())
                    else {
                        debug!(sensor = %self.ctx.sensor, device = %self.device.product_type, "Checkpoint already at the quarantine cutoff");
                        self.state = State::Done;
                        return None;
                    };
                    let stream = self.ctx.reader.fetch_stream(&self.device, range).await;
                    self.state = State::Streaming {
                        anchor,
                        stream,
                        pending: Pending::default(),
                        upper: cutoff,
                    };
                }
                State::Streaming {
                    anchor,
                    stream,
                    pending,
                    upper,
                } => match stream.recv().await {
                    Ok(Some(result)) => {
                        pending.push(result);
                        if pending.samples >= self.threshold {
                            let target = pending.latest.unwrap_or(*upper);
                            let batch = flush(&self.ctx, &self.device, anchor, pending, target);
                            if batch.is_err() {
                                self.state = State::Done;
                            }
                            return Some(batch);
                        }
                    }
                    Ok(None) => {
                        let upper = *upper;
                        if pending.results.is_empty() && anchor.current() >= Checkpoint::At(upper) {
                            self.state = State::Done;
                            return None;
                        }
                        let batch = flush(&self.ctx, &self.device, anchor, pending, upper);
                        self.state = State::Done;
                        return Some(batch);
                    }
                    Err(e) => {
                        self.state = State::Done;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}

/// Process everything pending and move the checkpoint to `target`.
///
/// The checkpoint never moves backwards; if `target` is behind it the
/// reported range is empty.
fn flush(
    ctx: &FetchContext,
    device: &Device,
    anchor: &mut Anchor,
    pending: &mut Pending,
    target: OffsetDateTime,
) -> Result<Batch> {
    let raw = std::mem::take(pending).results;
    let samples = ctx.process(raw)?;

    let before = anchor.current().instant().unwrap_or(target);
    anchor.update(Checkpoint::At(target))?;
    let after = anchor.current().instant().unwrap_or(target);
    let range = TimeRange::new(before, after.max(before))?;

    debug!(sensor = %ctx.sensor, device = %device.product_type, %range, samples = samples.len(), "Delivering batch");
    Ok(Batch {
        info: BatchInfo {
            device: device.clone(),
            range,
            samples_span: samples_span(&samples),
            policy: ctx.policy,
        },
        samples,
    })
}
