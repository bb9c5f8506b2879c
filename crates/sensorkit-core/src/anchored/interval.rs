use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::debug;

use sensorkit_types::{Checkpoint, Device, TimeRange};

use super::{Batch, BatchInfo, FetchContext, samples_span};
use crate::checkpoint::Anchor;
use crate::error::Result;

enum State {
    Initial,
    Processing {
        anchor: Anchor,
        range: TimeRange,
        is_last: bool,
    },
    Done,
}

/// Drives one device through fixed-width time windows.
pub(super) struct IntervalCursor {
    ctx: Arc<FetchContext>,
    device: Device,
    span: Duration,
    state: State,
}

/// The window starting at `from`, clamped to `cutoff`.
///
/// `None` once `from` has reached the cutoff. The flag is set when the window
/// reaches the cutoff, making it the last one of the pass.
fn plan(from: OffsetDateTime, span: Duration, cutoff: OffsetDateTime) -> Option<(TimeRange, bool)> {
    if from >= cutoff {
        return None;
    }
    let (end, is_last) = match from.checked_add(span) {
        Some(end) if end < cutoff => (end, false),
        _ => (cutoff, true),
    };
    TimeRange::new(from, end).ok().map(|range| (range, is_last))
}

impl IntervalCursor {
    pub(super) fn new(ctx: Arc<FetchContext>, device: Device, span: Duration) -> Self {
        Self {
            ctx,
            device,
            span,
            state: State::Initial,
        }
    }

    pub(super) async fn next(&mut self) -> Option<Result<Batch>> {
        // Any early return leaves the cursor done.
        let (anchor, range, is_last) = match std::mem::replace(&mut self.state, State::Done) {
            State::Done => return None,
            State::Processing {
                anchor,
                range,
                is_last,
            } => (anchor, range, is_last),
            State::Initial => {
                let cutoff = self.ctx.cutoff();
                let (anchor, from) = match self.ctx.open_anchor(&self.device, cutoff) {
                    Ok(opened) => opened,
                    Err(e) => return Some(Err(e)),
                };
                match plan(from, self.span, cutoff) {
                    Some((range, is_last)) => (anchor, range, is_last),
                    None => {
                        debug!(sensor = %self.ctx.sensor, device = %self.device.product_type, "Checkpoint already at the quarantine cutoff");
                        return None;
                    }
                }
            }
        };
        Some(self.fetch(anchor, range, is_last).await)
    }

    async fn fetch(&mut self, mut anchor: Anchor, range: TimeRange, is_last: bool) -> Result<Batch> {
        let raw = self.ctx.reader.fetch(&self.device, range).await?;
        let samples = self.ctx.process(raw)?;
        anchor.update(Checkpoint::At(range.end()))?;

        if !is_last
            && let Some((next, next_is_last)) = plan(range.end(), self.span, self.ctx.cutoff())
        {
            self.state = State::Processing {
                anchor,
                range: next,
                is_last: next_is_last,
            };
        }

        debug!(sensor = %self.ctx.sensor, device = %self.device.product_type, %range, samples = samples.len(), "Delivering batch");
        Ok(Batch {
            info: BatchInfo {
                device: self.device.clone(),
                range,
                samples_span: samples_span(&samples),
                policy: self.ctx.policy,
            },
            samples,
        })
    }
}
