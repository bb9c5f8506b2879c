//! Flattening iterator over raw fetch results.

use std::iter::FusedIterator;
use std::vec;

use time::OffsetDateTime;

use sensorkit_types::{RawFetchResult, RawSample};

/// Lazily flattens raw results into `(timestamp, sample)` pairs.
///
/// Samples come out in result order, then sample order within a result, each
/// paired with its result's framework timestamp. Results without samples are
/// skipped. The iterator is single-pass and fused.
///
/// ```
/// use sensorkit_core::FetchResults;
/// use sensorkit_types::{OnWristSample, RawFetchResult, RawSample};
/// use time::OffsetDateTime;
///
/// let sample = RawSample::OnWrist(OnWristSample { on_wrist: true, wrist_detection_enabled: true });
/// let results = vec![
///     RawFetchResult::new(OffsetDateTime::UNIX_EPOCH, vec![]),
///     RawFetchResult::single(OffsetDateTime::UNIX_EPOCH, sample.clone()),
/// ];
/// let flat: Vec<_> = FetchResults::new(results).collect();
/// assert_eq!(flat, vec![(OffsetDateTime::UNIX_EPOCH, sample)]);
/// ```
#[derive(Debug)]
pub struct FetchResults<I> {
    state: State<I>,
}

#[derive(Debug)]
enum State<I> {
    Exhausted,
    Active {
        current: vec::IntoIter<RawSample>,
        timestamp: OffsetDateTime,
        rest: I,
    },
}

impl<I> FetchResults<I>
where
    I: Iterator<Item = RawFetchResult>,
{
    pub fn new(results: impl IntoIterator<IntoIter = I>) -> Self {
        let mut rest = results.into_iter();
        let state = match rest.next() {
            Some(first) => State::Active {
                current: first.samples.into_iter(),
                timestamp: first.timestamp,
                rest,
            },
            None => State::Exhausted,
        };
        Self { state }
    }
}

impl<I> Iterator for FetchResults<I>
where
    I: Iterator<Item = RawFetchResult>,
{
    type Item = (OffsetDateTime, RawSample);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let State::Active {
                current,
                timestamp,
                rest,
            } = &mut self.state
            else {
                return None;
            };

            if let Some(sample) = current.next() {
                return Some((*timestamp, sample));
            }

            match rest.next() {
                Some(result) => {
                    *current = result.samples.into_iter();
                    *timestamp = result.timestamp;
                }
                None => {
                    self.state = State::Exhausted;
                    return None;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.state {
            State::Exhausted => (0, Some(0)),
            State::Active { current, rest, .. } => {
                // Remaining results may hold any number of samples.
                let upper = match rest.size_hint() {
                    (_, Some(0)) => Some(current.len()),
                    _ => None,
                };
                (current.len(), upper)
            }
        }
    }
}

impl<I> FusedIterator for FetchResults<I> where I: Iterator<Item = RawFetchResult> {}
