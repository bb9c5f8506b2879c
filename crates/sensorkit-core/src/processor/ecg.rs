use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use sensorkit_types::{
    EcgBatch, EcgFragment, EcgSession, EcgStage, EcgVoltageBatch, RawSample, SafeSample, Scalar,
    Sensor,
};

use super::{ProcessingError, SampleProcessor, expect_kind};

/// Reassembles electrocardiogram sessions from their fragments.
///
/// Fragments are grouped by session id. Each group needs a `Begin` and at
/// least one `Active` fragment; incomplete groups are dropped with a warning.
/// Frequency and lead must agree across a group and voltage batches must be
/// strictly increasing in time, starting no earlier than the session;
/// violations fail the whole call. Sessions are returned ordered by start.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcgSessionProcessor;

#[derive(Debug)]
struct Group {
    id: Uuid,
    frequency: Scalar,
    lead: u8,
    begin: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
    active: Vec<(OffsetDateTime, Vec<EcgVoltageBatch>)>,
}

impl Group {
    fn new(fragment: &EcgFragment) -> Self {
        Self {
            id: fragment.session_id,
            frequency: fragment.frequency,
            lead: fragment.lead,
            begin: None,
            end: None,
            active: Vec::new(),
        }
    }

    fn add(&mut self, timestamp: OffsetDateTime, fragment: EcgFragment) -> Result<(), ProcessingError> {
        if fragment.frequency != self.frequency {
            return Err(ProcessingError::InconsistentSession {
                session: self.id,
                field: "frequency",
            });
        }
        if fragment.lead != self.lead {
            return Err(ProcessingError::InconsistentSession {
                session: self.id,
                field: "lead",
            });
        }
        match fragment.stage {
            EcgStage::Begin => {
                self.begin = Some(self.begin.map_or(timestamp, |begin| begin.min(timestamp)));
            }
            EcgStage::Active => self.active.push((timestamp, fragment.batches)),
            EcgStage::End => {
                self.end = Some(self.end.map_or(timestamp, |end| end.max(timestamp)));
            }
        }
        Ok(())
    }

    /// `None` when the group lacks a begin or active fragment.
    fn into_session(mut self) -> Result<Option<EcgSession>, ProcessingError> {
        let Some(start) = self.begin else {
            warn!(session = %self.id, "Dropping ECG session without a begin fragment");
            return Ok(None);
        };
        if self.active.is_empty() {
            warn!(session = %self.id, "Dropping ECG session without active fragments");
            return Ok(None);
        }

        // Delivery order is not guaranteed; fragments are ordered by their own timestamps.
        self.active.sort_by_key(|(timestamp, _)| *timestamp);

        let mut batches = Vec::new();
        let mut previous: Option<OffsetDateTime> = None;
        for batch in self.active.into_iter().flat_map(|(_, batches)| batches) {
            let in_order = batch.timestamp >= start
                && previous.is_none_or(|previous| batch.timestamp > previous);
            if !in_order {
                return Err(ProcessingError::OutOfOrder {
                    session: self.id,
                    at: batch.timestamp,
                });
            }
            previous = Some(batch.timestamp);
            batches.push(EcgBatch {
                offset: batch.timestamp - start,
                voltages: batch.voltages,
            });
        }

        Ok(Some(EcgSession {
            id: self.id,
            start,
            end: self.end,
            frequency: self.frequency,
            lead: self.lead,
            batches,
        }))
    }
}

impl SampleProcessor for EcgSessionProcessor {
    fn process(
        &self,
        sensor: Sensor,
        samples: &mut dyn Iterator<Item = (OffsetDateTime, RawSample)>,
    ) -> Result<Vec<SafeSample>, ProcessingError> {
        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<Uuid, usize> = HashMap::new();

        for (timestamp, sample) in samples {
            expect_kind(sensor, &sample)?;
            let RawSample::EcgFragment(fragment) = sample else {
                continue;
            };
            let slot = *index.entry(fragment.session_id).or_insert_with(|| {
                groups.push(Group::new(&fragment));
                groups.len() - 1
            });
            groups[slot].add(timestamp, fragment)?;
        }

        let mut sessions = Vec::with_capacity(groups.len());
        for group in groups {
            if let Some(session) = group.into_session()? {
                sessions.push(session);
            }
        }
        sessions.sort_by_key(|session| session.start);
        Ok(sessions.into_iter().map(SafeSample::EcgSession).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn at(ms: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::days(19_000) + Duration::milliseconds(ms)
    }

    fn fragment(id: Uuid, stage: EcgStage, batch_times: &[i64]) -> RawSample {
        RawSample::EcgFragment(EcgFragment {
            session_id: id,
            stage,
            frequency: Scalar(512.0),
            lead: 1,
            batches: batch_times
                .iter()
                .map(|&ms| EcgVoltageBatch {
                    timestamp: at(ms),
                    voltages: vec![Scalar(ms as f64), Scalar(-(ms as f64))],
                })
                .collect(),
        })
    }

    fn run(input: Vec<(OffsetDateTime, RawSample)>) -> Result<Vec<SafeSample>, ProcessingError> {
        EcgSessionProcessor.process(Sensor::Electrocardiogram, &mut input.into_iter())
    }

    fn sessions(out: Vec<SafeSample>) -> Vec<EcgSession> {
        out.into_iter()
            .map(|sample| match sample {
                SafeSample::EcgSession(session) => session,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_reconstructs_session() {
        let id = Uuid::new_v4();
        let out = run(vec![
            (at(0), fragment(id, EcgStage::Begin, &[])),
            (at(10), fragment(id, EcgStage::Active, &[0, 2, 4, 6])),
            (at(30_000), fragment(id, EcgStage::End, &[])),
        ])
        .unwrap();

        let sessions = sessions(out);
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.id, id);
        assert_eq!(session.start, at(0));
        assert_eq!(session.end, Some(at(30_000)));
        assert_eq!(session.batches.len(), 4);
        assert_eq!(session.batches[0].offset, Duration::ZERO);
        assert!(
            session
                .batches
                .windows(2)
                .all(|pair| pair[0].offset < pair[1].offset)
        );
        assert_eq!(session.voltage_count(), 8);
    }

    #[test]
    fn test_interleaved_sessions_kept_apart() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let out = run(vec![
            (at(100), fragment(second, EcgStage::Begin, &[])),
            (at(0), fragment(first, EcgStage::Begin, &[])),
            (at(101), fragment(second, EcgStage::Active, &[100, 101])),
            (at(1), fragment(first, EcgStage::Active, &[0])),
        ])
        .unwrap();

        let sessions = sessions(out);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, first);
        assert_eq!(sessions[1].id, second);
        assert_eq!(sessions[1].batches.len(), 2);
    }

    #[test]
    fn test_drops_incomplete_groups() {
        let no_begin = Uuid::new_v4();
        let no_active = Uuid::new_v4();
        let complete = Uuid::new_v4();
        let out = run(vec![
            (at(0), fragment(no_begin, EcgStage::Active, &[0])),
            (at(0), fragment(no_active, EcgStage::Begin, &[])),
            (at(5), fragment(no_active, EcgStage::End, &[])),
            (at(0), fragment(complete, EcgStage::Begin, &[])),
            (at(1), fragment(complete, EcgStage::Active, &[1])),
        ])
        .unwrap();

        let sessions = sessions(out);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, complete);
        assert_eq!(sessions[0].end, None);
    }

    #[test]
    fn test_inconsistent_frequency_fails() {
        let id = Uuid::new_v4();
        let mut active = fragment(id, EcgStage::Active, &[0]);
        if let RawSample::EcgFragment(fragment) = &mut active {
            fragment.frequency = Scalar(256.0);
        }
        let err = run(vec![
            (at(0), fragment(id, EcgStage::Begin, &[])),
            (at(1), active),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ProcessingError::InconsistentSession {
                session: id,
                field: "frequency"
            }
        );
    }

    #[test]
    fn test_inconsistent_lead_fails() {
        let id = Uuid::new_v4();
        let mut active = fragment(id, EcgStage::Active, &[0]);
        if let RawSample::EcgFragment(fragment) = &mut active {
            fragment.lead = 2;
        }
        let err = run(vec![
            (at(0), fragment(id, EcgStage::Begin, &[])),
            (at(1), active),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InconsistentSession { field: "lead", .. }
        ));
    }

    #[test]
    fn test_out_of_order_batches_fail() {
        let id = Uuid::new_v4();
        let err = run(vec![
            (at(0), fragment(id, EcgStage::Begin, &[])),
            (at(1), fragment(id, EcgStage::Active, &[4, 2])),
        ])
        .unwrap_err();
        assert_eq!(err, ProcessingError::OutOfOrder { session: id, at: at(2) });
    }

    #[test]
    fn test_batch_before_start_fails() {
        let id = Uuid::new_v4();
        let err = run(vec![
            (at(10), fragment(id, EcgStage::Begin, &[])),
            (at(11), fragment(id, EcgStage::Active, &[5])),
        ])
        .unwrap_err();
        assert!(matches!(err, ProcessingError::OutOfOrder { .. }));
    }

    #[test]
    fn test_rejects_non_ecg_samples() {
        let sample = RawSample::OnWrist(sensorkit_types::OnWristSample {
            on_wrist: false,
            wrist_detection_enabled: true,
        });
        assert!(run(vec![(at(0), sample)]).is_err());
    }
}
