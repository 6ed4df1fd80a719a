use crate::error::{SimulatorError, SimulatorResult};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};
use tracing::instrument;
use waveform_common::{EventId, Side, Sides, Time};

/// Photon arrivals on one side of the detector, as parallel channel and time arrays.
///
/// Channels are signed so that a negative channel reaches the accumulator
/// and is reported as out of range rather than failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SideHits {
    #[serde(default)]
    pub channel: Vec<i64>,
    #[serde(default)]
    pub time: Vec<Time>,
}

impl SideHits {
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Time)> + '_ {
        self.channel.iter().copied().zip(self.time.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EventHits {
    pub event: EventId,
    #[serde(default)]
    pub front: SideHits,
    #[serde(default)]
    pub back: SideHits,
}

impl EventHits {
    pub fn sides(&self) -> Sides<&SideHits> {
        Sides::new(&self.front, &self.back)
    }

    pub fn total(&self) -> usize {
        self.front.len() + self.back.len()
    }

    fn validate(&self) -> Result<(), String> {
        for (side, hits) in self.sides().iter() {
            if hits.channel.len() != hits.time.len() {
                return Err(mismatch_message(self.event, side, hits));
            }
        }
        Ok(())
    }
}

fn mismatch_message(event: EventId, side: Side, hits: &SideHits) -> String {
    format!(
        "event {event} has {} {side} channels but {} times",
        hits.channel.len(),
        hits.time.len()
    )
}

/// Reads one [EventHits] per non-blank line of a JSON lines document.
pub struct HitReader<R> {
    path: PathBuf,
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> HitReader<R> {
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for HitReader<R> {
    type Item = SimulatorResult<EventHits>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(SimulatorError::io(&self.path, e))),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let line = self.line;
            let hit_source_error = |message| SimulatorError::HitSource { line, message };
            return Some(
                serde_json::from_str::<EventHits>(&text)
                    .map_err(|e| hit_source_error(e.to_string()))
                    .and_then(|hits| {
                        hits.validate().map_err(hit_source_error)?;
                        Ok(hits)
                    }),
            );
        }
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn open_hits(path: &Path) -> SimulatorResult<HitReader<BufReader<File>>> {
    let file = File::open(path).map_err(|e| SimulatorError::io(path, e))?;
    Ok(HitReader::new(BufReader::new(file), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HITS: &str = r#"
{"event": 0, "front": {"channel": [0, 3], "time": [1.5, 2.0]}, "back": {"channel": [-1], "time": [0.2]}}

{"event": 4, "back": {"channel": [1], "time": [7.25]}}
"#;

    #[test]
    fn reads_events() {
        let events = HitReader::new(HITS.as_bytes(), "hits.jsonl")
            .collect::<SimulatorResult<Vec<_>>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, 0);
        assert_eq!(events[0].total(), 3);
        assert_eq!(
            events[0].front.iter().collect::<Vec<_>>(),
            vec![(0, 1.5), (3, 2.0)]
        );
        assert_eq!(events[0].back.iter().next(), Some((-1, 0.2)));
        assert!(events[1].front.is_empty());
        assert_eq!(events[1].sides().back.len(), 1);
    }

    #[test]
    fn mismatched_arrays() {
        let text = r#"{"event": 2, "front": {"channel": [0, 1], "time": [1.0]}}"#;
        let mut reader = HitReader::new(text.as_bytes(), "hits.jsonl");
        match reader.next() {
            Some(Err(SimulatorError::HitSource { line: 1, message })) => {
                assert!(message.contains("front"), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let text = "{\"event\": 0}\n\n{\"event\": \n";
        let results: Vec<_> = HitReader::new(text.as_bytes(), "hits.jsonl").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SimulatorError::HitSource { line: 3, .. })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            open_hits(Path::new("/nonexistent/hits.jsonl")),
            Err(SimulatorError::Io { .. })
        ));
    }
}
