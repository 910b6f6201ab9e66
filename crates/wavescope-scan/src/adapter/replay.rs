//! Scripted observation source for tests and offline demos.
//!
//! A replay file is a JSON array of cycles, each either a batch or a
//! failure:
//!
//! ```json
//! [
//!   { "observations": [ { "bssid": "aa:bb:cc:dd:ee:01", "signal_dbm": -52.0 } ] },
//!   { "failure": { "kind": "timeout", "tool": "nmcli", "after_ms": 30000 } }
//! ]
//! ```

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::domain::observation::Observation;
use crate::error::{BatchFailure, ConfigError, ScanResult};
use crate::port::ObservationSource;

/// One scripted poll outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayCycle {
    /// A successful batch.
    Observations(Vec<Observation>),
    /// A failed poll.
    Failure(BatchFailure),
}

impl From<Result<Vec<Observation>, BatchFailure>> for ReplayCycle {
    fn from(outcome: Result<Vec<Observation>, BatchFailure>) -> Self {
        match outcome {
            Ok(batch) => Self::Observations(batch),
            Err(failure) => Self::Failure(failure),
        }
    }
}

/// Plays back a fixed sequence of cycles, then fails with
/// [`BatchFailure::Exhausted`] unless looping.
pub struct ReplaySource {
    script: Vec<ReplayCycle>,
    pending: Mutex<VecDeque<ReplayCycle>>,
    looping: bool,
}

impl ReplaySource {
    /// Replay `cycles` once.
    pub fn from_cycles(cycles: Vec<ReplayCycle>) -> Self {
        Self {
            pending: Mutex::new(cycles.iter().cloned().collect()),
            script: cycles,
            looping: false,
        }
    }

    /// Load a replay script from a JSON file.
    pub fn from_json(path: &Path) -> ScanResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cycles: Vec<ReplayCycle> = serde_json::from_str(&contents)?;
        tracing::info!(path = %path.display(), cycles = cycles.len(), "loaded replay script");
        Ok(Self::from_cycles(cycles))
    }

    /// Restart from the first cycle once the script runs out.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Cycles left before exhaustion (or the next loop).
    pub fn remaining(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl ObservationSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn poll(&self) -> Result<Vec<Observation>, BatchFailure> {
        let next = {
            let mut pending = self.pending.lock();
            if pending.is_empty() && self.looping {
                pending.extend(self.script.iter().cloned());
            }
            pending.pop_front()
        };
        match next {
            Some(ReplayCycle::Observations(batch)) => Ok(batch),
            Some(ReplayCycle::Failure(failure)) => Err(failure),
            None => Err(BatchFailure::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::bssid::BssidId;

    const SCRIPT: &str = r#"[
        { "observations": [ { "bssid": "aa:bb:cc:dd:ee:01", "signal_dbm": -52.0 } ] },
        { "failure": { "kind": "timeout", "tool": "nmcli", "after_ms": 30000 } },
        { "observations": [] }
    ]"#;

    #[tokio::test]
    async fn plays_script_then_exhausts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        let source = ReplaySource::from_json(file.path()).unwrap();
        assert_eq!(source.remaining(), 3);

        let batch = source.poll().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].bssid, BssidId([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]));
        assert_eq!(batch[0].signal_dbm, Some(-52.0));

        assert_eq!(
            source.poll().await.unwrap_err(),
            BatchFailure::Timeout {
                tool: "nmcli".into(),
                after_ms: 30000
            }
        );
        assert!(source.poll().await.unwrap().is_empty());
        assert_eq!(source.poll().await.unwrap_err(), BatchFailure::Exhausted);
    }

    #[tokio::test]
    async fn looping_restarts() {
        let source = ReplaySource::from_cycles(vec![Ok(vec![]).into()]).looping(true);
        for _ in 0..3 {
            assert!(source.poll().await.is_ok());
        }
    }

    #[test]
    fn malformed_script_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(ReplaySource::from_json(file.path()).is_err());
        assert!(ReplaySource::from_json(Path::new("/nonexistent/replay.json")).is_err());
    }
}
