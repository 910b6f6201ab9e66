//! Linux adapter: `nmcli` listing enriched by `iw scan dump`.
//!
//! Every [`rescan_every`](NmcliIwConfig::rescan_every) polls (and on the
//! third poll) NetworkManager is asked for a fresh scan, twice in a row so
//! the second sweep catches BSSIDs that answer late. Other polls read
//! the cached list. `iw` enrichment is best-effort: when it fails the batch
//! still succeeds with the `nmcli` fields alone.
//!
//! A poll shares one deadline of [`scan_timeout`](NmcliIwConfig::scan_timeout)
//! across every tool it runs; each invocation gets what is left of it.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tokio::time::Instant;

use crate::adapter::decode::{
    enrich, finalize, parse_iw_dev, parse_iw_scan_dump, parse_nmcli_terse, NMCLI_FIELDS,
};
use crate::config::ScanConfig;
use crate::domain::observation::Observation;
use crate::error::BatchFailure;
use crate::port::ObservationSource;

/// Upper bound for polls that only read NetworkManager's cache.
const CACHED_LIST_TIMEOUT: Duration = Duration::from_secs(8);

/// Upper bound for `iw` invocations.
const IW_TIMEOUT: Duration = Duration::from_secs(6);

/// Settings for [`NmcliIwSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct NmcliIwConfig {
    /// Wireless interface; detected through `iw dev` when `None`.
    pub interface: Option<String>,
    /// Deadline for one whole poll.
    pub scan_timeout: Duration,
    /// Request a fresh scan every this many polls.
    pub rescan_every: u64,
}

impl Default for NmcliIwConfig {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for NmcliIwConfig {
    fn from(config: &ScanConfig) -> Self {
        Self {
            interface: config.interface.clone(),
            scan_timeout: config.scan_timeout(),
            rescan_every: config.rescan_every_cycles.max(1),
        }
    }
}

/// Observation source backed by the `nmcli` and `iw` command-line tools.
pub struct NmcliIwSource {
    config: NmcliIwConfig,
    polls: AtomicU64,
    /// Interface found by `iw dev`, cached after the first success.
    detected_iface: Mutex<Option<String>>,
}

impl NmcliIwSource {
    /// Create a source with the given settings.
    pub fn new(config: NmcliIwConfig) -> Self {
        Self {
            config,
            polls: AtomicU64::new(0),
            detected_iface: Mutex::new(None),
        }
    }

    /// Number of polls started so far.
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Whether poll number `idx` (0-based) requests a fresh scan.
    pub fn is_rescan_poll(idx: u64, rescan_every: u64) -> bool {
        idx % rescan_every.max(1) == 0 || idx == 2
    }

    fn poll_timeout(&self) -> BatchFailure {
        BatchFailure::Timeout {
            tool: "nmcli".to_owned(),
            after_ms: self.config.scan_timeout.as_millis() as u64,
        }
    }

    async fn list(&self, rescan: bool, deadline: Instant) -> Result<String, BatchFailure> {
        let cap = if rescan {
            self.config.scan_timeout
        } else {
            CACHED_LIST_TIMEOUT
        };
        let timeout = budget(deadline, cap);
        if timeout.is_zero() {
            return Err(self.poll_timeout());
        }
        let flag = if rescan { "yes" } else { "no" };
        run_tool(
            "nmcli",
            &["-t", "-f", NMCLI_FIELDS, "dev", "wifi", "list", "--rescan", flag],
            timeout,
        )
        .await
    }

    async fn interface(&self, deadline: Instant) -> Option<String> {
        if let Some(iface) = &self.config.interface {
            return Some(iface.clone());
        }
        let cached = self.detected_iface.lock().clone();
        if cached.is_some() {
            return cached;
        }
        let timeout = budget(deadline, IW_TIMEOUT);
        if timeout.is_zero() {
            return None;
        }
        match run_tool("iw", &["dev"], timeout).await {
            Ok(out) => {
                let iface = parse_iw_dev(&out)?;
                tracing::info!(interface = %iface, "detected wireless interface");
                *self.detected_iface.lock() = Some(iface.clone());
                Some(iface)
            }
            Err(e) => {
                tracing::debug!(error = %e, "interface detection failed");
                None
            }
        }
    }

    async fn enrich_with_iw(&self, batch: &mut [Observation], deadline: Instant) {
        let Some(iface) = self.interface(deadline).await else {
            return;
        };
        let timeout = budget(deadline, IW_TIMEOUT);
        if timeout.is_zero() {
            tracing::debug!(interface = %iface, "no time left for iw enrichment");
            return;
        }
        let dump = match run_tool("iw", &["dev", &iface, "scan", "dump"], timeout).await {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(interface = %iface, error = %e, "iw enrichment skipped");
                return;
            }
        };
        let details = parse_iw_scan_dump(&dump);
        let mut matched = 0usize;
        for obs in batch.iter_mut() {
            if let Some(iw) = details.get(&obs.bssid) {
                enrich(obs, iw);
                matched += 1;
            }
        }
        tracing::debug!(iw_bss = details.len(), matched, "iw enrichment applied");
    }
}

impl Default for NmcliIwSource {
    fn default() -> Self {
        Self::new(NmcliIwConfig::default())
    }
}

#[async_trait]
impl ObservationSource for NmcliIwSource {
    fn name(&self) -> &str {
        "nmcli+iw"
    }

    async fn poll(&self) -> Result<Vec<Observation>, BatchFailure> {
        let start = Instant::now();
        let deadline = start + self.config.scan_timeout;
        let idx = self.polls.fetch_add(1, Ordering::Relaxed);
        let rescan = Self::is_rescan_poll(idx, self.config.rescan_every);

        let output = if rescan {
            // First sweep only primes the cache; its listing is discarded.
            match self.list(true, deadline).await {
                Err(missing @ BatchFailure::ToolMissing { .. }) => return Err(missing),
                Err(e) => tracing::debug!(error = %e, "first rescan sweep failed"),
                Ok(_) => {}
            }
            self.list(true, deadline).await?
        } else {
            self.list(false, deadline).await?
        };

        let mut batch = parse_nmcli_terse(&output);
        self.enrich_with_iw(&mut batch, deadline).await;
        batch.iter_mut().for_each(finalize);

        tracing::debug!(
            poll = idx,
            rescan,
            bssid_count = batch.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "nmcli poll complete"
        );
        Ok(batch)
    }
}

/// Time left before `deadline`, capped at `cap`.
fn budget(deadline: Instant, cap: Duration) -> Duration {
    deadline.saturating_duration_since(Instant::now()).min(cap)
}

/// Run `program` with `args`, killing it once `timeout` elapses.
pub(crate) async fn run_tool(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, BatchFailure> {
    let child = Command::new(program)
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Err(_) => {
            return Err(BatchFailure::Timeout {
                tool: program.to_owned(),
                after_ms: timeout.as_millis() as u64,
            })
        }
        Ok(Err(e)) => return Err(BatchFailure::from_spawn(program, &e)),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(BatchFailure::NonZeroExit {
            tool: program.to_owned(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescan_cadence() {
        let rescans: Vec<u64> = (0..12)
            .filter(|&i| NmcliIwSource::is_rescan_poll(i, 5))
            .collect();
        assert_eq!(rescans, vec![0, 2, 5, 10]);
        assert!((0..4).all(|i| NmcliIwSource::is_rescan_poll(i, 1)));
    }

    #[test]
    fn config_follows_scan_config() {
        let scan = ScanConfig {
            interface: Some("wlan1".into()),
            rescan_every_cycles: 3,
            ..ScanConfig::default()
        };
        let cfg = NmcliIwConfig::from(&scan);
        assert_eq!(cfg.interface.as_deref(), Some("wlan1"));
        assert_eq!(cfg.rescan_every, 3);
        assert_eq!(cfg.scan_timeout, scan.scan_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn budget_shrinks_to_deadline() {
        let deadline = Instant::now() + Duration::from_secs(10);
        assert_eq!(budget(deadline, Duration::from_secs(8)), Duration::from_secs(8));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(budget(deadline, Duration::from_secs(8)), Duration::from_secs(6));
        assert_eq!(budget(deadline, Duration::from_secs(3)), Duration::from_secs(3));
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(budget(deadline, Duration::from_secs(8)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn spent_deadline_fails_without_running_nmcli() {
        let source = NmcliIwSource::new(NmcliIwConfig {
            interface: Some("wlan0".into()),
            scan_timeout: Duration::from_secs(30),
            rescan_every: 5,
        });
        let deadline = Instant::now();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            source.list(true, deadline).await.unwrap_err(),
            BatchFailure::Timeout {
                tool: "nmcli".into(),
                after_ms: 30_000
            }
        );
        assert_eq!(source.interface(deadline).await.as_deref(), Some("wlan0"));
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let err = run_tool(
            "wavescope-no-such-tool",
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            BatchFailure::ToolMissing {
                tool: "wavescope-no-such-tool".into()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_and_timeout() {
        let err = run_tool("false", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchFailure::NonZeroExit { code: Some(1), .. }));

        let err = run_tool("sleep", &["5"], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchFailure::Timeout { after_ms: 50, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_returned() {
        let out = run_tool("echo", &["hello"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }
}
