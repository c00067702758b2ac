use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adb::RemoteFs;
use crate::device::{DeviceState, ReachabilityGate};

/// Result of inspecting a fetched file against the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Every marker line is already commented out.
    AlreadyNeutralized,
    /// The marker does not appear at all (addon updated or wrong file).
    MarkerAbsent,
    /// The rewritten content, ready to push.
    Patched(String),
}

/// Comment out every line containing `marker`, preserving indentation and
/// line endings. Lines that are already comments are left alone, so
/// applying this to patched content is a no-op.
pub fn neutralize_marker(content: &str, marker: &str) -> PatchOutcome {
    let mut out = String::with_capacity(content.len() + 16);
    let mut found = false;
    let mut changed = false;

    for line in content.split_inclusive('\n') {
        if line.contains(marker) {
            found = true;
            if line.trim_start().starts_with('#') {
                out.push_str(line);
            } else {
                changed = true;
                let indent_end = line.len() - line.trim_start().len();
                out.push_str(&line[..indent_end]);
                out.push_str("# ");
                out.push_str(&line[indent_end..]);
            }
        } else {
            out.push_str(line);
        }
    }

    if changed {
        PatchOutcome::Patched(out)
    } else if found {
        PatchOutcome::AlreadyNeutralized
    } else {
        PatchOutcome::MarkerAbsent
    }
}

/// What a single cycle did. Operational only; never surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Device unreachable; the next interval retries from scratch.
    Skipped,
    FetchFailed,
    /// Marker absent, nothing to do.
    Clean,
    AlreadyPatched,
    Patched,
    PushFailed,
}

/// Remote Patch Scheduler: re-checks the addon source on the device and
/// comments out its external-playback block. Holds no local state between
/// cycles; the remote file content is the only source of truth.
pub struct Patcher {
    gate: ReachabilityGate,
    fs: Arc<dyn RemoteFs>,
    remote_path: String,
    marker: String,
}

impl Patcher {
    pub fn new(
        gate: ReachabilityGate,
        fs: Arc<dyn RemoteFs>,
        remote_path: String,
        marker: String,
    ) -> Self {
        Self {
            gate,
            fs,
            remote_path,
            marker,
        }
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        debug!("patch cycle start");

        if self.gate.ensure_ready().await != DeviceState::Ready {
            info!("device unreachable, skipping patch cycle");
            return CycleOutcome::Skipped;
        }

        let content = match self.fs.pull(&self.remote_path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.remote_path, error = %e, "fetch failed");
                return CycleOutcome::FetchFailed;
            }
        };

        match neutralize_marker(&content, &self.marker) {
            PatchOutcome::AlreadyNeutralized => {
                debug!("already patched");
                CycleOutcome::AlreadyPatched
            }
            PatchOutcome::MarkerAbsent => {
                debug!("marker absent, nothing to patch");
                CycleOutcome::Clean
            }
            PatchOutcome::Patched(patched) => {
                info!(path = %self.remote_path, "blocking code detected, applying patch");
                match self.fs.push(&self.remote_path, &patched).await {
                    Ok(()) => {
                        info!("patch applied");
                        CycleOutcome::Patched
                    }
                    Err(e) => {
                        // The staged push never replaced the remote file;
                        // retry at the next interval.
                        error!(error = %e, "push failed");
                        CycleOutcome::PushFailed
                    }
                }
            }
        }
    }

    /// Run cycles on a fixed interval until `shutdown` fires. A single
    /// task owns the loop, so cycles never overlap; a cycle that outlives
    /// the interval delays the next tick instead of stacking.
    pub fn spawn(self: Arc<Self>, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = every.as_secs(), "patch scheduler started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                }
            }

            info!("patch scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::AdbError;
    use crate::device::{DeviceLink, GateConfig, WakeError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MARKER: &str = "return kodi_utils.notification('WARNING: External Playback Detected!')";

    fn blocked_source() -> String {
        format!(
            "def play(self):\n    if external:\n        {}\n    return sources\n",
            MARKER
        )
    }

    #[test]
    fn test_neutralize_comments_marker_line() {
        let patched = match neutralize_marker(&blocked_source(), MARKER) {
            PatchOutcome::Patched(content) => content,
            other => panic!("expected patch, got {:?}", other),
        };

        assert!(patched.contains(&format!("        # {}", MARKER)));
        assert!(patched.contains("def play(self):\n"));
        assert!(patched.ends_with("    return sources\n"));
    }

    #[test]
    fn test_neutralize_is_idempotent() {
        let first = match neutralize_marker(&blocked_source(), MARKER) {
            PatchOutcome::Patched(content) => content,
            other => panic!("expected patch, got {:?}", other),
        };

        // Applying the patch to patched content is a no-op.
        assert_eq!(
            neutralize_marker(&first, MARKER),
            PatchOutcome::AlreadyNeutralized
        );
    }

    #[test]
    fn test_neutralize_without_marker() {
        assert_eq!(
            neutralize_marker("def play(self):\n    return sources\n", MARKER),
            PatchOutcome::MarkerAbsent
        );
    }

    #[test]
    fn test_neutralize_preserves_missing_trailing_newline() {
        let content = format!("    {}", MARKER);
        match neutralize_marker(&content, MARKER) {
            PatchOutcome::Patched(patched) => {
                assert_eq!(patched, format!("    # {}", MARKER));
            }
            other => panic!("expected patch, got {:?}", other),
        }
    }

    struct AlwaysReady;

    #[async_trait]
    impl DeviceLink for AlwaysReady {
        async fn probe(&self) -> bool {
            true
        }
        async fn send_wake_packet(&self) -> Result<(), WakeError> {
            Ok(())
        }
        async fn send_wake_key(&self) -> Result<(), WakeError> {
            Ok(())
        }
        async fn launch_player(&self) -> Result<(), WakeError> {
            Ok(())
        }
    }

    struct NeverReady;

    #[async_trait]
    impl DeviceLink for NeverReady {
        async fn probe(&self) -> bool {
            false
        }
        async fn send_wake_packet(&self) -> Result<(), WakeError> {
            Ok(())
        }
        async fn send_wake_key(&self) -> Result<(), WakeError> {
            Ok(())
        }
        async fn launch_player(&self) -> Result<(), WakeError> {
            Ok(())
        }
    }

    struct FakeFs {
        content: Mutex<String>,
        pulls: AtomicUsize,
        pushes: AtomicUsize,
        pull_fails: bool,
        push_fails: bool,
    }

    impl FakeFs {
        fn new(content: &str) -> Self {
            Self {
                content: Mutex::new(content.to_string()),
                pulls: AtomicUsize::new(0),
                pushes: AtomicUsize::new(0),
                pull_fails: false,
                push_fails: false,
            }
        }

        fn rejecting_pushes(content: &str) -> Self {
            Self {
                push_fails: true,
                ..Self::new(content)
            }
        }

        fn unreadable() -> Self {
            Self {
                pull_fails: true,
                ..Self::new("")
            }
        }
    }

    #[async_trait]
    impl RemoteFs for FakeFs {
        async fn pull(&self, _remote_path: &str) -> Result<String, AdbError> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            if self.pull_fails {
                return Err(AdbError::CommandFailed("device offline".to_string()));
            }
            Ok(self.content.lock().unwrap().clone())
        }

        async fn push(&self, _remote_path: &str, content: &str) -> Result<(), AdbError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.push_fails {
                return Err(AdbError::CommandFailed("write failed".to_string()));
            }
            *self.content.lock().unwrap() = content.to_string();
            Ok(())
        }
    }

    fn fast_gate(link: Arc<dyn DeviceLink>) -> ReachabilityGate {
        ReachabilityGate::new(
            link,
            GateConfig {
                wol_settle: Duration::from_millis(1),
                boot_window: Duration::from_millis(5),
                boot_poll: Duration::from_millis(1),
                post_boot_settle: Duration::from_millis(0),
            },
        )
    }

    fn patcher(fs: Arc<FakeFs>, link: Arc<dyn DeviceLink>) -> Patcher {
        Patcher::new(
            fast_gate(link),
            fs,
            "/remote/sources.py".to_string(),
            MARKER.to_string(),
        )
    }

    #[tokio::test]
    async fn test_cycle_patches_then_second_cycle_is_noop() {
        let fs = Arc::new(FakeFs::new(&blocked_source()));
        let patcher = patcher(fs.clone(), Arc::new(AlwaysReady));

        assert_eq!(patcher.run_cycle().await, CycleOutcome::Patched);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 1);

        // Second run fetches, finds the file already patched, pushes nothing.
        assert_eq!(patcher.run_cycle().await, CycleOutcome::AlreadyPatched);
        assert_eq!(fs.pulls.load(Ordering::SeqCst), 2);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cycle_skips_unreachable_device() {
        let fs = Arc::new(FakeFs::new(&blocked_source()));
        let patcher = patcher(fs.clone(), Arc::new(NeverReady));

        assert_eq!(patcher.run_cycle().await, CycleOutcome::Skipped);
        assert_eq!(fs.pulls.load(Ordering::SeqCst), 0);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_push_leaves_remote_content_untouched() {
        let fs = Arc::new(FakeFs::rejecting_pushes(&blocked_source()));
        let patcher = patcher(fs.clone(), Arc::new(AlwaysReady));

        assert_eq!(patcher.run_cycle().await, CycleOutcome::PushFailed);
        assert_eq!(*fs.content.lock().unwrap(), blocked_source());

        // Nothing was remembered from the failed attempt; the next cycle
        // starts over and tries the push again.
        assert_eq!(patcher.run_cycle().await, CycleOutcome::PushFailed);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 2);
        assert_eq!(*fs.content.lock().unwrap(), blocked_source());
    }

    #[tokio::test]
    async fn test_failed_fetch_never_pushes() {
        let fs = Arc::new(FakeFs::unreadable());
        let patcher = patcher(fs.clone(), Arc::new(AlwaysReady));

        assert_eq!(patcher.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(fs.pulls.load(Ordering::SeqCst), 1);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cycle_clean_file_pushes_nothing() {
        let fs = Arc::new(FakeFs::new("def play(self):\n    return sources\n"));
        let patcher = patcher(fs.clone(), Arc::new(AlwaysReady));

        assert_eq!(patcher.run_cycle().await, CycleOutcome::Clean);
        assert_eq!(fs.pushes.load(Ordering::SeqCst), 0);
    }
}
