use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::adb::{AdbError, AdbTransport};
use crate::kodi::KodiClient;

/// Android component launched when the player app is not running.
const KODI_COMPONENT: &str = "org.xbmc.kodi/.Splash";

/// Discard port; standard target for wake-on-LAN broadcasts.
const WOL_TARGET: &str = "255.255.255.255:9";

#[derive(Error, Debug)]
pub enum WakeError {
    #[error("wake packet failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Adb(#[from] AdbError),
}

/// Reachability of the target device, computed fresh on every request and
/// every patch cycle. Never cached: the box sleeps on its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Asleep,
    Waking,
    Ready,
    Unreachable,
}

/// Low-level wake/keyevent/app-launch channel to the device.
///
/// The gate drives this trait; production uses [`ShieldLink`], tests use a
/// scripted fake.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Is the player's control port answering?
    async fn probe(&self) -> bool;
    /// Wake-on-LAN broadcast.
    async fn send_wake_packet(&self) -> Result<(), WakeError>;
    /// Remote-shell wake key event.
    async fn send_wake_key(&self) -> Result<(), WakeError>;
    /// Force-launch the player app.
    async fn launch_player(&self) -> Result<(), WakeError>;
}

/// Parse "AA:BB:CC:DD:EE:FF" (or '-' separated) into raw bytes.
pub fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return None;
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        if part.len() != 2 {
            return None;
        }
        bytes[i] = u8::from_str_radix(part, 16).ok()?;
    }
    Some(bytes)
}

/// Magic packet: six 0xFF bytes then the MAC sixteen times.
fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0xFFu8; 102];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// Production device link for an Nvidia Shield: Kodi's HTTP port as the
/// liveness probe, wake-on-LAN, and adb for key events and app launch.
pub struct ShieldLink {
    kodi: KodiClient,
    mac: [u8; 6],
    adb: Arc<AdbTransport>,
}

impl ShieldLink {
    pub fn new(kodi: KodiClient, mac: [u8; 6], adb: Arc<AdbTransport>) -> Self {
        Self { kodi, mac, adb }
    }
}

#[async_trait]
impl DeviceLink for ShieldLink {
    async fn probe(&self) -> bool {
        self.kodi.probe().await
    }

    async fn send_wake_packet(&self) -> Result<(), WakeError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.set_broadcast(true)?;
        socket.send_to(&magic_packet(self.mac), WOL_TARGET).await?;
        debug!("wake-on-lan packet sent");
        Ok(())
    }

    async fn send_wake_key(&self) -> Result<(), WakeError> {
        // A single WAKEUP is sometimes swallowed while the box is in deep
        // sleep; the second one lands.
        self.adb.shell(&["input", "keyevent", "WAKEUP"]).await?;
        sleep(Duration::from_millis(500)).await;
        self.adb.shell(&["input", "keyevent", "WAKEUP"]).await?;
        Ok(())
    }

    async fn launch_player(&self) -> Result<(), WakeError> {
        self.adb
            .shell(&["am", "start", "-n", KODI_COMPONENT])
            .await?;
        Ok(())
    }
}

/// Per-step timings of the wake sequence.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Fixed pause after the wake-on-LAN packet, sized to typical NIC
    /// wake-up, not tunable per call.
    pub wol_settle: Duration,
    /// How long to poll after force-launching the player.
    pub boot_window: Duration,
    pub boot_poll: Duration,
    /// Kodi answers HTTP before it can accept RPC calls; let it finish.
    pub post_boot_settle: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            wol_settle: Duration::from_secs(3),
            boot_window: Duration::from_secs(45),
            boot_poll: Duration::from_secs(1),
            post_boot_settle: Duration::from_secs(4),
        }
    }
}

/// Device Reachability Gate: ordered, short-circuiting wake fallbacks.
///
/// Individual step failures are logged and the chain continues; only a
/// fully exhausted chain yields [`DeviceState::Unreachable`].
pub struct ReachabilityGate {
    link: Arc<dyn DeviceLink>,
    config: GateConfig,
}

impl ReachabilityGate {
    pub fn new(link: Arc<dyn DeviceLink>, config: GateConfig) -> Self {
        Self { link, config }
    }

    pub async fn ensure_ready(&self) -> DeviceState {
        // Cheapest check first.
        if self.link.probe().await {
            return DeviceState::Ready;
        }

        info!(state = ?DeviceState::Asleep, "device not answering, starting wake sequence");

        if let Err(e) = self.link.send_wake_packet().await {
            warn!(error = %e, "wake-on-lan failed");
        }
        sleep(self.config.wol_settle).await;

        if self.link.probe().await {
            return DeviceState::Ready;
        }

        debug!(state = ?DeviceState::Waking, "sending wake key event");
        if let Err(e) = self.link.send_wake_key().await {
            warn!(error = %e, "wake key event failed");
        }

        if self.link.probe().await {
            return DeviceState::Ready;
        }

        info!("force-launching player");
        if let Err(e) = self.link.launch_player().await {
            warn!(error = %e, "player launch failed");
        }

        let deadline = Instant::now() + self.config.boot_window;
        while Instant::now() < deadline {
            if self.link.probe().await {
                sleep(self.config.post_boot_settle).await;
                info!("player is up");
                return DeviceState::Ready;
            }
            sleep(self.config.boot_poll).await;
        }

        warn!(state = ?DeviceState::Unreachable, "wake sequence exhausted");
        DeviceState::Unreachable
    }
}
