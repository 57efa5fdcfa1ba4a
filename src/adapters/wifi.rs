//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for the network link.
//! Association is non-blocking: [`associate`](LinkPort::associate) starts it
//! and the connectivity manager polls [`link_status`](LinkPort::link_status).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: a simulated access point for host-side tests.

use core::net::Ipv4Addr;
use log::{info, warn};

use crate::app::ports::{LinkPort, LinkStatus};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    sys::EspError,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Simulated access point
// ───────────────────────────────────────────────────────────────

/// Network the simulation backend pretends is in range.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimAccessPoint {
    pub ssid: String,
    pub password: String,
    pub rssi: i32,
    pub address: Ipv4Addr,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    associating: bool,

    #[cfg(not(target_os = "espidf"))]
    access_point: Option<SimAccessPoint>,
    #[cfg(not(target_os = "espidf"))]
    status: LinkStatus,
    /// Simulation: counts associate() calls.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Bring up the STA driver.  No association happens until
    /// [`associate`](LinkPort::associate).
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, None)?;
        info!("WiFi: STA driver ready");
        Ok(Self {
            wifi,
            associating: false,
        })
    }

    fn platform_associate(&mut self, ssid: &str, password: &str) -> Result<(), EspError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let mut client = ClientConfiguration {
            auth_method,
            ..Default::default()
        };
        // The driver caps the SSID at 32 bytes and the password at 64.
        if client.ssid.push_str(ssid).is_err() || client.password.push_str(password).is_err() {
            warn!("WiFi: credentials exceed driver limits");
        }

        if self.wifi.is_started()? {
            // Drop any stale association before switching networks.
            let _ = self.wifi.disconnect();
        }
        self.wifi.set_configuration(&Configuration::Client(client))?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// No access point in range.
    pub fn new() -> Self {
        Self {
            access_point: None,
            status: LinkStatus::Idle,
            sim_connect_counter: 0,
        }
    }

    pub fn with_access_point(access_point: SimAccessPoint) -> Self {
        Self {
            access_point: Some(access_point),
            ..Self::new()
        }
    }

    /// Simulate the AP vanishing or the radio losing sync.
    pub fn drop_link(&mut self) {
        if self.status == LinkStatus::Connected {
            warn!("WiFi(sim): link dropped");
            self.status = LinkStatus::ConnectionLost;
        }
    }

    pub fn connect_attempts(&self) -> u32 {
        self.sim_connect_counter
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    #[cfg(target_os = "espidf")]
    fn associate(&mut self, ssid: &str, password: &str) {
        info!("WiFi: connecting to '{}'", ssid);
        match self.platform_associate(ssid, password) {
            Ok(()) => self.associating = true,
            Err(e) => {
                warn!("WiFi: connect request failed ({})", e);
                self.associating = false;
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn associate(&mut self, ssid: &str, password: &str) {
        info!("WiFi: connecting to '{}'", ssid);
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        self.status = match &self.access_point {
            Some(ap) if ap.ssid == ssid && ap.password == password => {
                info!(
                    "WiFi(sim): connected to '{}' (attempt {})",
                    ssid, self.sim_connect_counter
                );
                LinkStatus::Connected
            }
            Some(ap) if ap.ssid == ssid => LinkStatus::ConnectFailed,
            _ => LinkStatus::NoSsidAvailable,
        };
    }

    #[cfg(target_os = "espidf")]
    fn link_status(&self) -> LinkStatus {
        let associated = self.wifi.is_connected().unwrap_or(false);
        let has_address = self.wifi.sta_netif().is_up().unwrap_or(false);
        match (associated, has_address) {
            (true, true) => LinkStatus::Connected,
            _ if !self.associating => LinkStatus::Idle,
            _ => LinkStatus::Disconnected,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn link_status(&self) -> LinkStatus {
        self.status
    }

    #[cfg(target_os = "espidf")]
    fn rssi(&self) -> i32 {
        // SAFETY: plain FFI query into a zeroed out-parameter.
        let mut record: esp_idf_svc::sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut record) };
        if ret == esp_idf_svc::sys::ESP_OK {
            i32::from(record.rssi)
        } else {
            0
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn rssi(&self) -> i32 {
        match (&self.access_point, self.status) {
            (Some(ap), LinkStatus::Connected) => ap.rssi,
            _ => 0,
        }
    }

    #[cfg(target_os = "espidf")]
    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    #[cfg(not(target_os = "espidf"))]
    fn local_ip(&self) -> Option<Ipv4Addr> {
        match (&self.access_point, self.status) {
            (Some(ap), LinkStatus::Connected) => Some(ap.address),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
