//! BLE scanner abstraction for RuuviTag devices.
//!
//! Backends deliver [`RawAdvertisement`]s through a channel; decoding and
//! vendor filtering happen downstream in the dispatcher. The BlueZ and raw HCI
//! backends are compiled in through cargo features, the mock backend is always
//! available.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

pub mod mock;

use crate::advertisement::RawAdvertisement;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Ruuvi Innovations manufacturer ID as it appears on air (little-endian).
#[cfg(feature = "bluer")]
pub const RUUVI_MANUFACTURER_ID_BYTES: [u8; 2] = crate::decoder::RUUVI_MANUFACTURER_ID.to_le_bytes();

/// Bluetooth manufacturer-specific data type (AD type 0xFF)
pub const MANUFACTURER_DATA_TYPE: u8 = 0xff;

/// Channel buffer size for raw advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// How often the mock backend emits a round of advertisements.
pub const MOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
    /// Synthetic advertisements from a few virtual tags, no radio needed
    Mock,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(all(feature = "hci", not(feature = "bluer")))]
        return Backend::Hci;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        return Backend::Mock;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            Backend::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            "mock" => Ok(Backend::Mock),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Start scanning for advertisements using the specified backend.
///
/// This is the main entry point for creating a scanner. It dispatches to the
/// appropriate backend implementation based on the `backend` parameter.
///
/// # Arguments
/// * `backend` - The scanner backend to use
/// * `hci_index` - Adapter index, `0` for `hci0`; ignored by the mock backend
///
/// # Returns
/// A receiver of raw advertisements. The channel closes when the backend stops.
pub async fn start_scan(
    backend: Backend,
    hci_index: u16,
) -> Result<mpsc::Receiver<RawAdvertisement>, ScanError> {
    #[cfg(not(any(feature = "bluer", feature = "hci")))]
    let _ = hci_index;

    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan(hci_index).await,
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan(hci_index).await,
        Backend::Mock => Ok(mock::start_scan(MOCK_INTERVAL)),
    }
}
