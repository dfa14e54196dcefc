//! Device construction for the `run` and `sensor` commands.
//!
//! The fingerprint sensor and the relay are driven directly over the serial
//! port and GPIO. Card and QR decoding happen in external helpers, which
//! hand their results to this process as lines on standard input:
//!
//! ```text
//! rfid:04A1B2C3
//! qr:visitor-17
//! ```

use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use latchkey_core::ControllerConfig;
use latchkey_core::config::SerialConfig;
use latchkey_hardware::{
    AnyCredentialSource, ByteTransport, FingerprintDriver, FingerprintSource, OutputPin,
    PinLevel, QrScanner, QrSource, RESET_IDLE_LEVEL, RfidReader, RfidSource,
};
use tracing::{debug, info, warn};

#[cfg(feature = "hardware")]
pub fn open_transport(config: &SerialConfig) -> Result<Box<dyn ByteTransport>> {
    let transport = latchkey_hardware::serial::SerialTransport::open(config)?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "hardware"))]
pub fn open_transport(config: &SerialConfig) -> Result<Box<dyn ByteTransport>> {
    anyhow::bail!(
        "cannot open {}: built without the `hardware` feature",
        config.port
    )
}

#[cfg(feature = "hardware")]
pub fn output_pin(bcm_pin: u8, initial: PinLevel) -> Result<Box<dyn OutputPin>> {
    let pin = latchkey_hardware::gpio::RppalOutputPin::new(bcm_pin, initial)?;
    Ok(Box::new(pin))
}

#[cfg(not(feature = "hardware"))]
pub fn output_pin(bcm_pin: u8, _initial: PinLevel) -> Result<Box<dyn OutputPin>> {
    anyhow::bail!("cannot drive GPIO {bcm_pin}: built without the `hardware` feature")
}

/// Fingerprint driver on the configured serial port and reset line.
pub fn fingerprint_driver(config: &ControllerConfig) -> Result<FingerprintDriver> {
    let transport = open_transport(&config.serial)?;
    let reset = output_pin(config.gpio.reset_pin, RESET_IDLE_LEVEL)?;
    Ok(FingerprintDriver::new(transport)
        .with_reset_pin(reset)
        .with_capture_min_bytes(config.timing.capture_min_bytes))
}

/// Credential sources enabled in `config`, highest priority first.
pub fn credential_sources(
    config: &ControllerConfig,
    feed: &LineFeed,
) -> Result<Vec<AnyCredentialSource>> {
    let mut sources = Vec::new();

    if config.sources.rfid {
        sources.push(RfidSource::new(Box::new(feed.rfid_reader())).into());
    }
    if config.sources.fingerprint {
        sources.push(FingerprintSource::new(fingerprint_driver(config)?).into());
    }
    if config.sources.qr {
        let qr = QrSource::new(Box::new(feed.qr_scanner()))
            .with_frame_interval(config.timing.qr_frame_interval());
        sources.push(qr.into());
    }

    info!(
        rfid = config.sources.rfid,
        fingerprint = config.sources.fingerprint,
        qr = config.sources.qr,
        "credential sources configured"
    );
    Ok(sources)
}

type Slot = Arc<Mutex<Option<String>>>;

fn take(slot: &Slot) -> Option<String> {
    lock(slot).take()
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latest card UID and QR text handed over by the external decoders.
///
/// Each kind keeps only its most recent value.
#[derive(Debug, Clone, Default)]
pub struct LineFeed {
    rfid: Slot,
    qr: Slot,
}

impl LineFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one input line. Returns `false` for lines that are not
    /// `rfid:<uid>` or `qr:<text>`.
    pub fn feed_line(&self, line: &str) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        let (slot, value) = if let Some(uid) = line.strip_prefix("rfid:") {
            (&self.rfid, uid.trim())
        } else if let Some(text) = line.strip_prefix("qr:") {
            (&self.qr, text)
        } else {
            return false;
        };

        if value.is_empty() {
            return false;
        }
        *lock(slot) = Some(value.to_string());
        true
    }

    /// Feed every line of `reader` from a background thread.
    pub fn spawn_reader<R>(&self, reader: R) -> std::thread::JoinHandle<()>
    where
        R: BufRead + Send + 'static,
    {
        let feed = self.clone();
        std::thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) if feed.feed_line(&line) => debug!("credential line accepted"),
                    Ok(line) if line.trim().is_empty() => {}
                    Ok(_) => warn!("ignoring input line without rfid: or qr: prefix"),
                    Err(e) => {
                        warn!(error = %e, "credential input closed");
                        break;
                    }
                }
            }
        })
    }

    pub fn rfid_reader(&self) -> FeedRfidReader {
        FeedRfidReader {
            slot: Arc::clone(&self.rfid),
        }
    }

    pub fn qr_scanner(&self) -> FeedQrScanner {
        FeedQrScanner {
            slot: Arc::clone(&self.qr),
        }
    }
}

#[derive(Debug)]
pub struct FeedRfidReader {
    slot: Slot,
}

impl RfidReader for FeedRfidReader {
    fn poll_uid(&mut self) -> latchkey_hardware::Result<Option<String>> {
        Ok(take(&self.slot))
    }
}

#[derive(Debug)]
pub struct FeedQrScanner {
    slot: Slot,
}

impl QrScanner for FeedQrScanner {
    fn scan_frame(&mut self) -> latchkey_hardware::Result<Option<String>> {
        Ok(take(&self.slot))
    }
}
