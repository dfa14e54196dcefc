//! Credential source implementations.
//!
//! Each source wraps one reader and implements [`CredentialSource`]:
//!
//! | Source | Acquisition | `try_take` |
//! |--------|-------------|------------|
//! | [`FingerprintSource`] | sensor pushes a template in continuous mode | decodes the reply once enough bytes wait |
//! | [`RfidSource`] | none, reader polled directly | polls the reader once |
//! | [`QrSource`] | blocking camera loop on a worker thread | checks the single result slot |

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use latchkey_core::constants::DEFAULT_QR_FRAME_INTERVAL_MS;
use latchkey_core::{CredentialEvent, CredentialKind};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{HardwareError, Result};
use crate::fingerprint::{DriverMode, FingerprintDriver};
use crate::traits::{CredentialSource, QrScanner, RfidReader};

/// Fingerprint sensor in continuous capture mode.
#[derive(Debug)]
pub struct FingerprintSource {
    driver: FingerprintDriver,
}

impl FingerprintSource {
    pub fn new(driver: FingerprintDriver) -> Self {
        Self { driver }
    }

    /// Give the driver back, e.g. for maintenance commands.
    pub fn into_driver(self) -> FingerprintDriver {
        self.driver
    }
}

impl CredentialSource for FingerprintSource {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Fingerprint
    }

    fn is_armed(&self) -> bool {
        self.driver.mode() == DriverMode::Scanning
    }

    async fn arm(&mut self) -> Result<()> {
        self.driver.start_continuous_scan().await
    }

    async fn disarm(&mut self) -> Result<()> {
        self.driver.stop()
    }

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>> {
        let template = self.driver.poll_capture(Duration::ZERO).await?;
        Ok(template.map(|t| CredentialEvent::now(CredentialKind::Fingerprint, t)))
    }
}

/// Contactless card reader.
pub struct RfidSource {
    reader: Box<dyn RfidReader>,
    armed: bool,
}

impl fmt::Debug for RfidSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfidSource")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl RfidSource {
    pub fn new(reader: Box<dyn RfidReader>) -> Self {
        Self {
            reader,
            armed: false,
        }
    }
}

impl CredentialSource for RfidSource {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Rfid
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    async fn arm(&mut self) -> Result<()> {
        self.armed = true;
        Ok(())
    }

    async fn disarm(&mut self) -> Result<()> {
        self.armed = false;
        Ok(())
    }

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>> {
        if !self.armed {
            return Ok(None);
        }
        match self.reader.poll_uid()? {
            Some(uid) if !uid.trim().is_empty() => {
                self.armed = false;
                debug!(%uid, "card read");
                Ok(Some(CredentialEvent::now(
                    CredentialKind::Rfid,
                    uid.trim().as_bytes().to_vec(),
                )))
            }
            _ => Ok(None),
        }
    }
}

struct QrTask {
    stop: Arc<AtomicBool>,
    result: oneshot::Receiver<String>,
    handle: JoinHandle<Box<dyn QrScanner>>,
    finished: bool,
}

/// Camera-based QR reader.
///
/// Frames are captured on a blocking worker so a slow camera never stalls
/// the coordinator. The worker stops after the first decoded code or when
/// the stop flag is raised, and hands the scanner back when joined.
pub struct QrSource {
    scanner: Option<Box<dyn QrScanner>>,
    task: Option<QrTask>,
    frame_interval: Duration,
}

impl fmt::Debug for QrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrSource")
            .field("running", &self.task.is_some())
            .field("frame_interval", &self.frame_interval)
            .finish_non_exhaustive()
    }
}

impl QrSource {
    pub fn new(scanner: Box<dyn QrScanner>) -> Self {
        Self {
            scanner: Some(scanner),
            task: None,
            frame_interval: Duration::from_millis(DEFAULT_QR_FRAME_INTERVAL_MS),
        }
    }

    /// Pause between camera frames.
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Stop the worker, wait for it to exit and take the scanner back.
    ///
    /// Any result the worker produced but nobody took is dropped with it.
    async fn reclaim(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.stop.store(true, Ordering::Release);
        drop(task.result);

        match task.handle.await {
            Ok(scanner) => {
                self.scanner = Some(scanner);
                debug!("qr capture worker stopped");
                Ok(())
            }
            Err(e) => Err(HardwareError::disconnected(format!(
                "qr scanner worker failed: {e}"
            ))),
        }
    }
}

impl CredentialSource for QrSource {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Qr
    }

    fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.finished)
    }

    async fn arm(&mut self) -> Result<()> {
        self.reclaim().await?;
        let mut scanner = self
            .scanner
            .take()
            .ok_or_else(|| HardwareError::disconnected("qr scanner"))?;

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let interval = self.frame_interval;
        let worker_stop = Arc::clone(&stop);

        let handle = tokio::task::spawn_blocking(move || {
            while !worker_stop.load(Ordering::Acquire) {
                match scanner.scan_frame() {
                    Ok(Some(code)) if !code.is_empty() => {
                        let _ = tx.send(code);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "qr frame capture failed"),
                }
                std::thread::sleep(interval);
            }
            scanner
        });

        self.task = Some(QrTask {
            stop,
            result: rx,
            handle,
            finished: false,
        });
        info!("qr capture armed");
        Ok(())
    }

    async fn disarm(&mut self) -> Result<()> {
        self.reclaim().await
    }

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>> {
        let Some(task) = self.task.as_mut() else {
            return Ok(None);
        };
        if task.finished {
            return Ok(None);
        }
        match task.result.try_recv() {
            Ok(code) => {
                task.finished = true;
                debug!(%code, "qr code decoded");
                Ok(Some(CredentialEvent::now(
                    CredentialKind::Qr,
                    code.into_bytes(),
                )))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => {
                task.finished = true;
                warn!("qr capture worker exited without a result");
                Ok(None)
            }
        }
    }
}

impl Drop for QrSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.as_ref() {
            task.stop.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockQrScanner, MockRfidReader, MockTransport};

    async fn take_within(source: &mut QrSource, attempts: usize) -> Option<CredentialEvent> {
        for _ in 0..attempts {
            if let Some(event) = source.try_take().await.unwrap() {
                return Some(event);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_rfid_source_yields_once_per_card() {
        let (reader, handle) = MockRfidReader::new();
        let mut source = RfidSource::new(Box::new(reader));

        handle.present("04A1B2C3");
        assert!(source.try_take().await.unwrap().is_none(), "disarmed source must not read");
        assert_eq!(handle.polls(), 0);

        source.arm().await.unwrap();
        let event = source.try_take().await.unwrap().unwrap();
        assert_eq!(event.kind(), CredentialKind::Rfid);
        assert_eq!(event.payload(), b"04A1B2C3");
        assert!(!source.is_armed());
        assert!(source.try_take().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rfid_source_ignores_blank_uid() {
        let (reader, handle) = MockRfidReader::new();
        let mut source = RfidSource::new(Box::new(reader));
        source.arm().await.unwrap();

        handle.present("   ");
        assert!(source.try_take().await.unwrap().is_none());
        assert!(source.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fingerprint_source_arms_driver() {
        let (transport, handle) = MockTransport::new();
        let mut source = FingerprintSource::new(FingerprintDriver::new(Box::new(transport)));

        source.arm().await.unwrap();
        assert!(source.is_armed());
        assert_eq!(handle.writes().len(), 1);

        source.disarm().await.unwrap();
        assert!(!source.is_armed());
        assert_eq!(handle.writes()[1][1], 0x2C);
    }

    #[tokio::test]
    async fn test_qr_source_delivers_code() {
        let (scanner, handle) = MockQrScanner::new();
        let mut source = QrSource::new(Box::new(scanner)).with_frame_interval(Duration::from_millis(1));

        source.arm().await.unwrap();
        assert!(source.is_armed());
        handle.show("visitor-17");

        let event = take_within(&mut source, 200).await.unwrap();
        assert_eq!(event.kind(), CredentialKind::Qr);
        assert_eq!(event.payload(), b"visitor-17");
        assert!(!source.is_armed());

        // Re-arming reclaims the finished worker's scanner.
        source.arm().await.unwrap();
        assert!(source.is_armed());
        source.disarm().await.unwrap();
    }

    #[tokio::test]
    async fn test_qr_disarm_waits_for_worker_and_discards_result() {
        let (scanner, handle) = MockQrScanner::new();
        let mut source = QrSource::new(Box::new(scanner)).with_frame_interval(Duration::from_millis(1));

        source.arm().await.unwrap();
        handle.show("late-code");
        tokio::time::sleep(Duration::from_millis(50)).await;

        source.disarm().await.unwrap();
        assert!(!source.is_armed());
        assert!(source.try_take().await.unwrap().is_none());

        // The worker is gone: no more frames are captured.
        let frames = handle.frames();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.frames(), frames);
    }

    #[tokio::test]
    async fn test_qr_frame_errors_keep_scanning() {
        let (scanner, handle) = MockQrScanner::new();
        let mut source = QrSource::new(Box::new(scanner)).with_frame_interval(Duration::from_millis(1));

        handle.fail_frames(true);
        source.arm().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(source.try_take().await.unwrap().is_none());

        handle.fail_frames(false);
        handle.show("after-glitch");
        let event = take_within(&mut source, 200).await.unwrap();
        assert_eq!(event.payload(), b"after-glitch");
    }

    #[tokio::test]
    async fn test_qr_worker_panic_surfaces_as_disconnected() {
        let (scanner, handle) = MockQrScanner::new();
        let mut source = QrSource::new(Box::new(scanner)).with_frame_interval(Duration::from_millis(1));

        handle.panic_next_frame();
        source.arm().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(source.try_take().await.unwrap().is_none());
        assert!(!source.is_armed());
        assert!(matches!(
            source.arm().await,
            Err(HardwareError::Disconnected { .. })
        ));
    }
}
