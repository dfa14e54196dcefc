//! Fingerprint sensor maintenance commands.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use latchkey_core::constants::{IMAGE_HEIGHT, IMAGE_WIDTH};
use latchkey_hardware::{FingerprintDriver, unpack_image};
use latchkey_protocol::AckCode;
use tracing::info;

#[derive(Subcommand, Debug, Clone)]
pub enum SensorCommand {
    /// Enroll a user with three finger captures
    Enroll {
        /// User id (1-4095)
        #[arg(long)]
        id: u16,
        /// Privilege level (1-3)
        #[arg(long, default_value_t = 1)]
        privilege: u8,
    },
    /// Delete one enrolled user
    Delete {
        #[arg(long)]
        id: u16,
    },
    /// Delete every enrolled user
    DeleteAll,
    /// Match a live finger against all enrolled users
    Identify,
    /// Match a live finger against one enrolled user
    Verify {
        #[arg(long)]
        id: u16,
    },
    /// Capture a finger's eigenvalues and save them
    CaptureEigen {
        #[arg(default_value = "eigenvalue.bin")]
        path: PathBuf,
    },
    /// Capture a finger image and save it as a grayscale PGM
    CaptureImage {
        #[arg(default_value = "finger_image.pgm")]
        path: PathBuf,
    },
    /// Compare a live finger against saved eigenvalues
    CompareEigen { path: PathBuf },
    /// Download the stored eigenvalues of a user
    UserEigen {
        #[arg(long)]
        id: u16,
        /// Output file; defaults to user_<id>_eigen.bin
        path: Option<PathBuf>,
    },
}

/// Reset the sensor, then run `command` on a blocking thread.
pub async fn run(mut driver: FingerprintDriver, command: SensorCommand) -> Result<()> {
    driver.hardware_reset().await?;
    tokio::task::spawn_blocking(move || execute(&mut driver, &command))
        .await
        .context("sensor command panicked")?
}

fn execute(driver: &mut FingerprintDriver, command: &SensorCommand) -> Result<()> {
    match command {
        SensorCommand::Enroll { id, privilege } => {
            let ack = driver.enroll_user(*id, *privilege, |step| {
                println!("Place finger on the sensor (capture {step}/3)");
            })?;
            report("Enrollment", ack);
        }
        SensorCommand::Delete { id } => report("Delete", driver.delete_user(*id)?),
        SensorCommand::DeleteAll => report("Delete all", driver.delete_all()?),
        SensorCommand::Identify => {
            println!("Place finger to identify...");
            match driver.identify()? {
                Some(found) => println!(
                    "Identified user {} with privilege {}",
                    found.user_id, found.privilege
                ),
                None => println!("No match found"),
            }
        }
        SensorCommand::Verify { id } => {
            println!("Place finger for verification against user {id}");
            report("Verification", driver.compare_one_to_one(*id)?);
        }
        SensorCommand::CaptureEigen { path } => {
            println!("Place finger for eigenvalue capture...");
            let eigenvalues = driver.capture_eigenvalues()?;
            write_file(path, &eigenvalues)?;
            println!("Saved {} bytes of eigenvalues to {}", eigenvalues.len(), path.display());
        }
        SensorCommand::CaptureImage { path } => {
            println!("Place finger for image capture...");
            let raw = driver.capture_image()?;
            let pixels = unpack_image(&raw, IMAGE_WIDTH, IMAGE_HEIGHT)?;
            write_file(path, &pgm(&pixels, IMAGE_WIDTH, IMAGE_HEIGHT))?;
            println!("Saved {IMAGE_WIDTH}x{IMAGE_HEIGHT} image to {}", path.display());
        }
        SensorCommand::CompareEigen { path } => {
            let eigenvalues =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            println!(
                "Loaded {} bytes of eigenvalues. Place finger for comparison.",
                eigenvalues.len()
            );
            report("Comparison", driver.download_and_compare(&eigenvalues)?);
        }
        SensorCommand::UserEigen { id, path } => {
            let eigenvalues = driver.upload_user_eigenvalues(*id)?;
            let path = path
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("user_{id}_eigen.bin")));
            write_file(&path, &eigenvalues)?;
            println!(
                "Saved {} bytes of eigenvalues for user {id} to {}",
                eigenvalues.len(),
                path.display()
            );
        }
    }

    driver.stop()?;
    Ok(())
}

fn report(operation: &str, ack: AckCode) {
    info!(operation, %ack, "sensor command finished");
    if ack.is_success() {
        println!("{operation}: success");
    } else {
        println!("{operation}: {ack} (0x{:02X})", u8::from(ack));
    }
}

/// Binary PGM (P5) image of 8-bit grayscale pixels.
fn pgm(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut image = format!("P5\n{width} {height}\n255\n").into_bytes();
    image.extend_from_slice(pixels);
    image
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pgm_header() {
        let image = pgm(&[0x10, 0x20, 0x30, 0x40], 2, 2);
        assert_eq!(&image[..11], b"P5\n2 2\n255\n");
        assert_eq!(&image[11..], &[0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_write_file_creates_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eigen.bin");
        write_file(&path, &[1, 2, 3]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }
}
