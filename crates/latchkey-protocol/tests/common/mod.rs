//! Helpers shared by the protocol integration tests.

#![allow(dead_code)]

use latchkey_core::constants::SENTINEL;
use latchkey_protocol::{CommandCode, checksum};

/// All commands the sensor understands.
pub const ALL_COMMANDS: [CommandCode; 12] = [
    CommandCode::AddFingerprint1,
    CommandCode::AddFingerprint2,
    CommandCode::AddFingerprint3,
    CommandCode::DeleteUser,
    CommandCode::DeleteAll,
    CommandCode::CompareOneToOne,
    CommandCode::CompareOneToN,
    CommandCode::UploadEigenvalues,
    CommandCode::UploadImage,
    CommandCode::Sleep,
    CommandCode::UploadUserEigenvalues,
    CommandCode::DownloadEigenCompare,
];

/// Build a response header the way the sensor does.
pub fn response_header(command: u8, q1: u8, q2: u8, q3: u8) -> Vec<u8> {
    let mut frame = vec![SENTINEL, command, q1, q2, q3, 0x00, 0x00, SENTINEL];
    frame[6] = checksum(&frame[1..6]);
    frame
}

/// Indices of an encoded data command that are not sentinels.
pub fn non_sentinel_positions(frame_len: usize) -> Vec<usize> {
    (0..frame_len)
        .filter(|&i| i != 0 && i != 7 && i != 8 && i != frame_len - 1)
        .collect()
}
