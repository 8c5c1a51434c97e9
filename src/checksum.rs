use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::ValidatorError;

const BUF_SIZE: usize = 4096;

/// Compute the MD5 of a file as lowercase hex, reading in fixed-size chunks
/// so multi-gigabyte FASTQ files never sit in memory whole.
pub fn md5_of_file(path: &Path) -> Result<String, ValidatorError> {
    let mut file = File::open(path)
        .map_err(|err| ValidatorError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|err| ValidatorError::Filesystem(format!("read {}: {err}", path.display())))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
