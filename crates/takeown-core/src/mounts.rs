//! Mount point enumeration, used by `list` when the caller gives no path:
//! every delegation on the system is potentially relevant, not just the
//! caller's current volume.

use std::fs;
use std::path::PathBuf;

use crate::error::CoreError;

const PROC_MOUNTS: &str = "/proc/mounts";

/// Every mounted filesystem's mount point, in `/proc/mounts` order.
pub fn list_mountpoints() -> Result<Vec<PathBuf>, CoreError> {
    let contents =
        fs::read_to_string(PROC_MOUNTS).map_err(|e| CoreError::from_io("read", PROC_MOUNTS, e))?;
    Ok(contents.lines().filter_map(parse_mountpoint).collect())
}

fn parse_mountpoint(line: &str) -> Option<PathBuf> {
    let raw = line.split_whitespace().nth(1)?;
    Some(PathBuf::from(unescape_octal(raw)))
}

/// `/proc/mounts` escapes space, tab, backslash and newline as `\NNN` octal.
fn unescape_octal(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(code) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or(""), 8) {
                out.push(code as char);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_mount_line() {
        let line = "tmpfs /run tmpfs rw,nosuid,size=1630452k 0 0";
        assert_eq!(parse_mountpoint(line), Some(PathBuf::from("/run")));
    }

    #[test]
    fn unescapes_octal_space_in_mountpoint() {
        let line = "/dev/sdb1 /mnt/my\\040drive ext4 rw 0 0";
        assert_eq!(parse_mountpoint(line), Some(PathBuf::from("/mnt/my drive")));
    }
}
