use crate::header::{DosHeader, Header, NtSignature};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// How much of a file the probe looks at. Headers placed beyond this window
/// are reported as [`Arch::Invalid`].
pub const PROBE_WINDOW: usize = 0x1000;

/// Outcome of probing a file for its target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    /// The file could not be opened or read.
    NotFound,
    /// The file was read but is not a recognised x86/x64 PE image.
    Invalid,
    X32,
    X64,
}

impl Arch {
    pub fn is_executable(self) -> bool {
        matches!(self, Arch::X32 | Arch::X64)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Arch::NotFound => "not found",
            Arch::Invalid => "invalid",
            Arch::X32 => "x32",
            Arch::X64 => "x64",
        };
        write!(f, "{}", name)
    }
}

/// Reads the first [`PROBE_WINDOW`] bytes of `path` and classifies them.
///
/// Never fails: open and read errors become [`Arch::NotFound`], anything that
/// doesn't parse becomes [`Arch::Invalid`].
pub fn probe_architecture<P: AsRef<Path>>(path: P) -> Arch {
    let path = path.as_ref();
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("{}: open failed: {}", path.display(), e);
            return Arch::NotFound;
        }
    };

    let file_size = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::debug!("{}: metadata failed: {}", path.display(), e);
            return Arch::NotFound;
        }
    };
    let read_size = file_size.min(PROBE_WINDOW as u64);

    let mut data = Vec::with_capacity(read_size as usize);
    if let Err(e) = file.take(read_size).read_to_end(&mut data) {
        log::debug!("{}: read failed: {}", path.display(), e);
        return Arch::NotFound;
    }

    let arch = classify(&data);
    log::debug!("{}: {} ({} bytes read)", path.display(), arch, data.len());
    arch
}

/// Classifies a header prefix, as read by [`probe_architecture`].
///
/// Only bytes that are actually present are looked at: a DOS header, or an NT
/// signature and machine field, running past the end of `data` makes the
/// image invalid. The rest of the file header may lie beyond it.
pub fn classify(data: &[u8]) -> Arch {
    let Some(dos) = DosHeader::at(data, 0) else {
        log::trace!("short read ({} bytes) for DOS header", data.len());
        return Arch::Invalid;
    };
    if !dos.is_valid() {
        log::trace!("bad {} magic {:#06x}", dos.format_name(), dos.e_magic);
        return Arch::Invalid;
    }

    let Some(nt_offset) = dos.nt_offset(data.len()) else {
        log::trace!("e_lfanew {:#x} outside {} bytes", dos.e_lfanew, data.len());
        return Arch::Invalid;
    };
    let Some(nt) = NtSignature::at(data, nt_offset) else {
        log::trace!("NT signature at {:#x} truncated", nt_offset);
        return Arch::Invalid;
    };
    if !nt.is_valid() {
        log::trace!("bad {} signature {:#010x}", nt.format_name(), nt.signature);
        return Arch::Invalid;
    }

    if nt.is_i386() {
        Arch::X32
    } else if nt.is_amd64() {
        Arch::X64
    } else {
        log::trace!("unsupported machine {:#06x}", nt.machine);
        Arch::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(lfanew: u32, machine: u16, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[0..2].copy_from_slice(b"MZ");
        bytes[0x3c..0x40].copy_from_slice(&lfanew.to_le_bytes());
        let nt = lfanew as usize;
        if nt + 6 <= len {
            bytes[nt..nt + 4].copy_from_slice(b"PE\0\0");
            bytes[nt + 4..nt + 6].copy_from_slice(&machine.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn i386_is_x32() {
        assert_eq!(classify(&image(0x80, 0x14c, 0x200)), Arch::X32);
    }

    #[test]
    fn amd64_is_x64() {
        assert_eq!(classify(&image(0x80, 0x8664, 0x200)), Arch::X64);
    }

    #[test]
    fn arm64_is_invalid() {
        assert_eq!(classify(&image(0x80, 0xaa64, 0x200)), Arch::Invalid);
    }

    #[test]
    fn empty_is_invalid() {
        assert_eq!(classify(&[]), Arch::Invalid);
    }

    #[test]
    fn wrong_dos_magic_is_invalid() {
        let mut bytes = image(0x80, 0x8664, 0x200);
        bytes[0] = b'Z';
        assert_eq!(classify(&bytes), Arch::Invalid);
    }

    #[test]
    fn negative_lfanew_is_invalid() {
        let mut bytes = image(0x80, 0x8664, 0x200);
        bytes[0x3c..0x40].copy_from_slice(&(-0x40i32).to_le_bytes());
        assert_eq!(classify(&bytes), Arch::Invalid);
    }

    #[test]
    fn lfanew_at_end_of_data_is_invalid() {
        assert_eq!(classify(&image(0x200, 0x8664, 0x200)), Arch::Invalid);
    }

    #[test]
    fn file_header_cut_by_window_still_classifies() {
        // Signature and machine fit, the rest of the file header does not.
        assert_eq!(classify(&image(0x1f0, 0x8664, 0x200)), Arch::X64);
        assert_eq!(classify(&image(0x1fa, 0x14c, 0x200)), Arch::X32);
    }

    #[test]
    fn machine_cut_by_window_is_invalid() {
        let mut bytes = image(0x1fa, 0x8664, 0x200);
        bytes.truncate(0x1ff);
        assert_eq!(classify(&bytes), Arch::Invalid);
        assert_eq!(classify(&image(0x1fc, 0x8664, 0x200)), Arch::Invalid);
    }

    #[test]
    fn wrong_nt_signature_is_invalid() {
        let mut bytes = image(0x80, 0x14c, 0x200);
        bytes[0x80..0x84].copy_from_slice(b"NE\0\0");
        assert_eq!(classify(&bytes), Arch::Invalid);
    }

    #[test]
    fn display_names() {
        assert_eq!(Arch::NotFound.to_string(), "not found");
        assert_eq!(Arch::X64.to_string(), "x64");
        assert!(Arch::X32.is_executable());
        assert!(!Arch::Invalid.is_executable());
    }
}
