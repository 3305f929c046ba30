use crate::header::Header;
use byteorder::{ReadBytesExt, LE};
use goblin::pe::header::{COFF_MACHINE_X86, COFF_MACHINE_X86_64, PE_MAGIC};
use std::io;

/// The PE signature followed by the COFF file header (`IMAGE_FILE_HEADER`).
///
/// The optional header is not decoded.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NtHeader {
    /// `"PE\0\0"`, read little-endian as `0x0000_4550`.
    pub signature: u32,

    /// Target CPU.
    ///
    /// Common values:
    /// - `IMAGE_FILE_MACHINE_I386` (0x014C)
    /// - `IMAGE_FILE_MACHINE_AMD64` (0x8664)
    /// - `IMAGE_FILE_MACHINE_ARM64` (0xAA64)
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

impl NtHeader {
    pub fn is_i386(&self) -> bool {
        self.machine == COFF_MACHINE_X86
    }

    pub fn is_amd64(&self) -> bool {
        self.machine == COFF_MACHINE_X86_64
    }
}

impl Header for NtHeader {
    const SIZE: usize = 24;

    fn from_reader<R: io::Read>(cur: &mut R) -> anyhow::Result<NtHeader> {
        Ok(NtHeader {
            signature: cur.read_u32::<LE>()?,
            machine: cur.read_u16::<LE>()?,
            number_of_sections: cur.read_u16::<LE>()?,
            time_date_stamp: cur.read_u32::<LE>()?,
            pointer_to_symbol_table: cur.read_u32::<LE>()?,
            number_of_symbols: cur.read_u32::<LE>()?,
            size_of_optional_header: cur.read_u16::<LE>()?,
            characteristics: cur.read_u16::<LE>()?,
        })
    }

    fn is_valid(&self) -> bool {
        self.signature == PE_MAGIC
    }

    fn format_name(&self) -> &'static str {
        "NT"
    }
}

/// The PE signature and machine field, the leading six bytes of [`NtHeader`].
///
/// Enough to classify an image whose file header runs past the data read.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NtSignature {
    pub signature: u32,
    pub machine: u16,
}

impl NtSignature {
    pub fn is_i386(&self) -> bool {
        self.machine == COFF_MACHINE_X86
    }

    pub fn is_amd64(&self) -> bool {
        self.machine == COFF_MACHINE_X86_64
    }
}

impl Header for NtSignature {
    const SIZE: usize = 6;

    fn from_reader<R: io::Read>(cur: &mut R) -> anyhow::Result<NtSignature> {
        Ok(NtSignature {
            signature: cur.read_u32::<LE>()?,
            machine: cur.read_u16::<LE>()?,
        })
    }

    fn is_valid(&self) -> bool {
        self.signature == PE_MAGIC
    }

    fn format_name(&self) -> &'static str {
        "NT"
    }
}
