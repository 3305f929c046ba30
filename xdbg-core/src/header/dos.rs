use crate::header::Header;
use byteorder::{ReadBytesExt, LE};
use goblin::pe::header::DOS_MAGIC;
use std::io;

/// The MS-DOS stub header found at offset zero of every PE image.
///
/// Mirrors `IMAGE_DOS_HEADER`. Only `e_magic` and `e_lfanew` matter to the
/// loader today; the rest is kept so the layout stays 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    /// `"MZ"`, read little-endian as `0x5A4D`.
    pub e_magic: u16,
    pub e_cblp: u16,
    pub e_cp: u16,
    pub e_crlc: u16,
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    pub e_ss: u16,
    pub e_sp: u16,
    pub e_csum: u16,
    pub e_ip: u16,
    pub e_cs: u16,
    pub e_lfarlc: u16,
    pub e_ovno: u16,
    pub e_res: [u16; 4],
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_res2: [u16; 10],

    /// File offset of the NT headers.
    ///
    /// Signed in the on-disk format; a negative value never points anywhere useful.
    pub e_lfanew: i32,
}

impl DosHeader {
    /// Returns `e_lfanew` as an offset if it is non-negative and lies below `limit`.
    pub fn nt_offset(&self, limit: usize) -> Option<usize> {
        usize::try_from(self.e_lfanew)
            .ok()
            .filter(|&offset| offset < limit)
    }
}

impl Header for DosHeader {
    const SIZE: usize = 64;

    fn from_reader<R: io::Read>(cur: &mut R) -> anyhow::Result<DosHeader> {
        let e_magic = cur.read_u16::<LE>()?;
        let e_cblp = cur.read_u16::<LE>()?;
        let e_cp = cur.read_u16::<LE>()?;
        let e_crlc = cur.read_u16::<LE>()?;
        let e_cparhdr = cur.read_u16::<LE>()?;
        let e_minalloc = cur.read_u16::<LE>()?;
        let e_maxalloc = cur.read_u16::<LE>()?;
        let e_ss = cur.read_u16::<LE>()?;
        let e_sp = cur.read_u16::<LE>()?;
        let e_csum = cur.read_u16::<LE>()?;
        let e_ip = cur.read_u16::<LE>()?;
        let e_cs = cur.read_u16::<LE>()?;
        let e_lfarlc = cur.read_u16::<LE>()?;
        let e_ovno = cur.read_u16::<LE>()?;
        let mut e_res = [0u16; 4];
        cur.read_u16_into::<LE>(&mut e_res)?;
        let e_oemid = cur.read_u16::<LE>()?;
        let e_oeminfo = cur.read_u16::<LE>()?;
        let mut e_res2 = [0u16; 10];
        cur.read_u16_into::<LE>(&mut e_res2)?;

        Ok(DosHeader {
            e_magic,
            e_cblp,
            e_cp,
            e_crlc,
            e_cparhdr,
            e_minalloc,
            e_maxalloc,
            e_ss,
            e_sp,
            e_csum,
            e_ip,
            e_cs,
            e_lfarlc,
            e_ovno,
            e_res,
            e_oemid,
            e_oeminfo,
            e_res2,
            e_lfanew: cur.read_i32::<LE>()?,
        })
    }

    fn is_valid(&self) -> bool {
        self.e_magic == DOS_MAGIC
    }

    fn format_name(&self) -> &'static str {
        "DOS"
    }
}
