// psi/section.rs
//! Owned PSI / SI section with CRC-32 (MPEG-2) validation.

use bytes::Bytes;
use crc::{Crc, CRC_32_MPEG_2};

pub(crate) const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// A complete PSI section with its header fields broken out.
///
/// `payload` holds the bytes between the section header and the CRC.
/// Sections without the syntax header (`syntax_indicator == false`) keep
/// their defaulted header fields so a subtable decoder can still reject
/// them with a diagnostic.
#[derive(Clone, Debug)]
pub struct PsiSection {
    pub table_id:            u8,
    pub syntax_indicator:    bool,
    pub extension:           u16,
    pub version:             u8,
    pub current_next:        bool,
    pub section_number:      u8,
    pub last_section_number: u8,
    pub payload:             Bytes,
}

impl PsiSection {
    /// Validates length, header and (for syntax sections) CRC-32.
    pub fn parse(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < 3 { anyhow::bail!("short section header") }

        let table_id = buf[0];
        let syntax_indicator = buf[1] & 0x80 != 0;
        let sec_len = ((buf[1] & 0x0F) as usize) << 8 | buf[2] as usize;
        let end = 3 + sec_len;
        if end > buf.len() { anyhow::bail!("truncated section") }

        if !syntax_indicator {
            // Short section: no syntax header, no CRC
            return Ok(Self {
                table_id,
                syntax_indicator,
                extension:           0,
                version:             0,
                current_next:        false,
                section_number:      0,
                last_section_number: 0,
                payload:             Bytes::copy_from_slice(&buf[3..end]),
            });
        }

        if sec_len < 9 { anyhow::bail!("invalid section_length") }

        let crc_calc = CRC_MPEG.checksum(&buf[..end - 4]);
        let crc_sect = u32::from_be_bytes(buf[end - 4..end].try_into()?);
        if crc_calc != crc_sect {
            anyhow::bail!("CRC-32 mismatch");
        }

        Ok(Self {
            table_id,
            syntax_indicator,
            extension:           u16::from_be_bytes(buf[3..5].try_into()?),
            version:             (buf[5] & 0x3E) >> 1,
            current_next:        buf[5] & 0x01 != 0,
            section_number:      buf[6],
            last_section_number: buf[7],
            payload:             Bytes::copy_from_slice(&buf[8..end - 4]),
        })
    }
}
