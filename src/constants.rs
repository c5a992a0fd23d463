//! Constants for MPEG-TS and ATSC PSIP processing

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// PID carrying the ATSC PSIP base tables (MGT, VCT, RRT, STT)
pub const ATSC_BASE_PID: u16 = 0x1FFB;

/// PSIP table identifiers
pub const TVCT_TABLE_ID: u8 = 0xC8; // Terrestrial Virtual Channel Table
pub const CVCT_TABLE_ID: u8 = 0xC9; // Cable Virtual Channel Table

/// A PSI table spans at most 256 sections (section_number is 8 bits)
pub const MAX_SECTIONS: usize = 256;

/// Longest private section: 3 header bytes + section_length up to 4093
pub const MAX_SECTION_SIZE: usize = 4096;

/// Fixed part of a VCT channel record, preceding its descriptor loop
pub const VCT_CHANNEL_RECORD_SIZE: usize = 32;
