// psi/vct.rs
//! ATSC Virtual Channel Table (A/65) subtable decoder.
//!
//! Gathers the sections of one Terrestrial or Cable VCT, follows version
//! changes and TS discontinuities, and publishes every complete table to
//! a callback as an owned [`Vct`].

use serde::Serialize;

use crate::constants::{CVCT_TABLE_ID, MAX_SECTIONS, VCT_CHANNEL_RECORD_SIZE};
use crate::psi::demux::{Demux, DemuxFlags, SubtableDecoder};
use crate::psi::descriptor::{Descriptor, parse_descriptors};
use crate::psi::section::PsiSection;

/// One entry of the VCT channel loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VctChannel {
    /// Channel name, seven UTF-16BE code units.
    pub short_name:        [u16; 7],
    pub major_number:      u16,
    pub minor_number:      u16,
    pub modulation:        u8,
    pub carrier_freq:      u32,
    pub channel_tsid:      u16,
    pub program_number:    u16,
    pub etm_location:      u8,
    pub access_controlled: bool,
    pub hidden:            bool,
    pub path_select:       bool,
    pub out_of_band:       bool,
    pub hide_guide:        bool,
    pub service_type:      u8,
    pub source_id:         u16,
    pub descriptors:       Vec<Descriptor>,
}

impl VctChannel {
    /// Decodes `short_name`, dropping trailing NUL padding.
    pub fn name(&self) -> String {
        let end = self
            .short_name
            .iter()
            .position(|&unit| unit == 0)
            .unwrap_or(self.short_name.len());
        String::from_utf16_lossy(&self.short_name[..end])
    }

    /// Appends a raw descriptor to this channel.
    pub fn push_descriptor(&mut self, tag: u8, data: &[u8]) {
        self.descriptors.push(Descriptor::new(tag, data));
    }
}

/// A fully reassembled Virtual Channel Table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Vct {
    /// PSIP protocol_version, byte 0 of every section payload.
    pub protocol_version: u8,
    /// transport_stream_id, from the section extension field.
    pub ts_id:            u16,
    /// True for a Cable VCT (table_id 0xC9), false for Terrestrial (0xC8).
    pub cable_vct:        bool,
    pub version:          u8,
    pub current_next:     bool,
    pub channels:         Vec<VctChannel>,
    pub descriptors:      Vec<Descriptor>,
}

impl Vct {
    pub fn new(
        protocol_version: u8,
        ts_id: u16,
        cable_vct: bool,
        version: u8,
        current_next: bool,
    ) -> Self {
        Self {
            protocol_version,
            ts_id,
            cable_vct,
            version,
            current_next,
            channels: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Releases the channel and descriptor lists, leaving scalars untouched.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.descriptors.clear();
    }

    /// Appends `channel` at the tail of the channel loop.
    pub fn push_channel(&mut self, channel: VctChannel) {
        self.channels.push(channel);
    }

    /// Appends a table-level descriptor.
    pub fn push_descriptor(&mut self, tag: u8, data: &[u8]) {
        self.descriptors.push(Descriptor::new(tag, data));
    }
}

/// Receives ownership of each published table.
pub type VctCallback = Box<dyn FnMut(Vct)>;

/// Registers a VCT decoder for `(table_id, extension)` with the
/// demultiplexer. `callback` receives ownership of every published
/// table. Fails if the pair already has a subtable decoder.
pub fn attach<F>(
    demux: &mut Demux,
    table_id: u8,
    extension: u16,
    callback: F,
) -> anyhow::Result<()>
where
    F: FnMut(Vct) + 'static,
{
    demux.register(table_id, extension, Box::new(VctDecoder::new(Box::new(callback))))
}

/// Unregisters the decoder for `(table_id, extension)`, dropping any
/// partial build and stored sections. Unknown pairs log an error.
pub fn detach(demux: &mut Demux, table_id: u8, extension: u16) {
    demux.unregister(table_id, extension);
}

/// Reassembly state for one VCT subtable.
///
/// `building` is Some exactly while at least one section slot is
/// occupied; `current` is the last published table, used to recognize
/// duplicates and the activation of a previously-inactive version.
pub struct VctDecoder {
    last_section_number: u8,
    sections:            [Option<PsiSection>; MAX_SECTIONS],
    building:            Option<Vct>,
    current:             Option<Vct>,
    callback:            VctCallback,
}

impl VctDecoder {
    pub fn new(callback: VctCallback) -> Self {
        Self {
            last_section_number: 0,
            sections: [const { None }; MAX_SECTIONS],
            building: None,
            current: None,
            callback,
        }
    }
}

impl SubtableDecoder for VctDecoder {
    fn on_section(&mut self, flags: &mut DemuxFlags, section: PsiSection) {
        if !section.syntax_indicator {
            log::error!("invalid VCT section (section_syntax_indicator == 0)");
            return;
        }

        log::debug!(
            "VCT table version {}, table_id {:#04x}, extension {}, section {} up to {}, current {}",
            section.version,
            section.table_id,
            section.extension,
            section.section_number,
            section.last_section_number,
            section.current_next,
        );

        let mut reinit = false;
        if flags.take_discontinuity() {
            reinit = true;
        } else if let Some(building) = &self.building {
            // Sanity checks against the build in progress
            if building.ts_id != section.extension {
                log::error!(
                    "'transport_stream_id' differs whereas no TS discontinuity has occurred"
                );
                reinit = true;
            } else if building.version != section.version {
                log::error!("'version_number' differs whereas no discontinuity has occurred");
                reinit = true;
            } else if self.last_section_number != section.last_section_number {
                log::error!(
                    "'last_section_number' differs whereas no discontinuity has occurred"
                );
                reinit = true;
            }
        } else if let Some(current) = &mut self.current {
            if current.version == section.version {
                // Signal the stored table again if this version just
                // went active; anything else is a plain duplicate.
                if !current.current_next && section.current_next {
                    current.current_next = true;
                    let published = current.clone();
                    (self.callback)(published);
                }
                return;
            }
        }

        if reinit {
            self.building = None;
            self.current = None;
            for slot in self.sections.iter_mut() {
                *slot = None;
            }
        }

        if self.building.is_none() {
            self.building = Some(Vct::new(
                section.payload.first().copied().unwrap_or(0),
                section.extension,
                section.table_id == CVCT_TABLE_ID,
                section.version,
                section.current_next,
            ));
            self.last_section_number = section.last_section_number;
        }

        let number = section.section_number as usize;
        if self.sections[number].is_some() {
            log::debug!("overwrite VCT section number {number}");
        }
        self.sections[number] = Some(section);

        let complete =
            (0..=self.last_section_number as usize).all(|i| self.sections[i].is_some());
        if !complete {
            return;
        }

        let Some(mut vct) = self.building.take() else {
            return;
        };
        let gathered: Vec<PsiSection> = self.sections[..=self.last_section_number as usize]
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        decode_sections(&mut vct, &gathered);
        for slot in self.sections.iter_mut() {
            *slot = None;
        }

        self.current = Some(vct.clone());
        (self.callback)(vct);
    }
}

/// Walks the payloads of a complete, index-ordered section run and
/// fills `vct` with the channels and descriptors they carry.
fn decode_sections(vct: &mut Vct, sections: &[PsiSection]) {
    for section in sections {
        decode_section(vct, &section.payload);
    }
}

fn decode_section(vct: &mut Vct, payload: &[u8]) {
    if payload.len() < 2 {
        return;
    }
    let num_channels = payload[1] as usize;
    let mut cursor = 2;
    let mut emitted = 0;

    while cursor + 6 < payload.len() && emitted < num_channels {
        if cursor + VCT_CHANNEL_RECORD_SIZE > payload.len() {
            break;
        }
        let record = &payload[cursor..cursor + VCT_CHANNEL_RECORD_SIZE];
        let mut channel = decode_channel_record(record);
        let desc_len = (usize::from(record[30] & 0x03) << 8) | usize::from(record[31]);

        cursor += VCT_CHANNEL_RECORD_SIZE;
        let desc_end = cursor + desc_len;
        if desc_end > payload.len() {
            // Truncated descriptor block ends this section's channel loop
            vct.channels.push(channel);
            break;
        }
        parse_descriptors(&payload[cursor..desc_end], &mut channel.descriptors);
        vct.channels.push(channel);
        cursor = desc_end;
        emitted += 1;
    }

    // Table-level descriptors after the channel loop
    if cursor + 2 > payload.len() {
        return;
    }
    let add_len = (usize::from(payload[cursor] & 0x03) << 8) | usize::from(payload[cursor + 1]);
    cursor += 2;
    let end = (cursor + add_len).min(payload.len());
    parse_descriptors(&payload[cursor..end], &mut vct.descriptors);
}

fn decode_channel_record(record: &[u8]) -> VctChannel {
    let mut short_name = [0u16; 7];
    for (i, unit) in short_name.iter_mut().enumerate() {
        *unit = u16::from_be_bytes([record[2 * i], record[2 * i + 1]]);
    }
    VctChannel {
        short_name,
        major_number: (u16::from(record[14] & 0x0F) << 6) | (u16::from(record[15] & 0xFC) >> 2),
        minor_number: (u16::from(record[15] & 0x03) << 8) | u16::from(record[16]),
        modulation: record[17],
        carrier_freq: u32::from_be_bytes([record[18], record[19], record[20], record[21]]),
        channel_tsid: u16::from_be_bytes([record[22], record[23]]),
        program_number: u16::from_be_bytes([record[24], record[25]]),
        etm_location: (record[26] & 0xC0) >> 6,
        access_controlled: record[26] & 0x20 != 0,
        hidden: record[26] & 0x10 != 0,
        path_select: record[26] & 0x08 != 0,
        out_of_band: record[26] & 0x04 != 0,
        hide_guide: record[26] & 0x02 != 0,
        service_type: record[27] & 0x3F,
        source_id: u16::from_be_bytes([record[28], record[29]]),
        descriptors: Vec::new(),
    }
}
