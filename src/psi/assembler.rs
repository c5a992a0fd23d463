// psi/assembler.rs
//! Reassembles PSI sections from the TS packets of a single PID.

use bytes::BytesMut;

use crate::constants::{MAX_SECTION_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::psi::demux::Demux;
use crate::psi::section::PsiSection;

/// Collects section bytes carried on one PID and feeds every completed
/// section to the demultiplexer. A continuity-counter jump raises the
/// demultiplexer's discontinuity flag before any further section is
/// delivered, so subtable decoders can discard mid-build state.
pub struct SectionAssembler {
    pid: u16,
    buf: BytesMut,
    last_counter: Option<u8>,
    synced: bool,
}

impl SectionAssembler {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            buf: BytesMut::with_capacity(MAX_SECTION_SIZE),
            last_counter: None,
            synced: false,
        }
    }

    /// Feeds one 188-byte TS packet. Packets for other PIDs, packets
    /// without payload and packets flagged with a transport error are
    /// ignored.
    pub fn push_packet(&mut self, demux: &mut Demux, packet: &[u8]) {
        if packet.len() < TS_PACKET_SIZE || packet[0] != TS_SYNC_BYTE {
            return;
        }
        if packet[1] & 0x80 != 0 {
            return; // transport_error_indicator
        }
        let pid = (u16::from(packet[1] & 0x1F) << 8) | u16::from(packet[2]);
        if pid != self.pid {
            return;
        }

        let payload_unit_start = packet[1] & 0x40 != 0;
        let adaptation_field_ctrl = (packet[3] & 0x30) >> 4;
        if adaptation_field_ctrl == 0 || adaptation_field_ctrl == 2 {
            return; // no payload
        }
        let counter = packet[3] & 0x0F;
        let mut offset = 4usize;
        if adaptation_field_ctrl == 3 {
            offset += 1 + packet[4] as usize;
            if offset >= TS_PACKET_SIZE {
                return;
            }
        }

        match self.last_counter {
            Some(last) if last == counter => return, // duplicate packet
            Some(last) if (last + 1) & 0x0F != counter => {
                log::debug!("continuity jump on PID {}", self.pid);
                demux.set_discontinuity();
                self.buf.clear();
                self.synced = false;
            }
            _ => {}
        }
        self.last_counter = Some(counter);

        let payload = &packet[offset..TS_PACKET_SIZE];
        if payload_unit_start {
            let pointer = payload[0] as usize;
            if 1 + pointer > payload.len() {
                return;
            }
            if self.synced && pointer > 0 {
                // Bytes before the pointer target finish the previous section
                self.buf.extend_from_slice(&payload[1..1 + pointer]);
                self.drain_sections(demux);
            }
            self.buf.clear();
            self.buf.extend_from_slice(&payload[1 + pointer..]);
            self.synced = true;
        } else if self.synced {
            self.buf.extend_from_slice(payload);
        } else {
            return;
        }
        self.drain_sections(demux);
    }

    /// Extracts every complete section currently buffered.
    fn drain_sections(&mut self, demux: &mut Demux) {
        loop {
            if self.buf.is_empty() {
                return;
            }
            if self.buf[0] == 0xFF {
                // Stuffing: nothing further until the next unit start
                self.buf.clear();
                self.synced = false;
                return;
            }
            if self.buf.len() < 3 {
                return;
            }
            let section_len =
                3 + ((usize::from(self.buf[1] & 0x0F) << 8) | usize::from(self.buf[2]));
            if self.buf.len() < section_len {
                return;
            }
            let bytes = self.buf.split_to(section_len);
            match PsiSection::parse(&bytes) {
                Ok(section) => demux.push_section(section),
                Err(e) => log::debug!("dropping PSI section on PID {}: {e}", self.pid),
            }
        }
    }
}
