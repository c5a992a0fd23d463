// psi/demux.rs
//! Subtable demultiplexer: routes sections by (table_id, extension).

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::psi::section::PsiSection;

/// TS-layer state handed to subtable decoders while they gather.
#[derive(Default)]
pub struct DemuxFlags {
    discontinuity: bool,
}

impl DemuxFlags {
    /// Marks a transport-stream discontinuity. Set by the TS layer.
    pub fn set_discontinuity(&mut self) {
        self.discontinuity = true;
    }

    /// Read-and-clear accessor for the discontinuity flag.
    pub fn take_discontinuity(&mut self) -> bool {
        std::mem::take(&mut self.discontinuity)
    }
}

/// A decoder gathering the sections of one subtable.
pub trait SubtableDecoder {
    fn on_section(&mut self, flags: &mut DemuxFlags, section: PsiSection);
}

/// Routes completed sections to the decoder registered for their
/// `(table_id, table_id_extension)` pair. Sections with no registered
/// decoder are dropped.
#[derive(Default)]
pub struct Demux {
    flags: DemuxFlags,
    subdecoders: HashMap<(u8, u16), Box<dyn SubtableDecoder>>,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the TS layer when continuity counters jumped.
    pub fn set_discontinuity(&mut self) {
        self.flags.set_discontinuity();
    }

    /// Registers `decoder` under `(table_id, extension)`. Fails without
    /// touching the registry if the pair already has a decoder.
    pub fn register(
        &mut self,
        table_id: u8,
        extension: u16,
        decoder: Box<dyn SubtableDecoder>,
    ) -> anyhow::Result<()> {
        match self.subdecoders.entry((table_id, extension)) {
            Entry::Occupied(_) => anyhow::bail!(
                "already a decoder for (table_id == {table_id:#04x}, extension == {extension:#06x})"
            ),
            Entry::Vacant(slot) => {
                slot.insert(decoder);
                Ok(())
            }
        }
    }

    /// Removes the decoder for `(table_id, extension)`, dropping any
    /// state it holds. Unknown pairs log an error and do nothing.
    pub fn unregister(&mut self, table_id: u8, extension: u16) {
        if self.subdecoders.remove(&(table_id, extension)).is_none() {
            log::error!(
                "no subtable decoder for (table_id == {table_id:#04x}, extension == {extension:#06x})"
            );
        }
    }

    /// Hands `section` to the decoder registered for it, if any.
    pub fn push_section(&mut self, section: PsiSection) {
        let key = (section.table_id, section.extension);
        if let Some(decoder) = self.subdecoders.get_mut(&key) {
            decoder.on_section(&mut self.flags, section);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingDecoder(Rc<RefCell<usize>>);

    impl SubtableDecoder for CountingDecoder {
        fn on_section(&mut self, _flags: &mut DemuxFlags, _section: PsiSection) {
            *self.0.borrow_mut() += 1;
        }
    }

    fn section(table_id: u8, extension: u16) -> PsiSection {
        PsiSection {
            table_id,
            syntax_indicator: true,
            extension,
            version: 0,
            current_next: true,
            section_number: 0,
            last_section_number: 0,
            payload: Bytes::new(),
        }
    }

    #[test]
    fn routes_by_table_id_and_extension() {
        let mut demux = Demux::new();
        let count = Rc::new(RefCell::new(0));
        demux
            .register(0xC8, 1, Box::new(CountingDecoder(Rc::clone(&count))))
            .unwrap();

        demux.push_section(section(0xC8, 1));
        demux.push_section(section(0xC8, 2));
        demux.push_section(section(0xC9, 1));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut demux = Demux::new();
        let count = Rc::new(RefCell::new(0));
        demux
            .register(0xC8, 1, Box::new(CountingDecoder(Rc::clone(&count))))
            .unwrap();
        assert!(
            demux
                .register(0xC8, 1, Box::new(CountingDecoder(Rc::clone(&count))))
                .is_err()
        );

        // The original decoder is still attached
        demux.push_section(section(0xC8, 1));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut demux = Demux::new();
        demux.unregister(0xC8, 42);
    }

    #[test]
    fn unregister_stops_routing() {
        let mut demux = Demux::new();
        let count = Rc::new(RefCell::new(0));
        demux
            .register(0xC8, 1, Box::new(CountingDecoder(Rc::clone(&count))))
            .unwrap();
        demux.unregister(0xC8, 1);
        demux.push_section(section(0xC8, 1));
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn discontinuity_flag_clears_on_read() {
        let mut flags = DemuxFlags::default();
        assert!(!flags.take_discontinuity());
        flags.set_discontinuity();
        assert!(flags.take_discontinuity());
        assert!(!flags.take_discontinuity());
    }
}
