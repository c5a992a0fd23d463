pub mod assembler;
pub mod demux;
pub mod descriptor;
pub mod section;
pub mod vct;

pub use assembler::SectionAssembler;
pub use demux::{Demux, DemuxFlags, SubtableDecoder};
pub use descriptor::Descriptor;
pub use section::PsiSection;
pub use vct::{Vct, VctChannel, VctDecoder};
