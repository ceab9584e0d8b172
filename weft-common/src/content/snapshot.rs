//! Immutable, indexed view of all content relevant to one unit of work
//!
//! Built once from the entity collections the cataloging service supplies,
//! then shared read-only across every concurrent fabrication worker.
//! Lookups the craft pipeline needs (by id, by type, bindings in offset
//! order) are indexed at construction; nothing mutates afterward.

use std::collections::HashMap;

use uuid::Uuid;

use super::{
    Instrument, InstrumentAudio, InstrumentMode, InstrumentType, Program, ProgramType, Sequence,
    SequenceBinding,
};

/// Read-only content snapshot for one work unit
#[derive(Debug, Clone, Default)]
pub struct ContentSnapshot {
    programs: HashMap<Uuid, Program>,
    sequences: HashMap<Uuid, Sequence>,
    bindings: HashMap<Uuid, SequenceBinding>,
    instruments: HashMap<Uuid, Instrument>,
    audios: HashMap<Uuid, InstrumentAudio>,

    programs_by_type: HashMap<ProgramType, Vec<Uuid>>,
    bindings_by_program: HashMap<Uuid, Vec<Uuid>>,
    instruments_by_slot: HashMap<(InstrumentType, InstrumentMode), Vec<Uuid>>,
    audios_by_instrument: HashMap<Uuid, Vec<Uuid>>,
}

impl ContentSnapshot {
    /// Build the snapshot and its indexes from entity collections
    pub fn new(
        programs: Vec<Program>,
        sequences: Vec<Sequence>,
        bindings: Vec<SequenceBinding>,
        instruments: Vec<Instrument>,
        audios: Vec<InstrumentAudio>,
    ) -> Self {
        let mut snapshot = Self::default();

        for program in programs {
            snapshot
                .programs_by_type
                .entry(program.program_type)
                .or_default()
                .push(program.id);
            snapshot.programs.insert(program.id, program);
        }

        for sequence in sequences {
            snapshot.sequences.insert(sequence.id, sequence);
        }

        for binding in bindings {
            snapshot
                .bindings_by_program
                .entry(binding.program_id)
                .or_default()
                .push(binding.id);
            snapshot.bindings.insert(binding.id, binding);
        }
        // bindings are consumed in offset order
        for ids in snapshot.bindings_by_program.values_mut() {
            ids.sort_by_key(|id| snapshot.bindings[id].offset);
        }

        for instrument in instruments {
            snapshot
                .instruments_by_slot
                .entry((instrument.instrument_type, instrument.mode))
                .or_default()
                .push(instrument.id);
            snapshot.instruments.insert(instrument.id, instrument);
        }

        for audio in audios {
            snapshot
                .audios_by_instrument
                .entry(audio.instrument_id)
                .or_default()
                .push(audio.id);
            snapshot.audios.insert(audio.id, audio);
        }

        snapshot
    }

    pub fn program(&self, id: Uuid) -> Option<&Program> {
        self.programs.get(&id)
    }

    pub fn sequence(&self, id: Uuid) -> Option<&Sequence> {
        self.sequences.get(&id)
    }

    pub fn binding(&self, id: Uuid) -> Option<&SequenceBinding> {
        self.bindings.get(&id)
    }

    pub fn instrument(&self, id: Uuid) -> Option<&Instrument> {
        self.instruments.get(&id)
    }

    pub fn audio(&self, id: Uuid) -> Option<&InstrumentAudio> {
        self.audios.get(&id)
    }

    /// All programs of the given type, in indexed order
    pub fn programs_of_type(&self, program_type: ProgramType) -> Vec<&Program> {
        self.programs_by_type
            .get(&program_type)
            .map(|ids| ids.iter().map(|id| &self.programs[id]).collect())
            .unwrap_or_default()
    }

    /// A program's bindings in ascending offset order
    pub fn bindings_of_program(&self, program_id: Uuid) -> Vec<&SequenceBinding> {
        self.bindings_by_program
            .get(&program_id)
            .map(|ids| ids.iter().map(|id| &self.bindings[id]).collect())
            .unwrap_or_default()
    }

    /// The binding at a specific offset within a program, if any
    pub fn binding_at_offset(&self, program_id: Uuid, offset: u32) -> Option<&SequenceBinding> {
        self.bindings_of_program(program_id)
            .into_iter()
            .find(|b| b.offset == offset)
    }

    /// All instruments serving one (type, mode) slot
    pub fn instruments_of(
        &self,
        instrument_type: InstrumentType,
        mode: InstrumentMode,
    ) -> Vec<&Instrument> {
        self.instruments_by_slot
            .get(&(instrument_type, mode))
            .map(|ids| ids.iter().map(|id| &self.instruments[id]).collect())
            .unwrap_or_default()
    }

    /// All audios belonging to an instrument
    pub fn audios_of_instrument(&self, instrument_id: Uuid) -> Vec<&InstrumentAudio> {
        self.audios_by_instrument
            .get(&instrument_id)
            .map(|ids| ids.iter().map(|id| &self.audios[id]).collect())
            .unwrap_or_default()
    }

    /// Entity counts for startup logging
    pub fn summary(&self) -> String {
        format!(
            "{} programs, {} sequences, {} bindings, {} instruments, {} audios",
            self.programs.len(),
            self.sequences.len(),
            self.bindings.len(),
            self.instruments.len(),
            self.audios.len()
        )
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    fn program(program_type: ProgramType) -> Program {
        Program {
            id: Uuid::new_v4(),
            name: "Test".into(),
            program_type,
            key: "C".into(),
            tempo: 120.0,
            density: 0.5,
            memes: vec![],
        }
    }

    fn binding(program_id: Uuid, sequence_id: Uuid, offset: u32) -> SequenceBinding {
        SequenceBinding {
            id: Uuid::new_v4(),
            program_id,
            sequence_id,
            offset,
            memes: vec![],
        }
    }

    #[test]
    fn test_programs_indexed_by_type() {
        let main = program(ProgramType::Main);
        let main_id = main.id;
        let macro_p = program(ProgramType::Macro);

        let snapshot = ContentSnapshot::new(vec![main, macro_p], vec![], vec![], vec![], vec![]);

        let mains = snapshot.programs_of_type(ProgramType::Main);
        assert_eq!(mains.len(), 1);
        assert_eq!(mains[0].id, main_id);
        assert!(snapshot.programs_of_type(ProgramType::Rhythm).is_empty());
    }

    #[test]
    fn test_bindings_sorted_by_offset() {
        let p = program(ProgramType::Main);
        let pid = p.id;
        let sid = Uuid::new_v4();
        let b2 = binding(pid, sid, 2);
        let b0 = binding(pid, sid, 0);
        let b1 = binding(pid, sid, 1);

        let snapshot = ContentSnapshot::new(vec![p], vec![], vec![b2, b0, b1], vec![], vec![]);

        let offsets: Vec<u32> = snapshot
            .bindings_of_program(pid)
            .iter()
            .map(|b| b.offset)
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(snapshot.binding_at_offset(pid, 1).unwrap().offset, 1);
        assert!(snapshot.binding_at_offset(pid, 9).is_none());
    }

    #[test]
    fn test_missing_entities_yield_empty_not_error() {
        let snapshot = ContentSnapshot::default();
        assert!(snapshot.program(Uuid::new_v4()).is_none());
        assert!(snapshot.audios_of_instrument(Uuid::new_v4()).is_empty());
        assert!(snapshot
            .instruments_of(InstrumentType::Rhythm, InstrumentMode::Loop)
            .is_empty());
    }
}
