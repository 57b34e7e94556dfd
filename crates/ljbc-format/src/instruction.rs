//! Mot d'instruction 32 bits décodé.
//!
//! Disposition : `| B:8 | C:8 | A:8 | OP:8 |` avec `D:16` superposé à `B|C`.

use ljbc_core::{CoreError, CoreResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::opcode::{OpcodeTable, OperandSlots};

/// Une instruction : opcode plus les champs d'opérande qu'il déclare.
///
/// Les champs déclarés sont capturés à la construction ; chaque accesseur
/// les vérifie et échoue sinon avec `InvalidOperandAccess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    opcode: u8,
    slots: OperandSlots,
    a: u8,
    b: u8,
    c: u8,
    d: u16,
}

impl Instruction {
    /// Instruction vide (tous les opérandes déclarés à zéro).
    #[must_use]
    pub const fn new(opcode: u8, slots: OperandSlots) -> Self {
        Self { opcode, slots, a: 0, b: 0, c: 0, d: 0 }
    }

    /// Instruction vide dont les champs viennent de `table`.
    pub fn with_table(opcode: u8, table: &dyn OpcodeTable) -> Self { Self::new(opcode, table.operand_slots(opcode)) }

    /// Découpe un mot brut en ne gardant que les opérandes déclarés par l'opcode.
    pub fn from_word(word: u32, table: &dyn OpcodeTable) -> Self {
        let opcode = (word & 0xFF) as u8;
        let slots = table.operand_slots(opcode);
        let mut ins = Self::new(opcode, slots);
        if slots.a {
            ins.a = ((word >> 8) & 0xFF) as u8;
        }
        if slots.b {
            ins.b = ((word >> 24) & 0xFF) as u8;
        }
        if slots.c {
            ins.c = ((word >> 16) & 0xFF) as u8;
        }
        if slots.d {
            ins.d = ((word >> 16) & 0xFFFF) as u16;
        }
        ins
    }

    /// Recompose le mot de l'instruction.
    #[must_use]
    pub fn to_word(&self) -> u32 {
        let mut word = u32::from(self.opcode);
        if self.slots.a {
            word |= u32::from(self.a) << 8;
        }
        if self.slots.b {
            word |= u32::from(self.b) << 24;
        }
        if self.slots.c {
            word |= u32::from(self.c) << 16;
        }
        if self.slots.d {
            word |= u32::from(self.d) << 16;
        }
        word
    }

    /// Opcode brut.
    pub const fn opcode(&self) -> u8 { self.opcode }

    /// Champs d'opérande déclarés.
    pub const fn slots(&self) -> OperandSlots { self.slots }

    /// Opérande A.
    pub fn a(&self) -> CoreResult<u8> { self.check(self.slots.a, 'A').map(|()| self.a) }
    /// Opérande B.
    pub fn b(&self) -> CoreResult<u8> { self.check(self.slots.b, 'B').map(|()| self.b) }
    /// Opérande C.
    pub fn c(&self) -> CoreResult<u8> { self.check(self.slots.c, 'C').map(|()| self.c) }
    /// Opérande D.
    pub fn d(&self) -> CoreResult<u16> { self.check(self.slots.d, 'D').map(|()| self.d) }

    /// Fixe l'opérande A.
    pub fn set_a(&mut self, v: u8) -> CoreResult<()> {
        self.check(self.slots.a, 'A')?;
        self.a = v;
        Ok(())
    }

    /// Fixe l'opérande B.
    pub fn set_b(&mut self, v: u8) -> CoreResult<()> {
        self.check(self.slots.b, 'B')?;
        self.b = v;
        Ok(())
    }

    /// Fixe l'opérande C.
    pub fn set_c(&mut self, v: u8) -> CoreResult<()> {
        self.check(self.slots.c, 'C')?;
        self.c = v;
        Ok(())
    }

    /// Fixe l'opérande D.
    pub fn set_d(&mut self, v: u16) -> CoreResult<()> {
        self.check(self.slots.d, 'D')?;
        self.d = v;
        Ok(())
    }

    fn check(&self, declared: bool, operand: char) -> CoreResult<()> {
        if declared { Ok(()) } else { Err(CoreError::InvalidOperandAccess { opcode: self.opcode, operand }) }
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
