//! Table des capacités d'opcodes : quels champs d'opérande porte un opcode.
//!
//! Le codec a seulement besoin de savoir, par opcode, si les champs A, B, C
//! et D du mot de 32 bits ont un sens. Cette information passe par
//! [`OpcodeTable`] ; [`LuaJitOpcodes`] est la table du bytecode version 2.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Champs d'opérande déclarés par un opcode.
///
/// `c` et `d` partagent les bits 16..32 du mot : au plus un des deux est posé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperandSlots {
    /// Bits 8..16.
    pub a: bool,
    /// Bits 24..32.
    pub b: bool,
    /// Bits 16..24.
    pub c: bool,
    /// Bits 16..32.
    pub d: bool,
}

impl OperandSlots {
    /// Aucun opérande.
    pub const NONE: Self = Self { a: false, b: false, c: false, d: false };
    /// A seul.
    pub const A: Self = Self { a: true, b: false, c: false, d: false };
    /// D seul.
    pub const D: Self = Self { a: false, b: false, c: false, d: true };
    /// A et D.
    pub const AD: Self = Self { a: true, b: false, c: false, d: true };
    /// A, B et C.
    pub const ABC: Self = Self { a: true, b: true, c: true, d: false };

    /// Déduit les champs des trois modes d'opérande d'une définition d'opcode.
    #[must_use]
    pub const fn from_modes(a: bool, b: bool, cd: bool) -> Self {
        Self { a, b, c: b && cd, d: !b && cd }
    }
}

/// Requête de capacités consultée par le décodeur (et l'outillage).
pub trait OpcodeTable {
    /// Champs d'opérande valides pour `opcode`.
    fn operand_slots(&self, opcode: u8) -> OperandSlots;

    /// Nom lisible, si la table en connaît un.
    fn mnemonic(&self, opcode: u8) -> Option<&'static str> {
        let _ = opcode;
        None
    }
}

/// Jeu d'opcodes du bytecode version 2, dans l'ordre de numérotation.
///
/// Un opcode inconnu rapporte [`OperandSlots::AD`], qui couvre tous les bits
/// au-dessus de l'octet d'opcode : l'instruction se ré-encode à l'identique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LuaJitOpcodes;

const Y: bool = true;
const N: bool = false;

/// `(mnémonique, A utilisé, B utilisé, C/D utilisé)`
const OPCODES: [(&str, bool, bool, bool); 97] = [
    // comparaisons
    ("ISLT", Y, N, Y),
    ("ISGE", Y, N, Y),
    ("ISLE", Y, N, Y),
    ("ISGT", Y, N, Y),
    ("ISEQV", Y, N, Y),
    ("ISNEV", Y, N, Y),
    ("ISEQS", Y, N, Y),
    ("ISNES", Y, N, Y),
    ("ISEQN", Y, N, Y),
    ("ISNEN", Y, N, Y),
    ("ISEQP", Y, N, Y),
    ("ISNEP", Y, N, Y),
    // test unaire et copie
    ("ISTC", Y, N, Y),
    ("ISFC", Y, N, Y),
    ("IST", N, N, Y),
    ("ISF", N, N, Y),
    ("ISTYPE", Y, N, Y),
    ("ISNUM", Y, N, Y),
    // unaires
    ("MOV", Y, N, Y),
    ("NOT", Y, N, Y),
    ("UNM", Y, N, Y),
    ("LEN", Y, N, Y),
    // binaires
    ("ADDVN", Y, Y, Y),
    ("SUBVN", Y, Y, Y),
    ("MULVN", Y, Y, Y),
    ("DIVVN", Y, Y, Y),
    ("MODVN", Y, Y, Y),
    ("ADDNV", Y, Y, Y),
    ("SUBNV", Y, Y, Y),
    ("MULNV", Y, Y, Y),
    ("DIVNV", Y, Y, Y),
    ("MODNV", Y, Y, Y),
    ("ADDVV", Y, Y, Y),
    ("SUBVV", Y, Y, Y),
    ("MULVV", Y, Y, Y),
    ("DIVVV", Y, Y, Y),
    ("MODVV", Y, Y, Y),
    ("POW", Y, Y, Y),
    ("CAT", Y, Y, Y),
    // constantes
    ("KSTR", Y, N, Y),
    ("KCDATA", Y, N, Y),
    ("KSHORT", Y, N, Y),
    ("KNUM", Y, N, Y),
    ("KPRI", Y, N, Y),
    ("KNIL", Y, N, Y),
    // upvalues et closures
    ("UGET", Y, N, Y),
    ("USETV", Y, N, Y),
    ("USETS", Y, N, Y),
    ("USETN", Y, N, Y),
    ("USETP", Y, N, Y),
    ("UCLO", Y, N, Y),
    ("FNEW", Y, N, Y),
    // tables
    ("TNEW", Y, N, Y),
    ("TDUP", Y, N, Y),
    ("GGET", Y, N, Y),
    ("GSET", Y, N, Y),
    ("TGETV", Y, Y, Y),
    ("TGETS", Y, Y, Y),
    ("TGETB", Y, Y, Y),
    ("TGETR", Y, Y, Y),
    ("TSETV", Y, Y, Y),
    ("TSETS", Y, Y, Y),
    ("TSETB", Y, Y, Y),
    ("TSETM", Y, N, Y),
    ("TSETR", Y, Y, Y),
    // appels et varargs
    ("CALLM", Y, Y, Y),
    ("CALL", Y, Y, Y),
    ("CALLMT", Y, N, Y),
    ("CALLT", Y, N, Y),
    ("ITERC", Y, Y, Y),
    ("ITERN", Y, Y, Y),
    ("VARG", Y, Y, Y),
    ("ISNEXT", Y, N, Y),
    // retours
    ("RETM", Y, N, Y),
    ("RET", Y, N, Y),
    ("RET0", Y, N, Y),
    ("RET1", Y, N, Y),
    // boucles et branchements
    ("FORI", Y, N, Y),
    ("JFORI", Y, N, Y),
    ("FORL", Y, N, Y),
    ("IFORL", Y, N, Y),
    ("JFORL", Y, N, Y),
    ("ITERL", Y, N, Y),
    ("IITERL", Y, N, Y),
    ("JITERL", Y, N, Y),
    ("LOOP", Y, N, Y),
    ("ILOOP", Y, N, Y),
    ("JLOOP", Y, N, Y),
    ("JMP", Y, N, Y),
    // en-têtes de fonction
    ("FUNCF", Y, N, N),
    ("IFUNCF", Y, N, N),
    ("JFUNCF", Y, N, Y),
    ("FUNCV", Y, N, N),
    ("IFUNCV", Y, N, N),
    ("JFUNCV", Y, N, Y),
    ("FUNCC", Y, N, N),
    ("FUNCCW", Y, N, N),
];

impl LuaJitOpcodes {
    /// Nombre d'opcodes connus de la table.
    pub const COUNT: usize = OPCODES.len();

    /// Cherche un opcode par mnémonique (sensible à la casse).
    #[must_use]
    pub fn opcode(name: &str) -> Option<u8> {
        OPCODES.iter().position(|(n, ..)| *n == name).and_then(|ix| u8::try_from(ix).ok())
    }
}

impl OpcodeTable for LuaJitOpcodes {
    fn operand_slots(&self, opcode: u8) -> OperandSlots {
        OPCODES
            .get(usize::from(opcode))
            .map_or(OperandSlots::AD, |&(_, a, b, cd)| OperandSlots::from_modes(a, b, cd))
    }

    fn mnemonic(&self, opcode: u8) -> Option<&'static str> {
        OPCODES.get(usize::from(opcode)).map(|(name, ..)| *name)
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_matches_version_2() {
        assert_eq!(LuaJitOpcodes::COUNT, 97);
        assert_eq!(LuaJitOpcodes::opcode("ISLT"), Some(0));
        assert_eq!(LuaJitOpcodes::opcode("MOV"), Some(18));
        assert_eq!(LuaJitOpcodes::opcode("KSTR"), Some(39));
        assert_eq!(LuaJitOpcodes::opcode("FNEW"), Some(51));
        assert_eq!(LuaJitOpcodes::opcode("CALL"), Some(66));
        assert_eq!(LuaJitOpcodes::opcode("RET0"), Some(75));
        assert_eq!(LuaJitOpcodes::opcode("JMP"), Some(88));
        assert_eq!(LuaJitOpcodes::opcode("FUNCCW"), Some(96));
        assert_eq!(LuaJitOpcodes::opcode("NOPE"), None);
    }

    #[test]
    fn slot_layouts() {
        let t = LuaJitOpcodes;
        let op = |name| LuaJitOpcodes::opcode(name).unwrap();
        assert_eq!(t.operand_slots(op("ADDVV")), OperandSlots::ABC);
        assert_eq!(t.operand_slots(op("KSHORT")), OperandSlots::AD);
        assert_eq!(t.operand_slots(op("IST")), OperandSlots::D);
        assert_eq!(t.operand_slots(op("FUNCF")), OperandSlots::A);
        assert_eq!(t.mnemonic(op("GGET")), Some("GGET"));
    }

    #[test]
    fn c_and_d_never_both() {
        let t = LuaJitOpcodes;
        for opcode in 0..=u8::MAX {
            let s = t.operand_slots(opcode);
            assert!(!(s.c && s.d), "opcode {opcode}");
        }
    }

    #[test]
    fn unknown_opcode_keeps_every_bit() {
        assert_eq!(LuaJitOpcodes.operand_slots(200), OperandSlots::AD);
        assert_eq!(LuaJitOpcodes.mnemonic(200), None);
    }
}
