//! ljbc-core — primitives communes du codec de bytecode LuaJIT
//!
//! Fournit :
//! - `ByteCursor` : buffer extensible avec position lecture/écriture, entiers à
//!   largeur fixe dans un ordre d'octets configurable, codecs ULEB128 et ULEB128_33
//! - `bits` : réinterprétation bit à bit `u64` ↔ `f64`, extension de signe,
//!   découpage en moitiés 32 bits
//! - `CoreError` + alias `CoreResult<T>`, partagés par tout le workspace

#![deny(missing_docs)]

use std::borrow::Cow;

use thiserror::Error;

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Helpers bit à bit (réinterprétation, extension de signe).
pub mod bits;
/// Curseur d'octets extensible.
pub mod cursor;

pub use cursor::{ByteCursor, Endian};

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias de résultat partagé par les crates du codec.
pub type CoreResult<T> = core::result::Result<T, CoreError>;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs du codec. Toutes interrompent l'appel en cours.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Le buffer ne commence pas par `\x1BLJ`.
    #[error("invalid bytecode magic (expected \\x1BLJ)")]
    InvalidFormat,

    /// Version de bytecode autre que 2.
    #[error("unsupported bytecode version {0} (only version 2 is supported)")]
    UnsupportedVersion(u8),

    /// Lecture au-delà de la fin du buffer.
    #[error("out of range: need {needed} bytes at offset {offset} (buffer size {size})")]
    OutOfRange {
        /// Offset de la lecture fautive.
        offset: usize,
        /// Nombre d'octets demandés.
        needed: usize,
        /// Taille logique du buffer.
        size: usize,
    },

    /// Tag de constante générique inconnu.
    #[error("invalid generic constant type {0}")]
    InvalidConstantType(u32),

    /// Tag de valeur de table inconnu.
    #[error("invalid table value type {0}")]
    InvalidTableValueType(u32),

    /// Constante enfant lue sans prototype terminé en attente.
    #[error("prototype stack underflow")]
    PrototypeStackUnderflow,

    /// Flux d'octets structurellement incohérent.
    #[error("corrupted bytecode: {0}")]
    CorruptedBytecode(Cow<'static, str>),

    /// Accès à un opérande que l'opcode ne déclare pas.
    #[error("opcode {opcode} has no operand {operand}")]
    InvalidOperandAccess {
        /// Opcode brut.
        opcode: u8,
        /// Nom de l'opérande (`A`, `B`, `C` ou `D`).
        operand: char,
    },

    /// Les infos de debug ne collent pas au prototype décrit.
    #[error("debug info for {field} has {found} entries, expected {expected}")]
    MissingDebugInfo {
        /// Liste de debug concernée.
        field: &'static str,
        /// Nombre attendu par le prototype.
        expected: usize,
        /// Nombre effectivement présent.
        found: usize,
    },

    /// Graphe construit par l'appelant impossible à écrire en bytecode valide.
    #[error("invalid prototype graph: {0}")]
    InvalidGraph(Cow<'static, str>),

    /// Accès à largeur fixe hors de 1..=4 octets.
    #[error("invalid integer width {0} (expected 1..=4)")]
    InvalidWidth(usize),
}

impl CoreError {
    /// Construit une erreur « bytecode corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { CoreError::CorruptedBytecode(msg.into()) }

    /// Construit une erreur « graphe invalide ».
    pub fn invalid_graph(msg: impl Into<Cow<'static, str>>) -> Self { CoreError::InvalidGraph(msg.into()) }
}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        bits::{f64_from_bits, f64_to_bits, join_u64, normalize_sign, split_u64},
        ByteCursor, CoreError, CoreResult, Endian,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let e = CoreError::OutOfRange { offset: 12, needed: 4, size: 14 };
        assert_eq!(e.to_string(), "out of range: need 4 bytes at offset 12 (buffer size 14)");

        let e = CoreError::InvalidOperandAccess { opcode: 0x12, operand: 'D' };
        assert_eq!(e.to_string(), "opcode 18 has no operand D");
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(CoreError::corrupted("x"), CoreError::CorruptedBytecode(Cow::Borrowed("x")));
        assert!(matches!(CoreError::invalid_graph(String::from("y")), CoreError::InvalidGraph(_)));
    }
}
