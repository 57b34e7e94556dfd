//! ljbc-format — dumps de bytecode LuaJIT (version 2) : modèle, décodeur, encodeur
//!
//! Format :
//! ```text
//! Header : "\x1BLJ" + version u8 (=2) + flags ULEB128
//!          [chunk name : ULEB128 len + bytes]          (sans STRIP_DEBUG)
//! [Prototype*] 0x00
//!   prototype = ULEB128 len + body
//!   body = flags u8, args u8, maxslot u8, #uv u8, #kgc, #kn, #ins (ULEB128)
//!          [dbgsize ULEB128 [firstline, numline ULEB128]] (sans STRIP_DEBUG)
//!          ins u32 * #ins, uv u16 * #uv
//!          kgc * #kgc (ordre inverse), kn ULEB128_33 * #kn (ordre inverse)
//!          [debug : lines, upvalue names, locals, 0x00]
//! ```
//!
//! Les enfants précèdent leur parent sur le fil ; une constante `Child`
//! réclame le dernier prototype terminé.
//!
//! API :
//! - `Script::from_bytes()` / `Script::to_bytes()`
//! - `Decoder::with_opcodes()` / `Encoder::with_opcodes()` pour une table d'opcodes maison

#![deny(missing_docs)]

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Constantes génériques et numériques.
pub mod constant;
/// Octets → script.
pub mod decoder;
/// Script → octets.
pub mod encoder;
/// Mots d'instruction.
pub mod instruction;
/// Table des capacités d'opcodes.
pub mod opcode;
/// Prototypes et infos de debug.
pub mod prototype;
/// En-tête du dump et arbre des prototypes.
pub mod script;
/// Littéraux de table.
pub mod table;
/// Descripteurs d'upvalue.
pub mod upvalue;

pub use constant::{Complex, GenericConstant, GenericConstantType, NumberConstant};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use instruction::Instruction;
pub use ljbc_core::{CoreError, CoreResult};
pub use opcode::{LuaJitOpcodes, OpcodeTable, OperandSlots};
pub use prototype::{DebugInfo, LocalVar, ProtoPath, Prototype, PrototypeFlags, SpecialVar, VarName};
pub use script::{Script, ScriptFlags, MAGIC, VERSION};
pub use table::{Table, TableValue, TableValueType};
pub use upvalue::Upvalue;

/* ─────────────────────────── Prélude ─────────────────────────── */

/// Prélude pratique : re-exports compacts.
pub mod prelude {
    /// Modèle, codec et types d'erreur.
    pub use super::{
        CoreError, CoreResult, Decoder, Encoder, GenericConstant, Instruction, LuaJitOpcodes, NumberConstant,
        OpcodeTable, Prototype, Script, ScriptFlags, Table, TableValue,
    };
}
