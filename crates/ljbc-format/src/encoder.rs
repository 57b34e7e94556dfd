//! [`Script`] → octets.
//!
//! Miroir du décodeur : les enfants sont écrits avant leur parent, chaque
//! corps de prototype est construit dans son propre curseur puis inséré
//! derrière une longueur ULEB128, et les constantes partent de la dernière
//! à la première.

use ljbc_core::bits::{f64_to_bits, split_u64};
use ljbc_core::{ByteCursor, CoreError, CoreResult, Endian};
use tracing::{debug, trace};

use crate::constant::{GenericConstant, NumberConstant};
use crate::opcode::{LuaJitOpcodes, OpcodeTable};
use crate::prototype::{DebugInfo, ProtoPath, Prototype, VarName};
use crate::script::{Script, ScriptFlags, MAGIC, VERSION};
use crate::table::{Table, TableValue};
use crate::upvalue::Upvalue;

/// Encodeur de bytecode.
#[derive(Clone, Copy)]
pub struct Encoder<'t> {
    opcodes: &'t dyn OpcodeTable,
}

impl Default for Encoder<'static> {
    fn default() -> Self { Self::new() }
}

impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result { f.debug_struct("Encoder").finish_non_exhaustive() }
}

impl Encoder<'static> {
    /// Encodeur vérifiant les instructions contre [`LuaJitOpcodes`].
    #[must_use]
    pub fn new() -> Self { Self { opcodes: &LuaJitOpcodes } }
}

impl<'t> Encoder<'t> {
    /// Encodeur vérifiant les instructions contre `opcodes`.
    #[must_use]
    pub fn with_opcodes(opcodes: &'t dyn OpcodeTable) -> Self { Self { opcodes } }

    /// Encode un dump complet.
    pub fn encode(&self, script: &Script) -> CoreResult<Vec<u8>> {
        if script.version() != VERSION {
            return Err(CoreError::UnsupportedVersion(script.version()));
        }
        let endian = if script.flags.contains(ScriptFlags::BIG_ENDIAN) { Endian::Big } else { Endian::Little };
        let with_debug = script.has_debug();

        let mut out = ByteCursor::new().with_endian(endian);
        out.write_bytes(&MAGIC);
        out.write_u8(VERSION);
        out.write_uleb128(script.flags.bits());
        if with_debug {
            write_len(&mut out, script.chunk_name.len(), "chunk name")?;
            out.write_bytes(&script.chunk_name);
        }

        self.write_prototype(&mut out, &script.root, &ProtoPath::root(), with_debug)?;
        out.write_u8(0);

        debug!(flags = script.flags.bits(), bytes = out.len(), chunk = %String::from_utf8_lossy(&script.chunk_name), "bytecode encoded");
        Ok(out.into_vec())
    }

    /* ───────────── prototype ───────────── */

    fn write_prototype(&self, out: &mut ByteCursor, proto: &Prototype, path: &ProtoPath, with_debug: bool) -> CoreResult<()> {
        for ix in child_order(proto, path)? {
            self.write_prototype(out, &proto.children[ix], &path.child(ix), with_debug)?;
        }

        let endian = out.endian();
        let mut body = ByteCursor::new().with_endian(endian);
        body.write_u8(proto.flags.bits());
        body.write_u8(proto.args);
        body.write_u8(proto.max_slot);
        let upvalues = u8::try_from(proto.upvalues.len())
            .map_err(|_| CoreError::invalid_graph(format!("{path}: {} upvalues (max 255)", proto.upvalues.len())))?;
        body.write_u8(upvalues);
        write_len(&mut body, proto.constants.len(), "constant count")?;
        write_len(&mut body, proto.numbers.len(), "number count")?;
        write_len(&mut body, proto.code.len(), "instruction count")?;

        let debug_block = match (&proto.debug, with_debug) {
            (Some(info), true) => Some((info, write_debug(proto, info, path, endian)?)),
            _ => None,
        };
        if with_debug {
            match &debug_block {
                Some((info, block)) => {
                    write_len(&mut body, block.len(), "debug block")?;
                    body.write_uleb128(info.first_line);
                    body.write_uleb128(info.line_count);
                }
                None => body.write_uleb128(0),
            }
        }

        for (pc, ins) in proto.code.iter().enumerate() {
            let declared = self.opcodes.operand_slots(ins.opcode());
            if ins.slots() != declared {
                return Err(CoreError::invalid_graph(format!(
                    "{path}: instruction {pc} (opcode {}) carries operands {:?}, opcode table declares {:?}",
                    ins.opcode(),
                    ins.slots(),
                    declared
                )));
            }
            body.write_u32(ins.to_word());
        }

        for (ix, uv) in proto.upvalues.iter().enumerate() {
            if uv.index > Upvalue::MAX_INDEX {
                return Err(CoreError::invalid_graph(format!("{path}: upvalue {ix} index {} exceeds 14 bits", uv.index)));
            }
            body.write_u16(uv.packed());
        }

        for k in proto.constants.iter().rev() {
            write_constant(&mut body, k)?;
        }
        for n in proto.numbers.iter().rev() {
            write_number(&mut body, *n);
        }

        if let Some((_, block)) = &debug_block {
            body.write_cursor(block);
        }

        trace!(
            path = %path,
            size = body.len(),
            instructions = proto.code.len(),
            constants = proto.constants.len(),
            numbers = proto.numbers.len(),
            "prototype"
        );
        write_len(out, body.len(), "prototype")?;
        out.write_cursor(&body);
        Ok(())
    }
}

/// Indices d'enfants dans l'ordre de déclaration des constantes `Child`.
///
/// Le décodeur dépile le dernier enfant écrit pour la première constante
/// `Child` lue, qui est la dernière déclarée : cet ordre restitue l'arbre.
fn child_order(proto: &Prototype, path: &ProtoPath) -> CoreResult<Vec<usize>> {
    let mut seen = vec![false; proto.children.len()];
    let mut order = Vec::with_capacity(proto.children.len());
    for k in &proto.constants {
        let GenericConstant::Child(ix) = *k else { continue };
        match seen.get(ix).copied() {
            None => {
                return Err(CoreError::invalid_graph(format!(
                    "{path}: child constant {ix} out of range ({} children)",
                    proto.children.len()
                )))
            }
            Some(true) => return Err(CoreError::invalid_graph(format!("{path}: child {ix} referenced twice"))),
            Some(false) => seen[ix] = true,
        }
        order.push(ix);
    }
    if let Some(ix) = seen.iter().position(|s| !s) {
        return Err(CoreError::invalid_graph(format!("{path}: child {ix} has no constant referencing it")));
    }
    Ok(order)
}

fn write_len(out: &mut ByteCursor, len: usize, what: &'static str) -> CoreResult<()> {
    let len = u32::try_from(len).map_err(|_| CoreError::invalid_graph(format!("{what} length {len} exceeds 32 bits")))?;
    out.write_uleb128(len);
    Ok(())
}

fn write_tag(out: &mut ByteCursor, tag: u64) -> CoreResult<()> {
    let tag = u32::try_from(tag).map_err(|_| CoreError::invalid_graph("string constant too long"))?;
    out.write_uleb128(tag);
    Ok(())
}

fn write_u64_halves(out: &mut ByteCursor, value: u64) {
    let (lo, hi) = split_u64(value);
    out.write_uleb128(lo);
    out.write_uleb128(hi);
}

/* ───────────── constants ───────────── */

fn write_constant(out: &mut ByteCursor, k: &GenericConstant) -> CoreResult<()> {
    write_tag(out, k.tag())?;
    match k {
        GenericConstant::Child(_) => {}
        GenericConstant::Table(t) => write_table(out, t)?,
        GenericConstant::Int64(v) => write_u64_halves(out, *v as u64),
        GenericConstant::Uint64(v) => write_u64_halves(out, *v),
        GenericConstant::Complex(c) => {
            write_u64_halves(out, f64_to_bits(c.re));
            write_u64_halves(out, f64_to_bits(c.im));
        }
        GenericConstant::Str(s) => out.write_bytes(s),
    }
    Ok(())
}

fn write_number(out: &mut ByteCursor, n: NumberConstant) {
    match n {
        NumberConstant::Int(v) => out.write_uleb128_33(false, v as u32),
        NumberConstant::Float(f) => {
            let (lo, hi) = split_u64(f64_to_bits(f));
            out.write_uleb128_33(true, lo);
            out.write_uleb128(hi);
        }
    }
}

fn write_table(out: &mut ByteCursor, t: &Table) -> CoreResult<()> {
    write_len(out, t.array().len(), "table array")?;
    write_len(out, t.dictionary().len(), "table dictionary")?;
    for v in t.array() {
        write_table_value(out, v)?;
    }
    for (k, v) in t.dictionary() {
        write_table_value(out, k)?;
        write_table_value(out, v)?;
    }
    Ok(())
}

fn write_table_value(out: &mut ByteCursor, v: &TableValue) -> CoreResult<()> {
    write_tag(out, v.tag())?;
    match v {
        TableValue::Nil | TableValue::False | TableValue::True => {}
        TableValue::Int32(i) => out.write_uleb128(*i as u32),
        TableValue::Int64(i) => write_u64_halves(out, *i as u64),
        TableValue::Str(s) => out.write_bytes(s),
    }
    Ok(())
}

/* ───────────── debug ───────────── */

fn write_debug(proto: &Prototype, info: &DebugInfo, path: &ProtoPath, endian: Endian) -> CoreResult<ByteCursor> {
    if info.lines.len() != proto.code.len() {
        return Err(CoreError::MissingDebugInfo { field: "lines", expected: proto.code.len(), found: info.lines.len() });
    }
    if info.upvalue_names.len() != proto.upvalues.len() {
        return Err(CoreError::MissingDebugInfo {
            field: "upvalue names",
            expected: proto.upvalues.len(),
            found: info.upvalue_names.len(),
        });
    }

    let mut block = ByteCursor::new().with_endian(endian);

    let width = info.line_width();
    let limit = if width >= 4 { u64::from(u32::MAX) } else { (1u64 << (width * 8)) - 1 };
    for (pc, line) in info.lines.iter().enumerate() {
        if u64::from(*line) > limit {
            return Err(CoreError::invalid_graph(format!(
                "{path}: line offset {line} at instruction {pc} does not fit {width} byte(s)"
            )));
        }
        block.write_uint(*line, width)?;
    }

    for name in &info.upvalue_names {
        write_name(&mut block, name, path)?;
    }

    let mut last = 0u32;
    for local in &info.locals {
        match &local.name {
            VarName::Special(s) => block.write_u8(s.code()),
            VarName::Named(name) => {
                if name.first().map_or(true, |b| *b < 7) {
                    let name = String::from_utf8_lossy(name);
                    return Err(CoreError::invalid_graph(format!("{path}: local name {name:?} cannot be encoded")));
                }
                write_name(&mut block, name, path)?;
            }
        }
        let delta = local.scope_begin.checked_sub(last).ok_or_else(|| {
            CoreError::invalid_graph(format!("{path}: local scopes must start in order ({} after {last})", local.scope_begin))
        })?;
        block.write_uleb128(delta);
        block.write_uleb128(local.scope_len);
        last = local.scope_begin;
    }
    block.write_u8(0);
    Ok(block)
}

fn write_name(out: &mut ByteCursor, name: &[u8], path: &ProtoPath) -> CoreResult<()> {
    if name.contains(&0) {
        let name = String::from_utf8_lossy(name);
        return Err(CoreError::invalid_graph(format!("{path}: name {name:?} contains NUL")));
    }
    out.write_cstr(name);
    Ok(())
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::instruction::Instruction;
    use crate::opcode::OperandSlots;
    use crate::prototype::LocalVar;
    use pretty_assertions::assert_eq;

    fn stripped_le() -> Script {
        let mut s = Script::new();
        s.flags = ScriptFlags::STRIP_DEBUG;
        s
    }

    #[test]
    fn empty_stripped_prototype_layout() {
        let mut s = stripped_le();
        s.root.max_slot = 2;
        let bytes = Encoder::new().encode(&s).unwrap();
        assert_eq!(bytes, vec![0x1B, b'L', b'J', 2, 2, 7, 0, 0, 2, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn numbers_use_mark_bit() {
        let mut s = stripped_le();
        s.root.numbers = vec![NumberConstant::Int(-1), NumberConstant::Float(0.0)];
        let bytes = Encoder::new().encode(&s).unwrap();
        // reversed: Float(0.0) = mark only + zero high half, then Int(-1) as 33 bits
        assert_eq!(&bytes[13..21], &[0x01, 0x00, 0xFE, 0xFF, 0xFF, 0xFF, 0x1F, 0]);
        assert_eq!(Decoder::new().decode(&bytes).unwrap().root.numbers, s.root.numbers);
    }

    #[test]
    fn children_precede_parent() {
        let mut s = stripped_le();
        let mut a = Prototype::new();
        a.args = 1;
        let mut b = Prototype::new();
        b.args = 2;
        let ka = s.root.add_child(a);
        let kb = s.root.add_child(b);
        s.root.constants = vec![kb, ka];

        let bytes = Encoder::new().encode(&s).unwrap();
        // first body on the wire belongs to the first declared child constant (b)
        assert_eq!(bytes[7], 2);
        let back = Decoder::new().decode(&bytes).unwrap();
        let args: Vec<u8> = back.root.constants.iter().filter_map(|k| back.root.child(k)).map(|p| p.args).collect();
        assert_eq!(args, vec![2, 1]);
    }

    #[test]
    fn broken_child_references() {
        let mut s = stripped_le();
        s.root.add_child(Prototype::new());
        assert!(matches!(Encoder::new().encode(&s), Err(CoreError::InvalidGraph(_))));

        s.root.constants = vec![GenericConstant::Child(0), GenericConstant::Child(0)];
        assert!(matches!(Encoder::new().encode(&s), Err(CoreError::InvalidGraph(_))));

        s.root.constants = vec![GenericConstant::Child(0), GenericConstant::Child(4)];
        assert!(matches!(Encoder::new().encode(&s), Err(CoreError::InvalidGraph(_))));
    }

    #[test]
    fn debug_lists_must_match_counts() {
        let mut s = Script::new();
        s.flags = ScriptFlags::empty();
        s.root.code.push(Instruction::with_table(75, &LuaJitOpcodes));
        s.root.debug = Some(DebugInfo::default());
        assert_eq!(
            Encoder::new().encode(&s),
            Err(CoreError::MissingDebugInfo { field: "lines", expected: 1, found: 0 })
        );
    }

    #[test]
    fn mismatched_operand_layout() {
        let mut s = stripped_le();
        s.root.code.push(Instruction::new(75, OperandSlots::ABC));
        assert!(matches!(Encoder::new().encode(&s), Err(CoreError::InvalidGraph(_))));
    }

    #[test]
    fn locals_must_be_ordered() {
        let mut s = Script::new();
        s.flags = ScriptFlags::empty();
        s.root.debug = Some(DebugInfo {
            locals: vec![LocalVar::new("a", 4, 1), LocalVar::new("b", 2, 1)],
            ..DebugInfo::default()
        });
        assert!(matches!(Encoder::new().encode(&s), Err(CoreError::InvalidGraph(_))));
    }

    #[test]
    fn big_endian_words() {
        let mut s = stripped_le();
        s.flags |= ScriptFlags::BIG_ENDIAN;
        let mut ins = Instruction::with_table(75, &LuaJitOpcodes);
        ins.set_a(1).unwrap();
        s.root.code.push(ins);
        let bytes = Encoder::new().encode(&s).unwrap();
        assert_eq!(&bytes[13..17], &[0x00, 0x00, 0x01, 75]);
        assert_eq!(Decoder::new().decode(&bytes).unwrap().root.code, s.root.code);
    }
}
