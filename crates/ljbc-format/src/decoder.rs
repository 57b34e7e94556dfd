//! Octets → [`Script`].
//!
//! Les prototypes imbriqués sont stockés avant celui qui les référence : les
//! prototypes terminés restent sur une pile jusqu'à ce qu'une constante
//! `Child` d'un prototype suivant les réclame. La pile ne vit que le temps
//! d'un appel à `decode`.

use ljbc_core::bits::{f64_from_bits, join_u64, normalize_sign};
use ljbc_core::{ByteCursor, CoreError, CoreResult, Endian};
use tracing::{debug, trace};

use crate::constant::{Complex, GenericConstant, GenericConstantType, NumberConstant};
use crate::instruction::Instruction;
use crate::opcode::{LuaJitOpcodes, OpcodeTable};
use crate::prototype::{DebugInfo, LocalVar, Prototype, PrototypeFlags, SpecialVar, VarName};
use crate::script::{Script, ScriptFlags, MAGIC, VERSION};
use crate::table::{Table, TableValue, TableValueType};
use crate::upvalue::Upvalue;

/// Prototypes lus mais pas encore réclamés par un parent.
type PendingStack = Vec<Prototype>;

/// Compteurs lus dans l'en-tête d'un prototype.
#[derive(Debug, Clone, Copy)]
struct ProtoHeader {
    upvalues: usize,
    constants: usize,
    numbers: usize,
    instructions: usize,
    debug_size: usize,
    first_line: u32,
    line_count: u32,
}

/// Décodeur de bytecode.
#[derive(Clone, Copy)]
pub struct Decoder<'t> {
    opcodes: &'t dyn OpcodeTable,
}

impl Default for Decoder<'static> {
    fn default() -> Self { Self::new() }
}

impl core::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result { f.debug_struct("Decoder").finish_non_exhaustive() }
}

impl Decoder<'static> {
    /// Décodeur utilisant [`LuaJitOpcodes`].
    #[must_use]
    pub fn new() -> Self { Self { opcodes: &LuaJitOpcodes } }
}

impl<'t> Decoder<'t> {
    /// Décodeur consultant `opcodes` pour la disposition des opérandes.
    #[must_use]
    pub fn with_opcodes(opcodes: &'t dyn OpcodeTable) -> Self { Self { opcodes } }

    /// Décode un dump complet.
    pub fn decode(&self, bytes: &[u8]) -> CoreResult<Script> {
        if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
            return Err(CoreError::InvalidFormat);
        }
        let mut cur = ByteCursor::from_slice(bytes);
        cur.seek(MAGIC.len());

        let version = cur.read_u8()?;
        if version != VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let flags = ScriptFlags::from_bits_retain(cur.read_uleb128()?);
        cur.set_endian(if flags.contains(ScriptFlags::BIG_ENDIAN) { Endian::Big } else { Endian::Little });
        let with_debug = !flags.contains(ScriptFlags::STRIP_DEBUG);

        let chunk_name = if with_debug {
            let len = cur.read_uleb128()? as usize;
            cur.read_bytes(len)?.to_vec()
        } else {
            Vec::new()
        };

        let mut stack = PendingStack::new();
        loop {
            if cur.peek_u8()? == 0 {
                cur.skip(1);
                break;
            }
            let proto = self.read_prototype(&mut cur, &mut stack, with_debug)?;
            stack.push(proto);
        }

        if cur.remaining() != 0 {
            return Err(CoreError::corrupted(format!("{} trailing bytes after the prototype list", cur.remaining())));
        }
        if stack.len() != 1 {
            return Err(CoreError::corrupted(format!("expected one root prototype, found {}", stack.len())));
        }
        let root = stack.pop().ok_or(CoreError::PrototypeStackUnderflow)?;

        debug!(version, flags = flags.bits(), bytes = bytes.len(), chunk = %String::from_utf8_lossy(&chunk_name), "bytecode decoded");
        Ok(Script::from_parts(flags, chunk_name, root))
    }

    /* ───────────── prototype ───────────── */

    fn read_prototype(&self, cur: &mut ByteCursor, stack: &mut PendingStack, with_debug: bool) -> CoreResult<Prototype> {
        let size = cur.read_uleb128()? as usize;
        let start = cur.tell();
        if cur.remaining() < size {
            return Err(CoreError::OutOfRange { offset: start, needed: size, size: cur.len() });
        }

        let mut proto = Prototype::new();
        proto.flags = PrototypeFlags::from_bits_retain(cur.read_u8()?);
        proto.args = cur.read_u8()?;
        proto.max_slot = cur.read_u8()?;
        let header = read_header(cur, with_debug)?;

        trace!(
            offset = start,
            size,
            instructions = header.instructions,
            upvalues = header.upvalues,
            constants = header.constants,
            numbers = header.numbers,
            pending = stack.len(),
            "prototype"
        );

        for _ in 0..header.instructions {
            proto.code.push(Instruction::from_word(cur.read_u32()?, self.opcodes));
        }
        for _ in 0..header.upvalues {
            proto.upvalues.push(Upvalue::from_packed(cur.read_u16()?));
        }

        for _ in 0..header.constants {
            let k = read_constant(cur, stack, &mut proto)?;
            proto.constants.push(k);
        }
        proto.constants.reverse();

        for _ in 0..header.numbers {
            proto.numbers.push(read_number(cur)?);
        }
        proto.numbers.reverse();

        if header.debug_size > 0 {
            let debug_start = cur.tell();
            proto.debug = Some(read_debug(cur, &header)?);
            let used = cur.tell() - debug_start;
            if used != header.debug_size {
                return Err(CoreError::corrupted(format!(
                    "debug block at offset {debug_start} declares {} bytes, used {used}",
                    header.debug_size
                )));
            }
        }

        let used = cur.tell() - start;
        if used != size {
            return Err(CoreError::corrupted(format!("prototype at offset {start} declares {size} bytes, used {used}")));
        }
        Ok(proto)
    }
}

fn read_header(cur: &mut ByteCursor, with_debug: bool) -> CoreResult<ProtoHeader> {
    let upvalues = usize::from(cur.read_u8()?);
    let constants = cur.read_uleb128()? as usize;
    let numbers = cur.read_uleb128()? as usize;
    let instructions = cur.read_uleb128()? as usize;

    let mut header =
        ProtoHeader { upvalues, constants, numbers, instructions, debug_size: 0, first_line: 0, line_count: 0 };
    if with_debug {
        header.debug_size = cur.read_uleb128()? as usize;
        if header.debug_size > 0 {
            header.first_line = cur.read_uleb128()?;
            header.line_count = cur.read_uleb128()?;
        }
    }
    Ok(header)
}

/* ───────────── constants ───────────── */

fn read_constant(cur: &mut ByteCursor, stack: &mut PendingStack, proto: &mut Prototype) -> CoreResult<GenericConstant> {
    let tag = cur.read_uleb128()?;
    Ok(match GenericConstantType::from_tag(tag) {
        GenericConstantType::String => {
            let len = (tag - GenericConstantType::String as u32) as usize;
            GenericConstant::Str(cur.read_bytes(len)?.to_vec())
        }
        GenericConstantType::Complex => {
            let re = read_u64_halves(cur)?;
            let im = read_u64_halves(cur)?;
            GenericConstant::Complex(Complex { re: f64_from_bits(re), im: f64_from_bits(im) })
        }
        GenericConstantType::Uint64 => GenericConstant::Uint64(read_u64_halves(cur)?),
        GenericConstantType::Int64 => GenericConstant::Int64(normalize_sign(read_u64_halves(cur)?, 8)),
        GenericConstantType::Table => GenericConstant::Table(read_table(cur)?),
        GenericConstantType::Child => {
            let child = stack.pop().ok_or(CoreError::PrototypeStackUnderflow)?;
            proto.children.push(child);
            GenericConstant::Child(proto.children.len() - 1)
        }
    })
}

fn read_u64_halves(cur: &mut ByteCursor) -> CoreResult<u64> {
    let lo = cur.read_uleb128()?;
    let hi = cur.read_uleb128()?;
    Ok(join_u64(lo, hi))
}

fn read_number(cur: &mut ByteCursor) -> CoreResult<NumberConstant> {
    let (is_float, lo) = cur.read_uleb128_33()?;
    if is_float {
        let hi = cur.read_uleb128()?;
        Ok(NumberConstant::Float(f64_from_bits(join_u64(lo, hi))))
    } else {
        Ok(NumberConstant::Int(normalize_sign(u64::from(lo), 4) as i32))
    }
}

fn read_table(cur: &mut ByteCursor) -> CoreResult<Table> {
    let array_len = cur.read_uleb128()? as usize;
    let dict_len = cur.read_uleb128()? as usize;
    let mut table = Table::new();
    for ix in 0..array_len {
        table.push(ix, read_table_value(cur)?);
    }
    for _ in 0..dict_len {
        let key = read_table_value(cur)?;
        let value = read_table_value(cur)?;
        table.set(key, value);
    }
    Ok(table)
}

fn read_table_value(cur: &mut ByteCursor) -> CoreResult<TableValue> {
    let tag = cur.read_uleb128()?;
    Ok(match TableValueType::from_tag(tag) {
        TableValueType::Nil => TableValue::Nil,
        TableValueType::False => TableValue::False,
        TableValueType::True => TableValue::True,
        TableValueType::Int32 => TableValue::Int32(normalize_sign(u64::from(cur.read_uleb128()?), 4) as i32),
        TableValueType::Int64 => TableValue::Int64(normalize_sign(read_u64_halves(cur)?, 8)),
        TableValueType::String => {
            let len = (tag - TableValueType::String as u32) as usize;
            TableValue::Str(cur.read_bytes(len)?.to_vec())
        }
    })
}

/* ───────────── debug ───────────── */

fn read_debug(cur: &mut ByteCursor, header: &ProtoHeader) -> CoreResult<DebugInfo> {
    let mut info = DebugInfo { first_line: header.first_line, line_count: header.line_count, ..DebugInfo::default() };

    let width = info.line_width();
    for _ in 0..header.instructions {
        info.lines.push(cur.read_uint(width)?);
    }

    for _ in 0..header.upvalues {
        info.upvalue_names.push(cur.read_cstr()?.to_vec());
    }

    let mut last = 0u32;
    loop {
        let offset = cur.tell();
        let lead = cur.read_u8()?;
        if lead == 0 {
            break;
        }
        let name = match SpecialVar::from_code(lead) {
            Some(special) => VarName::Special(special),
            None => {
                cur.seek(offset);
                VarName::Named(cur.read_cstr()?.to_vec())
            }
        };
        let delta = cur.read_uleb128()?;
        let scope_len = cur.read_uleb128()?;
        let scope_begin = last
            .checked_add(delta)
            .ok_or_else(|| CoreError::corrupted(format!("local variable scope overflows at offset {offset}")))?;
        last = scope_begin;
        info.locals.push(LocalVar { name, scope_begin, scope_len });
    }
    Ok(info)
}

/* ─────────────────────────── Tests ─────────────────────────── */
