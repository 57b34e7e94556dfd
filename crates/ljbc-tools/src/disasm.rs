//! Listings lisibles d'un script décodé.
//!
//! Les noms (chunk, upvalues, locales) sont des octets bruts ; ils sont
//! rendus ici en UTF-8 avec pertes.

use std::fmt::Write;

use ljbc_format::{
    GenericConstant, Instruction, NumberConstant, OpcodeTable, ProtoPath, Prototype, Script, Table, TableValue,
};

/// Listing multi-lignes de chaque prototype, parents d'abord, avec métadonnées.
pub fn render(script: &Script, opcodes: &dyn OpcodeTable) -> String {
    let mut out = String::new();
    let chunk = if script.chunk_name.is_empty() {
        "<stripped>".into()
    } else {
        String::from_utf8_lossy(&script.chunk_name)
    };
    let _ = writeln!(
        out,
        "== {chunk} == (version={}, flags={:?}, prototypes={})",
        script.version(),
        script.flags,
        script.walk().len()
    );
    for (path, proto) in script.walk() {
        let _ = writeln!(out);
        render_prototype(&mut out, &path, proto, opcodes);
    }
    out
}

/// Une ligne par instruction, préfixée par le chemin du prototype.
pub fn render_compact(script: &Script, opcodes: &dyn OpcodeTable) -> String {
    let mut out = String::new();
    for (path, proto) in script.walk() {
        for (pc, ins) in proto.code.iter().enumerate() {
            let _ = write!(out, "{path}:{pc:04}: {}", show_instruction(ins, opcodes));
            match operand_preview(proto, ins, opcodes) {
                Some(p) => {
                    let _ = writeln!(out, " ;; {p}");
                }
                None => {
                    let _ = writeln!(out);
                }
            }
        }
    }
    out
}

fn render_prototype(out: &mut String, path: &ProtoPath, proto: &Prototype, opcodes: &dyn OpcodeTable) {
    let _ = writeln!(
        out,
        "-- {path} -- (flags={:?}, args={}, slots={}, upvalues={}, consts={}, numbers={}, ops={})",
        proto.flags,
        proto.args,
        proto.max_slot,
        proto.upvalues.len(),
        proto.constants.len(),
        proto.numbers.len(),
        proto.code.len()
    );
    if let Some(debug) = &proto.debug {
        let _ = writeln!(out, ";; lines {}..+{}", debug.first_line, debug.line_count);
    }

    let _ = writeln!(out, ";; ops");
    for (pc, ins) in proto.code.iter().enumerate() {
        let line = proto.debug.as_ref().and_then(|d| d.source_line(pc));
        let line = line.map_or_else(|| "   -".to_owned(), |l| format!("{l:4}"));
        let _ = write!(out, "{pc:04} | {line} | {}", show_instruction(ins, opcodes));
        match operand_preview(proto, ins, opcodes) {
            Some(p) => {
                let _ = writeln!(out, " ;; {p}");
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }

    if !proto.upvalues.is_empty() {
        let _ = writeln!(out, ";; upvalues");
        for (ix, uv) in proto.upvalues.iter().enumerate() {
            let name = proto.debug.as_ref().and_then(|d| d.upvalue_name(ix)).map_or("?".into(), String::from_utf8_lossy);
            let _ = writeln!(
                out,
                "uv[{ix:03}] {} {}{} {name}",
                uv.index,
                if uv.local { "local" } else { "outer" },
                if uv.readonly { " ro" } else { "" }
            );
        }
    }

    if !proto.constants.is_empty() {
        let _ = writeln!(out, ";; constants");
        for (ix, k) in proto.constants.iter().enumerate() {
            let _ = writeln!(out, "const[{ix:04}] = {}", show_constant(proto, k));
        }
    }

    if !proto.numbers.is_empty() {
        let _ = writeln!(out, ";; numbers");
        for (ix, n) in proto.numbers.iter().enumerate() {
            let _ = writeln!(out, "num[{ix:04}] = {}", show_number(*n));
        }
    }

    if let Some(debug) = proto.debug.as_ref().filter(|d| !d.locals.is_empty()) {
        let _ = writeln!(out, ";; locals");
        for local in &debug.locals {
            let name = String::from_utf8_lossy(local.name.as_bytes());
            let _ = writeln!(out, "{:04}..{:04} {name}", local.scope_begin, local.scope_end());
        }
    }
}

fn show_instruction(ins: &Instruction, opcodes: &dyn OpcodeTable) -> String {
    let name = opcodes.mnemonic(ins.opcode()).map_or_else(|| format!("OP_{:02X}", ins.opcode()), str::to_owned);
    let mut s = format!("{name:<7}");
    if let Ok(a) = ins.a() {
        let _ = write!(s, " A={a}");
    }
    if let Ok(b) = ins.b() {
        let _ = write!(s, " B={b}");
    }
    if let Ok(c) = ins.c() {
        let _ = write!(s, " C={c}");
    }
    if let Ok(d) = ins.d() {
        let _ = write!(s, " D={d}");
    }
    s
}

/// Résout l'opérande constante des opcodes qui en désignent une.
fn operand_preview(proto: &Prototype, ins: &Instruction, opcodes: &dyn OpcodeTable) -> Option<String> {
    let name = opcodes.mnemonic(ins.opcode())?;
    let d = ins.d().ok().map(usize::from);
    match name {
        "KSTR" | "GGET" | "GSET" | "KCDATA" | "TDUP" => {
            d.and_then(|d| proto.constants.get(d)).map(|k| show_constant(proto, k))
        }
        "FNEW" => d.and_then(|d| proto.constants.get(d)).and_then(|k| proto.child(k)).map(|c| {
            format!("function (args={}, ops={})", c.args, c.code.len())
        }),
        "KNUM" => {
            let d = d?;
            let ix = proto.numbers.len().checked_sub(d + 1)?;
            proto.numbers.get(ix).map(|n| show_number(*n))
        }
        _ => None,
    }
}

fn show_constant(proto: &Prototype, k: &GenericConstant) -> String {
    match k {
        GenericConstant::Child(ix) => match proto.children.get(*ix) {
            Some(c) => format!("<function #{ix} args={} ops={}>", c.args, c.code.len()),
            None => format!("<function #{ix} missing>"),
        },
        GenericConstant::Table(t) => show_table(t),
        GenericConstant::Int64(v) => format!("{v}LL"),
        GenericConstant::Uint64(v) => format!("{v}ULL"),
        GenericConstant::Complex(c) => format!("{}{:+}i", c.re, c.im),
        GenericConstant::Str(s) => show_bytes(s),
    }
}

fn show_number(n: NumberConstant) -> String {
    match n {
        NumberConstant::Int(i) => format!("{i}"),
        NumberConstant::Float(f) => format!("{f:?}"),
    }
}

fn show_table(t: &Table) -> String {
    let mut parts: Vec<String> = t.array().iter().enumerate().map(|(ix, v)| format!("[{ix}]={}", show_value(v))).collect();
    parts.extend(t.dictionary().iter().map(|(k, v)| format!("[{}]={}", show_value(k), show_value(v))));
    format!("{{{}}}", parts.join(", "))
}

fn show_value(v: &TableValue) -> String {
    match v {
        TableValue::Nil => "nil".into(),
        TableValue::False => "false".into(),
        TableValue::True => "true".into(),
        TableValue::Int32(i) => format!("{i}"),
        TableValue::Int64(i) => format!("{i:#018x}"),
        TableValue::Str(s) => show_bytes(s),
    }
}

fn show_bytes(s: &[u8]) -> String {
    let text = String::from_utf8_lossy(s);
    if text.chars().count() <= 64 {
        format!("{text:?}")
    } else {
        let head: String = text.chars().take(64).collect();
        format!("{head:?}…")
    }
}

/* ------------------------------------------------------------------------- */
/* Tests                                                                     */
/* ------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use ljbc_format::{DebugInfo, LocalVar, LuaJitOpcodes, ScriptFlags, Upvalue, VarName};

    fn sample() -> Script {
        let mut child = Prototype::new();
        child.args = 1;
        let mut script = Script::new();
        script.flags = ScriptFlags::empty();
        script.chunk_name = "@t.lua".into();
        let k = script.root.add_child(child);
        script.root.constants = vec![GenericConstant::str("print"), k];
        script.root.numbers = vec![NumberConstant::Float(0.5), NumberConstant::Int(3)];
        script.root.upvalues.push(Upvalue { index: 2, readonly: true, local: true });

        let op = |name| LuaJitOpcodes::opcode(name).unwrap();
        let mut gget = Instruction::with_table(op("GGET"), &LuaJitOpcodes);
        gget.set_d(0).unwrap();
        let mut knum = Instruction::with_table(op("KNUM"), &LuaJitOpcodes);
        knum.set_a(1).unwrap();
        let mut fnew = Instruction::with_table(op("FNEW"), &LuaJitOpcodes);
        fnew.set_d(1).unwrap();
        script.root.code = vec![gget, knum, fnew];
        script.root.debug = Some(DebugInfo {
            first_line: 1,
            line_count: 2,
            lines: vec![0, 1, 1],
            upvalue_names: vec!["env".into()],
            locals: Vec::new(),
        });
        script
    }

    #[test]
    fn full_listing_resolves_operands() {
        let text = render(&sample(), &LuaJitOpcodes);
        assert!(text.starts_with("== @t.lua == (version=2"), "{text}");
        assert!(text.contains("-- main --"));
        assert!(text.contains("-- main.0 --"));
        assert!(text.contains("0000 |    1 | GGET    A=0 D=0 ;; \"print\""), "{text}");
        assert!(text.contains("0001 |    2 | KNUM    A=1 D=0 ;; 3"), "{text}");
        assert!(text.contains("function (args=1, ops=0)"));
        assert!(text.contains("uv[000] 2 local ro env"));
        assert!(text.contains("num[0000] = 0.5"));
    }

    #[test]
    fn compact_listing() {
        let text = render_compact(&sample(), &LuaJitOpcodes);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().starts_with("main:0000: GGET"));
    }

    #[test]
    fn unknown_opcodes_are_named_by_number() {
        let mut script = Script::new();
        script.root.code.push(Instruction::from_word(0x0000_00F0, &LuaJitOpcodes));
        assert!(render(&script, &LuaJitOpcodes).contains("OP_F0"));
    }

    #[test]
    fn names_outside_utf8_render_lossily() {
        let mut script = sample();
        script.chunk_name = b"@caf\xE9.lua".to_vec();
        if let Some(debug) = script.root.debug.as_mut() {
            debug.upvalue_names = vec![b"\xFFenv".to_vec()];
            debug.locals.push(LocalVar { name: VarName::Named(b"x\xC3".to_vec()), scope_begin: 0, scope_len: 2 });
        }
        let text = render(&script, &LuaJitOpcodes);
        assert!(text.starts_with("== @caf\u{FFFD}.lua =="), "{text}");
        assert!(text.contains("uv[000] 2 local ro \u{FFFD}env"), "{text}");
        assert!(text.contains("0000..0002 x\u{FFFD}"), "{text}");
    }
}
