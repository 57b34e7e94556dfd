//! Benchmarks du codec (Criterion).
//!
//! Scripts synthétiques : `fanout` enfants directs, chacun avec `body`
//! instructions, constantes et nombres. Debug conservé.
//!
//! Criterion :
//!   CRIT_SAMPLES (def=50) | CRIT_WARMUP_MS (def=300) | CRIT_MEASURE_MS (def=1200)

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ljbc_format::prelude::*;
use ljbc_format::{DebugInfo, LocalVar};

fn env_u64(k: &str, d: u64) -> u64 { std::env::var(k).ok().and_then(|s| s.parse().ok()).unwrap_or(d) }

fn prototype(body: usize) -> Prototype {
    let op = |name| LuaJitOpcodes::opcode(name).unwrap_or(0);
    let mut p = Prototype::new();
    p.max_slot = 8;
    for i in 0..body {
        let mut ins = Instruction::with_table(op("KSHORT"), &LuaJitOpcodes);
        let _ = ins.set_a((i % 8) as u8);
        let _ = ins.set_d(i as u16);
        p.code.push(ins);
        p.constants.push(GenericConstant::str(format!("k{i}")));
        p.numbers.push(if i % 2 == 0 { NumberConstant::Int(i as i32) } else { NumberConstant::Float(i as f64 + 0.5) });
    }
    p.debug = Some(DebugInfo {
        first_line: 1,
        line_count: body as u32,
        lines: (0..body as u32).collect(),
        upvalue_names: Vec::new(),
        locals: vec![LocalVar::new("x", 0, body as u32)],
    });
    p
}

fn script(fanout: usize, body: usize) -> Script {
    let mut s = Script::new();
    s.flags.remove(ScriptFlags::STRIP_DEBUG);
    s.chunk_name = "@bench.lua".into();
    s.root = prototype(body);
    for _ in 0..fanout {
        let k = s.root.add_child(prototype(body));
        s.root.constants.push(k);
    }
    s
}

fn configured() -> Criterion {
    Criterion::default()
        .sample_size(env_u64("CRIT_SAMPLES", 50) as usize)
        .warm_up_time(Duration::from_millis(env_u64("CRIT_WARMUP_MS", 300)))
        .measurement_time(Duration::from_millis(env_u64("CRIT_MEASURE_MS", 1200)))
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    for (fanout, body) in [(1, 16), (16, 64), (64, 256)] {
        let s = script(fanout, body);
        let Ok(bytes) = s.to_bytes() else { continue };
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        let id = format!("{fanout}x{body}");
        group.bench_with_input(BenchmarkId::new("decode", &id), &bytes, |b, bytes| {
            b.iter(|| Script::from_bytes(black_box(bytes)));
        });
        group.bench_with_input(BenchmarkId::new("encode", &id), &s, |b, s| {
            b.iter(|| black_box(s).to_bytes());
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = configured();
    targets = bench_codec
}
criterion_main!(benches);
