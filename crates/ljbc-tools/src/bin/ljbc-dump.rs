// crates/ljbc-tools/src/bin/ljbc-dump.rs
//! Inspecteur de dumps LuaJIT (bytecode v2).
//!
//! Exemples :
//!   ljbc-dump a.ljbc --summary
//!   ljbc-dump a.ljbc --disasm --compact
//!   cat a.ljbc | ljbc-dump - --stdin-name a.ljbc --json | jq
//!   ljbc-dump a.ljbc --strip --out a.stripped.ljbc
//!
//! Options utiles :
//!   --disasm        : listing lisible sur stdout
//!   --compact       : listing 1-ligne-par-instruction
//!   --emit <f>      : écrit le listing dans un fichier
//!   --json          : arbre complet (serde) + résumé en JSON
//!   --summary       : résumé coloré sur stderr
//!   --verify        : décode → ré-encode → compare les octets
//!   --strip         : retire les infos de debug (avec --out)
//!   --time          : chrono
//!   -v / -vv        : logs tracing sur stderr

use anyhow::{anyhow, bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser};
use serde::Serialize;
#[cfg(feature = "colors")]
use yansi::{Color, Paint};

use ljbc_format::{LuaJitOpcodes, Script};
use ljbc_tools::disasm::render_compact;
use ljbc_tools::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "ljbc-dump", version, about = "Inspecteur de bytecode LuaJIT (v2) -> texte/JSON")]
struct Cli {
    /// Fichier(s) à analyser (ou '-' pour stdin, unique)
    inputs: Vec<String>,

    /// Affiche le désassemblage sur stdout
    #[arg(long)]
    disasm: bool,

    /// Vue compacte (1 ligne par instruction)
    #[arg(long)]
    compact: bool,

    /// Écrit le désassemblage dans un fichier (si 1 entrée)
    #[arg(long)]
    emit: Option<Utf8PathBuf>,

    /// Affiche le script complet en JSON sur stdout
    #[arg(long)]
    json: bool,

    /// Résumé rapide sur stderr
    #[arg(long)]
    summary: bool,

    /// Ré-encode et compare aux octets d'origine
    #[arg(long)]
    verify: bool,

    /// Retire les infos de debug et écrit le résultat dans --out
    #[arg(long, requires = "out")]
    strip: bool,

    /// Fichier de sortie pour --strip
    #[arg(long)]
    out: Option<Utf8PathBuf>,

    /// Nom logique quand l'entrée est '-' (stdin)
    #[arg(long, default_value = "<stdin>")]
    stdin_name: String,

    /// Affiche la durée de traitement
    #[arg(long)]
    time: bool,

    /// Verbosité des logs (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Couleurs du résumé: auto|always|never
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    setup_colors(cli.color);
    tracing::debug!("{}", version_banner("ljbc-dump"));

    if cli.inputs.is_empty() {
        bail!("Aucune entrée. Exemple: ljbc-dump a.ljbc --disasm");
    }
    let use_stdin = cli.inputs.len() == 1 && cli.inputs[0] == "-";
    if cli.inputs.len() > 1 && (cli.emit.is_some() || cli.out.is_some()) {
        bail!("Plusieurs entrées → --emit / --out n'acceptent qu'une seule entrée");
    }

    if use_stdin {
        let bytes = read_stdin_to_bytes()?;
        process_one(&bytes, Utf8Path::new(&cli.stdin_name), &cli)?;
    } else {
        for inp in &cli.inputs {
            if inp == "-" {
                return Err(anyhow!("'-' (stdin) doit être l'unique entrée"));
            }
            let path = Utf8PathBuf::from(inp);
            let bytes = read_bytes(&path)?;
            process_one(&bytes, &path, &cli)?;
        }
    }
    Ok(())
}

fn process_one(bytes: &[u8], name: &Utf8Path, cli: &Cli) -> Result<()> {
    let timer = Timer::start();
    let script = Script::from_bytes(bytes).with_context(|| format!("Décodage échoué: {name}"))?;
    tracing::info!(file = %name, bytes = bytes.len(), "decoded");

    if cli.summary {
        print_summary(&Summary::of(&script), name);
    }

    if cli.disasm || cli.emit.is_some() {
        let txt = if cli.compact { render_compact(&script, &LuaJitOpcodes) } else { render(&script, &LuaJitOpcodes) };
        if let Some(out) = &cli.emit {
            write_text(out, &txt)?;
            eprintln!("📝 Disasm → {out}");
        } else {
            println!("{txt}");
        }
    }

    if cli.json {
        let view = JsonView { file: name.as_str(), summary: Summary::of(&script), script: &script };
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    if cli.verify {
        let again = script.to_bytes().with_context(|| format!("Ré-encodage échoué: {name}"))?;
        if again != bytes {
            let at = again.iter().zip(bytes).position(|(a, b)| a != b).unwrap_or(again.len().min(bytes.len()));
            bail!("round-trip divergent ({name}): premier écart à l'octet {at} ({} vs {} octets)", again.len(), bytes.len());
        }
        print_ok("✓ verify round-trip OK");
    }

    if cli.strip {
        if let Some(out) = &cli.out {
            let mut stripped = script.clone();
            stripped.strip_debug();
            let encoded = stripped.to_bytes().with_context(|| format!("Ré-encodage échoué: {name}"))?;
            write_bytes(out, &encoded)?;
            eprintln!("✂️  Strip → {out} ({} → {} octets)", bytes.len(), encoded.len());
        }
    }

    if cli.time {
        eprintln!("⏱️  {}", timer.pretty());
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonView<'a> {
    file: &'a str,
    summary: Summary,
    script: &'a Script,
}

#[cfg(feature = "colors")]
fn print_summary(summary: &Summary, name: &Utf8Path) {
    let title = name.file_name().unwrap_or("<stdin>");
    let hdr = format!("== {title} ==");
    eprintln!("{}", hdr.paint(Color::Cyan).bold());
    for line in summary.to_string().lines() {
        eprintln!("{} {line}", "•".paint(Color::Blue));
    }
}

#[cfg(not(feature = "colors"))]
fn print_summary(summary: &Summary, name: &Utf8Path) {
    eprintln!("== {} ==", name.file_name().unwrap_or("<stdin>"));
    for line in summary.to_string().lines() {
        eprintln!("• {line}");
    }
}

#[cfg(feature = "colors")]
fn print_ok(msg: &str) { eprintln!("{}", msg.paint(Color::Green)); }

#[cfg(not(feature = "colors"))]
fn print_ok(msg: &str) { eprintln!("{msg}"); }
