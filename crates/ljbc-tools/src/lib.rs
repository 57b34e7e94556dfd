//! ljbc-tools — Bibliothèque commune des outils CLI ljbc.
//!
//! ## Modules & zones clés
//! - `disasm`  : listing texte d'un `Script` (`render`)
//! - `summary` : compteurs agrégés (`Summary::of`)
//! - I/O       : `read_bytes`, `read_stdin_to_bytes`, `write_text`, `write_bytes`
//! - Time      : `Timer`, `human_millis`
//! - Couleurs  : `ColorMode`, `setup_colors`
//! - Logs      : `init_tracing`
//!
//! Les fonctions renvoient `anyhow::Result`.

#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

use std::fs;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Désassemblage texte.
pub mod disasm;
/// Compteurs agrégés.
pub mod summary;

pub use summary::Summary;

/// Version lisible du crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Petite bannière de version utile pour logs/outils.
pub fn version_banner(tool: &str) -> String { format!("{tool} (ljbc-tools {VERSION})") }

/* ------------------------------------------------------------------------- */
/* Prelude                                                                   */
/* ------------------------------------------------------------------------- */

/// Prelude pratique pour les bins: re-exports compacts.
pub mod prelude {
    pub use crate::{
        disasm::render, human_millis, init_tracing, read_bytes, read_stdin_to_bytes, setup_colors, version_banner,
        write_bytes, write_text, ColorMode, Summary, Timer,
    };
    pub use anyhow::{anyhow, Context, Result};
    pub use camino::{Utf8Path, Utf8PathBuf};
}

/* ------------------------------------------------------------------------- */
/* I/O                                                                       */
/* ------------------------------------------------------------------------- */

/// Lit un fichier binaire.
pub fn read_bytes(path: &Utf8Path) -> Result<Vec<u8>> { fs::read(path).with_context(|| format!("lecture {path}")) }

/// Lis tout `stdin` en bytes.
pub fn read_stdin_to_bytes() -> Result<Vec<u8>> {
    let mut v = Vec::new();
    io::stdin().read_to_end(&mut v)?;
    Ok(v)
}

/// Écrit un texte (UTF-8). Crée les dossiers au besoin.
pub fn write_text(path: &Utf8Path, s: &str) -> Result<()> { write_bytes(path, s.as_bytes()) }

/// Écrit des bytes. Crée les dossiers au besoin.
pub fn write_bytes(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("création {parent}"))?;
    }
    let mut f = fs::File::create(path).with_context(|| format!("écriture {path}"))?;
    f.write_all(bytes)?;
    Ok(())
}

/* ------------------------------------------------------------------------- */
/* Time                                                                      */
/* ------------------------------------------------------------------------- */

/// Chrono simple.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Démarre un chrono.
    pub fn start() -> Self { Self { start: Instant::now() } }
    /// Durée écoulée.
    pub fn elapsed(&self) -> Duration { self.start.elapsed() }
    /// Format humain court.
    pub fn pretty(&self) -> String { human_millis(self.elapsed()) }
}

/// Format "humain" d'une durée.
pub fn human_millis(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1_000 {
        return format!("{ms} ms");
    }
    let s = d.as_secs_f64();
    if s < 60.0 {
        return format!("{s:.3} s");
    }
    let m = (s / 60.0).floor();
    let rest = s - m * 60.0;
    format!("{m:.0} min {rest:.1} s")
}

/* ------------------------------------------------------------------------- */
/* Couleurs & logs                                                           */
/* ------------------------------------------------------------------------- */

/// Mode couleur des sorties texte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
    /// Couleurs seulement si la sortie supporte ANSI.
    #[default]
    Auto,
    /// Force les couleurs.
    Always,
    /// Aucune couleur.
    Never,
}

/// Configure le mode couleur global pour yansi (si feature `colors` active).
pub fn setup_colors(mode: ColorMode) {
    #[cfg(feature = "colors")]
    {
        match mode {
            ColorMode::Auto => yansi::whenever(yansi::Condition::DEFAULT),
            ColorMode::Always => yansi::enable(),
            ColorMode::Never => yansi::disable(),
        }
    }
    #[cfg(not(feature = "colors"))]
    {
        let _ = mode;
    }
}

/// Installe un subscriber `tracing` sur stderr.
///
/// `RUST_LOG` a priorité ; sinon `verbosity` choisit le niveau
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Un second appel (tests) ne doit pas paniquer.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).try_init();
}

/* ------------------------------------------------------------------------- */
/* Tests                                                                     */
/* ------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn bytes_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let file = root.join("nested/out.ljbc");
        write_bytes(&file, b"\x1BLJ\x02").unwrap();
        assert_eq!(read_bytes(&file).unwrap(), b"\x1BLJ\x02");
        assert!(read_bytes(&root.join("missing")).is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(human_millis(Duration::from_millis(12)), "12 ms");
        assert_eq!(human_millis(Duration::from_millis(1_500)), "1.500 s");
        assert_eq!(human_millis(Duration::from_secs(90)), "1 min 30.0 s");
    }

    #[test]
    fn tracing_init_is_idempotent() {
        init_tracing(0);
        init_tracing(3);
    }
}
