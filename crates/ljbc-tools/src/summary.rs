//! Compteurs agrégés sur un script (pour `--summary` et `--json`).

use std::fmt;

use ljbc_format::{GenericConstant, Script};
use serde::Serialize;

/// Compteurs collectés sur tous les prototypes d'un script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Version du bytecode.
    pub version: u8,
    /// Flags bruts de l'en-tête.
    pub flags: u32,
    /// Nom du chunk, rendu en UTF-8 avec pertes (vide si strippé).
    pub chunk_name: String,
    /// `STRIP_DEBUG` est posé.
    pub stripped: bool,
    /// Nombre de prototypes, racine comprise.
    pub prototypes: usize,
    /// Profondeur d'imbrication maximale (racine = 0).
    pub max_depth: usize,
    /// Total des instructions.
    pub instructions: usize,
    /// Total des constantes génériques.
    pub constants: usize,
    /// Total des constantes numériques.
    pub numbers: usize,
    /// Total des descripteurs d'upvalue.
    pub upvalues: usize,
    /// Constantes chaîne parmi `constants`.
    pub strings: usize,
    /// Constantes table parmi `constants`.
    pub tables: usize,
}

impl Summary {
    /// Parcourt `script` une fois.
    pub fn of(script: &Script) -> Self {
        let mut s = Self {
            version: script.version(),
            flags: script.flags.bits(),
            chunk_name: String::from_utf8_lossy(&script.chunk_name).into_owned(),
            stripped: !script.has_debug(),
            ..Self::default()
        };
        for (path, proto) in script.walk() {
            s.prototypes += 1;
            s.max_depth = s.max_depth.max(path.depth());
            s.instructions += proto.code.len();
            s.constants += proto.constants.len();
            s.numbers += proto.numbers.len();
            s.upvalues += proto.upvalues.len();
            for k in &proto.constants {
                match k {
                    GenericConstant::Str(_) => s.strings += 1,
                    GenericConstant::Table(_) => s.tables += 1,
                    _ => {}
                }
            }
        }
        s
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version      : {}", self.version)?;
        writeln!(f, "flags        : {:#x}{}", self.flags, if self.stripped { " (stripped)" } else { "" })?;
        if !self.chunk_name.is_empty() {
            writeln!(f, "chunk        : {}", self.chunk_name)?;
        }
        writeln!(f, "prototypes   : {} (depth {})", self.prototypes, self.max_depth)?;
        writeln!(f, "instructions : {}", self.instructions)?;
        writeln!(f, "constants    : {} ({} strings, {} tables)", self.constants, self.strings, self.tables)?;
        writeln!(f, "numbers      : {}", self.numbers)?;
        write!(f, "upvalues     : {}", self.upvalues)
    }
}

/* ------------------------------------------------------------------------- */
/* Tests                                                                     */
/* ------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use ljbc_format::{NumberConstant, Prototype, Table, TableValue, Upvalue};
    use pretty_assertions::assert_eq;

    #[test]
    fn counts_every_prototype() {
        let mut grandchild = Prototype::new();
        grandchild.upvalues.push(Upvalue { index: 0, readonly: false, local: true });
        let mut child = Prototype::new();
        let k = child.add_child(grandchild);
        child.constants = vec![k, GenericConstant::str("a")];

        let mut script = Script::new();
        let k = script.root.add_child(child);
        let mut t = Table::default();
        t.push(0, TableValue::True);
        script.root.constants = vec![GenericConstant::str("b"), GenericConstant::Table(t), k];
        script.root.numbers = vec![NumberConstant::Int(1)];

        let s = Summary::of(&script);
        assert_eq!(
            s,
            Summary {
                version: 2,
                flags: script.flags.bits(),
                chunk_name: "?".into(),
                stripped: true,
                prototypes: 3,
                max_depth: 2,
                instructions: 0,
                constants: 5,
                numbers: 1,
                upvalues: 1,
                strings: 2,
                tables: 1,
            }
        );
        assert!(s.to_string().contains("prototypes   : 3 (depth 2)"));
    }
}
