//! Prototypes de fonction, leurs blocs de debug et l'adressage dans l'arbre.

use std::fmt;

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constant::{GenericConstant, NumberConstant};
use crate::instruction::Instruction;
use crate::upvalue::Upvalue;

bitflags! {
    /// Octet de flags d'un prototype.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct PrototypeFlags: u8 {
        /// A des prototypes imbriqués parmi ses constantes.
        const HAS_CHILDREN  = 1 << 0;
        /// Accepte `...`.
        const VARARG        = 1 << 1;
        /// Utilise des constantes cdata FFI.
        const FFI_CONSTANTS = 1 << 2;
        /// JIT désactivé pour cette fonction.
        const NO_JIT        = 1 << 3;
        /// Contient des boucles patchées en `ILOOP` (interprétation forcée).
        const HAVE_ILOOP    = 1 << 4;
    }
}

/* ─────────────────────────── Adressage ─────────────────────────── */

/// Position d'un prototype dans l'arbre : indices d'enfants depuis la racine.
///
/// Sert de lien parent non propriétaire ; l'arbre possède tous les nœuds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProtoPath(Vec<usize>);

impl ProtoPath {
    /// Chemin du prototype racine.
    #[must_use]
    pub const fn root() -> Self { Self(Vec::new()) }

    /// Chemin de l'enfant `index` sous `self`.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut v = self.0.clone();
        v.push(index);
        Self(v)
    }

    /// Chemin du prototype englobant, `None` pour la racine.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.0.split_last()?;
        Some(Self(head.to_vec()))
    }

    /// Indices d'enfants, du plus externe au plus interne.
    pub fn indices(&self) -> &[usize] { &self.0 }

    /// Profondeur d'imbrication (0 pour la racine).
    pub fn depth(&self) -> usize { self.0.len() }

    /// Vrai pour le chemin racine.
    pub fn is_root(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<usize>> for ProtoPath {
    fn from(v: Vec<usize>) -> Self { Self(v) }
}

impl fmt::Display for ProtoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("main")?;
        for ix in &self.0 {
            write!(f, ".{ix}")?;
        }
        Ok(())
    }
}

/* ─────────────────────────── Debug ─────────────────────────── */

/// Variables de boucle générées par le compilateur, codées sur un octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum SpecialVar {
    /// `(for index)`
    ForIndex = 1,
    /// `(for limit)`
    ForLimit = 2,
    /// `(for step)`
    ForStep = 3,
    /// `(for generator)`
    ForGenerator = 4,
    /// `(for state)`
    ForState = 5,
    /// `(for control)`
    ForControl = 6,
}

impl SpecialVar {
    /// Convertit un code de fil dans `1..=6`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::ForIndex,
            2 => Self::ForLimit,
            3 => Self::ForStep,
            4 => Self::ForGenerator,
            5 => Self::ForState,
            6 => Self::ForControl,
            _ => return None,
        })
    }

    /// Code de fil.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }

    /// Nom affiché.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ForIndex => "(for index)",
            Self::ForLimit => "(for limit)",
            Self::ForStep => "(for step)",
            Self::ForGenerator => "(for generator)",
            Self::ForState => "(for state)",
            Self::ForControl => "(for control)",
        }
    }
}

/// Nom d'une variable locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VarName {
    /// Nom source, octets bruts (le premier octet doit être `>= 7`).
    Named(Vec<u8>),
    /// Variable de boucle interne.
    Special(SpecialVar),
}

impl VarName {
    /// Octets bruts du nom.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Named(s) => s,
            Self::Special(s) => s.name().as_bytes(),
        }
    }
}

impl From<&str> for VarName {
    fn from(s: &str) -> Self { Self::Named(s.as_bytes().to_vec()) }
}

/// Portée d'une variable locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalVar {
    /// Nom de la variable.
    pub name: VarName,
    /// Première instruction de la portée (absolue ; en delta sur le fil).
    pub scope_begin: u32,
    /// Nombre d'instructions couvertes par la portée.
    pub scope_len: u32,
}

impl LocalVar {
    /// Construit une portée.
    pub fn new(name: impl Into<VarName>, scope_begin: u32, scope_len: u32) -> Self {
        Self { name: name.into(), scope_begin, scope_len }
    }

    /// Instruction juste après la fin de la portée.
    #[must_use]
    pub const fn scope_end(&self) -> u32 { self.scope_begin.saturating_add(self.scope_len) }
}

/// Correspondance source d'un prototype. Absente si le script est strippé.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugInfo {
    /// Ligne de définition de la fonction.
    pub first_line: u32,
    /// Nombre de lignes source couvertes ; fixe la largeur de la table des lignes.
    pub line_count: u32,
    /// Une entrée par instruction, en décalage depuis `first_line`.
    pub lines: Vec<u32>,
    /// Un nom (octets bruts) par upvalue.
    pub upvalue_names: Vec<Vec<u8>>,
    /// Portées des variables locales, triées par `scope_begin`.
    pub locals: Vec<LocalVar>,
}

impl DebugInfo {
    /// Largeur en octets d'une entrée de la table des lignes.
    #[must_use]
    pub const fn line_width(&self) -> usize {
        if self.line_count < 256 {
            1
        } else if self.line_count < 65536 {
            2
        } else {
            4
        }
    }

    /// Ligne source absolue de l'instruction `pc`.
    pub fn source_line(&self, pc: usize) -> Option<u32> {
        self.lines.get(pc).map(|off| self.first_line.wrapping_add(*off))
    }

    /// Nom de l'upvalue `index`.
    pub fn upvalue_name(&self, index: usize) -> Option<&[u8]> { self.upvalue_names.get(index).map(Vec::as_slice) }

    /// Nom de la `slot`-ième variable vivante à `pc`.
    pub fn variable_name(&self, pc: u32, slot: usize) -> Option<&[u8]> {
        let mut slot = slot;
        for local in &self.locals {
            if local.scope_begin > pc {
                break;
            }
            if pc < local.scope_end() {
                if slot == 0 {
                    return Some(local.name.as_bytes());
                }
                slot -= 1;
            }
        }
        None
    }
}

/* ─────────────────────────── Prototype ─────────────────────────── */

/// Corps de fonction compilé.
///
/// `children` possède les prototypes imbriqués ; une constante `Child(i)`
/// désigne `children[i]`. `parent` est un chemin dans le script, rempli par
/// [`Script::link_parents`](crate::Script::link_parents).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prototype {
    /// Octet de flags.
    pub flags: PrototypeFlags,
    /// Nombre de paramètres fixes.
    pub args: u8,
    /// Taille du cadre de registres.
    pub max_slot: u8,
    /// Correspondance source, `None` si strippé.
    pub debug: Option<DebugInfo>,
    /// Instructions.
    pub code: Vec<Instruction>,
    /// Descripteurs d'upvalue.
    pub upvalues: Vec<Upvalue>,
    /// Constantes génériques, ordre de déclaration.
    pub constants: Vec<GenericConstant>,
    /// Constantes numériques, ordre de déclaration.
    pub numbers: Vec<NumberConstant>,
    /// Prototypes imbriqués.
    pub children: Vec<Prototype>,
    #[cfg_attr(feature = "serde", serde(skip))]
    parent: Option<ProtoPath>,
}

impl Prototype {
    /// Prototype vide.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Ajoute un enfant et renvoie la constante qui le désigne.
    /// L'appelant doit encore placer cette constante dans `constants`.
    pub fn add_child(&mut self, child: Prototype) -> GenericConstant {
        self.children.push(child);
        self.flags |= PrototypeFlags::HAS_CHILDREN;
        GenericConstant::Child(self.children.len() - 1)
    }

    /// Résout une constante `Child`.
    pub fn child(&self, constant: &GenericConstant) -> Option<&Prototype> {
        match constant {
            GenericConstant::Child(ix) => self.children.get(*ix),
            _ => None,
        }
    }

    /// Chemin du prototype englobant (`None` pour la racine ou si non lié).
    pub fn parent(&self) -> Option<&ProtoPath> { self.parent.as_ref() }

    pub(crate) fn set_parent(&mut self, parent: Option<ProtoPath>) { self.parent = parent; }

    /// Vrai si la fonction accepte `...`.
    pub fn is_vararg(&self) -> bool { self.flags.contains(PrototypeFlags::VARARG) }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_child_returns_reference() {
        let mut p = Prototype::new();
        let c0 = p.add_child(Prototype::new());
        let mut second = Prototype::new();
        second.args = 2;
        let c1 = p.add_child(second);
        assert_eq!(c0, GenericConstant::Child(0));
        assert_eq!(c1, GenericConstant::Child(1));
        assert!(p.flags.contains(PrototypeFlags::HAS_CHILDREN));
        assert_eq!(p.child(&c1).map(|c| c.args), Some(2));
        assert!(p.child(&GenericConstant::Int64(0)).is_none());
    }

    #[test]
    fn line_width_thresholds() {
        let mut d = DebugInfo { line_count: 255, ..DebugInfo::default() };
        assert_eq!(d.line_width(), 1);
        d.line_count = 256;
        assert_eq!(d.line_width(), 2);
        d.line_count = 65535;
        assert_eq!(d.line_width(), 2);
        d.line_count = 65536;
        assert_eq!(d.line_width(), 4);
    }

    #[test]
    fn variable_lookup_by_live_slot() {
        let d = DebugInfo {
            locals: vec![
                LocalVar::new("a", 0, 10),
                LocalVar::new(VarName::Special(SpecialVar::ForIndex), 2, 3),
                LocalVar::new("b", 4, 6),
                LocalVar::new("late", 20, 1),
            ],
            ..DebugInfo::default()
        };
        assert_eq!(d.variable_name(3, 0), Some(&b"a"[..]));
        assert_eq!(d.variable_name(3, 1), Some(&b"(for index)"[..]));
        assert_eq!(d.variable_name(6, 1), Some(&b"b"[..]));
        assert_eq!(d.variable_name(6, 2), None);
        assert_eq!(d.variable_name(12, 0), None);
    }

    #[test]
    fn names_are_raw_bytes() {
        let d = DebugInfo {
            upvalue_names: vec![b"caf\xE9".to_vec()],
            locals: vec![LocalVar::new(VarName::Named(b"\xFFx".to_vec()), 0, 1)],
            ..DebugInfo::default()
        };
        assert_eq!(d.upvalue_name(0), Some(&b"caf\xE9"[..]));
        assert_eq!(d.variable_name(0, 0), Some(&b"\xFFx"[..]));
    }

    #[test]
    fn source_line_adds_first_line() {
        let d = DebugInfo { first_line: 10, line_count: 3, lines: vec![0, 1, 3], ..DebugInfo::default() };
        assert_eq!(d.source_line(2), Some(13));
        assert_eq!(d.source_line(3), None);
    }

    #[test]
    fn paths() {
        let p = ProtoPath::root().child(1).child(0);
        assert_eq!(p.to_string(), "main.1.0");
        assert_eq!(p.parent(), Some(ProtoPath::from(vec![1])));
        assert_eq!(ProtoPath::root().parent(), None);
        assert_eq!(SpecialVar::from_code(6).map(SpecialVar::name), Some("(for control)"));
        assert_eq!(SpecialVar::from_code(7), None);
    }
}
