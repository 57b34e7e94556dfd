//! Entrées du pool de constantes d'un prototype.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Tag de fil d'une constante générique. Les tags à partir de `String` sont
/// des chaînes dont la longueur est repliée dans le tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GenericConstantType {
    /// Prototype imbriqué, pris sur la pile des prototypes en attente.
    Child = 0,
    /// Littéral de table.
    Table = 1,
    /// Entier signé 64 bits (cdata).
    Int64 = 2,
    /// Entier non signé 64 bits (cdata).
    Uint64 = 3,
    /// Nombre complexe (cdata).
    Complex = 4,
    /// Tag de base des chaînes.
    String = 5,
}

impl GenericConstantType {
    /// Classe un tag brut ; tout tag `>= 5` est une chaîne.
    #[must_use]
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            0 => Self::Child,
            1 => Self::Table,
            2 => Self::Int64,
            3 => Self::Uint64,
            4 => Self::Complex,
            _ => Self::String,
        }
    }
}

/// Nombre complexe, comparé bit à bit.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Complex {
    /// Partie réelle.
    pub re: f64,
    /// Partie imaginaire.
    pub im: f64,
}

impl PartialEq for Complex {
    fn eq(&self, other: &Self) -> bool {
        self.re.to_bits() == other.re.to_bits() && self.im.to_bits() == other.im.to_bits()
    }
}

impl Eq for Complex {}

/// Entrée non numérique du pool de constantes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GenericConstant {
    /// Index dans les `children` du prototype propriétaire.
    Child(usize),
    /// Littéral de table.
    Table(Table),
    /// Entier signé 64 bits.
    Int64(i64),
    /// Entier non signé 64 bits.
    Uint64(u64),
    /// Nombre complexe.
    Complex(Complex),
    /// Octets bruts de la chaîne.
    Str(Vec<u8>),
}

impl GenericConstant {
    /// Genre du tag (sans la longueur repliée).
    #[must_use]
    pub const fn constant_type(&self) -> GenericConstantType {
        match self {
            Self::Child(_) => GenericConstantType::Child,
            Self::Table(_) => GenericConstantType::Table,
            Self::Int64(_) => GenericConstantType::Int64,
            Self::Uint64(_) => GenericConstantType::Uint64,
            Self::Complex(_) => GenericConstantType::Complex,
            Self::Str(_) => GenericConstantType::String,
        }
    }

    /// Tag tel qu'écrit sur le fil (longueur de chaîne repliée).
    #[must_use]
    pub fn tag(&self) -> u64 {
        match self {
            Self::Str(s) => GenericConstantType::String as u64 + s.len() as u64,
            other => other.constant_type() as u64,
        }
    }

    /// Construit une chaîne depuis du texte.
    pub fn str(s: impl AsRef<[u8]>) -> Self { Self::Str(s.as_ref().to_vec()) }

    /// Octets de la chaîne, si c'en est une.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Entrée numérique du pool de constantes. La variante fixe la forme sur le fil.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NumberConstant {
    /// Entier 32 bits (bit de marque à 0).
    Int(i32),
    /// Double (bit de marque à 1, deux moitiés de 32 bits).
    Float(f64),
}

impl NumberConstant {
    /// Valeur en double.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => f64::from(i),
            Self::Float(f) => f,
        }
    }
}

impl PartialEq for NumberConstant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for NumberConstant {}

impl From<i32> for NumberConstant {
    fn from(v: i32) -> Self { Self::Int(v) }
}
impl From<f64> for NumberConstant {
    fn from(v: f64) -> Self { Self::Float(v) }
}

/* ─────────────────────────── Tests ─────────────────────────── */
