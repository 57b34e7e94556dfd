//! Descripteurs d'upvalue compactés.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const INDEX_MASK: u16 = 0x3FFF;
const READONLY_BIT: u16 = 0x4000;
const LOCAL_BIT: u16 = 0x8000;

/// Upvalue d'un prototype : un slot de la fonction englobante (`local`) ou
/// une des upvalues de cette fonction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Upvalue {
    /// Index de slot ou d'upvalue dans la fonction englobante (14 bits).
    pub index: u16,
    /// La variable capturée n'est jamais réaffectée.
    pub readonly: bool,
    /// Désigne un slot local plutôt qu'une upvalue externe.
    pub local: bool,
}

impl Upvalue {
    /// Plus grand index encodable.
    pub const MAX_INDEX: u16 = INDEX_MASK;

    /// Découpe la forme 16 bits du fil.
    #[must_use]
    pub const fn from_packed(raw: u16) -> Self {
        Self { index: raw & INDEX_MASK, readonly: raw & READONLY_BIT != 0, local: raw & LOCAL_BIT != 0 }
    }

    /// Compacte en forme 16 bits. Les bits d'index au-delà de 14 sont perdus.
    #[must_use]
    pub const fn packed(&self) -> u16 {
        let mut raw = self.index & INDEX_MASK;
        if self.readonly {
            raw |= READONLY_BIT;
        }
        if self.local {
            raw |= LOCAL_BIT;
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_round_trip() {
        let uv = Upvalue::from_packed(0xC003);
        assert_eq!(uv, Upvalue { index: 3, readonly: true, local: true });
        assert_eq!(uv.packed(), 0xC003);
    }

    #[test]
    fn flags_are_independent() {
        assert_eq!(Upvalue::from_packed(0x4001), Upvalue { index: 1, readonly: true, local: false });
        assert_eq!(Upvalue::from_packed(0x8000 | 0x3FFF).index, Upvalue::MAX_INDEX);
        assert_eq!(Upvalue { index: 0x7FFF, readonly: false, local: false }.packed(), 0x3FFF);
    }
}
