//! Littéraux de table du pool de constantes (gabarits `TDUP`).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tag de fil d'une valeur de table. Les tags à partir de `String` portent
/// la longueur de la chaîne repliée (`tag = String + len`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TableValueType {
    /// `nil`
    Nil = 0,
    /// `false`
    False = 1,
    /// `true`
    True = 2,
    /// Entier signé 32 bits, un ULEB128.
    Int32 = 3,
    /// Motif signé 64 bits, deux moitiés ULEB128.
    Int64 = 4,
    /// Tag de base des chaînes.
    String = 5,
}

impl TableValueType {
    /// Classe un tag brut ; tout tag `>= 5` est une chaîne.
    #[must_use]
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            0 => Self::Nil,
            1 => Self::False,
            2 => Self::True,
            3 => Self::Int32,
            4 => Self::Int64,
            _ => Self::String,
        }
    }
}

/// Une valeur d'un littéral de table (clé ou valeur).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TableValue {
    /// `nil`
    Nil,
    /// `false`
    False,
    /// `true`
    True,
    /// Entier 32 bits.
    Int32(i32),
    /// Motif 64 bits.
    Int64(i64),
    /// Octets bruts de la chaîne.
    Str(Vec<u8>),
}

impl TableValue {
    /// Genre du tag (sans la longueur repliée).
    #[must_use]
    pub const fn value_type(&self) -> TableValueType {
        match self {
            Self::Nil => TableValueType::Nil,
            Self::False => TableValueType::False,
            Self::True => TableValueType::True,
            Self::Int32(_) => TableValueType::Int32,
            Self::Int64(_) => TableValueType::Int64,
            Self::Str(_) => TableValueType::String,
        }
    }

    /// Tag tel qu'écrit sur le fil (longueur de chaîne repliée).
    #[must_use]
    pub fn tag(&self) -> u64 {
        match self {
            Self::Str(s) => TableValueType::String as u64 + s.len() as u64,
            other => other.value_type() as u64,
        }
    }

    /// Construit une chaîne depuis du texte.
    pub fn str(s: impl AsRef<[u8]>) -> Self { Self::Str(s.as_ref().to_vec()) }
}

impl From<bool> for TableValue {
    fn from(v: bool) -> Self { if v { Self::True } else { Self::False } }
}
impl From<i32> for TableValue {
    fn from(v: i32) -> Self { Self::Int32(v) }
}
impl From<i64> for TableValue {
    fn from(v: i64) -> Self { Self::Int64(v) }
}
impl From<&str> for TableValue {
    fn from(v: &str) -> Self { Self::str(v) }
}

/// Littéral de table : partie tableau dense plus dictionnaire ordonné.
///
/// Le dictionnaire est une simple liste parcourue linéairement ; les clés se
/// comparent par variante et valeur, et réaffecter une clé remplace sa valeur sur place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    array: Vec<TableValue>,
    dict: Vec<(TableValue, TableValue)>,
}

impl Table {
    /// Table vide.
    #[must_use]
    pub const fn new() -> Self { Self { array: Vec::new(), dict: Vec::new() } }

    /// Partie tableau, indexée à partir de 0.
    pub fn array(&self) -> &[TableValue] { &self.array }

    /// Partie dictionnaire, dans l'ordre d'insertion.
    pub fn dictionary(&self) -> &[(TableValue, TableValue)] { &self.dict }

    /// Vrai quand les deux parties sont vides.
    pub fn is_empty(&self) -> bool { self.array.is_empty() && self.dict.is_empty() }

    /// Case `index` du tableau.
    pub fn get(&self, index: usize) -> Option<&TableValue> { self.array.get(index) }

    /// Recherche dans le dictionnaire.
    pub fn get_key(&self, key: &TableValue) -> Option<&TableValue> {
        self.dict.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insertion dans le dictionnaire ; une clé existante garde sa place et prend la nouvelle valeur.
    pub fn set(&mut self, key: TableValue, value: TableValue) {
        match self.dict.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.dict.push((key, value)),
        }
    }

    /// Retire une entrée du dictionnaire.
    pub fn remove(&mut self, key: &TableValue) -> Option<TableValue> {
        let ix = self.dict.iter().position(|(k, _)| k == key)?;
        Some(self.dict.remove(ix).1)
    }

    /// Range `value` à la case `index`, en comblant les trous avec `Nil`.
    pub fn push(&mut self, index: usize, value: TableValue) {
        if index >= self.array.len() {
            self.array.resize(index + 1, TableValue::Nil);
        }
        self.array[index] = value;
    }

    /// Retire la case `index` et décale la suite.
    pub fn pop(&mut self, index: usize) -> Option<TableValue> {
        (index < self.array.len()).then(|| self.array.remove(index))
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn gaps_are_nil() {
        let mut t = Table::new();
        t.push(3, TableValue::Int32(7));
        assert_eq!(t.array(), &[TableValue::Nil, TableValue::Nil, TableValue::Nil, TableValue::Int32(7)]);
        t.push(1, true.into());
        assert_eq!(t.get(1), Some(&TableValue::True));
        assert_eq!(t.array().len(), 4);
    }

    #[test]
    fn last_write_wins_and_order_is_kept() {
        let mut t = Table::new();
        t.set("a".into(), 1.into());
        t.set("b".into(), 2.into());
        t.set("a".into(), 3.into());
        assert_eq!(t.dictionary(), &[(TableValue::str("a"), TableValue::Int32(3)), (TableValue::str("b"), TableValue::Int32(2))]);
    }

    #[test]
    fn keys_compare_by_variant() {
        let mut t = Table::new();
        t.set(TableValue::Int32(1), "int32".into());
        t.set(TableValue::Int64(1), "int64".into());
        assert_eq!(t.dictionary().len(), 2);
        assert_eq!(t.get_key(&TableValue::Int64(1)), Some(&TableValue::str("int64")));
        assert_eq!(t.remove(&TableValue::Int32(1)), Some(TableValue::str("int32")));
        assert_eq!(t.get_key(&TableValue::Int32(1)), None);
    }

    #[test]
    fn pop_shifts() {
        let mut t = Table::new();
        t.push(0, 1.into());
        t.push(1, 2.into());
        assert_eq!(t.pop(0), Some(TableValue::Int32(1)));
        assert_eq!(t.get(0), Some(&TableValue::Int32(2)));
        assert_eq!(t.pop(5), None);
    }

    #[test]
    fn tags_fold_string_length() {
        assert_eq!(TableValue::str("abc").tag(), 8);
        assert_eq!(TableValue::Nil.tag(), 0);
        assert_eq!(TableValue::Int64(-1).tag(), 4);
        assert_eq!(TableValueType::from_tag(8), TableValueType::String);
        assert_eq!(TableValueType::from_tag(3), TableValueType::Int32);
    }
}
