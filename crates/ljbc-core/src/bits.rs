//! Helpers bit à bit pour les nombres transportés dans des flux d'entiers.
//!
//! Les doubles voyagent dans le bytecode en deux moitiés 32 bits de leur motif
//! IEEE-754 ; les entiers signés voyagent sous leur motif non signé en
//! complément à deux. Aucune conversion numérique ici.

/// Réinterprète un motif 64 bits en double (sans conversion).
#[inline]
#[must_use]
pub fn f64_from_bits(bits: u64) -> f64 { f64::from_bits(bits) }

/// Réinterprète un double en motif 64 bits (sans conversion).
#[inline]
#[must_use]
pub fn f64_to_bits(value: f64) -> u64 { value.to_bits() }

/// Coupe une valeur 64 bits en moitiés `(bas, haut)`.
#[inline]
#[must_use]
pub const fn split_u64(value: u64) -> (u32, u32) { (value as u32, (value >> 32) as u32) }

/// Recolle des moitiés `(bas, haut)` en valeur 64 bits.
#[inline]
#[must_use]
pub const fn join_u64(low: u32, high: u32) -> u64 { (low as u64) | ((high as u64) << 32) }

/// Étend le signe des `bytes` octets bas de `value` vers un `i64`.
///
/// Les bits au-dessus de la largeur sont ignorés, donc la fonction est
/// idempotente : `normalize_sign(normalize_sign(v, n) as u64, n) == normalize_sign(v, n)`.
/// À partir de 8 octets le motif est rendu tel quel.
#[must_use]
pub const fn normalize_sign(value: u64, bytes: u32) -> i64 {
    let width = bytes * 8;
    if width == 0 {
        return 0;
    }
    if width >= 64 {
        return value as i64;
    }
    let low_mask = (1u64 << width) - 1;
    let value = value & low_mask;
    let sign_bit = 1u64 << (width - 1);
    if value & sign_bit != 0 {
        (value | !low_mask) as i64
    } else {
        value as i64
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
