//! Buffer d'octets extensible avec une seule position lecture/écriture.
//!
//! Le même curseur sert dans les deux sens : le décodeur lit un curseur
//! construit sur les octets source, l'encodeur écrit dans des curseurs neufs
//! puis les recolle avec [`ByteCursor::write_cursor`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{CoreError, CoreResult};

/* ─────────────────────────── Endianness ─────────────────────────── */

/// Ordre des octets des entiers à largeur fixe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Octet de poids fort en premier.
    Big,
    /// Octet de poids faible en premier.
    Little,
}

impl Endian {
    /// Ordre des octets de l'hôte.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") { Endian::Big } else { Endian::Little }
    }
}

impl Default for Endian {
    fn default() -> Self { Self::native() }
}

/* ─────────────────────────── Cursor ─────────────────────────── */

/// Buffer extensible + offset courant.
///
/// La taille logique est la longueur du vecteur interne ; l'allocation
/// grandit d'au moins la moitié de sa capacité quand une écriture manque de place.
/// L'offset ne dépasse jamais la taille logique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCursor {
    buf: Vec<u8>,
    pos: usize,
    endian: Endian,
}

const INITIAL_CAPACITY: usize = 16;

impl ByteCursor {
    /// Curseur vide, ordre des octets de l'hôte.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(INITIAL_CAPACITY), pos: 0, endian: Endian::native() }
    }

    /// Curseur sur des octets possédés, positionné en 0.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self { Self { buf: data, pos: 0, endian: Endian::native() } }

    /// Curseur sur une copie de `data`.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self { Self::from_vec(data.to_vec()) }

    /// Fixe l'ordre des octets (style builder).
    #[must_use]
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Ordre des octets courant.
    pub const fn endian(&self) -> Endian { self.endian }

    /// Change l'ordre des octets des accès suivants.
    pub fn set_endian(&mut self, endian: Endian) { self.endian = endian; }

    /// Offset courant.
    pub const fn tell(&self) -> usize { self.pos }

    /// Déplace l'offset (borné à la taille logique).
    pub fn seek(&mut self, pos: usize) { self.pos = pos.min(self.buf.len()); }

    /// Avance/recule de `delta` octets (borné à `0..=len`).
    pub fn skip(&mut self, delta: isize) { self.seek(self.pos.saturating_add_signed(delta)); }

    /// Taille logique en octets.
    pub fn len(&self) -> usize { self.buf.len() }

    /// Vrai si rien n'a été écrit ni chargé.
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    /// Octets restants entre l'offset et la fin logique.
    pub fn remaining(&self) -> usize { self.buf.len().saturating_sub(self.pos) }

    /// Espace alloué.
    pub fn capacity(&self) -> usize { self.buf.capacity() }

    /// Octets valides.
    pub fn as_slice(&self) -> &[u8] { &self.buf }

    /// Consomme le curseur et rend les octets valides.
    pub fn into_vec(self) -> Vec<u8> { self.buf }

    /// Remet taille logique et offset à zéro ; l'allocation est conservée.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    /* ───────────── octets bruts ───────────── */

    /// Lit `n` octets bruts.
    pub fn read_bytes(&mut self, n: usize) -> CoreResult<&[u8]> {
        let start = self.pos;
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CoreError::OutOfRange { offset: start, needed: n, size: self.buf.len() })?;
        self.pos = end;
        Ok(&self.buf[start..end])
    }

    /// Écrit des octets bruts à l'offset (le buffer grandit au besoin).
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.want_write(bytes.len()).copy_from_slice(bytes); }

    /// Écrit à l'offset les octets valides d'un autre curseur.
    pub fn write_cursor(&mut self, other: &ByteCursor) { self.write_bytes(other.as_slice()); }

    /// Lit une chaîne terminée par NUL ; le terminateur est consommé, pas rendu.
    pub fn read_cstr(&mut self) -> CoreResult<&[u8]> {
        let start = self.pos;
        let tail = self.buf.get(start..).unwrap_or_default();
        let Some(nul) = tail.iter().position(|&b| b == 0) else {
            return Err(CoreError::OutOfRange { offset: self.buf.len(), needed: 1, size: self.buf.len() });
        };
        self.pos = start + nul + 1;
        Ok(&self.buf[start..start + nul])
    }

    /// Écrit `bytes` suivi d'un NUL.
    pub fn write_cstr(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
        self.write_u8(0);
    }

    /// Octet à l'offset, sans le consommer.
    pub fn peek_u8(&self) -> CoreResult<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(CoreError::OutOfRange { offset: self.pos, needed: 1, size: self.buf.len() })
    }

    /* ───────────── largeur fixe ───────────── */

    /// Lit un entier non signé de `width` octets (1..=4).
    pub fn read_uint(&mut self, width: usize) -> CoreResult<u32> {
        check_width(width)?;
        let endian = self.endian;
        let bytes = self.read_bytes(width)?;
        let value = match endian {
            Endian::Big => BigEndian::read_uint(bytes, width),
            Endian::Little => LittleEndian::read_uint(bytes, width),
        };
        Ok(value as u32)
    }

    /// Lit un entier signé (complément à deux) de `width` octets (1..=4).
    pub fn read_int(&mut self, width: usize) -> CoreResult<i32> {
        check_width(width)?;
        let endian = self.endian;
        let bytes = self.read_bytes(width)?;
        let value = match endian {
            Endian::Big => BigEndian::read_int(bytes, width),
            Endian::Little => LittleEndian::read_int(bytes, width),
        };
        Ok(value as i32)
    }

    /// Écrit les `width` octets bas (1..=4) de `value`.
    pub fn write_uint(&mut self, value: u32, width: usize) -> CoreResult<()> {
        check_width(width)?;
        let masked = u64::from(value) & width_mask(width);
        let endian = self.endian;
        let slot = self.want_write(width);
        match endian {
            Endian::Big => BigEndian::write_uint(slot, masked, width),
            Endian::Little => LittleEndian::write_uint(slot, masked, width),
        }
        Ok(())
    }

    /// Écrit un entier signé via son motif non signé.
    pub fn write_int(&mut self, value: i32, width: usize) -> CoreResult<()> {
        self.write_uint(value as u32, width)
    }

    /// Lit un octet.
    pub fn read_u8(&mut self) -> CoreResult<u8> { Ok(self.read_bytes(1)?[0]) }
    /// Lit un u16.
    pub fn read_u16(&mut self) -> CoreResult<u16> { Ok(self.read_uint(2)? as u16) }
    /// Lit un u32.
    pub fn read_u32(&mut self) -> CoreResult<u32> { self.read_uint(4) }
    /// Lit un i8.
    pub fn read_i8(&mut self) -> CoreResult<i8> { Ok(self.read_int(1)? as i8) }
    /// Lit un i16.
    pub fn read_i16(&mut self) -> CoreResult<i16> { Ok(self.read_int(2)? as i16) }
    /// Lit un i32.
    pub fn read_i32(&mut self) -> CoreResult<i32> { self.read_int(4) }

    /// Écrit un octet.
    pub fn write_u8(&mut self, value: u8) { self.want_write(1)[0] = value; }

    /// Écrit un u16.
    pub fn write_u16(&mut self, value: u16) {
        let endian = self.endian;
        let slot = self.want_write(2);
        match endian {
            Endian::Big => BigEndian::write_u16(slot, value),
            Endian::Little => LittleEndian::write_u16(slot, value),
        }
    }

    /// Écrit un u32.
    pub fn write_u32(&mut self, value: u32) {
        let endian = self.endian;
        let slot = self.want_write(4);
        match endian {
            Endian::Big => BigEndian::write_u32(slot, value),
            Endian::Little => LittleEndian::write_u32(slot, value),
        }
    }

    /// Écrit un i8.
    pub fn write_i8(&mut self, value: i8) { self.write_u8(value as u8); }
    /// Écrit un i16.
    pub fn write_i16(&mut self, value: i16) { self.write_u16(value as u16); }
    /// Écrit un i32.
    pub fn write_i32(&mut self, value: i32) { self.write_u32(value as u32); }

    /* ───────────── ULEB128 ───────────── */

    /// Lit un entier base 128 qui doit tenir sur 32 bits.
    pub fn read_uleb128(&mut self) -> CoreResult<u32> {
        let start = self.pos;
        let value = self.read_varint()?;
        u32::try_from(value)
            .map_err(|_| CoreError::corrupted(format!("ULEB128 value {value} exceeds 32 bits at offset {start}")))
    }

    /// Lit un ULEB128_33 : le bit bas est la marque, le reste la valeur.
    pub fn read_uleb128_33(&mut self) -> CoreResult<(bool, u32)> {
        let start = self.pos;
        let raw = self.read_varint()?;
        let mark = raw & 1 != 0;
        let value = u32::try_from(raw >> 1)
            .map_err(|_| CoreError::corrupted(format!("ULEB128_33 value exceeds 33 bits at offset {start}")))?;
        Ok((mark, value))
    }

    /// Écrit `value` en ULEB128 canonique (minimal).
    pub fn write_uleb128(&mut self, value: u32) { self.write_varint(u64::from(value)); }

    /// Écrit `value` décalé d'un bit, `mark` dans le bit bas.
    pub fn write_uleb128_33(&mut self, mark: bool, value: u32) {
        self.write_varint((u64::from(value) << 1) | u64::from(mark));
    }

    fn read_varint(&mut self) -> CoreResult<u64> {
        let start = self.pos;
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(CoreError::corrupted(format!("ULEB128 value too long at offset {start}")));
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.write_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.write_u8(value as u8);
    }

    /* ───────────── croissance ───────────── */

    fn want_write(&mut self, n: usize) -> &mut [u8] {
        let start = self.pos;
        let end = start + n;
        if end > self.buf.capacity() {
            self.grow(end);
        }
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.pos = end;
        &mut self.buf[start..end]
    }

    fn grow(&mut self, required: usize) {
        let capacity = self.buf.capacity();
        let target = (capacity + capacity / 2).max(required);
        self.buf.reserve_exact(target - self.buf.len());
    }
}

fn check_width(width: usize) -> CoreResult<()> {
    if (1..=4).contains(&width) { Ok(()) } else { Err(CoreError::InvalidWidth(width)) }
}

const fn width_mask(width: usize) -> u64 { (1u64 << (width * 8)) - 1 }

/* ─────────────────────────── Tests ─────────────────────────── */
