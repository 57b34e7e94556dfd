//! Dump de bytecode complet : en-tête plus arbre des prototypes.

use bitflags::bitflags;
use ljbc_core::CoreResult;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::prototype::{ProtoPath, Prototype};

/// Seule version de bytecode prise en charge.
pub const VERSION: u8 = 2;

/// Octets de tête de tout dump.
pub const MAGIC: [u8; 3] = *b"\x1BLJ";

bitflags! {
    /// Flags d'en-tête (ULEB128 sur le fil).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ScriptFlags: u32 {
        /// Champs de largeur fixe en big-endian.
        const BIG_ENDIAN  = 1 << 0;
        /// Ni nom de chunk ni blocs de debug.
        const STRIP_DEBUG = 1 << 1;
        /// Requiert la bibliothèque FFI.
        const USE_FFI     = 1 << 2;
    }
}

impl ScriptFlags {
    /// Flags par défaut d'un nouveau dump sur cet hôte.
    #[must_use]
    pub fn host_default() -> Self {
        let mut flags = Self::STRIP_DEBUG;
        if cfg!(target_endian = "big") {
            flags |= Self::BIG_ENDIAN;
        }
        flags
    }
}

/// Dump de bytecode décodé (ou assemblé par l'appelant).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Script {
    version: u8,
    /// Flags d'en-tête.
    pub flags: ScriptFlags,
    /// Nom du chunk (`@file.lua`, `=stdin`, ...), octets bruts ; écrit seulement si le debug est conservé.
    pub chunk_name: Vec<u8>,
    /// Fonction principale.
    pub root: Prototype,
}

impl Default for Script {
    fn default() -> Self { Self::new() }
}

impl Script {
    /// Script vide : version 2, chunk `"?"`, strippé, ordre d'octets de l'hôte.
    #[must_use]
    pub fn new() -> Self {
        Self { version: VERSION, flags: ScriptFlags::host_default(), chunk_name: b"?".to_vec(), root: Prototype::new() }
    }

    pub(crate) fn from_parts(flags: ScriptFlags, chunk_name: Vec<u8>, root: Prototype) -> Self {
        let mut script = Self { version: VERSION, flags, chunk_name, root };
        script.link_parents();
        script
    }

    /// Décode un dump avec la table d'opcodes intégrée.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> { Decoder::new().decode(bytes) }

    /// Encode le script avec la table d'opcodes intégrée.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> { Encoder::new().encode(self) }

    /// Version du bytecode (toujours 2).
    pub const fn version(&self) -> u8 { self.version }

    /// Vrai sauf si `STRIP_DEBUG` est posé.
    pub fn has_debug(&self) -> bool { !self.flags.contains(ScriptFlags::STRIP_DEBUG) }

    /// Retire le nom du chunk et tous les blocs de debug, et pose `STRIP_DEBUG`.
    pub fn strip_debug(&mut self) {
        fn strip(p: &mut Prototype) {
            p.debug = None;
            p.children.iter_mut().for_each(strip);
        }
        self.flags |= ScriptFlags::STRIP_DEBUG;
        self.chunk_name.clear();
        strip(&mut self.root);
    }

    /// Prototype à `path`.
    pub fn prototype(&self, path: &ProtoPath) -> Option<&Prototype> {
        path.indices().iter().try_fold(&self.root, |p, &ix| p.children.get(ix))
    }

    /// Prototype mutable à `path`.
    pub fn prototype_mut(&mut self, path: &ProtoPath) -> Option<&mut Prototype> {
        path.indices().iter().try_fold(&mut self.root, |p, &ix| p.children.get_mut(ix))
    }

    /// Tous les prototypes, en profondeur, parents avant enfants.
    pub fn walk(&self) -> Vec<(ProtoPath, &Prototype)> {
        fn visit<'a>(p: &'a Prototype, path: ProtoPath, out: &mut Vec<(ProtoPath, &'a Prototype)>) {
            let children: Vec<ProtoPath> = (0..p.children.len()).map(|ix| path.child(ix)).collect();
            out.push((path, p));
            for (child, child_path) in p.children.iter().zip(children) {
                visit(child, child_path, out);
            }
        }
        let mut out = Vec::new();
        visit(&self.root, ProtoPath::root(), &mut out);
        out
    }

    /// Recalcule le lien parent de chaque prototype.
    pub fn link_parents(&mut self) {
        fn link(p: &mut Prototype, path: &ProtoPath) {
            for (ix, child) in p.children.iter_mut().enumerate() {
                child.set_parent(Some(path.clone()));
                link(child, &path.child(ix));
            }
        }
        self.root.set_parent(None);
        link(&mut self.root, &ProtoPath::root());
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */
