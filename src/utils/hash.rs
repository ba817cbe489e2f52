//! Fast, non-cryptographic hash collections keyed by small values like
//! handles and thread names.

use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hasher};

/// A builder of default `FxHasher`s.
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// A `HashMap` with a fast, non-cryptographic hasher.
pub type FastHashMap<K, V> = HashMap<K, V, FxBuildHasher>;

/// A `HashSet` with a fast, non-cryptographic hasher.
pub type FastHashSet<V> = HashSet<V, FxBuildHasher>;

const SEED: u64 = 0x51_7c_c1_b7_27_22_0a_95;
const ROTATE: u32 = 5;

/// The multiply-rotate hasher used by rustc and Firefox. Quality is fine for
/// short keys; do not feed it untrusted input.
#[derive(Default)]
pub struct FxHasher {
    hash: u64,
}

impl FxHasher {
    #[inline]
    fn add_to_hash(&mut self, i: u64) {
        self.hash = (self.hash.rotate_left(ROTATE) ^ i).wrapping_mul(SEED);
    }
}

impl Hasher for FxHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.add_to_hash(u64::from(*b));
        }
    }

    #[inline]
    fn write_u8(&mut self, i: u8) {
        self.add_to_hash(u64::from(i));
    }

    #[inline]
    fn write_u16(&mut self, i: u16) {
        self.add_to_hash(u64::from(i));
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.add_to_hash(u64::from(i));
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.add_to_hash(i);
    }

    #[inline]
    fn write_usize(&mut self, i: usize) {
        self.add_to_hash(i as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collections() {
        let mut set = FastHashSet::default();
        assert_eq!(set.insert("render1"), true);
        assert_eq!(set.insert("render1"), false);
        assert_eq!(set.insert("render2"), true);
        assert_eq!(set.len(), 2);

        let mut map = FastHashMap::default();
        assert_eq!(map.insert("cull", 1), None);
        assert_eq!(map.insert("cull", 2), Some(1));
        assert_eq!(map.get("cull"), Some(&2));
    }

    #[test]
    fn stable() {
        let hash = |v: &str| {
            let mut state = FxHasher::default();
            state.write(v.as_bytes());
            state.finish()
        };

        assert_eq!(hash("draw"), hash("draw"));
        assert_ne!(hash("draw"), hash("cull"));
    }
}
