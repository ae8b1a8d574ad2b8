/// Single-slot memo keyed on the exact inputs of a derivation.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    entry: Option<(K, V)>,
    computations: u64,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entry: None,
            computations: 0,
        }
    }
}

impl<K: PartialEq + Clone, V> Memo<K, V> {
    pub fn get_or_compute(&mut self, key: &K, compute: impl FnOnce(&K) -> V) -> &V {
        let stale = !matches!(&self.entry, Some((cached, _)) if cached == key);
        if stale {
            self.entry = None;
            self.computations += 1;
        }
        &self
            .entry
            .get_or_insert_with(|| (key.clone(), compute(key)))
            .1
    }

    pub fn value(&self) -> Option<&V> {
        self.entry.as_ref().map(|(_, value)| value)
    }

    /// How many times the derivation actually ran.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
