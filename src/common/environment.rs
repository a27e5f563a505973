//! Scoped bindings for lambda parameters during evaluation

/// Bindings held as one stack with a mark per pushed frame. Lookups
/// scan from the most recent binding so inner frames shadow outer.
pub struct SimpleEnvironment<K, V> {
    bindings: Vec<(K, V)>,
    marks: Vec<usize>,
}

impl<K: PartialEq, V> SimpleEnvironment<K, V> {
    pub fn new() -> Self {
        SimpleEnvironment {
            bindings: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Open a frame holding `frame`'s bindings
    pub fn push<I>(&mut self, frame: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.marks.push(self.bindings.len());
        self.bindings.extend(frame);
    }

    /// Discard the innermost frame
    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.bindings
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl<K: PartialEq, V> Default for SimpleEnvironment<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
