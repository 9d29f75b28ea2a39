//! Path parameters extracted from a matched request path.

use crate::path::SplitPath;
use crate::pattern::Pattern;
use crate::pool::Recycle;
use std::fmt;
use std::sync::Arc;

/// Ordered `(name, value)` pairs, one per dynamic segment of the matched route.
///
/// A `Params` value doubles as the scratch buffer the matcher splits the request path into, so
/// reusing one across requests avoids allocating once its buffers have grown. Values borrow from
/// that buffer; use [`Params::to_vec`] to keep them past the request.
#[derive(Default, Clone)]
pub struct Params {
    path: SplitPath,
    entries: Vec<Entry>,
    sized_for: usize,
}

#[derive(Clone)]
struct Entry {
    name: Arc<str>,
    start: usize,
    end: usize,
}

impl Params {
    /// Creates a buffer able to hold `max_params` entries without growing.
    pub fn with_capacity(max_params: usize) -> Self {
        Self { path: SplitPath::default(), entries: Vec::with_capacity(max_params), sized_for: max_params }
    }

    /// Number of captured parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets the value of a parameter by name.
    ///
    /// Names are not deduplicated; when a pattern reuses one, the last capture wins.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.entries.iter().rev().find(|entry| &*entry.name == name).map(|entry| self.value(entry))
    }

    /// Iterates `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|entry| (&*entry.name, self.value(entry)))
    }

    /// Copies the parameters out of the buffer.
    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.iter().map(|(name, value)| (name.to_owned(), value.to_owned())).collect()
    }

    /// The normalized request path the parameters were captured from.
    #[inline]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// The number of entries this buffer was sized for.
    #[inline]
    pub fn sized_for(&self) -> usize {
        self.sized_for
    }

    #[inline]
    pub(crate) fn split_path(&self) -> &SplitPath {
        &self.path
    }

    pub(crate) fn load_path(&mut self, path: &str, clean: bool) {
        self.entries.clear();
        self.path.load(path, clean);
    }

    /// Records the captures of `pattern` against the loaded path, whose first `from` segments
    /// matched the pattern prefix.
    pub(crate) fn capture(&mut self, pattern: &Pattern, from: usize) {
        self.entries.clear();
        let entries = &mut self.entries;
        pattern.capture(&self.path, from, |name, start, end| {
            entries.push(Entry { name: Arc::clone(name), start, end });
        });
    }

    #[inline]
    fn value(&self, entry: &Entry) -> &str {
        self.path.slice(entry.start, entry.end)
    }
}

impl Recycle for Params {
    fn recycle(&mut self) {
        self.entries.clear();
        self.path.clear();
    }

    fn pool_key(&self) -> usize {
        self.sized_for
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::Params;
    use crate::pattern::Pattern;
    use crate::pool::Recycle;

    fn params(pattern: &str, path: &str) -> Params {
        let pattern = Pattern::compile(pattern).unwrap();
        let from = pattern.prefix().split('/').filter(|token| !token.is_empty()).count();

        let mut params = Params::with_capacity(pattern.dynamic_count());
        params.load_path(path, true);
        params.capture(&pattern, from);
        params
    }

    #[test]
    fn test_get_and_iter() {
        let params = params("/users/:user/posts/:post", "/users/42/posts/7");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("user"), Some("42"));
        assert_eq!(params.get("post"), Some("7"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("user", "42"), ("post", "7")]);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let params = params("/a/:id/:id", "/a/first/second");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("second"));
    }

    #[test]
    fn test_to_vec_outlives_buffer() {
        let mut params = params("/users/:user", "/users/42");
        let copied = params.to_vec();
        params.recycle();

        assert!(params.is_empty());
        assert_eq!(params.path(), "");
        assert_eq!(copied, vec![("user".to_string(), "42".to_string())]);
    }

    #[test]
    fn test_recycle_keeps_capacity() {
        let mut params = params("/:x/:y/:z", "/a/b/c");
        params.recycle();
        assert_eq!(params.sized_for(), 3);
        assert_eq!(params.pool_key(), 3);
        assert!(params.entries.capacity() >= 3);
    }
}
