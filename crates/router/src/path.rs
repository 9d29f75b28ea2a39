//! Request path splitting.
//!
//! The matcher never works on raw byte offsets of the request target. A path is first split into
//! percent-decoded segments which are re-joined into a normalized text (`/a/b/c`, no trailing or
//! duplicate slashes); every segment keeps its bounds inside that text, so a static prefix is a
//! plain slice of it and a wildcard capture is the tail starting at a segment.

use std::borrow::Cow;

/// A request path split into decoded segments.
///
/// The buffers are reused between requests, [`SplitPath::load`] only resets their length.
#[derive(Debug, Default, Clone)]
pub struct SplitPath {
    text: String,
    bounds: Vec<(usize, usize)>,
}

impl SplitPath {
    /// Replaces the content with the segments of `path`.
    ///
    /// Anything after `?` is ignored. Segments are percent-decoded before they are inspected: empty
    /// segments are always dropped; when `clean` is set, `.` segments are skipped and `..` removes
    /// the previous segment, never climbing above the root.
    pub fn load(&mut self, path: &str, clean: bool) {
        self.clear();

        let path = path.split_once('?').map_or(path, |(path, _query)| path);
        for token in path.split('/') {
            let decoded = urlencoding::decode(token).unwrap_or(Cow::Borrowed(token));
            match &*decoded {
                "" => continue,
                "." if clean => continue,
                ".." if clean => {
                    self.pop();
                    continue;
                }
                _ => {}
            }

            self.text.push('/');
            let start = self.text.len();
            self.text.push_str(&decoded);
            self.bounds.push((start, self.text.len()));
        }

        if self.text.is_empty() {
            self.text.push('/');
        }
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// The normalized path, `/` for the root.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The decoded segment at `index`.
    #[inline]
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.bounds.get(index).map(|&(start, end)| &self.text[start..end])
    }

    /// Iterates the segments starting at `from`.
    pub fn segments_from(&self, from: usize) -> impl Iterator<Item = &str> {
        self.bounds.iter().skip(from).map(|&(start, end)| &self.text[start..end])
    }

    /// The path made of the first `count` segments, `/` when `count` is zero.
    #[inline]
    pub fn prefix(&self, count: usize) -> &str {
        match count.checked_sub(1).and_then(|last| self.bounds.get(last)) {
            Some(&(_, end)) => &self.text[..end],
            None => "/",
        }
    }

    #[inline]
    pub(crate) fn bounds(&self, index: usize) -> (usize, usize) {
        self.bounds[index]
    }

    /// Start offset of the tail beginning at segment `index`, the text end if there is none.
    #[inline]
    pub(crate) fn tail_start(&self, index: usize) -> usize {
        self.bounds.get(index).map_or(self.text.len(), |&(start, _)| start)
    }

    #[inline]
    pub(crate) fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[start..end]
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.bounds.clear();
    }

    fn pop(&mut self) {
        if let Some((start, _)) = self.bounds.pop() {
            // drop the segment together with its leading separator
            self.text.truncate(start - 1);
        }
    }
}
