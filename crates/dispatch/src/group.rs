use crate::chain::{BoxHandler, Chain, Handler};
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// A named set of routes sharing a path prefix and a middleware list.
///
/// Routes keep a handle on their group's list and read it for every request, so middleware added
/// to a group after its routes were registered still applies to them. A sub group starts from a
/// copy of its parent's list; later additions to the parent do not reach it.
#[derive(Clone)]
pub struct Group {
    name: Arc<str>,
    path: Arc<str>,
    middleware: Arc<ArcSwap<Vec<BoxHandler>>>,
}

impl Group {
    pub(crate) fn root() -> Self {
        Self::new("", "", Vec::new())
    }

    fn new(name: &str, path: &str, middleware: Vec<BoxHandler>) -> Self {
        Self { name: name.into(), path: path.into(), middleware: Arc::new(ArcSwap::from_pointee(middleware)) }
    }

    /// The label reported for routes of this group.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path prefix of this group, empty for the root.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends a middleware, most specific last.
    pub fn use_middleware<H: Handler + 'static>(&self, middleware: H) {
        self.use_boxed(Arc::new(middleware));
    }

    pub fn use_boxed(&self, middleware: BoxHandler) {
        self.middleware.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&middleware));
            next
        });
    }

    pub fn middleware_len(&self) -> usize {
        self.middleware.load().len()
    }

    /// Creates a child group under `path`, starting with this group's middleware.
    pub fn sub_group(&self, name: &str, path: &str) -> Group {
        Self::new(name, &self.join(path), Vec::clone(&self.middleware.load()))
    }

    /// The full pattern of `path` registered on this group.
    pub fn join(&self, path: &str) -> String {
        join_path(&self.path, path)
    }

    pub(crate) fn chain(&self, handlers: Vec<BoxHandler>) -> Chain {
        Chain::new(Arc::clone(&self.middleware), handlers)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("middleware", &self.middleware_len())
            .finish()
    }
}

/// Joins two path fragments with a single `/`, collapsing repeated slashes.
pub fn join_path(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_owned();
    }

    let mut joined = String::with_capacity(base.len() + path.len() + 2);
    for fragment in [base, path] {
        if fragment.is_empty() {
            continue;
        }
        if !fragment.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(fragment);
    }

    let mut collapsed = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::{Group, join_path};
    use crate::chain::{Flow, sync_handler_fn};
    use crate::context::RequestContext;

    fn noop(_ctx: &mut RequestContext) -> Flow {
        Flow::Continue
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/ping"), "/ping");
        assert_eq!(join_path("/api", "v1"), "/api/v1");
        assert_eq!(join_path("api/", "/v1/"), "/api/v1/");
        assert_eq!(join_path("/api//", "//v1"), "/api/v1");
        assert_eq!(join_path("/api", ""), "/api");
        assert_eq!(join_path("", "/"), "/");
    }

    #[test]
    fn test_sub_group_copies_parent_middleware() {
        let root = Group::root();
        root.use_middleware(sync_handler_fn(noop));

        let api = root.sub_group("api", "/api");
        api.use_middleware(sync_handler_fn(noop));
        assert_eq!(api.name(), "api");
        assert_eq!(api.path(), "/api");
        assert_eq!(api.middleware_len(), 2);

        // later additions to the parent stay with the parent
        root.use_middleware(sync_handler_fn(noop));
        assert_eq!(root.middleware_len(), 2);
        assert_eq!(api.middleware_len(), 2);

        let v1 = api.sub_group("v1", "v1");
        assert_eq!(v1.path(), "/api/v1");
        assert_eq!(v1.join("/users/:id"), "/api/v1/users/:id");
    }

    #[test]
    fn test_chain_sees_late_middleware() {
        let group = Group::root();
        let chain = group.chain(Vec::new());
        assert_eq!(chain.middleware_len(), 0);

        group.use_middleware(sync_handler_fn(noop));
        assert_eq!(chain.middleware_len(), 1);

        // clones share the list
        group.clone().use_middleware(sync_handler_fn(noop));
        assert_eq!(chain.middleware_len(), 2);
    }
}
