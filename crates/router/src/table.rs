use crate::route::Route;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes of one method, grouped by indexing prefix.
///
/// Candidates sharing a prefix keep their registration order, which is the tie-break between
/// otherwise indistinguishable routes.
pub(crate) struct RouteTable<T> {
    routes: HashMap<Box<str>, Vec<Arc<Route<T>>>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: HashMap::new() }
    }
}

impl<T> RouteTable<T> {
    pub(crate) fn insert(&mut self, route: Arc<Route<T>>) {
        let candidates = self.routes.entry(route.pattern().prefix().into()).or_default();
        candidates.push(route);
    }

    #[inline]
    pub(crate) fn get(&self, prefix: &str) -> Option<&[Arc<Route<T>>]> {
        self.routes.get(prefix).map(Vec::as_slice)
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Route<T>>> {
        self.routes.values().flatten()
    }
}
