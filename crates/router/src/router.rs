use crate::error::RouteError;
use crate::method::{GET, HEAD, METHOD_COUNT, METHODS, method_index};
use crate::params::Params;
use crate::path::SplitPath;
use crate::pattern::Pattern;
use crate::pool::{Pool, Pooled};
use crate::route::Route;
use crate::table::RouteTable;
use http::Method;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Matching behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Resolve `.` and `..` segments before matching.
    pub auto_clean_path: bool,
    /// Serve HEAD requests with the GET route when no HEAD route matches.
    pub head_to_get: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self { auto_clean_path: true, head_to_get: true }
    }
}

impl RouterOptions {
    #[must_use]
    pub fn auto_clean_path(mut self, enabled: bool) -> Self {
        self.auto_clean_path = enabled;
        self
    }

    #[must_use]
    pub fn head_to_get(mut self, enabled: bool) -> Self {
        self.head_to_get = enabled;
        self
    }
}

/// Outcome of a lookup.
#[derive(Debug)]
pub enum Lookup<R> {
    Found(R),
    /// The path matches routes of other methods only.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

impl<R> Lookup<R> {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<R> {
        match self {
            Lookup::Found(found) => Some(found),
            Lookup::MethodNotAllowed { .. } | Lookup::NotFound => None,
        }
    }
}

/// A matched route together with its pooled params, returned to the pool on drop.
pub struct Matched<'r, T> {
    route: &'r Arc<Route<T>>,
    params: Pooled<'r, Params>,
}

impl<'r, T> Matched<'r, T> {
    #[inline]
    pub fn route(&self) -> &'r Arc<Route<T>> {
        self.route
    }

    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl<T> fmt::Debug for Matched<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matched").field("route", self.route).field("params", &*self.params).finish()
    }
}

/// Per-method route tables plus the matcher working on them.
///
/// Registration takes `&mut self` and belongs to application setup; once the router is shared
/// (usually behind an `Arc`) it is read only, apart from the per-route enabled flag.
pub struct Router<T> {
    tables: [RouteTable<T>; METHOD_COUNT],
    options: RouterOptions,
    max_params: usize,
    params: Pool<Params>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

impl<T> Router<T> {
    pub fn new(options: RouterOptions) -> Self {
        Self { tables: std::array::from_fn(|_| RouteTable::default()), options, max_params: 0, params: Pool::new(0) }
    }

    #[inline]
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// The largest number of dynamic segments among registered routes.
    #[inline]
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// A params buffer sized for the current route set.
    pub fn new_params(&self) -> Params {
        Params::with_capacity(self.max_params)
    }

    /// Compiles `pattern` and registers it under `method`.
    ///
    /// Routes sharing a prefix are tried in registration order, so when two of them fit the same
    /// path the first one registered wins.
    ///
    /// # Errors
    ///
    /// Fails when the pattern holds an invalid wildcard or the method is not one of the nine
    /// standard ones.
    pub fn add_route(&mut self, group: &str, method: Method, pattern: &str, value: T) -> Result<Arc<Route<T>>, RouteError> {
        let index = method_index(&method).ok_or_else(|| RouteError::unsupported_method(&method))?;
        let pattern = Pattern::compile(pattern)?;

        if pattern.dynamic_count() > self.max_params {
            self.max_params = pattern.dynamic_count();
            self.params.set_key(self.max_params);
        }

        let route = Arc::new(Route::new(method, group, pattern, value));
        self.tables[index].insert(Arc::clone(&route));
        debug!(method = %route.method(), path = route.path(), group, "route registered");
        Ok(route)
    }

    /// Iterates every registered route.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route<T>>> {
        self.tables.iter().flat_map(RouteTable::iter)
    }

    /// Matches `method` and `path`, capturing parameters into a pooled buffer.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<Matched<'_, T>> {
        let mut params = self.params.acquire(Params::with_capacity);
        match self.lookup_into(method, path, &mut params) {
            Lookup::Found(route) => Lookup::Found(Matched { route, params }),
            Lookup::MethodNotAllowed { allowed } => Lookup::MethodNotAllowed { allowed },
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Matches `method` and `path`, capturing parameters into `params`.
    ///
    /// `params` is reset first. On a miss it still holds the split path but no entries.
    pub fn lookup_into(&self, method: &Method, path: &str, params: &mut Params) -> Lookup<&Arc<Route<T>>> {
        params.load_path(path, self.options.auto_clean_path);
        let index = method_index(method);

        let found = index.and_then(|index| self.find(index, params.split_path())).or_else(|| {
            if self.options.head_to_get && *method == Method::HEAD {
                self.find(GET, params.split_path())
            } else {
                None
            }
        });

        if let Some((route, from)) = found {
            params.capture(route.pattern(), from);
            return Lookup::Found(route);
        }

        let allowed = self.allowed(index, params.split_path());
        trace!(method = %method, path = params.path(), allowed = allowed.len(), "no route matched");
        if allowed.is_empty() { Lookup::NotFound } else { Lookup::MethodNotAllowed { allowed } }
    }

    /// Disables or re-enables the route `path` resolves to under `method`.
    ///
    /// `path` may be a concrete request path or the pattern itself. Returns whether a route was found.
    pub fn disable_route(&self, method: &Method, path: &str, disabled: bool) -> bool {
        let Some(index) = method_index(method) else {
            return false;
        };

        let mut split = SplitPath::default();
        split.load(path, self.options.auto_clean_path);
        match self.select(index, &split) {
            Some((route, _)) => {
                route.disable(disabled);
                debug!(method = %method, path = route.path(), disabled, "route toggled");
                true
            }
            None => false,
        }
    }

    /// The enabled route matching `path` in table `index`, with the number of prefix segments.
    #[inline]
    fn find(&self, index: usize, path: &SplitPath) -> Option<(&Arc<Route<T>>, usize)> {
        self.select(index, path).filter(|(route, _)| route.is_enabled())
    }

    /// Scans prefixes of `path` from the longest to `/`. The first prefix with candidates decides;
    /// no shorter prefix is tried when none of them fits.
    fn select(&self, index: usize, path: &SplitPath) -> Option<(&Arc<Route<T>>, usize)> {
        let table = &self.tables[index];
        if table.is_empty() {
            return None;
        }

        (0..=path.len()).rev().find_map(|count| {
            table
                .get(path.prefix(count))
                .map(|candidates| candidates.iter().find(|route| route.pattern().accepts(path, count)).map(|route| (route, count)))
        })?
    }

    fn allowed(&self, skip: Option<usize>, path: &SplitPath) -> Vec<Method> {
        let mut allowed: Vec<Method> = (0..METHOD_COUNT)
            .filter(|&index| Some(index) != skip && self.find(index, path).is_some())
            .map(|index| METHODS[index].clone())
            .collect();

        if self.options.head_to_get && skip != Some(HEAD) && allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("options", &self.options)
            .field("max_params", &self.max_params)
            .field("routes", &self.routes().count())
            .finish_non_exhaustive()
    }
}
