use crate::pattern::Pattern;
use http::Method;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// A registered route.
///
/// Everything but the enabled flag is fixed at registration. The flag may be flipped at any
/// time, including while requests are being served; nothing else is published through it.
pub struct Route<T> {
    method: Method,
    group: Box<str>,
    pattern: Pattern,
    value: T,
    enabled: AtomicBool,
}

impl<T> Route<T> {
    pub(crate) fn new(method: Method, group: &str, pattern: Pattern, value: T) -> Self {
        Self { method, group: group.into(), pattern, value, enabled: AtomicBool::new(true) }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The group label given at registration.
    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The pattern string as registered, e.g. `/ping/:id`.
    #[inline]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The payload stored with the route, usually its handler chain.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Disables or re-enables the route. A disabled route never matches but keeps its table slot.
    #[inline]
    pub fn disable(&self, disabled: bool) {
        self.enabled.store(!disabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl<T> fmt::Debug for Route<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("group", &self.group)
            .field("pattern", &self.pattern.as_str())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}
