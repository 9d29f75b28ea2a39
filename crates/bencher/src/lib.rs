pub mod criterion {
    //! `criterion`, or its codspeed drop-in when the `codspeed` feature is on.

    #[cfg(not(feature = "codspeed"))]
    pub use ::criterion::*;

    #[cfg(feature = "codspeed")]
    pub use codspeed_criterion_compat::*;
}

/// A named set of routes with the request paths that exercise it.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    routes: RouteSet,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, routes: RouteSet) -> Self {
        Self { name, group, routes }
    }

    pub fn small(name: &'static str, routes: RouteSet) -> Self {
        Self::new(name, TestGroup::Small, routes)
    }

    pub fn large(name: &'static str, routes: RouteSet) -> Self {
        Self::new(name, TestGroup::Large, routes)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }
}

/// `(method, pattern)` registrations and `(method, path)` requests, every request matching one
/// of the patterns.
#[derive(Debug, Copy, Clone)]
pub struct RouteSet {
    patterns: &'static [(&'static str, &'static str)],
    requests: &'static [(&'static str, &'static str)],
}

impl RouteSet {
    pub const fn new(patterns: &'static [(&'static str, &'static str)], requests: &'static [(&'static str, &'static str)]) -> Self {
        Self { patterns, requests }
    }

    pub fn patterns(&self) -> &'static [(&'static str, &'static str)] {
        self.patterns
    }

    pub fn requests(&self) -> &'static [(&'static str, &'static str)] {
        self.requests
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

pub static SMALL_API: RouteSet = RouteSet::new(
    &[
        ("GET", "/"),
        ("GET", "/users/:id"),
        ("POST", "/users"),
        ("GET", "/x/:uid/members"),
        ("GET", "/x/:uid/goals"),
        ("GET", "/home/*path"),
    ],
    &[("GET", "/"), ("GET", "/users/42"), ("POST", "/users"), ("GET", "/x/1034/goals"), ("GET", "/home/docs/report.json")],
);

pub static LARGE_API: RouteSet = RouteSet::new(
    &[
        ("GET", "/authorizations"),
        ("GET", "/authorizations/:id"),
        ("POST", "/authorizations"),
        ("DELETE", "/authorizations/:id"),
        ("GET", "/events"),
        ("GET", "/repos/:owner/:repo/events"),
        ("GET", "/networks/:owner/:repo/events"),
        ("GET", "/orgs/:org/events"),
        ("GET", "/users/:user/received_events"),
        ("GET", "/users/:user/received_events/public"),
        ("GET", "/users/:user/events"),
        ("GET", "/users/:user/events/public"),
        ("GET", "/users/:user/events/orgs/:org"),
        ("GET", "/feeds"),
        ("GET", "/notifications"),
        ("GET", "/repos/:owner/:repo/notifications"),
        ("PUT", "/notifications"),
        ("GET", "/notifications/threads/:id"),
        ("GET", "/repos/:owner/:repo/stargazers"),
        ("GET", "/users/:user/starred"),
        ("GET", "/user/starred"),
        ("PUT", "/user/starred/:owner/:repo"),
        ("DELETE", "/user/starred/:owner/:repo"),
        ("GET", "/repos/:owner/:repo/subscribers"),
        ("GET", "/users/:user/subscriptions"),
        ("GET", "/user/subscriptions"),
        ("GET", "/users/:user/gists"),
        ("GET", "/gists"),
        ("GET", "/gists/:id"),
        ("POST", "/gists"),
        ("PUT", "/gists/:id/star"),
        ("DELETE", "/gists/:id/star"),
        ("GET", "/repos/:owner/:repo/git/blobs/:sha"),
        ("POST", "/repos/:owner/:repo/git/blobs"),
        ("GET", "/repos/:owner/:repo/git/commits/:sha"),
        ("GET", "/repos/:owner/:repo/git/refs"),
        ("GET", "/repos/:owner/:repo/git/tags/:sha"),
        ("GET", "/repos/:owner/:repo/git/trees/:sha"),
        ("GET", "/issues"),
        ("GET", "/user/issues"),
        ("GET", "/orgs/:org/issues"),
        ("GET", "/repos/:owner/:repo/issues"),
        ("GET", "/repos/:owner/:repo/issues/:number"),
        ("POST", "/repos/:owner/:repo/issues"),
        ("GET", "/repos/:owner/:repo/pulls"),
        ("GET", "/repos/:owner/:repo/pulls/:number/files"),
        ("GET", "/repos/:owner/:repo/contents/*path"),
        ("GET", "/search/repositories"),
        ("GET", "/search/code"),
        ("GET", "/legacy/user/email/:email"),
    ],
    &[
        ("GET", "/authorizations"),
        ("GET", "/authorizations/1"),
        ("GET", "/repos/rust-lang/rust/events"),
        ("GET", "/users/zava/events/orgs/foldright"),
        ("PUT", "/user/starred/foldright/micro-http"),
        ("GET", "/repos/foldright/micro-http/git/blobs/3ad4f1"),
        ("GET", "/repos/foldright/micro-http/issues/42"),
        ("GET", "/repos/foldright/micro-http/pulls/7/files"),
        ("GET", "/repos/foldright/micro-http/contents/crates/router/src/lib.rs"),
        ("GET", "/search/code"),
        ("GET", "/legacy/user/email/zava.kid@gmail.com"),
    ],
);

pub fn create_test_cases() -> Vec<TestCase> {
    vec![TestCase::small("small_api", SMALL_API), TestCase::large("github_api", LARGE_API)]
}
