use http::Method;

/// Number of methods the router keeps a table for.
pub(crate) const METHOD_COUNT: usize = 9;

pub(crate) const GET: usize = 0;
pub(crate) const HEAD: usize = 1;

/// Every routable method, in table order.
pub(crate) static METHODS: [Method; METHOD_COUNT] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Maps a method to its table slot, `None` for extension methods.
#[inline]
pub(crate) fn method_index(method: &Method) -> Option<usize> {
    let index = match method.as_str() {
        "GET" => GET,
        "HEAD" => HEAD,
        "POST" => 2,
        "PUT" => 3,
        "PATCH" => 4,
        "DELETE" => 5,
        "CONNECT" => 6,
        "OPTIONS" => 7,
        "TRACE" => 8,
        _ => return None,
    };
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::{METHODS, method_index};
    use http::Method;

    #[test]
    fn test_index_matches_table_order() {
        for (i, method) in METHODS.iter().enumerate() {
            assert_eq!(method_index(method), Some(i));
        }
    }

    #[test]
    fn test_extension_method() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(method_index(&purge), None);
    }
}
