// Deterministic cache-key derivation.
//
// The read path (response caching) and the invalidation path (post-flush
// purge) both derive keys through `api_cache_key`. Keeping a single pure
// function is the invariant that prevents stale-cache bugs: a key built
// when a response is cached must be byte-identical to the key built when a
// later mutation invalidates it.

use std::collections::BTreeMap;

/// Everything that identifies one cached API response.
///
/// Params and query live in ordered maps so iteration order - and therefore
/// the derived key - never depends on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeySpec {
    pub route: String,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub authenticated_user: Option<String>,
}

impl CacheKeySpec {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.authenticated_user = Some(user.into());
        self
    }
}

/// Derive the cache key for an API response.
///
/// Layout: `{env}:api-cache{route with '/' -> ':'}[:{params}][:userId:{id}]`
/// followed by the query segments, or `:cursor:none` when the query is
/// empty so paginated and unpaginated reads of the same route never share
/// an entry.
pub fn api_cache_key(env: &str, spec: &CacheKeySpec) -> String {
    let route = spec.route.replace('/', ":");
    let mut key = format!("{env}:api-cache{route}");

    if !spec.params.is_empty() {
        key.push(':');
        key.push_str(&join_segments(&spec.params));
    }

    if let Some(user) = &spec.authenticated_user {
        key.push_str(":userId:");
        key.push_str(user);
    }

    if spec.query.is_empty() {
        key.push_str(":cursor:none");
    } else {
        key.push(':');
        key.push_str(&join_segments(&spec.query));
    }

    key
}

fn join_segments(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let a = CacheKeySpec::new("/v1/like").param("postId", "p42");
        let b = CacheKeySpec::new("/v1/like").param("postId", "p42");
        assert_eq!(api_cache_key("test", &a), api_cache_key("test", &b));
    }

    #[test]
    fn key_shape_matches_expected_layout() {
        let spec = CacheKeySpec::new("/v1/like").param("postId", "p42");
        assert_eq!(
            api_cache_key("test", &spec),
            "test:api-cache:v1:like:postId:p42:cursor:none"
        );

        let with_user = CacheKeySpec::new("/v1/like").user("u7");
        assert_eq!(
            api_cache_key("test", &with_user),
            "test:api-cache:v1:like:userId:u7:cursor:none"
        );

        let with_query = CacheKeySpec::new("/v1/comment")
            .param("postId", "p42")
            .query("cursor", "c9");
        assert_eq!(
            api_cache_key("test", &with_query),
            "test:api-cache:v1:comment:postId:p42:cursor:c9"
        );
    }

    #[test]
    fn segment_order_is_independent_of_insertion_order() {
        let ab = CacheKeySpec::new("/v1/x").param("a", "1").param("b", "2");
        let ba = CacheKeySpec::new("/v1/x").param("b", "2").param("a", "1");
        assert_eq!(api_cache_key("test", &ab), api_cache_key("test", &ba));
    }

    #[test]
    fn distinct_users_get_distinct_keys() {
        let u1 = CacheKeySpec::new("/v1/like").user("u1");
        let u2 = CacheKeySpec::new("/v1/like").user("u2");
        assert_ne!(api_cache_key("test", &u1), api_cache_key("test", &u2));
    }
}
