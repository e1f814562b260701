/// Read-through caching over the Redis [`Cache`](crate::db::Cache).
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$future`, queues the result for a background write with `$ttl` seconds
/// to live, and returns it. Errors from Redis or the future are propagated
/// with `?`, so the macro must be used inside a function returning `AppResult`.
///
/// ```rust,ignore
/// let hits = cached!(cache, CacheKey::SongSearch(query, 1), 3600, fetch(query))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $future:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_from_cache(&key).await? {
            Ok(cached)
        } else {
            let value = $future.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
