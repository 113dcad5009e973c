/// A macro to simplify caching logic using Redis.
///
/// Checks whether a value is present in the cache and returns it when found.
/// Otherwise the provided block computes the value, the result is queued for a
/// background cache write, and the computed value is returned.
///
/// # Arguments
/// * `$cache`: The cache instance to use for retrieval and storage. The cache
///   must have `get_from_cache` and `set_in_background` methods.
/// * `$key`: The key to use for caching the value.
/// * `$ttl`: The time-to-live (TTL) for the cached value in seconds.
/// * `$block`: The block of code to execute if the value is not found in cache.
///
/// # Example
/// ```ignore
/// let results = cached!(cache, cache_key, ttl, async move {
///     fetch_ranked_matches(&title)
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        // Attempt to get the value from cache
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            // If not in cache, execute the block to compute the value
            let value = $block.await?;
            // Store the computed value in cache
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
