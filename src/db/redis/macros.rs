/// Wraps a catalog lookup with optional Redis caching.
///
/// `$cache` is an `Option<&Cache>`. On a hit the cached value is returned;
/// otherwise `$block` runs and its value is queued for a background write
/// with the given TTL in seconds. Without a cache the block simply runs.
/// A failed cache read is logged and treated as a miss.
///
/// # Example
/// ```rust,ignore
/// let ids: Vec<String> = cached!(self.cache.as_ref(), key, 3600, async move {
///     fetch_ids().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache {
            Some(cache) => match cache.get_from_cache(&$key).await {
                Ok(Some(cached)) => Ok(cached),
                lookup => {
                    if let Err(e) = lookup {
                        tracing::warn!(key = %$key, error = %e, "Cache read failed, using source");
                    }
                    let value = $block.await?;
                    cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
            },
            None => $block.await,
        }
    }};
}
