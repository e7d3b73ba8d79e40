use redis::RedisResult;
use tracing::debug;

/// Shared Redis handle. Only used for request rate limiting; seat state never
/// lives here.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `true` while `key` has made at most
    /// `limit` calls in the current window. The window starts at the first
    /// call; later calls never extend it (`EXPIRE ... NX`, Redis 7+).
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window_seconds)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > limit {
            debug!(key, count, limit, "Rate limit exceeded");
        }
        Ok(count <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    // Needs a live Redis: set REDIS_URL and run with `--ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_window_is_not_extended_by_later_calls() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let client = RedisClient::new(&url).unwrap();
        let key = format!("ratelimit:test:{}", uuid::Uuid::new_v4());

        assert!(client.check_rate_limit(&key, 2, 60).await.unwrap());
        let mut conn = client.client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.expire(&key, 5).await.unwrap();

        assert!(client.check_rate_limit(&key, 2, 60).await.unwrap());
        assert!(!client.check_rate_limit(&key, 2, 60).await.unwrap());
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((1..=5).contains(&ttl), "window was pushed out to {ttl}s");
    }
}
