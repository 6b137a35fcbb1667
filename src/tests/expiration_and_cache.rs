#[cfg(test)]
mod test {
    use chrono::TimeDelta;

    use crate::error::{AuthError, ExchangeError};
    use crate::helpers::time::from_unix;
    use crate::tests::common::{test_cache, FakeExchanger, FixedClock, MemoryStore, TEST_AUDIENCE};

    #[tokio::test]
    async fn token_inside_margin_is_refreshed() {
        let clock = FixedClock::at(1000);
        let exchanger = FakeExchanger::issuing("T1", 1000 + 3600);
        let store = MemoryStore::empty();
        let cache = test_cache(&exchanger, &store, clock.clone());

        assert_eq!(cache.get_valid_token().await.unwrap(), "T1");
        assert_eq!(exchanger.calls(), 1);

        let claims = &exchanger.assertions()[0];
        assert_eq!(claims.iss, "sa-1");
        assert_eq!(claims.aud, TEST_AUDIENCE);
        assert_eq!((claims.iat, claims.exp), (1000, 4600));

        // still fresh a second before the margin starts
        clock.set(4299);
        assert_eq!(cache.get_valid_token().await.unwrap(), "T1");
        assert_eq!(exchanger.calls(), 1);

        // 250s before expiry, inside the 300s margin
        clock.set(4350);
        exchanger.issue("T2", 4350 + 3600);
        assert_eq!(cache.get_valid_token().await.unwrap(), "T2");
        assert_eq!(exchanger.calls(), 2);
        assert_eq!(exchanger.assertions()[1].iat, 4350);
    }

    #[tokio::test]
    async fn valid_cached_token_skips_exchange() {
        let clock = FixedClock::at(1000);
        let exchanger = FakeExchanger::issuing("unused", 9000);
        let store = MemoryStore::holding("cached", 5000);
        let cache = test_cache(&exchanger, &store, clock);

        assert!(cache.restore().await);
        assert_eq!(cache.get_valid_token().await.unwrap(), "cached");
        assert_eq!(exchanger.calls(), 0);
        assert_eq!(
            cache.refresh_due_at().await,
            Some(from_unix(5000) - TimeDelta::minutes(5))
        );
    }

    #[tokio::test]
    async fn stale_restored_token_is_replaced() {
        let clock = FixedClock::at(4800);
        let exchanger = FakeExchanger::issuing("fresh", 4800 + 3600);
        let store = MemoryStore::holding("old", 5000);
        let cache = test_cache(&exchanger, &store, clock);

        assert!(cache.restore().await);
        assert_eq!(cache.get_valid_token().await.unwrap(), "fresh");
        assert_eq!(exchanger.calls(), 1);
        assert_eq!(store.saved().unwrap().value, "fresh");
    }

    #[tokio::test]
    async fn token_issued_inside_margin_is_never_returned() {
        let clock = FixedClock::at(1000);
        let exchanger = FakeExchanger::issuing("short", 1000 + 100);
        let store = MemoryStore::empty();
        let cache = test_cache(&exchanger, &store, clock);

        let err = cache.get_valid_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Exchange(ExchangeError::ShortLived { .. })));
        assert_eq!(store.saves(), 0);
        assert_eq!(cache.refresh_due_at().await, None);
    }

    #[tokio::test]
    async fn empty_cache_without_persisted_token() {
        let clock = FixedClock::at(1000);
        let exchanger = FakeExchanger::issuing("T1", 4600);
        let store = MemoryStore::empty();
        let cache = test_cache(&exchanger, &store, clock);

        assert!(!cache.restore().await);
        assert_eq!(cache.refresh_due_at().await, None);
        assert_eq!(cache.get_valid_token().await.unwrap(), "T1");
    }
}
