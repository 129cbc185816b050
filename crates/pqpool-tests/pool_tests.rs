//! Multi-threaded pool tests against the counting mock connector
//!
//! Single-task pool behaviour is covered by the unit tests next to the pool;
//! these runs hammer one pool from many tasks and check that the counters
//! still agree with the connector afterwards.

#[cfg(test)]
mod pool_tests {
    use pqpool::{OverheadPolicy, PoolConfig, PoolError};
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::fixtures::mock_pool;

    #[rstest]
    #[case::counter_small(1, 2, OverheadPolicy::Counter)]
    #[case::counter(2, 4, OverheadPolicy::Counter)]
    #[case::tagged_small(1, 2, OverheadPolicy::Tagged)]
    #[case::tagged(2, 4, OverheadPolicy::Tagged)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_leases_keep_invariants(
        #[case] min_size: usize,
        #[case] max_size: usize,
        #[case] policy: OverheadPolicy,
    ) -> anyhow::Result<()> {
        let config = PoolConfig::new(min_size, max_size).with_overhead_policy(policy);
        let (pool, connector) = mock_pool(config).await;
        let pool = Arc::new(pool);

        let mut tasks = Vec::new();
        for worker in 0..16 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let lease = pool.acquire().await?;
                    lease.try_execute("SELECT 1").await?;
                    if worker % 2 == 0 {
                        tokio::task::yield_now().await;
                    }
                    lease.release().await;
                }
                Ok::<_, PoolError>(())
            }));
        }
        for task in tasks {
            task.await??;
        }

        let stats = pool.stats();
        assert_eq!(stats.overhead(), 0);
        assert_eq!(stats.leased(), 0);
        assert_eq!(stats.total(), stats.idle());
        assert!(
            stats.total() <= max_size,
            "total {} exceeds max_size {}",
            stats.total(),
            max_size
        );
        assert_eq!(connector.live(), stats.total());

        pool.close().await;
        assert_eq!(connector.live(), 0);
        Ok(())
    }

    #[rstest]
    #[case::counter(OverheadPolicy::Counter)]
    #[case::tagged(OverheadPolicy::Tagged)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dropped_leases_settle(
        #[case] policy: OverheadPolicy,
    ) -> anyhow::Result<()> {
        let config = PoolConfig::new(1, 3).with_overhead_policy(policy);
        let (pool, connector) = mock_pool(config).await;
        let pool = Arc::new(pool);

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                for _ in 0..10 {
                    let _lease = pool.acquire().await?;
                    tokio::task::yield_now().await;
                }
                Ok::<_, PoolError>(())
            }));
        }
        for task in tasks {
            task.await??;
        }

        // Closes of discarded connections run on spawned tasks
        for _ in 0..100 {
            if connector.live() == pool.stats().total() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stats = pool.stats();
        assert_eq!(stats.overhead(), 0);
        assert_eq!(stats.total(), stats.idle());
        assert!(stats.total() <= 3);
        assert_eq!(connector.live(), stats.total());

        pool.close().await;
        Ok(())
    }
}
