//! Connection pool gauges, sampled on every scrape.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, Opts, Registry};

use crate::database::Database;
use crate::pool::DbPool;

/// Reports the pool's open, idle and in-use connection counts.
#[derive(Debug, Clone)]
pub struct PoolCollector {
    pool: DbPool,
    open: IntGauge,
    idle: IntGauge,
    in_use: IntGauge,
}

impl PoolCollector {
    pub fn new(pool: DbPool) -> Result<Self, prometheus::Error> {
        Ok(Self {
            pool,
            open: IntGauge::with_opts(Opts::new(
                "app_db_connections_open",
                "Number of established connections, in use and idle.",
            ))?,
            idle: IntGauge::with_opts(Opts::new(
                "app_db_connections_idle",
                "Number of idle connections.",
            ))?,
            in_use: IntGauge::with_opts(Opts::new(
                "app_db_connections_in_use",
                "Number of connections currently in use.",
            ))?,
        })
    }
}

impl Collector for PoolCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.open
            .desc()
            .into_iter()
            .chain(self.idle.desc())
            .chain(self.in_use.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let open = i64::from(self.pool.size());
        let idle = i64::try_from(self.pool.num_idle()).unwrap_or(i64::MAX);
        self.open.set(open);
        self.idle.set(idle);
        self.in_use.set((open - idle).max(0));

        let mut families = self.open.collect();
        families.extend(self.idle.collect());
        families.extend(self.in_use.collect());
        families
    }
}

impl Database {
    /// Register the pool gauges on `registry`.
    pub fn register_metrics(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(PoolCollector::new(self.pool.clone())?))
    }
}
