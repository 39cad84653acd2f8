use std::path::PathBuf;

use serde::Deserialize;
use sysinfo::System;
use tracing::info;

pub mod encdec;
pub mod kv_store;
pub mod stats_logger;
pub mod table;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Path of the RocksDB database maintained by the ingestion process
    pub db_path: PathBuf,
    /// Follow the ingestion process as a secondary instance instead of opening the database for
    /// writing (default true)
    #[serde(default = "default_read_only")]
    pub read_only: bool,
    /// Directory for the secondary instance's own files (default `<db_path>/secondary`)
    pub secondary_path: Option<PathBuf>,
    /// Total memory budget for RocksDB in GB (default 40% of available system memory)
    pub rocksdb_memory_budget: Option<f64>,
}

fn default_read_only() -> bool {
    true
}

impl Config {
    pub fn secondary_path(&self) -> PathBuf {
        self.secondary_path
            .clone()
            .unwrap_or_else(|| self.db_path.join("secondary"))
    }

    pub fn rocksdb_memory_budget_bytes(&self) -> u64 {
        match self.rocksdb_memory_budget {
            Some(gb) => (gb * 1024.0 * 1024.0 * 1024.0) as u64,
            None => Self::default_rocksdb_memory_budget(),
        }
    }

    fn default_rocksdb_memory_budget() -> u64 {
        let mut system = System::new();

        system.refresh_memory();

        let total_memory = system
            .cgroup_limits()
            .map(|x| x.total_memory)
            .unwrap_or_else(|| system.total_memory());

        let default_budget = (total_memory as f64 * 0.4) as u64;

        info!(
            "No RocksDB memory budget specified, using 40% of system memory: {:.2} GB ({} bytes) out of {:.2} GB total",
            default_budget as f64 / (1024.0 * 1024.0 * 1024.0),
            default_budget,
            total_memory as f64 / (1024.0 * 1024.0 * 1024.0)
        );

        default_budget
    }
}
