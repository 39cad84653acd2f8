use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::interval;
use tracing::info;

use super::kv_store::StorageHandler;

fn mb(raw: Option<String>) -> u64 {
    raw.and_then(|x| x.parse::<u64>().ok()).unwrap_or(0) / 1024 / 1024
}

pub fn log_perf_snapshot(storage: &StorageHandler) {
    let memtables = mb(storage.property("rocksdb.cur-size-all-mem-tables"));
    let block_cache = mb(storage.db_property("rocksdb.block-cache-usage"));
    let pending_compaction = mb(storage.db_property("rocksdb.estimate-pending-compaction-bytes"));
    let live_keys = storage
        .property("rocksdb.estimate-num-keys")
        .unwrap_or_else(|| "0".into());

    let mut sys = System::new();
    let pid = Pid::from_u32(std::process::id());
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.refresh_memory();

    let app_mem_mb = sys.process(pid).map(|p| p.memory()).unwrap_or(0) / 1024 / 1024;

    info!(
        app_mem_mb,
        memtables_mb = memtables,
        block_cache_mb = block_cache,
        pending_compaction_mb = pending_compaction,
        estimated_keys = %live_keys,
        free_mem_mb = sys.free_memory() / 1024 / 1024,
        total_mem_mb = sys.total_memory() / 1024 / 1024,
        "storage stats"
    );
}

pub async fn start_stats_logger(storage: StorageHandler, every: Duration) {
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;

        log_perf_snapshot(&storage);
    }
}
