use std::{collections::HashMap, ops::Range, path::PathBuf, sync::Arc};

use itertools::Itertools;
use rocksdb::{
    Cache, ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, ReadOptions,
    WriteBatch, WriteOptions,
};
use sysinfo::System;
use tracing::{info, trace};

use crate::error::Error;

use super::{
    Config,
    encdec::{Decode, Encode},
    table::{Table, TableIterator},
};

static TRACKER_CF_NAME: &str = "tracker";

pub type RawKey = Vec<u8>;
pub type RawValue = Vec<u8>;

/// Result type for multi_get: a vector of (key, Option<value>) pairs, in the order of the
/// requested keys.
pub type MultiGetResult<K, V> = Vec<(K, Option<V>)>;

fn tracker_cf(db: &DB) -> Result<&ColumnFamily, Error> {
    db.cf_handle(TRACKER_CF_NAME)
        .ok_or_else(|| Error::Custom(format!("missing column family '{TRACKER_CF_NAME}'")))
}

fn decode_value<T: Table>(raw: Option<Vec<u8>>) -> Result<Option<T::Value>, Error> {
    raw.map(|bytes| T::Value::decode_all(&bytes).map_err(Error::from))
        .transpose()
}

/// Buffered set of writes which are applied to storage atomically, so that a row and every index
/// entry derived from it are always observed together.
pub struct WriteTask<'a> {
    db: &'a DB,
    cf_handle: &'a ColumnFamily,
    // when we write keys, we do not write to storage, we manipulate here until we flush via write batch
    // when we read, we first check for the key here and if we dont find it we use storage
    write_buffer: HashMap<RawKey, StorageAction>,
}

impl WriteTask<'_> {
    pub fn get<T>(&self, key: &T::Key) -> Result<Option<T::Value>, Error>
    where
        T: Table,
    {
        let encoded_key = T::encode_key(key);

        if let Some(action) = self.write_buffer.get(&encoded_key) {
            trace!("fetching {} from writebuf", hex::encode(&encoded_key));

            return match action {
                StorageAction::Set(value) => Ok(Some(T::Value::decode_all(value)?)),
                StorageAction::Delete => Ok(None),
            };
        }

        let raw = self
            .db
            .get_cf_opt(self.cf_handle, &encoded_key, &ReadOptions::default())?;

        decode_value::<T>(raw)
    }

    pub fn set<T>(&mut self, key: T::Key, value: T::Value)
    where
        T: Table,
    {
        let encoded_key = T::encode_key(&key);

        trace!("setting {}", hex::encode(&encoded_key));

        self.write_buffer
            .insert(encoded_key, StorageAction::Set(value.encode()));
    }

    pub fn delete<T>(&mut self, key: T::Key)
    where
        T: Table,
    {
        let encoded_key = T::encode_key(&key);

        trace!("deleting {}", hex::encode(&encoded_key));

        self.write_buffer.insert(encoded_key, StorageAction::Delete);
    }

    pub fn finalize(self) -> FinalizedTask {
        FinalizedTask {
            write_buffer: self.write_buffer,
        }
    }
}

pub struct FinalizedTask {
    pub write_buffer: HashMap<RawKey, StorageAction>,
}

#[derive(Clone)]
pub struct StorageHandler {
    db: Arc<DB>,
    read_only: bool,
}

impl StorageHandler {
    pub fn open(config: &Config) -> Result<Self, Error> {
        Self::open_path(
            config.db_path.clone(),
            config.read_only.then(|| config.secondary_path()),
            config.rocksdb_memory_budget_bytes(),
        )
    }

    /// Opens the database at `path`. When a `secondary_path` is given the database is opened as a
    /// read-only secondary instance of the primary at `path`.
    pub fn open_path(
        path: PathBuf,
        secondary_path: Option<PathBuf>,
        memory_budget: u64,
    ) -> Result<Self, Error> {
        info!("opening db at {}...", path.display());

        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        // Enable RocksDB statistics for monitoring
        db_opts.enable_statistics();

        info!(
            "using rocksdb memory budget: {:.2} GB ({} bytes)",
            memory_budget as f64 / 1024.0 / 1024.0 / 1024.0,
            memory_budget
        );

        let block_cache_budget = (memory_budget as f64 * 0.75) as usize;
        let memtable_budget = (memory_budget as f64 * 0.25) as usize;

        let cache = Cache::new_lru_cache(block_cache_budget);

        let sys = System::new_all();
        let cpus = sys.cpus().len() as i32;
        db_opts.set_max_background_jobs(std::cmp::max(2, cpus));

        let mut cf_opts = Options::default();

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        cf_opts.set_block_based_table_factory(&block_opts);

        let per_memtable_cap = 512 * 1024 * 1024;
        cf_opts.set_write_buffer_size(std::cmp::min(memtable_budget / 2, per_memtable_cap));
        cf_opts.set_max_write_buffer_number(2);

        let cfs = vec![ColumnFamilyDescriptor::new(TRACKER_CF_NAME, cf_opts)];

        let (db, read_only) = match secondary_path {
            Some(secondary_path) => {
                // secondaries must keep every file of the primary open
                db_opts.set_max_open_files(-1);

                let db =
                    DB::open_cf_descriptors_as_secondary(&db_opts, path, secondary_path, cfs)?;

                (db, true)
            }
            None => (DB::open_cf_descriptors(&db_opts, path, cfs)?, false),
        };

        tracker_cf(&db)?;

        Ok(Self {
            db: Arc::new(db),
            read_only,
        })
    }

    pub fn begin_task(&self) -> Result<WriteTask<'_>, Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }

        Ok(WriteTask {
            db: &self.db,
            cf_handle: tracker_cf(&self.db)?,
            write_buffer: HashMap::new(),
        })
    }

    /// Flush all the pending writes of the task to storage in a single batch
    pub fn apply_task(&self, task: FinalizedTask) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }

        let cf = tracker_cf(&self.db)?;
        let mut wb = WriteBatch::default();

        for (key, action) in task.write_buffer {
            match action {
                StorageAction::Set(value) => wb.put_cf(cf, key, value),
                StorageAction::Delete => wb.delete_cf(cf, key),
            }
        }

        // keep the WAL: secondary instances only see unflushed writes by replaying it
        self.db.write_opt(wb, &WriteOptions::default())?;

        Ok(())
    }

    pub fn reader(&self) -> Reader {
        Reader {
            db: self.db.clone(),
        }
    }

    /// Secondary instances need to be manually told to catch up with the primary
    pub fn try_refresh_read_only_data(&self) -> Result<(), Error> {
        if self.read_only {
            self.db.try_catch_up_with_primary()?
        }

        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<String> {
        let cf = tracker_cf(&self.db).ok()?;

        self.db.property_value_cf(cf, name).ok().flatten()
    }

    pub fn db_property(&self, name: &str) -> Option<String> {
        self.db.property_value(name).ok().flatten()
    }
}

/// Read access to the latest data visible to this handler. Consistency across several reads is
/// provided by the request-scoped watermark, not by the reader.
#[derive(Clone)]
pub struct Reader {
    db: Arc<DB>,
}

impl Reader {
    pub fn get<T>(&self, key: &T::Key) -> Result<Option<T::Value>, Error>
    where
        T: Table,
    {
        let raw = self.db.get_cf_opt(
            tracker_cf(&self.db)?,
            T::encode_key(key),
            &ReadOptions::default(),
        )?;

        decode_value::<T>(raw)
    }

    pub fn multi_get<T>(&self, keys: Vec<T::Key>) -> Result<MultiGetResult<T::Key, T::Value>, Error>
    where
        T: Table,
    {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let cf = tracker_cf(&self.db)?;

        let encoded = keys.iter().map(T::encode_key).collect::<Vec<_>>();

        let fetched = self
            .db
            .multi_get_cf_opt(encoded.iter().map(|k| (cf, k)), &ReadOptions::default());

        keys.into_iter()
            .zip_eq(fetched)
            .map(|(key, raw)| -> Result<_, Error> { Ok((key, decode_value::<T>(raw?)?)) })
            .collect()
    }

    pub fn iter_kvs<T: Table>(
        &self,
        range: Range<Vec<u8>>,
        reverse: bool,
    ) -> Result<TableIterator<'_, T>, Error> {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(range);

        let mode = if reverse {
            IteratorMode::End
        } else {
            IteratorMode::Start
        };

        let iter = self
            .db
            .iterator_cf_opt(tracker_cf(&self.db)?, read_opts, mode);

        Ok(TableIterator::<T>::new(iter))
    }
}

pub enum StorageAction {
    Set(RawValue),
    Delete,
}
