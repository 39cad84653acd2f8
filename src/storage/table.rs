use std::{marker::PhantomData, ops::Range};

use rocksdb::DBIterator;

use crate::error::Error;

use super::encdec::{Decode, DecodingError, Encode, EncodeBuilder, prefix_key_range};

pub const CORE_TABLE_TAG: u8 = b'C';
pub const LEDGER_TABLE_TAG: u8 = b'L';

/// Defines a CoreTable, holding tracker-wide bookkeeping rather than ledger records.
///
/// # Example
/// ```ignore
/// define_core_table! {
///     name: ProcessedHeightKV,
///     key_type: (),
///     value_type: u64,
///     table: CoreTables::ProcessedHeight
/// }
/// ```
#[macro_export]
macro_rules! define_core_table {
    {
        name: $name:ident,
        key_type: $key_type:ty,
        value_type: $value_type:ty,
        table: $table_id:expr
    } => {
        pub struct $name;

        impl $crate::storage::table::Table for $name {
            type Key = $key_type;
            type Value = $value_type;

            const PREFIX: [u8; 2] = [$crate::storage::table::CORE_TABLE_TAG, $table_id as u8];
        }
    };
}

/// Defines a LedgerTable, holding one ledger relation or one of its secondary indexes.
///
/// # Example
/// ```ignore
/// define_ledger_table! {
///     name: TxOutByRefKV,
///     key_type: TxoRef,
///     value_type: TxOut,
///     table: LedgerTables::TxOutByRef
/// }
/// ```
#[macro_export]
macro_rules! define_ledger_table {
    {
        name: $name:ident,
        key_type: $key_type:ty,
        value_type: $value_type:ty,
        table: $table_id:expr
    } => {
        pub struct $name;

        impl $crate::storage::table::Table for $name {
            type Key = $key_type;
            type Value = $value_type;

            const PREFIX: [u8; 2] = [$crate::storage::table::LEDGER_TABLE_TAG, $table_id as u8];
        }
    };
}

/// A table with a unique two byte prefix (namespace tag and table id) and key-value types.
pub trait Table {
    /// Key type for the table.
    type Key: Encode + Decode;

    /// Value type for the table.
    type Value: Encode + Decode;

    /// Prepended to every encoded key of the table.
    const PREFIX: [u8; 2];

    /// Encodes the full key by combining the table prefix and the encoded key.
    fn encode_key(key: &Self::Key) -> Vec<u8> {
        EncodeBuilder::new().append(&Self::PREFIX).append(key).build()
    }

    /// Strips the table prefix from a raw key and decodes the remainder.
    fn decode_key(raw: &[u8]) -> Result<Self::Key, DecodingError> {
        match raw.strip_prefix(&Self::PREFIX[..]) {
            Some(rest) => Self::Key::decode_all(rest),
            None => Err(DecodingError::UnexpectedPrefix(raw.to_vec())),
        }
    }

    /// Key range from `start` (inclusive) to `end` (exclusive) within this table, where either
    /// bound may be any encodable prefix of the key. Missing bounds extend to the table edges.
    fn encode_range<S: Encode, E: Encode>(start: Option<&S>, end: Option<&E>) -> Range<Vec<u8>> {
        let table_range = prefix_key_range(&Self::PREFIX);

        let start = match start {
            Some(s) => EncodeBuilder::new().append(&Self::PREFIX).append(s).build(),
            None => table_range.start,
        };

        let end = match end {
            Some(e) => EncodeBuilder::new().append(&Self::PREFIX).append(e).build(),
            None => table_range.end,
        };

        start..end
    }

    /// Key range covering every key of this table which starts with the encoded `prefix`.
    fn prefix_range<P: Encode>(prefix: &P) -> Range<Vec<u8>> {
        prefix_key_range(&EncodeBuilder::new().append(&Self::PREFIX).append(prefix).build())
    }
}

/// Iterator over a range of a table, decoding each raw key-value pair.
pub struct TableIterator<'a, T: Table> {
    inner: DBIterator<'a>,
    _table: PhantomData<T>,
}

impl<'a, T: Table> TableIterator<'a, T> {
    pub fn new(inner: DBIterator<'a>) -> Self {
        Self {
            inner,
            _table: PhantomData,
        }
    }
}

impl<T: Table> Iterator for TableIterator<'_, T> {
    type Item = Result<(T::Key, T::Value), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = self.inner.next()?;

        Some(res.map_err(Error::from).and_then(|(raw_key, raw_value)| {
            let key = T::decode_key(&raw_key)?;
            let value = T::Value::decode_all(&raw_value)?;

            Ok((key, value))
        }))
    }
}
