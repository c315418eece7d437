//! Durable rate table backed by a fjall keyspace.
//!
//! Two partitions play the part of the tables:
//!
//! - `exchange_rate`: key `SRCDST`, one row per direction. Writing an
//!   existing key replaces the row, so (source, dest) is unique.
//! - `display_order`: key is the currency code, value its default position.
//!
//! A third `meta` partition holds the last successful synchronization time
//! and the row id counter. Every write goes through one fjall batch, which
//! commits atomically across partitions: readers see a whole batch or none
//! of it.

pub mod compact;
pub mod defaults;

use crate::core::book::RateBook;
use crate::core::currency::{CurrencyCode, RatePair};
use crate::error::{RateError, StoreError};
use chrono::{DateTime, Utc};
use fjall::{Batch, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

const RATE_PARTITION: &str = "exchange_rate";
const ORDER_PARTITION: &str = "display_order";
const META_PARTITION: &str = "meta";

const LAST_SYNC_KEY: &str = "last_sync";
const NEXT_ROW_ID_KEY: &str = "next_row_id";

/// One row of the `exchange_rate` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub id: u64,
    pub source_code: CurrencyCode,
    pub dest_code: CurrencyCode,
    pub rate: f64,
}

impl RateRow {
    pub fn to_pair(&self) -> Result<RatePair, RateError> {
        RatePair::new(self.source_code, self.dest_code, self.rate)
    }
}

/// One row of the `display_order` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOrderRow {
    pub id: u64,
    pub currency_code: CurrencyCode,
    pub default_order: u32,
}

fn rate_key(source: CurrencyCode, dest: CurrencyCode) -> String {
    format!("{source}{dest}")
}

/// Handle to the rate tables. Cloning shares the same keyspace.
#[derive(Clone)]
pub struct RateStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
    order: PartitionHandle,
    meta: PartitionHandle,
    // Serializes writers so row ids are handed out once.
    write_lock: Arc<Mutex<()>>,
}

impl RateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;

        let keyspace = Config::new(path).open()?;
        let rates = keyspace.open_partition(RATE_PARTITION, PartitionCreateOptions::default())?;
        let order = keyspace.open_partition(ORDER_PARTITION, PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition(META_PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened rate store at {}", path.display());

        Ok(Self {
            keyspace,
            rates,
            order,
            meta,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Inserts or replaces every pair in one atomic batch.
    pub fn bulk_upsert(&self, pairs: &[RatePair]) -> Result<usize, StoreError> {
        self.write_rates(pairs, None)
    }

    /// Like [`bulk_upsert`](Self::bulk_upsert), also recording `completed`
    /// as the last successful synchronization in the same batch.
    pub fn bulk_upsert_synced(
        &self,
        pairs: &[RatePair],
        completed: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.write_rates(pairs, Some(completed))
    }

    // Rows are built from `RatePair`s, whose constructors already reject
    // empty codes and non-positive rates, so nothing invalid reaches a batch.
    fn write_rates(
        &self,
        pairs: &[RatePair],
        completed: Option<DateTime<Utc>>,
    ) -> Result<usize, StoreError> {
        let _guard = self.lock_writer()?;

        let mut batch = self.keyspace.batch();
        self.stage_rates(&mut batch, pairs, completed)?;
        self.commit(batch)?;

        debug!(rows = pairs.len(), "Upserted rate rows");
        Ok(pairs.len())
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("writer lock poisoned".to_string()))
    }

    // Caller holds the writer lock until the batch is committed.
    fn stage_rates(
        &self,
        batch: &mut Batch,
        pairs: &[RatePair],
        completed: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut next_id = self.next_row_id()?;
        for pair in pairs {
            let row = RateRow {
                id: next_id,
                source_code: pair.source(),
                dest_code: pair.dest(),
                rate: pair.rate(),
            };
            next_id += 1;
            batch.insert(
                &self.rates,
                rate_key(row.source_code, row.dest_code).into_bytes(),
                serde_json::to_vec(&row)?,
            );
        }
        batch.insert(&self.meta, NEXT_ROW_ID_KEY.as_bytes(), next_id.to_be_bytes().to_vec());
        if let Some(completed) = completed {
            batch.insert(&self.meta, LAST_SYNC_KEY.as_bytes(), completed.to_rfc3339().into_bytes());
        }
        Ok(())
    }

    /// Applies `batch` atomically, then flushes the journal to disk.
    ///
    /// Readers see the batch as soon as it is applied. A flush failure after
    /// that is still reported as an error, but the rows stay visible and may
    /// be lost on a crash.
    fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        batch.commit()?;
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            error!(error = %e, "Batch applied but not flushed to disk");
            return Err(e.into());
        }
        Ok(())
    }

    fn next_row_id(&self) -> Result<u64, StoreError> {
        let Some(raw) = self.meta.get(NEXT_ROW_ID_KEY)? else {
            return Ok(1);
        };
        let bytes: [u8; 8] = raw
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Unavailable("corrupt row id counter".to_string()))?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// All rows whose source is `source`, ordered by destination code.
    pub fn query_by_source(&self, source: CurrencyCode) -> Result<Vec<RateRow>, StoreError> {
        let snapshot = self.rates.snapshot();
        snapshot
            .prefix(source.as_str())
            .map(|item| {
                let (_, value) = item.map_err(fjall::Error::from)?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Rows from `source` sorted by the destination's display position.
    /// Destinations without a position sort last, by code.
    pub fn query_by_source_ordered(
        &self,
        source: CurrencyCode,
    ) -> Result<Vec<(RateRow, Option<u32>)>, StoreError> {
        let mut rows = Vec::new();
        for row in self.query_by_source(source)? {
            let position = self.display_position(row.dest_code)?;
            rows.push((row, position));
        }
        rows.sort_by(|(a, pa), (b, pb)| match (pa, pb) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.dest_code.cmp(&b.dest_code),
        });
        Ok(rows)
    }

    pub fn query_pair(
        &self,
        source: CurrencyCode,
        dest: CurrencyCode,
    ) -> Result<Option<RateRow>, StoreError> {
        match self.rates.get(rate_key(source, dest))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn rate_count(&self) -> Result<usize, StoreError> {
        Ok(self.rates.len()?)
    }

    pub fn display_position(&self, code: CurrencyCode) -> Result<Option<u32>, StoreError> {
        match self.order.get(code.as_str())? {
            Some(value) => {
                let row: DisplayOrderRow = serde_json::from_slice(&value)?;
                Ok(Some(row.default_order))
            }
            None => Ok(None),
        }
    }

    /// The display order table, sorted by position.
    pub fn display_order(&self) -> Result<Vec<DisplayOrderRow>, StoreError> {
        let mut rows: Vec<DisplayOrderRow> = self
            .order
            .iter()
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect::<Result<_, StoreError>>()?;
        rows.sort_by_key(|r| r.default_order);
        Ok(rows)
    }

    /// Inserts or replaces display positions in one batch.
    pub fn upsert_display_order(&self, entries: &[(CurrencyCode, u32)]) -> Result<(), StoreError> {
        let _guard = self.lock_writer()?;

        let mut batch = self.keyspace.batch();
        self.stage_display_order(&mut batch, entries)?;
        self.commit(batch)
    }

    fn stage_display_order(
        &self,
        batch: &mut Batch,
        entries: &[(CurrencyCode, u32)],
    ) -> Result<(), StoreError> {
        for (id, (code, position)) in (1u64..).zip(entries) {
            let row = DisplayOrderRow {
                id,
                currency_code: *code,
                default_order: *position,
            };
            batch.insert(
                &self.order,
                code.as_str().as_bytes(),
                serde_json::to_vec(&row)?,
            );
        }
        Ok(())
    }

    pub fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.meta.get(LAST_SYNC_KEY)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| StoreError::Unavailable(format!("corrupt sync timestamp '{text}': {e}")))
    }

    /// Loads the bundled rates when nothing has ever been synchronized and
    /// the rate table is empty, and the bundled display order when that
    /// table is empty. Everything seeded lands in one batch. Returns whether
    /// the rates were seeded.
    pub fn seed_defaults_if_empty(&self) -> Result<bool, StoreError> {
        let _guard = self.lock_writer()?;

        let seed_rates = self.last_sync()?.is_none() && self.rates.is_empty()?;
        let seed_order = self.order.is_empty()?;
        if !seed_rates && !seed_order {
            return Ok(false);
        }

        let mut batch = self.keyspace.batch();
        let mut rows = 0;
        if seed_rates {
            let pairs = defaults::default_pairs()?;
            self.stage_rates(&mut batch, &pairs, None)?;
            rows = pairs.len();
        }
        if seed_order {
            self.stage_display_order(&mut batch, &defaults::default_display_order()?)?;
        }
        self.commit(batch)?;

        info!(rows, display_order = seed_order, "Seeded bundled defaults");
        Ok(seed_rates)
    }

    /// Removes every rate row and the synchronization metadata.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let _guard = self.lock_writer()?;

        let mut batch = self.keyspace.batch();
        for item in self.rates.keys() {
            batch.remove(&self.rates, item?);
        }
        batch.remove(&self.meta, LAST_SYNC_KEY.as_bytes());
        self.commit(batch)?;
        info!("Cleared all exchange rates");
        Ok(())
    }
}

impl RateBook for RateStore {
    fn lookup(&self, source: CurrencyCode, dest: CurrencyCode) -> Result<Option<f64>, StoreError> {
        Ok(self.query_pair(source, dest)?.map(|row| row.rate))
    }

    fn upsert(&mut self, pairs: &[RatePair]) -> Result<(), StoreError> {
        self.bulk_upsert(pairs).map(|_| ())
    }

    fn record_sync(&mut self, pairs: &[RatePair], at: DateTime<Utc>) -> Result<(), StoreError> {
        self.bulk_upsert_synced(pairs, at).map(|_| ())
    }

    fn last_sync(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        RateStore::last_sync(self)
    }
}
