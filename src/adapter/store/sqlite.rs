//! SQLite-backed context store.
//!
//! Baselines survive restarts: the row is the source of truth and the
//! scoring path resumes from whatever counts were persisted. Each
//! read-modify-write runs in an immediate transaction, which serializes
//! updates per instrument (SQLite allows one writer at a time).

use async_trait::async_trait;
use diesel::prelude::*;

use super::db::connection::DbPool;
use super::db::model::ContextRow;
use super::db::schema::instrument_contexts;
use crate::domain::{InstrumentContext, TradeEvent};
use crate::error::{Error, Result};
use crate::port::store::ContextStore;

pub struct SqliteContextStore {
    pool: DbPool,
}

impl SqliteContextStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn get(&self, instrument_id: &str) -> Result<InstrumentContext> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let row: Option<ContextRow> = instrument_contexts::table
            .find(instrument_id)
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        match row {
            Some(row) => row.into_context(),
            None => Ok(InstrumentContext::cold(instrument_id)),
        }
    }

    async fn apply_trade(&self, trade: &TradeEvent) -> Result<InstrumentContext> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        conn.immediate_transaction(|conn| {
            let row: Option<ContextRow> = instrument_contexts::table
                .find(&trade.instrument_id)
                .first(conn)
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?;

            let mut ctx = match row {
                Some(row) => row.into_context()?,
                None => InstrumentContext::cold(&trade.instrument_id),
            };
            ctx.apply_trade(trade.size);

            diesel::replace_into(instrument_contexts::table)
                .values(ContextRow::from_context(&ctx))
                .execute(conn)
                .map_err(|e| Error::Database(e.to_string()))?;

            Ok(ctx)
        })
    }

    async fn refresh_external(
        &self,
        instrument_id: &str,
        category: &str,
        open_interest: i64,
        volume_24h: i64,
    ) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        conn.immediate_transaction(|conn| {
            let row: Option<ContextRow> = instrument_contexts::table
                .find(instrument_id)
                .first(conn)
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?;

            let mut ctx = match row {
                Some(row) => row.into_context()?,
                None => InstrumentContext::cold(instrument_id),
            };
            ctx.apply_refresh(category.to_string(), open_interest, volume_24h);

            diesel::replace_into(instrument_contexts::table)
                .values(ContextRow::from_context(&ctx))
                .execute(conn)
                .map_err(|e| Error::Database(e.to_string()))?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::store::db::connection::{create_pool, run_migrations};
    use crate::domain::FALLBACK_CATEGORY;
    use crate::testkit;
    use std::sync::Arc;

    fn setup_store() -> SqliteContextStore {
        let pool = create_pool(":memory:").expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        SqliteContextStore::new(pool)
    }

    #[tokio::test]
    async fn miss_serves_cold_default() {
        let store = setup_store();
        let ctx = store.get("NEVER-SEEN").await.unwrap();
        assert_eq!(ctx.category, FALLBACK_CATEGORY);
        assert_eq!(ctx.stats.count, 0);
    }

    #[tokio::test]
    async fn trades_accumulate_and_read_back() {
        let store = setup_store();
        for size in [40, 50, 60] {
            store
                .apply_trade(&testkit::domain::trade_sized("MKT-X", "T", size))
                .await
                .unwrap();
        }

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.stats.count, 3);
        assert!((ctx.stats.mean - 50.0).abs() < 1e-9);
        assert!((ctx.stats.stddev() - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn apply_trade_returns_post_update_context() {
        let store = setup_store();
        let ctx = store
            .apply_trade(&testkit::domain::trade_sized("MKT-X", "T1", 50))
            .await
            .unwrap();
        assert_eq!(ctx.stats.count, 1);
        assert!((ctx.stats.mean - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refresh_overwrites_external_fields_only() {
        let store = setup_store();
        store
            .apply_trade(&testkit::domain::trade_sized("MKT-X", "T1", 50))
            .await
            .unwrap();
        store
            .refresh_external("MKT-X", "politics", 1000, 2000)
            .await
            .unwrap();

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.category, "politics");
        assert_eq!(ctx.open_interest, 1000);
        assert_eq!(ctx.volume_24h, 2000);
        assert_eq!(ctx.stats.count, 1);
    }

    #[tokio::test]
    async fn baselines_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("contexts.db");
        let url = db_path.to_str().unwrap();

        {
            let pool = create_pool(url).unwrap();
            run_migrations(&pool).unwrap();
            let store = SqliteContextStore::new(pool);
            for size in [40, 50, 60] {
                store
                    .apply_trade(&testkit::domain::trade_sized("MKT-X", "T", size))
                    .await
                    .unwrap();
            }
            store
                .refresh_external("MKT-X", "politics", 1000, 2000)
                .await
                .unwrap();
        }

        // Fresh pool over the same file simulates a restart.
        let pool = create_pool(url).unwrap();
        run_migrations(&pool).unwrap();
        let store = SqliteContextStore::new(pool);

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.stats.count, 3);
        assert!((ctx.stats.mean - 50.0).abs() < 1e-9);
        assert_eq!(ctx.category, "politics");
    }

    #[tokio::test]
    async fn concurrent_trades_all_count() {
        let store = Arc::new(setup_store());

        let mut handles = vec![];
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .apply_trade(&testkit::domain::trade_sized(
                        "MKT-X",
                        &format!("T{i}"),
                        100,
                    ))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let ctx = store.get("MKT-X").await.unwrap();
        assert_eq!(ctx.stats.count, 10);
    }
}
