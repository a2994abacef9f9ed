//! Database model types for Diesel ORM.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::instrument_contexts;
use crate::domain::{InstrumentContext, RunningStats};
use crate::error::{Error, Result};

/// Database row for an instrument context.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = instrument_contexts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ContextRow {
    pub instrument_id: String,
    pub category: String,
    pub open_interest: i64,
    pub volume_24h: i64,
    pub sample_count: i64,
    pub mean: f64,
    pub m2: f64,
    pub updated_at: String,
}

impl ContextRow {
    pub fn from_context(ctx: &InstrumentContext) -> Self {
        Self {
            instrument_id: ctx.instrument_id.clone(),
            category: ctx.category.clone(),
            open_interest: ctx.open_interest,
            volume_24h: ctx.volume_24h,
            sample_count: ctx.stats.count as i64,
            mean: ctx.stats.mean,
            m2: ctx.stats.m2,
            updated_at: ctx.updated_at.to_rfc3339(),
        }
    }

    pub fn into_context(self) -> Result<InstrumentContext> {
        let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| Error::Parse(e.to_string()))?
            .with_timezone(&Utc);

        Ok(InstrumentContext {
            instrument_id: self.instrument_id,
            category: self.category,
            open_interest: self.open_interest,
            volume_24h: self.volume_24h,
            stats: RunningStats {
                count: self.sample_count.max(0) as u64,
                mean: self.mean,
                m2: self.m2,
            },
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips_context() {
        let mut ctx = InstrumentContext::cold("MKT-X");
        ctx.apply_refresh("politics".into(), 1000, 2000);
        for size in [10, 20, 30] {
            ctx.apply_trade(size);
        }

        let row = ContextRow::from_context(&ctx);
        let back = row.into_context().unwrap();

        assert_eq!(back.instrument_id, "MKT-X");
        assert_eq!(back.category, "politics");
        assert_eq!(back.stats.count, 3);
        assert!((back.stats.mean - ctx.stats.mean).abs() < 1e-12);
        assert!((back.stats.m2 - ctx.stats.m2).abs() < 1e-12);
        assert!((back.updated_at - ctx.updated_at).num_seconds().abs() < 1);
    }

    #[test]
    fn bad_timestamp_is_a_parse_error() {
        let row = ContextRow {
            instrument_id: "MKT-X".into(),
            category: "other".into(),
            open_interest: 0,
            volume_24h: 0,
            sample_count: 0,
            mean: 0.0,
            m2: 0.0,
            updated_at: "not-a-time".into(),
        };
        assert!(matches!(row.into_context(), Err(Error::Parse(_))));
    }
}
