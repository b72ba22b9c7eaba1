//! The concrete migrations run by the binaries.

mod order_dates;
mod prepayment;
mod products;

pub use order_dates::{OrderDateBackfill, backfill_patch};
pub use prepayment::{PrepaymentFlagBackfill, backfill_prepayment_flag};
pub use products::{ProductSchemaMigration, build_items, normalize_product};
