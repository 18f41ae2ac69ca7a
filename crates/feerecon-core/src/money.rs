//! Currency amounts are always two-decimal fixed point, never `f64`; a
//! float would silently drift across the rollup/consolidation arithmetic
//! this engine depends on (§3: "a billable unit in internal currency
//! (two-decimal)").

pub use rust_decimal::Decimal as Money;

pub fn zero() -> Money {
    Money::ZERO
}
