//! Slippage-aware Kelly sizing for binary prediction markets.
//!
//! The Kelly fraction is evaluated at the average fill price the book would
//! actually give for a candidate quantity, not at the quoted best ask, so
//! thin books shrink the allocation as the edge is eaten by slippage.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::OrderBook;
use super::SizerConfig;

/// Price returned by [`PositionSizer::vwap`] when the book cannot fill.
pub const UNFILLABLE_PRICE: Decimal = Decimal::ONE;

/// Sizing result. A zero allocation means "do not trade".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
    /// USD cost of the allocation at its own fill price
    pub size_usd: Decimal,
    /// Outcome shares to buy
    pub shares: Decimal,
    /// Volume-weighted average fill price
    pub fill_price: Decimal,
}

impl Allocation {
    pub const ZERO: Allocation = Allocation {
        size_usd: Decimal::ZERO,
        shares: Decimal::ZERO,
        fill_price: Decimal::ZERO,
    };

    pub fn is_zero(&self) -> bool {
        self.shares.is_zero()
    }
}

/// Calculator for book-walking Kelly allocations.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizerConfig,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Allocate using the configured bankroll fraction.
    pub fn allocate(&self, probability: Decimal, book: &OrderBook, bankroll: Decimal) -> Allocation {
        self.allocate_with_fraction(probability, book, bankroll, self.config.max_bankroll_fraction)
    }

    /// Largest whole-share quantity whose cost fits inside the Kelly budget
    /// evaluated at its own fill price.
    ///
    /// A coarse scan in roughly `scan_steps` steps finds the bracket where
    /// the budget stops holding, then a bisection pins down the last
    /// accepted quantity. Cost rises and the Kelly target falls with `q`,
    /// so acceptance is monotone and the bisection is exact.
    pub fn allocate_with_fraction(
        &self,
        probability: Decimal,
        book: &OrderBook,
        bankroll: Decimal,
        max_bankroll_fraction: Decimal,
    ) -> Allocation {
        if probability <= Decimal::ZERO
            || probability > Decimal::ONE
            || bankroll <= Decimal::ZERO
            || max_bankroll_fraction <= Decimal::ZERO
        {
            return Allocation::ZERO;
        }

        let Some(best_ask) = book.best_ask() else {
            return Allocation::ZERO;
        };
        if best_ask >= Decimal::ONE {
            return Allocation::ZERO;
        }

        let budget_cap = bankroll * max_bankroll_fraction.min(Decimal::ONE);
        let max_q = (budget_cap / best_ask).floor();
        if max_q < Decimal::ONE {
            return Allocation::ZERO;
        }

        let steps = Decimal::from(self.config.scan_steps.max(1));
        let step = (max_q / steps).floor().max(Decimal::ONE);

        let mut best: Option<Allocation> = None;
        let mut first_rejected: Option<Decimal> = None;

        let mut q = step.min(max_q);
        while q <= max_q {
            match self.evaluate(probability, book, bankroll, budget_cap, q) {
                Some(candidate) => best = Some(candidate),
                None => {
                    first_rejected = Some(q);
                    break;
                }
            }
            q += step;
        }

        // Bisect between the last accepted quantity and the first rejected one.
        if let Some(rejected) = first_rejected {
            let mut lo = best.map(|a| a.shares).unwrap_or(Decimal::ZERO);
            let mut hi = rejected;
            while hi - lo > Decimal::ONE {
                let mid = ((lo + hi) / Decimal::TWO).floor();
                match self.evaluate(probability, book, bankroll, budget_cap, mid) {
                    Some(candidate) => {
                        best = Some(candidate);
                        lo = mid;
                    }
                    None => hi = mid,
                }
            }
        }

        let allocation = best.unwrap_or(Allocation::ZERO);
        debug!(
            probability = %probability,
            best_ask = %best_ask,
            shares = %allocation.shares,
            size_usd = %allocation.size_usd,
            fill = %allocation.fill_price,
            "Sized allocation"
        );
        allocation
    }

    /// Accept `q` if the edge survives at its fill and the cost fits both the
    /// Kelly target and the bankroll cap.
    fn evaluate(
        &self,
        probability: Decimal,
        book: &OrderBook,
        bankroll: Decimal,
        budget_cap: Decimal,
        q: Decimal,
    ) -> Option<Allocation> {
        let fill = Self::vwap(book, q);
        if fill >= UNFILLABLE_PRICE {
            return None;
        }

        let kelly = Self::kelly(probability, fill)?;
        if kelly <= Decimal::ZERO {
            return None;
        }

        let target = kelly * bankroll;
        let cost = fill * q;
        if cost > target || cost > budget_cap {
            return None;
        }

        Some(Allocation {
            size_usd: cost,
            shares: q,
            fill_price: fill,
        })
    }

    /// Binary-market Kelly fraction `(p - f) / (1 - f)`, undefined for `f >= 1`.
    pub fn kelly(probability: Decimal, fill_price: Decimal) -> Option<Decimal> {
        if fill_price >= Decimal::ONE {
            return None;
        }
        Some((probability - fill_price) / (Decimal::ONE - fill_price))
    }

    /// Average price for `shares` walking the asks, or [`UNFILLABLE_PRICE`]
    /// if the book runs out first.
    pub fn vwap(book: &OrderBook, shares: Decimal) -> Decimal {
        if shares <= Decimal::ZERO {
            return UNFILLABLE_PRICE;
        }

        let mut remaining = shares;
        let mut cost = Decimal::ZERO;

        for level in &book.asks {
            let take = level.amount.min(remaining);
            cost += take * level.price;
            remaining -= take;
            if remaining.is_zero() {
                return cost / shares;
            }
        }

        UNFILLABLE_PRICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookLevel;
    use rust_decimal_macros::dec;

    fn sizer() -> PositionSizer {
        PositionSizer::new(SizerConfig {
            max_bankroll_fraction: dec!(1.0),
            scan_steps: 50,
        })
    }

    fn flat_book(price: Decimal) -> OrderBook {
        OrderBook::new("m:YES", vec![BookLevel::new(price, dec!(1000000))], vec![])
    }

    /// Levels given in USD notional, converted to shares.
    fn usd_book(levels: &[(Decimal, Decimal)]) -> OrderBook {
        let asks = levels
            .iter()
            .map(|(usd, price)| BookLevel::new(*price, *usd / *price))
            .collect();
        OrderBook::new("m:YES", asks, vec![])
    }

    #[test]
    fn test_flat_book_matches_closed_form_kelly() {
        let alloc = sizer().allocate(dec!(0.6), &flat_book(dec!(0.50)), dec!(1000));

        // (0.6 - 0.5) / (1 - 0.5) = 0.2 of bankroll
        assert_eq!(alloc.shares, dec!(400));
        assert_eq!(alloc.fill_price, dec!(0.50));
        assert_eq!(alloc.size_usd, dec!(200));
    }

    #[test]
    fn test_steep_book_collapses_edge() {
        let book = usd_book(&[
            (dec!(10), dec!(0.50)),
            (dec!(10), dec!(0.55)),
            (dec!(1000), dec!(0.60)),
        ]);
        let alloc = sizer().allocate(dec!(0.6), &book, dec!(1000));

        assert!(!alloc.is_zero());
        assert!(alloc.size_usd < dec!(100));
        assert!(alloc.fill_price > dec!(0.50));
        assert!(alloc.fill_price < dec!(0.60));

        // One more share breaks the Kelly budget at its own fill.
        let q = alloc.shares + Decimal::ONE;
        let fill = PositionSizer::vwap(&book, q);
        let target = PositionSizer::kelly(dec!(0.6), fill).unwrap() * dec!(1000);
        assert!(fill * q > target);
    }

    #[test]
    fn test_no_edge_is_zero() {
        let alloc = sizer().allocate(dec!(0.3), &flat_book(dec!(0.50)), dec!(1000));
        assert_eq!(alloc, Allocation::ZERO);

        let at_price = sizer().allocate(dec!(0.5), &flat_book(dec!(0.50)), dec!(1000));
        assert!(at_price.is_zero());
    }

    #[test]
    fn test_invalid_inputs_degrade_to_zero() {
        let empty = OrderBook::new("m:YES", vec![], vec![]);
        assert!(sizer().allocate(dec!(0.9), &empty, dec!(1000)).is_zero());
        assert!(sizer().allocate(dec!(0.9), &flat_book(dec!(0.5)), Decimal::ZERO).is_zero());
        assert!(sizer().allocate(dec!(1.5), &flat_book(dec!(0.5)), dec!(1000)).is_zero());
        assert!(sizer()
            .allocate_with_fraction(dec!(0.9), &flat_book(dec!(0.5)), dec!(1000), Decimal::ZERO)
            .is_zero());
    }

    #[test]
    fn test_fill_never_better_than_best_ask() {
        let book = usd_book(&[(dec!(30), dec!(0.20)), (dec!(50), dec!(0.25)), (dec!(500), dec!(0.35))]);
        for p in [dec!(0.3), dec!(0.45), dec!(0.7), dec!(0.95)] {
            let alloc = sizer().allocate(p, &book, dec!(500));
            if !alloc.is_zero() {
                assert!(alloc.fill_price >= dec!(0.20));
            }
        }
    }

    #[test]
    fn test_bankroll_fraction_caps_cost() {
        let capped = PositionSizer::new(SizerConfig::default());
        let alloc = capped.allocate(dec!(0.95), &flat_book(dec!(0.10)), dec!(1000));

        assert!(alloc.size_usd <= dec!(250));
        assert!(alloc.size_usd > dec!(240));
    }

    #[test]
    fn test_unfillable_sentinel() {
        let book = usd_book(&[(dec!(5), dec!(0.5))]);
        assert_eq!(PositionSizer::vwap(&book, dec!(11)), UNFILLABLE_PRICE);
        assert_eq!(PositionSizer::vwap(&book, dec!(10)), dec!(0.5));
    }
}
