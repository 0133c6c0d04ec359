use rust_decimal::Decimal;

/// Risk-manager tunables. The two amount-limit fields are read by the
/// validators but, per the open question in the design notes, those
/// validators are stubs that always pass - they exist so a concrete limit
/// policy has a single seam to fill in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    pub daily_amount_limit: Decimal,
    pub strategy_amount_limit: Decimal,
    pub debug: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_amount_limit: Decimal::MAX,
            strategy_amount_limit: Decimal::MAX,
            debug: false,
        }
    }
}
