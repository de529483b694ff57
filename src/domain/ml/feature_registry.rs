/// Ordered list of feature names the classifiers are trained on.
/// Any change here is a breaking change for persisted artifacts: retrain after editing.
pub const FEATURE_NAMES: &[&str] = &[
    // Trade
    "trade_value_usd",
    "log_trade_value",
    "delta_own_ratio",
    "is_buy",
    "is_sell",
    // Filing flags
    "flag_D",
    "flag_M",
    "flag_A",
    "flag_S",
    // Insider role
    "is_ceo",
    "is_cfo",
    "is_director",
    "is_owner",
    // Calendar
    "filing_delay_days",
    "trade_day_of_week",
    "trade_month",
    "trade_quarter",
    // Per-insider aggregates
    "insider_trade_value_usd_count",
    "insider_trade_value_usd_mean",
    "insider_buy_ratio",
    "insider_success_rate_1m",
    // Per-company aggregates
    "company_trade_value_usd_count",
    "company_trade_value_usd_mean",
    "company_buy_ratio",
    "company_price_mean",
    // Market proxies
    "price_momentum_1m",
    "price_momentum_6m",
    "price_volatility",
];

/// Filing flag codes with a dedicated indicator column (`flag_<code>`).
pub const TRADE_FLAG_CODES: &[&str] = &["D", "M", "A", "S"];

/// Title keywords for the role indicator columns, matched case-insensitively as substrings.
pub const CEO_KEYWORDS: &[&str] = &["CEO", "Chief Executive Officer", "President"];
pub const CFO_KEYWORDS: &[&str] = &["CFO", "Chief Financial Officer", "Treasurer"];
pub const DIRECTOR_KEYWORDS: &[&str] = &["Director"];
pub const OWNER_KEYWORDS: &[&str] = &["Owner", "10%"];

/// Sentinel used for missing text fields.
pub const UNKNOWN_TEXT: &str = "Unknown";

/// Case-insensitive substring match against a keyword table.
pub fn title_matches(title: Option<&str>, keywords: &[&str]) -> bool {
    let Some(title) = title else {
        return false;
    };
    let title = title.to_lowercase();
    keywords
        .iter()
        .any(|keyword| title.contains(&keyword.to_lowercase()))
}

/// Names that use the zero fill instead of the median fill for missing values.
pub fn is_zero_filled(name: &str) -> bool {
    name.contains("ratio") || name.contains("rate")
}

/// Canonical names present in `available`, in canonical order.
pub fn canonical_subset<'a, I>(available: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let available: Vec<&str> = available.into_iter().collect();
    FEATURE_NAMES
        .iter()
        .filter(|name| available.contains(*name))
        .map(|name| name.to_string())
        .collect()
}
