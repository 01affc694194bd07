pub mod contract;
pub mod market;
pub mod report;

/// Placeholder for any fact the model could not obtain.
pub const NOT_AVAILABLE: &str = "取得できなかった";

/// Placeholder for a price-limit/rapid-rise record with no known catalyst.
pub const MATERIAL_UNKNOWN: &str = "材料不明";
