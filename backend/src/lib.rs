//! Tenant-aware Baserow access and KPI aggregation for the business dashboard.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(test)]
mod test_support;
