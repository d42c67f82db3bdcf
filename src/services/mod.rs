pub use pushkind_common::services::errors::{ServiceError, ServiceResult};

pub mod analytics;
pub mod approval_flows;
pub mod approvals;
pub mod customers;
pub mod dw;
pub mod ledgers;
pub mod orders;

#[cfg(test)]
pub mod test_support;
