//! Diesel row types and their conversions to and from domain values.

pub mod approval;
pub mod approval_flow;
pub mod customer;
pub mod ledger;
pub mod order;
