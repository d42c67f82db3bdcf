//! Core business types shared by the repository, service and route layers.

pub mod alert;
pub mod approval;
pub mod approval_flow;
pub mod customer;
pub mod forecast;
pub mod ledger;
pub mod order;
pub mod segmentation;
