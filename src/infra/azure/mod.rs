//! Azure Resource Manager access for the `configure-network` command.
//!
//! [`ArmClient`] exchanges service-principal credentials for a management
//! token and implements [`rating_report::network::NetworkApi`].

mod client;
mod documents;

pub use client::{ArmClient, Credentials};
