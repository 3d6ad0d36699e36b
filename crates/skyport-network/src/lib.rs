//! skyport-network — default network provider.
//!
//! Declares a network with one public subnet per availability zone (and
//! optionally one private subnet per zone), plus a flow log that ships
//! rejected traffic to a log group. The result is a [`NetworkHandle`]
//! consumed read-only by the cluster provisioner and service orchestrator.
//!
//! # Components
//!
//! - **`cidr`** — IPv4 block carving for subnet layout
//! - **`provider`** — resource declarations and handle assembly
//!
//! [`NetworkHandle`]: skyport_core::NetworkHandle

pub mod cidr;
pub mod provider;

pub use cidr::Ipv4Block;
pub use provider::{FlowLogOptions, NetworkOptions, provision};
