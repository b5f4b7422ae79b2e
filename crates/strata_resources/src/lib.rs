//! # strata_resources
//!
//! Resource types, composite constructs and YAML app definitions.
//!
//! - **Catalog**: typed resource declarations with required properties,
//!   attributes and literal property checks
//! - **Constructs**: VPCs with VPN connections, databases and read replicas,
//!   buckets, service catalog portfolios and products
//! - **Definitions**: stacks described in YAML, built into a [`Stack`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_resources::constructs::{Vpc, VpnConnectionOptions};
//!
//! let mut stack = Stack::new("aws-cdk-ec2-vpn");
//! let mut vpc = stack.scope().add("MyVpc", Vpc::new("10.10.0.0/16").with_vpn_gateway(None))?;
//! vpc.add_vpn_connection(&mut stack, "Static", VpnConnectionOptions::new("52.85.255.197"))?;
//! ```
//!
//! [`Stack`]: strata_core::Stack

pub mod cidr;
pub mod constructs;
pub mod definition;
pub mod error;
pub mod loader;
pub mod types;

pub use cidr::{CidrAllocator, Ipv4Cidr};
pub use definition::{App, AppDefinition, ConstructDef, ConstructKind, Handle, Handles, Intrinsic, ValueDef};
pub use error::{ResourceError, ResourceResult};
pub use loader::{snapshot_path, DefinitionLoader, INTEG_PREFIX};
pub use types::{catalog, CatalogType, Rule};
