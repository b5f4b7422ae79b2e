//! # strata_core
//!
//! Construct tree, token engine and synthesis session for Strata.
//!
//! # Architecture
//!
//! - **Stack**: the root scope of one synthesis run; owns every identity counter
//! - **Construct tree**: named, append-only nodes that own resource declarations
//! - **Tokens**: placeholders for values known only after logical IDs are
//!   assigned or at deploy time
//! - **Resource types**: the capability interface resource modules implement
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_core::{GenericResourceType, Stack, Value};
//!
//! let mut stack = Stack::new("app");
//! let mut scope = stack.scope();
//! let mut queue = scope.child("Queue")?;
//! let queue_path = queue.declare(
//!     "Resource",
//!     Arc::new(GenericResourceType::new("AWS::SQS::Queue")),
//!     [("VisibilityTimeout", Value::from(60))],
//! )?;
//! let queue_ref = stack.reference(&queue_path);
//! ```

pub mod declaration;
pub mod error;
pub mod path;
pub mod registry;
pub mod resolve;
pub mod resource_type;
pub mod stack;
pub mod token;
pub mod tree;
pub mod value;

pub use declaration::{RemovalPolicy, ResourceDeclaration};
pub use error::{CoreError, CoreResult};
pub use path::{ConstructPath, PATH_SEPARATOR};
pub use registry::ResourceTypeRegistry;
pub use resolve::{
    resolve, IntrinsicJoin, Joiner, LogicalIdLookup, NoLogicalIds, ResolveContext,
    DEFAULT_MAX_TOKEN_DEPTH,
};
pub use resource_type::{default_fragment, GenericResourceType, ResolvedDeclaration, ResourceType};
pub use stack::{Construct, Environment, Mapping, Output, Parameter, Scope, Stack};
pub use token::{PseudoParameter, Resolver, StringFragment, Token, TokenId, TokenKind, TokenRegistry};
pub use tree::{ConstructNode, ConstructTree, NodeId, Walk};
pub use value::{TokenScan, Value};
