//! Composite constructs built from catalog types.

pub mod rds;
pub mod s3;
pub mod servicecatalog;
pub mod vpc;

use strata_core::{Scope, Value};

use crate::error::ResourceResult;

pub use rds::{
    DatabaseEngine, DatabaseHandle, DatabaseInstance, EngineKind, ParameterGroup,
    ParameterGroupHandle, ReadReplica, ReadReplicaHandle,
};
pub use s3::{Bucket, BucketHandle};
pub use servicecatalog::{
    CloudFormationProduct, MessageLanguage, Portfolio, PortfolioHandle, ProductHandle,
    ProductVersion,
};
pub use vpc::{
    SubnetConfiguration, SubnetHandle, SubnetType, TunnelOptions, Vpc, VpcHandle,
    VpnConnection, VpnConnectionHandle, VpnConnectionOptions,
};

/// `[{"Key": "Name", "Value": "<stack>/<path>"}]` for the scope's node.
pub(crate) fn name_tags(scope: &Scope<'_>) -> ResourceResult<Value> {
    let path = scope.path()?;
    let name = format!("{}{}", scope.stack().name(), path);
    Ok(Value::list([Value::map([
        ("Key", Value::from("Name")),
        ("Value", Value::from(name)),
    ])]))
}
