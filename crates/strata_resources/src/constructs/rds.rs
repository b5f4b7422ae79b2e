//! Database instances, read replicas and parameter groups.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::{
    Construct, ConstructPath, NodeId, PseudoParameter, RemovalPolicy, Scope, Stack, Value,
};

use crate::error::{ResourceError, ResourceResult};
use crate::types;

const STORAGE_TYPE: &str = "gp2";
const DEFAULT_ALLOCATED_STORAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Postgres,
    Mysql,
}

/// Database engine and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEngine {
    pub kind: EngineKind,
    pub version: String,
}

impl DatabaseEngine {
    pub fn postgres(version: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Postgres,
            version: version.into(),
        }
    }

    pub fn mysql(version: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Mysql,
            version: version.into(),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        match self.kind {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
        }
    }

    /// Parameter group family, e.g. `postgres16` or `mysql8.0`.
    pub fn family(&self) -> String {
        let mut parts = self.version.split('.');
        let major = parts.next().unwrap_or_default();
        match self.kind {
            EngineKind::Postgres => format!("postgres{}", major),
            EngineKind::Mysql => {
                format!("mysql{}.{}", major, parts.next().unwrap_or("0"))
            }
        }
    }

    pub fn default_username(&self) -> &'static str {
        match self.kind {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "admin",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self.kind {
            EngineKind::Postgres => 5432,
            EngineKind::Mysql => 3306,
        }
    }

    /// Whether read replicas of this engine keep automated backups.
    pub fn replica_backups(&self) -> bool {
        self.kind == EngineKind::Mysql
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.engine_name(), self.version)
    }
}

fn instance_class(instance_type: &str) -> String {
    if instance_type.starts_with("db.") {
        instance_type.to_string()
    } else {
        format!("db.{}", instance_type)
    }
}

/// Declares a private subnet group on the current node.
fn subnet_group(scope: &mut Scope<'_>, subnets: &[ConstructPath]) -> ResourceResult<ConstructPath> {
    let node_name = scope
        .path()?
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| scope.stack().name().to_string());
    if subnets.len() < 2 {
        return Err(ResourceError::invalid(
            node_name,
            format!(
                "a database subnet group needs at least 2 subnets, got {}",
                subnets.len()
            ),
        ));
    }
    let subnet_ids: Vec<Value> = subnets
        .iter()
        .map(|subnet| Value::from(scope.reference(subnet)))
        .collect();
    let group = scope.declare(
        "SubnetGroup",
        types::db_subnet_group(),
        [
            (
                "DBSubnetGroupDescription",
                Value::from(format!("Subnet group for {} database", node_name)),
            ),
            ("SubnetIds", Value::List(subnet_ids)),
        ],
    )?;
    scope.declaration_mut(&group)?.set_private(true);
    Ok(group)
}

fn check_family(
    construct: &str,
    engine: &DatabaseEngine,
    parameter_group: Option<&ParameterGroupHandle>,
) -> ResourceResult<()> {
    match parameter_group {
        Some(group) if group.family != engine.family() => Err(ResourceError::invalid(
            construct,
            format!(
                "parameter group family {} does not match engine family {}",
                group.family,
                engine.family()
            ),
        )),
        _ => Ok(()),
    }
}

/// A DB parameter group for one engine family.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroup {
    pub engine: DatabaseEngine,
    pub description: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

impl ParameterGroup {
    pub fn new(engine: DatabaseEngine) -> Self {
        Self {
            engine,
            description: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroupHandle {
    pub node: NodeId,
    pub path: ConstructPath,
    pub family: String,
}

impl Construct for ParameterGroup {
    type Output = ParameterGroupHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<ParameterGroupHandle> {
        let family = self.engine.family();
        let description = self
            .description
            .unwrap_or_else(|| format!("Parameter group for {}", family));
        let mut properties = vec![
            ("Description", Value::from(description)),
            ("Family", Value::from(family.as_str())),
        ];
        if !self.parameters.is_empty() {
            properties.push((
                "Parameters",
                Value::map(self.parameters.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
            ));
        }
        let path = scope.declare("Resource", types::db_parameter_group(), properties)?;
        Ok(ParameterGroupHandle {
            node: scope.node(),
            path,
            family,
        })
    }
}

/// A standalone database instance in a subnet group of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInstance {
    pub engine: DatabaseEngine,
    pub instance_type: String,
    pub subnets: Vec<ConstructPath>,
    pub backup_retention_days: Option<u32>,
    pub allocated_storage: u32,
    pub multi_az: bool,
    pub parameter_group: Option<ParameterGroupHandle>,
    pub removal_policy: RemovalPolicy,
}

impl DatabaseInstance {
    pub fn new<I>(engine: DatabaseEngine, instance_type: impl Into<String>, subnets: I) -> Self
    where
        I: IntoIterator<Item = ConstructPath>,
    {
        Self {
            engine,
            instance_type: instance_type.into(),
            subnets: subnets.into_iter().collect(),
            backup_retention_days: None,
            allocated_storage: DEFAULT_ALLOCATED_STORAGE,
            multi_az: false,
            parameter_group: None,
            removal_policy: RemovalPolicy::Snapshot,
        }
    }

    pub fn with_backup_retention(mut self, days: u32) -> Self {
        self.backup_retention_days = Some(days);
        self
    }

    pub fn with_allocated_storage(mut self, gigabytes: u32) -> Self {
        self.allocated_storage = gigabytes;
        self
    }

    pub fn with_multi_az(mut self, multi_az: bool) -> Self {
        self.multi_az = multi_az;
        self
    }

    pub fn with_parameter_group(mut self, group: ParameterGroupHandle) -> Self {
        self.parameter_group = Some(group);
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

/// What a built [`DatabaseInstance`] exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseHandle {
    pub node: NodeId,
    pub instance: ConstructPath,
    pub subnet_group: ConstructPath,
    pub engine: DatabaseEngine,
    pub backup_retention_days: Option<u32>,
}

impl DatabaseHandle {
    /// `arn:<partition>:rds:<region>:<account>:db:<identifier>`.
    pub fn arn(&self, stack: &mut Stack) -> Value {
        let partition = stack.pseudo(PseudoParameter::Partition);
        let region = stack.pseudo(PseudoParameter::Region);
        let account = stack.pseudo(PseudoParameter::AccountId);
        let identifier = stack.reference(&self.instance);
        Value::concat([
            Value::from("arn:"),
            Value::from(partition),
            Value::from(":rds:"),
            Value::from(region),
            Value::from(":"),
            Value::from(account),
            Value::from(":db:"),
            Value::from(identifier),
        ])
    }

    pub fn endpoint_address(&self, stack: &mut Stack) -> Value {
        Value::from(stack.attribute(&self.instance, "Endpoint.Address"))
    }

    pub fn endpoint_port(&self, stack: &mut Stack) -> Value {
        Value::from(stack.attribute(&self.instance, "Endpoint.Port"))
    }
}

impl Construct for DatabaseInstance {
    type Output = DatabaseHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<DatabaseHandle> {
        check_family("DatabaseInstance", &self.engine, self.parameter_group.as_ref())?;
        let subnet_group = subnet_group(scope, &self.subnets)?;
        let group_ref = scope.reference(&subnet_group);

        let mut properties = vec![
            ("DBInstanceClass", Value::from(instance_class(&self.instance_type))),
            ("Engine", Value::from(self.engine.engine_name())),
            ("EngineVersion", Value::from(self.engine.version.as_str())),
            ("AllocatedStorage", Value::from(self.allocated_storage.to_string())),
            ("StorageType", Value::from(STORAGE_TYPE)),
            ("CopyTagsToSnapshot", Value::from(true)),
            ("DBSubnetGroupName", Value::from(group_ref)),
            ("MasterUsername", Value::from(self.engine.default_username())),
            ("ManageMasterUserPassword", Value::from(true)),
            ("Port", Value::from(self.engine.default_port().to_string())),
            ("PubliclyAccessible", Value::from(false)),
            ("MultiAZ", Value::from(self.multi_az)),
        ];
        if let Some(days) = self.backup_retention_days {
            properties.push(("BackupRetentionPeriod", Value::from(days)));
        }
        if let Some(group) = &self.parameter_group {
            properties.push(("DBParameterGroupName", Value::from(scope.reference(&group.path))));
        }

        let instance = scope.declare("Resource", types::db_instance(), properties)?;
        scope
            .declaration_mut(&instance)?
            .set_removal_policy(self.removal_policy);

        Ok(DatabaseHandle {
            node: scope.node(),
            instance,
            subnet_group,
            engine: self.engine,
            backup_retention_days: self.backup_retention_days,
        })
    }
}

/// A read replica of an existing instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReplica {
    pub source: DatabaseHandle,
    pub instance_type: String,
    pub subnets: Vec<ConstructPath>,
    pub backup_retention_days: Option<u32>,
    pub parameter_group: Option<ParameterGroupHandle>,
    pub removal_policy: RemovalPolicy,
}

impl ReadReplica {
    pub fn new<I>(source: DatabaseHandle, instance_type: impl Into<String>, subnets: I) -> Self
    where
        I: IntoIterator<Item = ConstructPath>,
    {
        Self {
            source,
            instance_type: instance_type.into(),
            subnets: subnets.into_iter().collect(),
            backup_retention_days: None,
            parameter_group: None,
            removal_policy: RemovalPolicy::Snapshot,
        }
    }

    pub fn with_backup_retention(mut self, days: u32) -> Self {
        self.backup_retention_days = Some(days);
        self
    }

    pub fn with_parameter_group(mut self, group: ParameterGroupHandle) -> Self {
        self.parameter_group = Some(group);
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadReplicaHandle {
    pub node: NodeId,
    pub instance: ConstructPath,
    pub subnet_group: ConstructPath,
}

impl Construct for ReadReplica {
    type Output = ReadReplicaHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<ReadReplicaHandle> {
        let engine = &self.source.engine;
        if self.source.backup_retention_days == Some(0) {
            return Err(ResourceError::invalid(
                "ReadReplica",
                format!("source {} has automated backups disabled", self.source.instance),
            ));
        }
        if self.backup_retention_days.is_some() && !engine.replica_backups() {
            return Err(ResourceError::invalid(
                "ReadReplica",
                format!(
                    "engine {} does not support automated backups for read replicas",
                    engine.engine_name()
                ),
            ));
        }
        check_family("ReadReplica", engine, self.parameter_group.as_ref())?;

        let subnet_group = subnet_group(scope, &self.subnets)?;
        let group_ref = scope.reference(&subnet_group);
        let source_arn = self.source.arn(scope.stack_mut());

        let mut properties = vec![
            ("SourceDBInstanceIdentifier", source_arn),
            ("DBInstanceClass", Value::from(instance_class(&self.instance_type))),
            ("DBSubnetGroupName", Value::from(group_ref)),
            ("StorageType", Value::from(STORAGE_TYPE)),
            ("CopyTagsToSnapshot", Value::from(true)),
            ("PubliclyAccessible", Value::from(false)),
        ];
        if let Some(days) = self.backup_retention_days {
            properties.push(("BackupRetentionPeriod", Value::from(days)));
        }
        if let Some(group) = &self.parameter_group {
            properties.push(("DBParameterGroupName", Value::from(scope.reference(&group.path))));
        }

        let instance = scope.declare("Resource", types::db_instance(), properties)?;
        scope
            .declaration_mut(&instance)?
            .set_removal_policy(self.removal_policy);

        Ok(ReadReplicaHandle {
            node: scope.node(),
            instance,
            subnet_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnets() -> Vec<ConstructPath> {
        vec![
            ConstructPath::parse("/Vpc/isolatedSubnet1/Subnet"),
            ConstructPath::parse("/Vpc/isolatedSubnet2/Subnet"),
        ]
    }

    fn source(stack: &mut Stack, engine: DatabaseEngine) -> DatabaseHandle {
        stack
            .scope()
            .add(
                "Source",
                DatabaseInstance::new(engine, "t3.small", subnets()).with_backup_retention(5),
            )
            .unwrap()
    }

    #[test]
    fn test_engine_family() {
        assert_eq!(DatabaseEngine::postgres("16.3").family(), "postgres16");
        assert_eq!(DatabaseEngine::mysql("8.0").family(), "mysql8.0");
        assert_eq!(DatabaseEngine::mysql("8.0.35").family(), "mysql8.0");
    }

    #[test]
    fn test_instance_declarations() {
        let mut stack = Stack::new("db");
        let handle = source(&mut stack, DatabaseEngine::postgres("16.3"));

        let group = stack.declaration(&handle.subnet_group).unwrap();
        assert!(group.is_private());
        let instance = stack.declaration(&handle.instance).unwrap();
        assert_eq!(instance.removal_policy(), RemovalPolicy::Snapshot);
        assert_eq!(
            instance.property("DBInstanceClass").and_then(Value::as_str),
            Some("db.t3.small")
        );
        assert_eq!(instance.property("BackupRetentionPeriod").and_then(Value::as_i64), Some(5));
    }

    #[test]
    fn test_replica_references_source_arn() {
        let mut stack = Stack::new("db");
        let source = source(&mut stack, DatabaseEngine::postgres("16.3"));
        let replica = stack
            .scope()
            .add("Replica", ReadReplica::new(source.clone(), "t3.small", subnets()))
            .unwrap();

        let declaration = stack.declaration(&replica.instance).unwrap();
        let scan = declaration
            .property("SourceDBInstanceIdentifier")
            .unwrap()
            .scan_tokens(stack.tokens());
        assert!(scan
            .tokens
            .iter()
            .any(|token| token.target() == Some(&source.instance)));
    }

    #[test]
    fn test_postgres_replica_rejects_backup_retention() {
        let mut stack = Stack::new("db");
        let source = source(&mut stack, DatabaseEngine::postgres("16.3"));
        let result = stack.scope().add(
            "Replica",
            ReadReplica::new(source, "t3.small", subnets()).with_backup_retention(3),
        );
        assert!(matches!(result, Err(ResourceError::InvalidOptions { .. })));
    }

    #[test]
    fn test_parameter_group_family_must_match() {
        let mut stack = Stack::new("db");
        let source = source(&mut stack, DatabaseEngine::mysql("8.0"));
        let group = stack
            .scope()
            .add(
                "Params",
                ParameterGroup::new(DatabaseEngine::postgres("16.3")),
            )
            .unwrap();
        let result = stack.scope().add(
            "Replica",
            ReadReplica::new(source, "t3.small", subnets()).with_parameter_group(group),
        );
        assert!(matches!(result, Err(ResourceError::InvalidOptions { .. })));
    }

    #[test]
    fn test_subnet_group_needs_two_subnets() {
        let mut stack = Stack::new("db");
        let result = stack.scope().add(
            "Db",
            DatabaseInstance::new(
                DatabaseEngine::mysql("8.0"),
                "t3.small",
                vec![ConstructPath::parse("/Vpc/A/Subnet")],
            ),
        );
        assert!(matches!(result, Err(ResourceError::InvalidOptions { .. })));
    }
}
