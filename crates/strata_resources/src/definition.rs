//! YAML app definitions.
//!
//! A definition describes one stack: its environment, parameters, mappings
//! and outputs, plus a list of constructs built in file order. Constructs
//! refer to constructs defined before them by name; a reference starting
//! with `/` names a declaration path directly.
//!
//! Values are YAML scalars, lists and maps. A map with a single key from
//! the set below is read as an intrinsic:
//!
//! - `ref: <construct or path>`
//! - `get_att: {target, attribute}`
//! - `join: [parts...]`
//! - `param: <parameter name>`
//! - `pseudo: <account_id | region | partition | stack_name | url_suffix>`
//! - `find_in_map: {mapping, top, second}`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strata_core::{
    ConstructPath, Environment, GenericResourceType, Mapping, Output, Parameter, PseudoParameter,
    RemovalPolicy, ResourceTypeRegistry, Stack, Value,
};
use tracing::{debug, info};

use crate::constructs::{
    Bucket, BucketHandle, CloudFormationProduct, DatabaseEngine, DatabaseHandle,
    DatabaseInstance, MessageLanguage, ParameterGroup, ParameterGroupHandle, Portfolio,
    PortfolioHandle, ProductHandle, ProductVersion, ReadReplica, ReadReplicaHandle,
    SubnetConfiguration, SubnetType, TunnelOptions, Vpc, VpcHandle, VpnConnectionHandle,
    VpnConnectionOptions,
};
use crate::error::{ResourceError, ResourceResult};
use crate::types;

/// A value that may contain intrinsics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueDef {
    Intrinsic(Intrinsic),
    List(Vec<ValueDef>),
    Map(BTreeMap<String, ValueDef>),
    Scalar(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intrinsic {
    Ref(String),
    GetAtt { target: String, attribute: String },
    Join(Vec<ValueDef>),
    Param(String),
    Pseudo(String),
    FindInMap {
        mapping: String,
        top: Box<ValueDef>,
        second: Box<ValueDef>,
    },
}

impl ValueDef {
    /// Turn the definition into a value, creating tokens on `stack`.
    pub fn to_value(&self, stack: &mut Stack, handles: &Handles) -> ResourceResult<Value> {
        match self {
            ValueDef::Scalar(json) => Ok(Value::from(json.clone())),
            ValueDef::List(items) => items
                .iter()
                .map(|item| item.to_value(stack, handles))
                .collect::<ResourceResult<Vec<_>>>()
                .map(Value::List),
            ValueDef::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_value(stack, handles)?);
                }
                Ok(Value::Map(map))
            }
            ValueDef::Intrinsic(intrinsic) => intrinsic.to_value(stack, handles),
        }
    }
}

impl From<&str> for ValueDef {
    fn from(s: &str) -> Self {
        ValueDef::Scalar(serde_json::Value::String(s.to_string()))
    }
}

impl Intrinsic {
    fn to_value(&self, stack: &mut Stack, handles: &Handles) -> ResourceResult<Value> {
        let value = match self {
            Intrinsic::Ref(target) => {
                let path = handles.target_path(target)?;
                Value::from(stack.reference(&path))
            }
            Intrinsic::GetAtt { target, attribute } => {
                let path = handles.target_path(target)?;
                Value::from(stack.attribute(&path, attribute.as_str()))
            }
            Intrinsic::Join(parts) => Value::Concat(
                parts
                    .iter()
                    .map(|part| part.to_value(stack, handles))
                    .collect::<ResourceResult<Vec<_>>>()?,
            ),
            Intrinsic::Param(name) => Value::from(stack.parameter_ref(name.as_str())),
            Intrinsic::Pseudo(name) => {
                let pseudo = PseudoParameter::from_str(name).ok_or_else(|| {
                    ResourceError::InvalidValue(format!("unknown pseudo parameter '{}'", name))
                })?;
                Value::from(stack.pseudo(pseudo))
            }
            Intrinsic::FindInMap {
                mapping,
                top,
                second,
            } => {
                let top = top.to_value(stack, handles)?;
                let second = second.to_value(stack, handles)?;
                Value::from(stack.find_in_map(mapping.as_str(), top, second))
            }
        };
        Ok(value)
    }
}

/// What a built construct exposes, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Handle {
    Vpc(VpcHandle),
    VpnConnection(VpnConnectionHandle),
    Database(DatabaseHandle),
    ReadReplica(ReadReplicaHandle),
    ParameterGroup(ParameterGroupHandle),
    Bucket(BucketHandle),
    Portfolio(PortfolioHandle),
    Product(ProductHandle),
    Resource(ConstructPath),
}

impl Handle {
    /// The declaration a plain `ref` to the construct points at.
    pub fn primary(&self) -> &ConstructPath {
        match self {
            Handle::Vpc(h) => &h.vpc,
            Handle::VpnConnection(h) => &h.connection,
            Handle::Database(h) => &h.instance,
            Handle::ReadReplica(h) => &h.instance,
            Handle::ParameterGroup(h) => &h.path,
            Handle::Bucket(h) => &h.bucket,
            Handle::Portfolio(h) => &h.portfolio,
            Handle::Product(h) => &h.product,
            Handle::Resource(path) => path,
        }
    }
}

/// Built constructs by name, in definition order.
#[derive(Debug, Clone, Default)]
pub struct Handles(IndexMap<String, Handle>);

impl Handles {
    pub fn get(&self, name: &str) -> ResourceResult<&Handle> {
        self.0
            .get(name)
            .ok_or_else(|| ResourceError::UnknownConstruct(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn target_path(&self, target: &str) -> ResourceResult<ConstructPath> {
        if target.starts_with('/') {
            return Ok(ConstructPath::parse(target));
        }
        self.get(target).map(|handle| handle.primary().clone())
    }

    fn vpc(&self, name: &str) -> ResourceResult<&VpcHandle> {
        match self.get(name)? {
            Handle::Vpc(vpc) => Ok(vpc),
            _ => Err(ResourceError::InvalidValue(format!("'{}' is not a vpc", name))),
        }
    }

    fn vpc_mut(&mut self, name: &str) -> ResourceResult<&mut VpcHandle> {
        match self.0.get_mut(name) {
            Some(Handle::Vpc(vpc)) => Ok(vpc),
            Some(_) => Err(ResourceError::InvalidValue(format!("'{}' is not a vpc", name))),
            None => Err(ResourceError::UnknownConstruct(name.to_string())),
        }
    }

    fn database(&self, name: &str) -> ResourceResult<&DatabaseHandle> {
        match self.get(name)? {
            Handle::Database(db) => Ok(db),
            _ => Err(ResourceError::InvalidValue(format!(
                "'{}' is not a database instance",
                name
            ))),
        }
    }

    fn parameter_group(&self, name: &str) -> ResourceResult<&ParameterGroupHandle> {
        match self.get(name)? {
            Handle::ParameterGroup(group) => Ok(group),
            _ => Err(ResourceError::InvalidValue(format!(
                "'{}' is not a parameter group",
                name
            ))),
        }
    }

    fn product(&self, name: &str) -> ResourceResult<&ProductHandle> {
        match self.get(name)? {
            Handle::Product(product) => Ok(product),
            _ => Err(ResourceError::InvalidValue(format!("'{}' is not a product", name))),
        }
    }
}

/// A stack described in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub mappings: BTreeMap<String, Mapping>,
    #[serde(default)]
    pub constructs: Vec<ConstructDef>,
    #[serde(default)]
    pub outputs: IndexMap<String, OutputDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
    pub value: ValueDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_name: Option<ValueDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// One named construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: ConstructKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstructKind {
    Vpc(VpcDef),
    VpnConnection(VpnConnectionDef),
    DatabaseInstance(DatabaseDef),
    ReadReplica(ReadReplicaDef),
    ParameterGroup(ParameterGroupDef),
    Bucket(BucketDef),
    Portfolio(PortfolioDef),
    Product(ProductDef),
    Resource(RawResourceDef),
}

impl ConstructKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstructKind::Vpc(_) => "vpc",
            ConstructKind::VpnConnection(_) => "vpn_connection",
            ConstructKind::DatabaseInstance(_) => "database_instance",
            ConstructKind::ReadReplica(_) => "read_replica",
            ConstructKind::ParameterGroup(_) => "parameter_group",
            ConstructKind::Bucket(_) => "bucket",
            ConstructKind::Portfolio(_) => "portfolio",
            ConstructKind::Product(_) => "product",
            ConstructKind::Resource(_) => "resource",
        }
    }
}

fn default_max_azs() -> usize {
    crate::constructs::vpc::DEFAULT_MAX_AZS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpcDef {
    pub cidr: String,
    #[serde(default = "default_max_azs")]
    pub max_azs: usize,
    /// Empty keeps the default public and isolated groups.
    #[serde(default)]
    pub subnets: Vec<SubnetConfiguration>,
    #[serde(default)]
    pub vpn_gateway: bool,
    #[serde(default)]
    pub vpn_gateway_asn: Option<u32>,
    #[serde(default)]
    pub vpn_connections: IndexMap<String, VpnOptionsDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnOptionsDef {
    pub ip: String,
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub static_routes: Vec<String>,
    #[serde(default)]
    pub tunnel_options: Vec<TunnelDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelDef {
    #[serde(default)]
    pub pre_shared_key: Option<ValueDef>,
    #[serde(default)]
    pub inside_cidr: Option<String>,
}

/// A connection added to an already built VPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnConnectionDef {
    pub vpc: String,
    #[serde(flatten)]
    pub options: VpnOptionsDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDef {
    pub engine: DatabaseEngine,
    pub instance_type: String,
    pub vpc: String,
    #[serde(default = "isolated")]
    pub subnet_type: SubnetType,
    #[serde(default)]
    pub backup_retention: Option<u32>,
    #[serde(default)]
    pub allocated_storage: Option<u32>,
    #[serde(default)]
    pub multi_az: bool,
    #[serde(default)]
    pub parameter_group: Option<String>,
    #[serde(default)]
    pub removal_policy: Option<RemovalPolicy>,
}

fn isolated() -> SubnetType {
    SubnetType::PrivateIsolated
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReplicaDef {
    pub source: String,
    pub instance_type: String,
    pub vpc: String,
    #[serde(default = "isolated")]
    pub subnet_type: SubnetType,
    #[serde(default)]
    pub backup_retention: Option<u32>,
    #[serde(default)]
    pub parameter_group: Option<String>,
    #[serde(default)]
    pub removal_policy: Option<RemovalPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroupDef {
    pub engine: DatabaseEngine,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDef {
    #[serde(default)]
    pub bucket_name: Option<ValueDef>,
    #[serde(default)]
    pub versioned: bool,
    #[serde(default)]
    pub removal_policy: Option<RemovalPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDef {
    pub display_name: String,
    pub provider_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message_language: Option<MessageLanguage>,
    /// Products associated once every construct is built.
    #[serde(default)]
    pub products: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDef {
    pub product_name: String,
    pub owner: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub distributor: Option<String>,
    #[serde(default)]
    pub support_email: Option<String>,
    #[serde(default)]
    pub message_language: Option<MessageLanguage>,
    pub versions: Vec<ProductVersionDef>,
    #[serde(default = "default_true")]
    pub replace_versions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVersionDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub template_url: ValueDef,
    #[serde(default = "default_true")]
    pub validate_template: bool,
}

/// A single declaration of any type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResourceDef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ValueDef>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub removal_policy: Option<RemovalPolicy>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub logical_id: Option<String>,
}

/// A built definition.
#[derive(Debug)]
pub struct App {
    pub stack: Stack,
    pub handles: Handles,
}

impl AppDefinition {
    /// Load a definition from a YAML file.
    pub fn from_file(path: &Path) -> ResourceResult<Self> {
        debug!("Loading app definition from {:?}", path);
        let content = fs::read_to_string(path)?;
        let definition: AppDefinition =
            serde_yaml::from_str(&content).map_err(|e| ResourceError::InvalidDefinition {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        definition.check(path)?;
        Ok(definition)
    }

    /// Parse a definition from YAML text.
    pub fn from_yaml(content: &str) -> ResourceResult<Self> {
        let definition: AppDefinition = serde_yaml::from_str(content)?;
        definition.check(Path::new("<inline>"))?;
        Ok(definition)
    }

    /// Stack name must be set and construct names unique.
    pub fn check(&self, path: &Path) -> ResourceResult<()> {
        let invalid = |message: String| ResourceError::InvalidDefinition {
            path: PathBuf::from(path),
            message,
        };
        if self.stack.trim().is_empty() {
            return Err(invalid("stack name is empty".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for construct in &self.constructs {
            if construct.name.is_empty() || construct.name.contains('/') {
                return Err(invalid(format!(
                    "invalid construct name '{}'",
                    construct.name
                )));
            }
            if !seen.insert(construct.name.as_str()) {
                return Err(invalid(format!(
                    "construct '{}' is defined more than once",
                    construct.name
                )));
            }
        }
        Ok(())
    }

    /// Build the stack with the definition's own environment.
    pub fn build(&self) -> ResourceResult<App> {
        self.build_with_environment(self.environment.clone())
    }

    /// Build the stack, deploying to `environment`.
    pub fn build_with_environment(&self, environment: Environment) -> ResourceResult<App> {
        info!("Building stack {} from {} construct(s)", self.stack, self.constructs.len());
        let mut stack = Stack::new(self.stack.as_str()).with_environment(environment);
        if let Some(description) = &self.description {
            stack.set_description(description.as_str());
        }
        for (name, parameter) in &self.parameters {
            stack.add_parameter(name.as_str(), parameter.clone())?;
        }
        for (name, mapping) in &self.mappings {
            stack.add_mapping(name.as_str(), mapping.clone())?;
        }

        let catalog = types::catalog();
        let mut handles = Handles::default();
        for construct in &self.constructs {
            debug!(name = %construct.name, kind = construct.kind.kind_name(), "Building construct");
            let handle = construct.build(&mut stack, &mut handles, &catalog)?;
            handles.0.insert(construct.name.clone(), handle);
        }

        // Associations run last so portfolios can list products defined later.
        for construct in &self.constructs {
            let ConstructKind::Portfolio(portfolio) = &construct.kind else {
                continue;
            };
            for product in &portfolio.products {
                let product = handles.product(product)?.clone();
                if let Some(Handle::Portfolio(handle)) = handles.0.get_mut(&construct.name) {
                    handle.add_product(&mut stack, &product)?;
                }
            }
        }

        for (name, output) in &self.outputs {
            let mut built = Output::new(output.value.to_value(&mut stack, &handles)?);
            if let Some(description) = &output.description {
                built = built.with_description(description.as_str());
            }
            if let Some(export_name) = &output.export_name {
                built = built.with_export_name(export_name.to_value(&mut stack, &handles)?);
            }
            if let Some(condition) = &output.condition {
                built = built.with_condition(condition.as_str());
            }
            stack.add_output(name.as_str(), built)?;
        }

        Ok(App { stack, handles })
    }
}

impl ConstructDef {
    fn build(
        &self,
        stack: &mut Stack,
        handles: &mut Handles,
        catalog: &ResourceTypeRegistry,
    ) -> ResourceResult<Handle> {
        let name = self.name.as_str();
        let handle = match &self.kind {
            ConstructKind::Vpc(def) => {
                let mut vpc = Vpc::new(def.cidr.as_str()).with_max_azs(def.max_azs);
                if !def.subnets.is_empty() {
                    vpc = vpc.with_subnets(def.subnets.clone());
                }
                if def.vpn_gateway || def.vpn_gateway_asn.is_some() {
                    vpc = vpc.with_vpn_gateway(def.vpn_gateway_asn);
                }
                for (connection, options) in &def.vpn_connections {
                    let options = options.to_options(stack, handles)?;
                    vpc = vpc.with_vpn_connection(connection.as_str(), options);
                }
                Handle::Vpc(stack.scope().add(name, vpc)?)
            }
            ConstructKind::VpnConnection(def) => {
                let options = def.options.to_options(stack, handles)?;
                let vpc = handles.vpc_mut(&def.vpc)?;
                Handle::VpnConnection(vpc.add_vpn_connection(stack, name, options)?)
            }
            ConstructKind::DatabaseInstance(def) => {
                let subnets = handles.vpc(&def.vpc)?.select_subnets(def.subnet_type);
                let mut instance =
                    DatabaseInstance::new(def.engine.clone(), def.instance_type.as_str(), subnets)
                        .with_multi_az(def.multi_az);
                if let Some(days) = def.backup_retention {
                    instance = instance.with_backup_retention(days);
                }
                if let Some(storage) = def.allocated_storage {
                    instance = instance.with_allocated_storage(storage);
                }
                if let Some(group) = &def.parameter_group {
                    instance = instance.with_parameter_group(handles.parameter_group(group)?.clone());
                }
                if let Some(policy) = def.removal_policy {
                    instance = instance.with_removal_policy(policy);
                }
                Handle::Database(stack.scope().add(name, instance)?)
            }
            ConstructKind::ReadReplica(def) => {
                let source = handles.database(&def.source)?.clone();
                let subnets = handles.vpc(&def.vpc)?.select_subnets(def.subnet_type);
                let mut replica = ReadReplica::new(source, def.instance_type.as_str(), subnets);
                if let Some(days) = def.backup_retention {
                    replica = replica.with_backup_retention(days);
                }
                if let Some(group) = &def.parameter_group {
                    replica = replica.with_parameter_group(handles.parameter_group(group)?.clone());
                }
                if let Some(policy) = def.removal_policy {
                    replica = replica.with_removal_policy(policy);
                }
                Handle::ReadReplica(stack.scope().add(name, replica)?)
            }
            ConstructKind::ParameterGroup(def) => {
                let mut group = ParameterGroup::new(def.engine.clone());
                if let Some(description) = &def.description {
                    group = group.with_description(description.as_str());
                }
                for (key, value) in &def.parameters {
                    group = group.with_parameter(key.as_str(), value.as_str());
                }
                Handle::ParameterGroup(stack.scope().add(name, group)?)
            }
            ConstructKind::Bucket(def) => {
                let mut bucket = Bucket::new().with_versioning(def.versioned);
                if let Some(bucket_name) = &def.bucket_name {
                    bucket = bucket.with_bucket_name(bucket_name.to_value(stack, handles)?);
                }
                if let Some(policy) = def.removal_policy {
                    bucket = bucket.with_removal_policy(policy);
                }
                Handle::Bucket(stack.scope().add(name, bucket)?)
            }
            ConstructKind::Portfolio(def) => {
                let mut portfolio =
                    Portfolio::new(def.display_name.as_str(), def.provider_name.as_str());
                if let Some(description) = &def.description {
                    portfolio = portfolio.with_description(description.as_str());
                }
                if let Some(language) = def.message_language {
                    portfolio = portfolio.with_message_language(language);
                }
                Handle::Portfolio(stack.scope().add(name, portfolio)?)
            }
            ConstructKind::Product(def) => {
                let mut product =
                    CloudFormationProduct::new(def.product_name.as_str(), def.owner.as_str())
                        .with_replace_versions(def.replace_versions);
                if let Some(description) = &def.description {
                    product = product.with_description(description.as_str());
                }
                if let Some(distributor) = &def.distributor {
                    product = product.with_distributor(distributor.as_str());
                }
                if let Some(email) = &def.support_email {
                    product = product.with_support_email(email.as_str());
                }
                if let Some(language) = def.message_language {
                    product = product.with_message_language(language);
                }
                for version in &def.versions {
                    let mut built = ProductVersion::from_url(version.template_url.to_value(stack, handles)?)
                        .with_validate_template(version.validate_template);
                    if let Some(version_name) = &version.name {
                        built = built.with_name(version_name.as_str());
                    }
                    if let Some(description) = &version.description {
                        built = built.with_description(description.as_str());
                    }
                    product = product.with_version(built);
                }
                Handle::Product(stack.scope().add(name, product)?)
            }
            ConstructKind::Resource(def) => Handle::Resource(def.build(name, stack, handles, catalog)?),
        };
        Ok(handle)
    }
}

impl VpnOptionsDef {
    fn to_options(&self, stack: &mut Stack, handles: &Handles) -> ResourceResult<VpnConnectionOptions> {
        let mut options = VpnConnectionOptions::new(self.ip.as_str());
        if let Some(asn) = self.asn {
            options = options.with_asn(asn);
        }
        for route in &self.static_routes {
            options = options.with_static_route(route.as_str());
        }
        for tunnel in &self.tunnel_options {
            let mut built = TunnelOptions::default();
            if let Some(key) = &tunnel.pre_shared_key {
                built = built.with_pre_shared_key(key.to_value(stack, handles)?);
            }
            if let Some(cidr) = &tunnel.inside_cidr {
                built = built.with_inside_cidr(cidr.as_str());
            }
            options = options.with_tunnel(built);
        }
        Ok(options)
    }
}

impl RawResourceDef {
    fn build(
        &self,
        name: &str,
        stack: &mut Stack,
        handles: &Handles,
        catalog: &ResourceTypeRegistry,
    ) -> ResourceResult<ConstructPath> {
        let resource_type = catalog
            .get(&self.type_name)
            .unwrap_or_else(|| Arc::new(GenericResourceType::new(self.type_name.as_str())));

        let mut properties = Vec::with_capacity(self.properties.len());
        for (key, value) in &self.properties {
            properties.push((key.clone(), value.to_value(stack, handles)?));
        }
        let path = stack
            .scope()
            .child(name)?
            .declare("Resource", resource_type, properties)?;

        for dependency in &self.depends_on {
            let target = handles.target_path(dependency)?;
            stack.add_dependency(&path, &target)?;
        }
        let declaration = stack.declaration_mut(&path)?;
        if let Some(policy) = self.removal_policy {
            declaration.set_removal_policy(policy);
        }
        if let Some(condition) = &self.condition {
            declaration.set_condition(condition.as_str());
        }
        if let Some(logical_id) = &self.logical_id {
            declaration.override_logical_id(logical_id.as_str());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VPN: &str = r#"
stack: vpn
constructs:
  - name: MyVpc
    kind: vpc
    cidr: 10.10.0.0/16
    vpn_connections:
      Dynamic:
        ip: 52.85.255.164
  - name: Static
    kind: vpn_connection
    vpc: MyVpc
    ip: 52.85.255.197
    static_routes: [192.168.10.0/24]
outputs:
  VpcId:
    value: { ref: MyVpc }
"#;

    #[test]
    fn test_value_forms() {
        let value: ValueDef = serde_yaml::from_str("{ join: [a-, { pseudo: region }] }").unwrap();
        assert!(matches!(value, ValueDef::Intrinsic(Intrinsic::Join(ref parts)) if parts.len() == 2));

        let value: ValueDef = serde_yaml::from_str("{ Key: Name, Value: { ref: MyVpc } }").unwrap();
        let ValueDef::Map(map) = value else {
            panic!("expected a map");
        };
        assert!(matches!(map.get("Value"), Some(ValueDef::Intrinsic(Intrinsic::Ref(_)))));

        let value: ValueDef = serde_yaml::from_str("[1, true, text]").unwrap();
        assert!(matches!(value, ValueDef::List(ref items) if items.len() == 3));
    }

    #[test]
    fn test_build_vpn_definition() {
        let definition = AppDefinition::from_yaml(VPN).unwrap();
        let app = definition.build().unwrap();

        let Handle::Vpc(vpc) = app.handles.get("MyVpc").unwrap() else {
            panic!("expected a vpc");
        };
        assert!(vpc.vpn_gateway.is_some());
        assert_eq!(vpc.vpn_connections.len(), 2);
        assert!(matches!(app.handles.get("Static"), Ok(Handle::VpnConnection(_))));
        assert!(app.stack.outputs().contains_key("VpcId"));
        assert_eq!(app.handles.names().collect::<Vec<_>>(), vec!["MyVpc", "Static"]);
    }

    #[test]
    fn test_unknown_construct_reference() {
        let yaml = r#"
stack: broken
constructs:
  - name: Queue
    kind: resource
    type: AWS::SQS::Queue
    properties:
      RedrivePolicy: { get_att: { target: Missing, attribute: Arn } }
"#;
        let definition = AppDefinition::from_yaml(yaml).unwrap();
        assert!(matches!(
            definition.build(),
            Err(ResourceError::UnknownConstruct(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_duplicate_construct_names() {
        let yaml = r#"
stack: dup
constructs:
  - { name: A, kind: bucket }
  - { name: A, kind: bucket }
"#;
        assert!(matches!(
            AppDefinition::from_yaml(yaml),
            Err(ResourceError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let yaml = "stack: s\nconstructs:\n  - { name: A, kind: teleporter }\n";
        assert!(AppDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_raw_resource_options() {
        let yaml = r#"
stack: raw
constructs:
  - name: Topic
    kind: resource
    type: Custom::Topic
  - name: Queue
    kind: resource
    type: AWS::SQS::Queue
    depends_on: [Topic]
    removal_policy: retain
    logical_id: LegacyQueue
    properties:
      Name: { join: [queue-, { pseudo: stack_name }] }
"#;
        let app = AppDefinition::from_yaml(yaml).unwrap().build().unwrap();
        let queue = app.handles.get("Queue").unwrap().primary().clone();
        let declaration = app.stack.declaration(&queue).unwrap();
        assert_eq!(declaration.logical_id_override(), Some("LegacyQueue"));
        assert_eq!(declaration.removal_policy(), RemovalPolicy::Retain);
        assert!(declaration
            .dependencies()
            .contains(&ConstructPath::parse("/Topic/Resource")));
    }
}
