//! Virtual network with subnets, gateways and VPN connections.

use serde::{Deserialize, Serialize};
use strata_core::{Construct, ConstructPath, NodeId, Scope, Stack, Value};
use tracing::debug;

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::constructs::name_tags;
use crate::error::{ResourceError, ResourceResult};
use crate::types;

pub const DEFAULT_MAX_AZS: usize = 2;
pub const DEFAULT_CUSTOMER_ASN: u32 = 65000;
const VPN_TYPE: &str = "ipsec.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routed through the internet gateway.
    Public,
    /// No route outside the VPC.
    PrivateIsolated,
}

/// One group of subnets, created once per availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetConfiguration {
    pub name: String,
    pub subnet_type: SubnetType,
    #[serde(default)]
    pub cidr_mask: Option<u8>,
}

impl SubnetConfiguration {
    pub fn new(name: impl Into<String>, subnet_type: SubnetType) -> Self {
        Self {
            name: name.into(),
            subnet_type,
            cidr_mask: None,
        }
    }

    pub fn with_cidr_mask(mut self, mask: u8) -> Self {
        self.cidr_mask = Some(mask);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TunnelOptions {
    pub pre_shared_key: Option<Value>,
    pub inside_cidr: Option<String>,
}

impl TunnelOptions {
    pub fn with_pre_shared_key(mut self, key: impl Into<Value>) -> Self {
        self.pre_shared_key = Some(key.into());
        self
    }

    pub fn with_inside_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.inside_cidr = Some(cidr.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut entries = Vec::new();
        if let Some(key) = &self.pre_shared_key {
            entries.push(("PreSharedKey", key.clone()));
        }
        if let Some(cidr) = &self.inside_cidr {
            entries.push(("TunnelInsideCidr", Value::from(cidr)));
        }
        Value::map(entries)
    }
}

/// A site-to-site VPN connection. Static routes make it statically routed.
#[derive(Debug, Clone, PartialEq)]
pub struct VpnConnectionOptions {
    pub ip: String,
    pub asn: u32,
    pub static_routes: Vec<String>,
    pub tunnel_options: Vec<TunnelOptions>,
}

impl VpnConnectionOptions {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            asn: DEFAULT_CUSTOMER_ASN,
            static_routes: Vec::new(),
            tunnel_options: Vec::new(),
        }
    }

    pub fn with_asn(mut self, asn: u32) -> Self {
        self.asn = asn;
        self
    }

    pub fn with_static_route(mut self, cidr: impl Into<String>) -> Self {
        self.static_routes.push(cidr.into());
        self
    }

    pub fn with_tunnel(mut self, tunnel: TunnelOptions) -> Self {
        self.tunnel_options.push(tunnel);
        self
    }
}

/// A VPC spread over `max_azs` availability zones.
#[derive(Debug, Clone, PartialEq)]
pub struct Vpc {
    pub cidr: String,
    pub max_azs: usize,
    pub subnet_configuration: Vec<SubnetConfiguration>,
    pub vpn_gateway: bool,
    pub vpn_gateway_asn: Option<u32>,
    pub vpn_connections: Vec<(String, VpnConnectionOptions)>,
}

impl Default for Vpc {
    fn default() -> Self {
        Self::new("10.0.0.0/16")
    }
}

impl Vpc {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            max_azs: DEFAULT_MAX_AZS,
            subnet_configuration: vec![
                SubnetConfiguration::new("Public", SubnetType::Public),
                SubnetConfiguration::new("Isolated", SubnetType::PrivateIsolated),
            ],
            vpn_gateway: false,
            vpn_gateway_asn: None,
            vpn_connections: Vec::new(),
        }
    }

    pub fn with_max_azs(mut self, max_azs: usize) -> Self {
        self.max_azs = max_azs;
        self
    }

    pub fn with_subnets(mut self, subnets: Vec<SubnetConfiguration>) -> Self {
        self.subnet_configuration = subnets;
        self
    }

    pub fn with_vpn_gateway(mut self, asn: Option<u32>) -> Self {
        self.vpn_gateway = true;
        self.vpn_gateway_asn = asn;
        self
    }

    /// Adding a connection also enables the VPN gateway.
    pub fn with_vpn_connection(mut self, name: impl Into<String>, options: VpnConnectionOptions) -> Self {
        self.vpn_connections.push((name.into(), options));
        self
    }

    fn check(&self) -> ResourceResult<Ipv4Cidr> {
        let block: Ipv4Cidr = self.cidr.parse()?;
        if self.max_azs == 0 {
            return Err(ResourceError::invalid("Vpc", "max_azs must be at least 1"));
        }
        if self.subnet_configuration.is_empty() {
            return Err(ResourceError::invalid("Vpc", "at least one subnet group is required"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for group in &self.subnet_configuration {
            if !seen.insert(group.name.as_str()) {
                return Err(ResourceError::invalid(
                    "Vpc",
                    format!("subnet group '{}' is defined twice", group.name),
                ));
            }
        }
        Ok(block)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubnetHandle {
    pub group: String,
    pub subnet_type: SubnetType,
    pub az_index: usize,
    pub cidr: Ipv4Cidr,
    pub path: ConstructPath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VpnConnectionHandle {
    pub node: NodeId,
    pub connection: ConstructPath,
    pub customer_gateway: ConstructPath,
    pub routes: Vec<ConstructPath>,
}

/// What a built [`Vpc`] exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct VpcHandle {
    pub node: NodeId,
    pub vpc: ConstructPath,
    pub subnets: Vec<SubnetHandle>,
    pub internet_gateway: Option<ConstructPath>,
    pub vpn_gateway: Option<ConstructPath>,
    pub vpn_attachment: Option<ConstructPath>,
    pub vpn_connections: Vec<VpnConnectionHandle>,
}

impl VpcHandle {
    pub fn select_subnets(&self, subnet_type: SubnetType) -> Vec<ConstructPath> {
        self.subnets
            .iter()
            .filter(|s| s.subnet_type == subnet_type)
            .map(|s| s.path.clone())
            .collect()
    }

    /// Add a VPN connection after the VPC was built.
    pub fn add_vpn_connection(
        &mut self,
        stack: &mut Stack,
        name: &str,
        options: VpnConnectionOptions,
    ) -> ResourceResult<VpnConnectionHandle> {
        let (Some(gateway), Some(attachment)) = (&self.vpn_gateway, &self.vpn_attachment) else {
            return Err(ResourceError::VpnGatewayRequired {
                vpc: self.vpc.to_string(),
                connection: name.to_string(),
            });
        };
        let connection = VpnConnection {
            vpn_gateway: gateway.clone(),
            attachment: attachment.clone(),
            options,
        };
        let handle = stack.scope_at(self.node)?.add(name, connection)?;
        self.vpn_connections.push(handle.clone());
        Ok(handle)
    }
}

impl Construct for Vpc {
    type Output = VpcHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<VpcHandle> {
        let block = self.check()?;
        let tags = name_tags(scope)?;
        let vpc = scope.declare(
            "Resource",
            types::vpc(),
            [
                ("CidrBlock", Value::from(block.to_string())),
                ("EnableDnsHostnames", Value::from(true)),
                ("EnableDnsSupport", Value::from(true)),
                ("InstanceTenancy", Value::from("default")),
                ("Tags", tags),
            ],
        )?;
        let vpc_ref = scope.reference(&vpc);

        let has_public = self
            .subnet_configuration
            .iter()
            .any(|g| g.subnet_type == SubnetType::Public);
        let mut internet_gateway = None;
        let mut internet_attachment = None;
        if has_public {
            let tags = name_tags(scope)?;
            let igw = scope.declare("IGW", types::internet_gateway(), [("Tags", tags)])?;
            let igw_ref = scope.reference(&igw);
            let attachment = scope.declare(
                "VPCGW",
                types::gateway_attachment(),
                [
                    ("VpcId", Value::from(&vpc_ref)),
                    ("InternetGatewayId", Value::from(igw_ref)),
                ],
            )?;
            scope.declaration_mut(&attachment)?.set_private(true);
            internet_gateway = Some(igw);
            internet_attachment = Some(attachment);
        }

        let total = self.max_azs * self.subnet_configuration.len();
        let mut allocator = CidrAllocator::new(block);
        let even_prefix = allocator.prefix_for(total)?;
        let mut subnets = Vec::with_capacity(total);
        for group in &self.subnet_configuration {
            for az in 0..self.max_azs {
                let cidr = allocator.allocate(group.cidr_mask.unwrap_or(even_prefix))?;
                let mut child = scope.child(&format!("{}Subnet{}", group.name, az + 1))?;
                let tags = name_tags(&child)?;
                let availability_zone = Value::map([(
                    "Fn::Select",
                    Value::list([
                        Value::from(az),
                        Value::map([("Fn::GetAZs", Value::from(""))]),
                    ]),
                )]);
                let path = child.declare(
                    "Subnet",
                    types::subnet(),
                    [
                        ("VpcId", Value::from(&vpc_ref)),
                        ("CidrBlock", Value::from(cidr.to_string())),
                        ("AvailabilityZone", availability_zone),
                        (
                            "MapPublicIpOnLaunch",
                            Value::from(group.subnet_type == SubnetType::Public),
                        ),
                        ("Tags", tags),
                    ],
                )?;
                if group.subnet_type == SubnetType::Public {
                    if let Some(attachment) = &internet_attachment {
                        child.declaration_mut(&path)?.add_dependency(attachment.clone());
                    }
                }
                debug!(subnet = %path, cidr = %cidr, "Allocated subnet");
                subnets.push(SubnetHandle {
                    group: group.name.clone(),
                    subnet_type: group.subnet_type,
                    az_index: az,
                    cidr,
                    path,
                });
            }
        }

        let mut handle = VpcHandle {
            node: scope.node(),
            vpc,
            subnets,
            internet_gateway,
            vpn_gateway: None,
            vpn_attachment: None,
            vpn_connections: Vec::new(),
        };

        if self.vpn_gateway || !self.vpn_connections.is_empty() {
            let mut properties = vec![("Type", Value::from(VPN_TYPE))];
            if let Some(asn) = self.vpn_gateway_asn {
                properties.push(("AmazonSideAsn", Value::from(asn)));
            }
            let gateway = scope.declare("VpnGateway", types::vpn_gateway(), properties)?;
            let gateway_ref = scope.reference(&gateway);
            let attachment = scope.declare(
                "VPCVPNGW",
                types::gateway_attachment(),
                [
                    ("VpcId", Value::from(&vpc_ref)),
                    ("VpnGatewayId", Value::from(gateway_ref)),
                ],
            )?;
            scope.declaration_mut(&attachment)?.set_private(true);
            handle.vpn_gateway = Some(gateway.clone());
            handle.vpn_attachment = Some(attachment.clone());

            for (name, options) in self.vpn_connections {
                let connection = VpnConnection {
                    vpn_gateway: gateway.clone(),
                    attachment: attachment.clone(),
                    options,
                };
                handle.vpn_connections.push(scope.add(&name, connection)?);
            }
        }

        Ok(handle)
    }
}

/// Customer gateway, connection and static routes for one VPN link.
#[derive(Debug, Clone, PartialEq)]
pub struct VpnConnection {
    pub vpn_gateway: ConstructPath,
    pub attachment: ConstructPath,
    pub options: VpnConnectionOptions,
}

impl Construct for VpnConnection {
    type Output = VpnConnectionHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<VpnConnectionHandle> {
        let options = self.options;
        let customer_gateway = scope.declare(
            "CustomerGateway",
            types::customer_gateway(),
            [
                ("BgpAsn", Value::from(options.asn)),
                ("IpAddress", Value::from(options.ip.as_str())),
                ("Type", Value::from(VPN_TYPE)),
            ],
        )?;
        let customer_gateway_ref = scope.reference(&customer_gateway);
        let gateway_ref = scope.reference(&self.vpn_gateway);

        let mut properties = vec![
            ("CustomerGatewayId", Value::from(customer_gateway_ref)),
            ("StaticRoutesOnly", Value::from(!options.static_routes.is_empty())),
            ("Type", Value::from(VPN_TYPE)),
            ("VpnGatewayId", Value::from(gateway_ref)),
        ];
        if !options.tunnel_options.is_empty() {
            properties.push((
                "VpnTunnelOptionsSpecifications",
                Value::list(options.tunnel_options.iter().map(TunnelOptions::to_value)),
            ));
        }
        let connection = scope.declare("Resource", types::vpn_connection(), properties)?;
        scope
            .declaration_mut(&connection)?
            .add_dependency(self.attachment.clone());
        let connection_ref = scope.reference(&connection);

        let mut routes = Vec::with_capacity(options.static_routes.len());
        for (index, cidr) in options.static_routes.iter().enumerate() {
            routes.push(scope.declare(
                &format!("Route{}", index),
                types::vpn_connection_route(),
                [
                    ("DestinationCidrBlock", Value::from(cidr.as_str())),
                    ("VpnConnectionId", Value::from(&connection_ref)),
                ],
            )?);
        }

        Ok(VpnConnectionHandle {
            node: scope.node(),
            connection,
            customer_gateway,
            routes,
        })
    }
}
