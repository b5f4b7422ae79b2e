//! Resource type catalog.
//!
//! Most types are plain data: required properties, advertised attributes
//! and a few property rules. Rules only look at literal values; anything
//! holding a token is left for deploy time.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use strata_core::{ResourceDeclaration, ResourceType, ResourceTypeRegistry, Value};

use crate::cidr::Ipv4Cidr;

static PRE_SHARED_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z1-9._][a-zA-Z\d._]{7,63}$").expect("valid pre-shared key pattern")
});

static BUCKET_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid bucket name pattern")
});

/// A property constraint checked on literal values.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// IPv4 network in CIDR notation.
    Cidr(&'static str),
    /// Dotted IPv4 address.
    Ipv4(&'static str),
    OneOf(&'static str, &'static [&'static str]),
    /// Inclusive character-count bounds.
    Length(&'static str, usize, usize),
    /// Inclusive integer bounds.
    Range(&'static str, i64, i64),
    /// Exactly one of the properties is set.
    ExactlyOne(&'static [&'static str]),
}

impl Rule {
    fn check(&self, declaration: &ResourceDeclaration, problems: &mut Vec<String>) {
        match *self {
            Rule::Cidr(property) => {
                if let Some(s) = literal_str(declaration, property) {
                    if s.parse::<Ipv4Cidr>().is_err() {
                        problems.push(format!("{} '{}' is not a valid IPv4 CIDR block", property, s));
                    }
                }
            }
            Rule::Ipv4(property) => {
                if let Some(s) = literal_str(declaration, property) {
                    if s.parse::<Ipv4Addr>().is_err() {
                        problems.push(format!("{} '{}' is not a valid IPv4 address", property, s));
                    }
                }
            }
            Rule::OneOf(property, allowed) => {
                if let Some(s) = literal_str(declaration, property) {
                    if !allowed.contains(&s) {
                        problems.push(format!(
                            "{} '{}' must be one of: {}",
                            property,
                            s,
                            allowed.join(", ")
                        ));
                    }
                }
            }
            Rule::Length(property, min, max) => {
                if let Some(s) = literal_str(declaration, property) {
                    let len = s.chars().count();
                    if len < min || len > max {
                        problems.push(format!(
                            "{} must be between {} and {} characters, got {}",
                            property, min, max, len
                        ));
                    }
                }
            }
            Rule::Range(property, min, max) => {
                let value = declaration
                    .property(property)
                    .filter(|v| v.is_literal())
                    .and_then(Value::as_i64);
                if let Some(n) = value {
                    if n < min || n > max {
                        problems.push(format!(
                            "{} must be between {} and {}, got {}",
                            property, min, max, n
                        ));
                    }
                }
            }
            Rule::ExactlyOne(properties) => {
                let set = properties
                    .iter()
                    .filter(|p| declaration.property(p).is_some_and(|v| !v.is_null()))
                    .count();
                if set != 1 {
                    problems.push(format!(
                        "Exactly one of {} must be set, found {}",
                        properties.join(", "),
                        set
                    ));
                }
            }
        }
    }
}

fn literal_str<'d>(declaration: &'d ResourceDeclaration, property: &str) -> Option<&'d str> {
    declaration
        .property(property)
        .filter(|v| v.is_literal())
        .and_then(Value::as_str)
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A resource type described entirely by data.
#[derive(Debug, Clone, Copy)]
pub struct CatalogType {
    pub type_name: &'static str,
    pub required: &'static [&'static str],
    pub attributes: &'static [&'static str],
    pub rules: &'static [Rule],
}

impl ResourceType for CatalogType {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn required_properties(&self) -> BTreeSet<String> {
        names(self.required)
    }

    fn attributes(&self) -> BTreeSet<String> {
        names(self.attributes)
    }

    fn validate(&self, declaration: &ResourceDeclaration) -> Vec<String> {
        let mut problems = Vec::new();
        for rule in self.rules {
            rule.check(declaration, &mut problems);
        }
        problems
    }
}

pub const VPC: CatalogType = CatalogType {
    type_name: "AWS::EC2::VPC",
    required: &["CidrBlock"],
    attributes: &[
        "CidrBlock",
        "CidrBlockAssociations",
        "DefaultNetworkAcl",
        "DefaultSecurityGroup",
        "Ipv6CidrBlocks",
        "VpcId",
    ],
    rules: &[
        Rule::Cidr("CidrBlock"),
        Rule::OneOf("InstanceTenancy", &["default", "dedicated", "host"]),
    ],
};

pub const SUBNET: CatalogType = CatalogType {
    type_name: "AWS::EC2::Subnet",
    required: &["VpcId"],
    attributes: &["AvailabilityZone", "CidrBlock", "NetworkAclAssociationId", "SubnetId", "VpcId"],
    rules: &[Rule::Cidr("CidrBlock")],
};

pub const INTERNET_GATEWAY: CatalogType = CatalogType {
    type_name: "AWS::EC2::InternetGateway",
    required: &[],
    attributes: &["InternetGatewayId"],
    rules: &[],
};

pub const VPN_GATEWAY: CatalogType = CatalogType {
    type_name: "AWS::EC2::VPNGateway",
    required: &["Type"],
    attributes: &["VPNGatewayId"],
    rules: &[
        Rule::OneOf("Type", &["ipsec.1"]),
        Rule::Range("AmazonSideAsn", 1, 4_294_967_294),
    ],
};

pub const GATEWAY_ATTACHMENT: CatalogType = CatalogType {
    type_name: "AWS::EC2::VPCGatewayAttachment",
    required: &["VpcId"],
    attributes: &["AttachmentType"],
    rules: &[Rule::ExactlyOne(&["InternetGatewayId", "VpnGatewayId"])],
};

pub const CUSTOMER_GATEWAY: CatalogType = CatalogType {
    type_name: "AWS::EC2::CustomerGateway",
    required: &["BgpAsn", "IpAddress", "Type"],
    attributes: &["CustomerGatewayId"],
    rules: &[
        Rule::Ipv4("IpAddress"),
        Rule::OneOf("Type", &["ipsec.1"]),
        Rule::Range("BgpAsn", 1, 4_294_967_294),
    ],
};

pub const VPN_CONNECTION_ROUTE: CatalogType = CatalogType {
    type_name: "AWS::EC2::VPNConnectionRoute",
    required: &["DestinationCidrBlock", "VpnConnectionId"],
    attributes: &[],
    rules: &[Rule::Cidr("DestinationCidrBlock")],
};

pub const DB_SUBNET_GROUP: CatalogType = CatalogType {
    type_name: "AWS::RDS::DBSubnetGroup",
    required: &["DBSubnetGroupDescription", "SubnetIds"],
    attributes: &[],
    rules: &[],
};

pub const DB_PARAMETER_GROUP: CatalogType = CatalogType {
    type_name: "AWS::RDS::DBParameterGroup",
    required: &["Description", "Family"],
    attributes: &["DBParameterGroupName"],
    rules: &[],
};

pub const DB_INSTANCE: CatalogType = CatalogType {
    type_name: "AWS::RDS::DBInstance",
    required: &["DBInstanceClass"],
    attributes: &[
        "DBInstanceArn",
        "DbiResourceId",
        "Endpoint.Address",
        "Endpoint.HostedZoneId",
        "Endpoint.Port",
    ],
    rules: &[
        Rule::ExactlyOne(&["Engine", "SourceDBInstanceIdentifier"]),
        Rule::Range("BackupRetentionPeriod", 0, 35),
        Rule::Range("AllocatedStorage", 20, 65_536),
    ],
};

pub const CLOUDFORMATION_PRODUCT: CatalogType = CatalogType {
    type_name: "AWS::ServiceCatalog::CloudFormationProduct",
    required: &["Name", "Owner"],
    attributes: &["ProductName", "ProvisioningArtifactIds", "ProvisioningArtifactNames"],
    rules: &[
        Rule::Length("Name", 1, 8191),
        Rule::Length("Owner", 1, 8191),
        Rule::OneOf("AcceptLanguage", &["en", "jp", "zh"]),
    ],
};

pub const PORTFOLIO: CatalogType = CatalogType {
    type_name: "AWS::ServiceCatalog::Portfolio",
    required: &["DisplayName", "ProviderName"],
    attributes: &["PortfolioName"],
    rules: &[
        Rule::Length("DisplayName", 1, 100),
        Rule::Length("ProviderName", 1, 50),
        Rule::OneOf("AcceptLanguage", &["en", "jp", "zh"]),
    ],
};

pub const PORTFOLIO_PRODUCT_ASSOCIATION: CatalogType = CatalogType {
    type_name: "AWS::ServiceCatalog::PortfolioProductAssociation",
    required: &["PortfolioId", "ProductId"],
    attributes: &[],
    rules: &[Rule::OneOf("AcceptLanguage", &["en", "jp", "zh"])],
};

/// `AWS::EC2::VPNConnection`, with tunnel option checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpnConnectionType;

pub const VPN_CONNECTION_RULES: &[Rule] = &[
    Rule::OneOf("Type", &["ipsec.1"]),
    Rule::ExactlyOne(&["VpnGatewayId", "TransitGatewayId"]),
];

impl ResourceType for VpnConnectionType {
    fn type_name(&self) -> &str {
        "AWS::EC2::VPNConnection"
    }

    fn required_properties(&self) -> BTreeSet<String> {
        names(&["CustomerGatewayId", "Type"])
    }

    fn attributes(&self) -> BTreeSet<String> {
        names(&["VpnConnectionId"])
    }

    fn validate(&self, declaration: &ResourceDeclaration) -> Vec<String> {
        let mut problems = Vec::new();
        for rule in VPN_CONNECTION_RULES {
            rule.check(declaration, &mut problems);
        }

        let Some(tunnels) = declaration
            .property("VpnTunnelOptionsSpecifications")
            .and_then(Value::as_list)
        else {
            return problems;
        };
        if tunnels.len() > 2 {
            problems.push(format!(
                "A VPN connection has at most 2 tunnels, got {}",
                tunnels.len()
            ));
        }
        for (index, tunnel) in tunnels.iter().enumerate() {
            let Some(options) = tunnel.as_map() else {
                continue;
            };
            if let Some(key) = options.get("PreSharedKey").filter(|v| v.is_literal()).and_then(Value::as_str) {
                if !PRE_SHARED_KEY_RE.is_match(key) {
                    problems.push(format!(
                        "Tunnel {} pre-shared key must be 8-64 letters, digits, '.' or '_' and must not start with '0'",
                        index
                    ));
                }
            }
            if let Some(cidr) = options.get("TunnelInsideCidr").filter(|v| v.is_literal()).and_then(Value::as_str) {
                let valid = cidr.parse::<Ipv4Cidr>().is_ok_and(|c| {
                    c.prefix() == 30 && "169.254.0.0/16".parse::<Ipv4Cidr>().is_ok_and(|r| r.contains(&c))
                });
                if !valid {
                    problems.push(format!(
                        "Tunnel {} inside CIDR '{}' must be a /30 in 169.254.0.0/16",
                        index, cidr
                    ));
                }
            }
        }
        problems
    }
}

/// `AWS::S3::Bucket`, with bucket name checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketType;

impl ResourceType for BucketType {
    fn type_name(&self) -> &str {
        "AWS::S3::Bucket"
    }

    fn attributes(&self) -> BTreeSet<String> {
        names(&["Arn", "DomainName", "DualStackDomainName", "RegionalDomainName", "WebsiteURL"])
    }

    fn validate(&self, declaration: &ResourceDeclaration) -> Vec<String> {
        match literal_str(declaration, "BucketName") {
            Some(name) if !BUCKET_NAME_RE.is_match(name) || name.contains("..") => vec![format!(
                "Bucket name '{}' must be 3-63 lowercase letters, digits, '.' or '-'",
                name
            )],
            _ => Vec::new(),
        }
    }
}

pub fn vpc() -> Arc<dyn ResourceType> {
    Arc::new(VPC)
}

pub fn subnet() -> Arc<dyn ResourceType> {
    Arc::new(SUBNET)
}

pub fn internet_gateway() -> Arc<dyn ResourceType> {
    Arc::new(INTERNET_GATEWAY)
}

pub fn vpn_gateway() -> Arc<dyn ResourceType> {
    Arc::new(VPN_GATEWAY)
}

pub fn gateway_attachment() -> Arc<dyn ResourceType> {
    Arc::new(GATEWAY_ATTACHMENT)
}

pub fn customer_gateway() -> Arc<dyn ResourceType> {
    Arc::new(CUSTOMER_GATEWAY)
}

pub fn vpn_connection() -> Arc<dyn ResourceType> {
    Arc::new(VpnConnectionType)
}

pub fn vpn_connection_route() -> Arc<dyn ResourceType> {
    Arc::new(VPN_CONNECTION_ROUTE)
}

pub fn db_subnet_group() -> Arc<dyn ResourceType> {
    Arc::new(DB_SUBNET_GROUP)
}

pub fn db_parameter_group() -> Arc<dyn ResourceType> {
    Arc::new(DB_PARAMETER_GROUP)
}

pub fn db_instance() -> Arc<dyn ResourceType> {
    Arc::new(DB_INSTANCE)
}

pub fn cloudformation_product() -> Arc<dyn ResourceType> {
    Arc::new(CLOUDFORMATION_PRODUCT)
}

pub fn portfolio() -> Arc<dyn ResourceType> {
    Arc::new(PORTFOLIO)
}

pub fn portfolio_product_association() -> Arc<dyn ResourceType> {
    Arc::new(PORTFOLIO_PRODUCT_ASSOCIATION)
}

pub fn bucket() -> Arc<dyn ResourceType> {
    Arc::new(BucketType)
}

/// Registry holding every catalog type.
pub fn catalog() -> ResourceTypeRegistry {
    let mut registry = ResourceTypeRegistry::new();
    for resource_type in [
        vpc(),
        subnet(),
        internet_gateway(),
        vpn_gateway(),
        gateway_attachment(),
        customer_gateway(),
        vpn_connection(),
        vpn_connection_route(),
        db_subnet_group(),
        db_parameter_group(),
        db_instance(),
        cloudformation_product(),
        portfolio(),
        portfolio_product_association(),
        bucket(),
    ] {
        registry.register(resource_type);
    }
    registry
}

#[cfg(test)]
mod tests {
    use strata_core::Stack;

    use super::*;

    fn problems(ty: Arc<dyn ResourceType>, props: Vec<(&str, Value)>) -> Vec<String> {
        let mut stack = Stack::new("types");
        let path = stack.scope().declare("R", ty, props).unwrap();
        let declaration = stack.declaration(&path).unwrap();
        declaration.resource_type().validate(declaration)
    }

    #[test]
    fn test_catalog_registers_every_type() {
        let registry = catalog();
        assert_eq!(registry.len(), 15);
        assert!(registry.contains("AWS::EC2::VPNConnection"));
        assert!(registry.contains("AWS::S3::Bucket"));
    }

    #[test]
    fn test_cidr_rule() {
        assert!(problems(vpc(), vec![("CidrBlock", Value::from("10.0.0.0/16"))]).is_empty());
        let found = problems(vpc(), vec![("CidrBlock", Value::from("10.0.0.0/40"))]);
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("CIDR"));
    }

    #[test]
    fn test_rules_skip_tokens() {
        let mut stack = Stack::new("types");
        let region = stack.pseudo(strata_core::PseudoParameter::Region);
        let marker = stack.token_as_string(&region);
        let path = stack
            .scope()
            .declare("Gw", customer_gateway(), [("IpAddress", Value::from(marker))])
            .unwrap();
        let declaration = stack.declaration(&path).unwrap();
        assert!(declaration.resource_type().validate(declaration).is_empty());
    }

    #[test]
    fn test_exactly_one_rule() {
        let found = problems(
            gateway_attachment(),
            vec![
                ("VpcId", Value::from("vpc-1")),
                ("InternetGatewayId", Value::from("igw-1")),
                ("VpnGatewayId", Value::from("vgw-1")),
            ],
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("found 2"));
    }

    #[test]
    fn test_pre_shared_key_and_tunnel_count() {
        let tunnel = |key: &str| Value::map([("PreSharedKey", Value::from(key))]);
        let found = problems(
            vpn_connection(),
            vec![
                ("CustomerGatewayId", Value::from("cgw-1")),
                ("Type", Value::from("ipsec.1")),
                ("VpnGatewayId", Value::from("vgw-1")),
                (
                    "VpnTunnelOptionsSpecifications",
                    Value::list([tunnel("ssmpwaaa"), tunnel("0badkey1"), tunnel("ssmpwbbb")]),
                ),
            ],
        );
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.contains("at most 2 tunnels")));
        assert!(found.iter().any(|p| p.contains("Tunnel 1 pre-shared key")));
    }

    #[test]
    fn test_bucket_names() {
        assert!(problems(bucket(), vec![("BucketName", Value::from("my-assets"))]).is_empty());
        assert_eq!(problems(bucket(), vec![("BucketName", Value::from("My_Assets"))]).len(), 1);
    }

    #[test]
    fn test_range_accepts_numeric_strings() {
        let found = problems(
            db_instance(),
            vec![
                ("DBInstanceClass", Value::from("db.t3.small")),
                ("Engine", Value::from("postgres")),
                ("BackupRetentionPeriod", Value::from("40")),
            ],
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("BackupRetentionPeriod"));
    }
}
