//! Service catalog portfolios and products.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_core::{Construct, ConstructPath, NodeId, Scope, Stack, Value};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};
use crate::types;

/// Language of the catalog's messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLanguage {
    #[default]
    En,
    Jp,
    Zh,
}

impl MessageLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            MessageLanguage::En => "en",
            MessageLanguage::Jp => "jp",
            MessageLanguage::Zh => "zh",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub display_name: String,
    pub provider_name: String,
    pub description: Option<String>,
    pub message_language: Option<MessageLanguage>,
}

impl Portfolio {
    pub fn new(display_name: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            provider_name: provider_name.into(),
            description: None,
            message_language: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_message_language(mut self, language: MessageLanguage) -> Self {
        self.message_language = Some(language);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioHandle {
    pub node: NodeId,
    pub portfolio: ConstructPath,
    pub message_language: Option<MessageLanguage>,
    pub associations: Vec<ConstructPath>,
}

impl PortfolioHandle {
    /// Associate `product` with this portfolio. Adding the same product
    /// twice keeps the first association.
    pub fn add_product(
        &mut self,
        stack: &mut Stack,
        product: &ProductHandle,
    ) -> ResourceResult<ConstructPath> {
        let name = format!("Association{}", product.name);
        let expected = stack.scope_at(self.node)?.path()?.child(&name);
        if self.associations.contains(&expected) {
            return Ok(expected);
        }

        let portfolio_ref = stack.reference(&self.portfolio);
        let product_ref = stack.reference(&product.product);
        let mut properties = vec![
            ("PortfolioId", Value::from(portfolio_ref)),
            ("ProductId", Value::from(product_ref)),
        ];
        if let Some(language) = self.message_language {
            properties.push(("AcceptLanguage", Value::from(language.code())));
        }
        let association = stack.scope_at(self.node)?.declare(
            &name,
            types::portfolio_product_association(),
            properties,
        )?;
        debug!(portfolio = %self.portfolio, product = %product.product, "Associated product");
        self.associations.push(association.clone());
        Ok(association)
    }
}

impl Construct for Portfolio {
    type Output = PortfolioHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<PortfolioHandle> {
        let mut properties = vec![
            ("DisplayName", Value::from(self.display_name)),
            ("ProviderName", Value::from(self.provider_name)),
        ];
        if let Some(description) = self.description {
            properties.push(("Description", Value::from(description)));
        }
        if let Some(language) = self.message_language {
            properties.push(("AcceptLanguage", Value::from(language.code())));
        }
        let portfolio = scope.declare("Resource", types::portfolio(), properties)?;
        Ok(PortfolioHandle {
            node: scope.node(),
            portfolio,
            message_language: self.message_language,
            associations: Vec::new(),
        })
    }
}

/// One provisioning artifact of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductVersion {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Where the platform loads the template from.
    pub template_url: Value,
    pub validate_template: bool,
}

impl ProductVersion {
    pub fn from_url(template_url: impl Into<Value>) -> Self {
        Self {
            name: None,
            description: None,
            template_url: template_url.into(),
            validate_template: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_validate_template(mut self, validate: bool) -> Self {
        self.validate_template = validate;
        self
    }

    fn to_value(&self) -> Value {
        let mut entries = vec![
            (
                "Info",
                Value::map([("LoadTemplateFromURL", self.template_url.clone())]),
            ),
            ("DisableTemplateValidation", Value::from(!self.validate_template)),
        ];
        if let Some(name) = &self.name {
            entries.push(("Name", Value::from(name.as_str())));
        }
        if let Some(description) = &self.description {
            entries.push(("Description", Value::from(description.as_str())));
        }
        Value::map(entries)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudFormationProduct {
    pub product_name: String,
    pub owner: String,
    pub description: Option<String>,
    pub distributor: Option<String>,
    pub support_email: Option<String>,
    pub message_language: Option<MessageLanguage>,
    pub versions: Vec<ProductVersion>,
    pub replace_versions: bool,
}

impl CloudFormationProduct {
    pub fn new(product_name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            owner: owner.into(),
            description: None,
            distributor: None,
            support_email: None,
            message_language: None,
            versions: Vec::new(),
            replace_versions: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_distributor(mut self, distributor: impl Into<String>) -> Self {
        self.distributor = Some(distributor.into());
        self
    }

    pub fn with_support_email(mut self, email: impl Into<String>) -> Self {
        self.support_email = Some(email.into());
        self
    }

    pub fn with_message_language(mut self, language: MessageLanguage) -> Self {
        self.message_language = Some(language);
        self
    }

    pub fn with_version(mut self, version: ProductVersion) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_replace_versions(mut self, replace: bool) -> Self {
        self.replace_versions = replace;
        self
    }

    fn check(&self) -> ResourceResult<()> {
        if self.versions.is_empty() {
            return Err(ResourceError::invalid(
                &self.product_name,
                "a product needs at least one version",
            ));
        }
        let mut seen = BTreeSet::new();
        for name in self.versions.iter().filter_map(|v| v.name.as_deref()) {
            if !seen.insert(name) {
                return Err(ResourceError::invalid(
                    &self.product_name,
                    format!("duplicate version name '{}'", name),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductHandle {
    pub node: NodeId,
    /// Name of the construct node, used to name associations.
    pub name: String,
    pub product: ConstructPath,
}

impl ProductHandle {
    pub fn artifact_ids(&self, stack: &mut Stack) -> Value {
        Value::from(stack.attribute(&self.product, "ProvisioningArtifactIds"))
    }
}

impl Construct for CloudFormationProduct {
    type Output = ProductHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<ProductHandle> {
        self.check()?;
        let artifacts = Value::list(self.versions.iter().map(ProductVersion::to_value));

        let mut properties = vec![
            ("Name", Value::from(self.product_name)),
            ("Owner", Value::from(self.owner)),
            ("ProvisioningArtifactParameters", artifacts),
            ("ReplaceProvisioningArtifacts", Value::from(self.replace_versions)),
        ];
        if let Some(description) = self.description {
            properties.push(("Description", Value::from(description)));
        }
        if let Some(distributor) = self.distributor {
            properties.push(("Distributor", Value::from(distributor)));
        }
        if let Some(email) = self.support_email {
            properties.push(("SupportEmail", Value::from(email)));
        }
        if let Some(language) = self.message_language {
            properties.push(("AcceptLanguage", Value::from(language.code())));
        }

        let product = scope.declare("Resource", types::cloudformation_product(), properties)?;
        let name = scope
            .path()?
            .last()
            .map(str::to_string)
            .unwrap_or_default();
        Ok(ProductHandle {
            node: scope.node(),
            name,
            product,
        })
    }
}
