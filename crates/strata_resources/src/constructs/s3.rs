//! Object storage bucket.

use strata_core::{
    Construct, ConstructPath, NodeId, PseudoParameter, RemovalPolicy, Scope, Stack, Value,
};

use crate::error::{ResourceError, ResourceResult};
use crate::types;

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Physical name; generated by the platform when unset.
    pub bucket_name: Option<Value>,
    pub versioned: bool,
    pub removal_policy: RemovalPolicy,
}

impl Default for Bucket {
    fn default() -> Self {
        Self {
            bucket_name: None,
            versioned: false,
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_name(mut self, name: impl Into<Value>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    pub fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketHandle {
    pub node: NodeId,
    pub bucket: ConstructPath,
}

impl BucketHandle {
    pub fn arn(&self, stack: &mut Stack) -> Value {
        Value::from(stack.attribute(&self.bucket, "Arn"))
    }

    pub fn bucket_name(&self, stack: &mut Stack) -> Value {
        Value::from(stack.reference(&self.bucket))
    }

    /// `<bucket>.s3.<url suffix>`.
    pub fn domain_name(&self, stack: &mut Stack) -> Value {
        let name = stack.reference(&self.bucket);
        let suffix = stack.pseudo(PseudoParameter::UrlSuffix);
        Value::concat([Value::from(name), Value::from(".s3."), Value::from(suffix)])
    }
}

impl Construct for Bucket {
    type Output = BucketHandle;
    type Error = ResourceError;

    fn build(self, scope: &mut Scope<'_>) -> ResourceResult<BucketHandle> {
        let mut properties = Vec::new();
        if let Some(name) = self.bucket_name {
            properties.push(("BucketName", name));
        }
        if self.versioned {
            properties.push((
                "VersioningConfiguration",
                Value::map([("Status", "Enabled")]),
            ));
        }
        let bucket = scope.declare("Resource", types::bucket(), properties)?;
        scope
            .declaration_mut(&bucket)?
            .set_removal_policy(self.removal_policy);
        Ok(BucketHandle {
            node: scope.node(),
            bucket,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_defaults_to_retain() {
        let mut stack = Stack::new("storage");
        let handle = stack.scope().add("Assets", Bucket::new()).unwrap();
        let declaration = stack.declaration(&handle.bucket).unwrap();
        assert_eq!(declaration.removal_policy(), RemovalPolicy::Retain);
        assert!(declaration.property("BucketName").is_none());
        assert_eq!(handle.bucket, ConstructPath::parse("/Assets/Resource"));
    }

    #[test]
    fn test_bucket_name_with_tokens() {
        let mut stack = Stack::new("storage");
        let account = stack.pseudo(PseudoParameter::AccountId);
        let name = Value::concat([Value::from("assets-"), Value::from(account)]);
        let handle = stack
            .scope()
            .add(
                "Assets",
                Bucket::new()
                    .with_bucket_name(name)
                    .with_versioning(true)
                    .with_removal_policy(RemovalPolicy::Destroy),
            )
            .unwrap();
        let declaration = stack.declaration(&handle.bucket).unwrap();
        assert!(!declaration.property("BucketName").unwrap().is_literal());
        assert_eq!(declaration.removal_policy(), RemovalPolicy::Destroy);
        assert!(declaration.property("VersioningConfiguration").is_some());
    }
}
