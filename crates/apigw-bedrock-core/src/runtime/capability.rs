//! The two capabilities the function may exercise, and role-guarded wrappers
//! around them.

use crate::arn;
use crate::error::{Result, StackError};
use crate::resources::function::{ENV_BUCKET_NAME, ENV_LOG_LEVEL};
use crate::resources::{ComputeFunction, ExecutionRole};
use async_trait::async_trait;
use std::sync::Arc;

/// Invoke a managed foundation model.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>>;
}

/// Object operations on the result bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Runtime inputs read from the function's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEnvironment {
    pub bucket_name: String,
    pub log_level: String,
}

impl FunctionEnvironment {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket_name = lookup(ENV_BUCKET_NAME)
            .filter(|v| !v.is_empty())
            .ok_or(StackError::MissingEnvironment {
                name: ENV_BUCKET_NAME,
            })?;
        let log_level = lookup(ENV_LOG_LEVEL).unwrap_or_else(|| "INFO".to_string());
        Ok(Self {
            bucket_name,
            log_level,
        })
    }

    /// The environment a deployed function would see.
    pub fn for_function(function: &ComputeFunction) -> Result<Self> {
        Self::from_lookup(|key| function.environment.get(key).cloned())
    }
}

pub struct AuthorizedModelInvoker<M> {
    role: Arc<ExecutionRole>,
    region: String,
    inner: M,
}

impl<M: ModelInvoker> AuthorizedModelInvoker<M> {
    pub fn new(role: Arc<ExecutionRole>, inner: M) -> Self {
        Self {
            role,
            region: arn::MODEL_REGION.to_string(),
            inner,
        }
    }
}

#[async_trait]
impl<M: ModelInvoker> ModelInvoker for AuthorizedModelInvoker<M> {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.role.authorize(
            "bedrock:InvokeModel",
            &arn::foundation_model_arn(&self.region, model_id),
        )?;
        self.inner.invoke_model(model_id, body).await
    }
}

pub struct AuthorizedObjectStore<S> {
    role: Arc<ExecutionRole>,
    bucket: String,
    inner: S,
}

impl<S: ObjectStore> AuthorizedObjectStore<S> {
    pub fn new(role: Arc<ExecutionRole>, bucket: &str, inner: S) -> Self {
        Self {
            role,
            bucket: bucket.to_string(),
            inner,
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for AuthorizedObjectStore<S> {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.role
            .authorize("s3:PutObject", &arn::object_arn(&self.bucket, key))?;
        self.inner.put_object(key, body).await
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.role
            .authorize("s3:GetObject", &arn::object_arn(&self.bucket, key))?;
        self.inner.get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.role
            .authorize("s3:DeleteObject", &arn::object_arn(&self.bucket, key))?;
        self.inner.delete_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.role
            .authorize("s3:ListBucket", &arn::bucket_arn(&self.bucket))?;
        self.inner.list_objects(prefix).await
    }
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        (**self).put_object(key, body).await
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        (**self).get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        (**self).delete_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_objects(prefix).await
    }
}

/// What a handler receives: its environment and the two guarded capabilities.
pub struct FunctionContext {
    pub environment: FunctionEnvironment,
    pub model: Arc<dyn ModelInvoker>,
    pub store: Arc<dyn ObjectStore>,
}

impl FunctionContext {
    pub fn new<M, S>(
        function: &ComputeFunction,
        role: Arc<ExecutionRole>,
        model: M,
        store: S,
    ) -> Result<Self>
    where
        M: ModelInvoker + 'static,
        S: ObjectStore + 'static,
    {
        let environment = FunctionEnvironment::for_function(function)?;
        let model = AuthorizedModelInvoker::new(role.clone(), model);
        let store = AuthorizedObjectStore::new(role, &environment.bucket_name, store);
        Ok(Self {
            environment,
            model: Arc::new(model),
            store: Arc::new(store),
        })
    }
}
