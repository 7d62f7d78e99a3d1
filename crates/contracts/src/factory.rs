//! Adapter factory registry
//!
//! Maps a protocol name (`"udp"`, `"mqtt"`, ...) to a constructor producing a
//! [`Distributor`]. Callers create their own registry and register only the
//! adapters they need; unknown protocols are reported, never fatal to the
//! registry itself.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{ContractError, Distributor};

/// Constructor for one protocol
#[async_trait]
pub trait DistributorFactory: Send + Sync {
    /// Build an unconnected distributor named `name` from `config`
    async fn create(
        &self,
        name: &str,
        config: Map<String, Value>,
    ) -> Result<Arc<dyn Distributor>, ContractError>;
}

/// Factory backed by an async closure
pub struct FnFactory<F>(F);

impl<F> FnFactory<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> DistributorFactory for FnFactory<F>
where
    F: Fn(String, Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Distributor>, ContractError>> + Send + 'static,
{
    async fn create(
        &self,
        name: &str,
        config: Map<String, Value>,
    ) -> Result<Arc<dyn Distributor>, ContractError> {
        (self.0)(name.to_string(), config).await
    }
}

/// Registry of available distributor factories
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn DistributorFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for `protocol`
    pub fn register(&mut self, protocol: impl Into<String>, factory: Arc<dyn DistributorFactory>) {
        self.factories.insert(protocol.into(), factory);
    }

    /// Register an async closure as the factory for `protocol`
    pub fn register_fn<F, Fut>(&mut self, protocol: impl Into<String>, f: F)
    where
        F: Fn(String, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Distributor>, ContractError>> + Send + 'static,
    {
        self.register(protocol, Arc::new(FnFactory::new(f)));
    }

    pub fn get(&self, protocol: &str) -> Option<&Arc<dyn DistributorFactory>> {
        self.factories.get(protocol)
    }

    pub fn contains(&self, protocol: &str) -> bool {
        self.factories.contains_key(protocol)
    }

    /// Registered protocol names, sorted
    pub fn protocols(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a distributor through the factory for `protocol`
    ///
    /// # Errors
    /// - [`ContractError::UnknownProtocol`] when nothing is registered
    /// - Any construction error from the factory
    pub async fn create(
        &self,
        protocol: &str,
        name: &str,
        config: Map<String, Value>,
    ) -> Result<Arc<dyn Distributor>, ContractError> {
        let factory = self
            .get(protocol)
            .ok_or_else(|| ContractError::UnknownProtocol {
                protocol: protocol.to_string(),
            })?;
        factory.create(name, config).await
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capabilities, DistributorCore};

    struct Noop {
        core: DistributorCore,
    }

    #[async_trait]
    impl Distributor for Noop {
        fn core(&self) -> &DistributorCore {
            &self.core
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::send_only()
        }

        async fn connect(&self) -> Result<(), ContractError> {
            self.core.mark_connected();
            Ok(())
        }
    }

    fn registry() -> FactoryRegistry {
        let mut registry = FactoryRegistry::new();
        registry.register_fn("noop", |name, config| async move {
            Ok(Arc::new(Noop {
                core: DistributorCore::new(name, config),
            }) as Arc<dyn Distributor>)
        });
        registry
    }

    #[tokio::test]
    async fn creates_through_registered_factory() {
        let registry = registry();
        let distributor = registry
            .create("noop", "noop_s1", Map::new())
            .await
            .unwrap();

        assert_eq!(distributor.name(), "noop_s1");
        assert!(registry.contains("noop"));
        assert_eq!(registry.protocols(), vec!["noop".to_string()]);
    }

    #[tokio::test]
    async fn unknown_protocol_is_reported() {
        let err = registry()
            .create("carrier-pigeon", "x", Map::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ContractError::UnknownProtocol { .. }));
    }
}
