use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use bytes::Bytes;
use futures::{future::BoxFuture, stream::BoxStream};

/// Describes how values of an async type are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactiveTypeDescriptor {
    pub type_name: &'static str,
    /// Yields zero or more values.
    pub multi_value: bool,
    /// Completes without a value.
    pub no_value: bool,
}

impl ReactiveTypeDescriptor {
    pub fn single_value<T: 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            multi_value: false,
            no_value: false,
        }
    }

    pub fn multi_value<T: 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            multi_value: true,
            no_value: false,
        }
    }

    pub fn no_value<T: 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            multi_value: false,
            no_value: true,
        }
    }
}

/// Registry of async types a responder or requester can adapt to.
#[derive(Debug, Clone, Default)]
pub struct ReactiveAdapterRegistry {
    adapters: HashMap<TypeId, ReactiveTypeDescriptor>,
}

impl ReactiveAdapterRegistry {
    /// Registry pre-populated with boxed futures and streams of [`Bytes`].
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry
            .register::<BoxFuture<'static, Bytes>>(ReactiveTypeDescriptor::single_value::<
                BoxFuture<'static, Bytes>,
            >())
            .register::<BoxStream<'static, Bytes>>(ReactiveTypeDescriptor::multi_value::<
                BoxStream<'static, Bytes>,
            >())
            .register::<BoxFuture<'static, ()>>(ReactiveTypeDescriptor::no_value::<
                BoxFuture<'static, ()>,
            >());
        registry
    }

    /// Process-wide registry used unless one is configured explicitly.
    pub fn shared() -> Arc<ReactiveAdapterRegistry> {
        static SHARED: OnceLock<Arc<ReactiveAdapterRegistry>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(ReactiveAdapterRegistry::new()))
            .clone()
    }

    pub fn register<T: 'static>(&mut self, descriptor: ReactiveTypeDescriptor) -> &mut Self {
        self.adapters.insert(TypeId::of::<T>(), descriptor);
        self
    }

    pub fn get_adapter(&self, type_id: TypeId) -> Option<&ReactiveTypeDescriptor> {
        self.adapters.get(&type_id)
    }

    pub fn has_adapters(&self) -> bool {
        !self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_registered_types() {
        let registry = ReactiveAdapterRegistry::new();
        let stream = registry
            .get_adapter(TypeId::of::<BoxStream<'static, Bytes>>())
            .unwrap();
        assert!(stream.multi_value);
        let unit = registry
            .get_adapter(TypeId::of::<BoxFuture<'static, ()>>())
            .unwrap();
        assert!(unit.no_value);
        assert!(registry.get_adapter(TypeId::of::<String>()).is_none());
    }

    #[test]
    fn shared_is_a_single_instance() {
        assert!(Arc::ptr_eq(
            &ReactiveAdapterRegistry::shared(),
            &ReactiveAdapterRegistry::shared()
        ));
        assert!(ReactiveAdapterRegistry::shared().has_adapters());
    }
}
