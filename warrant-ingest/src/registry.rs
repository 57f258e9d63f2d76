use std::collections::HashMap;
use std::sync::Arc;
use warrant_model::{EntryHandler, KindSchema};

struct RegisteredKind {
    schema: KindSchema,
    handler: Option<Arc<dyn EntryHandler>>,
}

/// The resource kinds the pipeline accepts writes for.
#[derive(Default)]
pub struct KindRegistry {
    kinds: HashMap<String, RegisteredKind>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every schema without handlers.
    pub fn from_schemas(schemas: impl IntoIterator<Item = KindSchema>) -> Self {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema);
        }
        registry
    }

    /// Registers a kind, replacing any earlier registration of it.
    pub fn register(&mut self, schema: KindSchema) {
        self.kinds.insert(
            schema.kind.clone(),
            RegisteredKind {
                schema,
                handler: None,
            },
        );
    }

    pub fn register_with_handler(&mut self, schema: KindSchema, handler: Arc<dyn EntryHandler>) {
        self.kinds.insert(
            schema.kind.clone(),
            RegisteredKind {
                schema,
                handler: Some(handler),
            },
        );
    }

    pub fn schema(&self, kind: &str) -> Option<&KindSchema> {
        self.kinds.get(kind).map(|k| &k.schema)
    }

    pub fn handler(&self, kind: &str) -> Option<&Arc<dyn EntryHandler>> {
        self.kinds.get(kind).and_then(|k| k.handler.as_ref())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
