//! Entry point: an [`Interface`] owns the type cache and compiled shapes, and
//! loads descriptions into live, bound [`Document`]s.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use marduk_mkml::NodeDescriptor;
use parking_lot::{Mutex, RwLock};

use crate::binding::Binding;
use crate::config::CompilerConfig;
use crate::dispatch::{DispatchCompiler, DispatchReport};
use crate::error::CompileError;
use crate::instantiate::Instantiator;
use crate::object::{Obj, Object, DATA_SOURCE};
use crate::styling::Styling;
use crate::types::{TypeCache, TypeRegistry};
use crate::value::Value;

pub struct Interface {
    types: Arc<TypeCache>,
    config: CompilerConfig,
    styling: Styling,
    shapes: DashMap<NodeDescriptor, Arc<Instantiator>>,
}

/// A loaded, bound tree.
#[derive(Debug)]
pub struct Loaded {
    pub root: Obj,
    pub document: Arc<Document>,
    pub report: DispatchReport,
}

impl Interface {
    pub fn new(registry: TypeRegistry) -> Arc<Self> {
        Self::with_config(registry, CompilerConfig::default())
    }

    pub fn with_config(registry: TypeRegistry, config: CompilerConfig) -> Arc<Self> {
        Self::with_styling(registry, config, Styling::default())
    }

    /// Interface whose descriptions take member defaults and `${name}`
    /// constants from `styling`.
    pub fn with_styling(registry: TypeRegistry, config: CompilerConfig, styling: Styling) -> Arc<Self> {
        Arc::new(Self {
            types: Arc::new(TypeCache::new(registry)),
            config,
            styling,
            shapes: DashMap::new(),
        })
    }

    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn styling(&self) -> &Styling {
        &self.styling
    }

    /// Compile `desc`, reusing an earlier instantiator for an identical
    /// description when shape caching is on.
    pub fn compile(&self, desc: &NodeDescriptor) -> Result<Arc<Instantiator>, CompileError> {
        if self.config.cache_shapes {
            if let Some(hit) = self.shapes.get(desc) {
                return Ok(hit.value().clone());
            }
        }
        let compiled = Arc::new(Instantiator::compile_styled(desc, &self.types, &self.styling)?);
        if self.config.cache_shapes {
            return Ok(self.shapes.entry(desc.clone()).or_insert(compiled).value().clone());
        }
        Ok(compiled)
    }

    pub fn cached_shapes(&self) -> usize {
        self.shapes.len()
    }

    /// Compile, build and bind `desc`.
    pub fn load(self: &Arc<Self>, desc: &NodeDescriptor) -> Result<Loaded, CompileError> {
        self.load_with(desc, Value::Null)
    }

    /// Like [`load`](Self::load), with `data` installed as the root's data
    /// source before bindings are resolved.
    pub fn load_with(self: &Arc<Self>, desc: &NodeDescriptor, data: Value) -> Result<Loaded, CompileError> {
        let instantiator = self.compile(desc)?;
        let mut built = instantiator.build(self);
        if !data.is_null() {
            built.root.write_slot(DATA_SOURCE, data, true);
        }
        let report = DispatchCompiler::new(self).resolve(&mut built.bindings)?;
        built.document.record(built.bindings);
        log::debug!("loaded `{}`: {report}", instantiator.root_type());
        Ok(Loaded { root: built.root, document: built.document, report })
    }

    /// Parse markup text and load it.
    pub fn load_str(self: &Arc<Self>, src: &str) -> Result<Loaded, CompileError> {
        self.load(&marduk_mkml::parse_str(src)?)
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("types", &self.types)
            .field("config", &self.config)
            .field("shapes", &self.cached_shapes())
            .finish()
    }
}

// ── Document ──────────────────────────────────────────────────────────────

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// One built tree: its root, the interface that produced it, and every
/// binding created for it (including those of generated items).
pub struct Document {
    id: u64,
    interface: Arc<Interface>,
    root: RwLock<Weak<Object>>,
    bindings: Mutex<Vec<Binding>>,
}

impl Document {
    pub(crate) fn new(interface: Arc<Interface>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
            interface,
            root: RwLock::new(Weak::new()),
            bindings: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    pub fn root(&self) -> Option<Obj> {
        self.root.read().upgrade()
    }

    pub(crate) fn set_root(&self, root: &Obj) {
        *self.root.write() = Arc::downgrade(root);
    }

    /// Snapshot of the document's bindings.
    pub fn bindings(&self) -> Vec<Binding> {
        self.bindings.lock().clone()
    }

    /// Append bindings, dropping those whose target no longer exists.
    pub(crate) fn record(&self, bindings: Vec<Binding>) {
        let mut list = self.bindings.lock();
        list.retain(|b| b.target().is_alive());
        list.extend(bindings);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("bindings", &self.bindings.lock().len())
            .finish_non_exhaustive()
    }
}
