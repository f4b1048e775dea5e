use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use marduk_mkml::NodeDescriptor;

use crate::address::{ChildIndex, Step};
use crate::binding::Binding;
use crate::config::CompilerConfig;
use crate::dispatch::{DispatchCompiler, DispatchId, DispatchReport};
use crate::error::CompileError;
use crate::member::MemberReference;
use crate::object::{Obj, DATA_SOURCE, EXPANDED, HAS_SUB_ITEMS, ITEMS, ITEMS_CONTAINER};
use crate::styling::Styling;
use crate::types::{ContainerKind, TypeCache};
use crate::value::{Value, ValueType};

use super::{build_node, Instantiator};

/// Fetch member meaning "the data item itself is the list of sub-items".
const FETCH_SELF: &str = "self";

/// Compiled item template. Built once per description and reused for every
/// generated item.
///
/// A hierarchical template names a `fetch` member: the data item's sub-items
/// are read through it and generated, with the same templates, into the
/// item's `items_container` the first time the item is expanded.
pub struct ItemFactory {
    data_type: Option<String>,
    fetch: Option<String>,
    instantiator: Instantiator,
    types: Arc<TypeCache>,
    builds: AtomicUsize,
}

impl ItemFactory {
    pub(crate) fn compile(
        data_type: Option<&str>,
        fetch: Option<&str>,
        root: &NodeDescriptor,
        types: &Arc<TypeCache>,
        styling: &Styling,
    ) -> Result<Self, CompileError> {
        Ok(Self {
            data_type: data_type.map(str::to_string),
            fetch: fetch.map(str::to_string),
            instantiator: Instantiator::compile_styled(root, types, styling)?,
            types: types.clone(),
            builds: AtomicUsize::new(0),
        })
    }

    /// Data type this template is selected for; `None` matches anything.
    pub fn data_type(&self) -> Option<&str> {
        self.data_type.as_deref()
    }

    /// Member the sub-items of a data item are fetched from.
    pub fn fetch(&self) -> Option<&str> {
        self.fetch.as_deref()
    }

    pub fn is_hierarchical(&self) -> bool {
        self.fetch.is_some()
    }

    /// Sub-items of `data`, or `None` for a flat template or a data item
    /// without the fetch member.
    pub fn sub_items(&self, data: &Value) -> Option<Vec<Value>> {
        let fetch = self.fetch.as_deref()?;
        let list = if fetch == FETCH_SELF {
            data.clone()
        } else {
            let mut member = MemberReference::new(data.clone());
            if !member.try_find_member(&self.types, fetch) {
                log::debug!("`{}` has no member `{fetch}` to fetch sub-items from", data.value_type());
                return None;
            }
            member.get()
        };
        list.as_list().map(<[Value]>::to_vec)
    }

    pub fn has_sub_items(&self, data: &Value) -> bool {
        self.sub_items(data).is_some_and(|items| !items.is_empty())
    }

    pub fn instantiator(&self) -> &Instantiator {
        &self.instantiator
    }

    /// Number of items built from this factory so far.
    pub fn instantiations(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Build one item under `host` at `index` with `data` as its data source.
    /// The item is linked to the host but not yet attached; its bindings are
    /// returned unresolved.
    pub fn build(&self, host: &Obj, index: usize, data: Value) -> (Obj, Vec<Binding>) {
        let document = host.document();
        let step = Step::child(ContainerKind::TemplatedItems, index);
        let mut bindings = Vec::new();
        let root = build_node(
            self.instantiator.root(),
            document.as_ref(),
            Some((host, step)),
            Some(host),
            &mut bindings,
        );
        let hierarchy = host.item_factories().filter(|_| self.is_hierarchical());
        if let Some(factories) = &hierarchy {
            if root.type_info().member(HAS_SUB_ITEMS).is_some() {
                root.set(HAS_SUB_ITEMS, self.has_sub_items(&data));
            }
            watch_expansion(&root, factories.clone());
        }
        root.write_slot(DATA_SOURCE, data, true);
        if let Some(factories) = &hierarchy {
            if root.get(EXPANDED) == Some(Value::Bool(true)) {
                expand(&root, factories);
            }
        }
        self.builds.fetch_add(1, Ordering::Relaxed);
        (root, bindings)
    }
}

/// Expand `item` when its `expanded` member turns true.
fn watch_expansion(item: &Obj, factories: Arc<ItemFactories>) {
    item.on_value_changed(
        DispatchId::EXPAND,
        Arc::new(move |item: &Obj, member: &str, value: &Value| {
            if member == EXPANDED && *value == Value::Bool(true) {
                expand(item, &factories);
            }
        }),
    );
}

/// Generate the sub-items of a hierarchical item into its `items_container`.
/// An item is expanded once; later calls leave the container alone. Returns
/// the number of sub-items generated.
pub fn expand(item: &Obj, factories: &Arc<ItemFactories>) -> usize {
    let Some(container) = item.find_descendant(ITEMS_CONTAINER) else {
        log::debug!("{item}: no `{ITEMS_CONTAINER}` to expand into");
        return 0;
    };
    if container.item_count() > 0 {
        return 0;
    }
    let data = item.data_source();
    let Some(sub_items) = factories.select(&data).and_then(|f| f.sub_items(&data)) else {
        return 0;
    };
    if container.item_factories().is_none_or(|own| own.entries().is_empty()) {
        container.set_item_factories(factories.clone());
    }
    let count = sub_items.len();
    container.set(ITEMS, Value::list(sub_items));
    log::debug!("{item}: expanded {count} sub-items into {container}");
    count
}

impl fmt::Debug for ItemFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemFactory")
            .field("data_type", &self.data_type)
            .field("fetch", &self.fetch)
            .field("root", &self.instantiator.root_type())
            .field("instantiations", &self.instantiations())
            .finish()
    }
}

/// The item templates of one items host.
pub struct ItemFactories {
    entries: Vec<Arc<ItemFactory>>,
    types: Arc<TypeCache>,
}

impl ItemFactories {
    pub(crate) fn new(entries: Vec<Arc<ItemFactory>>, types: Arc<TypeCache>) -> Self {
        Self { entries, types }
    }

    pub fn entries(&self) -> &[Arc<ItemFactory>] {
        &self.entries
    }

    /// Template for `data`: the most derived type with a dedicated template,
    /// else the fallback template.
    pub fn select(&self, data: &Value) -> Option<&Arc<ItemFactory>> {
        let ty = data.value_type();
        let lineage: Vec<Arc<str>> = match &ty {
            ValueType::Class(name) => self
                .types
                .resolve_type(name)
                .map(|info| info.ancestors.clone())
                .unwrap_or_else(|| vec![name.clone()]),
            other => vec![Arc::from(other.name())],
        };
        lineage
            .iter()
            .find_map(|name| self.entries.iter().find(|f| f.data_type() == Some(&**name)))
            .or_else(|| self.entries.iter().find(|f| f.data_type().is_none()))
    }
}

impl fmt::Debug for ItemFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

/// Rebuild the items of `host` from `data`: drop the current items, build one
/// per data entry with the matching factory, then resolve and dispatch the
/// new items' bindings.
pub fn regenerate(host: &Obj, data: &[Value]) -> Result<DispatchReport, CompileError> {
    let Some(factories) = host.item_factories() else {
        log::debug!("{host} does not generate items");
        return Ok(DispatchReport::default());
    };

    let removed = host.clear_items();
    let mut bindings = Vec::new();
    for item in data {
        let Some(factory) = factories.select(item) else {
            log::warn!("{host}: no item template for `{}`; item skipped", item.value_type());
            continue;
        };
        let index = host.item_count();
        let (obj, mut built) = factory.build(host, index, item.clone());
        host.attach(ChildIndex::At(index), obj);
        bindings.append(&mut built);
    }

    let document = host.document();
    let fallback = CompilerConfig::default();
    let config = document.as_ref().map(|d| d.interface().config()).unwrap_or(&fallback);
    let report = DispatchCompiler::with_parts(&factories.types, config).resolve(&mut bindings)?;
    if let Some(document) = &document {
        document.record(bindings);
    }
    log::debug!("{host}: {} items generated, {removed} removed; {report}", host.item_count());
    Ok(report)
}
