use std::fmt;

// ── SourcePos ─────────────────────────────────────────────────────────────

/// 1-based line/column of a token in the `.mkml` source.
///
/// Descriptors built programmatically use [`SourcePos::default`], which
/// reports `0:0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub line: usize,
    pub col: usize,
}

impl SourcePos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// `true` when the position came from parsed text.
    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── AttrValue ─────────────────────────────────────────────────────────────

/// Right-hand side of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    /// Literal text as written: `8`, `0.75`, `#ff0000ff`, `center`, `"hello"`.
    ///
    /// Literals are untyped here; the compiler converts them using the
    /// static type of the member they are assigned to.
    Literal(String),
    /// Raw binding expression found between braces: `{../title}`.
    Binding(String),
}

impl AttrValue {
    pub fn is_binding(&self) -> bool {
        matches!(self, AttrValue::Binding(_))
    }

    pub fn text(&self) -> &str {
        match self {
            AttrValue::Literal(s) | AttrValue::Binding(s) => s,
        }
    }
}

// ── Attribute ─────────────────────────────────────────────────────────────

/// A single `name: value` line inside a node block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub pos: SourcePos,
}

// ── Templates ─────────────────────────────────────────────────────────────

/// What a template sub-tree is used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateRole {
    /// The visual shell of a templated control: `template { ... }`.
    Control,
    /// Repeating content of an items host, selected by the runtime type name
    /// of each data item: `item_template "Person" { ... }`.
    /// `None` is the fallback template used when no data type matches.
    /// `fetch` names the member of the data item that lists its sub-items:
    /// `item_template "Folder" fetch entries { ... }`.
    Item { data_type: Option<String>, fetch: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateDescriptor {
    pub role: TemplateRole,
    pub root: NodeDescriptor,
}

// ── NodeDescriptor ────────────────────────────────────────────────────────

/// One widget instantiation in a markup tree.
///
/// ```mkml
/// Column {
///     gap: 8
///     Text as title { text: {../caption} }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeDescriptor {
    /// Type name resolved against the type registry: `"Column"`, `"Text"`.
    pub type_name: String,
    pub attributes: Vec<Attribute>,
    /// Anonymous child nodes, in declaration order.
    pub children: Vec<NodeDescriptor>,
    /// Children declared with `Type as name { ... }`, in declaration order.
    pub named_children: Vec<(String, NodeDescriptor)>,
    pub templates: Vec<TemplateDescriptor>,
    pub pos: SourcePos,
}

impl NodeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            named_children: Vec::new(),
            templates: Vec::new(),
            pos: SourcePos::default(),
        }
    }

    /// Add a literal attribute.
    pub fn attr(mut self, name: impl Into<String>, literal: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: AttrValue::Literal(literal.into()),
            pos: SourcePos::default(),
        });
        self
    }

    /// Add a binding attribute. `expression` is the text between the braces.
    pub fn bind(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: AttrValue::Binding(expression.into()),
            pos: SourcePos::default(),
        });
        self
    }

    pub fn child(mut self, child: NodeDescriptor) -> Self {
        self.children.push(child);
        self
    }

    pub fn named(mut self, name: impl Into<String>, child: NodeDescriptor) -> Self {
        self.named_children.push((name.into(), child));
        self
    }

    pub fn template(mut self, root: NodeDescriptor) -> Self {
        self.templates.push(TemplateDescriptor { role: TemplateRole::Control, root });
        self
    }

    pub fn item_template(self, data_type: Option<&str>, root: NodeDescriptor) -> Self {
        self.hierarchical_item_template(data_type, None, root)
    }

    pub fn hierarchical_item_template(
        mut self,
        data_type: Option<&str>,
        fetch: Option<&str>,
        root: NodeDescriptor,
    ) -> Self {
        self.templates.push(TemplateDescriptor {
            role: TemplateRole::Item {
                data_type: data_type.map(str::to_string),
                fetch: fetch.map(str::to_string),
            },
            root,
        });
        self
    }

    pub fn at(mut self, pos: SourcePos) -> Self {
        self.pos = pos;
        self
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// The control template, if any.
    pub fn control_template(&self) -> Option<&NodeDescriptor> {
        self.templates
            .iter()
            .find(|t| t.role == TemplateRole::Control)
            .map(|t| &t.root)
    }

    /// Item templates as `(data type, fetch member, root)`.
    pub fn item_templates(&self) -> impl Iterator<Item = (Option<&str>, Option<&str>, &NodeDescriptor)> {
        self.templates.iter().filter_map(|t| match &t.role {
            TemplateRole::Item { data_type, fetch } => {
                Some((data_type.as_deref(), fetch.as_deref(), &t.root))
            }
            TemplateRole::Control => None,
        })
    }

    /// Total number of nodes in this sub-tree, templates included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeDescriptor::node_count).sum::<usize>()
            + self.named_children.iter().map(|(_, n)| n.node_count()).sum::<usize>()
            + self.templates.iter().map(|t| t.root.node_count()).sum::<usize>()
    }
}
