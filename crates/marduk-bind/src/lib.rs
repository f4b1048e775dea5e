//! Marduk bind: markup instantiation and data-binding compiler.
//!
//! Takes a parsed `.mkml` [`NodeDescriptor`](marduk_mkml::NodeDescriptor),
//! compiles it once against a [`TypeRegistry`] into an [`Instantiator`], and
//! builds live object trees whose `{...}` bindings are resolved and turned
//! into change and event handlers.
//!
//! # Quick start
//!
//! ```rust
//! use marduk_bind::prelude::*;
//!
//! let ui = Interface::new(TypeRegistry::with_widgets());
//! let loaded = ui
//!     .load_str(r#"
//!         Column {
//!             Slider as volume { value: 0.25 }
//!             Text as readout { text: {../volume.value} }
//!         }
//!     "#)
//!     .unwrap();
//!
//! let readout = loaded.root.find_by_name("readout").unwrap();
//! assert_eq!(readout.get("text"), Some(Value::from("0.25")));
//!
//! loaded.root.find_by_name("volume").unwrap().set("value", 0.5f32);
//! assert_eq!(readout.get("text"), Some(Value::from("0.5")));
//! ```
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`types`] | type declarations, registry, memoizing `TypeCache` |
//! | [`object`] | runtime objects, change and event handlers, logical tree |
//! | [`binding`] | binding expressions and source resolution |
//! | [`instantiate`] | compile descriptions, build instances, item factories |
//! | [`dispatch`] | trampolines and event handlers |
//! | [`styling`] | style sheets and `${name}` constants |
//! | [`interface`] | `Interface` entry point and `Document` |

pub mod address;
pub mod binding;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod instantiate;
pub mod interface;
pub mod logging;
pub mod member;
pub mod object;
pub mod styling;
pub mod types;
pub mod value;
pub mod widgets;

pub use config::CompilerConfig;
pub use error::{CompileError, ConversionError, ExpressionSyntaxError, StructuralError, StyleError};
pub use styling::Styling;
pub use interface::{Document, Interface, Loaded};

/// Everything a host needs to declare types and load documents.
pub mod prelude {
    pub use crate::address::{ChildIndex, NodeAddress, Step};
    pub use crate::binding::{Binding, BindingExpr};
    pub use crate::config::CompilerConfig;
    pub use crate::dispatch::{DispatchCompiler, DispatchReport};
    pub use crate::error::CompileError;
    pub use crate::instantiate::{Instantiator, ItemFactory};
    pub use crate::interface::{Document, Interface, Loaded};
    pub use crate::logging::{init_logging, LoggingConfig};
    pub use crate::member::MemberReference;
    pub use crate::object::{Obj, Object};
    pub use crate::styling::Styling;
    pub use crate::types::{ContainerKind, ExtensionDecl, MemberKind, TypeCache, TypeDecl, TypeRegistry};
    pub use crate::value::{Value, ValueType};
    pub use crate::widgets::{Color, Paint};

    pub use marduk_mkml::{parse_str, NodeDescriptor};
}

#[cfg(test)]
mod scenario_tests;
