//! tinybars: a small Handlebars-style template engine.
//!
//! A template is compiled once, in three passes (tokenizer, recursive-descent
//! parser, binder), into a tree of closures. The resulting [`Template`] maps
//! any `serde::Serialize` data to text and can be rendered any number of
//! times, from any number of threads.
//!
//! Supported syntax:
//! - `{{path}}` (HTML-escaped) and `{{{path}}}` (raw). Paths may be dotted
//!   (`a.b`), climb scopes (`../name`), start from the top (`@root.x`), or
//!   name the current value (`this`, `.`).
//! - `{{helper arg "literal" 3}}` calls a registered helper.
//! - `{{5}}`, `{{"text"}}` and `{{true}}` render the literal itself.
//! - `{{#if x}}`, `{{#unless x}}`, `{{#each xs}}`, `{{#with x}}`, each with an
//!   optional `{{else}}`. Inside `#each`: `@index`, `@key`, `@first`, `@last`.
//! - `{{#name}}...{{/name}}` sections and `{{^name}}...{{/name}}` inverted
//!   sections.
//! - `{{> partial}}` and `{{> partial context}}`.
//! - `{{! comment }}` and `{{!-- comment that may contain {{tags}} --}}`.
//!
//! Helpers and partials are looked up by name every time a template renders,
//! so they may be registered after the templates that use them are
//! compiled.
//!
//! ```
//! let template = tinybars::compile("Hello, {{name}}!").unwrap();
//! let out = template.render(&serde_json::json!({"name": "<b>Bob</b>"})).unwrap();
//! assert_eq!(out, "Hello, &lt;b&gt;Bob&lt;/b&gt;!");
//! ```

pub mod ast;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod registry;

use serde_json::Value;

pub use compiler::BlockBody;
pub use context::Scope;
pub use engine::{Config, Engine, Template};
pub use error::{LexError, ParseError, RenderError};
pub use output::{escape_html, Output};
pub use registry::{HelperValue, SafeString};

lazy_static::lazy_static! {
    static ref DEFAULT_ENGINE: Engine = Engine::new();
}

/// The process-wide engine behind the free functions of this crate.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// Compiles `source` against the process-wide registry.
pub fn compile(source: &str) -> Result<Template, ParseError> {
    DEFAULT_ENGINE.compile(source)
}

pub fn register_helper<F>(name: impl Into<String>, helper: F)
where
    F: Fn(&mut Output<'_>, &Scope<'_>, &[Value]) -> Result<HelperValue, RenderError>
        + Send
        + Sync
        + 'static,
{
    DEFAULT_ENGINE.register_helper(name, helper)
}

pub fn register_block_helper<F>(name: impl Into<String>, helper: F)
where
    F: Fn(&mut Output<'_>, &Scope<'_>, &[Value], &BlockBody<'_>) -> Result<(), RenderError>
        + Send
        + Sync
        + 'static,
{
    DEFAULT_ENGINE.register_block_helper(name, helper)
}

pub fn register_partial(name: impl Into<String>, template: &Template) {
    DEFAULT_ENGINE.register_partial(name, template)
}
