use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::compiler::{self, BlockBody, Env, Renderer};
use crate::context::Scope;
use crate::error::{ParseError, RenderError};
use crate::output::Output;
use crate::parser::{Parser, DEFAULT_MAX_BLOCK_DEPTH};
use crate::registry::{HelperValue, Registry};

#[derive(Debug, Clone)]
pub struct Config {
    /// HTML-escape `{{ }}` output. Triple-stash output is never escaped.
    pub escape_html: bool,
    /// How deeply partials may include other partials.
    pub max_partial_depth: usize,
    /// How deeply blocks may nest within one template.
    pub max_block_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escape_html: true,
            max_partial_depth: 64,
            max_block_depth: DEFAULT_MAX_BLOCK_DEPTH,
        }
    }
}

/// Compiles templates and owns the helper/partial registry they render
/// against. Clones share the same registry.
#[derive(Clone, Default)]
pub struct Engine {
    registry: Arc<RwLock<Registry>>,
    config: Arc<Config>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            registry: Arc::default(),
            config: Arc::new(config),
        }
    }

    pub fn compile(&self, source: &str) -> Result<Template, ParseError> {
        let tree = Parser::new(source)
            .with_max_depth(self.config.max_block_depth)
            .parse()?;
        Ok(Template {
            renderer: Arc::new(compiler::compile(tree)),
            engine: self.clone(),
        })
    }

    /// Registers (or replaces) an inline helper. Templates compiled earlier
    /// see it on their next render.
    pub fn register_helper<F>(&self, name: impl Into<String>, helper: F)
    where
        F: Fn(&mut Output<'_>, &Scope<'_>, &[Value]) -> Result<HelperValue, RenderError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        log::debug!("registering helper `{name}`");
        self.registry.write().insert_helper(name, Arc::new(helper));
    }

    pub fn register_block_helper<F>(&self, name: impl Into<String>, helper: F)
    where
        F: Fn(&mut Output<'_>, &Scope<'_>, &[Value], &BlockBody<'_>) -> Result<(), RenderError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        log::debug!("registering block helper `{name}`");
        self.registry.write().insert_block_helper(name, Arc::new(helper));
    }

    pub fn register_partial(&self, name: impl Into<String>, template: &Template) {
        let name = name.into();
        log::debug!("registering partial `{name}`");
        self.registry
            .write()
            .insert_partial(name, Arc::clone(&template.renderer));
    }

    /// Compiles `source` and registers it as a partial.
    pub fn register_partial_source(
        &self,
        name: impl Into<String>,
        source: &str,
    ) -> Result<(), ParseError> {
        let template = self.compile(source)?;
        self.register_partial(name, &template);
        Ok(())
    }
}

/// A compiled template: the render function produced by
/// [`Engine::compile`]. Cheap to clone and safe to render from many threads
/// at once.
#[derive(Clone)]
pub struct Template {
    renderer: Arc<Renderer>,
    engine: Engine,
}

impl Template {
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render_to(data, &mut out)?;
        Ok(out)
    }

    pub fn render_to<T, W>(&self, data: &T, sink: &mut W) -> Result<(), RenderError>
    where
        T: Serialize + ?Sized,
        W: fmt::Write,
    {
        let value = serde_json::to_value(data)?;
        self.render_value(&value, sink)
    }

    /// Renders against data that is already a `serde_json::Value`.
    pub fn render_value(&self, data: &Value, sink: &mut dyn fmt::Write) -> Result<(), RenderError> {
        log::debug!("rendering template");
        let config: &Config = &self.engine.config;
        let env = Env {
            registry: &*self.engine.registry,
            config,
            depth: 0,
        };
        let mut out = Output::new(sink, config.escape_html);
        self.renderer.render(&mut out, &Scope::root(data), &env)
    }
}
