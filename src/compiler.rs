//! Binds a parsed template to closures.
//!
//! Every node is turned into one boxed step, once. Steps capture the node's
//! static shape (paths, names, child renderers) and nothing else; data, the
//! output and the registry all arrive per call, so a [`Renderer`] can be
//! shared freely between threads.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::ast::{BlockKind, Node, Param, Template};
use crate::context::{entries, is_truthy, Entries, Scope};
use crate::engine::Config;
use crate::error::RenderError;
use crate::output::Output;
use crate::registry::{BlockHelper, Helper, HelperValue, Registry};

type Step = Box<dyn Fn(&mut Output<'_>, &Scope<'_>, &Env<'_>) -> Result<(), RenderError> + Send + Sync>;

fn step<F>(f: F) -> Step
where
    F: Fn(&mut Output<'_>, &Scope<'_>, &Env<'_>) -> Result<(), RenderError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Per-render view of the engine: where to look names up, and how deep in
/// partials we are.
pub(crate) struct Env<'e> {
    pub(crate) registry: &'e RwLock<Registry>,
    pub(crate) config: &'e Config,
    pub(crate) depth: usize,
}

impl Env<'_> {
    fn helper(&self, name: &str) -> Result<Arc<Helper>, RenderError> {
        self.registry
            .read()
            .helper(name)
            .ok_or_else(|| RenderError::MissingHelper(name.to_string()))
    }

    fn block_helper(&self, name: &str) -> Result<Arc<BlockHelper>, RenderError> {
        self.registry
            .read()
            .block_helper(name)
            .ok_or_else(|| RenderError::MissingHelper(name.to_string()))
    }

    fn partial(&self, name: &str) -> Result<Arc<Renderer>, RenderError> {
        self.registry
            .read()
            .partial(name)
            .ok_or_else(|| RenderError::MissingPartial(name.to_string()))
    }

    fn nested(&self, partial: &str) -> Result<Env<'_>, RenderError> {
        if self.depth >= self.config.max_partial_depth {
            return Err(RenderError::PartialDepth(
                partial.to_string(),
                self.config.max_partial_depth,
            ));
        }
        Ok(Env {
            registry: self.registry,
            config: self.config,
            depth: self.depth + 1,
        })
    }
}

/// A compiled node list.
pub struct Renderer {
    steps: Vec<Step>,
}

impl Renderer {
    pub(crate) fn render(
        &self,
        out: &mut Output<'_>,
        scope: &Scope<'_>,
        env: &Env<'_>,
    ) -> Result<(), RenderError> {
        for step in &self.steps {
            step(out, scope, env)?;
        }
        Ok(())
    }
}

/// The bodies of a block helper invocation.
pub struct BlockBody<'r> {
    consequent: &'r Renderer,
    alternate: Option<&'r Renderer>,
    env: &'r Env<'r>,
}

impl BlockBody<'_> {
    /// Renders the main body in the current context.
    pub fn render(&self, out: &mut Output<'_>, scope: &Scope<'_>) -> Result<(), RenderError> {
        self.consequent.render(out, scope, self.env)
    }

    /// Renders the main body with `value` as the new context.
    pub fn render_with(
        &self,
        out: &mut Output<'_>,
        scope: &Scope<'_>,
        value: &Value,
    ) -> Result<(), RenderError> {
        self.consequent.render(out, &scope.child(value), self.env)
    }

    /// Renders the `{{else}}` body, if there is one.
    pub fn render_inverse(
        &self,
        out: &mut Output<'_>,
        scope: &Scope<'_>,
    ) -> Result<(), RenderError> {
        match self.alternate {
            Some(alternate) => alternate.render(out, scope, self.env),
            None => Ok(()),
        }
    }

    pub fn has_inverse(&self) -> bool {
        self.alternate.is_some()
    }
}

pub fn compile(tree: Template) -> Renderer {
    let steps: Vec<Step> = tree.into_iter().map(compile_node).collect();
    log::trace!("bound {} steps", steps.len());
    Renderer { steps }
}

fn compile_node(node: Node) -> Step {
    match node {
        Node::StaticText(text) => step(move |out, _, _| out.write_safe(&text)),
        Node::Path { path, escaped } => step(move |out, scope, _| match scope.resolve(&path) {
            Some(value) => out.write_value(&value, escaped),
            None => Ok(()),
        }),
        Node::Literal { value, escaped } => {
            step(move |out, _, _| out.write_value(&value, escaped))
        }
        Node::HelperCall {
            name,
            args,
            escaped,
        } => step(move |out, scope, env| {
            let helper = env.helper(&name)?;
            let values = eval_args(&args, scope);
            match (*helper)(out, scope, &values)? {
                HelperValue::Nothing => Ok(()),
                HelperValue::Value(value) => out.write_value(&value, escaped),
                HelperValue::Safe(safe) => out.write_safe(&safe.0),
            }
        }),
        Node::Block {
            kind,
            name,
            args,
            consequent,
            alternate,
        } => compile_block(kind, name, args, compile(consequent), alternate.map(compile)),
        Node::Partial { name, context } => step(move |out, scope, env| {
            let partial = env.partial(&name)?;
            let nested = env.nested(&name)?;
            match &context {
                None => partial.render(out, scope, &nested),
                Some(param) => {
                    let value = eval(param, scope).unwrap_or(Cow::Owned(Value::Null));
                    partial.render(out, &scope.child(&value), &nested)
                }
            }
        }),
    }
}

fn compile_block(
    kind: BlockKind,
    name: String,
    args: Vec<Param>,
    consequent: Renderer,
    alternate: Option<Renderer>,
) -> Step {
    if kind == BlockKind::Helper {
        return step(move |out, scope, env| {
            let helper = env.block_helper(&name)?;
            let values = eval_args(&args, scope);
            let body = BlockBody {
                consequent: &consequent,
                alternate: alternate.as_ref(),
                env,
            };
            (*helper)(out, scope, &values, &body)
        });
    }

    let arg = args
        .into_iter()
        .next()
        .unwrap_or(Param::Literal(Value::Null));

    match kind {
        BlockKind::If | BlockKind::Unless => {
            let negate = kind == BlockKind::Unless;
            step(move |out, scope, env| {
                let value = eval(&arg, scope);
                if is_truthy(value.as_deref()) != negate {
                    consequent.render(out, scope, env)
                } else {
                    render_opt(alternate.as_ref(), out, scope, env)
                }
            })
        }
        BlockKind::With => step(move |out, scope, env| {
            let value = eval(&arg, scope);
            match value.as_deref() {
                Some(v) if is_truthy(Some(v)) => consequent.render(out, &scope.child(v), env),
                _ => render_opt(alternate.as_ref(), out, scope, env),
            }
        }),
        BlockKind::Each => step(move |out, scope, env| {
            let value = eval(&arg, scope);
            render_each(value.as_deref(), &consequent, alternate.as_ref(), out, scope, env)
        }),
        BlockKind::Section | BlockKind::Helper => {
            let helper_name = match &arg {
                Param::Path(path) => path.as_name().map(str::to_string),
                Param::Literal(_) => None,
            };
            step(move |out, scope, env| {
                if let Some(name) = &helper_name {
                    let helper = env.registry.read().block_helper(name);
                    if let Some(helper) = helper {
                        let body = BlockBody {
                            consequent: &consequent,
                            alternate: alternate.as_ref(),
                            env,
                        };
                        return (*helper)(out, scope, &[], &body);
                    }
                }

                let value = eval(&arg, scope);
                match value.as_deref() {
                    Some(items) if items.is_array() => {
                        render_each(Some(items), &consequent, alternate.as_ref(), out, scope, env)
                    }
                    Some(v) if is_truthy(Some(v)) => consequent.render(out, &scope.child(v), env),
                    _ => render_opt(alternate.as_ref(), out, scope, env),
                }
            })
        }
    }
}

fn render_opt(
    renderer: Option<&Renderer>,
    out: &mut Output<'_>,
    scope: &Scope<'_>,
    env: &Env<'_>,
) -> Result<(), RenderError> {
    match renderer {
        Some(renderer) => renderer.render(out, scope, env),
        None => Ok(()),
    }
}

/// Sequences render once per element, keyed collections once per member;
/// anything else (or an empty collection) renders the alternate.
fn render_each(
    value: Option<&Value>,
    body: &Renderer,
    alternate: Option<&Renderer>,
    out: &mut Output<'_>,
    scope: &Scope<'_>,
    env: &Env<'_>,
) -> Result<(), RenderError> {
    let mut rendered = false;
    match value.and_then(entries) {
        Some(Entries::Sequence(items)) => {
            for (index, item) in items.iter().enumerate() {
                body.render(out, &scope.item(item, index, items.len()), env)?;
                rendered = true;
            }
        }
        Some(Entries::Keyed(map)) => {
            for (position, (key, item)) in map.iter().enumerate() {
                body.render(out, &scope.entry(item, key, position, map.len()), env)?;
                rendered = true;
            }
        }
        None => {}
    }
    if rendered {
        Ok(())
    } else {
        render_opt(alternate, out, scope, env)
    }
}

fn eval<'s>(param: &'s Param, scope: &'s Scope<'_>) -> Option<Cow<'s, Value>> {
    match param {
        Param::Literal(value) => Some(Cow::Borrowed(value)),
        Param::Path(path) => scope.resolve(path),
    }
}

/// Helper arguments by value; missing paths become `null`.
fn eval_args(args: &[Param], scope: &Scope<'_>) -> Vec<Value> {
    args.iter()
        .map(|param| eval(param, scope).map_or(Value::Null, Cow::into_owned))
        .collect()
}
