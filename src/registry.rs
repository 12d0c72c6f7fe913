use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::compiler::{BlockBody, Renderer};
use crate::context::Scope;
use crate::error::RenderError;
use crate::output::Output;

/// Text a helper marks as already safe; it is never escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeString(pub String);

/// What an inline helper hands back after (optionally) writing to the output.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperValue {
    Nothing,
    Value(Value),
    Safe(SafeString),
}

impl From<Value> for HelperValue {
    fn from(value: Value) -> Self {
        HelperValue::Value(value)
    }
}

impl From<SafeString> for HelperValue {
    fn from(safe: SafeString) -> Self {
        HelperValue::Safe(safe)
    }
}

impl From<()> for HelperValue {
    fn from(_: ()) -> Self {
        HelperValue::Nothing
    }
}

pub type Helper =
    dyn Fn(&mut Output<'_>, &Scope<'_>, &[Value]) -> Result<HelperValue, RenderError> + Send + Sync;

pub type BlockHelper = dyn Fn(&mut Output<'_>, &Scope<'_>, &[Value], &BlockBody<'_>) -> Result<(), RenderError>
    + Send
    + Sync;

/// Named helpers and partials, consulted by name on every render.
#[derive(Default)]
pub struct Registry {
    helpers: HashMap<String, Arc<Helper>>,
    block_helpers: HashMap<String, Arc<BlockHelper>>,
    partials: HashMap<String, Arc<Renderer>>,
}

impl Registry {
    pub fn insert_helper(&mut self, name: String, helper: Arc<Helper>) {
        if self.helpers.insert(name.clone(), helper).is_some() {
            log::debug!("helper `{name}` replaced");
        }
    }

    pub fn insert_block_helper(&mut self, name: String, helper: Arc<BlockHelper>) {
        if self.block_helpers.insert(name.clone(), helper).is_some() {
            log::debug!("block helper `{name}` replaced");
        }
    }

    pub fn insert_partial(&mut self, name: String, partial: Arc<Renderer>) {
        if self.partials.insert(name.clone(), partial).is_some() {
            log::debug!("partial `{name}` replaced");
        }
    }

    pub fn helper(&self, name: &str) -> Option<Arc<Helper>> {
        self.helpers.get(name).cloned()
    }

    pub fn block_helper(&self, name: &str) -> Option<Arc<BlockHelper>> {
        self.block_helpers.get(name).cloned()
    }

    pub fn partial(&self, name: &str) -> Option<Arc<Renderer>> {
        self.partials.get(name).cloned()
    }
}
