use std::borrow::Cow;
use std::fmt;

use serde_json::Value;

use crate::context::display;
use crate::error::RenderError;

/// Append-only text destination handed to the render closures and helpers.
pub struct Output<'w> {
    sink: &'w mut dyn fmt::Write,
    escape: bool,
}

impl<'w> Output<'w> {
    pub fn new(sink: &'w mut dyn fmt::Write, escape: bool) -> Self {
        Self { sink, escape }
    }

    /// Writes `text` as is.
    pub fn write_safe(&mut self, text: &str) -> Result<(), RenderError> {
        Ok(self.sink.write_str(text)?)
    }

    /// Writes `text` HTML-escaped (unless escaping is turned off).
    pub fn write_escaped(&mut self, text: &str) -> Result<(), RenderError> {
        if self.escape {
            Ok(self.sink.write_str(&escape_html(text))?)
        } else {
            self.write_safe(text)
        }
    }

    pub fn write_value(&mut self, value: &Value, escaped: bool) -> Result<(), RenderError> {
        let text = display(value);
        if escaped {
            self.write_escaped(&text)
        } else {
            self.write_safe(&text)
        }
    }
}

pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
