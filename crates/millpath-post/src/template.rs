//! A small mustache-like template renderer for headers, footers and step
//! banners.
//!
//! Supported tags:
//!
//! - `{{key}}` substitutes the value, or nothing for a missing key;
//! - `{{#if key}}…{{else}}…{{/if}}` and `{{#unless key}}…{{/unless}}`
//!   branch on truthiness;
//! - `{{#ifEq key literal}}…{{/ifEq}}` compares the value with a literal.
//!
//! An unclosed `{{` is emitted literally and a stray closing tag is dropped.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Entry {
    text: String,
    truthy: bool,
}

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, Entry>,
}

impl TemplateContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a text value; it is truthy when non-empty.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let text = value.into();
        let truthy = !text.is_empty();
        self.values.insert(key.to_string(), Entry { text, truthy });
        self
    }

    /// Set a flag, rendered as `1` or nothing.
    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        let text = if value { "1" } else { "" }.to_string();
        self.values.insert(key.to_string(), Entry { text, truthy: value });
        self
    }

    /// Text for `key`, empty when missing.
    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(|e| e.text.as_str()).unwrap_or("")
    }

    /// Truthiness of `key`, false when missing.
    pub fn truthy(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|e| e.truthy)
    }
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut pos = 0;
    render_block(template, ctx, &mut pos, None).body
}

struct Block {
    body: String,
    alternate: String,
}

/// Render from `pos` until the closing tag named `closing` (or the end of
/// input), leaving `pos` just after the closing tag. `{{else}}` switches
/// output into `alternate` for the current block.
fn render_block(src: &str, ctx: &TemplateContext, pos: &mut usize, closing: Option<&str>) -> Block {
    let mut block = Block {
        body: String::new(),
        alternate: String::new(),
    };
    let mut in_else = false;

    while *pos < src.len() {
        let rest = &src[*pos..];
        let Some(open) = rest.find("{{") else {
            push(&mut block, in_else, rest);
            *pos = src.len();
            break;
        };
        push(&mut block, in_else, &rest[..open]);
        let tag_start = *pos + open + 2;
        let Some(close) = src[tag_start..].find("}}") else {
            push(&mut block, in_else, &src[*pos + open..]);
            *pos = src.len();
            break;
        };
        let tag = src[tag_start..tag_start + close].trim();
        *pos = tag_start + close + 2;

        if let Some(name) = tag.strip_prefix('/') {
            if closing == Some(name.trim()) {
                return block;
            }
            continue;
        }
        if tag == "else" {
            if closing.is_some() {
                in_else = true;
            }
            continue;
        }
        if let Some(section) = tag.strip_prefix('#') {
            let mut words = section.split_whitespace();
            let kind = words.next().unwrap_or("");
            let key = words.next().unwrap_or("");
            let literal = words.collect::<Vec<_>>().join(" ");
            let inner = render_block(src, ctx, pos, Some(kind));
            let chosen = match kind {
                "if" => ctx.truthy(key),
                "unless" => !ctx.truthy(key),
                "ifEq" => ctx.value(key) == literal,
                _ => false,
            };
            let text = if chosen { inner.body } else { inner.alternate };
            push(&mut block, in_else, &text);
            continue;
        }
        push(&mut block, in_else, ctx.value(tag));
    }
    block
}

fn push(block: &mut Block, in_else: bool, text: &str) {
    if in_else {
        block.alternate.push_str(text);
    } else {
        block.body.push_str(text);
    }
}
