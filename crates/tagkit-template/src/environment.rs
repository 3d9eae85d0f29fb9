//! # Environment
//!
//! Registry of custom tags and filters, together with the escaper that every
//! render passes to the tags.
//!
//! ```rust
//! use tagkit_attrs::Value;
//! use tagkit_template::{Environment, TagDefinition};
//!
//! let mut env = Environment::new();
//! env.add_tag(TagDefinition::block("custom").unwrap());
//!
//! let locals = Value::map([("clz", "test")]);
//! let html = env
//!     .render_str(r#"{% custom class=["test1"] style=clz "checked" %}{% endcustom %}"#, &locals)
//!     .unwrap();
//! assert_eq!(html, r#"<custom checked class="test1" style="test"></custom>"#);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tagkit_attrs::{Escaper, HtmlEscaper, Value};

use crate::error::TemplateError;
use crate::filters::{builtin_filters, Filter};
use crate::tag::Tag;
use crate::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Escape `{{ expression }}` output that is not marked as safe
    pub autoescape: bool,
    /// Fail on undefined variables instead of rendering them as empty
    pub throw_on_undefined: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            autoescape: true,
            throw_on_undefined: false,
        }
    }
}

pub struct Environment {
    config: EnvironmentConfig,
    tags: HashMap<String, Arc<dyn Tag>>,
    filters: HashMap<String, Filter>,
    escaper: Option<Arc<dyn Escaper>>,
}

impl Environment {
    /// Environment with the HTML escaper and the built-in filters
    pub fn new() -> Self {
        let mut env = Self::empty();
        env.escaper = Some(Arc::new(HtmlEscaper));
        for (name, filter) in builtin_filters() {
            env.filters.insert(name.to_string(), filter);
        }
        env
    }

    /// Environment without an escaper, filters or tags.
    ///
    /// Rendering fails until an escaper is set with [`Environment::set_escaper`].
    pub fn empty() -> Self {
        Self {
            config: EnvironmentConfig::default(),
            tags: HashMap::new(),
            filters: HashMap::new(),
            escaper: None,
        }
    }

    pub fn with_config(mut self, config: EnvironmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn set_escaper(&mut self, escaper: impl Escaper + 'static) {
        self.escaper = Some(Arc::new(escaper));
    }

    pub fn escaper(&self) -> Option<&dyn Escaper> {
        self.escaper.as_deref()
    }

    /// Register a tag under its definition name. A tag registered earlier under
    /// the same name is replaced.
    pub fn add_tag(&mut self, tag: impl Tag + 'static) {
        let name = tag.definition().name().to_string();
        log::debug!("Registering tag '{}'", name);
        if self.tags.insert(name.clone(), Arc::new(tag)).is_some() {
            log::debug!("Tag '{}' replaced an earlier registration", name);
        }
    }

    pub fn get_tag(&self, name: &str) -> Option<&Arc<dyn Tag>> {
        self.tags.get(name)
    }

    pub fn add_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(Value, &[Value], &dyn Escaper) -> Result<Value, TemplateError> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    pub(crate) fn apply_filter(
        &self,
        name: &str,
        value: Value,
        args: &[Value],
        escaper: &dyn Escaper,
    ) -> Result<Value, TemplateError> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| TemplateError::UnknownFilter(name.to_string()))?;
        filter(value, args, escaper)
    }

    pub fn compile(&self, source: &str) -> Result<Template<'_>, TemplateError> {
        Template::compile(self, source)
    }

    pub fn render_str(&self, source: &str, locals: &Value) -> Result<String, TemplateError> {
        self.compile(source)?.render(locals)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags.keys().collect();
        tags.sort();
        let mut filters: Vec<_> = self.filters.keys().collect();
        filters.sort();
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("tags", &tags)
            .field("filters", &filters)
            .field("has_escaper", &self.escaper.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagDefinition;

    #[test]
    fn test_new_has_builtins() {
        let env = Environment::new();
        assert!(env.escaper().is_some());
        let result = env.apply_filter("upper", "a".into(), &[], &HtmlEscaper);
        assert_eq!(result.unwrap(), Value::from("A"));
    }

    #[test]
    fn test_empty_has_nothing() {
        let env = Environment::empty();
        assert!(env.escaper().is_none());
        let result = env.apply_filter("upper", "a".into(), &[], &HtmlEscaper);
        assert!(matches!(result, Err(TemplateError::UnknownFilter(_))));
    }

    #[test]
    fn test_add_tag_replaces() {
        let mut env = Environment::new();
        env.add_tag(TagDefinition::block("box").unwrap());
        env.add_tag(TagDefinition::new("box", false).unwrap());
        assert!(!env.get_tag("box").unwrap().definition().is_block());
        assert!(env.get_tag("other").is_none());
    }

    #[test]
    fn test_add_filter() {
        let mut env = Environment::new();
        env.add_filter("twice", |value, _args, _escaper| {
            Ok(Value::Str(format!("{0}{0}", value)))
        });
        let result = env.apply_filter("twice", "ab".into(), &[], &HtmlEscaper);
        assert_eq!(result.unwrap(), Value::from("abab"));
    }

    #[test]
    fn test_default_config() {
        let config = EnvironmentConfig::default();
        assert!(config.autoescape);
        assert!(!config.throw_on_undefined);
    }
}
