use tagkit_attrs::Value;

pub mod ast;
pub mod environment;
pub mod error;
pub mod filters;
pub mod tag;
pub mod tag_evaluator;
pub mod tag_parser;
pub mod template;

// Re-export the types that users need
pub use ast::{TagAttr, TagToken, TagValue, TagValueFilter, ValueKind};
pub use environment::{Environment, EnvironmentConfig};
pub use error::{TagError, TemplateError};
pub use filters::Filter;
pub use tag::{render_element, Body, HostParser, Invocation, RenderContext, Tag, TagDefinition};
pub use template::{Node, Template, TemplateParser};

/// Render `source` once with a default [`Environment`] holding the given tags
pub fn render_with_tags<I, T>(tags: I, source: &str, locals: &Value) -> Result<String, TemplateError>
where
    I: IntoIterator<Item = T>,
    T: Tag + 'static,
{
    let mut env = Environment::new();
    for tag in tags {
        env.add_tag(tag);
    }
    env.render_str(source, locals)
}
