//! # Custom tag protocol
//!
//! A custom tag goes through three phases, all driven by the host engine:
//!
//! 1. **Parse** - [`TagDefinition::parse`] consumes the invocation from the host's
//!    token stream and returns an opaque [`Invocation`]. Attribute expressions
//!    and the body are parsed by the host; the tag only decides the shape
//!    (`{% name ... %}` alone, or `{% name ... %}...{% endname %}`).
//! 2. **Invoke** - per render, the host evaluates the arguments and calls
//!    [`Tag::invoke`] with a [`RenderContext`], the values and a lazy [`Body`].
//! 3. **Render** - [`Tag::render`] produces markup. The default emits
//!    `<element attrs>body</element>`; tags override it to change the output
//!    and can still call [`render_element`] for the attribute and body handling.
//!
//! Nothing is stored between invocations.
//!
//! ## Example
//!
//! ```rust
//! use tagkit_attrs::{HtmlEscaper, Value};
//! use tagkit_template::tag::{Body, RenderContext, Tag, TagDefinition};
//!
//! let tag = TagDefinition::new("t", true).unwrap();
//! let ctx = RenderContext::without_locals(&HtmlEscaper);
//! let args = vec![
//!     Value::from("checked"),
//!     Value::map([("class", vec!["x"])]),
//! ];
//! let html = tag.invoke(&ctx, &args, Body::from("hi")).unwrap();
//! assert_eq!(html.as_str(), r#"<t checked class="x">hi</t>"#);
//! ```

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use tagkit_attrs::{attrs_from_values, serialize_attributes, AttrItem, Escaper, SafeString, Value};

use crate::error::TagError;

lazy_static! {
    // Emitted verbatim as `<name ...>`, so nothing that could break out of the tag
    static ref ELEMENT_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap();
}

fn check_element_name(what: &str, name: &str) -> Result<(), TagError> {
    if name.is_empty() {
        return Err(TagError::InvalidArgument(format!("{} must not be empty", what)));
    }
    if !ELEMENT_NAME_RE.is_match(name) {
        return Err(TagError::InvalidArgument(format!(
            "{} '{}' is not a valid element name",
            what, name
        )));
    }
    Ok(())
}

/// Name and shape of a custom tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDefinition {
    name: String,
    output_element: String,
    is_block: bool,
}

impl TagDefinition {
    pub fn new(name: impl Into<String>, is_block: bool) -> Result<Self, TagError> {
        let name = name.into();
        check_element_name("tag name", &name)?;
        Ok(Self {
            output_element: name.clone(),
            name,
            is_block,
        })
    }

    /// A tag that expects a body and a matching `end<name>` marker
    pub fn block(name: impl Into<String>) -> Result<Self, TagError> {
        Self::new(name, true)
    }

    /// Emit `element` instead of the registration name
    pub fn with_output_element(mut self, element: impl Into<String>) -> Result<Self, TagError> {
        let element = element.into();
        check_element_name("output element", &element)?;
        self.output_element = element;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_element(&self) -> &str {
        &self.output_element
    }

    pub fn is_block(&self) -> bool {
        self.is_block
    }

    /// Parse one invocation of this tag out of the host's token stream.
    ///
    /// Errors come from the host parser and are returned unchanged.
    pub fn parse<P: HostParser>(
        &self,
        parser: &mut P,
    ) -> Result<Invocation<P::Args, P::Body>, P::Error> {
        let name = parser.next_token()?;
        let args = parser.parse_signature()?;
        parser.advance_after_block_end(Some(&name))?;

        let body = if self.is_block {
            let end = format!("end{}", name);
            let body = parser.parse_until_blocks(&end)?;
            parser.advance_after_block_end(None)?;
            Some(body)
        } else {
            None
        };

        log::debug!(
            "Parsed invocation of '{}' ({})",
            name,
            if body.is_some() { "block" } else { "inline" }
        );

        Ok(Invocation { name, args, body })
    }
}

/// Token stream and expression parser of the host engine
pub trait HostParser {
    /// Parsed, not yet evaluated, argument list
    type Args;
    /// Parsed body of a block tag
    type Body;
    type Error;

    /// Consume the token naming the invoked tag and return its text
    fn next_token(&mut self) -> Result<String, Self::Error>;

    /// Parse the attribute expressions up to the end of the current block
    fn parse_signature(&mut self) -> Result<Self::Args, Self::Error>;

    /// Move past the end of the current block. `name` is the tag being opened,
    /// `None` when closing.
    fn advance_after_block_end(&mut self, name: Option<&str>) -> Result<(), Self::Error>;

    /// Parse everything up to, not including, the block named `end`
    fn parse_until_blocks(&mut self, end: &str) -> Result<Self::Body, Self::Error>;
}

/// Parse-time result for one tag invocation, evaluated by the host on each render
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<A, B> {
    /// Tag name as written in the template
    pub name: String,
    pub args: A,
    /// `None` for inline tags
    pub body: Option<B>,
}

/// Per-invocation environment.
///
/// Borrowed for the duration of one render call.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    escaper: &'a dyn Escaper,
    locals: &'a Value,
}

impl<'a> RenderContext<'a> {
    pub fn new(escaper: &'a dyn Escaper, locals: &'a Value) -> Self {
        Self { escaper, locals }
    }

    pub fn without_locals(escaper: &'a dyn Escaper) -> Self {
        static NO_LOCALS: Value = Value::Null;
        Self::new(escaper, &NO_LOCALS)
    }

    pub fn escaper(&self) -> &'a dyn Escaper {
        self.escaper
    }

    /// Template variables of the current render
    pub fn locals(&self) -> &'a Value {
        self.locals
    }

    pub fn with_escaper<'b>(&self, escaper: &'b dyn Escaper) -> RenderContext<'b>
    where
        'a: 'b,
    {
        RenderContext {
            escaper,
            locals: self.locals,
        }
    }
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("locals", self.locals)
            .finish_non_exhaustive()
    }
}

/// Content between the opening and closing markers of a block tag
pub enum Body<'a> {
    Empty,
    Text(String),
    /// Rendered only when the tag asks for it
    Lazy(Box<dyn FnOnce() -> Result<String, TagError> + 'a>),
}

impl<'a> Body<'a> {
    pub fn lazy(render: impl FnOnce() -> Result<String, TagError> + 'a) -> Self {
        Body::Lazy(Box::new(render))
    }

    pub fn resolve(self) -> Result<String, TagError> {
        match self {
            Body::Empty => Ok(String::new()),
            Body::Text(text) => Ok(text),
            Body::Lazy(render) => render(),
        }
    }
}

impl From<&str> for Body<'_> {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body<'_> {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl<T: Into<String>> From<Option<T>> for Body<'_> {
    fn from(text: Option<T>) -> Self {
        text.map_or(Body::Empty, |text| Body::Text(text.into()))
    }
}

impl fmt::Debug for Body<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// A custom tag.
///
/// Implementors provide a [`TagDefinition`] and usually override [`Tag::render`].
/// [`Tag::invoke`] is the entry point for the host and is not meant to be overridden.
pub trait Tag: Send + Sync {
    fn definition(&self) -> &TagDefinition;

    /// Escaper to use instead of the one from the render context
    fn escaper(&self) -> Option<&dyn Escaper> {
        None
    }

    fn render(
        &self,
        ctx: &RenderContext<'_>,
        attrs: &[AttrItem],
        body: Body<'_>,
    ) -> Result<String, TagError> {
        render_element(self.definition().output_element(), ctx, attrs, body)
    }

    /// Render one invocation with evaluated `args` and return markup marked as safe
    fn invoke(
        &self,
        ctx: &RenderContext<'_>,
        args: &[Value],
        body: Body<'_>,
    ) -> Result<SafeString, TagError> {
        let escaper = match self.escaper() {
            Some(escaper) => {
                log::trace!("Tag '{}' uses its own escaper", self.definition().name());
                escaper
            }
            None => ctx.escaper(),
        };
        let ctx = ctx.with_escaper(escaper);

        let attrs = attrs_from_values(args)?;
        let html = self.render(&ctx, &attrs, body)?;
        Ok(escaper.mark_safe(html))
    }
}

impl Tag for TagDefinition {
    fn definition(&self) -> &TagDefinition {
        self
    }
}

/// `<element attrs>body</element>`, with no space before `>` when there are no attributes
pub fn render_element(
    element: &str,
    ctx: &RenderContext<'_>,
    attrs: &[AttrItem],
    body: Body<'_>,
) -> Result<String, TagError> {
    let fragment = body.resolve()?;
    let attr_str = serialize_attributes(attrs, ctx.escaper());
    if attr_str.is_empty() {
        Ok(format!("<{0}>{1}</{0}>", element, fragment))
    } else {
        Ok(format!("<{0} {1}>{2}</{0}>", element, attr_str, fragment))
    }
}
