//! # Templates
//!
//! A minimal host engine for custom tags. Source text is split into text,
//! `{{ expression }}` output and `{% tag ... %}` blocks. `{# comments #}` are
//! dropped. Every block must name a tag registered in the [`Environment`]; the
//! tag's [`TagDefinition::parse`](crate::tag::TagDefinition::parse) drives the
//! [`TemplateParser`] to consume its arguments and body.
//!
//! Rendering evaluates tag arguments against the locals of the render call and
//! hands the body to the tag as a [`Body::Lazy`] so that it is rendered only when
//! the tag asks for it.

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tagkit_attrs::Value;

use crate::ast::{TagAttr, TagValue};
use crate::environment::Environment;
use crate::error::{TagError, TemplateError};
use crate::tag::{Body, HostParser, Invocation, RenderContext, Tag};
use crate::tag_evaluator::{evaluate_attributes, evaluate_value, Scope};
use crate::tag_parser::{ParseError, TagParser};

lazy_static! {
    static ref OPEN_RE: Regex = Regex::new(r"\{\{|\{%|\{#").unwrap();
    static ref TAG_NAME_RE: Regex = Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    /// Inner text of `{{ ... }}` and its offset in the source
    Output(String, usize),
    /// Inner text of `{% ... %}` and its offset in the source
    Block(String, usize),
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;
    let mut pos = 0;

    while let Some(open) = OPEN_RE.find_at(source, pos) {
        let inner = open.end();
        let (close, end) = match open.as_str() {
            "{{" => ("}}", find_closer(source, inner, "}}")),
            "{%" => ("%}", find_closer(source, inner, "%}")),
            _ => ("#}", source[inner..].find("#}").map(|i| inner + i)),
        };
        // Unterminated, the rest is text
        let Some(end) = end else {
            break;
        };

        if open.start() > last {
            tokens.push(Token::Text(source[last..open.start()].to_string()));
        }
        match open.as_str() {
            "{{" => tokens.push(Token::Output(source[inner..end].to_string(), inner)),
            "{%" => tokens.push(Token::Block(source[inner..end].to_string(), inner)),
            _ => {}
        }
        pos = end + close.len();
        last = pos;
    }

    if last < source.len() {
        tokens.push(Token::Text(source[last..].to_string()));
    }
    tokens
}

/// Offset of `close` after `start`, ignoring occurrences inside quoted strings.
///
/// With an unterminated string the first `close` wins, so that the argument
/// parser reports the broken string.
fn find_closer(source: &str, start: usize, close: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut quote = None;
    let mut i = start;

    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(_) if byte == b'\\' => i += 1,
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if bytes[i..].starts_with(close.as_bytes()) => return Some(i),
            None => {}
        }
        i += 1;
    }

    source[start..].find(close).map(|i| start + i)
}

/// 1-based line and column of a byte offset
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Compiled template node
pub enum Node {
    Text(String),
    Output(TagValue),
    Call {
        tag: Arc<dyn Tag>,
        invocation: Invocation<Vec<TagAttr>, Vec<Node>>,
    },
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Output(value) => f.debug_tuple("Output").field(value).finish(),
            Node::Call { invocation, .. } => f
                .debug_struct("Call")
                .field("invocation", invocation)
                .finish_non_exhaustive(),
        }
    }
}

/// Splits the name of a block from its arguments
fn split_block(content: &str) -> Option<(&str, &str, usize)> {
    let captures = TAG_NAME_RE.captures(content)?;
    let name = captures.get(1)?;
    Some((name.as_str(), &content[name.end()..], name.end()))
}

/// Token stream of one template, driven by the custom tags it invokes
pub struct TemplateParser<'env, 'src> {
    env: &'env Environment,
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    /// Arguments of the block whose name was consumed by `next_token`
    pending_signature: Option<(String, usize)>,
}

impl<'env, 'src> TemplateParser<'env, 'src> {
    pub fn new(env: &'env Environment, source: &'src str) -> Self {
        Self {
            env,
            source,
            tokens: tokenize(source),
            pos: 0,
            pending_signature: None,
        }
    }

    pub fn parse_all(&mut self) -> Result<Vec<Node>, TemplateError> {
        self.parse_nodes(None)
    }

    fn parse_nodes(&mut self, until: Option<&str>) -> Result<Vec<Node>, TemplateError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    self.pos += 1;
                }
                Token::Output(expression, offset) => {
                    let value = TagParser::parse_expression(expression)
                        .map_err(|e| self.syntax_error(&e, *offset))?;
                    nodes.push(Node::Output(value));
                    self.pos += 1;
                }
                Token::Block(content, offset) => {
                    let offset = *offset;
                    let (line, column) = line_col(self.source, offset);
                    let name = match split_block(content) {
                        Some((name, _, _)) => name.to_string(),
                        None => {
                            return Err(TemplateError::Syntax {
                                line,
                                column,
                                message: "expected a tag name".to_string(),
                            })
                        }
                    };

                    if until == Some(name.as_str()) {
                        return Ok(nodes);
                    }

                    let Some(tag) = self.env.get_tag(&name).cloned() else {
                        if name.starts_with("end") {
                            return Err(TemplateError::UnexpectedEndTag { name, line, column });
                        }
                        return Err(TemplateError::UnknownTag { name, line, column });
                    };

                    let invocation = tag.definition().parse(self)?;
                    nodes.push(Node::Call { tag, invocation });
                }
            }
        }

        match until {
            Some(end) => Err(TemplateError::MissingEndTag(end.to_string())),
            None => Ok(nodes),
        }
    }

    fn syntax_error(&self, error: &ParseError, offset: usize) -> TemplateError {
        let (line, column) = line_col(self.source, offset + error.position().unwrap_or(0));
        TemplateError::Syntax {
            line,
            column,
            message: error.message(),
        }
    }
}

impl HostParser for TemplateParser<'_, '_> {
    type Args = Vec<TagAttr>;
    type Body = Vec<Node>;
    type Error = TemplateError;

    fn next_token(&mut self) -> Result<String, TemplateError> {
        let (name, rest, offset) = match self.tokens.get(self.pos) {
            Some(Token::Block(content, offset)) => match split_block(content) {
                Some((name, rest, name_end)) => {
                    (name.to_string(), rest.to_string(), offset + name_end)
                }
                None => return Err(self.unexpected("expected a tag name")),
            },
            _ => return Err(self.unexpected("expected a block")),
        };
        self.pending_signature = Some((rest, offset));
        Ok(name)
    }

    fn parse_signature(&mut self) -> Result<Vec<TagAttr>, TemplateError> {
        let Some((signature, offset)) = self.pending_signature.take() else {
            return Err(self.unexpected("expected tag arguments"));
        };
        TagParser::parse_signature(&signature).map_err(|e| self.syntax_error(&e, offset))
    }

    fn advance_after_block_end(&mut self, name: Option<&str>) -> Result<(), TemplateError> {
        match self.tokens.get(self.pos) {
            Some(Token::Block(..)) => {
                log::trace!("Leaving block {:?} at token {}", name, self.pos);
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected("expected end of block")),
        }
    }

    fn parse_until_blocks(&mut self, end: &str) -> Result<Vec<Node>, TemplateError> {
        self.parse_nodes(Some(end))
    }
}

impl TemplateParser<'_, '_> {
    fn unexpected(&self, message: &str) -> TemplateError {
        let offset = match self.tokens.get(self.pos) {
            Some(Token::Block(_, offset)) | Some(Token::Output(_, offset)) => *offset,
            _ => self.source.len(),
        };
        let (line, column) = line_col(self.source, offset);
        TemplateError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }
}

/// A compiled template, bound to the environment it was compiled with
pub struct Template<'env> {
    env: &'env Environment,
    nodes: Vec<Node>,
}

impl<'env> Template<'env> {
    pub(crate) fn compile(env: &'env Environment, source: &str) -> Result<Self, TemplateError> {
        let nodes = TemplateParser::new(env, source).parse_all()?;
        log::debug!("Compiled template into {} nodes", nodes.len());
        Ok(Self { env, nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn render(&self, locals: &Value) -> Result<String, TemplateError> {
        let escaper = self.env.escaper().ok_or_else(|| {
            TagError::Misconfigured("the environment has no escaper to render with".to_string())
        })?;
        let scope = Scope {
            env: self.env,
            locals,
            escaper,
        };
        render_nodes(&self.nodes, scope)
    }
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

fn render_nodes(nodes: &[Node], scope: Scope<'_>) -> Result<String, TemplateError> {
    let mut output = String::new();

    for node in nodes {
        match node {
            Node::Text(text) => output.push_str(text),
            Node::Output(expression) => match evaluate_value(expression, &scope)? {
                Value::Safe(html) => output.push_str(html.as_str()),
                value if scope.env.config().autoescape => {
                    output.push_str(&scope.escaper.escape(&value.to_string()))
                }
                value => output.push_str(&value.to_string()),
            },
            Node::Call { tag, invocation } => {
                let args = evaluate_attributes(&invocation.args, &scope)?;
                let body = match &invocation.body {
                    Some(children) => Body::lazy(move || {
                        render_nodes(children, scope).map_err(|e| TagError::Body(Box::new(e)))
                    }),
                    None => Body::Empty,
                };
                let ctx = RenderContext::new(scope.escaper, scope.locals);
                let html = tag.invoke(&ctx, &args, body).map_err(unwrap_body_error)?;
                output.push_str(html.as_str());
            }
        }
    }

    Ok(output)
}

// Errors from a nested body surface unchanged instead of wrapped per nesting level
fn unwrap_body_error(error: TagError) -> TemplateError {
    match error {
        TagError::Body(inner) => match inner.downcast::<TemplateError>() {
            Ok(template_error) => *template_error,
            Err(other) => TemplateError::Tag(TagError::Body(other)),
        },
        other => TemplateError::Tag(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagDefinition;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.add_tag(TagDefinition::block("custom").unwrap());
        env.add_tag(TagDefinition::new("br", false).unwrap());
        env
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("a{{ x }}b{% t y %}{# c #}d");
        assert_eq!(
            tokens,
            vec![
                Token::Text("a".to_string()),
                Token::Output(" x ".to_string(), 3),
                Token::Text("b".to_string()),
                Token::Block(" t y ".to_string(), 11),
                Token::Text("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_quoted_closers() {
        assert_eq!(
            tokenize(r#"{% t a="50%}" b='}}' %}x"#),
            vec![
                Token::Block(r#" t a="50%}" b='}}' "#.to_string(), 2),
                Token::Text("x".to_string()),
            ]
        );
        assert_eq!(
            tokenize(r#"{{ "a}}b" }}"#),
            vec![Token::Output(r#" "a}}b" "#.to_string(), 2)]
        );
        assert_eq!(
            tokenize(r#"{% t a="\"%}" %}"#),
            vec![Token::Block(r#" t a="\"%}" "#.to_string(), 2)]
        );
    }

    #[test]
    fn test_tokenize_unterminated() {
        // Broken string, the first closer ends the block
        assert_eq!(
            tokenize(r#"{% t a="x %}y"#),
            vec![
                Token::Block(r#" t a="x "#.to_string(), 2),
                Token::Text("y".to_string()),
            ]
        );
        assert_eq!(tokenize("a {{ b"), vec![Token::Text("a {{ b".to_string())]);
    }

    #[test]
    fn test_quoted_closer_in_arguments() {
        let html = env()
            .render_str(
                r#"{% custom a="50%}" b='}}' %}x{% endcustom %}"#,
                &Value::Null,
            )
            .unwrap();
        assert_eq!(html, r#"<custom a="50%}" b="}}">x</custom>"#);
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("abc", 0), (1, 1));
        assert_eq!(line_col("abc", 2), (1, 3));
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
    }

    #[test]
    fn test_split_block() {
        assert_eq!(split_block(" custom a=1 "), Some(("custom", " a=1 ", 7)));
        assert_eq!(split_block("  "), None);
    }

    #[test]
    fn test_compile_nodes() {
        let env = env();
        let template = env
            .compile("<p>{% custom a=1 %}x{{ y }}{% endcustom %}{% br %}</p>")
            .unwrap();
        let nodes = template.nodes();
        assert_eq!(nodes.len(), 4);
        assert!(matches!(&nodes[0], Node::Text(text) if text == "<p>"));
        match &nodes[1] {
            Node::Call { invocation, .. } => {
                assert_eq!(invocation.name, "custom");
                assert_eq!(invocation.args.len(), 1);
                assert_eq!(invocation.body.as_ref().map(Vec::len), Some(2));
            }
            other => panic!("Expected a call, got {:?}", other),
        }
        match &nodes[2] {
            Node::Call { invocation, .. } => {
                assert_eq!(invocation.name, "br");
                assert!(invocation.body.is_none());
            }
            other => panic!("Expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_output_is_escaped() {
        let env = env();
        let locals = Value::map([("x", "<b>")]);
        assert_eq!(env.render_str("{{ x }}", &locals).unwrap(), "&lt;b&gt;");
        assert_eq!(env.render_str("{{ x|safe }}", &locals).unwrap(), "<b>");
        assert_eq!(env.render_str("{{ missing }}", &locals).unwrap(), "");
    }

    #[test]
    fn test_output_without_autoescape() {
        let env = env().with_config(crate::environment::EnvironmentConfig {
            autoescape: false,
            ..Default::default()
        });
        let locals = Value::map([("x", "<b>")]);
        assert_eq!(env.render_str("{{ x }}", &locals).unwrap(), "<b>");
    }

    #[test]
    fn test_unknown_tag() {
        let env = env();
        let result = env.compile("ab\n {% nope %}");
        assert!(matches!(
            result,
            Err(TemplateError::UnknownTag { name, line: 2, column: 4 }) if name == "nope"
        ));
    }

    #[test]
    fn test_unexpected_end_tag() {
        let env = env();
        let result = env.compile("{% endcustom %}");
        assert!(matches!(
            result,
            Err(TemplateError::UnexpectedEndTag { name, .. }) if name == "endcustom"
        ));
    }

    #[test]
    fn test_missing_end_tag() {
        let env = env();
        let result = env.compile("{% custom %}text");
        assert!(matches!(
            result,
            Err(TemplateError::MissingEndTag(name)) if name == "endcustom"
        ));
    }

    #[test]
    fn test_signature_error_position() {
        let env = env();
        let result = env.compile("x\n{% custom a=1 <b %}{% endcustom %}");
        match result {
            Err(TemplateError::Syntax { line, column, .. }) => {
                assert_eq!((line, column), (2, 15));
            }
            other => panic!("Expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_body_error_is_unwrapped() {
        let mut env = env().with_config(crate::environment::EnvironmentConfig {
            throw_on_undefined: true,
            ..Default::default()
        });
        env.add_tag(TagDefinition::block("outer").unwrap());
        let result = env.render_str(
            "{% outer %}{% custom %}{{ missing }}{% endcustom %}{% endouter %}",
            &Value::Null,
        );
        assert!(matches!(
            result,
            Err(TemplateError::UndefinedVariable(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_misconfigured_environment() {
        let mut env = Environment::empty();
        env.add_tag(TagDefinition::block("custom").unwrap());
        let result = env.render_str("{% custom %}{% endcustom %}", &Value::Null);
        assert!(matches!(
            result,
            Err(TemplateError::Tag(TagError::Misconfigured(_)))
        ));
    }
}
