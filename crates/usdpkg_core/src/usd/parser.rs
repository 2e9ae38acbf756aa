//! USDA (ASCII) file parser.
//!
//! The layer text is tokenized once and then parsed recursively into
//! [`UsdPrim`] trees. Every prim type is accepted; interpretation of the
//! schema happens later in the translators.
//!
//! # Supported Syntax
//!
//! - Layer metadata: `upAxis`, `metersPerUnit`, `defaultPrim`, doc strings
//! - `def|over|class [Type] "Name" (metadata) { ... }`
//! - Attributes: `[uniform|custom] type[] name[.connect] = value (metadata)`
//! - Relationships: `[custom] rel name = </Path>` or `[</A>, </B>]`
//! - Values: numbers, strings, tokens, asset paths, tuples, arrays,
//!   dictionaries and time samples
//!
//! Variant sets are skipped; composition arcs are kept as prim metadata
//! but not resolved.

use std::collections::HashSet;

use thiserror::Error;

use super::types::*;
use usdpkg_math::UpAxis;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),

    #[error("Duplicate prim path: {0}")]
    DuplicatePath(String),

    #[error("Layer is a binary crate file, not USDA text")]
    BinaryCrate,

    #[error("Layer is not UTF-8 text: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    Path(String),
    Asset(String),
    Punct(char),
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    line: usize,
}

/// Split USDA text into tokens, dropping comments.
fn tokenize(content: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    let read_until = |start: usize, terminator: &str, line: &mut usize| -> ParseResult<(String, usize)> {
        let term: Vec<char> = terminator.chars().collect();
        let mut j = start;
        let mut out = String::new();
        while j < chars.len() {
            if chars[j..].starts_with(&term) {
                return Ok((out, j + term.len()));
            }
            if chars[j] == '\\' && j + 1 < chars.len() {
                let escaped = chars[j + 1];
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                j += 2;
                continue;
            }
            if chars[j] == '\n' {
                *line += 1;
            }
            out.push(chars[j]);
            j += 1;
        }
        Err(ParseError::UnexpectedEof)
    };

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;

        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let triple: String = std::iter::repeat(c).take(3).collect();
                let triple_chars: Vec<char> = triple.chars().collect();
                let (terminator, skip) = if chars[i..].starts_with(&triple_chars) {
                    (triple, 3)
                } else {
                    (c.to_string(), 1)
                };
                let (text, next) = read_until(i + skip, &terminator, &mut line)?;
                tokens.push(Token { kind: TokenKind::Str(text), line: start_line });
                i = next;
            }
            '<' => {
                let (text, next) = read_until(i + 1, ">", &mut line)?;
                tokens.push(Token { kind: TokenKind::Path(text), line: start_line });
                i = next;
            }
            '@' => {
                let (terminator, skip) = if chars[i..].starts_with(&['@', '@', '@']) {
                    ("@@@", 3)
                } else {
                    ("@", 1)
                };
                let (text, next) = read_until(i + skip, terminator, &mut line)?;
                tokens.push(Token { kind: TokenKind::Asset(text), line: start_line });
                i = next;
            }
            '(' | ')' | '[' | ']' | '{' | '}' | '=' | ',' | ';' | ':' => {
                tokens.push(Token { kind: TokenKind::Punct(c), line: start_line });
                i += 1;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+' || c == '.')
                    && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit() || *n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let n = chars[i];
                    let exponent_sign = (n == '-' || n == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if n.is_ascii_digit() || n == '.' || n == 'e' || n == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token { kind: TokenKind::Number(text), line: start_line });
            }
            c if c.is_alphabetic() || c == '_' || (c == '-' && chars.get(i + 1).map_or(false, |n| n.is_alphabetic())) => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let n = chars[i];
                    // Namespaced names: xformOp:translate, inputs:diffuseColor.connect
                    let joins_namespace = (n == ':' || n == '.')
                        && chars.get(i + 1).map_or(false, |m| m.is_alphabetic() || *m == '_');
                    if n.is_alphanumeric() || n == '_' || joins_namespace {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token { kind: TokenKind::Ident(text), line: start_line });
            }
            other => {
                return Err(ParseError::Parse {
                    line,
                    message: format!("Unexpected character '{}'", other),
                });
            }
        }
    }

    Ok(tokens)
}

/// USDA file parser.
pub struct UsdaParser {
    tokens: Vec<Token>,
    pos: usize,
    current_line: usize,
    seen_paths: HashSet<String>,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> ParseResult<Self> {
        if content.starts_with("PXR-USDC") {
            return Err(ParseError::BinaryCrate);
        }

        Ok(Self {
            tokens: tokenize(content)?,
            pos: 0,
            current_line: 1,
            seen_paths: HashSet::new(),
        })
    }

    /// Parse the USDA content into a stage named `name`.
    pub fn parse(&mut self, name: &str) -> ParseResult<UsdStage> {
        let mut stage = UsdStage::new(name);

        // Layer metadata block
        if self.peek_punct('(') {
            self.pos += 1;
            let entries = self.parse_metadata_entries()?;
            Self::apply_layer_metadata(&mut stage, entries)?;
        }

        // Parse root prims
        while self.peek().is_some() {
            if let Some(prim) = self.parse_prim("")? {
                stage.roots.push(prim);
            }
        }

        Ok(stage)
    }

    fn apply_layer_metadata(stage: &mut UsdStage, entries: Vec<(String, UsdValue)>) -> ParseResult<()> {
        for (key, value) in entries {
            match key.as_str() {
                "upAxis" => {
                    let token = value.as_str().unwrap_or_default();
                    match UpAxis::from_token(token) {
                        Some(axis) => stage.up_axis = axis,
                        None => log::warn!("Unsupported upAxis {:?}, assuming Y", token),
                    }
                }
                "metersPerUnit" => {
                    stage.meters_per_unit = value
                        .as_f64()
                        .ok_or_else(|| ParseError::InvalidNumber(format!("{:?}", value)))?;
                }
                "defaultPrim" => stage.default_prim = value.as_str().map(str::to_string),
                "doc" => stage.doc = value.as_str().map(str::to_string),
                _ => stage.metadata.push((key, value)),
            }
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punct(p), .. }) if *p == c)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token { kind: TokenKind::Ident(s), .. }) => Some(s.as_str()),
            _ => None,
        }
    }

    fn next(&mut self) -> ParseResult<Token> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        self.current_line = token.line;
        Ok(token)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Parse {
            line: self.current_line,
            message: message.into(),
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Punct(p) if p == c => Ok(()),
            other => Err(self.error(format!("Expected '{}', found {:?}", c, other))),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(s) => Ok(s),
            other => Err(self.error(format!("Expected identifier, found {:?}", other))),
        }
    }

    /// Parse a single prim and its children.
    ///
    /// Returns `None` for statements that are consumed but produce no prim.
    fn parse_prim(&mut self, parent_path: &str) -> ParseResult<Option<UsdPrim>> {
        let start = self.next()?;
        let start_line = start.line;

        let keyword = match &start.kind {
            TokenKind::Ident(s) => s.clone(),
            other => return Err(self.error(format!("Expected prim definition, found {:?}", other))),
        };

        let Some(specifier) = Specifier::from_keyword(&keyword) else {
            return Err(self.error(format!("Expected def/over/class, found '{}'", keyword)));
        };

        // Optional type name, then quoted prim name
        let type_name = match self.peek_ident() {
            Some(_) => self.expect_ident()?,
            None => String::new(),
        };
        let name = match self.next()?.kind {
            TokenKind::Str(s) => s,
            other => return Err(self.error(format!("Expected prim name, found {:?}", other))),
        };

        let mut prim = UsdPrim::new(parent_path, name, type_name);
        prim.specifier = specifier;

        if !self.seen_paths.insert(prim.path.clone()) {
            return Err(ParseError::DuplicatePath(prim.path));
        }

        if self.peek_punct('(') {
            self.pos += 1;
            prim.metadata = self.parse_metadata_entries()?;
        }

        self.expect_punct('{')?;
        self.parse_prim_body(&mut prim, start_line)?;

        log::debug!("Parsed {} {} ({})", prim.specifier.as_str(), prim.path, prim.type_name);
        Ok(Some(prim))
    }

    /// Parse prim content (properties and children) up to the closing brace.
    fn parse_prim_body(&mut self, prim: &mut UsdPrim, start_line: usize) -> ParseResult<()> {
        loop {
            let Some(token) = self.peek().cloned() else {
                return Err(ParseError::UnclosedBlock(start_line));
            };

            match &token.kind {
                TokenKind::Punct('}') => {
                    self.pos += 1;
                    return Ok(());
                }
                TokenKind::Punct(';') => {
                    self.pos += 1;
                }
                TokenKind::Ident(word) if Specifier::from_keyword(word).is_some() && self.starts_child_prim() => {
                    let path = prim.path.clone();
                    if let Some(child) = self.parse_prim(&path)? {
                        prim.children.push(child);
                    }
                }
                TokenKind::Ident(word) if word == "variantSet" => {
                    self.skip_variant_set()?;
                }
                TokenKind::Ident(_) => self.parse_property(prim)?,
                other => {
                    let message = format!("Unexpected token {:?} in prim body", other);
                    return Err(self.error(message));
                }
            }
        }
    }

    /// `def`/`over`/`class` followed by a type name or a prim name.
    fn starts_child_prim(&self) -> bool {
        match self.peek_at(1).map(|t| &t.kind) {
            Some(TokenKind::Str(_)) => true,
            Some(TokenKind::Ident(_)) => matches!(self.peek_at(2).map(|t| &t.kind), Some(TokenKind::Str(_))),
            _ => false,
        }
    }

    /// `variantSet "name" = { "a" { ... } ... }`
    fn skip_variant_set(&mut self) -> ParseResult<()> {
        let start_line = self.next()?.line;
        log::warn!("Skipping variantSet at line {}", start_line);
        while !self.peek_punct('{') {
            self.next()?;
        }
        self.skip_block(start_line)
    }

    /// Skip a brace block (consume until matching closing brace).
    fn skip_block(&mut self, start_line: usize) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            let token = self.next().map_err(|_| ParseError::UnclosedBlock(start_line))?;
            match token.kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Parse an attribute or relationship declaration.
    fn parse_property(&mut self, prim: &mut UsdPrim) -> ParseResult<()> {
        let mut uniform = false;
        let mut custom = false;
        let mut list_op: Option<String> = None;

        loop {
            match self.peek_ident() {
                Some("uniform") => uniform = true,
                Some("custom") => custom = true,
                Some("varying") | Some("config") => {}
                Some(op @ ("prepend" | "append" | "add" | "delete" | "reorder")) => {
                    list_op = Some(op.to_string())
                }
                _ => break,
            }
            self.pos += 1;
        }

        let first = self.expect_ident()?;

        if first == "rel" {
            let name = self.expect_ident()?;
            let mut targets = Vec::new();
            if self.peek_punct('=') {
                self.pos += 1;
                targets = Self::collect_paths(&self.parse_value()?);
            }
            if self.peek_punct('(') {
                self.pos += 1;
                self.parse_metadata_entries()?;
            }
            if list_op.as_deref() == Some("delete") {
                return Ok(());
            }
            match prim.relationships.iter_mut().find(|r| r.name == name) {
                Some(existing) => existing.targets.extend(targets),
                None => prim.relationships.push(UsdRelationship { name, targets, custom }),
            }
            return Ok(());
        }

        // Prim-level statement such as `reorder nameChildren = [...]`
        if self.peek_punct('=') {
            self.pos += 1;
            let value = self.parse_value()?;
            log::debug!("{}: ignoring statement {} = {:?}", prim.path, first, value);
            return Ok(());
        }

        let mut type_name = first;
        if self.peek_punct('[') {
            self.expect_punct('[')?;
            self.expect_punct(']')?;
            type_name.push_str("[]");
        }

        let name = self.expect_ident()?;
        let mut value = None;
        if self.peek_punct('=') {
            self.pos += 1;
            value = Some(self.parse_value()?);
        }

        let mut metadata = Vec::new();
        if self.peek_punct('(') {
            self.pos += 1;
            metadata = self.parse_metadata_entries()?;
        }

        let attribute = UsdAttribute {
            name,
            type_name,
            value,
            uniform,
            custom,
            metadata,
        };

        // A later opinion for the same property (e.g. `.timeSamples` after a default) keeps both names distinct
        prim.set_attribute(attribute);
        Ok(())
    }

    fn collect_paths(value: &UsdValue) -> Vec<String> {
        match value {
            UsdValue::Path(p) => vec![p.clone()],
            UsdValue::Array(items) => items.iter().flat_map(Self::collect_paths).collect(),
            _ => Vec::new(),
        }
    }

    /// Parse `key = value` entries up to the closing parenthesis.
    ///
    /// A bare string entry is the `doc` metadata.
    fn parse_metadata_entries(&mut self) -> ParseResult<Vec<(String, UsdValue)>> {
        let start_line = self.current_line;
        let mut entries = Vec::new();

        loop {
            let token = self.next().map_err(|_| ParseError::UnclosedBlock(start_line))?;
            match token.kind {
                TokenKind::Punct(')') => return Ok(entries),
                TokenKind::Punct(';') | TokenKind::Punct(',') => {}
                TokenKind::Str(doc) => entries.push(("doc".to_string(), UsdValue::String(doc))),
                TokenKind::Ident(mut key) => {
                    if matches!(key.as_str(), "prepend" | "append" | "add" | "delete" | "reorder") {
                        let inner = self.expect_ident()?;
                        key = format!("{} {}", key, inner);
                    }
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
                other => return Err(self.error(format!("Unexpected token {:?} in metadata", other))),
            }
        }
    }

    /// Parse one value.
    fn parse_value(&mut self) -> ParseResult<UsdValue> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Number(text) => Self::parse_number(&text),
            TokenKind::Str(s) => Ok(UsdValue::String(s)),
            TokenKind::Path(p) => Ok(UsdValue::Path(p)),
            TokenKind::Asset(a) => {
                // Reference arcs may carry a target prim: @file.usda@</Prim>
                if let Some(Token { kind: TokenKind::Path(_), .. }) = self.peek() {
                    let target = self.next()?;
                    if let TokenKind::Path(p) = target.kind {
                        return Ok(UsdValue::Tuple(vec![UsdValue::Asset(a), UsdValue::Path(p)]));
                    }
                }
                Ok(UsdValue::Asset(a))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(UsdValue::Bool(true)),
                "false" => Ok(UsdValue::Bool(false)),
                "None" => Ok(UsdValue::Blocked),
                "inf" => Ok(UsdValue::Float(f64::INFINITY)),
                "-inf" => Ok(UsdValue::Float(f64::NEG_INFINITY)),
                "nan" => Ok(UsdValue::Float(f64::NAN)),
                // Unquoted tokens appear in some dictionaries
                _ => Ok(UsdValue::String(word)),
            },
            TokenKind::Punct('(') => Ok(UsdValue::Tuple(self.parse_sequence(')')?)),
            TokenKind::Punct('[') => Ok(UsdValue::Array(self.parse_sequence(']')?)),
            TokenKind::Punct('{') => self.parse_dictionary(token.line),
            other => Err(self.error(format!("Expected value, found {:?}", other))),
        }
    }

    fn parse_number(text: &str) -> ParseResult<UsdValue> {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(UsdValue::Int(i));
        }
        text.parse::<f64>()
            .map(UsdValue::Float)
            .map_err(|_| ParseError::InvalidNumber(text.to_string()))
    }

    /// Comma-separated values up to `close`; trailing commas allowed.
    fn parse_sequence(&mut self, close: char) -> ParseResult<Vec<UsdValue>> {
        let mut items = Vec::new();
        loop {
            if self.peek_punct(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_value()?);
            if self.peek_punct(',') {
                self.pos += 1;
            } else {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    /// `{ type key = value ... }` dictionaries and `{ time: value, ... }` samples.
    fn parse_dictionary(&mut self, start_line: usize) -> ParseResult<UsdValue> {
        let mut entries = Vec::new();
        loop {
            let token = self.next().map_err(|_| ParseError::UnclosedBlock(start_line))?;
            match token.kind {
                TokenKind::Punct('}') => return Ok(UsdValue::Dictionary(entries)),
                TokenKind::Punct(',') | TokenKind::Punct(';') => {}
                TokenKind::Number(time) => {
                    self.expect_punct(':')?;
                    let value = self.parse_value()?;
                    entries.push((time, value));
                }
                TokenKind::Ident(first) | TokenKind::Str(first) => {
                    // Type name (with optional []) then key, or key alone
                    let mut key = first;
                    if self.peek_punct('[') {
                        self.expect_punct('[')?;
                        self.expect_punct(']')?;
                    }
                    if !self.peek_punct('=') {
                        key = match self.next()?.kind {
                            TokenKind::Ident(s) | TokenKind::Str(s) => s,
                            other => return Err(self.error(format!("Expected dictionary key, found {:?}", other))),
                        };
                    }
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
                other => return Err(self.error(format!("Unexpected token {:?} in dictionary", other))),
            }
        }
    }
}

/// Parse a USDA string into a stage named `name`.
pub fn parse_usda(content: &str, name: &str) -> ParseResult<UsdStage> {
    let mut parser = UsdaParser::new(content)?;
    parser.parse(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usdpkg_math::DVec3;

    #[test]
    fn test_parse_simple_mesh() {
        let usda = r#"
def Mesh "Cube" {
    point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
    int[] faceVertexCounts = [4]
    int[] faceVertexIndices = [0, 1, 2, 3]
}
"#;

        let stage = parse_usda(usda, "test").unwrap();
        assert_eq!(stage.roots.len(), 1);

        let mesh = UsdMesh::from_prim(&stage.roots[0]);
        assert_eq!(mesh.name, "Cube");
        assert_eq!(mesh.points.len(), 4);
        assert_eq!(mesh.face_vertex_counts, vec![4]);
        assert_eq!(mesh.face_vertex_indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_xform_with_ops() {
        let usda = r#"
def Xform "Model" {
    double3 xformOp:translate = (1, 2, 3)
    double3 xformOp:scale = (2, 2, 2)
    uniform token[] xformOpOrder = ["xformOp:translate", "xformOp:scale"]
}
"#;

        let stage = parse_usda(usda, "test").unwrap();
        let xform = &stage.roots[0];
        assert_eq!(xform.name, "Model");
        assert_eq!(xform.type_name, "Xform");
        assert!(xform.attribute("xformOpOrder").unwrap().uniform);

        let translated = xform.local_transform().transform_point3(DVec3::ZERO);
        assert!((translated - DVec3::new(1.0, 2.0, 3.0)).length() < 0.001);
    }

    #[test]
    fn test_parse_layer_metadata() {
        let usda = r#"#usda 1.0
(
    "Exported scene"
    defaultPrim = "World"
    metersPerUnit = 0.01
    upAxis = "Z"
    customLayerData = {
        string creator = "tests"
    }
)

def Xform "World"
{
}
"#;

        let stage = parse_usda(usda, "scene").unwrap();
        assert_eq!(stage.up_axis, UpAxis::Z);
        assert!((stage.meters_per_unit - 0.01).abs() < 1e-12);
        assert_eq!(stage.default_prim.as_deref(), Some("World"));
        assert_eq!(stage.doc.as_deref(), Some("Exported scene"));
        assert_eq!(stage.metadata.len(), 1);
    }

    #[test]
    fn test_parse_nested_hierarchy_and_relationships() {
        let usda = r#"
def Xform "World" (
    kind = "assembly"
)
{
    def Mesh "Body" (
        prepend apiSchemas = ["MaterialBindingAPI"]
    )
    {
        rel material:binding = </World/Looks/Red>
        normal3f[] normals = [(0, 0, 1), (0, 0, 1), (0, 0, 1)] (
            interpolation = "vertex"
        )
    }

    def Scope "Looks"
    {
        def Material "Red"
        {
            token outputs:surface.connect = </World/Looks/Red/Surface.outputs:surface>
        }
    }
}
"#;

        let stage = parse_usda(usda, "test").unwrap();
        let body = stage.prim_at("/World/Body").unwrap();
        assert_eq!(
            body.relationship("material:binding").unwrap().targets,
            vec!["/World/Looks/Red".to_string()]
        );
        assert_eq!(
            body.attribute("normals").unwrap().metadata("interpolation"),
            Some(&UsdValue::String("vertex".into()))
        );

        let red = stage.prim_at("/World/Looks/Red").unwrap();
        assert_eq!(
            red.value("outputs:surface.connect"),
            Some(&UsdValue::Path("/World/Looks/Red/Surface.outputs:surface".into()))
        );
        assert_eq!(stage.prim_count(), 4);
    }

    #[test]
    fn test_parse_single_line_prim() {
        let usda = r#"def Xform "A" { double3 xformOp:translate = (0, 0, 5) }"#;
        let stage = parse_usda(usda, "test").unwrap();
        let p = stage.roots[0].local_transform().transform_point3(DVec3::ZERO);
        assert!((p.z - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_references_and_time_samples() {
        let usda = r#"
def Xform "Lucy" (
    references = @./lucy.usda@</Lucy>
)
{
    double3 xformOp:translate.timeSamples = {
        0: (0, 0, 0),
        24: (0, 0, 10),
    }
}
"#;

        let stage = parse_usda(usda, "test").unwrap();
        let lucy = &stage.roots[0];
        assert_eq!(
            lucy.metadata("references"),
            Some(&UsdValue::Tuple(vec![
                UsdValue::Asset("./lucy.usda".into()),
                UsdValue::Path("/Lucy".into())
            ]))
        );
        match lucy.value("xformOp:translate.timeSamples") {
            Some(UsdValue::Dictionary(samples)) => assert_eq!(samples.len(), 2),
            other => panic!("Expected time samples, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let usda = r#"
def Xform "A" {}
def Xform "A" {}
"#;
        assert!(matches!(parse_usda(usda, "test"), Err(ParseError::DuplicatePath(p)) if p == "/A"));
    }

    #[test]
    fn test_unclosed_block() {
        let usda = "def Xform \"A\" {\n    double3 xformOp:translate = (1, 2, 3)\n";
        assert!(matches!(parse_usda(usda, "test"), Err(ParseError::UnclosedBlock(1))));
    }

    #[test]
    fn test_binary_crate_is_rejected() {
        assert!(matches!(parse_usda("PXR-USDC\0\0", "test"), Err(ParseError::BinaryCrate)));
    }

    #[test]
    fn test_scientific_and_negative_numbers() {
        let usda = r#"
def Xform "A" {
    double3 xformOp:translate = (-1.5e2, 2E-1, -.5)
}
"#;
        let stage = parse_usda(usda, "test").unwrap();
        let t = stage.roots[0].value("xformOp:translate").and_then(UsdValue::as_dvec3).unwrap();
        assert!((t - DVec3::new(-150.0, 0.2, -0.5)).length() < 1e-12);
    }
}
