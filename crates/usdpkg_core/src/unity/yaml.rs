//! Unity YAML codec.
//!
//! Unity text assets are a `%YAML 1.1` stream with one document per object:
//!
//! ```text
//! %YAML 1.1
//! %TAG !u! tag:unity3d.com,2011:
//! --- !u!1 &1
//! GameObject:
//!   m_Name: Cube
//! ```
//!
//! The `!u!` tags and `&` anchors are not plain YAML, so documents are split
//! line by line and only each body goes through `serde_yaml`. Writing is done
//! by hand to match the layout Unity itself produces.

use std::borrow::Cow;
use std::fmt::{self, Write};

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use super::meta::Guid;
use super::object::{FileRef, UnityClass, UnityDocument, UnityObject, UnityValue};

/// Stream header of every Unity text asset.
pub const YAML_HEADER: &str = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n";

/// Keys whose values are hex blobs, written without quotes.
const HEX_KEYS: &[&str] = &["guid", "m_IndexBuffer", "_typelessdata"];

/// Map keys written as a flow map (`{x: 0, y: 0, z: 0}`).
const VECTOR_KEYS: &[&str] = &["x", "y", "z", "w", "r", "g", "b", "a"];

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("line {line}: malformed document header: {header}")]
    Header { line: usize, header: String },

    #[error("line {line}: content before the first document")]
    Stray { line: usize },

    #[error("document is not UTF-8 text")]
    NotText,

    #[error("object &{file_id}: {source}")]
    Yaml {
        file_id: i64,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("object &{file_id}: {message}")]
    Body { file_id: i64, message: String },

    #[error("duplicate or zero fileID {0}")]
    DuplicateFileId(i64),

    #[error("object &{from} references missing fileID {to}")]
    DanglingReference { from: i64, to: i64 },
}

impl fmt::Display for UnityDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(YAML_HEADER)?;
        for object in &self.objects {
            write!(f, "--- !u!{} &{}", object.class.id(), object.file_id)?;
            if object.stripped {
                write!(f, " stripped")?;
            }
            writeln!(f)?;
            writeln!(f, "{}:", object.class_name)?;
            for (key, value) in &object.fields {
                write_field(f, key, value, 2)?;
            }
        }
        Ok(())
    }
}

/// Serialize a document as Unity YAML.
pub fn write_document(document: &UnityDocument) -> String {
    document.to_string()
}

fn write_field<W: Write>(out: &mut W, key: &str, value: &UnityValue, indent: usize) -> fmt::Result {
    let pad = " ".repeat(indent);
    match value {
        UnityValue::Null => writeln!(out, "{}{}:", pad, key),
        UnityValue::Map(entries) if entries.is_empty() => writeln!(out, "{}{}: {{}}", pad, key),
        UnityValue::Seq(items) if items.is_empty() => writeln!(out, "{}{}: []", pad, key),
        UnityValue::Map(entries) if !is_vector(entries) => {
            writeln!(out, "{}{}:", pad, key)?;
            for (k, v) in entries {
                write_field(out, k, v, indent + 2)?;
            }
            Ok(())
        }
        UnityValue::Seq(items) => {
            // Unity writes sequence items at the indentation of their key
            writeln!(out, "{}{}:", pad, key)?;
            for item in items {
                write_item(out, item, indent)?;
            }
            Ok(())
        }
        inline => {
            write!(out, "{}{}: ", pad, key)?;
            write_flow(out, key, inline)?;
            writeln!(out)
        }
    }
}

fn write_item<W: Write>(out: &mut W, item: &UnityValue, indent: usize) -> fmt::Result {
    match item {
        UnityValue::Map(entries) if !entries.is_empty() && !is_vector(entries) => {
            // Render as a nested block, then turn the first line's indent into "- "
            let mut block = String::new();
            for (k, v) in entries {
                write_field(&mut block, k, v, indent + 2)?;
            }
            block.replace_range(indent..indent + 2, "- ");
            out.write_str(&block)
        }
        other => {
            write!(out, "{}- ", " ".repeat(indent))?;
            write_flow(out, "", other)?;
            writeln!(out)
        }
    }
}

/// Write a value in flow (single line) style.
fn write_flow<W: Write>(out: &mut W, key: &str, value: &UnityValue) -> fmt::Result {
    match value {
        UnityValue::Null => write!(out, "null"),
        UnityValue::Int(i) => write!(out, "{}", i),
        UnityValue::Float(v) => write!(out, "{}", format_float(*v)),
        UnityValue::String(s) if HEX_KEYS.contains(&key) && is_hex(s) => write!(out, "{}", s),
        UnityValue::String(s) => write!(out, "{}", scalar(s)),
        UnityValue::Ref(r) => {
            write!(out, "{{fileID: {}", r.file_id)?;
            if let Some(guid) = &r.guid {
                write!(out, ", guid: {}", guid)?;
            }
            if let Some(type_id) = r.type_id {
                write!(out, ", type: {}", type_id)?;
            }
            write!(out, "}}")
        }
        UnityValue::Map(entries) => {
            write!(out, "{{")?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{}: ", k)?;
                write_flow(out, k, v)?;
            }
            write!(out, "}}")
        }
        UnityValue::Seq(items) => {
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write_flow(out, key, item)?;
            }
            write!(out, "]")
        }
    }
}

fn is_vector(entries: &[(String, UnityValue)]) -> bool {
    !entries.is_empty()
        && entries.len() <= 4
        && entries.iter().all(|(k, v)| {
            VECTOR_KEYS.contains(&k.as_str()) && matches!(v, UnityValue::Int(_) | UnityValue::Float(_))
        })
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        ".nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        format!("{}", v)
    }
}

/// Quote a string scalar when plain style would change its meaning.
fn scalar(s: &str) -> Cow<'_, str> {
    if s.contains('\n') || s.contains('\t') {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\t', "\\t");
        return Cow::Owned(format!("\"{}\"", escaped));
    }
    if needs_quotes(s) {
        Cow::Owned(format!("'{}'", s.replace('\'', "''")))
    } else {
        Cow::Borrowed(s)
    }
}

fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    if "-?:,[]{}#&*!|>'\"%@`~.".contains(first) || first.is_whitespace() {
        return true;
    }
    if s.ends_with(char::is_whitespace) || s.ends_with(':') {
        return true;
    }
    if s.contains(": ") || s.contains(" #") {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n" | "null"
    ) {
        return true;
    }
    s.parse::<f64>().is_ok() || (lower.starts_with("0x") && i64::from_str_radix(&lower[2..], 16).is_ok())
}

/// Parse a Unity YAML stream.
pub fn parse_document(text: &str) -> Result<UnityDocument, YamlError> {
    let mut document = UnityDocument::new();
    let mut current: Option<(Header, String)> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line == "---" || line.starts_with("--- ") {
            if let Some((header, body)) = current.take() {
                document.push(parse_object(header, &body)?);
            }
            current = Some((Header::parse(line, line_no)?, String::new()));
            continue;
        }

        match current.as_mut() {
            Some((_, body)) => {
                body.push_str(&quote_hex_values(line));
                body.push('\n');
            }
            None => {
                let trimmed = line.trim();
                if !(trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#')) {
                    return Err(YamlError::Stray { line: line_no });
                }
            }
        }
    }

    if let Some((header, body)) = current.take() {
        document.push(parse_object(header, &body)?);
    }

    log::debug!("Parsed Unity document with {} objects", document.len());
    Ok(document)
}

/// Parse a Unity YAML stream from raw asset bytes.
pub fn parse_document_bytes(bytes: &[u8]) -> Result<UnityDocument, YamlError> {
    let text = std::str::from_utf8(bytes).map_err(|_| YamlError::NotText)?;
    parse_document(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// A `--- !u!<class> &<fileID>[ stripped]` line.
struct Header {
    class: UnityClass,
    file_id: i64,
    stripped: bool,
}

impl Header {
    fn parse(line: &str, line_no: usize) -> Result<Self, YamlError> {
        let malformed = || YamlError::Header {
            line: line_no,
            header: line.to_string(),
        };

        let mut parts = line.split_whitespace().skip(1);
        let class = parts
            .next()
            .and_then(|t| t.strip_prefix("!u!"))
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        let file_id = parts
            .next()
            .and_then(|t| t.strip_prefix('&'))
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(malformed)?;
        let stripped = match parts.next() {
            None => false,
            Some("stripped") => true,
            Some(_) => return Err(malformed()),
        };

        Ok(Self {
            class: UnityClass::from_id(class),
            file_id,
            stripped,
        })
    }
}

fn parse_object(header: Header, body: &str) -> Result<UnityObject, YamlError> {
    let file_id = header.file_id;
    let body_error = |message: String| YamlError::Body { file_id, message };

    let value: Value =
        serde_yaml::from_str(body).map_err(|source| YamlError::Yaml { file_id, source })?;

    let mut object = UnityObject::new(file_id, header.class);
    object.stripped = header.stripped;

    let fields = match value {
        Value::Null => return Ok(object),
        Value::Mapping(mapping) => {
            let mut entries = mapping.into_iter();
            let (class_key, fields) = entries
                .next()
                .ok_or_else(|| body_error("empty object".to_string()))?;
            if entries.next().is_some() {
                return Err(body_error("more than one top-level key".to_string()));
            }
            object.class_name = key_string(&class_key);
            fields
        }
        _ => return Err(body_error("expected a class name mapping".to_string())),
    };

    match fields {
        Value::Null => {}
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                let value = convert(value).map_err(body_error)?;
                object.fields.push((key_string(&key), value));
            }
        }
        _ => return Err(body_error("object fields must be a mapping".to_string())),
    }

    Ok(object)
}

fn convert(value: Value) -> Result<UnityValue, String> {
    Ok(match value {
        Value::Null => UnityValue::Null,
        Value::Bool(b) => UnityValue::Int(b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => UnityValue::Int(i),
            None => match n.as_u64() {
                Some(u) => UnityValue::Int(u as i64),
                None => UnityValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
        },
        Value::String(s) => UnityValue::String(s),
        Value::Sequence(items) => {
            UnityValue::Seq(items.into_iter().map(convert).collect::<Result<_, _>>()?)
        }
        Value::Mapping(mapping) if is_reference(&mapping) => UnityValue::Ref(file_ref(&mapping)?),
        Value::Mapping(mapping) => UnityValue::Map(
            mapping
                .into_iter()
                .map(|(k, v)| Ok((key_string(&k), convert(v)?)))
                .collect::<Result<_, String>>()?,
        ),
        Value::Tagged(tagged) => convert(tagged.value)?,
    })
}

fn is_reference(mapping: &Mapping) -> bool {
    mapping.contains_key("fileID")
        && mapping
            .keys()
            .all(|k| matches!(k.as_str(), Some("fileID" | "guid" | "type")))
}

fn file_ref(mapping: &Mapping) -> Result<FileRef, String> {
    let file_id = mapping
        .get("fileID")
        .and_then(|v| v.as_i64().or_else(|| v.as_u64().map(|u| u as i64)))
        .ok_or_else(|| "fileID is not an integer".to_string())?;

    let guid = match mapping.get("guid") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse::<Guid>().map_err(|e| e.to_string())?),
        Some(other) => return Err(format!("invalid guid: {:?}", other)),
    };

    let type_id = match mapping.get("type") {
        None => None,
        Some(v) => Some(
            v.as_i64()
                .and_then(|t| i32::try_from(t).ok())
                .ok_or_else(|| "type is not an integer".to_string())?,
        ),
    };

    Ok(FileRef {
        file_id,
        guid,
        type_id,
    })
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Quote hex blobs so YAML doesn't read them as numbers.
pub(crate) fn quote_hex_values(line: &str) -> Cow<'_, str> {
    if !HEX_KEYS.iter().any(|key| line.contains(key)) {
        return Cow::Borrowed(line);
    }

    let mut result = line.to_string();
    for key in HEX_KEYS {
        result = quote_after(&result, key);
    }
    Cow::Owned(result)
}

fn quote_after(line: &str, key: &str) -> String {
    let pattern = format!("{}: ", key);
    let mut out = String::with_capacity(line.len() + 4);
    let mut rest = line;

    while let Some(pos) = rest.find(&pattern) {
        let at_boundary = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| c == ' ' || c == '{' || c == ',');
        let value_start = pos + pattern.len();
        let value_len = rest[value_start..]
            .bytes()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        let value_end = value_start + value_len;
        let at_end = rest[value_end..]
            .chars()
            .next()
            .map_or(true, |c| c == ',' || c == '}' || c == ' ');

        out.push_str(&rest[..value_start]);
        if at_boundary && value_len > 0 && at_end {
            out.push('"');
            out.push_str(&rest[value_start..value_end]);
            out.push('"');
        } else {
            out.push_str(&rest[value_start..value_end]);
        }
        rest = &rest[value_end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFAB: &str = r#"%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_ObjectHideFlags: 0
  m_CorrespondingSourceObject: {fileID: 0}
  m_PrefabInstance: {fileID: 0}
  m_PrefabAsset: {fileID: 0}
  serializedVersion: 6
  m_Component:
  - component: {fileID: 2}
  - component: {fileID: 3}
  m_Layer: 0
  m_Name: Cube
  m_TagString: Untagged
  m_IsActive: 1
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_LocalRotation: {x: 0, y: 0, z: 0, w: 1}
  m_LocalPosition: {x: 1.5, y: 0, z: -2}
  m_LocalScale: {x: 1, y: 1, z: 1}
  m_Children: []
  m_Father: {fileID: 0}
--- !u!33 &3
MeshFilter:
  m_GameObject: {fileID: 1}
  m_Mesh: {fileID: 4300000, guid: 12345678901234567890123456789012, type: 2}
"#;

    #[test]
    fn test_parse_prefab() {
        let doc = parse_document(PREFAB).unwrap();
        assert_eq!(doc.len(), 3);

        let go = doc.get(1).unwrap();
        assert_eq!(go.class, UnityClass::GameObject);
        assert_eq!(go.name(), Some("Cube"));
        assert_eq!(go.component_refs(), vec![FileRef::local(2), FileRef::local(3)]);

        let transform = doc.get(2).unwrap();
        assert_eq!(
            transform.get("m_LocalPosition").and_then(UnityValue::to_dvec3),
            Some(usdpkg_math::DVec3::new(1.5, 0.0, -2.0))
        );
        assert!(transform.get_ref("m_Father").unwrap().is_null());

        // All-digit GUIDs stay strings
        let mesh = doc.get(3).unwrap().get_ref("m_Mesh").unwrap();
        assert_eq!(mesh.file_id, 4300000);
        assert_eq!(
            mesh.guid.map(|g| g.to_string()).as_deref(),
            Some("12345678901234567890123456789012")
        );
        assert_eq!(mesh.type_id, Some(2));

        assert!(doc.validate_references().is_ok());
    }

    #[test]
    fn test_written_document_parses_back() {
        let doc = parse_document(PREFAB).unwrap();
        let text = write_document(&doc);
        assert!(text.starts_with(YAML_HEADER));
        assert!(text.contains("--- !u!1 &1\nGameObject:\n"));
        assert!(text.contains("  m_Component:\n  - component: {fileID: 2}\n"));
        assert!(text.contains("guid: 12345678901234567890123456789012, type: 2}"));

        assert_eq!(parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn test_stripped_header() {
        let text = "--- !u!4 &400 stripped\nTransform:\n  m_PrefabInstance: {fileID: 0}\n";
        let doc = parse_document(text).unwrap();
        assert!(doc.objects[0].stripped);
        assert_eq!(doc.objects[0].class, UnityClass::Transform);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            parse_document("--- !u!x &1\nGameObject:\n"),
            Err(YamlError::Header { line: 1, .. })
        ));
        assert!(matches!(
            parse_document("GameObject:\n  m_Name: x\n"),
            Err(YamlError::Stray { line: 1 })
        ));
        assert!(matches!(
            parse_document("--- !u!1 &1\nGameObject:\n  m_Name: [unclosed\n"),
            Err(YamlError::Yaml { file_id: 1, .. })
        ));
        assert!(matches!(parse_document_bytes(&[0xff, 0xfe, 0x00]), Err(YamlError::NotText)));
    }

    #[test]
    fn test_scalar_quoting() {
        let mut doc = UnityDocument::new();
        doc.push(
            UnityObject::new(1, UnityClass::GameObject)
                .with("m_Name", "007")
                .with("m_TagString", "it's: tricky")
                .with("m_StaticEditorFlags", "yes"),
        );
        let text = write_document(&doc);
        assert!(text.contains("m_Name: '007'"));
        assert!(text.contains("m_TagString: 'it''s: tricky'"));

        let parsed = parse_document(&text).unwrap();
        assert_eq!(parsed.objects[0].name(), Some("007"));
        assert_eq!(
            parsed.objects[0].get("m_TagString").and_then(UnityValue::as_str),
            Some("it's: tricky")
        );
        assert_eq!(
            parsed.objects[0].get("m_StaticEditorFlags").and_then(UnityValue::as_str),
            Some("yes")
        );
    }

    #[test]
    fn test_hex_blob_round_trip() {
        let mut doc = UnityDocument::new();
        doc.push(UnityObject::new(4300000, UnityClass::Mesh).with("m_IndexBuffer", "000000000100000002000000"));
        let text = write_document(&doc);
        assert!(text.contains("  m_IndexBuffer: 000000000100000002000000\n"));

        let parsed = parse_document(&text).unwrap();
        assert_eq!(
            parsed.objects[0].get("m_IndexBuffer").and_then(UnityValue::as_str),
            Some("000000000100000002000000")
        );
    }

    #[test]
    fn test_sequence_of_maps() {
        let mut doc = UnityDocument::new();
        doc.push(UnityObject::new(2100000, UnityClass::Material).with(
            "m_Floats",
            UnityValue::Seq(vec![
                UnityValue::Map(vec![("_Glossiness".into(), UnityValue::Float(0.5))]),
                UnityValue::Map(vec![("_Metallic".into(), UnityValue::Int(0))]),
            ]),
        ));
        let text = write_document(&doc);
        assert!(text.contains("  m_Floats:\n  - _Glossiness: 0.5\n  - _Metallic: 0\n"));
        assert_eq!(parse_document(&text).unwrap(), doc);
    }
}
