//! USDA (ASCII) export.
//!
//! Generates USDA text via string formatting. The output parses back with
//! [`parse_usda`](super::parse_usda) into an equivalent stage.

use std::fmt::{self, Write};
use std::io::Write as IoWrite;
use std::path::Path;

use super::types::{UsdAttribute, UsdPrim, UsdStage, UsdValue};

const INDENT: &str = "    ";

impl fmt::Display for UsdStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#usda 1.0")?;
        writeln!(f, "(")?;
        if let Some(doc) = &self.doc {
            writeln!(f, "{}{}", INDENT, quote(doc))?;
        }
        if let Some(default_prim) = &self.default_prim {
            writeln!(f, "{}defaultPrim = {}", INDENT, quote(default_prim))?;
        }
        writeln!(f, "{}metersPerUnit = {}", INDENT, format_float(self.meters_per_unit))?;
        writeln!(f, "{}upAxis = {}", INDENT, quote(self.up_axis.as_token()))?;
        for (key, value) in &self.metadata {
            write!(f, "{}{} = ", INDENT, key)?;
            write_value(f, value, 1)?;
            writeln!(f)?;
        }
        writeln!(f, ")")?;

        for prim in &self.roots {
            writeln!(f)?;
            write_prim(f, prim, 0)?;
        }
        Ok(())
    }
}

/// Render a stage as USDA text.
pub fn write_usda(stage: &UsdStage) -> String {
    stage.to_string()
}

/// Write a stage to `path`.
///
/// The layer is written to a temporary file next to `path` and renamed into
/// place, so a failure never leaves a partial layer behind.
pub fn save_usda(stage: &UsdStage, path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(stage.to_string().as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_prim<W: Write>(out: &mut W, prim: &UsdPrim, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);

    write!(out, "{}{} ", pad, prim.specifier.as_str())?;
    if !prim.type_name.is_empty() {
        write!(out, "{} ", prim.type_name)?;
    }
    write!(out, "{}", quote(&prim.name))?;

    if !prim.metadata.is_empty() {
        writeln!(out, " (")?;
        for (key, value) in &prim.metadata {
            write!(out, "{}{}{} = ", pad, INDENT, key)?;
            write_value(out, value, depth + 1)?;
            writeln!(out)?;
        }
        write!(out, "{})", pad)?;
    }
    writeln!(out)?;
    writeln!(out, "{}{{", pad)?;

    for attribute in &prim.attributes {
        write_attribute(out, attribute, depth + 1)?;
    }

    for relationship in &prim.relationships {
        write!(out, "{}{}", pad, INDENT)?;
        if relationship.custom {
            write!(out, "custom ")?;
        }
        write!(out, "rel {}", relationship.name)?;
        match relationship.targets.as_slice() {
            [] => {}
            [single] => write!(out, " = <{}>", single)?,
            many => {
                let targets: Vec<String> = many.iter().map(|t| format!("<{}>", t)).collect();
                write!(out, " = [{}]", targets.join(", "))?;
            }
        }
        writeln!(out)?;
    }

    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.attributes.is_empty() || !prim.relationships.is_empty() {
            writeln!(out)?;
        }
        write_prim(out, child, depth + 1)?;
    }

    writeln!(out, "{}}}", pad)
}

fn write_attribute<W: Write>(out: &mut W, attribute: &UsdAttribute, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    write!(out, "{}", pad)?;
    if attribute.custom {
        write!(out, "custom ")?;
    }
    if attribute.uniform {
        write!(out, "uniform ")?;
    }
    write!(out, "{} {}", attribute.type_name, attribute.name)?;

    if let Some(value) = &attribute.value {
        write!(out, " = ")?;
        write_value(out, value, depth)?;
    }

    if !attribute.metadata.is_empty() {
        writeln!(out, " (")?;
        for (key, value) in &attribute.metadata {
            write!(out, "{}{}{} = ", pad, INDENT, key)?;
            write_value(out, value, depth + 1)?;
            writeln!(out)?;
        }
        write!(out, "{})", pad)?;
    }
    writeln!(out)
}

fn write_value<W: Write>(out: &mut W, value: &UsdValue, depth: usize) -> fmt::Result {
    match value {
        UsdValue::Bool(b) => write!(out, "{}", b),
        UsdValue::Int(i) => write!(out, "{}", i),
        UsdValue::Float(v) => write!(out, "{}", format_float(*v)),
        UsdValue::String(s) => write!(out, "{}", quote(s)),
        UsdValue::Asset(a) => write!(out, "@{}@", a),
        UsdValue::Path(p) => write!(out, "<{}>", p),
        UsdValue::Blocked => write!(out, "None"),
        UsdValue::Tuple(items) => {
            // An asset followed by a prim path is a reference arc
            if let [UsdValue::Asset(a), UsdValue::Path(p)] = items.as_slice() {
                return write!(out, "@{}@<{}>", a, p);
            }
            write_sequence(out, "(", ")", items, depth)
        }
        UsdValue::Array(items) => write_sequence(out, "[", "]", items, depth),
        UsdValue::Dictionary(entries) => {
            let pad = INDENT.repeat(depth);
            writeln!(out, "{{")?;
            for (key, value) in entries {
                write!(out, "{}{}", pad, INDENT)?;
                if key.parse::<f64>().is_ok() {
                    write!(out, "{}: ", key)?;
                    write_value(out, value, depth + 1)?;
                    writeln!(out, ",")?;
                } else {
                    write!(out, "{} {} = ", dictionary_type(value), key)?;
                    write_value(out, value, depth + 1)?;
                    writeln!(out)?;
                }
            }
            write!(out, "{}}}", pad)
        }
    }
}

fn write_sequence<W: Write>(out: &mut W, open: &str, close: &str, items: &[UsdValue], depth: usize) -> fmt::Result {
    write!(out, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write_value(out, item, depth)?;
    }
    write!(out, "{}", close)
}

/// Value type used when writing dictionary entries.
fn dictionary_type(value: &UsdValue) -> &'static str {
    match value {
        UsdValue::Bool(_) => "bool",
        UsdValue::Int(_) => "int",
        UsdValue::Float(_) => "double",
        UsdValue::Asset(_) => "asset",
        UsdValue::Dictionary(_) => "dictionary",
        UsdValue::Array(_) => "string[]",
        _ => "string",
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{}", v)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
