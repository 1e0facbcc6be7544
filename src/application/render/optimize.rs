//! Markup-to-markup SVG minification.
//!
//! Pure and deterministic: the document is parsed with `roxmltree`, re-emitted
//! without comments, prolog, doctype, redundant attributes or whitespace, and
//! the pass repeats until the output stops changing. `viewBox` is never
//! modified because raster scaling depends on it.
//!
//! Inherited presentation defaults such as `stroke="none"` are only dropped
//! when no ancestor attribute or ancestor `style` declaration sets the same
//! property, and never when the document carries a `<style>` sheet.

use std::collections::HashSet;
use std::fmt::Write as _;

use roxmltree::{Document, Node, ParsingOptions};
use svgtypes::{PathParser, PathSegment};
use thiserror::Error;

const MAX_PASSES: usize = 8;
const PATH_PRECISION: f64 = 1000.0;

const NS_SVG: &str = "http://www.w3.org/2000/svg";
const NS_XLINK: &str = "http://www.w3.org/1999/xlink";
const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";
const EDITOR_NAMESPACES: [&str; 3] = [
    "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd",
    "http://www.inkscape.org/namespaces/inkscape",
    "http://ns.adobe.com/AdobeIllustrator/10.0/",
];

/// Inherited presentation attributes and their initial values. These may only
/// be dropped when no ancestor overrides them.
const INHERITED_DEFAULTS: [(&str, &str); 12] = [
    ("fill-opacity", "1"),
    ("fill-rule", "nonzero"),
    ("clip-rule", "nonzero"),
    ("stroke", "none"),
    ("stroke-opacity", "1"),
    ("stroke-width", "1"),
    ("stroke-linecap", "butt"),
    ("stroke-linejoin", "miter"),
    ("stroke-miterlimit", "4"),
    ("stroke-dasharray", "none"),
    ("stroke-dashoffset", "0"),
    ("visibility", "visible"),
];

/// Non-inherited attributes whose initial value equals the absent attribute.
const LOCAL_DEFAULTS: [(&str, &str); 2] = [("opacity", "1"), ("display", "inline")];

const POSITIONAL_ELEMENTS: [&str; 3] = ["rect", "use", "image"];
const DROPPABLE_CONTAINERS: [&str; 2] = ["g", "defs"];

#[derive(Debug, Clone, Error)]
pub enum OptimizeError {
    #[error("invalid SVG markup: {0}")]
    Parse(String),
}

/// Minify SVG markup until a fixed point is reached.
pub fn optimize_svg(markup: &str) -> Result<String, OptimizeError> {
    let mut current = optimize_pass(markup)?;
    for _ in 1..MAX_PASSES {
        let next = optimize_pass(&current)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

fn optimize_pass(markup: &str) -> Result<String, OptimizeError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(markup, options)
        .map_err(|err| OptimizeError::Parse(err.to_string()))?;

    let used_namespaces = collect_used_namespaces(&document);
    let has_stylesheet = document
        .descendants()
        .any(|node| node.is_element() && node.tag_name().name() == "style");
    let mut writer = Writer {
        out: String::with_capacity(markup.len()),
        used_namespaces,
        inherited: Vec::new(),
        has_stylesheet,
    };
    writer.element(document.root_element(), None);
    Ok(writer.out)
}

fn collect_used_namespaces(document: &Document<'_>) -> HashSet<String> {
    let mut used = HashSet::new();
    for node in document.descendants().filter(|node| node.is_element()) {
        if is_editor_node(&node) {
            continue;
        }
        if let Some(uri) = node.tag_name().namespace() {
            used.insert(uri.to_string());
        }
        for attribute in node.attributes() {
            match attribute.namespace() {
                Some(uri) if keeps_attribute_namespace(uri) => {
                    used.insert(uri.to_string());
                }
                _ => {}
            }
        }
    }
    used
}

fn is_editor_node(node: &Node<'_, '_>) -> bool {
    node.tag_name()
        .namespace()
        .is_some_and(|uri| EDITOR_NAMESPACES.contains(&uri))
}

fn keeps_attribute_namespace(uri: &str) -> bool {
    uri == NS_XLINK || uri == NS_XML
}

struct Writer {
    out: String,
    used_namespaces: HashSet<String>,
    /// Presentation attributes set by the ancestors of the element being written,
    /// including declarations from their `style` attributes.
    inherited: Vec<(String, String)>,
    /// A `<style>` sheet can target any element, so inherited defaults stay.
    has_stylesheet: bool,
}

impl Writer {
    fn element(&mut self, node: Node<'_, '_>, parent: Option<Node<'_, '_>>) -> bool {
        if is_editor_node(&node) {
            return false;
        }

        let mut tag = String::new();
        let mut attrs = String::new();
        let mut has_id = false;
        let mut pushed = 0usize;

        push_qualified_name(&mut tag, &node, node.tag_name().namespace(), node.tag_name().name());
        self.namespace_declarations(&mut attrs, &node, parent);

        let local = node.tag_name().name();
        for attribute in node.attributes() {
            let name = attribute.name();
            let value = attribute.value();

            if let Some(uri) = attribute.namespace() {
                if !keeps_attribute_namespace(uri) {
                    continue;
                }
            } else if name == "viewBox" {
                write_attribute(&mut attrs, "viewBox", value);
                continue;
            }

            if value.trim().is_empty() {
                continue;
            }

            if attribute.namespace().is_none() {
                if self.is_redundant(local, name, value) {
                    continue;
                }
                if INHERITED_DEFAULTS.iter().any(|(attr, _)| *attr == name) {
                    self.inherited.push((name.to_string(), value.trim().to_string()));
                    pushed += 1;
                }
                if name == "style" {
                    for (property, declared) in inherited_style_declarations(value) {
                        self.inherited.push((property.to_string(), declared.to_string()));
                        pushed += 1;
                    }
                }
                if name == "id" {
                    has_id = true;
                }
            }

            let mut qualified = String::new();
            push_qualified_name(&mut qualified, &node, attribute.namespace(), name);
            if attribute.namespace().is_none() && name == "d" {
                let simplified = simplify_path_data(value).unwrap_or_else(|| value.to_string());
                write_attribute(&mut attrs, &qualified, &simplified);
            } else {
                write_attribute(&mut attrs, &qualified, value);
            }
        }

        let mut body = String::new();
        std::mem::swap(&mut self.out, &mut body);
        let mut has_content = false;
        for child in node.children() {
            if child.is_element() {
                has_content |= self.element(child, Some(node));
            } else if child.is_text() {
                let text = child.text().unwrap_or_default();
                if !text.trim().is_empty() {
                    escape_into(&mut self.out, text, false);
                    has_content = true;
                }
            }
        }
        std::mem::swap(&mut self.out, &mut body);
        self.inherited.truncate(self.inherited.len() - pushed);

        if parent.is_some()
            && !has_content
            && !has_id
            && DROPPABLE_CONTAINERS.contains(&local)
            && node.tag_name().namespace().is_none_or(|uri| uri == NS_SVG)
        {
            return false;
        }

        self.out.push('<');
        self.out.push_str(&tag);
        self.out.push_str(&attrs);
        if body.is_empty() {
            self.out.push_str("/>");
        } else {
            self.out.push('>');
            self.out.push_str(&body);
            self.out.push_str("</");
            self.out.push_str(&tag);
            self.out.push('>');
        }
        true
    }

    fn namespace_declarations(&self, out: &mut String, node: &Node<'_, '_>, parent: Option<Node<'_, '_>>) {
        for namespace in node.namespaces() {
            let prefix = namespace.name();
            let uri = namespace.uri();
            if prefix == Some("xml") || uri == NS_XML {
                continue;
            }
            if !self.used_namespaces.contains(uri) {
                continue;
            }
            let inherited = parent.is_some_and(|parent| {
                parent
                    .namespaces()
                    .any(|ns| ns.name() == prefix && ns.uri() == uri)
            });
            if inherited {
                continue;
            }
            match prefix {
                Some(prefix) => write_attribute(out, &format!("xmlns:{prefix}"), uri),
                None => write_attribute(out, "xmlns", uri),
            }
        }
    }

    fn is_redundant(&self, element: &str, name: &str, value: &str) -> bool {
        let value = value.trim();

        if let Some((_, default)) = INHERITED_DEFAULTS.iter().find(|(attr, _)| *attr == name) {
            if self.has_stylesheet {
                return false;
            }
            let ancestor = self
                .inherited
                .iter()
                .rev()
                .find(|(attr, _)| attr == name)
                .map(|(_, value)| value.as_str());
            return value == *default && ancestor.is_none_or(|ancestor| ancestor == *default);
        }

        if LOCAL_DEFAULTS
            .iter()
            .any(|(attr, default)| *attr == name && *default == value)
        {
            return true;
        }

        POSITIONAL_ELEMENTS.contains(&element)
            && (name == "x" || name == "y")
            && value.parse::<f64>().is_ok_and(|number| number == 0.0)
    }
}

/// `property: value` pairs from a `style` attribute that name an inherited
/// presentation property.
fn inherited_style_declarations(style: &str) -> impl Iterator<Item = (&str, &str)> {
    style.split(';').filter_map(|declaration| {
        let (property, value) = declaration.split_once(':')?;
        let property = property.trim();
        INHERITED_DEFAULTS
            .iter()
            .any(|(attr, _)| *attr == property)
            .then(|| (property, value.trim()))
    })
}

fn push_qualified_name(out: &mut String, node: &Node<'_, '_>, namespace: Option<&str>, local: &str) {
    if let Some(uri) = namespace {
        let prefix = if uri == NS_XML {
            Some("xml")
        } else {
            node.lookup_prefix(uri)
        };
        if let Some(prefix) = prefix.filter(|prefix| !prefix.is_empty()) {
            out.push_str(prefix);
            out.push(':');
        }
    }
    out.push_str(local);
}

fn write_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

fn escape_into(out: &mut String, value: &str, attribute: bool) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Round coordinates, drop redundant separators and merge repeated commands.
/// Returns `None` for path data that does not parse, leaving it untouched.
fn simplify_path_data(data: &str) -> Option<String> {
    let segments = PathParser::from(data)
        .map(|segment| segment.map(command_and_args))
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    let mut merged: Vec<(char, Vec<f64>)> = Vec::with_capacity(segments.len());
    for (command, args) in segments {
        let mergeable = !matches!(command, 'M' | 'm' | 'Z' | 'z');
        match merged.last_mut() {
            Some((last, last_args)) if mergeable && *last == command => {
                last_args.extend(args);
            }
            _ => merged.push((command, args)),
        }
    }

    let mut out = String::with_capacity(data.len());
    for (command, args) in &merged {
        out.push(*command);
        let mut first = true;
        for value in args {
            let formatted = format_number(*value);
            if !first && !formatted.starts_with('-') {
                out.push(' ');
            }
            out.push_str(&formatted);
            first = false;
        }
    }
    Some(out)
}

fn command_and_args(segment: PathSegment) -> (char, Vec<f64>) {
    let letter = |abs: bool, upper: char| {
        if abs { upper } else { upper.to_ascii_lowercase() }
    };
    let flag = |value: bool| if value { 1.0 } else { 0.0 };

    match segment {
        PathSegment::MoveTo { abs, x, y } => (letter(abs, 'M'), vec![x, y]),
        PathSegment::LineTo { abs, x, y } => (letter(abs, 'L'), vec![x, y]),
        PathSegment::HorizontalLineTo { abs, x } => (letter(abs, 'H'), vec![x]),
        PathSegment::VerticalLineTo { abs, y } => (letter(abs, 'V'), vec![y]),
        PathSegment::CurveTo {
            abs,
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        } => (letter(abs, 'C'), vec![x1, y1, x2, y2, x, y]),
        PathSegment::SmoothCurveTo { abs, x2, y2, x, y } => {
            (letter(abs, 'S'), vec![x2, y2, x, y])
        }
        PathSegment::Quadratic { abs, x1, y1, x, y } => (letter(abs, 'Q'), vec![x1, y1, x, y]),
        PathSegment::SmoothQuadratic { abs, x, y } => (letter(abs, 'T'), vec![x, y]),
        PathSegment::EllipticalArc {
            abs,
            rx,
            ry,
            x_axis_rotation,
            large_arc,
            sweep,
            x,
            y,
        } => (
            letter(abs, 'A'),
            vec![rx, ry, x_axis_rotation, flag(large_arc), flag(sweep), x, y],
        ),
        PathSegment::ClosePath { abs } => (letter(abs, 'Z'), Vec::new()),
    }
}

fn format_number(value: f64) -> String {
    let rounded = (value * PATH_PRECISION).round() / PATH_PRECISION;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };

    let mut text = String::new();
    let _ = write!(text, "{rounded}");
    if let Some(rest) = text.strip_prefix("0.") {
        format!(".{rest}")
    } else if let Some(rest) = text.strip_prefix("-0.") {
        format!("-.{rest}")
    } else {
        text
    }
}
