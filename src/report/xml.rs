//! CDML-style dataset description.

use std::borrow::Cow;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::format_significant;
use crate::accessor::{Accessor, ElementType};
use crate::catalog::{AttributeSet, CoordinateValues, DimensionDescriptor, VariableDescriptor};
use crate::error::{CurateError, Result};
use crate::index::DatasetIndex;

const DOCTYPE: &str = "dataset SYSTEM \"http://www-pcmdi.llnl.gov/software/cdms/cdml.dtd\"";

/// A minimal element tree; enough for the report and nothing more.
#[derive(Debug, Default)]
struct Element {
    name: &'static str,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn attr(mut self, name: &str, value: impl ToString) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    fn text(mut self, text: String) -> Self {
        self.text = Some(text);
        self
    }

    /// Key attributes become XML attributes, the others `attr` children.
    fn with_attribute_set(mut self, attributes: &AttributeSet) -> Self {
        for (name, value) in attributes.key() {
            self = self.attr(name, value);
        }
        for (name, value) in attributes.other() {
            self = self.child(
                Element::new("attr")
                    .attr("name", name)
                    .attr("datatype", "String")
                    .text(value.clone()),
            );
        }
        self
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> std::io::Result<()> {
        let mut start = BytesStart::new(self.name);
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), xml_chars(value).as_ref()));
        }
        if self.children.is_empty() && self.text.is_none() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write(writer)?;
        }
        if let Some(text) = &self.text {
            if !self.children.is_empty() {
                writer.write_indent()?;
            }
            writer.write_event(Event::Text(BytesText::new(&xml_chars(text))))?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name)))
    }
}

/// Replace characters XML 1.0 cannot carry, even escaped, with U+FFFD.
///
/// Attribute values come straight from the member files and may hold
/// control characters.
fn xml_chars(text: &str) -> Cow<'_, str> {
    let allowed = |c: char| {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    };
    if text.chars().all(allowed) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if allowed(c) { c } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    )
}

fn datatype(element_type: Option<ElementType>) -> &'static str {
    element_type.map_or("Unspecified", ElementType::name)
}

/// Bracketed coordinate list; doubles keep 17 significant digits, floats 8.
fn coordinate_text(values: &CoordinateValues) -> String {
    let formatted: Vec<String> = match values {
        CoordinateValues::Double(v) => v.iter().map(|&x| format_significant(x, 17)).collect(),
        CoordinateValues::Float(v) => v
            .iter()
            .map(|&x| format_significant(x as f64, 8))
            .collect(),
    };
    format!("[{}]", formatted.join(" "))
}

fn axis<A: Accessor>(index: &DatasetIndex<A>, dim: &DimensionDescriptor) -> Element {
    let length = dim.size().len().unwrap_or_else(|| index.time_count());
    let mut element = Element::new("axis")
        .attr("id", dim.name())
        .attr("units", dim.units())
        .attr("length", length)
        .attr("datatype", datatype(dim.element_type()));
    if let Some(info) = dim.info() {
        element = element.with_attribute_set(info.attributes());
    }
    match dim.values() {
        Some(values) if !values.is_empty() => element.text(coordinate_text(values)),
        _ => element,
    }
}

fn variable(var: &VariableDescriptor) -> Element {
    let mut element = Element::new("variable")
        .attr("id", var.name())
        .attr("datatype", datatype(var.element_type()))
        .attr("units", var.units())
        .with_attribute_set(var.info().attributes());

    if !var.dimension_names().is_empty() {
        let domain = var
            .dimension_names()
            .iter()
            .fold(Element::new("domain"), |domain, name| {
                domain.child(Element::new("domElem").attr("name", name))
            });
        element = element.child(domain);
    }
    element
}

/// Render the XML description of the dataset.
pub fn render_xml<A: Accessor>(index: &DatasetIndex<A>) -> Result<String> {
    let mut dataset = Element::new("dataset");
    if let Some(attributes) = index.dataset_attributes() {
        dataset = dataset.with_attribute_set(attributes);
    }
    for dim in index.dimensions().iter() {
        dataset = dataset.child(axis(index, dim));
    }
    for var in index.variables().iter() {
        dataset = dataset.child(variable(var));
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
    dataset.write(&mut writer)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    String::from_utf8(out).map_err(|e| CurateError::Report(e.to_string()))
}
