//! GraphML serialization of a property graph.
//!
//! Emits the standard attributed-directed-multigraph exchange format:
//! typed `<key>` declarations collected from the graph, then nodes and
//! edges with `<data>` elements.

use std::collections::BTreeMap;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use nexo_core::{Error, Result};

use super::model::{AttrValue, PropertyGraph};

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd";

/// Attribute key registry: name → (key id, declared type).
///
/// A key observed with more than one value type widens to `string`.
#[derive(Debug, Default)]
struct KeyTable {
    keys: BTreeMap<String, (String, &'static str)>,
    prefix: &'static str,
}

impl KeyTable {
    fn new(prefix: &'static str) -> Self {
        Self {
            keys: BTreeMap::new(),
            prefix,
        }
    }

    fn observe(&mut self, name: &str, value: &AttrValue) {
        let next_id = format!("{}{}", self.prefix, self.keys.len());
        match self.keys.get_mut(name) {
            None => {
                self.keys
                    .insert(name.to_string(), (next_id, value.graphml_type()));
            }
            Some((_, declared)) => {
                if *declared != value.graphml_type() {
                    *declared = "string";
                }
            }
        }
    }

    fn id_of(&self, name: &str) -> &str {
        &self.keys[name].0
    }
}

fn xml<T, E: std::fmt::Display>(result: std::result::Result<T, E>) -> Result<T> {
    result.map_err(|e| Error::Serialization(format!("GraphML write failed: {e}")))
}

/// Write the graph as GraphML.
pub fn write_graphml<W: Write>(graph: &PropertyGraph, out: W) -> Result<()> {
    let mut node_keys = KeyTable::new("d");
    let mut edge_keys = KeyTable::new("e");

    for node in graph.nodes() {
        for (name, value) in &node.attrs {
            node_keys.observe(name, value);
        }
    }
    for (_, _, edge) in graph.edges() {
        for (name, value) in &edge.attrs {
            edge_keys.observe(name, value);
        }
    }

    let mut writer = Writer::new_with_indent(out, b' ', 2);

    xml(writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))))?;

    let mut root = BytesStart::new("graphml");
    root.push_attribute(("xmlns", GRAPHML_NS));
    root.push_attribute(("xmlns:xsi", XSI_NS));
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    xml(writer.write_event(Event::Start(root)))?;

    for (table, target) in [(&node_keys, "node"), (&edge_keys, "edge")] {
        for (name, (id, ty)) in &table.keys {
            let mut key = BytesStart::new("key");
            key.push_attribute(("id", id.as_str()));
            key.push_attribute(("for", target));
            key.push_attribute(("attr.name", name.as_str()));
            key.push_attribute(("attr.type", *ty));
            xml(writer.write_event(Event::Empty(key)))?;
        }
    }

    let mut graph_el = BytesStart::new("graph");
    graph_el.push_attribute(("edgedefault", "directed"));
    xml(writer.write_event(Event::Start(graph_el)))?;

    for node in graph.nodes() {
        let mut node_el = BytesStart::new("node");
        node_el.push_attribute(("id", node.id.as_str()));
        if node.attrs.is_empty() {
            xml(writer.write_event(Event::Empty(node_el)))?;
            continue;
        }
        xml(writer.write_event(Event::Start(node_el)))?;
        for (name, value) in &node.attrs {
            write_data(&mut writer, node_keys.id_of(name), value)?;
        }
        xml(writer.write_event(Event::End(BytesEnd::new("node"))))?;
    }

    for (source, target, edge) in graph.edges() {
        let mut edge_el = BytesStart::new("edge");
        edge_el.push_attribute(("source", source));
        edge_el.push_attribute(("target", target));
        if edge.attrs.is_empty() {
            xml(writer.write_event(Event::Empty(edge_el)))?;
            continue;
        }
        xml(writer.write_event(Event::Start(edge_el)))?;
        for (name, value) in &edge.attrs {
            write_data(&mut writer, edge_keys.id_of(name), value)?;
        }
        xml(writer.write_event(Event::End(BytesEnd::new("edge"))))?;
    }

    xml(writer.write_event(Event::End(BytesEnd::new("graph"))))?;
    xml(writer.write_event(Event::End(BytesEnd::new("graphml"))))?;
    Ok(())
}

fn write_data<W: Write>(writer: &mut Writer<W>, key_id: &str, value: &AttrValue) -> Result<()> {
    let mut data = BytesStart::new("data");
    data.push_attribute(("key", key_id));
    xml(writer.write_event(Event::Start(data)))?;
    xml(writer.write_event(Event::Text(BytesText::new(&value.to_string()))))?;
    xml(writer.write_event(Event::End(BytesEnd::new("data"))))?;
    Ok(())
}
