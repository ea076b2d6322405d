// Graphviz DOT output for a crawled sitemap

use sitegraph_scanner::SitemapGraph;
use std::collections::HashSet;
use tracing::warn;

/// Attribute lists for the `graph`, `node` and `edge` defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotStyle {
    pub comment: Option<String>,
    pub graph_attrs: Vec<(String, String)>,
    pub node_attrs: Vec<(String, String)>,
    pub edge_attrs: Vec<(String, String)>,
}

impl DotStyle {
    /// Large boxed labels and thick orthogonal edges, readable when the
    /// graph is zoomed out. With screenshots the node border is hidden so the
    /// image frames the node.
    pub fn sitemap(screenshots: bool) -> Self {
        let mut node_attrs = vec![
            attr("fontsize", "60"),
            attr("labelloc", "b"),
            attr("shape", "box"),
        ];
        if screenshots {
            node_attrs.push(attr("penwidth", "0"));
        }

        Self {
            comment: Some("Sitemap".to_string()),
            graph_attrs: vec![attr("splines", "ortho"), attr("concentrate", "true")],
            node_attrs,
            edge_attrs: vec![attr("penwidth", "10")],
        }
    }
}

fn attr(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Renders nodes then edges, both in graph insertion order. Node ids are
/// labels, so two keys sharing a label end up as one Graphviz node.
pub fn render_dot(graph: &SitemapGraph, style: &DotStyle) -> String {
    let mut dot = String::new();

    if let Some(ref comment) = style.comment {
        dot.push_str(&format!("// {}\n", comment));
    }
    dot.push_str("digraph {\n");

    for (kind, attrs) in [
        ("graph", &style.graph_attrs),
        ("node", &style.node_attrs),
        ("edge", &style.edge_attrs),
    ] {
        if !attrs.is_empty() {
            dot.push_str(&format!("\t{} [{}]\n", kind, format_attrs(attrs)));
        }
    }

    let mut seen_labels = HashSet::new();
    for (key, image) in graph.to_node_list() {
        if !seen_labels.insert(key.label()) {
            warn!("Label '{}' is shared by several pages, last one: {}", key.label(), key);
        }
        let mut attrs = vec![attr("label", key.label())];
        if let Some(image) = image {
            attrs.push(("image".to_string(), image.display().to_string()));
        }
        dot.push_str(&format!("\t{} [{}]\n", quote(key.label()), format_attrs(&attrs)));
    }

    for (source, target) in graph.to_edge_list() {
        dot.push_str(&format!(
            "\t{} -> {}\n",
            quote(source.label()),
            quote(target.label())
        ));
    }

    dot.push_str("}\n");
    dot
}

fn format_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Double-quoted DOT identifier.
pub fn quote(id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
