//! Field-tree parsing.
//!
//! A field tree is an XML document rooted at `<PreferenceScreen>`. Every
//! element may carry `title`, `summary` and `keywords` attributes, with or
//! without a namespace prefix.

use crate::{PrefSearchError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const ROOT_ELEMENT: &str = "PreferenceScreen";

/// Searchable attributes of one element, as written in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNode {
    pub element: String,
    pub depth: usize,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<String>,
}

/// A parsed field tree: the root screen and its descendants in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTree {
    pub root: FieldNode,
    pub descendants: Vec<FieldNode>,
}

impl FieldTree {
    /// Root first, then every descendant depth-first.
    pub fn nodes(&self) -> impl Iterator<Item = &FieldNode> {
        std::iter::once(&self.root).chain(self.descendants.iter())
    }
}

fn read_node(resource: &str, start: &BytesStart, depth: usize) -> Result<FieldNode> {
    let mut node = FieldNode {
        element: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        depth,
        ..Default::default()
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| PrefSearchError::parse(resource, e.to_string()))?;
        let slot = match attr.key.local_name().as_ref() {
            b"title" => &mut node.title,
            b"summary" => &mut node.summary,
            b"keywords" => &mut node.keywords,
            _ => continue,
        };
        let value = attr
            .unescape_value()
            .map_err(|e| PrefSearchError::parse(resource, e.to_string()))?;
        *slot = Some(value.into_owned());
    }

    Ok(node)
}

/// Parse the XML text of the field tree named `resource`.
pub fn parse_field_tree(resource: &str, xml: &str) -> Result<FieldTree> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root: Option<FieldNode> = None;
    let mut descendants = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            PrefSearchError::parse(
                resource,
                format!("{} at byte {}", e, reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let node = read_node(resource, e, depth)?;

                if root.is_none() {
                    if node.element != ROOT_ELEMENT {
                        return Err(PrefSearchError::parse(
                            resource,
                            format!(
                                "document must start with <{}>, found <{}>",
                                ROOT_ELEMENT, node.element
                            ),
                        ));
                    }
                    root = Some(node);
                } else {
                    descendants.push(node);
                }

                if !is_empty {
                    depth += 1;
                } else if depth == 0 {
                    break;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                if depth > 0 {
                    return Err(PrefSearchError::parse(
                        resource,
                        format!("unexpected end of document, {} element(s) still open", depth),
                    ));
                }
                break;
            }
            _ => {}
        }
    }

    let root = root.ok_or_else(|| PrefSearchError::parse(resource, "document has no elements"))?;
    Ok(FieldTree { root, descendants })
}
