//! Locating JSON structures inside free-form model text.
//!
//! Structured replies are requested as bare JSON, but models still wrap them
//! in code fences or commentary now and then. These helpers find every
//! balanced object/array (ignoring brackets inside strings) so a typed decode
//! can be attempted on each.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Coordinates of a JSON structure within a larger text, including nested children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjCoords {
    pub start: usize,
    pub end: usize, // inclusive index of the closing bracket/brace
    pub kind: NodeType,
    pub children: Vec<ObjCoords>,
}

impl ObjCoords {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..=self.end]
    }
}

#[derive(Debug)]
struct Frame {
    start: usize,
    kind: NodeType,
    children: Vec<ObjCoords>,
}

/// Find all root JSON object/array structures in the text. Coordinates are byte indices.
#[instrument(target = "lumina_tutor::json", skip(text), fields(len = text.len()))]
pub fn find_json_structures(text: &str) -> Vec<ObjCoords> {
    let mut results: Vec<ObjCoords> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        let kind = match b {
            b'"' => {
                in_string = true;
                continue;
            }
            b'{' => {
                stack.push(Frame { start: i, kind: NodeType::Object, children: Vec::new() });
                continue;
            }
            b'[' => {
                stack.push(Frame { start: i, kind: NodeType::Array, children: Vec::new() });
                continue;
            }
            b'}' => NodeType::Object,
            b']' => NodeType::Array,
            _ => continue,
        };

        // Closing bracket: only a matching frame forms a node
        if let Some(frame) = stack.pop() {
            if frame.kind == kind {
                let node = ObjCoords { start: frame.start, end: i, kind, children: frame.children };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => results.push(node),
                }
            }
        }
    }

    debug!(target: "lumina_tutor::json", count = results.len(), "found root structures");
    results
}

/// Extract all occurrences of `T` from a response string.
///
/// If the whole string parses as `Vec<T>` that is returned. Otherwise every
/// structure is tried as `Vec<T>`, then as `T`, descending into children when
/// neither matches. Results keep discovery order.
#[instrument(target = "lumina_tutor::json", skip(text))]
pub fn extract_all<T: DeserializeOwned>(text: &str) -> Vec<T> {
    if let Ok(v) = serde_json::from_str::<Vec<T>>(text) {
        return v;
    }

    fn collect_from_node<T: DeserializeOwned>(text: &str, node: &ObjCoords, out: &mut Vec<T>) {
        let s = node.slice(text);
        if let Ok(vs) = serde_json::from_str::<Vec<T>>(s) {
            out.extend(vs);
            return;
        }
        if let Ok(v) = serde_json::from_str::<T>(s) {
            out.push(v);
            return;
        }
        for child in &node.children {
            collect_from_node::<T>(text, child, out);
        }
    }

    let mut out: Vec<T> = Vec::new();
    for node in &find_json_structures(text) {
        collect_from_node::<T>(text, node, &mut out);
    }
    out
}

/// First `T` found in the text, trying a direct parse before scanning.
pub fn extract_first<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str::<T>(text.trim()) {
        return Some(v);
    }
    extract_all::<T>(text).into_iter().next()
}
