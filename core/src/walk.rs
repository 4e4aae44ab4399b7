//! Immutable context threaded through recursive schema walks.
//!
//! Both the tag compiler and the help builder visit `properties`
//! depth-first and need the same inherited state: the property path, the
//! tag accumulated so far, whether simple-tag mode is active, and the
//! inherited help level. Each level derives a fresh context for its
//! children; siblings never observe each other's overrides.

use crate::schema::SchemaNode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WalkContext {
    /// Property names from the root to this node.
    pub path: Vec<String>,
    /// Tag of this node, without the leading `--`. Empty at the root.
    pub tag: String,
    pub simple_tag: bool,
    pub level: u32,
}

impl WalkContext {
    pub fn root(node: &SchemaNode) -> Self {
        Self {
            path: Vec::new(),
            tag: String::new(),
            simple_tag: node.simple_tag.unwrap_or(false),
            level: node.help_level.unwrap_or(0),
        }
    }

    /// Context of the property `name`, described by `node`, below `self`.
    pub fn enter(&self, name: &str, node: &SchemaNode) -> Self {
        let simple_tag = node.simple_tag.unwrap_or(self.simple_tag);
        let tag = if simple_tag || self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}-{name}", self.tag)
        };

        let mut path = self.path.clone();
        path.push(name.to_string());

        Self {
            path,
            tag,
            simple_tag,
            level: node.help_level.unwrap_or(self.level),
        }
    }

    /// The long-form flag of this node.
    pub fn long_tag(&self) -> String {
        format!("--{}", self.tag)
    }

    /// Dotted path, for diagnostics.
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Schema;

    #[test]
    fn test_nested_tags_are_prefixed() {
        let schema = Schema::compile(&json!({
            "properties": {
                "outer": {"type": "object", "properties": {
                    "inner": {"type": "object", "properties": {"leaf": {"type": "string"}}}
                }}
            }
        }))
        .unwrap();

        let root = WalkContext::root(schema.root());
        let outer_node = schema.root().property("outer").unwrap();
        let outer = root.enter("outer", outer_node);
        let inner_node = outer_node.property("inner").unwrap();
        let inner = outer.enter("inner", inner_node);
        let leaf = inner.enter("leaf", inner_node.property("leaf").unwrap());

        assert_eq!(leaf.long_tag(), "--outer-inner-leaf");
        assert_eq!(leaf.dotted(), "outer.inner.leaf");
    }

    #[test]
    fn test_simple_tag_and_level_do_not_leak_to_siblings() {
        let schema = Schema::compile(&json!({
            "properties": {
                "g": {"type": "object", "properties": {
                    "a": {"type": "string", "x-simpletag": true, "x-help": 3},
                    "b": {"type": "string"}
                }}
            }
        }))
        .unwrap();

        let g_node = schema.root().property("g").unwrap();
        let g = WalkContext::root(schema.root()).enter("g", g_node);
        let a = g.enter("a", g_node.property("a").unwrap());
        let b = g.enter("b", g_node.property("b").unwrap());

        assert_eq!((a.tag.as_str(), a.level), ("a", 3));
        assert_eq!((b.tag.as_str(), b.level), ("g-b", 0));
    }
}
