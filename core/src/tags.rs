//! Tag compiler: maps command-line tags to configuration paths.
//!
//! Every scalar or array property of the schema gets a long tag built from
//! its property path (`--group-size` for `group.size`), plus any declared
//! `x-alias` entries. Object properties do not produce tags; they only
//! extend the prefix of their children. In simple-tag mode the prefix is
//! dropped and the bare property name is used.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::schema::{CompileError, SchemaNode, SchemaType};
use crate::walk::WalkContext;

/// How a single command-line value is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    String,
    Float,
    Integer,
    Boolean,
    /// A member of an `enum`; kept as a string and checked by validation.
    Choice,
}

impl ItemKind {
    fn for_type(ty: SchemaType) -> Self {
        match ty {
            SchemaType::Number => Self::Float,
            SchemaType::Integer => Self::Integer,
            SchemaType::Boolean => Self::Boolean,
            _ => Self::String,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Choice => "choice",
        }
    }

    /// Converts one raw token.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::ItemKind;
    /// use serde_json::json;
    ///
    /// assert_eq!(ItemKind::Integer.coerce("42"), Some(json!(42)));
    /// assert_eq!(ItemKind::Boolean.coerce("yes"), Some(json!(true)));
    /// assert_eq!(ItemKind::Boolean.coerce("0"), Some(json!(false)));
    /// assert_eq!(ItemKind::Float.coerce("abc"), None);
    /// ```
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::String | Self::Choice => Some(Value::String(raw.to_string())),
            Self::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::Boolean => parse_bool(raw).map(Value::Bool),
        }
    }
}

/// Parses `true/yes/t/y`, `false/no/f/n` or an integer literal.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "t" | "y" => Some(true),
        "false" | "no" | "f" | "n" => Some(false),
        other => other.parse::<i64>().ok().map(|n| n != 0),
    }
}

/// Where a tag's values go in the configuration object, and how they are
/// converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgMapper {
    /// Canonical long tag of the property (e.g. `--group-size`).
    pub tag: String,
    /// Property names from the root to the target location.
    pub path: Vec<String>,
    pub item: ItemKind,
    /// Array properties collect every value; scalars take at most one.
    pub is_array: bool,
}

/// Flat lookup table from tag to [`ArgMapper`].
///
/// Aliases of one property share an identical mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: BTreeMap<String, ArgMapper>,
}

impl TagMap {
    pub fn get(&self, tag: &str) -> Option<&ArgMapper> {
        self.entries.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(tag, mapper)` pairs in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgMapper)> {
        self.entries.iter().map(|(tag, mapper)| (tag.as_str(), mapper))
    }

    /// Iterates over one mapper per property (its canonical tag).
    pub fn canonical(&self) -> impl Iterator<Item = &ArgMapper> {
        self.entries
            .iter()
            .filter(|(tag, mapper)| **tag == mapper.tag)
            .map(|(_, mapper)| mapper)
    }

    fn insert(&mut self, tag: String, mapper: ArgMapper) -> Result<(), CompileError> {
        if let Some(existing) = self.entries.get(&tag) {
            if existing.path != mapper.path {
                return Err(CompileError::DuplicateTag {
                    tag,
                    first: existing.path.join("."),
                    second: mapper.path.join("."),
                });
            }
            return Ok(());
        }
        self.entries.insert(tag, mapper);
        Ok(())
    }
}

/// Builds the tag map of a compiled schema tree.
///
/// [`Schema::compile`](crate::Schema::compile) calls this once; it is
/// exposed for callers that hold a bare [`SchemaNode`].
///
/// # Errors
///
/// Returns [`CompileError::DuplicateTag`] when two properties resolve to
/// the same tag.
pub fn compile_tag_map(root: &SchemaNode) -> Result<TagMap, CompileError> {
    let mut map = TagMap::default();
    visit(root, &WalkContext::root(root), &mut map)?;
    Ok(map)
}

fn visit(node: &SchemaNode, ctx: &WalkContext, map: &mut TagMap) -> Result<(), CompileError> {
    for (name, child) in &node.properties {
        let child_ctx = ctx.enter(name, child);

        if child.is_object() {
            visit(child, &child_ctx, map)?;
            continue;
        }

        let mapper = ArgMapper {
            tag: child_ctx.long_tag(),
            path: child_ctx.path.clone(),
            item: item_kind(child),
            is_array: child.is_array(),
        };
        for alias in &child.aliases {
            map.insert(alias.clone(), mapper.clone())?;
        }
        map.insert(mapper.tag.clone(), mapper)?;
    }
    Ok(())
}

fn item_kind(node: &SchemaNode) -> ItemKind {
    if node.enum_values.is_some() {
        return ItemKind::Choice;
    }
    if node.is_array() {
        return match &node.items {
            Some(items) if items.enum_values.is_some() => ItemKind::Choice,
            Some(items) => ItemKind::for_type(items.primary_type()),
            None => ItemKind::String,
        };
    }
    ItemKind::for_type(node.primary_type())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Schema;

    fn tags(raw: Value) -> TagMap {
        Schema::compile(&raw).unwrap().tag_map().clone()
    }

    #[test]
    fn test_group_property_maps_to_nested_path() {
        let map = tags(json!({
            "properties": {
                "group": {"type": "object", "properties": {"size": {"type": "integer"}}}
            }
        }));

        let mapper = map.get("--group-size").unwrap();
        assert_eq!(mapper.path, vec!["group", "size"]);
        assert_eq!(mapper.item, ItemKind::Integer);
        assert!(!mapper.is_array);
        assert!(!map.contains("--group"));
    }

    #[test]
    fn test_aliases_share_the_mapper() {
        let map = tags(json!({
            "properties": {
                "output": {"type": "string", "x-alias": ["-o", "--out"]}
            }
        }));

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("-o"), map.get("--output"));
        assert_eq!(map.get("--out").unwrap().tag, "--output");
        assert_eq!(map.canonical().count(), 1);
    }

    #[test]
    fn test_item_kinds() {
        let map = tags(json!({
            "properties": {
                "mode": {"type": "string", "enum": ["fast", "slow"]},
                "sizes": {"type": "array", "items": {"type": "number"}},
                "names": {"type": "array", "items": {"enum": ["a", "b"]}},
                "any": {},
                "flag": {"type": "boolean"}
            }
        }));

        assert_eq!(map.get("--mode").unwrap().item, ItemKind::Choice);
        assert_eq!(map.get("--sizes").unwrap().item, ItemKind::Float);
        assert!(map.get("--sizes").unwrap().is_array);
        assert_eq!(map.get("--names").unwrap().item, ItemKind::Choice);
        assert_eq!(map.get("--any").unwrap().item, ItemKind::String);
        assert_eq!(map.get("--flag").unwrap().item, ItemKind::Boolean);
    }

    #[test]
    fn test_simple_tag_mode_drops_prefix() {
        let map = tags(json!({
            "x-simpletag": true,
            "properties": {
                "io": {"type": "object", "properties": {"input": {"type": "string"}}}
            }
        }));

        assert_eq!(map.get("--input").unwrap().path, vec!["io", "input"]);
        assert!(!map.contains("--io-input"));
    }

    #[test]
    fn test_colliding_tags_are_rejected() {
        let err = Schema::compile(&json!({
            "x-simpletag": true,
            "properties": {
                "a": {"type": "object", "properties": {"name": {"type": "string"}}},
                "b": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        }))
        .unwrap_err();

        assert_eq!(
            err,
            CompileError::DuplicateTag {
                tag: "--name".to_string(),
                first: "a.name".to_string(),
                second: "b.name".to_string(),
            }
        );
    }

    #[test]
    fn test_alias_repeating_own_tag_is_collapsed() {
        let map = tags(json!({
            "properties": {"v": {"type": "boolean", "x-alias": ["--v", "-v"]}}
        }));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_compiling_twice_yields_equal_maps() {
        let raw = json!({
            "properties": {
                "a": {"type": "integer", "x-alias": "-a"},
                "b": {"type": "object", "properties": {"c": {"type": "array"}}}
            }
        });
        assert_eq!(tags(raw.clone()), tags(raw));
    }

    #[test]
    fn test_parse_bool_forms() {
        for raw in ["true", "Yes", "t", "Y", "1", "-3"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "NO", "f", "n", "0"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }
}
