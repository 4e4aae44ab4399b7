//! Built-in actions.
//!
//! Configuration objects hold plain data, so actions that deal with the
//! filesystem yield paths rather than handles: [`OpenFile`] opens the file
//! in the requested mode (creating or truncating it as the mode says) and
//! returns the path it opened.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::{Action, CapabilityError, Constructor, map_scalars};
use crate::invocation::{Arguments, json_kind};
use crate::tags::parse_bool;

/// Target type of [`Convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Integer,
    Float,
    String,
    Boolean,
}

impl Dtype {
    pub fn name(self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::Float => "float",
            Self::String => "str",
            Self::Boolean => "bool",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "int" | "integer" => Self::Integer,
            "float" | "number" => Self::Float,
            "str" | "string" => Self::String,
            "bool" | "boolean" => Self::Boolean,
            _ => return None,
        })
    }
}

/// Converts a value, or each element of a sequence, to another type.
#[derive(Debug, Clone, Copy)]
pub struct Convert {
    pub dtype: Dtype,
}

impl Action for Convert {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
        let dtype = self.dtype;
        map_scalars(value, &|item: Value| convert(item, dtype))
    }
}

fn convert(value: Value, dtype: Dtype) -> Result<Value, CapabilityError> {
    let fail = |value: &Value| {
        CapabilityError::failed(format!("cannot convert {value} to {}", dtype.name()))
    };
    match (dtype, &value) {
        (Dtype::String, Value::String(_)) | (Dtype::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (Dtype::String, Value::Null) => Err(fail(&value)),
        (Dtype::String, other) => Ok(Value::String(other.to_string())),

        (Dtype::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(Value::from)
            .ok_or_else(|| fail(&value)),
        (Dtype::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().map(Value::from).map_err(|_| fail(&value))
        }
        (Dtype::Integer, Value::Bool(b)) => Ok(Value::from(i64::from(*b))),

        (Dtype::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| fail(&value)),
        (Dtype::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| fail(&value)),
        (Dtype::Float, Value::Bool(b)) => Ok(Value::from(if *b { 1.0 } else { 0.0 })),

        (Dtype::Boolean, Value::Number(n)) => Ok(Value::Bool(n.as_f64() != Some(0.0))),
        (Dtype::Boolean, Value::String(s)) => {
            parse_bool(s).map(Value::Bool).ok_or_else(|| fail(&value))
        }
        (Dtype::Boolean, Value::Null) => Ok(Value::Bool(false)),

        _ => Err(fail(&value)),
    }
}

/// Replaces the value with a fixed one.
#[derive(Debug, Clone)]
pub struct SetValue {
    pub value: Value,
}

impl Action for SetValue {
    fn apply(&self, _: Value) -> Result<Value, CapabilityError> {
        Ok(self.value.clone())
    }
}

/// Opens each path in the given mode and yields the path.
#[derive(Debug, Clone)]
pub struct OpenFile {
    options: OpenOptions,
}

impl OpenFile {
    /// Builds the open options of an `fopen`-style mode string
    /// (`r`, `w`, `a`, `x`, optionally with `+`, `b`, `t`).
    pub fn with_mode(mode: &str) -> Result<Self, CapabilityError> {
        let invalid =
            || CapabilityError::invalid_arguments("OpenFile", format!("invalid mode '{mode}'"));
        let mut options = OpenOptions::new();
        let mut primary = None;
        for c in mode.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' if primary.is_none() => primary = Some(c),
                '+' => {
                    options.read(true).write(true);
                }
                'b' | 't' => {}
                _ => return Err(invalid()),
            }
        }
        match primary.ok_or_else(invalid)? {
            'r' => options.read(true),
            'w' => options.write(true).create(true).truncate(true),
            'a' => options.append(true).create(true),
            _ => options.write(true).create_new(true),
        };
        Ok(Self { options })
    }
}

impl Action for OpenFile {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
        map_scalars(value, &|item: Value| {
            let path = expect_path(&item)?;
            self.options.open(path).map_err(|source| CapabilityError::Io {
                path: path.to_string(),
                source,
            })?;
            Ok(item)
        })
    }
}

/// Creates each directory (and its parents) if absent.
#[derive(Debug, Clone, Copy)]
pub struct MakeDir {
    pub mode: u32,
    pub exist_ok: bool,
}

impl Default for MakeDir {
    fn default() -> Self {
        Self {
            mode: 0o777,
            exist_ok: true,
        }
    }
}

impl Action for MakeDir {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
        map_scalars(value, &|item: Value| {
            let path = expect_path(&item)?;
            let io_error = |source| CapabilityError::Io {
                path: path.to_string(),
                source,
            };
            let target = Path::new(path);
            if target.exists() {
                if self.exist_ok && target.is_dir() {
                    return Ok(item);
                }
                let exists = std::io::Error::from(std::io::ErrorKind::AlreadyExists);
                return Err(io_error(exists));
            }

            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(self.mode);
            }
            builder.create(path).map_err(io_error)?;
            Ok(item)
        })
    }
}

/// Wraps a non-sequence value into a one-element sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeList;

impl Action for MakeList {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
        Ok(match value {
            Value::Array(_) => value,
            other => Value::Array(vec![other]),
        })
    }
}

/// Wraps a non-mapping value into a one-entry mapping under `key`.
#[derive(Debug, Clone)]
pub struct MakeDict {
    pub key: String,
}

impl Action for MakeDict {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
        Ok(match value {
            Value::Object(_) => value,
            other => {
                let mut map = Map::new();
                map.insert(self.key.clone(), other);
                Value::Object(map)
            }
        })
    }
}

fn expect_path(value: &Value) -> Result<&str, CapabilityError> {
    value.as_str().ok_or_else(|| {
        CapabilityError::failed(format!("expected a path, got {}", json_kind(value)))
    })
}

fn convert_ctor(args: &Arguments) -> Result<Box<dyn Action>, CapabilityError> {
    args.expect_params("Convert", &["dtype"])?;
    let raw = args.required("Convert", 0, "dtype")?;
    let dtype = raw.as_str().and_then(Dtype::parse).ok_or_else(|| {
        CapabilityError::invalid_arguments("Convert", format!("unknown dtype {raw}"))
    })?;
    Ok(Box::new(Convert { dtype }))
}

fn set_value_ctor(args: &Arguments) -> Result<Box<dyn Action>, CapabilityError> {
    args.expect_params("SetValue", &["value"])?;
    let value = args.required("SetValue", 0, "value")?.clone();
    Ok(Box::new(SetValue { value }))
}

fn fixed_ctor(name: &'static str, value: bool) -> Constructor<dyn Action> {
    Arc::new(move |args: &Arguments| {
        args.expect_params(name, &[])?;
        Ok(Box::new(SetValue {
            value: Value::Bool(value),
        }) as Box<dyn Action>)
    })
}

fn open_file_ctor(args: &Arguments) -> Result<Box<dyn Action>, CapabilityError> {
    args.expect_params("OpenFile", &["mode"])?;
    let mode = match args.param(0, "mode") {
        None => "r",
        Some(Value::String(mode)) => mode.as_str(),
        Some(other) => {
            return Err(CapabilityError::invalid_arguments(
                "OpenFile",
                format!("mode must be a string, got {}", json_kind(other)),
            ));
        }
    };
    Ok(Box::new(OpenFile::with_mode(mode)?))
}

fn make_dir_ctor(args: &Arguments) -> Result<Box<dyn Action>, CapabilityError> {
    args.expect_params("MakeDir", &["mode", "exist_ok"])?;
    let mut action = MakeDir::default();
    if let Some(mode) = args.param(0, "mode") {
        action.mode = mode
            .as_u64()
            .and_then(|m| u32::try_from(m).ok())
            .ok_or_else(|| {
                CapabilityError::invalid_arguments("MakeDir", "mode must be an integer")
            })?;
    }
    if let Some(exist_ok) = args.param(1, "exist_ok") {
        action.exist_ok = exist_ok
            .as_bool()
            .ok_or_else(|| {
                CapabilityError::invalid_arguments("MakeDir", "exist_ok must be a boolean")
            })?;
    }
    Ok(Box::new(action))
}

fn make_list_ctor(name: &'static str) -> Constructor<dyn Action> {
    Arc::new(move |args: &Arguments| {
        args.expect_params(name, &[])?;
        Ok(Box::new(MakeList) as Box<dyn Action>)
    })
}

fn make_dict_ctor(args: &Arguments) -> Result<Box<dyn Action>, CapabilityError> {
    args.expect_params("MakeDict", &["key"])?;
    let key = match args.required("MakeDict", 0, "key")? {
        Value::String(key) => key.clone(),
        Value::Null => {
            return Err(CapabilityError::invalid_arguments("MakeDict", "key cannot be null"));
        }
        other => other.to_string(),
    };
    Ok(Box::new(MakeDict { key }))
}

pub(crate) fn builtins() -> Vec<(&'static str, Constructor<dyn Action>)> {
    let convert: Constructor<dyn Action> = Arc::new(convert_ctor);
    let set_value: Constructor<dyn Action> = Arc::new(set_value_ctor);
    let open_file: Constructor<dyn Action> = Arc::new(open_file_ctor);
    let make_dir: Constructor<dyn Action> = Arc::new(make_dir_ctor);
    let make_dict: Constructor<dyn Action> = Arc::new(make_dict_ctor);
    vec![
        ("Convert", convert),
        ("SetValue", set_value),
        ("SetTrue", fixed_ctor("SetTrue", true)),
        ("SetFalse", fixed_ctor("SetFalse", false)),
        ("OpenFile", open_file),
        ("MakeDir", make_dir),
        ("MakeList", make_list_ctor("MakeList")),
        // sequences stand in for tuples
        ("MakeTuple", make_list_ctor("MakeTuple")),
        ("MakeDict", make_dict),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Invocation;
    use crate::capability::Capabilities;

    fn action(name: &str, arguments: Arguments) -> Box<dyn Action> {
        Capabilities::builtin()
            .actions
            .instantiate(&Invocation::named(name).with_arguments(arguments))
            .unwrap()
    }

    fn positional(values: Vec<Value>) -> Arguments {
        Arguments::Positional(values)
    }

    #[test]
    fn test_convert_scalars_and_sequences() {
        let to_int = action("Convert", positional(vec![json!("int")]));
        assert_eq!(to_int.apply(json!("12")).unwrap(), json!(12));
        assert_eq!(to_int.apply(json!(3.9)).unwrap(), json!(3));
        assert_eq!(to_int.apply(json!(["1", "2"])).unwrap(), json!([1, 2]));
        assert!(to_int.apply(json!("x")).is_err());

        let to_str = action("Convert", positional(vec![json!("str")]));
        assert_eq!(to_str.apply(json!(1.5)).unwrap(), json!("1.5"));

        let to_bool = action("Convert", positional(vec![json!("bool")]));
        assert_eq!(to_bool.apply(json!("no")).unwrap(), json!(false));
        assert_eq!(to_bool.apply(json!(2)).unwrap(), json!(true));
    }

    #[test]
    fn test_convert_requires_known_dtype() {
        let caps = Capabilities::builtin();
        let bad = Invocation::named("Convert").with_arguments(positional(vec![json!("complex")]));
        assert!(caps.actions.instantiate(&bad).is_err());
        assert!(caps.actions.instantiate(&Invocation::named("Convert")).is_err());
    }

    #[test]
    fn test_set_value_variants() {
        let set = action(
            "SetValue",
            Arguments::Keyword(json!({"value": [1, 2]}).as_object().unwrap().clone()),
        );
        assert_eq!(set.apply(json!("ignored")).unwrap(), json!([1, 2]));
        assert_eq!(action("SetTrue", Arguments::None).apply(json!(false)).unwrap(), json!(true));
        assert_eq!(action("SetFalse", Arguments::None).apply(json!(true)).unwrap(), json!(false));
    }

    #[test]
    fn test_reshaping_actions() {
        assert_eq!(action("MakeList", Arguments::None).apply(json!(1)).unwrap(), json!([1]));
        assert_eq!(action("MakeList", Arguments::None).apply(json!([1])).unwrap(), json!([1]));
        assert_eq!(action("MakeTuple", Arguments::None).apply(json!("a")).unwrap(), json!(["a"]));

        let dict = action("MakeDict", positional(vec![json!("path")]));
        assert_eq!(dict.apply(json!("x")).unwrap(), json!({"path": "x"}));
        assert_eq!(dict.apply(json!({"k": 1})).unwrap(), json!({"k": 1}));
    }

    #[test]
    fn test_make_dir_creates_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("a/b/c");
        let value = json!(target.to_str().unwrap());

        let make_dir = action("MakeDir", Arguments::None);
        assert_eq!(make_dir.apply(value.clone()).unwrap(), value);
        assert!(target.is_dir());
        // exist_ok defaults to true
        assert!(make_dir.apply(value.clone()).is_ok());

        let strict = action(
            "MakeDir",
            Arguments::Keyword(json!({"exist_ok": false}).as_object().unwrap().clone()),
        );
        assert!(strict.apply(value).is_err());
    }

    #[test]
    fn test_make_dir_rejects_existing_regular_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain.txt");
        std::fs::write(&file, "data").unwrap();

        let err = MakeDir::default().apply(json!(file.to_str().unwrap())).unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::Io { ref source, .. }
                if source.kind() == std::io::ErrorKind::AlreadyExists
        ));
        assert!(file.is_file());
    }

    #[test]
    fn test_open_file_modes() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("out.txt");
        let value = json!(path.to_str().unwrap());

        let read = action("OpenFile", Arguments::None);
        assert!(matches!(read.apply(value.clone()), Err(CapabilityError::Io { .. })));

        let write = action("OpenFile", positional(vec![json!("w")]));
        assert_eq!(write.apply(value.clone()).unwrap(), value);
        assert!(path.is_file());
        assert!(read.apply(value).is_ok());

        assert!(OpenFile::with_mode("q").is_err());
        assert!(OpenFile::with_mode("rw").is_err());
        assert!(OpenFile::with_mode("a+b").is_ok());
    }
}
