//! JSON schema synthesis from Python type hints.
//!
//! Converts the annotations of a [`PyFunction`] into a JSON-schema-shaped
//! mapping from parameter name to [`TypeSchema`]. Descriptions are left
//! blank here; the reconciler fills them in from the docstring.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::python::{find_matching, split_top_level, ParameterKind, PyFunction};

/// Reserved property key carrying the return-value schema.
pub const RETURN_KEY: &str = "return";

/// A JSON schema primitive type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
    Any,
}

impl JsonType {
    /// The JSON schema name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Array => "array",
            JsonType::Object => "object",
            JsonType::Null => "null",
            JsonType::Any => "any",
        }
    }
}

/// The `type` field of a schema: one type or a union of several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(JsonType),
    Union(Vec<JsonType>),
}

/// Schema of one parameter or return value.
///
/// A schema with no fields set serializes as the empty object `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSchema {
    /// The value's type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Allowed values, in order.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Element schema of an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<TypeSchema>>,

    /// Value schema of an object used as a mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<TypeSchema>>,

    /// Whether `null` is accepted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
}

impl TypeSchema {
    /// Create a schema of a single type.
    pub fn of(kind: JsonType) -> Self {
        Self {
            kind: Some(SchemaType::Single(kind)),
            ..Self::default()
        }
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn array_of(items: Option<TypeSchema>) -> Self {
        Self {
            items: items.map(Box::new),
            ..Self::of(JsonType::Array)
        }
    }

    fn mapping_of(values: Option<TypeSchema>) -> Self {
        Self {
            additional_properties: values.map(Box::new),
            ..Self::of(JsonType::Object)
        }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn single_kind(&self) -> Option<JsonType> {
        match &self.kind {
            Some(SchemaType::Single(kind)) => Some(*kind),
            _ => None,
        }
    }
}

/// The schema of a function's parameters, built from its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    /// The function name.
    pub name: String,

    /// Parameter schemas in declaration order, plus [`RETURN_KEY`] when the
    /// return is annotated.
    pub properties: IndexMap<String, TypeSchema>,

    /// Parameters the caller must supply.
    pub required: Vec<String>,
}

/// Build the schema of a function from its type hints.
///
/// `self` is skipped. Parameters with defaults are marked `nullable` and
/// left out of `required`.
///
/// # Errors
///
/// Returns `Error::TypeHintParsing` if a parameter has no annotation or an
/// annotation cannot be read.
pub fn function_schema(function: &PyFunction) -> Result<FunctionSchema> {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();

    for param in &function.parameters {
        if param.name == "self" {
            continue;
        }

        let annotation = param.annotation.as_deref().ok_or_else(|| {
            Error::type_hint(format!(
                "Argument {} is missing a type hint in function {}",
                param.name, function.name
            ))
        })?;
        let schema = annotation_schema(annotation).map_err(|e| {
            Error::type_hint(format!(
                "Cannot convert type hint of argument {} in function {}: {}",
                param.name, function.name, e
            ))
        })?;

        let mut schema = match param.kind {
            ParameterKind::VarPositional => TypeSchema::array_of(Some(schema)),
            ParameterKind::VarKeyword => TypeSchema::mapping_of(Some(schema)),
            _ => schema,
        };
        if param.default.is_some() {
            schema.nullable = true;
        }
        if !param.is_optional() {
            required.push(param.name.clone());
        }
        properties.insert(param.name.clone(), schema);
    }

    if let Some(annotation) = &function.return_annotation {
        let schema = annotation_schema(annotation).map_err(|e| {
            Error::type_hint(format!(
                "Cannot convert return type hint in function {}: {}",
                function.name, e
            ))
        })?;
        properties.insert(RETURN_KEY.to_string(), schema);
    }

    Ok(FunctionSchema {
        name: function.name.clone(),
        properties,
        required,
    })
}

/// Convert one annotation to a schema.
///
/// # Examples
///
/// ```
/// use docsmith_core::schema::{annotation_schema, JsonType, TypeSchema};
///
/// let schema = annotation_schema("Optional[int]").unwrap();
/// assert_eq!(schema, TypeSchema { nullable: true, ..TypeSchema::of(JsonType::Integer) });
/// ```
pub fn annotation_schema(annotation: &str) -> Result<TypeSchema> {
    let text = annotation.trim();
    if text.is_empty() {
        return Err(Error::type_hint("empty type hint"));
    }

    if let Some(inner) = unquote(text) {
        return annotation_schema(inner);
    }

    let members = split_top_level(text, '|');
    if members.len() > 1 {
        return union_schema(&members);
    }

    match text.find('[') {
        Some(open) => {
            let close = find_matching(text, open)
                .filter(|close| *close == text.len() - 1)
                .ok_or_else(|| Error::type_hint(format!("unbalanced brackets in '{}'", text)))?;
            let args: Vec<&str> = split_top_level(&text[open + 1..close], ',')
                .into_iter()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            subscript_schema(base_name(&text[..open])?, &args)
        }
        None => name_schema(base_name(text)?),
    }
}

fn unquote(text: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        text.strip_prefix(q)
            .and_then(|t| t.strip_suffix(q))
            .filter(|_| text.len() >= 2)
    })
}

/// Last dotted segment, so `typing.List` and `t.Any` read as `List` and `Any`.
fn base_name(text: &str) -> Result<&str> {
    let name = text.trim().rsplit('.').next().unwrap_or_default();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(Error::type_hint(format!("unsupported type hint '{}'", text)));
    }
    Ok(name)
}

fn name_schema(name: &str) -> Result<TypeSchema> {
    let kind = match name {
        "int" => JsonType::Integer,
        "float" => JsonType::Number,
        "str" | "bytes" => JsonType::String,
        "bool" => JsonType::Boolean,
        "None" | "NoneType" => JsonType::Null,
        "Any" => JsonType::Any,
        n if is_array_name(n) => JsonType::Array,
        _ => JsonType::Object,
    };
    Ok(TypeSchema::of(kind))
}

fn is_array_name(name: &str) -> bool {
    matches!(
        name,
        "list" | "List" | "tuple" | "Tuple" | "set" | "Set" | "frozenset" | "FrozenSet"
            | "Sequence" | "Iterable" | "Iterator"
    )
}

fn is_mapping_name(name: &str) -> bool {
    matches!(
        name,
        "dict" | "Dict" | "Mapping" | "MutableMapping" | "OrderedDict" | "defaultdict"
    )
}

fn subscript_schema(base: &str, args: &[&str]) -> Result<TypeSchema> {
    match base {
        "Optional" => match args {
            [inner] => Ok(annotation_schema(inner)?.nullable()),
            _ => Err(Error::type_hint("Optional takes exactly one argument")),
        },
        "Union" => union_schema(args),
        "Annotated" => match args.first() {
            Some(inner) => annotation_schema(inner),
            None => Err(Error::type_hint("Annotated needs a type argument")),
        },
        "Literal" => literal_schema(args),
        name if is_array_name(name) => {
            let items = args
                .iter()
                .filter(|a| **a != "...")
                .map(|a| annotation_schema(a))
                .collect::<Result<Vec<_>>>()?;
            let uniform = match items.split_first() {
                Some((first, rest)) if rest.iter().all(|i| i == first) => Some(first.clone()),
                _ => None,
            };
            Ok(TypeSchema::array_of(uniform))
        }
        name if is_mapping_name(name) => match args {
            [_, value] => Ok(TypeSchema::mapping_of(Some(annotation_schema(value)?))),
            _ => Ok(TypeSchema::mapping_of(None)),
        },
        _ => Ok(TypeSchema::of(JsonType::Object)),
    }
}

fn union_schema(members: &[&str]) -> Result<TypeSchema> {
    let schemas = members
        .iter()
        .map(|m| annotation_schema(m))
        .collect::<Result<Vec<_>>>()?;

    let has_null = schemas
        .iter()
        .any(|s| s.single_kind() == Some(JsonType::Null));
    let others: Vec<TypeSchema> = schemas
        .into_iter()
        .filter(|s| s.single_kind() != Some(JsonType::Null))
        .collect();

    let mut schema = match others.as_slice() {
        [] => return Ok(TypeSchema::of(JsonType::Null)),
        [single] => single.clone(),
        many => {
            let mut kinds: Vec<JsonType> = Vec::new();
            for s in many {
                let member_kinds = match &s.kind {
                    Some(SchemaType::Single(kind)) => vec![*kind],
                    Some(SchemaType::Union(kinds)) => kinds.clone(),
                    None => vec![],
                };
                for kind in member_kinds {
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
            }
            TypeSchema {
                kind: Some(SchemaType::Union(kinds)),
                ..TypeSchema::default()
            }
        }
    };
    schema.nullable |= has_null;
    Ok(schema)
}

fn literal_schema(args: &[&str]) -> Result<TypeSchema> {
    let first = args
        .first()
        .ok_or_else(|| Error::type_hint("Literal needs at least one value"))?;

    let kind = if unquote(first).is_some() {
        JsonType::String
    } else if first.parse::<i64>().is_ok() {
        JsonType::Integer
    } else if first.parse::<f64>().is_ok() {
        JsonType::Number
    } else if matches!(*first, "True" | "False") {
        JsonType::Boolean
    } else {
        JsonType::String
    };

    Ok(TypeSchema {
        enum_values: Some(
            args.iter()
                .map(|a| unquote(a).unwrap_or(*a).to_string())
                .collect(),
        ),
        ..TypeSchema::of(kind)
    })
}
