use super::{
    Direction, FieldDescriptor, FieldKind, FieldPath, LineSchema, Scalar, SchemaMeta, Segment,
};
use crate::error::SchemaCompileError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)((?:\[\])*)$").expect("valid segment regex")
});

static KEY_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid attribute key regex")
});

const FLAGS: &[&str] = &["required"];

pub(super) fn parse_fullname(fullname: &str) -> Option<FieldPath> {
    if fullname.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for part in fullname.split('.') {
        let caps = SEGMENT_RE.captures(part)?;
        segments.push(Segment::Key(caps[1].to_string()));
        let brackets = caps.get(2).map_or(0, |m| m.as_str().len() / 2);
        segments.extend(std::iter::repeat(Segment::Each).take(brackets));
    }
    Some(FieldPath::from_segments(segments))
}

/// Split one line into ordered `(key, value)` attributes; bare flags carry `None`.
fn tokenize(line: &str) -> Vec<(String, Option<String>)> {
    let mut attrs: Vec<(String, Option<String>)> = Vec::new();
    for token in line.split(',') {
        let trimmed = token.trim();
        if let Some((key, value)) = trimmed.split_once('=') {
            if KEY_RE.is_match(key.trim()) {
                attrs.push((key.trim().to_string(), Some(value.trim().to_string())));
                continue;
            }
        }
        if FLAGS.contains(&trimmed) {
            attrs.push((trimmed.to_string(), None));
            continue;
        }
        // continuation of the previous value
        match attrs.last_mut() {
            Some((_, Some(prev))) => {
                prev.push(',');
                prev.push_str(trimmed);
            }
            _ if trimmed.is_empty() => {}
            _ => attrs.push((trimmed.to_string(), None)),
        }
    }
    attrs
}

fn err(line: usize, message: impl Into<String>) -> SchemaCompileError {
    SchemaCompileError::Parse {
        line,
        message: message.into(),
    }
}

/// `format` values that are not scalar names but are asserted by the validator.
const STRING_FORMATS: &[&str] = &[
    "date-time",
    "date",
    "time",
    "duration",
    "email",
    "idn-email",
    "hostname",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "uri",
    "uri-reference",
    "iri",
    "iri-reference",
    "uri-template",
    "uuid",
    "json-pointer",
    "relative-json-pointer",
    "regex",
];

fn resolve_kind(
    line: usize,
    ty: Option<&str>,
    format: Option<&str>,
) -> Result<(FieldKind, Option<String>), SchemaCompileError> {
    let format_scalar = format.and_then(Scalar::from_name);
    let string_format = match (format, format_scalar) {
        (Some(f), None) if !f.is_empty() => {
            if !STRING_FORMATS.contains(&f) {
                return Err(err(line, format!("unknown format `{f}`")));
            }
            Some(f.to_string())
        }
        _ => None,
    };
    let kind = match ty.map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("string") => match format_scalar {
            Some(scalar) => FieldKind::Scalar(scalar),
            None => FieldKind::Scalar(Scalar::String),
        },
        Some("array") => FieldKind::Array(format_scalar),
        Some("object") => FieldKind::Object,
        Some(other) => match Scalar::from_name(other) {
            Some(scalar) => FieldKind::Scalar(scalar),
            None => return Err(err(line, format!("unknown type `{other}`"))),
        },
    };
    Ok((kind, string_format))
}

fn parse_meta(attrs: Vec<(String, Option<String>)>, line: usize) -> Result<SchemaMeta, SchemaCompileError> {
    let mut meta = SchemaMeta::default();
    for (key, value) in attrs {
        let value = value.unwrap_or_default();
        match key.as_str() {
            "version" => meta.version = Some(value),
            "id" => meta.id = Some(value),
            "direction" => {
                meta.direction = Some(
                    Direction::parse(&value)
                        .ok_or_else(|| err(line, format!("unknown direction `{value}`")))?,
                );
            }
            _ => {}
        }
    }
    Ok(meta)
}

fn parse_field(
    attrs: Vec<(String, Option<String>)>,
    line: usize,
) -> Result<FieldDescriptor, SchemaCompileError> {
    let mut fullname = None;
    let mut ty = None;
    let mut format = None;
    let mut required = false;
    let mut default = None;
    let mut example = None;
    let mut description = None;
    let mut title = None;
    let mut comment = None;
    let mut enum_raw = None;
    let mut src = None;
    let mut dst = None;
    let mut extra = BTreeMap::new();

    for (key, value) in attrs {
        match (key.as_str(), value) {
            ("required", None) => required = true,
            ("required", Some(v)) => {
                required = match v.as_str() {
                    "" | "true" => true,
                    "false" => false,
                    other => return Err(err(line, format!("invalid required value `{other}`"))),
                }
            }
            ("fullname", Some(v)) => fullname = Some(v),
            ("type", Some(v)) => ty = Some(v),
            ("format", Some(v)) => format = Some(v),
            ("default", Some(v)) => default = Some(v),
            ("example", Some(v)) => example = Some(v),
            ("description", Some(v)) => description = Some(v),
            ("title", Some(v)) => title = Some(v),
            ("comment", Some(v)) => comment = Some(v),
            ("enum", Some(v)) => enum_raw = Some(v),
            ("src", Some(v)) => src = Some(v),
            ("dst", Some(v)) => dst = Some(v),
            (other, Some(v)) => {
                extra.insert(other.to_string(), v);
            }
            (other, None) => return Err(err(line, format!("unexpected token `{other}`"))),
        }
    }

    let fullname = fullname.ok_or_else(|| err(line, "missing fullname"))?;
    let path = parse_fullname(&fullname)
        .ok_or_else(|| err(line, format!("malformed fullname `{fullname}`")))?;
    let (kind, string_format) = resolve_kind(line, ty.as_deref(), format.as_deref())?;

    let enum_values = match enum_raw {
        None => None,
        Some(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(values)) if !values.is_empty() => Some(values),
            _ => return Err(err(line, format!("enum must be a non-empty JSON array, got `{raw}`"))),
        },
    };

    Ok(FieldDescriptor {
        fullname,
        path,
        kind,
        required,
        default,
        example,
        description,
        title,
        comment,
        format: string_format,
        enum_values,
        src,
        dst,
        extra,
        line,
    })
}

pub(super) fn parse_document(text: &str) -> Result<LineSchema, SchemaCompileError> {
    let mut schema = LineSchema::default();
    let mut seen_meta = false;
    let mut seen_names = HashSet::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let attrs = tokenize(line);
        let is_field = attrs.iter().any(|(k, _)| k == "fullname");
        if !is_field {
            if seen_meta {
                return Err(err(line_no, "more than one meta line"));
            }
            seen_meta = true;
            schema.meta = parse_meta(attrs, line_no)?;
            continue;
        }
        let field = parse_field(attrs, line_no)?;
        if !seen_names.insert(field.path.clone()) {
            return Err(err(line_no, format!("field `{}` declared twice", field.fullname)));
        }
        schema.fields.push(field);
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AD_LIST_IN: &str = r#"
        version=http://json-schema.org/draft-07/schema#,id=in,direction=in
        fullname=title,required,description=ad title,comment=ad title,example=promo
        fullname=index,required,format=int,description=page index,0 based,default=0
        fullname=size,required,format=int,description=page size,default=10
        fullname=tags,type=array,format=int
    "#;

    #[test]
    fn test_parse_meta_line() {
        let schema = parse_document(AD_LIST_IN).unwrap();
        assert_eq!(
            schema.meta.version.as_deref(),
            Some("http://json-schema.org/draft-07/schema#")
        );
        assert_eq!(schema.meta.id.as_deref(), Some("in"));
        assert_eq!(schema.meta.direction, Some(Direction::In));
        assert_eq!(schema.fields.len(), 4);
    }

    #[test]
    fn test_description_keeps_commas() {
        let schema = parse_document(AD_LIST_IN).unwrap();
        let index = schema.field("index").unwrap();
        assert_eq!(index.description.as_deref(), Some("page index,0 based"));
        assert_eq!(index.default.as_deref(), Some("0"));
        assert_eq!(index.kind, FieldKind::Scalar(Scalar::Int));
        assert!(index.required);
        assert_eq!(index.line, 4);
    }

    #[test]
    fn test_array_with_scalar_format() {
        let schema = parse_document(AD_LIST_IN).unwrap();
        assert_eq!(schema.field("tags").unwrap().kind, FieldKind::Array(Some(Scalar::Int)));
    }

    #[test]
    fn test_enum_literal_survives_comma_split() {
        let schema = parse_document(r#"fullname=kind,enum=["text","image"],required"#).unwrap();
        let field = schema.field("kind").unwrap();
        assert_eq!(field.enum_values, Some(vec![json!("text"), json!("image")]));
        assert!(field.required);
    }

    #[test]
    fn test_string_format_is_kept_on_string_field() {
        let schema = parse_document("fullname=beginAt,format=date-time").unwrap();
        let field = schema.field("beginAt").unwrap();
        assert_eq!(field.kind, FieldKind::Scalar(Scalar::String));
        assert_eq!(field.format.as_deref(), Some("date-time"));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = parse_document("fullname=a\nfullname=price,format=decimal").unwrap_err();
        assert_eq!(
            err,
            SchemaCompileError::Parse {
                line: 2,
                message: "unknown format `decimal`".into()
            }
        );
    }

    #[test]
    fn test_unknown_attributes_are_preserved() {
        let schema = parse_document("fullname=a,allowEmptyValue=true").unwrap();
        let field = schema.field("a").unwrap();
        assert_eq!(field.extra.get("allowEmptyValue").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_document("fullname=a\nfullname=b,type=decimal").unwrap_err();
        assert_eq!(
            err,
            SchemaCompileError::Parse {
                line: 2,
                message: "unknown type `decimal`".into()
            }
        );
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let err = parse_document("fullname=a\nfullname=a,format=int").unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_malformed_fullname_is_rejected() {
        let err = parse_document("fullname=items[.id").unwrap_err();
        assert!(err.to_string().contains("malformed fullname"));
    }

    #[test]
    fn test_second_meta_line_is_rejected() {
        let err = parse_document("id=in\nid=out").unwrap_err();
        assert!(err.to_string().contains("more than one meta line"));
    }

    #[test]
    fn test_blank_text_is_empty_schema() {
        let schema = parse_document("  \n\t\n").unwrap();
        assert!(schema.is_empty());
        assert_eq!(schema.meta, SchemaMeta::default());
    }

    #[test]
    fn test_nested_array_segments() {
        let path = parse_fullname("items[].tags[]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("items".into()),
                Segment::Each,
                Segment::Key("tags".into()),
                Segment::Each
            ]
        );
    }
}
