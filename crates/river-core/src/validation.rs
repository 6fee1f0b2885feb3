//! Test registry schema validation.
//!
//! Validation runs on the raw YAML value rather than on the typed
//! [`TestEntry`](crate::TestEntry) so that every offending field of every
//! test is reported at once, instead of stopping at the first serde error.

use serde_yaml::Value;

use crate::registry::Verdict;

/// Expected shape of a registry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// Any string.
    Str,
    /// A string with at least one non-whitespace character.
    NonEmptyStr,
    /// A sequence of strings.
    StrList,
    /// One of the verdict names.
    Verdict,
}

/// Field schema: name, kind, required.
const SCHEMA: &[(&str, FieldKind, bool)] = &[
    ("cc", FieldKind::Str, true),
    ("cc_args", FieldKind::StrList, true),
    ("linker_args", FieldKind::StrList, true),
    ("isa", FieldKind::NonEmptyStr, true),
    ("mabi", FieldKind::Str, true),
    ("march", FieldKind::Str, true),
    ("work_dir", FieldKind::NonEmptyStr, true),
    ("asm_file", FieldKind::Str, true),
    ("linker_file", FieldKind::Str, true),
    ("extra_compile", FieldKind::StrList, false),
    ("result", FieldKind::Verdict, false),
];

/// Placeholder used when an error is not tied to one test or field.
pub(crate) const ROOT: &str = "<root>";

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Test name the violation belongs to.
    pub test: String,
    /// Offending field.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl SchemaError {
    /// Creates a new schema error.
    pub fn new(
        test: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test: test.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [ {} ] : {}", self.test, self.field, self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Validates a whole registry document.
///
/// Returns every violation found; an empty vector means the document is
/// valid. Unknown fields are rejected.
pub fn validate_registry_value(value: &Value) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    let Some(mapping) = value.as_mapping() else {
        errors.push(SchemaError::new(
            ROOT,
            ROOT,
            "test list must be a mapping from test name to entry",
        ));
        return errors;
    };

    for (key, entry) in mapping {
        let Some(test) = key.as_str() else {
            errors.push(SchemaError::new(
                format!("{:?}", key),
                ROOT,
                "test name must be a string",
            ));
            continue;
        };
        if test.trim().is_empty() {
            errors.push(SchemaError::new(test, ROOT, "test name must not be empty"));
        } else if !is_plain_test_name(test) {
            errors.push(SchemaError::new(
                test,
                ROOT,
                "test name must be a single path component",
            ));
        }
        validate_entry_value(test, entry, &mut errors);
    }

    errors
}

/// Returns true if `name` can name a directory directly under another one.
///
/// Test names become directory names (`asm/<test>` on merge), so separators
/// and the `.`/`..` entries are not allowed.
pub fn is_plain_test_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Validates one test entry, appending violations to `errors`.
pub fn validate_entry_value(test: &str, entry: &Value, errors: &mut Vec<SchemaError>) {
    let Some(fields) = entry.as_mapping() else {
        errors.push(SchemaError::new(test, ROOT, "entry must be a mapping"));
        return;
    };

    for &(name, kind, required) in SCHEMA {
        match fields.get(name) {
            Some(value) => check_kind(test, name, kind, value, errors),
            None if required => errors.push(SchemaError::new(test, name, "required field")),
            None => {}
        }
    }

    for key in fields.keys() {
        let known = key
            .as_str()
            .is_some_and(|k| SCHEMA.iter().any(|(name, _, _)| *name == k));
        if !known {
            let field = key.as_str().map(str::to_string).unwrap_or_else(|| format!("{:?}", key));
            errors.push(SchemaError::new(test, field, "unknown field"));
        }
    }
}

fn check_kind(test: &str, field: &str, kind: FieldKind, value: &Value, errors: &mut Vec<SchemaError>) {
    match kind {
        FieldKind::Str => {
            if !value.is_string() {
                errors.push(SchemaError::new(test, field, "must be of string type"));
            }
        }
        FieldKind::NonEmptyStr => match value.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            Some(_) => errors.push(SchemaError::new(test, field, "must not be empty")),
            None => errors.push(SchemaError::new(test, field, "must be of string type")),
        },
        FieldKind::StrList => match value.as_sequence() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        errors.push(SchemaError::new(
                            test,
                            format!("{}[{}]", field, i),
                            "must be of string type",
                        ));
                    }
                }
            }
            None => errors.push(SchemaError::new(test, field, "must be a list of strings")),
        },
        FieldKind::Verdict => match value.as_str() {
            Some(s) if Verdict::NAMES.contains(&s) => {}
            _ => errors.push(SchemaError::new(
                test,
                field,
                format!("must be one of {}", Verdict::NAMES.join(", ")),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    const VALID: &str = r#"
add_01:
  cc: riscv64-unknown-elf-gcc
  cc_args: ["-mcmodel=medany", "-static"]
  linker_args: ["-T", "add_01.ld"]
  isa: rv64imafdc
  mabi: lp64
  march: rv64imafdc
  work_dir: /work/microtesk/add_01
  asm_file: /work/microtesk/add_01/add_01.S
  linker_file: /work/microtesk/add_01/add_01.ld
"#;

    #[test]
    fn test_accepts_complete_entry() {
        assert!(validate_registry_value(&parse(VALID)).is_empty());
    }

    #[test]
    fn test_accepts_optional_fields() {
        let yaml = format!("{}  extra_compile: [/work/common/crt.S]\n  result: Passed\n", VALID);
        assert!(validate_registry_value(&parse(&yaml)).is_empty());
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let yaml = VALID.replace("  mabi: lp64\n", "");
        let errors = validate_registry_value(&parse(&yaml));
        assert_eq!(errors, vec![SchemaError::new("add_01", "mabi", "required field")]);
    }

    #[test]
    fn test_rejects_unknown_field() {
        let yaml = format!("{}  seed: 42\n", VALID);
        let errors = validate_registry_value(&parse(&yaml));
        assert_eq!(errors, vec![SchemaError::new("add_01", "seed", "unknown field")]);
    }

    #[test]
    fn test_rejects_empty_work_dir() {
        let yaml = VALID.replace("work_dir: /work/microtesk/add_01", "work_dir: \"\"");
        let errors = validate_registry_value(&parse(&yaml));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "work_dir");
    }

    #[test]
    fn test_reports_every_offending_field() {
        let yaml = r#"
t1:
  cc: 3
  cc_args: "-O2"
t2: not-a-mapping
"#;
        let errors = validate_registry_value(&parse(yaml));
        let t1: Vec<_> = errors.iter().filter(|e| e.test == "t1").collect();
        // cc type, cc_args type, and seven missing required fields
        assert_eq!(t1.len(), 9);
        assert!(errors.iter().any(|e| e.test == "t2" && e.field == ROOT));
    }

    #[test]
    fn test_rejects_names_that_leave_their_directory() {
        for name in ["/home/u/proj", "../../escaped", "a/b", "..", ".", "a\\b"] {
            let yaml = VALID.replace("add_01:", &format!("{:?}:", name));
            let errors = validate_registry_value(&parse(&yaml));
            assert_eq!(
                errors,
                vec![SchemaError::new(name, ROOT, "test name must be a single path component")],
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_plain_test_names() {
        assert!(is_plain_test_name("add_01"));
        assert!(is_plain_test_name("rv64.mul-2"));
        assert!(is_plain_test_name("..x"));
        assert!(!is_plain_test_name(""));
        assert!(!is_plain_test_name(".."));
        assert!(!is_plain_test_name("a/b"));
    }

    #[test]
    fn test_rejects_bad_verdict() {
        let yaml = format!("{}  result: Maybe\n", VALID);
        let errors = validate_registry_value(&parse(&yaml));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unavailable"));
    }

    #[test]
    fn test_rejects_non_mapping_document() {
        let errors = validate_registry_value(&parse("- a\n- b\n"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].test, ROOT);
    }

    #[test]
    fn test_display_matches_log_format() {
        let e = SchemaError::new("t1", "cc", "required field");
        assert_eq!(e.to_string(), "t1 [ cc ] : required field");
    }
}
