
#[cfg(feature = "serde")]
mod serde_tests {
    use docxlate::{
        Context, EngineConfig, Schema, SemanticOptions, SyntaxOptions, TypeKind, Value,
        extract_references, validate_semantics, validate_syntax,
    };

    use crate::fixtures;

    #[test]
    fn test_context_from_json() {
        let context: Context = serde_json::from_str(
            r#"{"name": "Ada", "age": 36, "ratio": 0.5, "tags": ["a", null], "vip": true}"#,
        )
        .unwrap();

        assert_eq!(context.get("name"), Some(&Value::from("Ada")));
        assert_eq!(context.get("age"), Some(&Value::Int(36)));
        assert_eq!(context.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(
            context.get("tags"),
            Some(&Value::Array(vec![Value::from("a"), Value::Null]))
        );
        assert_eq!(context.get("vip"), Some(&Value::Bool(true)));

        let serialized = serde_json::to_string(&context).unwrap();
        let deserialized: Context = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, context);
    }

    #[test]
    fn test_schema_from_json() {
        let schema: Schema = serde_json::from_str(
            r#"{
                "fields": [
                    {"path": "customer.name", "type": "string"},
                    {"path": "items[*]", "type": "array", "elementKind": "object", "nullable": true}
                ],
                "functions": [
                    {"name": "upper", "minArgs": 1, "maxArgs": 1, "argKinds": [["string"]], "returnKind": "string"},
                    {"name": "concat", "minArgs": 0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(schema.fields[0].kind, TypeKind::String);
        assert_eq!(schema.fields[1].element_kind, Some(TypeKind::Object));
        assert!(schema.fields[1].nullable);
        assert_eq!(schema.functions[0].return_kind, TypeKind::String);
        assert_eq!(schema.functions[1].max_args, -1);
        assert!(schema.functions[1].accepts_count(12));
    }

    #[test]
    fn test_options_default_when_missing() {
        let options: SemanticOptions = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert!(options.strict);
        assert!(!options.include_warnings);
        assert_eq!(options.max_issues, None);

        let options: SyntaxOptions = serde_json::from_str(r#"{"maxIssues": 3}"#).unwrap();
        assert_eq!(options.max_issues, Some(3));

        let config: EngineConfig = serde_json::from_str(r#"{"maxDepth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
    }

    #[test]
    fn test_validation_result_shape() {
        let bytes = fixtures::docx_lines(&["{{end}}"]);
        let result = validate_syntax(&bytes, SyntaxOptions::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["valid"], false);
        assert_eq!(json["issuesTruncated"], false);
        assert_eq!(json["summary"]["checkedTokens"], 1);
        assert_eq!(json["summary"]["errorCount"], 1);
        assert_eq!(json["summary"]["returnedIssueCount"], 1);
        assert_eq!(json["issues"][0]["severity"], "error");
        assert_eq!(json["issues"][0]["code"], "UNMATCHED_END");
        assert_eq!(json["issues"][0]["token"]["raw"], "{{end}}");
        assert_eq!(json["issues"][0]["location"]["part"], "word/document.xml");
        assert_eq!(json["issues"][0]["location"]["charStartUtf16"], 0);
        assert!(
            json["metadata"]["documentHash"]
                .as_str()
                .unwrap()
                .starts_with("sha256:")
        );
    }

    #[test]
    fn test_semantic_result_round_trip() {
        let bytes = fixtures::docx_lines(&["{{custmer}}"]);
        let schema = Schema::new().field(docxlate::FieldDef::new("customer", TypeKind::Object));
        let options = SemanticOptions {
            include_warnings: true,
            ..SemanticOptions::default()
        };
        let result = validate_semantics(&bytes, &schema, options).unwrap();

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""code":"UNKNOWN_FIELD""#));
        assert!(json.contains(r#""suggestions":["customer"]"#));
        let deserialized: docxlate::ValidationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, deserialized);
    }

    #[test]
    fn test_references_shape() {
        let bytes = fixtures::docx_lines(&["{{if ok}}{{end}}"]);
        let json = serde_json::to_value(extract_references(&bytes).unwrap()).unwrap();

        assert_eq!(json["references"][0]["kind"], "control");
        assert_eq!(json["references"][0]["expression"], "if ok");
        assert_eq!(json["references"][1]["kind"], "variable");
        assert_eq!(json["references"][1]["tokenOrdinal"], 0);
        assert_eq!(json["references"][2]["expression"], "end");
    }
}
