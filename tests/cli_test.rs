//! CLI integration tests for schema-eval binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-eval"))
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const ALL_OF: &str = r#"{
    "allOf": [
        { "type": "string" },
        { "minLength": 3 }
    ]
}"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_instance() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ALL_OF);
        let instance = write_temp_file(&dir, "instance.json", r#""hello""#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#));
    }

    #[test]
    fn invalid_instance_basic_output() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ALL_OF);
        let instance = write_temp_file(&dir, "instance.json", r#""hi""#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains(r#""evaluationPath":"/allOf/1/minLength""#));
    }

    #[test]
    fn flag_output() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ALL_OF);
        let instance = write_temp_file(&dir, "instance.json", "42");

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--output",
                "flag",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::diff("{\"valid\":false}\n"));
    }

    #[test]
    fn hierarchical_output_pretty() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ALL_OF);
        let instance = write_temp_file(&dir, "instance.json", r#""hello""#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--output",
                "hierarchical",
                "--pretty",
            ])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"))
            .stdout(predicate::str::contains(r#""details""#));
    }

    #[test]
    fn root_cause_output() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ALL_OF);
        let instance = write_temp_file(&dir, "instance.json", "42");

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--root-cause",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""schemaPath":"/allOf/0/type""#))
            .stdout(predicate::str::contains("minLength").not());
    }

    #[test]
    fn relative_reference_to_sibling_resource() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "order.json",
            r#"{"properties": {"total": {"$ref": "money.json"}}}"#,
        );
        let money = write_temp_file(&dir, "money.json", r#"{"type": "number", "minimum": 0}"#);
        let instance = write_temp_file(&dir, "instance.json", r#"{"total": -5}"#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--resource",
                money.to_str().unwrap(),
                "--root-cause",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""path":"/total""#))
            .stdout(predicate::str::contains("/properties/total/$ref/minimum"));
    }

    #[test]
    fn local_base_serves_remote_references() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("mirror")).unwrap();
        write_temp_file(&dir, "mirror/id.json", r#"{"type": "string", "pattern": "^id-"}"#);
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"$ref": "https://schemas.example.com/v1/id.json"}"#,
        );
        let instance = write_temp_file(&dir, "instance.json", r#""id-7""#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--schema-local-base",
                dir.path().join("mirror").to_str().unwrap(),
                "--schema-remote-base",
                "https://schemas.example.com/v1",
            ])
            .assert()
            .success();
    }

    #[test]
    fn require_format() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"format": "date"}"#);
        let instance = write_temp_file(&dir, "instance.json", r#""2024-02-30""#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .success();

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--require-format",
            ])
            .assert()
            .code(1);
    }

    #[test]
    fn draft_flag_overrides_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"$schema": "http://json-schema.org/draft-07/schema#", "dependentRequired": {"a": ["b"]}}"#,
        );
        let instance = write_temp_file(&dir, "instance.json", r#"{"a": 1}"#);

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .success();

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--draft",
                "2020-12",
            ])
            .assert()
            .code(1);
    }
}

mod resolve_command {
    use super::*;

    #[test]
    fn resolves_pointer() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"$defs": {"item": {"type": "integer"}}}"#,
        );

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "#/$defs/item"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""schema":{"type":"integer"}"#))
            .stdout(predicate::str::contains("#/$defs/item"));
    }

    #[test]
    fn resolves_anchor_in_resource() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{"$ref": "common.json#name"}"#);
        let common = write_temp_file(
            &dir,
            "common.json",
            r#"{"$defs": {"n": {"$anchor": "name", "type": "string"}}}"#,
        );

        cmd()
            .args([
                "resolve",
                schema.to_str().unwrap(),
                "common.json#name",
                "--resource",
                common.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""type":"string""#));
    }

    #[test]
    fn unknown_anchor_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "{}");

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "#nowhere"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("anchor \"nowhere\" not found"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn schema_not_found() {
        let dir = TempDir::new().unwrap();
        let instance = write_temp_file(&dir, "instance.json", "1");

        cmd()
            .args(["validate", "/nonexistent/schema.json", instance.to_str().unwrap()])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Error"));
    }

    #[test]
    fn invalid_json_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "not valid json");
        let instance = write_temp_file(&dir, "instance.json", "1");

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn duplicate_anchor_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"$defs": {"a": {"$anchor": "x"}, "b": {"$anchor": "x"}}}"#,
        );
        let instance = write_temp_file(&dir, "instance.json", "1");

        cmd()
            .args(["validate", schema.to_str().unwrap(), instance.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("duplicate anchor"));
    }

    #[test]
    fn unknown_output_format() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "{}");
        let instance = write_temp_file(&dir, "instance.json", "1");

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                instance.to_str().unwrap(),
                "--output",
                "verbose-ish",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown output format"));
    }
}

mod required_args {
    use super::*;

    #[test]
    fn missing_instance() {
        cmd()
            .args(["validate", "schema.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("required"));
    }

    #[test]
    fn remote_base_requires_local_base() {
        cmd()
            .args([
                "validate",
                "schema.json",
                "instance.json",
                "--schema-remote-base",
                "https://example.com",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--schema-local-base"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("validate"))
            .stdout(predicate::str::contains("resolve"));
    }

    #[test]
    fn version() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("schema-eval"));
    }
}
