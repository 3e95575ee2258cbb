//! Config hash stability
//!
//! GREEN when:
//! - Loading the same layers twice yields the same config_hash.
//! - Key order inside a YAML document does not change the hash.
//! - Overlays change the hash; later layers override earlier ones.

use qbt_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
storefront:
  checkout_url: "/checkout"
  form_url: "/quick-order"
quantity:
  step_price_threshold: 20
  batch_size: 6
security:
  token_secret_env: "QBT_TOKEN_SECRET"
"#;

const BASE_YAML_REORDERED: &str = r#"
security:
  token_secret_env: "QBT_TOKEN_SECRET"
quantity:
  batch_size: 6
  step_price_threshold: 20
storefront:
  form_url: "/quick-order"
  checkout_url: "/checkout"
"#;

const OVERLAY_YAML: &str = r#"
quantity:
  batch_size: 12
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(
        merged.config_json.pointer("/quantity/batch_size"),
        Some(&serde_json::json!(12))
    );
    // Siblings of the overridden leaf survive the merge.
    assert_eq!(
        merged.config_json.pointer("/quantity/step_price_threshold"),
        Some(&serde_json::json!(20))
    );
}

#[test]
fn empty_layer_is_a_no_op() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn files_hash_like_strings() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("overlay.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_is_an_error_naming_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here/qbt.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here/qbt.yaml"));
}
