//! Literal secrets never live in config
//!
//! GREEN when:
//! - A leaf that looks like a credential fails with CONFIG_SECRET_DETECTED.
//! - The error names the leaf pointer but never the value.
//! - The token secret env key must hold an env var NAME.
//! - Env var NAMES load fine.

use qbt_config::load_layered_yaml_from_strings;

#[test]
fn literal_secret_is_refused() {
    let yaml = r#"
security:
  token_secret_env: "sk-live-abc123secretvalue"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "{err}");
    assert!(err.contains("/security/token_secret_env"), "{err}");
    assert!(!err.contains("abc123secretvalue"), "value leaked: {err}");
}

#[test]
fn store_api_credentials_are_refused() {
    for literal in ["ck_0123456789abcdef", "cs_0123456789abcdef"] {
        let yaml = format!("storefront:\n  api_key: \"{literal}\"\n");
        let err = load_layered_yaml_from_strings(&[yaml.as_str()])
            .unwrap_err()
            .to_string();
        assert!(err.contains("CONFIG_SECRET_DETECTED"), "{literal}: {err}");
    }
}

#[test]
fn secret_in_overlay_array_is_refused() {
    let base = "storefront:\n  checkout_url: \"/checkout\"\n";
    let overlay = r#"
webhooks:
  - url: "https://example.com"
    token: "ghp_realtokenvalue123"
"#;
    let err = load_layered_yaml_from_strings(&[base, overlay])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/webhooks/0/token"), "{err}");
}

#[test]
fn env_var_names_load_cleanly() {
    let yaml = r#"
security:
  token_secret_env: "QBT_TOKEN_SECRET"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    assert_eq!(
        loaded.config_json.pointer("/security/token_secret_env"),
        Some(&serde_json::json!("QBT_TOKEN_SECRET"))
    );
}

#[test]
fn pasted_secret_in_env_name_slot_is_refused() {
    let yaml = "security:\n  token_secret_env: \"hunter2-correct-horse!\"\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "{err}");
    assert!(err.contains("/security/token_secret_env"), "{err}");
    assert!(!err.contains("hunter2"), "value leaked: {err}");
}
