//! Scenario: daemon boot is fail-closed
//!
//! GREEN when:
//! 1. PRODUCTION without the token secret env var refuses to boot.
//! 2. PRODUCTION with unused config keys refuses to boot.
//! 3. A literal secret in YAML refuses to boot in any mode.
//! 4. DEV boots with an ephemeral secret and the configured URLs.
//! 5. A seed file populates the in-memory store.
//!
//! Env var names are sentinels that are never set; nothing here mutates the
//! process environment.

use qbt_config::ConfigMode;
use qbt_daemon::boot::{boot, BootOptions};
use qbt_storefront::{Catalog, CuratedList};
use qbt_token::SessionIdentity;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let p = dir.path().join(name);
    std::fs::write(&p, body).unwrap();
    p.to_string_lossy().into_owned()
}

fn opts(mode: ConfigMode, paths: Vec<String>, seed: Option<String>) -> BootOptions {
    BootOptions {
        mode,
        config_paths: paths,
        seed_path: seed,
    }
}

#[test]
fn production_without_secret_does_not_boot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(
        &dir,
        "prod.yaml",
        "security:\n  token_secret_env: \"QBT_SENTINEL_DAEMON_BOOT_A1\"\n",
    );
    let err = boot(&opts(ConfigMode::Production, vec![cfg], None)).err().unwrap();
    let msg = format!("{err:#}");
    assert!(msg.contains("SECRETS_MISSING"), "{msg}");
    assert!(msg.contains("QBT_SENTINEL_DAEMON_BOOT_A1"), "{msg}");
}

#[test]
fn production_with_unused_keys_does_not_boot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(&dir, "prod.yaml", "storefront:\n  chekout_url: \"/typo\"\n");
    let err = boot(&opts(ConfigMode::Production, vec![cfg], None)).err().unwrap();
    assert!(format!("{err:#}").contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn literal_secret_does_not_boot() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(
        &dir,
        "dev.yaml",
        "security:\n  token_secret_env: \"sk_live_0123456789abcdef\"\n",
    );
    let err = boot(&opts(ConfigMode::Dev, vec![cfg], None)).err().unwrap();
    assert!(format!("{err:#}").contains("CONFIG_SECRET_DETECTED"));
}

#[test]
fn dev_boots_with_configured_urls() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(
        &dir,
        "base.yaml",
        "security:\n  token_secret_env: \"QBT_SENTINEL_DAEMON_BOOT_B2\"\nstorefront:\n  checkout_url: \"/afrekenen\"\n",
    );
    let overlay = write(&dir, "overlay.yaml", "storefront:\n  form_url: \"/bestellijst\"\n");
    let st = boot(&opts(ConfigMode::Dev, vec![base, overlay], None)).unwrap();
    assert_eq!(st.mode, ConfigMode::Dev);
    assert_eq!(st.storefront.checkout_url, "/afrekenen");
    assert_eq!(st.storefront.form_url, "/bestellijst");
}

#[test]
fn seed_file_populates_store() {
    let dir = tempfile::tempdir().unwrap();
    let seed = write(
        &dir,
        "seed.json",
        r#"{
          "products": [{ "id": 101, "name": "House red", "display_price_micros": 9950000 }],
          "curated": { "user:1": [101] }
        }"#,
    );
    let st = boot(&opts(ConfigMode::Dev, Vec::new(), Some(seed))).unwrap();
    assert!(st.store.catalog.get_product(101).unwrap().is_some());
    let s = SessionIdentity::new("user:1").unwrap();
    assert_eq!(st.store.curated.product_ids(&s).unwrap(), vec![101]);
}
