//! Unit tests for app catalog parsing.

use camino::Utf8PathBuf;
use rstest::rstest;

use super::*;

const CATALOG: &str = r#"
[[ios]]
name = "shop"
registry = "acme"
branch = "main"
repo = "acme/shop-ios"
bundle_id = "com.acme.shop"
device_type = "iphone"
storage = { provider = "gcs", bucket = "acme-ios" }

[ios.env]
API_URL = "http://localhost:8080"
FEATURE_FLAGS = "beta"

[[ios]]
name = "shop"
registry = "partner"
branch = "develop"
repo = "partner/shop"
bundle_id = "com.partner.shop"
storage = { provider = "local", bucket = "ios" }

[[desktop]]
name = "studio"
registry = "acme"
branch = "main"
repo = "acme/studio"
storage = { provider = "gcs", bucket = "acme-desktop" }
"#;

#[test]
fn parses_both_sections() {
    let catalog = AppCatalog::parse("apps.toml", CATALOG).expect("catalog should parse");

    assert_eq!(catalog.ios().len(), 2);
    assert_eq!(catalog.desktop().len(), 1);

    let shop = catalog.ios().get("acme/shop").expect("qualified lookup");
    assert_eq!(shop.device_type, Some(DeviceType::Iphone));
    assert_eq!(shop.bundle_id.as_deref(), Some("com.acme.shop"));
    assert_eq!(
        shop.env.get("API_URL").map(String::as_str),
        Some("http://localhost:8080")
    );
    assert_eq!(shop.storage.bucket, "acme-ios");

    let studio = catalog.desktop().get("studio").expect("bare lookup");
    assert_eq!(studio.full_name(), "acme/studio");
    assert_eq!(studio.bundle_id, None);
}

#[test]
fn bare_name_shared_by_registries_is_ambiguous() {
    let catalog = AppCatalog::parse("apps.toml", CATALOG).expect("catalog should parse");

    let err = catalog.ios().get("shop").expect_err("bare name is ambiguous");
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn empty_catalog_has_no_apps() {
    let catalog = AppCatalog::parse("apps.toml", "").expect("empty catalog");

    assert!(catalog.ios().is_empty());
    assert!(catalog.desktop().is_empty());
}

#[rstest]
#[case::missing_bundle(
    "[[ios]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n",
    "bundle_id"
)]
#[case::empty_branch(
    "[[desktop]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"\"\nrepo = \"r/a\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n",
    "branch must not be empty"
)]
#[case::bad_device_type(
    "[[ios]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\nbundle_id = \"x\"\ndevice_type = \"watch\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n",
    "watch"
)]
#[case::desktop_device_type(
    "[[desktop]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\ndevice_type = \"ipad\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n",
    "only applies to iOS"
)]
#[case::slash_in_name(
    "[[desktop]]\nname = \"a/b\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n",
    "must not contain"
)]
fn invalid_entries_are_rejected(#[case] contents: &str, #[case] expected: &str) {
    let err = AppCatalog::parse("apps.toml", contents).expect_err("entry should be rejected");

    assert!(matches!(err, CatalogError::InvalidEntry { .. }), "got {err:?}");
    assert!(err.to_string().contains(expected), "message: {err}");
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = AppCatalog::parse("apps.toml", "[[ios]\nname=").expect_err("bad toml");

    assert!(matches!(err, CatalogError::Parse { .. }), "got {err:?}");
}

#[test]
fn unknown_keys_are_rejected() {
    let contents = "[[desktop]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\ncolour = \"blue\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n";

    let err = AppCatalog::parse("apps.toml", contents).expect_err("unknown key");

    assert!(err.to_string().contains("colour"), "message: {err}");
}

#[test]
fn duplicate_apps_are_rejected() {
    let entry = "[[desktop]]\nname = \"a\"\nregistry = \"r\"\nbranch = \"main\"\nrepo = \"r/a\"\nstorage = { provider = \"gcs\", bucket = \"b\" }\n";
    let contents = format!("{entry}{entry}");

    let err = AppCatalog::parse("apps.toml", &contents).expect_err("duplicate app");

    assert!(
        matches!(err, CatalogError::Registry(RegistryError::Duplicate { .. })),
        "got {err:?}"
    );
}

#[test]
fn load_reads_file_from_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 tempdir");
    let path = root.join("apps.toml");
    std::fs::write(&path, CATALOG).expect("write catalog");

    let catalog = AppCatalog::load(&path).expect("catalog should load");

    assert_eq!(catalog.ios().len(), 2);
}

#[test]
fn load_reports_missing_file_as_io() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 tempdir");

    let err = AppCatalog::load(&root.join("missing.toml")).expect_err("missing file");

    assert!(matches!(err, CatalogError::Io { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Io);
}
