use std::path::Path;

use annopatch::patcher::{
    mount_field, sync_interface, synthesize_tags, ModulePathCache, MountRequest, NamingMode,
    SyncReport, SyncRequest, TagStrategy,
};
use annopatch::{extract_annotations, PassthroughFormatter};
use pretty_assertions::assert_eq;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_mount_adds_field_and_import() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write(
        tmp.path(),
        "model.go",
        "package model\n\ntype Foo struct {\n\tName string\n}\n",
    );

    let request = MountRequest {
        struct_name: "Foo".to_string(),
        type_name: "pkg.Bar".to_string(),
        field_name: None,
        import_path: Some("some/pkg".to_string()),
    };
    let patched = mount_field(&path, &request).unwrap();
    assert_eq!(
        patched,
        "package model\n\nimport \"some/pkg\"\n\ntype Foo struct {\n\tName string\n\tBar pkg.Bar\n}\n"
    );

    // Mounting the patched output again changes nothing.
    std::fs::write(&path, &patched).unwrap();
    assert_eq!(mount_field(&path, &request).unwrap(), patched);
}

#[test]
fn test_mount_collision_resolution() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write(
        tmp.path(),
        "model.go",
        "package model\n\ntype Foo struct {\n\tName string\n}\n",
    );

    for import in ["alpha/widget", "beta/widget"] {
        let patched = mount_field(
            &path,
            &MountRequest {
                struct_name: "Foo".to_string(),
                type_name: "widget.Widget".to_string(),
                field_name: None,
                import_path: Some(import.to_string()),
            },
        )
        .unwrap();
        std::fs::write(&path, patched).unwrap();
    }

    let out = std::fs::read_to_string(&path).unwrap();
    assert!(out.contains("\tWidget widget.Widget\n"));
    assert!(out.contains("\tWidget2 widget2.Widget\n"));
    assert!(out.contains("widget2 \"beta/widget\""));
}

#[test]
fn test_tag_synthesis_on_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write(
        tmp.path(),
        "user.go",
        "package model\n\ntype User struct {\n\tUserName string\n\tID int64 `gorm:\"column:id\"`\n\tsecret string\n}\n",
    );

    let strategies = [TagStrategy::additive("json", NamingMode::Snake)];
    let (patched, changed) = synthesize_tags(&path, &strategies).unwrap();
    assert!(changed);
    assert_eq!(
        patched,
        "package model\n\ntype User struct {\n\tUserName string `json:\"user_name\"`\n\tID int64 `gorm:\"column:id\" json:\"id\"`\n\tsecret string\n}\n"
    );

    std::fs::write(&path, &patched).unwrap();
    let (again, changed) = synthesize_tags(&path, &strategies).unwrap();
    assert!(!changed);
    assert_eq!(again, patched);
}

#[test]
fn test_interface_sync_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    write(
        dir,
        "store.go",
        "package store\n\ntype Store interface {\n\tGet(id int64) (string, error)\n\tSet(id int64, v string) error\n}\n",
    );
    write(
        dir,
        "sql.go",
        "package store\n\ntype SQLStore struct{}\n\nfunc (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}\n",
    );

    let request = SyncRequest {
        interface_file: dir.join("store.go"),
        interface_name: "Store".to_string(),
        impl_name: "SQLStore".to_string(),
        target_dir: dir.to_path_buf(),
        skeleton: None,
    };
    let report =
        sync_interface(&request, &PassthroughFormatter, &ModulePathCache::new()).unwrap();
    assert_eq!(report, SyncReport { added: 1, updated: 0 });

    // The existing method is byte-identical, the missing one is stubbed.
    assert!(std::fs::read_to_string(dir.join("sql.go"))
        .unwrap()
        .contains("func (s *SQLStore) Get(id int64) (string, error) {\n\treturn \"\", nil\n}"));
    assert_eq!(
        std::fs::read_to_string(dir.join("set.go")).unwrap(),
        "package store\n\nfunc (s *SQLStore) Set(id int64, v string) error {\n\tpanic(\"implement me\")\n}\n"
    );

    // A second pass settles to a no-op.
    let report =
        sync_interface(&request, &PassthroughFormatter, &ModulePathCache::new()).unwrap();
    assert_eq!(report, SyncReport::default());
}

#[test]
fn test_annotation_extraction_across_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    write(
        dir,
        "b.go",
        "package p\n\n// Widget spins.\n// @model(widget, table=widgets)\ntype Widget struct{}\n",
    );
    write(
        dir,
        "a.go",
        "package p\n\n// @model(user)\ntype User struct{}\n\n// @other(x)\ntype Other struct{}\n",
    );
    write(dir, "a_test.go", "package p\n\n// @model(ignored)\ntype T struct{}\n");

    let found = extract_annotations(dir, "model").unwrap();
    assert_eq!(found.len(), 2);
    // Sorted by file path.
    assert_eq!(found[0].args, vec!["user"]);
    assert_eq!(found[0].target.as_deref(), Some("User"));
    assert_eq!(found[1].args, vec!["widget"]);
    assert_eq!(found[1].options.get("table").unwrap(), "widgets");
    assert_eq!(found[1].title, "Widget spins.");
}
