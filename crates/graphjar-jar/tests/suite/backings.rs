use std::collections::BTreeSet;

use graphjar_jar::{RepositoryJar, MANIFEST_NAME};
use pretty_assertions::assert_eq;
use url::Url;

use super::fixtures::{index_jar, result, Model, REPOSITORY};

fn keys(files: &graphjar_jar::FileContents) -> Vec<&str> {
    files.keys().map(String::as_str).collect()
}

#[test]
fn every_backing_reads_the_same_contents() {
    let writer = Model::new().writer();
    let bytes = writer.to_bytes().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let jar_path = dir.path().join("test.jar");
    writer.write_to_path(&jar_path).unwrap();
    let unpacked = dir.path().join("unpacked");
    writer.unpack_to(&unpacked).unwrap();

    let url = Url::from_file_path(&jar_path).unwrap();
    let jars = [
        RepositoryJar::from_bytes(bytes).unwrap(),
        RepositoryJar::open(&jar_path).unwrap(),
        RepositoryJar::from_url(&url).unwrap(),
        RepositoryJar::open(&unpacked).unwrap(),
    ];

    let expected = jars[0].read_all_files().unwrap();
    assert_eq!(
        keys(&expected),
        vec!["test/c.pc", "test/model/a.pc", "test/model/f.pc"]
    );
    for jar in &jars {
        assert_eq!(jar.repository_name(), REPOSITORY);
        assert_eq!(jar.metadata(), jars[0].metadata());
        assert_eq!(jar.read_all_files().unwrap(), expected, "{}", jar.location());
        assert_eq!(
            jar.read_file("test/model/a.pc").unwrap().as_ref(),
            expected.get("test/model/a.pc"),
        );
        assert_eq!(jar.read_file("test/missing.pc").unwrap(), None);

        let some = jar
            .read_files(["test/c.pc", "test/missing.pc"])
            .unwrap();
        assert_eq!(keys(&some), vec!["test/c.pc"]);
    }
}

#[test]
fn metadata_describes_the_written_files() {
    let jar = RepositoryJar::from_bytes(Model::new().jar()).unwrap();
    let metadata = jar.metadata();
    assert_eq!(metadata.platform_version(), Some(graphjar_core::PLATFORM_VERSION));
    assert_eq!(metadata.model_version(), None);

    let definitions: Vec<(&str, &str)> = metadata.definition_index().iter().collect();
    assert_eq!(
        definitions,
        vec![
            ("test::A", "test/model/a.pc"),
            ("test::C", "test/c.pc"),
            ("test::f", "test/model/f.pc"),
        ]
    );
    assert_eq!(
        metadata.reference_index().get("test/model/f.pc"),
        Some(&BTreeSet::from(["test::A".to_owned()]))
    );
    assert_eq!(
        metadata.reference_index().get("test/model/a.pc"),
        Some(&BTreeSet::new())
    );
    // In-memory sources are not written.
    assert!(!metadata.reference_index().contains_file("test/scratch.pc"));
}

#[test]
fn metadata_entries_come_first() {
    let bytes = index_jar(REPOSITORY, &[result("/test/a.pure", &["test::A"], &[])]);
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|idx| archive.by_index(idx).unwrap().name().to_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            MANIFEST_NAME,
            "META-INF/definition-index.json",
            "META-INF/reference-index.json",
            "test/a.pc",
        ]
    );
}

#[test]
fn unexpected_entries_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let writer = {
        let mut writer = graphjar_jar::RepositoryJarWriter::new(REPOSITORY);
        writer
            .add_file(&result("/test/a.pure", &["test::A"], &[]), b"a".to_vec())
            .unwrap();
        writer
    };
    writer.unpack_to(dir.path()).unwrap();
    std::fs::write(dir.path().join("test").join("notes.txt"), b"ignored").unwrap();

    let jar = RepositoryJar::open(dir.path()).unwrap();
    let files = jar.read_all_files().unwrap();
    assert_eq!(keys(&files), vec!["test/a.pc"]);
    assert_eq!(files["test/a.pc"], b"a".to_vec());
}

#[test]
fn open_errors_name_the_jar() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jar");
    std::fs::write(&path, b"not a zip").unwrap();

    let err = RepositoryJar::open(&path).unwrap_err();
    assert!(err.to_string().contains("broken.jar"), "{err}");
}
