use std::collections::BTreeSet;

use graphjar_config::{LibraryConfig, LibraryMode};
use graphjar_jar::{open_library, JarError, RepositoryJar, RepositoryJarLibrary};
use pretty_assertions::assert_eq;

use super::fixtures::{index_jar, result};

fn set(files: &[&str]) -> BTreeSet<String> {
    files.iter().map(|f| (*f).to_owned()).collect()
}

fn libraries(jars: &[Vec<u8>]) -> Vec<Box<dyn RepositoryJarLibrary>> {
    [LibraryMode::Simple, LibraryMode::Cached]
        .into_iter()
        .map(|mode| {
            let jars = jars
                .iter()
                .map(|bytes| RepositoryJar::from_bytes(bytes.clone()).unwrap());
            let config = LibraryConfig {
                mode,
                ..LibraryConfig::default()
            };
            open_library(jars, &config).unwrap()
        })
        .collect()
}

/// F1 defines P1 and references P2; F2 defines P2 and references nothing.
fn two_files() -> Vec<Vec<u8>> {
    vec![index_jar(
        "test",
        &[
            result("/test/f1.pure", &["test::P1"], &["test::P2"]),
            result("/test/f2.pure", &["test::P2"], &[]),
        ],
    )]
}

#[test]
fn dependency_closures() {
    for library in libraries(&two_files()) {
        assert_eq!(
            library.file_dependencies(&["test/f1.pc"]).unwrap(),
            set(&["test/f1.pc", "test/f2.pc"])
        );
        assert_eq!(
            library.file_dependencies(&["test/f2.pc"]).unwrap(),
            set(&["test/f2.pc"])
        );
        assert_eq!(
            library.dependent_files(&["test/f2.pc"]),
            set(&["test/f2.pc", "test/f1.pc"])
        );
        assert_eq!(
            library.dependent_files(&["test/f1.pc"]),
            set(&["test/f1.pc"])
        );
        assert_eq!(
            library.required_files("test::P1").unwrap(),
            set(&["test/f1.pc", "test/f2.pc"])
        );
        assert_eq!(
            library
                .required_files_for(&["test::P2", "test::P2"])
                .unwrap(),
            set(&["test/f2.pc"])
        );
    }
}

#[test]
fn closures_span_repositories() {
    let jars = vec![
        index_jar(
            "app",
            &[result("/app/main.pure", &["app::Main"], &["lib::Util"])],
        ),
        index_jar(
            "lib",
            &[
                result("/lib/util.pure", &["lib::Util"], &["lib::Base"]),
                result("/lib/base.pure", &["lib::Base"], &[]),
            ],
        ),
    ];
    for library in libraries(&jars) {
        assert_eq!(
            library.required_files("app::Main").unwrap(),
            set(&["app/main.pc", "lib/base.pc", "lib/util.pc"])
        );
        assert_eq!(
            library.dependent_files(&["lib/base.pc"]),
            set(&["app/main.pc", "lib/base.pc", "lib/util.pc"])
        );
    }
}

#[test]
fn broken_indexes_fail_dependency_queries() {
    let jars = vec![index_jar(
        "test",
        &[result("/test/f1.pure", &["test::P1"], &["other::Missing"])],
    )];
    for library in libraries(&jars) {
        let err = library.file_dependencies(&["test/f1.pc"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot find definition for: other::Missing (referenced from test/f1.pc)"
        );

        let err = library.file_dependencies(&["test/unknown.pc"]).unwrap_err();
        assert!(
            matches!(&err, JarError::MissingFileDependencies { path } if path == "test/unknown.pc"),
            "{err}"
        );

        let err = library.required_files("test::Nope").unwrap_err();
        assert_eq!(err.to_string(), "cannot find file for instance: test::Nope");
    }
}

#[test]
fn file_and_directory_queries() {
    let jars = vec![
        index_jar(
            "test",
            &[
                result("/test/a.pure", &["test::A"], &[]),
                result("/test/sub/b.pure", &["test::sub::B"], &[]),
                result("/test/sub/deeper/c.pure", &["test::sub::deeper::C"], &[]),
            ],
        ),
        index_jar("other", &[result("/other/d.pure", &["other::D"], &[])]),
    ];
    for library in libraries(&jars) {
        assert!(library.is_known_repository("test"));
        assert!(!library.is_known_repository("nope"));
        assert!(library.is_known_file("test/sub/b.pc"));
        assert!(!library.is_known_file("test/sub/b.pure"));
        assert!(library.is_known_instance("test::sub::deeper::C"));
        assert!(!library.is_known_instance("test::sub"));

        let all = vec![
            "other/d.pc",
            "test/a.pc",
            "test/sub/b.pc",
            "test/sub/deeper/c.pc",
        ];
        assert_eq!(library.all_files(), all);
        assert_eq!(library.directory_files(""), all);
        assert_eq!(library.directory_files("/"), all);
        assert_eq!(
            library.repository_files("test"),
            vec!["test/a.pc", "test/sub/b.pc", "test/sub/deeper/c.pc"]
        );
        for directory in ["test", "/test", "test/", "/test/"] {
            assert_eq!(
                library.directory_files(directory),
                library.repository_files("test"),
                "{directory}"
            );
        }
        for directory in ["test/sub", "/test/sub/"] {
            assert_eq!(
                library.directory_files(directory),
                vec!["test/sub/b.pc", "test/sub/deeper/c.pc"]
            );
        }
        assert!(library.directory_files("/notADir").is_empty());
        assert!(library.directory_files("/test/notADir").is_empty());
    }
}

#[test]
fn reading_files() {
    let jars = vec![
        index_jar("test", &[result("/test/a.pure", &["test::A"], &[])]),
        index_jar("other", &[result("/other/d.pure", &["other::D"], &[])]),
    ];
    for library in libraries(&jars) {
        // Index jars hold their source id as file contents.
        assert_eq!(library.read_file("test/a.pc").unwrap(), b"/test/a.pure");

        let files = library.read_files(&["test/a.pc", "other/d.pc"]).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files["other/d.pc"], b"/other/d.pure");

        let repository = library.read_repository_files(&["other", "nope"]).unwrap();
        assert_eq!(repository.keys().collect::<Vec<_>>(), vec!["other/d.pc"]);
        assert_eq!(library.read_all_files().unwrap().len(), 2);

        let err = library.read_file("test/missing.pc").unwrap_err();
        assert!(
            matches!(&err, JarError::UnknownFile { path } if path == "test/missing.pc"),
            "{err}"
        );
        assert!(library.read_files(&["test/a.pc", "test/missing.pc"]).is_err());
    }
}
