use graphjar_binary::ExternalReferenceSerializerLibrary;
use graphjar_config::ResolutionConfig;
use graphjar_jar::{
    CachedJarLibrary, JarError, LibraryLoader, RepositoryJar, RepositoryJarLibrary,
    SimpleJarLibrary,
};
use graphjar_model::m3::properties;
use graphjar_model::ModelRepository;
use pretty_assertions::assert_eq;

use super::fixtures::Model;

fn libraries() -> Vec<Box<dyn RepositoryJarLibrary>> {
    let bytes = Model::new().jar();
    let simple: Box<dyn RepositoryJarLibrary> = Box::new(
        SimpleJarLibrary::new([RepositoryJar::from_bytes(bytes.clone()).unwrap()]).unwrap(),
    );
    let cached: Box<dyn RepositoryJarLibrary> =
        Box::new(CachedJarLibrary::new([RepositoryJar::from_bytes(bytes).unwrap()]).unwrap());
    vec![simple, cached]
}

#[test]
fn loading_an_instance_brings_its_dependencies() {
    let serializers = ExternalReferenceSerializerLibrary::with_builtin();
    for library in libraries() {
        let mut repo = ModelRepository::new();
        let mut loader = LibraryLoader::new(library.as_ref(), &serializers);

        let load = loader.load_instances(&mut repo, &["test::f"]).unwrap();
        assert_eq!(load.files, vec!["test/model/a.pc", "test/model/f.pc"]);
        assert_eq!(
            load.report.sources,
            vec!["/test/model/a.pure", "/test/model/f.pure"]
        );
        assert!(load.report.unresolved.is_empty());

        let a = repo.get_by_user_path("test::A").unwrap();
        let f = repo.get_by_user_path("test::f").unwrap();
        assert_eq!(repo.value(f, "returnType"), Some(a));
        assert_eq!(
            repo.value(f, "expression"),
            repo.values(a, properties::PROPERTIES).first().copied()
        );
        assert_eq!(repo.get_by_user_path("test::C"), None);
        assert_eq!(repo.get_by_user_path("test::Scratch"), None);
    }
}

#[test]
fn loaded_files_are_not_read_again() {
    let serializers = ExternalReferenceSerializerLibrary::with_builtin();
    for library in libraries() {
        let mut repo = ModelRepository::new();
        let mut loader = LibraryLoader::new(library.as_ref(), &serializers);
        loader.load_instances(&mut repo, &["test::A"]).unwrap();
        let a = repo.get_by_user_path("test::A").unwrap();

        let load = loader.load_files(&mut repo, &["test/model/f.pc"]).unwrap();
        assert_eq!(load.files, vec!["test/model/f.pc"]);
        let f = repo.get_by_user_path("test::f").unwrap();
        assert_eq!(repo.value(f, "returnType"), Some(a));

        let load = loader.load_all(&mut repo).unwrap();
        assert_eq!(load.files, vec!["test/c.pc"]);
        assert!(repo.get_by_user_path("test::C").is_some());
        assert_eq!(loader.loaded_files().len(), 3);

        let load = loader.load_all(&mut repo).unwrap();
        assert!(load.files.is_empty());
    }
}

#[test]
fn unknown_instances_fail_before_reading() {
    let serializers = ExternalReferenceSerializerLibrary::with_builtin();
    let libraries = libraries();
    let library = &libraries[0];
    let mut repo = ModelRepository::new();
    let err = LibraryLoader::new(library.as_ref(), &serializers)
        .with_options(ResolutionConfig::default())
        .load_instances(&mut repo, &["test::Nope"])
        .unwrap_err();
    assert!(
        matches!(&err, JarError::UnknownInstance { instance } if instance == "test::Nope"),
        "{err}"
    );
    assert!(repo.get_by_user_path("test").is_none());
}

#[test]
fn missing_serializers_name_the_file() {
    // The property reference in f.pc needs the builtin property serializer.
    let serializers = ExternalReferenceSerializerLibrary::new();
    let libraries = libraries();
    let library = &libraries[0];
    let mut repo = ModelRepository::new();
    let err = LibraryLoader::new(library.as_ref(), &serializers)
        .load_instances(&mut repo, &["test::f"])
        .unwrap_err();
    assert!(
        matches!(&err, JarError::Deserialize { path, .. } if path == "test/model/f.pc"),
        "{err}"
    );
}
