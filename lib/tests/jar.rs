mod common;

use addon_patcher::jar::{self, patch_jar, patch_jar_file, JarReport};
use addon_patcher::jvm::class_file::ClassFile;
use addon_patcher::Profile;
use common::*;
use std::fs;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST: &[u8] = b"Manifest-Version: 1.0\n\n";
const PLUGIN_YML: &[u8] = b"name: ExampleAddon\nmain: com.example.Addon\ndepend: [Skript]\n";

/// Class reading `ScriptLoader.currentScript`
fn legacy_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/Addon");
    let field = class.field(SCRIPT_LOADER, "currentScript", CONFIG);
    let mut bytes = vec![0xb2];
    bytes.extend(idx(field));
    bytes.push(0xb0);
    class.add_method("script", &format!("(){}", CONFIG), code(1, 0, bytes));
    class.build()
}

fn clean_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/Clean");
    class.add_method("noop", "()V", code(0, 0, vec![0xb1]));
    class.build()
}

fn build_jar(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn addon_jar() -> Vec<u8> {
    let legacy = legacy_class();
    let clean = clean_class();
    build_jar(&[
        ("META-INF/MANIFEST.MF", MANIFEST, CompressionMethod::Stored),
        ("plugin.yml", PLUGIN_YML, CompressionMethod::Deflated),
        ("com/example/Addon.class", &legacy, CompressionMethod::Deflated),
        ("com/example/Clean.class", &clean, CompressionMethod::Deflated),
        ("com/example/Broken.class", b"nope", CompressionMethod::Stored),
    ])
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = vec![];
    entry.read_to_end(&mut contents).unwrap();
    contents
}

/// Compressed bytes and compression method, as stored in the archive
fn raw_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> (Vec<u8>, CompressionMethod) {
    let index = archive.index_for_name(name).unwrap();
    let mut entry = archive.by_index_raw(index).unwrap();
    let method = entry.compression();
    let mut contents = vec![];
    entry.read_to_end(&mut contents).unwrap();
    (contents, method)
}

#[test]
fn only_legacy_classes_are_rewritten() {
    let original = addon_jar();
    let mut output = Cursor::new(Vec::new());
    let report = patch_jar(Cursor::new(original.clone()), &mut output, Profile::Structure).unwrap();

    assert_eq!(
        report,
        JarReport {
            entries: 5,
            patched: vec![String::from("com/example/Addon.class")],
            skipped: vec![String::from("com/example/Broken.class")],
        }
    );

    let mut before = ZipArchive::new(Cursor::new(original)).unwrap();
    let mut after = ZipArchive::new(Cursor::new(output.into_inner())).unwrap();
    let names: Vec<&str> = after.file_names().collect();
    assert_eq!(names.len(), 5);

    for name in [
        "META-INF/MANIFEST.MF",
        "plugin.yml",
        "com/example/Clean.class",
        "com/example/Broken.class",
    ] {
        assert_eq!(raw_entry(&mut before, name), raw_entry(&mut after, name), "{}", name);
    }

    let patched = read_entry(&mut after, "com/example/Addon.class");
    assert_ne!(patched, legacy_class());
    let class = ClassFile::parse(&patched).unwrap();
    let trace = run_method(&class, "script", &[]);
    assert!(trace.field_accesses.is_empty());
    assert_eq!(trace.calls_to(SCRIPT_LOADER, "getCurrentScript").len(), 1);
    assert_eq!(
        after.by_name("com/example/Addon.class").unwrap().compression(),
        CompressionMethod::Deflated
    );
}

#[test]
fn entry_order_is_kept() {
    let original = addon_jar();
    let mut output = Cursor::new(Vec::new());
    patch_jar(Cursor::new(original.clone()), &mut output, Profile::Parallel).unwrap();

    let before = ZipArchive::new(Cursor::new(original)).unwrap();
    let after = ZipArchive::new(Cursor::new(output.into_inner())).unwrap();
    let order = |archive: &ZipArchive<Cursor<Vec<u8>>>| {
        (0..archive.len())
            .map(|idx| archive.name_for_index(idx).unwrap().to_owned())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&before), order(&after));
}

#[test]
fn not_a_jar() {
    let mut output = Cursor::new(Vec::new());
    assert!(matches!(
        patch_jar(Cursor::new(b"plain text".to_vec()), &mut output, Profile::Structure),
        Err(jar::Error::Zip(_))
    ));
}

#[test]
fn jar_files_are_only_rewritten_when_needed() {
    let dir = tempfile::tempdir().unwrap();

    let clean_path = dir.path().join("clean.jar");
    let clean_jar = build_jar(&[
        ("plugin.yml", PLUGIN_YML, CompressionMethod::Deflated),
        ("com/example/Clean.class", &clean_class(), CompressionMethod::Deflated),
    ]);
    fs::write(&clean_path, &clean_jar).unwrap();
    let report = patch_jar_file(&clean_path, Profile::Structure).unwrap();
    assert!(!report.changed());
    assert_eq!(fs::read(&clean_path).unwrap(), clean_jar);

    let addon_path = dir.path().join("addon.jar");
    fs::write(&addon_path, addon_jar()).unwrap();
    assert!(patch_jar_file(&addon_path, Profile::Structure).unwrap().changed());
    let patched = fs::read(&addon_path).unwrap();
    assert_ne!(patched, addon_jar());

    // Second time around there is nothing left to do
    assert!(!patch_jar_file(&addon_path, Profile::Structure).unwrap().changed());
    assert_eq!(fs::read(&addon_path).unwrap(), patched);
}

#[test]
fn directories_are_patched_jar_by_jar() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a-addon.jar"), addon_jar()).unwrap();
    fs::write(
        dir.path().join("b-clean.jar"),
        build_jar(&[("plugin.yml", PLUGIN_YML, CompressionMethod::Stored)]),
    )
    .unwrap();
    fs::write(dir.path().join("c-broken.jar"), b"not a zip").unwrap();
    fs::write(dir.path().join("notes.txt"), b"not a jar").unwrap();

    let results = jar::patch_directory(dir.path(), Profile::Structure).unwrap();
    let names: Vec<String> = results
        .iter()
        .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a-addon.jar", "b-clean.jar", "c-broken.jar"]);

    assert!(results[0].1.as_ref().unwrap().changed());
    assert!(!results[1].1.as_ref().unwrap().changed());
    assert!(matches!(results[2].1, Err(jar::Error::Zip(_))));
    assert_eq!(fs::read(dir.path().join("c-broken.jar")).unwrap(), b"not a zip");
}
