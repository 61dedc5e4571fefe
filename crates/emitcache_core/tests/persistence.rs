//! Integration tests for the on-disk cache.

use std::fs;
use std::sync::Arc;

use emitcache_core::test_utils::ToyEngine;
use emitcache_core::{BuildError, CompileOptions, FsSource, Outcome, Session};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write_project(root: &TempDir) -> FsSource {
    let src = root.path().join("app");
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::write(
        src.join("main.ts"),
        "/// <reference path=\"lib/config.ts\" />\nimport { util } from \"./lib/util\";\nexport const mode = MODE;",
    )
    .unwrap();
    fs::write(src.join("lib/config.ts"), "const MODE = 'production';").unwrap();
    fs::write(src.join("lib/util.ts"), "export const util = 1;").unwrap();
    fs::write(src.join("notes.md"), "# not a source file").unwrap();
    FsSource::new(src)
}

#[test]
fn test_entries_survive_restart() {
    let root = TempDir::new().unwrap();
    let cache_dir = root.path().join("cache");
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);
    assert_eq!(paths, vec!["lib/config.ts", "lib/util.ts", "main.ts"]);

    let first = {
        let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
        let build = session
            .build(&paths, source.clone(), CompileOptions::new())
            .unwrap();
        build.emit("main.ts", None).unwrap()
    };
    assert_eq!(
        first.emitted_code.as_deref(),
        Some("const { util } = require(\"./lib/util\");\nexports.mode = 'production';\n")
    );

    let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
    let build = session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap();
    let second = build.emit_traced("main.ts", None).unwrap();

    assert_eq!(second.outcome, Outcome::Reuse);
    assert_eq!(second.unit, first);
    assert_eq!(session.with_engine("os", |e| e.compile_calls()), Some(0));
    assert!(cache_dir.join("versions").join("os.json").is_file());
}

#[test]
fn test_change_between_restarts_is_detected() {
    let root = TempDir::new().unwrap();
    let cache_dir = root.path().join("cache");
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);

    {
        let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
        let build = session
            .build(&paths, source.clone(), CompileOptions::new())
            .unwrap();
        build.emit("main.ts", None).unwrap();
    }

    fs::write(
        source.root().join("lib/config.ts"),
        "const MODE = 'development';",
    )
    .unwrap();

    let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
    let build = session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap();
    let emission = build.emit_traced("main.ts", None).unwrap();

    assert_eq!(emission.outcome, Outcome::Recompiled);
    assert_eq!(emission.unit.version, 1);
    assert!(
        emission
            .unit
            .emitted_code
            .unwrap()
            .contains("exports.mode = 'development';")
    );
    assert_eq!(emission.unit.dependencies.ref_files["lib/config.ts"].version, 2);
}

#[test]
fn test_patched_entry_is_reused_after_restart() {
    let root = TempDir::new().unwrap();
    let cache_dir = root.path().join("cache");
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);

    {
        let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
        let build = session
            .build(&paths, source.clone(), CompileOptions::new())
            .unwrap();
        build.emit("main.ts", None).unwrap();
    }

    fs::write(source.root().join("lib/util.ts"), "export const util = 2;").unwrap();

    {
        let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
        let build = session
            .build(&paths, source.clone(), CompileOptions::new())
            .unwrap();
        let emission = build.emit_traced("main.ts", None).unwrap();
        assert_eq!(emission.outcome, Outcome::Patched);
    }

    let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
    let build = session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap();
    let emission = build.emit_traced("main.ts", None).unwrap();

    assert_eq!(emission.outcome, Outcome::Reuse);
    assert_eq!(emission.unit.dependencies.modules["lib/util.ts"].version, 2);
    assert_eq!(
        session.with_engine("os", |e| (e.compile_calls(), e.diagnostics_calls())),
        Some((0, 0))
    );
}

#[test]
fn test_corrupted_entries_are_misses() {
    let root = TempDir::new().unwrap();
    let cache_dir = root.path().join("cache");
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);

    {
        let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
        let build = session
            .build(&paths, source.clone(), CompileOptions::new())
            .unwrap();
        build.emit("main.ts", None).unwrap();
    }

    for entry in fs::read_dir(cache_dir.join("entries")).unwrap() {
        fs::write(entry.unwrap().path(), b"garbage").unwrap();
    }
    fs::write(cache_dir.join("versions").join("os.json"), "{").unwrap();

    let mut session = Session::with_cache_dir(ToyEngine::new, &cache_dir);
    let build = session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap();
    let emission = build.emit_traced("main.ts", None).unwrap();

    assert_eq!(emission.outcome, Outcome::Miss);
    assert!(emission.unit.diagnostics.is_empty());
}

#[test]
fn test_rebinding_cache_directory() {
    let root = TempDir::new().unwrap();
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);

    let mut session = Session::with_cache_dir(ToyEngine::new, root.path().join("one"));
    session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap()
        .emit("lib/util.ts", None)
        .unwrap();

    assert!(!session.set_cache_directory(root.path().join("one")));
    assert!(session.set_cache_directory(root.path().join("two")));

    let emission = session
        .build(&paths, source.clone(), CompileOptions::new())
        .unwrap()
        .emit_traced("lib/util.ts", None)
        .unwrap();
    assert_eq!(emission.outcome, Outcome::Miss);
    assert!(root.path().join("two").join("entries").is_dir());
}

#[test]
fn test_options_from_json_drive_a_build() {
    let root = TempDir::new().unwrap();
    let source = Arc::new(write_project(&root));
    let paths = source.discover(&["ts"]);

    let options = CompileOptions::from_json(
        r#"{ "module": "esnext", "exclude": ["lib/**"], "arch": "web.browser" }"#,
    )
    .unwrap();

    let mut session = Session::with_cache_dir(ToyEngine::new, root.path().join("cache"));
    let build = session.build(&paths, source.clone(), options).unwrap();

    assert_eq!(build.files(), ["main.ts".to_string()]);
    assert!(matches!(
        build.emit("lib/util.ts", None),
        Err(BuildError::NotFound(_))
    ));

    let unit = build.emit("main.ts", None).unwrap();
    assert_eq!(
        unit.emitted_code.as_deref(),
        Some("import { util } from \"./lib/util\";\nexport const mode = 'production';\n")
    );
    assert_eq!(session.architectures(), vec!["web.browser"]);

    let invalid = CompileOptions::from_json(r#"{ "arch": "" }"#);
    assert!(matches!(invalid, Err(BuildError::Config(_))));
}
