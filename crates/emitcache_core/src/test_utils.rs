//! A small deterministic compiler engine for tests.
//!
//! [`ToyEngine`] understands a line-oriented subset of TypeScript, one
//! statement per line:
//!
//! ```text
//! /// <reference path="globals.ts" />
//! import { a, b } from "./lib";
//! export * from "./other";
//! export const name = 'value';
//! const local = name;
//! declare module "pkg" { export const member: string; }
//! declare const ambient: number;
//! ```
//!
//! Anything else is a syntax error. A line reading `#!crash` makes the engine
//! fail outright.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use emitcache_unit::{Diagnostic, Diagnostics, Location, Span};

use crate::{
    CompileOptions, CompilerEngine, DiagnosticsReport, EngineError, EngineOutput, ModuleKind,
    References, SourceProvider, Target,
};

pub const CANNOT_FIND_NAME: u32 = 2304;
pub const NO_EXPORTED_MEMBER: u32 = 2305;
pub const CANNOT_FIND_MODULE: u32 = 2307;
pub const FILE_NOT_FOUND: u32 = 6053;
pub const STATEMENT_EXPECTED: u32 = 1128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Const,
    Let,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Literal(String),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Statement {
    Reference {
        path: String,
    },
    Import {
        names: Vec<String>,
        specifier: String,
    },
    ExportStar {
        specifier: String,
    },
    Binding {
        exported: bool,
        keyword: Keyword,
        name: String,
        value: Value,
    },
    DeclareModule {
        specifier: String,
        members: Vec<String>,
    },
    DeclareConst {
        name: String,
    },
    Crash,
}

enum LineKind {
    Statement(Statement),
    Comment,
    Invalid,
}

struct Located {
    statement: Statement,
    span: Span,
    loc: Location,
}

#[derive(Default)]
struct ParsedFile {
    statements: Vec<Located>,
    errors: Vec<Diagnostic>,
}

impl ParsedFile {
    fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().map(|l| &l.statement)
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Splits a leading quoted string off `s`, returning its contents and the rest.
fn split_quoted(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &s[1..];
    let end = body.find(quote)?;
    Some((&body[..end], &body[end + 1..]))
}

fn quoted_exact(s: &str) -> Option<String> {
    let (value, rest) = split_quoted(s)?;
    rest.trim().is_empty().then(|| value.to_string())
}

fn parse_value(s: &str) -> Option<Value> {
    let s = s.trim();
    if quoted_exact(s).is_some() || s.parse::<f64>().is_ok() || s == "true" || s == "false" {
        Some(Value::Literal(s.to_string()))
    } else if is_ident(s) {
        Some(Value::Ident(s.to_string()))
    } else {
        None
    }
}

fn parse_binding(s: &str, exported: bool) -> Option<Statement> {
    let (keyword, rest) = if let Some(rest) = s.strip_prefix("const ") {
        (Keyword::Const, rest)
    } else if let Some(rest) = s.strip_prefix("let ") {
        (Keyword::Let, rest)
    } else {
        return None;
    };

    let (name, value) = rest.split_once('=')?;
    let name = name.trim();
    if !is_ident(name) {
        return None;
    }
    Some(Statement::Binding {
        exported,
        keyword,
        name: name.to_string(),
        value: parse_value(value)?,
    })
}

fn parse_import(s: &str) -> Option<Statement> {
    let (names, rest) = s.trim().strip_prefix('{')?.split_once('}')?;
    let names: Vec<String> = names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() || !names.iter().all(|n| is_ident(n)) {
        return None;
    }
    let specifier = quoted_exact(rest.trim().strip_prefix("from")?)?;
    Some(Statement::Import { names, specifier })
}

fn parse_declare_module(s: &str) -> Option<Statement> {
    let (specifier, rest) = split_quoted(s)?;
    let body = rest.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut members = Vec::new();
    for member in body.split(';').map(str::trim).filter(|m| !m.is_empty()) {
        let (name, _ty) = member.strip_prefix("export const ")?.split_once(':')?;
        let name = name.trim();
        if !is_ident(name) {
            return None;
        }
        members.push(name.to_string());
    }

    Some(Statement::DeclareModule {
        specifier: specifier.to_string(),
        members,
    })
}

fn parse_line(text: &str) -> LineKind {
    if text == "#!crash" {
        return LineKind::Statement(Statement::Crash);
    }
    if let Some(rest) = text.strip_prefix("///") {
        let path = rest
            .trim()
            .strip_prefix("<reference path=")
            .and_then(split_quoted)
            .filter(|(_, rest)| rest.trim() == "/>");
        return match path {
            Some((path, _)) => LineKind::Statement(Statement::Reference {
                path: path.to_string(),
            }),
            None => LineKind::Comment,
        };
    }
    if text.starts_with("//") {
        return LineKind::Comment;
    }

    let text = text.strip_suffix(';').unwrap_or(text).trim_end();
    let statement = if let Some(rest) = text.strip_prefix("import ") {
        parse_import(rest)
    } else if let Some(rest) = text.strip_prefix("export * from ") {
        quoted_exact(rest).map(|specifier| Statement::ExportStar { specifier })
    } else if let Some(rest) = text.strip_prefix("export ") {
        parse_binding(rest, true)
    } else if let Some(rest) = text.strip_prefix("declare module ") {
        parse_declare_module(rest)
    } else if let Some(rest) = text.strip_prefix("declare const ") {
        rest.split_once(':')
            .map(|(name, _)| name.trim())
            .filter(|name| is_ident(name))
            .map(|name| Statement::DeclareConst {
                name: name.to_string(),
            })
    } else {
        parse_binding(text, false)
    };

    statement.map_or(LineKind::Invalid, LineKind::Statement)
}

fn parse(content: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    let mut offset = 0u32;

    for (index, raw) in content.split('\n').enumerate() {
        let span = Span::new(offset, offset + raw.len() as u32);
        offset += raw.len() as u32 + 1;

        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let loc = Location::on_line(index as u32 + 1, raw.trim_end().chars().count() as u32);

        match parse_line(text) {
            LineKind::Statement(statement) => parsed.statements.push(Located {
                statement,
                span,
                loc,
            }),
            LineKind::Comment => {}
            LineKind::Invalid => parsed.errors.push(
                Diagnostic::new(STATEMENT_EXPECTED, "Declaration or statement expected.", span)
                    .with_location(loc),
            ),
        }
    }

    parsed
}

/// Resolves `target` against the directory of `from`.
fn join_relative(from: &str, target: &str) -> String {
    let mut parts: Vec<&str> = from.split('/').collect();
    parts.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }
    parts.join("/")
}

/// Names and modules visible to a unit beyond its own declarations.
#[derive(Default)]
struct Environment {
    /// Global names, with the literal value of those bound to one.
    globals: HashMap<String, Option<String>>,
    /// Ambient module declarations by specifier.
    ambient_modules: HashMap<String, BTreeSet<String>>,
}

impl Environment {
    fn absorb(&mut self, parsed: &ParsedFile) {
        for statement in parsed.iter() {
            match statement {
                Statement::Binding {
                    keyword: Keyword::Const,
                    name,
                    value: Value::Literal(literal),
                    ..
                } => {
                    self.globals.insert(name.clone(), Some(literal.clone()));
                }
                Statement::Binding { name, .. } | Statement::DeclareConst { name } => {
                    self.globals.entry(name.clone()).or_insert(None);
                }
                Statement::DeclareModule { specifier, members } => {
                    self.ambient_modules
                        .entry(specifier.clone())
                        .or_default()
                        .extend(members.iter().cloned());
                }
                _ => {}
            }
        }
    }
}

enum Resolution {
    File(String),
    Ambient(BTreeSet<String>),
    Unresolved,
}

struct Analysis {
    parsed: ParsedFile,
    environment: Environment,
    diagnostics: Diagnostics,
    references: References,
}

/// A deterministic engine over the statement subset described above.
pub struct ToyEngine {
    arch: String,
    files: BTreeSet<String>,
    source: Option<Arc<dyn SourceProvider>>,
    options: CompileOptions,
    compile_calls: usize,
    diagnostics_calls: usize,
}

impl ToyEngine {
    pub fn new(arch: &str) -> Self {
        Self {
            arch: arch.to_string(),
            files: BTreeSet::new(),
            source: None,
            options: CompileOptions::default(),
            compile_calls: 0,
            diagnostics_calls: 0,
        }
    }

    /// The architecture this engine was created for.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Number of full compiles run so far.
    pub fn compile_calls(&self) -> usize {
        self.compile_calls
    }

    /// Number of diagnostics-only passes run so far.
    pub fn diagnostics_calls(&self) -> usize {
        self.diagnostics_calls
    }

    fn read(&self, path: &str) -> Option<ParsedFile> {
        self.source
            .as_ref()
            .and_then(|source| source.content(path))
            .map(|content| parse(&content))
    }

    fn exists(&self, path: &str) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.content(path).is_some())
    }

    fn resolve(&self, from: &str, specifier: &str, environment: &Environment) -> Resolution {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = join_relative(from, specifier);
            let candidates = [
                base.clone(),
                format!("{}.ts", base),
                format!("{}.tsx", base),
                format!("{}.d.ts", base),
            ];
            if let Some(found) = candidates.into_iter().find(|c| self.exists(c)) {
                return Resolution::File(found);
            }
        }
        match environment.ambient_modules.get(specifier) {
            Some(members) => Resolution::Ambient(members.clone()),
            None => Resolution::Unresolved,
        }
    }

    /// Adds `path` and every module file it imports or re-exports to `modules`.
    fn collect_modules(&self, path: &str, environment: &Environment, modules: &mut BTreeSet<String>) {
        if !modules.insert(path.to_string()) {
            return;
        }
        let Some(parsed) = self.read(path) else {
            return;
        };
        for statement in parsed.iter() {
            if let Statement::Import { specifier, .. } | Statement::ExportStar { specifier } =
                statement
                && let Resolution::File(target) = self.resolve(path, specifier, environment)
            {
                self.collect_modules(&target, environment, modules);
            }
        }
    }

    /// Names exported by the module file `path`, following `export *`.
    fn exports_of(
        &self,
        path: &str,
        environment: &Environment,
        visiting: &mut BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut exports = BTreeSet::new();
        if !visiting.insert(path.to_string()) {
            return exports;
        }
        let Some(parsed) = self.read(path) else {
            return exports;
        };

        for statement in parsed.iter() {
            match statement {
                Statement::Binding {
                    exported: true,
                    name,
                    ..
                } => {
                    exports.insert(name.clone());
                }
                Statement::ExportStar { specifier } => {
                    match self.resolve(path, specifier, environment) {
                        Resolution::File(target) => {
                            exports.extend(self.exports_of(&target, environment, visiting));
                        }
                        Resolution::Ambient(members) => exports.extend(members),
                        Resolution::Unresolved => {}
                    }
                }
                _ => {}
            }
        }
        exports
    }

    /// Typings files reachable from the configured roots through references.
    fn typings_closure(&self) -> BTreeSet<String> {
        let mut reachable = BTreeSet::new();
        let mut pending: Vec<String> = self.options.types.clone();

        while let Some(path) = pending.pop() {
            if !reachable.insert(path.clone()) {
                continue;
            }
            if let Some(parsed) = self.read(&path) {
                for statement in parsed.iter() {
                    if let Statement::Reference { path: target } = statement {
                        pending.push(join_relative(&path, target));
                    }
                }
            }
        }
        reachable
    }

    fn analyze(&self, path: &str) -> Result<Analysis, EngineError> {
        if !self.has_file(path) {
            return Err(EngineError::UnknownFile(path.to_string()));
        }
        let parsed = self
            .read(path)
            .ok_or_else(|| EngineError::failed(path, "source content is unavailable"))?;
        if parsed.iter().any(|s| *s == Statement::Crash) {
            return Err(EngineError::failed(path, "internal compiler failure"));
        }

        let mut environment = Environment::default();
        let mut references = References::default();

        if !self.options.types.is_empty() {
            let typings = self.typings_closure();
            for file in &typings {
                if let Some(parsed) = self.read(file) {
                    environment.absorb(&parsed);
                }
            }
            references.typings = Some(typings);
        }

        let mut semantic = Vec::new();
        let error = |code: u32, message: String, at: &Located| {
            Diagnostic::new(code, message, at.span).with_location(at.loc)
        };

        for located in &parsed.statements {
            if let Statement::Reference { path: target } = &located.statement {
                let target = join_relative(path, target);
                match self.read(&target) {
                    Some(referenced) => environment.absorb(&referenced),
                    None => semantic.push(error(
                        FILE_NOT_FOUND,
                        format!("File '{}' not found.", target),
                        located,
                    )),
                }
                references.ref_files.insert(target);
            }
        }

        // Own declarations are visible everywhere in the unit, imports included.
        environment.absorb(&parsed);
        let mut scope: BTreeSet<String> = environment.globals.keys().cloned().collect();
        for statement in parsed.iter() {
            if let Statement::Import { names, .. } = statement {
                scope.extend(names.iter().cloned());
            }
        }

        for located in &parsed.statements {
            match &located.statement {
                Statement::Import { names, specifier } => {
                    match self.resolve(path, specifier, &environment) {
                        Resolution::File(target) => {
                            let exports =
                                self.exports_of(&target, &environment, &mut BTreeSet::new());
                            for name in names.iter().filter(|n| !exports.contains(*n)) {
                                semantic.push(error(
                                    NO_EXPORTED_MEMBER,
                                    format!(
                                        "Module '{}' has no exported member '{}'.",
                                        specifier, name
                                    ),
                                    located,
                                ));
                            }
                            self.collect_modules(&target, &environment, &mut references.modules);
                        }
                        Resolution::Ambient(members) => {
                            for name in names.iter().filter(|n| !members.contains(*n)) {
                                semantic.push(error(
                                    NO_EXPORTED_MEMBER,
                                    format!(
                                        "Module '{}' has no exported member '{}'.",
                                        specifier, name
                                    ),
                                    located,
                                ));
                            }
                        }
                        Resolution::Unresolved => semantic.push(unresolved(specifier, located)),
                    }
                }
                Statement::ExportStar { specifier } => {
                    match self.resolve(path, specifier, &environment) {
                        Resolution::File(target) => {
                            self.collect_modules(&target, &environment, &mut references.modules);
                        }
                        Resolution::Ambient(_) => {}
                        Resolution::Unresolved => semantic.push(unresolved(specifier, located)),
                    }
                }
                Statement::Binding {
                    value: Value::Ident(name),
                    ..
                } if !scope.contains(name) => {
                    semantic.push(error(
                        CANNOT_FIND_NAME,
                        format!("Cannot find name '{}'.", name),
                        located,
                    ));
                }
                _ => {}
            }
        }
        references.modules.remove(path);

        let diagnostics = Diagnostics::new(parsed.errors.clone(), semantic);
        Ok(Analysis {
            parsed,
            environment,
            diagnostics,
            references,
        })
    }

    fn emit(&self, path: &str, module_name: Option<&str>, analysis: &Analysis) -> Option<String> {
        if path.ends_with(".d.ts") {
            return None;
        }

        let var = |keyword: Keyword| match (self.options.target, keyword) {
            (Target::Es5, _) => "var",
            (_, Keyword::Const) => "const",
            (_, Keyword::Let) => "let",
        };
        let esm = self.options.module == ModuleKind::EsNext;
        let locals: BTreeSet<&str> = analysis
            .parsed
            .iter()
            .filter_map(|s| match s {
                Statement::Binding { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();

        let mut lines = Vec::new();
        for statement in analysis.parsed.iter() {
            match statement {
                Statement::Import { names, specifier } => {
                    let names = names.join(", ");
                    if esm {
                        lines.push(format!("import {{ {} }} from \"{}\";", names, specifier));
                    } else {
                        lines.push(format!(
                            "{} {{ {} }} = require(\"{}\");",
                            var(Keyword::Const),
                            names,
                            specifier
                        ));
                    }
                }
                Statement::ExportStar { specifier } => {
                    if esm {
                        lines.push(format!("export * from \"{}\";", specifier));
                    } else {
                        lines.push(format!(
                            "__exportStar(require(\"{}\"), exports);",
                            specifier
                        ));
                    }
                }
                Statement::Binding {
                    exported,
                    keyword,
                    name,
                    value,
                } => {
                    let value = match value {
                        Value::Literal(literal) => literal.clone(),
                        // Constants from referenced files are inlined.
                        Value::Ident(ident) if !locals.contains(ident.as_str()) => analysis
                            .environment
                            .globals
                            .get(ident)
                            .cloned()
                            .flatten()
                            .unwrap_or_else(|| ident.clone()),
                        Value::Ident(ident) => ident.clone(),
                    };
                    match (*exported, esm) {
                        (true, true) => lines.push(format!(
                            "export {} {} = {};",
                            var(*keyword),
                            name,
                            value
                        )),
                        (true, false) => lines.push(format!("exports.{} = {};", name, value)),
                        (false, _) => {
                            lines.push(format!("{} {} = {};", var(*keyword), name, value))
                        }
                    }
                }
                Statement::Reference { .. }
                | Statement::DeclareModule { .. }
                | Statement::DeclareConst { .. }
                | Statement::Crash => {}
            }
        }

        if lines.is_empty() {
            return None;
        }
        if self.options.strict && !esm {
            lines.insert(0, "\"use strict\";".to_string());
        }
        if let Some(name) = module_name {
            lines.insert(0, format!("/// <amd-module name=\"{}\" />", name));
        }

        let mut code = lines.join("\n");
        code.push('\n');
        Some(code)
    }
}

fn unresolved(specifier: &str, at: &Located) -> Diagnostic {
    Diagnostic::new(
        CANNOT_FIND_MODULE,
        format!(
            "Cannot find module '{}' or its corresponding type declarations.",
            specifier
        ),
        at.span,
    )
    .with_location(at.loc)
    .unresolved_module()
}

impl CompilerEngine for ToyEngine {
    fn set_files(
        &mut self,
        paths: &[String],
        source: Arc<dyn SourceProvider>,
        options: &CompileOptions,
    ) {
        self.files = paths.iter().cloned().collect();
        self.source = Some(source);
        self.options = options.clone();
    }

    fn has_file(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn compile(
        &mut self,
        path: &str,
        module_name: Option<&str>,
    ) -> Result<EngineOutput, EngineError> {
        self.compile_calls += 1;
        let analysis = self.analyze(path)?;
        let code = self.emit(path, module_name, &analysis);
        Ok(EngineOutput {
            code,
            diagnostics: analysis.diagnostics,
            references: analysis.references,
        })
    }

    fn diagnostics(&mut self, path: &str) -> Result<DiagnosticsReport, EngineError> {
        self.diagnostics_calls += 1;
        let analysis = self.analyze(path)?;
        Ok(DiagnosticsReport {
            diagnostics: analysis.diagnostics,
            references: analysis.references,
        })
    }
}

/// Options for tests: defaults with the given typings roots.
pub fn options_with_types(types: &[&str]) -> CompileOptions {
    CompileOptions::new().with_types(types.iter().copied())
}

/// Collects the codes of semantic diagnostics.
pub fn semantic_codes(diagnostics: &Diagnostics) -> Vec<u32> {
    diagnostics.semantic.iter().map(|d| d.code).collect()
}

/// The module sets recorded in `modules`, as plain paths.
pub fn module_paths<V>(modules: &BTreeMap<String, V>) -> Vec<&str> {
    modules.keys().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySource;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn engine(source: MemorySource, options: &CompileOptions) -> ToyEngine {
        let mut engine = ToyEngine::new("os");
        let paths = source.paths();
        engine.set_files(&paths, Arc::new(source), options);
        engine
    }

    #[rstest]
    #[case::reference(r#"/// <reference path="b.ts" />"#, true)]
    #[case::import(r#"import { a, b } from "./b";"#, true)]
    #[case::export_star(r#"export * from "./b";"#, true)]
    #[case::export_const("export const foo = 'foo'", true)]
    #[case::let_binding("let x = 1;", true)]
    #[case::declare_module(r#"declare module "pkg" { export const a: string; }"#, true)]
    #[case::declare_const("declare const g: number;", true)]
    #[case::comment("// nothing to see", true)]
    #[case::garbage("function (", false)]
    #[case::bad_value("const x = 1 + 2;", false)]
    fn test_parse_line(#[case] line: &str, #[case] valid: bool) {
        let parsed = parse(line);
        assert_eq!(parsed.errors.is_empty(), valid);
    }

    #[test]
    fn test_emit_commonjs() {
        let source = MemorySource::new().with_file("a.ts", "export const foo = 'foo'");
        let mut engine = engine(source, &CompileOptions::new());

        let output = engine.compile("a.ts", None).unwrap();
        assert_eq!(output.code.as_deref(), Some("exports.foo = 'foo';\n"));
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.references, References::default());
        assert_eq!(engine.compile_calls(), 1);
    }

    #[test]
    fn test_emit_esnext_es5() {
        let mut options = CompileOptions::new();
        options.module = ModuleKind::EsNext;
        options.target = Target::Es5;
        let source = MemorySource::new()
            .with_file("a.ts", "import { b } from \"./b\";\nexport const a = b;\nlet c = 1;")
            .with_file("b.ts", "export const b = 1;");
        let mut engine = engine(source, &options);

        let code = engine.compile("a.ts", None).unwrap().code.unwrap();
        assert_eq!(
            code,
            "import { b } from \"./b\";\nexport var a = b;\nvar c = 1;\n"
        );
    }

    #[test]
    fn test_emit_module_name() {
        let source = MemorySource::new().with_file("a.ts", "const a = 1;");
        let mut engine = engine(source, &CompileOptions::new());

        let code = engine.compile("a.ts", Some("pkg/a")).unwrap().code.unwrap();
        assert_eq!(code, "/// <amd-module name=\"pkg/a\" />\nconst a = 1;\n");
    }

    #[test]
    fn test_declaration_file_emits_nothing() {
        let source = MemorySource::new().with_file("t.d.ts", "declare const g: number;");
        let mut engine = engine(source, &CompileOptions::new());
        assert_eq!(engine.compile("t.d.ts", None).unwrap().code, None);
    }

    #[test]
    fn test_reexports_are_flattened() {
        let source = MemorySource::new()
            .with_file("a.ts", "import { c } from \"./b\";\nexport const a = c;")
            .with_file("b.ts", "export * from \"./c\";")
            .with_file("c.ts", "export const c = 1;");
        let mut engine = engine(source, &CompileOptions::new());

        let output = engine.compile("a.ts", None).unwrap();
        assert!(output.diagnostics.is_empty());
        assert_eq!(
            output.references.modules,
            BTreeSet::from(["b.ts".to_string(), "c.ts".to_string()])
        );
    }

    #[test]
    fn test_missing_export() {
        let source = MemorySource::new()
            .with_file("a.ts", "import { gone } from \"./b\";")
            .with_file("b.ts", "export const b = 1;");
        let mut engine = engine(source, &CompileOptions::new());

        let diagnostics = engine.diagnostics("a.ts").unwrap().diagnostics;
        assert_eq!(semantic_codes(&diagnostics), vec![NO_EXPORTED_MEMBER]);
        assert_eq!(
            diagnostics.semantic[0].message,
            "Module './b' has no exported member 'gone'."
        );
        assert_eq!(engine.diagnostics_calls(), 1);
    }

    #[test]
    fn test_unresolved_module() {
        let source = MemorySource::new().with_file("a.ts", "import { x } from \"./nowhere\";");
        let mut engine = engine(source, &CompileOptions::new());

        let diagnostics = engine.compile("a.ts", None).unwrap().diagnostics;
        assert_eq!(semantic_codes(&diagnostics), vec![CANNOT_FIND_MODULE]);
        assert!(diagnostics.has_unresolved_module());
    }

    #[test]
    fn test_reference_globals_are_inlined() {
        let source = MemorySource::new()
            .with_file("a.ts", "/// <reference path=\"lib/b.ts\" />\nexport const a = b;")
            .with_file("lib/b.ts", "const b = 42;");
        let mut engine = engine(source, &CompileOptions::new());

        let output = engine.compile("a.ts", None).unwrap();
        assert_eq!(output.code.as_deref(), Some("exports.a = 42;\n"));
        assert_eq!(
            output.references.ref_files,
            BTreeSet::from(["lib/b.ts".to_string()])
        );
    }

    #[test]
    fn test_missing_reference_and_name() {
        let source = MemorySource::new()
            .with_file("a.ts", "/// <reference path=\"b.ts\" />\nexport const a = b;");
        let mut engine = engine(source, &CompileOptions::new());

        let diagnostics = engine.compile("a.ts", None).unwrap().diagnostics;
        assert_eq!(
            semantic_codes(&diagnostics),
            vec![FILE_NOT_FOUND, CANNOT_FIND_NAME]
        );
    }

    #[test]
    fn test_ambient_typings() {
        let source = MemorySource::new()
            .with_file("a.ts", "import { foo } from \"lib\";\nexport const a = g;")
            .with_file("typings/index.d.ts", "/// <reference path=\"lib.d.ts\" />\ndeclare const g: number;")
            .with_file("typings/lib.d.ts", "declare module \"lib\" { export const foo: string; }");
        let options = options_with_types(&["typings/index.d.ts"]);
        let mut engine = engine(source, &options);

        let output = engine.compile("a.ts", None).unwrap();
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        assert_eq!(
            output.references.typings,
            Some(BTreeSet::from([
                "typings/index.d.ts".to_string(),
                "typings/lib.d.ts".to_string()
            ]))
        );
        assert!(output.references.modules.is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let source = MemorySource::new().with_file("a.ts", "const a = 1;\nwhat is this");
        let mut engine = engine(source, &CompileOptions::new());

        let diagnostics = engine.compile("a.ts", None).unwrap().diagnostics;
        assert_eq!(diagnostics.syntactic.len(), 1);
        assert_eq!(diagnostics.syntactic[0].code, STATEMENT_EXPECTED);
        assert_eq!(diagnostics.syntactic[0].loc.unwrap().start.line, 2);
        assert_eq!(diagnostics.syntactic[0].span, Span::new(13, 25));
    }

    #[test]
    fn test_crash_and_unknown_file() {
        let source = MemorySource::new().with_file("a.ts", "#!crash");
        let mut engine = engine(source, &CompileOptions::new());

        assert!(matches!(
            engine.compile("a.ts", None),
            Err(EngineError::Failed { .. })
        ));
        assert!(matches!(
            engine.compile("b.ts", None),
            Err(EngineError::UnknownFile(_))
        ));
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("a.ts", "./b"), "b");
        assert_eq!(join_relative("src/a.ts", "./b"), "src/b");
        assert_eq!(join_relative("src/x/a.ts", "../b.ts"), "src/b.ts");
        assert_eq!(join_relative("src/a.ts", "lib/b.ts"), "src/lib/b.ts");
    }
}
