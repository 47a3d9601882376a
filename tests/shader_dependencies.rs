use std::path::PathBuf;

use pngb_codegen::{
    CompiledProgram, DeclKind, EmitError, EmitMode, EmitOptions,
    bytecode::{Instruction, MAGIC, ShaderSource, decode_instructions},
    dsl::{self, DeclNode, ProgramDSL, PropValue},
    emit_program,
};

fn case_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
        .join("emit")
}

fn fragment(value: &str, imports: &[&str]) -> DeclNode {
    let node = DeclNode::new().with("value", PropValue::string(value));
    if imports.is_empty() {
        return node;
    }
    node.with(
        "imports",
        PropValue::List(imports.iter().map(|n| PropValue::ident(*n)).collect()),
    )
}

fn shader_module(code: PropValue) -> DeclNode {
    DeclNode::new().with("code", code)
}

fn program(fragments: Vec<(&str, DeclNode)>) -> ProgramDSL {
    ProgramDSL {
        wgsl: fragments
            .into_iter()
            .map(|(name, node)| (name.to_string(), node))
            .collect(),
        ..ProgramDSL::default()
    }
}

fn emit(program: &ProgramDSL) -> CompiledProgram {
    emit_program(program, &EmitOptions::default()).unwrap_or_else(|e| panic!("emit failed: {e}"))
}

fn created_shaders(compiled: &CompiledProgram) -> Vec<(u32, ShaderSource)> {
    decode_instructions(compiled.artifact.opcodes.as_bytes())
        .unwrap()
        .into_iter()
        .filter_map(|ins| match ins {
            Instruction::CreateShaderModule { handle, source } => Some((handle, source)),
            Instruction::End => None,
        })
        .collect()
}

fn handles(compiled: &CompiledProgram) -> Vec<u32> {
    created_shaders(compiled).into_iter().map(|(h, _)| h).collect()
}

fn resolved(compiled: &CompiledProgram, name: &str) -> String {
    compiled
        .resolved_code(name)
        .unwrap_or_else(|| panic!("no resolved code for {name}"))
        .into_owned()
}

fn assert_dependency_first(compiled: &CompiledProgram) {
    for entry in compiled.registry.entries() {
        for &dep in &entry.deps {
            assert!(
                dep < entry.id,
                "module {} ({}) depends on later module {dep}",
                entry.name,
                entry.id
            );
        }
    }
}

#[test]
fn diamond_dependency_is_included_once() {
    let p = program(vec![
        ("D", fragment("// MARK_D", &[])),
        ("B", fragment("// MARK_B", &["D"])),
        ("C", fragment("// MARK_C", &["D"])),
        ("shader", fragment("// MARK_SHADER", &["B", "C"])),
    ]);
    let compiled = emit(&p);
    let code = resolved(&compiled, "shader");

    assert_eq!(code.matches("MARK_D").count(), 1);
    assert_eq!(code, "// MARK_D\n// MARK_B\n// MARK_C\n// MARK_SHADER");
    assert_dependency_first(&compiled);
}

#[test]
fn chain_is_emitted_dependency_first_regardless_of_declaration_order() {
    let p = program(vec![
        ("L5", fragment("// <L5>", &["L4"])),
        ("L4", fragment("// <L4>", &["L3"])),
        ("L3", fragment("// <L3>", &["L2"])),
        ("L2", fragment("// <L2>", &["L1"])),
        ("L1", fragment("// <L1>", &[])),
    ]);
    let compiled = emit(&p);
    let code = resolved(&compiled, "L5");

    for i in 1..=5 {
        assert_eq!(code.matches(&format!("<L{i}>")).count(), 1, "marker L{i}");
    }
    let first = code.find("<L1>").unwrap();
    let last = code.find("<L5>").unwrap();
    assert!(first < last);

    let order: Vec<&str> = compiled
        .registry
        .entries()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(order, vec!["L1", "L2", "L3", "L4", "L5"]);
    assert_dependency_first(&compiled);
}

#[test]
fn empty_fragments_do_not_consume_shader_handles() {
    let p = program(vec![
        ("first", fragment("", &[])),
        ("second", fragment("fn second() {}", &[])),
        ("third", fragment("fn third() {}", &[])),
    ]);
    let compiled = emit(&p);

    assert_eq!(handles(&compiled), vec![0, 1]);
    assert_eq!(compiled.shader_handle(DeclKind::Wgsl, "first"), None);
    assert_eq!(compiled.shader_handle(DeclKind::Wgsl, "second"), Some(0));
    assert_eq!(compiled.shader_handle(DeclKind::Wgsl, "third"), Some(1));
    assert_eq!(compiled.registry.id_of("first"), None);
}

#[test]
fn sixteen_independent_imports_each_appear_once() {
    let names: Vec<String> = (0..16).map(|i| format!("f{i}")).collect();
    let mut fragments: Vec<(&str, DeclNode)> = Vec::new();
    let values: Vec<String> = (0..16).map(|i| format!("// <f{i}>")).collect();
    for (name, value) in names.iter().zip(&values) {
        fragments.push((name.as_str(), fragment(value, &[])));
    }
    let imports: Vec<&str> = names.iter().map(String::as_str).collect();
    fragments.push(("all", fragment("// <all>", &imports)));

    let compiled = emit(&program(fragments));
    let code = resolved(&compiled, "all");
    for i in 0..16 {
        assert_eq!(code.matches(&format!("<f{i}>")).count(), 1, "marker f{i}");
    }
    assert!(code.ends_with("// <all>"));
}

#[test]
fn self_import_terminates_and_is_emitted() {
    let p = program(vec![("selfish", fragment("fn s() {}", &["selfish"]))]);
    let compiled = emit(&p);

    assert_eq!(handles(&compiled), vec![0]);
    let entry = compiled.registry.entry(0).unwrap();
    assert!(entry.deps.is_empty());
    assert_eq!(resolved(&compiled, "selfish"), "fn s() {}");
}

#[test]
fn mutual_imports_terminate_with_every_fragment_emitted() {
    let p = program(vec![
        ("a", fragment("// a", &["b"])),
        ("b", fragment("// b", &["a"])),
        ("c", fragment("// c", &["a", "b"])),
    ]);
    let compiled = emit(&p);

    assert_eq!(handles(&compiled), vec![0, 1, 2]);
    assert_dependency_first(&compiled);
    // Drained in declaration order: a first (its import of b is dropped), then b.
    assert_eq!(resolved(&compiled, "b"), "// a\n// b");
    assert_eq!(resolved(&compiled, "c"), "// a\n// b\n// c");
}

#[test]
fn undeclared_imports_are_dropped() {
    let p = program(vec![("lonely", fragment("fn lonely() {}", &["ghost", "phantom"]))]);
    let compiled = emit(&p);
    assert_eq!(resolved(&compiled, "lonely"), "fn lonely() {}");
    assert!(compiled.registry.entry(0).unwrap().deps.is_empty());
}

#[test]
fn duplicate_imports_are_deduplicated_structurally() {
    let mut p = program(vec![("base", fragment("// base", &[]))]);
    p.wgsl.insert(
        "top".to_string(),
        DeclNode::new()
            .with("value", PropValue::string("// top"))
            .with(
                "imports",
                PropValue::List(vec![
                    PropValue::ident("base"),
                    PropValue::string("$wgsl.base"),
                ]),
            ),
    );
    let compiled = emit(&p);
    let top = compiled.registry.id_of("top").unwrap();
    assert_eq!(compiled.registry.entry(top).unwrap().deps, vec![0]);
    assert_eq!(resolved(&compiled, "top"), "// base\n// top");
}

#[test]
fn defines_and_math_constants_are_substituted_before_storage() {
    let mut p = program(vec![(
        "consts",
        fragment("const PI: f32 = 3.0;\nlet n = COUNT;\nlet t = TAU;", &[]),
    )]);
    p.defines.insert("COUNT".to_string(), serde_json::json!(64));
    let compiled = emit(&p);

    let code = resolved(&compiled, "consts");
    assert_eq!(code, "const PI: f32 = 3.0;\nlet n = 64;\nlet t = 6.283185307179586;");

    let entry = compiled.registry.entry(0).unwrap();
    let stored = compiled.artifact.data.blob(entry.blob).unwrap();
    assert_eq!(stored, code.as_bytes());
}

#[test]
fn shader_modules_share_the_dense_handle_run() {
    let mut p = program(vec![
        ("blank", fragment("", &[])),
        ("ok", fragment("fn ok() {}", &[])),
    ]);
    p.shader_modules
        .insert("from_blank".to_string(), shader_module(PropValue::string("$wgsl.blank")));
    p.shader_modules
        .insert("missing".to_string(), shader_module(PropValue::ident("nowhere")));
    p.shader_modules
        .insert("from_ok".to_string(), shader_module(PropValue::ident("ok")));
    p.shader_modules.insert(
        "inline".to_string(),
        shader_module(PropValue::string("fn inline_main() {}")).with(
            "imports",
            PropValue::List(vec![PropValue::ident("ok")]),
        ),
    );
    p.shader_modules
        .insert("empty_inline".to_string(), shader_module(PropValue::string("")));

    let compiled = emit(&p);
    assert_eq!(handles(&compiled), vec![0, 1, 2]);
    assert_eq!(compiled.shader_handle(DeclKind::Wgsl, "ok"), Some(0));
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "from_blank"), None);
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "missing"), None);
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "from_ok"), Some(1));
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "inline"), Some(2));

    let shaders = created_shaders(&compiled);
    let (_, ShaderSource::Blob(inline_blob)) = shaders[2] else {
        panic!("legacy mode should point at a blob");
    };
    assert_eq!(
        compiled.artifact.data.blob(inline_blob).unwrap(),
        b"fn ok() {}\nfn inline_main() {}"
    );
}

#[test]
fn legacy_mode_points_at_resolved_blobs() {
    let p = program(vec![
        ("lib", fragment("fn lib() {}", &[])),
        ("app", fragment("fn app() {}", &["lib"])),
    ]);
    let compiled = emit(&p);
    for (handle, source) in created_shaders(&compiled) {
        let ShaderSource::Blob(blob) = source else {
            panic!("handle {handle}: expected a blob source");
        };
        let name = if handle == 0 { "lib" } else { "app" };
        assert_eq!(
            compiled.artifact.data.blob(blob).unwrap(),
            resolved(&compiled, name).as_bytes()
        );
    }
}

#[test]
fn runtime_mode_points_at_dependency_table_modules() {
    let mut p = program(vec![
        ("lib", fragment("fn lib() {}", &[])),
        ("app", fragment("fn app() {}", &["lib"])),
    ]);
    p.shader_modules.insert(
        "main".to_string(),
        shader_module(PropValue::string("fn main_entry() {}"))
            .with("imports", PropValue::List(vec![PropValue::ident("app")])),
    );
    let options = EmitOptions {
        mode: EmitMode::Runtime,
        ..EmitOptions::default()
    };
    let compiled = emit_program(&p, &options).unwrap();

    let sources: Vec<ShaderSource> = created_shaders(&compiled).into_iter().map(|(_, s)| s).collect();
    assert_eq!(
        sources,
        vec![
            ShaderSource::Module(0),
            ShaderSource::Module(1),
            ShaderSource::Module(2)
        ]
    );

    let table = &compiled.artifact.dependencies;
    assert_eq!(table.len(), compiled.registry.len());
    for entry in compiled.registry.entries() {
        let row = table.entry(entry.id).unwrap();
        assert_eq!(row.blob, entry.blob);
        assert_eq!(row.deps, entry.deps);
    }
    assert_eq!(compiled.registry.lookup(DeclKind::ShaderModule, "main"), Some(2));
    assert_eq!(compiled.registry.id_of("main"), None);
    assert_eq!(compiled.registry.entry(2).unwrap().deps, vec![1]);
    assert_eq!(compiled.summary().mode, EmitMode::Runtime);
}

#[test]
fn inline_shader_module_names_never_clash_with_fragments() {
    let mut p = program(vec![
        ("shaderModule.main", fragment("fn dotted() {}", &[])),
        ("main", fragment("fn frag_main() {}", &[])),
    ]);
    p.shader_modules.insert(
        "main".to_string(),
        shader_module(PropValue::string("fn inline_main() {}")).with(
            "imports",
            PropValue::List(vec![PropValue::ident("shaderModule.main")]),
        ),
    );
    let options = EmitOptions {
        mode: EmitMode::Runtime,
        ..EmitOptions::default()
    };
    let compiled = emit_program(&p, &options).unwrap();

    let inline = compiled
        .registry
        .lookup(DeclKind::ShaderModule, "main")
        .unwrap();
    assert_eq!(inline, 2);
    assert_eq!(compiled.registry.id_of("shaderModule.main"), Some(0));
    assert_eq!(compiled.registry.id_of("main"), Some(1));
    assert_eq!(compiled.registry.entry(inline).unwrap().deps, vec![0]);
    assert_eq!(handles(&compiled), vec![0, 1, 2]);
    assert_eq!(
        created_shaders(&compiled)[2].1,
        ShaderSource::Module(inline)
    );
}

#[test]
fn registry_offsets_match_the_data_section() {
    let p = dsl::load_program_from_path(case_dir().join("diamond.json")).unwrap();
    for mode in [EmitMode::Legacy, EmitMode::Runtime] {
        let options = EmitOptions {
            mode,
            ..EmitOptions::default()
        };
        let compiled = emit_program(&p, &options).unwrap();
        for entry in compiled.registry.entries() {
            assert_eq!(
                compiled.artifact.data.offset(entry.blob),
                Some(entry.data_offset),
                "{mode:?}: {}",
                entry.name
            );
        }
    }
}

#[test]
fn both_modes_agree_on_module_order_and_content() {
    let p = dsl::load_program_from_path(case_dir().join("diamond.json")).unwrap();
    let legacy = emit_program(&p, &EmitOptions::default()).unwrap();
    let runtime = emit_program(
        &p,
        &EmitOptions {
            mode: EmitMode::Runtime,
            ..EmitOptions::default()
        },
    )
    .unwrap();

    let describe = |c: &CompiledProgram| -> Vec<(String, Vec<u32>, Vec<u8>)> {
        c.registry
            .entries()
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    e.deps.clone(),
                    c.artifact.data.blob(e.blob).unwrap().to_vec(),
                )
            })
            .collect()
    };
    assert_eq!(describe(&legacy), describe(&runtime));
}

#[test]
fn file_backed_fragments_are_loaded_relative_to_base_dir() {
    let dir = case_dir();
    let p = dsl::load_program_from_path(dir.join("file_fragments.json")).unwrap();
    let options = EmitOptions {
        base_dir: dir.clone(),
        ..EmitOptions::default()
    };
    let compiled = emit_program(&p, &options).unwrap();

    let common = std::fs::read_to_string(dir.join("shaders").join("common.wgsl")).unwrap();
    let scene = resolved(&compiled, "scene");
    assert_eq!(scene.matches("fn common()").count(), 1);
    assert!(scene.starts_with(&common));
    assert!(scene.contains("fn noise("));
    assert!(scene.contains("// ./inline source, not a path"));
    assert_eq!(handles(&compiled), vec![0, 1, 2, 3, 4]);
}

#[test]
fn missing_source_file_fails_the_whole_pass() {
    let p = program(vec![
        ("ok", fragment("fn ok() {}", &[])),
        ("gone", fragment("./does/not/exist.wgsl", &[])),
    ]);
    let options = EmitOptions {
        base_dir: case_dir(),
        ..EmitOptions::default()
    };
    let err = emit_program(&p, &options).unwrap_err();
    assert!(matches!(err, EmitError::FileRead { .. }), "got {err}");
}

#[test]
fn validation_accepts_resolved_wgsl() {
    let p = dsl::load_program_from_path(case_dir().join("diamond.json")).unwrap();
    let options = EmitOptions {
        validate_wgsl: true,
        ..EmitOptions::default()
    };
    let compiled = emit_program(&p, &options).unwrap();
    let shader = resolved(&compiled, "shader");
    assert!(shader.contains("const STEPS: u32 = 32;"));
    assert!(shader.contains("return 3.141592653589793 / f32(STEPS);"));
}

#[test]
fn validation_failure_is_fatal_and_names_the_declaration() {
    let mut p = program(vec![("ok", fragment("fn ok() {}", &[]))]);
    p.shader_modules.insert(
        "broken".to_string(),
        shader_module(PropValue::string("fn broken( {")),
    );
    let options = EmitOptions {
        validate_wgsl: true,
        ..EmitOptions::default()
    };
    let err = emit_program(&p, &options).unwrap_err();
    match err {
        EmitError::InvalidWgsl { name, message } => {
            assert_eq!(name, "broken");
            assert!(message.contains("shaderModule broken"));
        }
        other => panic!("expected InvalidWgsl, got {other}"),
    }
}

#[test]
fn artifact_bytes_start_with_the_container_header() {
    let p = program(vec![("ok", fragment("fn ok() {}", &[]))]);
    let bytes = emit(&p).to_bytes();
    assert_eq!(&bytes[..4], MAGIC);
}

fn list_json_cases() -> Vec<PathBuf> {
    let mut cases: Vec<PathBuf> = std::fs::read_dir(case_dir())
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    cases.sort();
    cases
}

#[test]
fn json_cases_emit_dense_handles_in_both_modes() {
    let cases = list_json_cases();
    assert!(!cases.is_empty(), "expected *.json cases in {}", case_dir().display());

    for path in cases {
        let case_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("case").to_string();
        let p = dsl::load_program_from_path(&path)
            .unwrap_or_else(|e| panic!("case {case_name}: load failed: {e:#}"));

        for mode in [EmitMode::Legacy, EmitMode::Runtime] {
            let options = EmitOptions {
                base_dir: case_dir(),
                mode,
                validate_wgsl: false,
            };
            let compiled = emit_program(&p, &options)
                .unwrap_or_else(|e| panic!("case {case_name} ({mode:?}): emit failed: {e}"));

            let hs = handles(&compiled);
            let expected: Vec<u32> = (0..hs.len() as u32).collect();
            assert_eq!(hs, expected, "case {case_name} ({mode:?}): handles must be dense");
            assert_eq!(compiled.shaders.count() as usize, hs.len());
            assert_dependency_first(&compiled);
        }
    }
}

#[test]
fn cycles_case_skips_only_the_empty_fragment() {
    let p = dsl::load_program_from_path(case_dir().join("cycles.json")).unwrap();
    let compiled = emit(&p);

    for name in ["selfish", "ping", "pong", "tail"] {
        assert!(compiled.shader_handle(DeclKind::Wgsl, name).is_some(), "{name}");
    }
    assert_eq!(compiled.shader_handle(DeclKind::Wgsl, "blank"), None);
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "from_blank"), None);
    assert_eq!(compiled.shader_handle(DeclKind::ShaderModule, "from_tail"), Some(4));

    let tail = resolved(&compiled, "tail");
    assert_eq!(tail.matches("fn ping()").count(), 1);
    assert_eq!(tail.matches("fn pong()").count(), 1);
}
