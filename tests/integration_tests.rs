//! Integration tests for the confgen compiler
//!
//! These tests drive the public API from YAML text to emitted C++.

use confgen::{
    compile_str, cpp_string_escape, load_str, validate, Binding, CompileOptions, Compiler,
    ConfgenError, ConfigId, Expression, IdRegistry, MapSchema, TypeTag, Validator,
};
use pretty_assertions::assert_eq;

const CORE: &str = r#"
core:
  name: livingroom
  platform: ESP8266
  board: nodemcuv2
"#;

fn compile(source: &str) -> Result<confgen::Program, ConfgenError> {
    compile_str(source, CompileOptions::new("/cfg"))
}

fn fragment_lines(source: &str) -> Vec<String> {
    compile(source)
        .unwrap()
        .fragment()
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_custom_switch_with_three_switches() {
    let source = format!(
        "{}{}",
        CORE,
        r#"
switch:
  - platform: custom
    id: relays
    lambda: |-
      auto a = new Relay(4);
      auto b = new Relay(5);
      auto c = new Relay(12);
      return {a, b, c};
    switches:
      - name: "Relay A"
        id: relay_a
      - name: "Relay B"
        id: relay_b
      - name: "Relay C"
        id: relay_c
"#
    );
    let lines = fragment_lines(&source);
    let body: Vec<&str> = lines.iter().skip(2).map(String::as_str).collect();
    assert_eq!(
        body,
        vec![
            "relays = new switch_::CustomSwitchConstructor([=]() -> std::vector<switch_::Switch *> {",
            "  auto a = new Relay(4);",
            "  auto b = new Relay(5);",
            "  auto c = new Relay(12);",
            "  return {a, b, c};",
            "});",
            "relay_a = relays->get_switch(0);",
            "relay_b = relays->get_switch(1);",
            "relay_c = relays->get_switch(2);",
            "relay_a->set_name(\"Relay A\");",
            "App.register_switch(relay_a);",
            "relay_b->set_name(\"Relay B\");",
            "App.register_switch(relay_b);",
            "relay_c->set_name(\"Relay C\");",
            "App.register_switch(relay_c);",
        ]
    );
}

#[test]
fn test_custom_constructor_referenced_from_boot_lambda() {
    let source = format!(
        "{}  on_boot:\n    - lambda: 'id(ctor).get_switch(0);'\n{}",
        CORE,
        "switch:\n  - platform: custom\n    id: ctor\n    lambda: 'return {new Relay(4)};'\n    switches:\n      - name: A\n"
    );
    let main = compile(&source).unwrap().main_cpp().unwrap();

    assert!(main.contains("switch_::CustomSwitchConstructor *ctor;"));
    assert!(main.contains("ctor = new switch_::CustomSwitchConstructor("));
    let use_site = main.find("ctor->get_switch(0);").unwrap();
    let binding = main.find("ctor = new switch_::CustomSwitchConstructor(").unwrap();
    assert!(use_site < binding);
    assert!(!main.contains("ctor.get_switch"));
    assert!(!main.contains("switch_::CustomSwitchConstructor ctor ="));
}

#[test]
fn test_main_cpp_layout() {
    let source = format!(
        "{}  includes:\n    - custom/relay.h\n{}",
        CORE,
        "switch:\n  - platform: template\n    name: Fan\n    id: fan\n    optimistic: true\n"
    );
    let program = compile(&source).unwrap();
    let main = program.main_cpp().unwrap();

    let include = main.find("#include \"esphomelib/application.h\"").unwrap();
    let user_include = main.find("#include \"../../custom/relay.h\"").unwrap();
    let namespace = main.find("using namespace esphomelib;").unwrap();
    let global = main.find("switch_::TemplateSwitch *fan;").unwrap();
    let setup = main.find("void setup() {").unwrap();
    let begin = main.find("// ========== AUTO GENERATED CODE BEGIN ===========").unwrap();
    let statement = main.find("  fan = App.register_component(").unwrap();
    let end = main.find("// =========== AUTO GENERATED CODE END ============").unwrap();
    let app_setup = main.find("App.setup();").unwrap();
    let app_loop = main.find("App.loop();").unwrap();

    assert!(include < user_include);
    assert!(user_include < namespace);
    assert!(namespace < global);
    assert!(global < setup);
    assert!(setup < begin && begin < statement && statement < end);
    assert!(end < app_setup && app_setup < app_loop);
}

#[test]
fn test_output_is_deterministic() {
    let source = format!(
        "{}  on_boot:\n    - delay: 1s\n    - lambda: 'ESP_LOGD(\"main\", \"boot\");'\n  on_loop:\n    - lambda: 'yield();'\nswitch:\n  - platform: template\n    name: A\n  - platform: template\n    name: B\n",
        CORE
    );
    let first = compile(&source).unwrap().main_cpp().unwrap();
    let second = compile(&source).unwrap().main_cpp().unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Identifiers
// ============================================================================

#[test]
fn test_generated_names_get_increasing_suffixes() {
    let source = format!(
        "{}switch:\n  - platform: template\n    name: A\n  - platform: template\n    name: B\n  - platform: template\n    name: C\n",
        CORE
    );
    let lines = fragment_lines(&source);
    let bound: Vec<&str> = lines
        .iter()
        .filter(|l| l.contains("new switch_::TemplateSwitch"))
        .map(|l| l.split(" = ").next().unwrap_or_default())
        .collect();
    assert_eq!(
        bound,
        vec!["switch__templateswitch", "switch__templateswitch_2", "switch__templateswitch_3"]
    );
}

#[test]
fn test_registry_suffixes_and_single_definition() {
    let mut registry = IdRegistry::new();
    let ty = TypeTag::new("int");
    let pins: Vec<confgen::Identifier> = (0..3)
        .map(|_| registry.declare("pin", ty.clone(), Binding::Value))
        .collect();
    let names: Vec<&str> = pins.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["pin", "pin_2", "pin_3"]);

    let pin = &pins[0];

    registry.define(pin, Expression::int(4)).unwrap();
    let err = registry.define(pin, Expression::int(5)).unwrap_err();
    assert!(matches!(err, ConfgenError::DuplicateDefinition { .. }));
}

#[test]
fn test_lookup_of_undeclared_identifier() {
    let registry = IdRegistry::new();
    let err = registry.resolve("ghost").unwrap_err();
    assert!(matches!(err, ConfgenError::UndeclaredIdentifier { ref name, .. } if name == "ghost"));
}

#[test]
fn test_forward_reference_between_switches() {
    let source = format!(
        "{}switch:\n  - platform: template\n    name: Fan\n    id: fan\n    turn_on_action:\n      - switch.turn_off: heater\n  - platform: template\n    name: Heater\n    id: heater\n",
        CORE
    );
    let lines = fragment_lines(&source);
    let use_line = lines
        .iter()
        .position(|l| l == "switch__turnoffaction = heater->make_turn_off_action<NoArg>();")
        .unwrap();
    let def_line = lines
        .iter()
        .position(|l| l.starts_with("heater = App.register_component("))
        .unwrap();
    assert!(use_line < def_line);
}

#[test]
fn test_duplicate_user_id() {
    let source = format!(
        "{}switch:\n  - platform: template\n    name: A\n    id: relay\n  - platform: template\n    name: B\n    id: relay\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "ID 'relay' redefined");
    assert_eq!(errors[0].path.to_string(), "switch[1].id");
}

#[test]
fn test_unknown_id_in_action_suggests() {
    let source = format!(
        "{}  on_boot:\n    - switch.turn_on: rellay\nswitch:\n  - platform: template\n    name: A\n    id: relay\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors[0].message, "couldn't find ID 'rellay'");
    assert_eq!(errors[0].help.as_deref(), Some("did you mean 'relay'?"));
}

#[test]
fn test_unknown_id_in_lambda_body() {
    let source = format!(
        "{}  on_boot:\n    - lambda: 'id(nothing)->turn_on();'\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    assert!(matches!(err, ConfgenError::UndeclaredIdentifier { ref name, .. } if name == "nothing"));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_string_escaping() {
    assert_eq!(cpp_string_escape("say \"hi\"\n"), "\"say \\042hi\\042\\012\"");
    assert_eq!(cpp_string_escape("plain text"), "\"plain text\"");
    assert_eq!(cpp_string_escape("back\\slash"), "\"back\\134slash\"");
}

#[test]
fn test_names_are_escaped_in_output() {
    let source = format!(
        "{}switch:\n  - platform: template\n    name: \"Quote \\\" Newline \\n\"\n    id: odd\n",
        CORE
    );
    let lines = fragment_lines(&source);
    assert!(lines.contains(
        &"odd = App.register_component(new switch_::TemplateSwitch(\"Quote \\042 Newline \\012\"));"
            .to_string()
    ));
}

#[test]
fn test_reference_to_undefined_identifier_fails_render() {
    let mut unit = confgen::CompilationUnit::new(confgen::BuildPaths::default());
    let id = ConfigId::declare("later", TypeTag::new("switch_::Switch"));
    unit.predeclare(&id);
    let target = unit.get(&id).unwrap();
    unit.add(Expression::raw("App").call("register_switch", vec![target]));
    let err = unit.finish(confgen::ConfigNode::root(confgen::Value::Null)).unwrap_err();
    match err {
        ConfgenError::Render { name, component, .. } => {
            assert_eq!(name, "later");
            assert_eq!(component, "core");
        }
        other => panic!("expected a render error, got {:?}", other),
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_mutually_exclusive_keys_single_error() {
    let schema = MapSchema::new()
        .optional("lambda", Validator::Lambda)
        .optional("state", Validator::Boolean)
        .exclusive(&["lambda", "state"]);
    let node = load_str("lambda: 'return true;'\nstate: true").unwrap();
    let errors = validate(&schema, &node).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("'lambda'"));
    assert!(errors[0].message.contains("'state'"));
}

#[test]
fn test_all_errors_reported_together() {
    let source = r#"
core:
  name: Living Room
  platform: arduino
  board: nodemcuv2
  bord_flash_mode: dio
switch:
  - platform: template
    name: Fan
    icon: fan
"#;
    let err = compile(source).unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].path.to_string(), "core");
    let core_paths: Vec<String> = errors[0].causes.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(
        core_paths,
        vec!["core.name", "core.platform", "core.bord_flash_mode"]
    );
    assert_eq!(
        errors[0].causes[2].help.as_deref(),
        Some("did you mean 'board_flash_mode'?")
    );
    assert_eq!(errors[1].path.to_string(), "switch[0].icon");
}

#[test]
fn test_reserved_word_rejected_as_id() {
    let source = format!(
        "{}switch:\n  - platform: template\n    name: Fan\n    id: new\n    optimistic: true\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    let errors = err.validation_errors().unwrap();
    let mut all: Vec<&confgen::ValidationError> = errors.iter().collect();
    let mut i = 0;
    while i < all.len() {
        let current: &confgen::ValidationError = all[i];
        all.extend(current.causes.iter());
        i += 1;
    }
    let reserved = all
        .iter()
        .find(|e| e.message.contains("reserved word"))
        .expect("reserved word error");
    assert_eq!(reserved.path.to_string(), "switch[0].id");
    assert!(reserved.help.is_some());
}

#[test]
fn test_validation_is_idempotent() {
    let source = format!(
        "{}  on_boot:\n    priority: 600\n    then:\n      - delay: 2min\n      - if:\n          condition:\n            switch.is_on: fan\n          then:\n            - switch.turn_off: fan\n  board_flash_mode: DOUT\nswitch:\n  - platform: template\n    name: Fan\n    id: fan\n    inverted: 'yes'\n    lambda: 'return {{}};'\n  - platform: custom\n    lambda: 'return {{}};'\n    switches:\n      name: Extra\n",
        CORE
    );
    let compiler = Compiler::new(CompileOptions::default());
    let once = compiler.validate(&load_str(&source).unwrap()).unwrap();
    let twice = compiler.validate(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_duration_without_unit() {
    let source = format!("{}  on_boot:\n    - delay: 10\n", CORE);
    let err = compile(&source).unwrap_err();
    let flat: Vec<String> = err
        .validation_errors()
        .unwrap()
        .iter()
        .flat_map(|e| e.flatten())
        .filter_map(|e| e.help.clone())
        .collect();
    assert!(flat.contains(&"did you mean '10s'?".to_string()));
}

// ============================================================================
// Lambdas and automations
// ============================================================================

#[test]
fn test_lambda_syntax_error_points_into_lambda() {
    let source = format!(
        "{}  on_boot:\n    - lambda: '(flaot x) -> void {{ }}'\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    match err {
        ConfgenError::LambdaSyntax { src, span, message } => {
            assert_eq!(src, "(flaot x) -> void { }");
            assert_eq!(span.offset(), 1);
            assert_eq!(span.len(), 5);
            assert!(message.contains("flaot"));
        }
        other => panic!("expected a lambda syntax error, got {:?}", other),
    }
}

#[test]
fn test_automation_argument_type_mismatch() {
    let source = format!(
        "{}  on_shutdown:\n    - lambda: '(NoArg x) -> void {{ }}'\n",
        CORE
    );
    let err = compile(&source).unwrap_err();
    match err {
        ConfgenError::ArgumentTypeMismatch {
            path,
            expected,
            found,
            ..
        } => {
            assert_eq!(path, "core.on_shutdown[0].then[0].lambda");
            assert_eq!(expected, "(const char *) -> void");
            assert_eq!(found, "(NoArg) -> void");
        }
        other => panic!("expected an argument type mismatch, got {:?}", other),
    }
}

#[test]
fn test_empty_automation_is_noop() {
    let source = format!("{}  on_loop: []\n", CORE);
    let lines = fragment_lines(&source);
    assert!(lines.contains(&"automation = App.make_automation<NoArg>(looptrigger);".to_string()));
    assert!(!lines.iter().any(|l| l.contains("add_actions")));
}

#[test]
fn test_nested_if_threads_argument_type() {
    let source = format!(
        "{}  on_shutdown:\n    - if:\n        condition:\n          lambda: 'return x != nullptr;'\n        then:\n          - lambda: 'ESP_LOGD(\"main\", \"%s\", x);'\n",
        CORE
    );
    let lines = fragment_lines(&source);
    let text = lines.join("\n");
    assert!(text.contains("new LambdaCondition<const char *>([=](const char * x) -> bool {"));
    assert!(text.contains("ifaction = new IfAction<const char *>({lambdacondition});"));
    assert!(text.contains("new LambdaAction<const char *>([=](const char * x) -> void {"));
}

#[test]
fn test_metadata_flags_and_libraries() {
    let source = format!(
        "{}  libraries:\n    - ArduinoJson\nswitch:\n  - platform: template\n    name: A\n  - platform: custom\n    lambda: 'return {{}};'\n    switches: []\n",
        CORE
    );
    let program = compile(&source).unwrap();
    let meta = program.metadata();
    let flags: Vec<&str> = meta.flags().collect();
    assert_eq!(
        flags,
        vec!["-DUSE_CUSTOM_SWITCH", "-DUSE_SWITCH", "-DUSE_TEMPLATE_SWITCH"]
    );
    let requesters: Vec<&String> = meta.build_flags["-DUSE_SWITCH"].iter().collect();
    assert_eq!(requesters, vec!["switch.custom", "switch.template"]);
    assert!(meta.required_libraries.contains("ArduinoJson"));
}

#[test]
fn test_new_type_tags_in_globals() {
    let program = compile(&format!("{}  on_boot:\n    - delay: 1s\n", CORE)).unwrap();
    let main = program.main_cpp().unwrap();
    assert!(main.contains("StartupTrigger *startuptrigger;"));
    assert!(main.contains("Automation<NoArg> *automation;"));
    assert!(main.contains("DelayAction<NoArg> *delayaction;"));
}
