use gantry::Executor;
use gantry::core::{Config, ConsistencyError, Rule, RuleSet, TargetId, UnknownTargetError};
use gantry::handlers::HandlerRegistry;

use support::{Project, copy_action, counter, touch_action};

mod support;

/// `compile: src.txt -> out.o`, `link: out.o -> app`.
fn compile_and_link(project: &Project) -> RuleSet {
    let (compile_runs, link_runs) = (counter(), counter());
    let mut rules = RuleSet::new();
    rules
        .insert(Rule::new(
            "compile",
            [project.file_target("src.txt")],
            [project.file_target("out.o")],
            copy_action(&compile_runs),
        ))
        .unwrap();
    rules
        .insert(Rule::new(
            "link",
            [project.file_target("out.o")],
            [project.file_target("app")],
            copy_action(&link_runs),
        ))
        .unwrap();
    rules
}

#[test]
fn clean_removes_outputs_and_keeps_sources() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let rules = compile_and_link(&project);
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.run(&project.file_target("app")).unwrap();
    assert!(project.exists("out.o") && project.exists("app"));

    executor.clean(&project.file_target("app")).unwrap();
    assert!(!project.exists("app"));
    assert!(!project.exists("out.o"));
    assert_eq!(project.read("src.txt"), "hello");
}

#[test]
fn clean_is_idempotent() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let rules = compile_and_link(&project);
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.run(&project.file_target("app")).unwrap();
    executor.clean(&project.file_target("app")).unwrap();
    executor.clean(&project.file_target("app")).unwrap();
    assert!(!project.exists("app"));
    assert!(!project.exists("out.o"));
    assert!(project.exists("src.txt"));
}

#[test]
fn clean_without_any_previous_run_succeeds() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let rules = compile_and_link(&project);
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.clean(&project.file_target("app")).unwrap();
    assert!(project.exists("src.txt"));
}

#[test]
fn run_after_clean_rebuilds() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let rules = compile_and_link(&project);
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.run(&project.file_target("app")).unwrap();
    executor.clean(&project.file_target("app")).unwrap();
    assert!(executor.run(&project.file_target("app")).unwrap());
    assert_eq!(project.read("app"), "hello");
}

#[test]
fn clean_of_unknown_target_is_an_error() {
    let project = Project::new();
    let rules = RuleSet::new();
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    let err = executor.clean(&TargetId::from("nope#")).unwrap_err();
    assert!(err.downcast_ref::<UnknownTargetError>().is_some());
}

#[test]
fn clean_detects_cycles() {
    let project = Project::new();
    let runs = counter();
    let mut rules = RuleSet::new();
    rules
        .insert(Rule::new(
            "a",
            [project.file_target("b_out")],
            [project.file_target("a_out")],
            touch_action(&runs),
        ))
        .unwrap();
    rules
        .insert(Rule::new(
            "b",
            [project.file_target("a_out")],
            [project.file_target("b_out")],
            touch_action(&runs),
        ))
        .unwrap();
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    let err = executor.clean(&project.file_target("a_out")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConsistencyError>(),
        Some(ConsistencyError::Cycle { .. })
    ));
}

#[test]
fn clean_removes_folder_outputs() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let runs = counter();
    let gen_dir = project.path().join("gen");
    let mut rules = RuleSet::new();
    let runs_in_action = runs.clone();
    let gen_dir_in_action = gen_dir.clone();
    rules
        .insert(Rule::new(
            "codegen",
            [project.file_target("src.txt")],
            [project.folder_target("gen")],
            move |_, _, _| {
                runs_in_action.set(runs_in_action.get() + 1);
                std::fs::create_dir_all(&gen_dir_in_action)?;
                std::fs::write(gen_dir_in_action.join("generated.rs"), "pub fn f() {}")?;
                Ok(())
            },
        ))
        .unwrap();
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.run(&project.folder_target("gen")).unwrap();
    assert!(project.exists("gen/generated.rs"));

    executor.clean(&project.folder_target("gen")).unwrap();
    assert!(!project.exists("gen"));
    assert!(project.exists("src.txt"));
}

#[test]
fn clean_tolerates_virtual_outputs() {
    let project = Project::new();
    project.write("src.txt", "hello");
    let runs = counter();
    let mut rules = RuleSet::new();
    rules
        .insert(Rule::new(
            "install",
            [project.file_target("src.txt")],
            [TargetId::from("install@")],
            touch_action(&runs),
        ))
        .unwrap();
    let config = Config::new();
    let handlers = HandlerRegistry::std();
    let executor = Executor::new(&rules, &config, &handlers, project.store_path()).unwrap();

    executor.run(&TargetId::from("install@")).unwrap();
    executor.clean(&TargetId::from("install@")).unwrap();
    assert!(project.exists("src.txt"));
}
