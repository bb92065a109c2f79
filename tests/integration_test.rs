use std::time::Duration;

use tablesynth::*;

fn budget() -> Table {
    table!(
        ["Bucket", "Budgeted", "Actual"],
        ["Bucket_A", 115, 120],
        ["Bucket_B", 100, 130],
        ["Bucket_C", 125, 75],
        ["Bucket_D", 100, 90],
        ["Bucket_E", 85, 115],
    )
    .unwrap()
}

fn bar_chart_target() -> Table {
    table!(
        ["x", "y", "column"],
        ["Actual", 115, "Bucket_E"],
        ["Actual", 90, "Bucket_D"],
        ["Budgeted", 100, "Bucket_D"],
    )
    .unwrap()
}

#[test]
fn test_gather_for_grouped_bars() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Config::with_operators(&["gather"]).unwrap();
    let budgets = Budgets {
        max_prog_size: 1,
        time_limit: Duration::from_secs(30),
        solution_limit: 1,
    };
    let result = synthesize(&[budget()], &bar_chart_target(), &config, &budgets).unwrap();
    assert_eq!(result.solutions.len(), 1);

    let solution = &result.solutions[0];
    assert_eq!(
        solution.program,
        Node::op(Opcode::Gather, Node::table(0), [Arg::Cols(vec![1, 2])])
    );
    assert_eq!(solution.program.to_string(), "t0 <- gather(input0, [1, 2])");
    assert_eq!(solution.output.columns(), &["Bucket", "KEY", "VALUE"]);
    // x <-> KEY, y <-> VALUE, column <-> Bucket
    assert_eq!(solution.alignment, vec![1, 2, 0]);
}

#[test]
fn test_size_zero_budget_finds_nothing() {
    let _ = env_logger::builder().is_test(true).try_init();

    let budgets = Budgets {
        max_prog_size: 0,
        ..Budgets::default()
    };
    let result = synthesize(&[budget()], &bar_chart_target(), &Config::default(), &budgets).unwrap();
    assert!(result.solutions.is_empty());
    assert!(!result.report.timed_out);
}

#[test]
fn test_runs_are_deterministic() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Config::with_operators(&["gather", "gather_neg", "spread"]).unwrap();
    let budgets = Budgets {
        max_prog_size: 2,
        solution_limit: 5,
        ..Budgets::default()
    };
    let run = || {
        synthesize(&[budget()], &bar_chart_target(), &config, &budgets)
            .unwrap()
            .solutions
            .into_iter()
            .map(|s| s.program)
            .collect::<Vec<_>>()
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn test_accepted_programs_include_the_target() {
    let _ = env_logger::builder().is_test(true).try_init();

    let target = table!(["Bucket", "total"], ["Bucket_A", 235], ["Bucket_C", 200]).unwrap();
    let config = Config::with_operators(&["mutate", "group_sum", "gather"]).unwrap();
    let budgets = Budgets {
        max_prog_size: 2,
        solution_limit: 3,
        ..Budgets::default()
    };
    let inputs = [budget()];
    let result = synthesize(&inputs, &target, &config, &budgets).unwrap();
    assert!(!result.solutions.is_empty());
    for solution in &result.solutions {
        let output = solution.eval(&inputs).unwrap();
        assert!(table_inclusion(&target, &output), "{}", solution.program);
        assert_eq!(output, solution.output);
        let projected = output.project(&solution.alignment);
        assert!(table_inclusion(&target, &projected));
    }
}

#[test]
fn test_programs_rerun_on_fresh_inputs() {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Config::with_operators(&["gather"]).unwrap();
    let budgets = Budgets {
        max_prog_size: 1,
        ..Budgets::default()
    };
    let result = synthesize(&[budget()], &bar_chart_target(), &config, &budgets).unwrap();
    let fresh = table!(["Bucket", "Budgeted", "Actual"], ["Bucket_Z", 1, 2]).unwrap();
    let output = result.solutions[0].eval(&[fresh]).unwrap();
    assert_eq!(output.num_rows(), 2);
    assert_eq!(output.rows()[1], vec![Value::from("Bucket_Z"), Value::from("Actual"), Value::from(2)]);
}

#[test]
fn test_configuration_errors_happen_before_search() {
    let _ = env_logger::builder().is_test(true).try_init();

    assert_eq!(
        Config::with_operators(&["gather", "melt"]),
        Err(ConfigError::UnknownOperator("melt".into()))
    );
    let json = serde_json::json!({"mutate_op": ["*"]});
    assert!(matches!(
        Config::from_json(&json),
        Err(Error::Config(ConfigError::UnknownMutateOp(_)))
    ));
}

#[test]
fn test_alignment_equivalence() {
    let a = budget();
    let b = a.project(&[2, 0, 1]);
    assert!(table_equivalence(&a, &b));
    assert_eq!(align(&a, &b, true), Some(vec![1, 2, 0]));

    let mut rows = a.rows().to_vec();
    rows.push(rows[0].clone());
    let c = Table::new(a.columns().to_vec(), rows).unwrap();
    assert!(table_inclusion(&a, &c));
    assert!(!table_equivalence(&a, &c));
}
