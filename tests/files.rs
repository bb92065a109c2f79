use std::path::PathBuf;

use hashbrown::HashSet;
use libtest_mimic::Trial;
use tablesynth::*;

#[derive(Clone)]
struct Run {
    path: PathBuf,
}

impl Run {
    fn run(&self) {
        let _ = env_logger::builder().is_test(true).try_init();
        let task = Task::load(&self.path).unwrap_or_else(|err| panic!("Couldn't load {:?}: {err}", self.path));
        let synthesis = task
            .run()
            .unwrap_or_else(|err| panic!("Top level error in {:?}: {err}", self.path));
        log::info!("{}", synthesis.report);

        for solution in &synthesis.solutions {
            log::info!("  {}", solution.program);
            let output = solution
                .eval(&task.inputs)
                .unwrap_or_else(|err| panic!("{} no longer evaluates: {err}", solution.program));
            assert_eq!(
                align(&task.output, &output, false).as_ref(),
                Some(&solution.alignment),
                "{} does not include the target",
                solution.program
            );
        }
        assert!(synthesis.solutions.len() <= task.budgets.solution_limit);

        match task.expect_solution {
            Some(true) if synthesis.solutions.is_empty() && !synthesis.report.timed_out => {
                panic!("Expected a program for {:?}, found none", self.path)
            }
            Some(false) if !synthesis.solutions.is_empty() => panic!(
                "Expected no program for {:?}, found {}",
                self.path, synthesis.solutions[0].program
            ),
            _ => {}
        }
    }

    fn into_trial(self) -> Trial {
        let name = self.name();
        Trial::test(name, move || {
            self.run();
            Ok(())
        })
    }

    fn name(&self) -> String {
        let stem = self.path.file_stem().unwrap();
        stem.to_string_lossy().replace(['.', '-', ' '], "_")
    }
}

fn generate_tests(glob: &str) -> Vec<Trial> {
    glob::glob(glob)
        .unwrap()
        .map(|entry| Run { path: entry.unwrap() }.into_trial())
        .collect()
}

fn main() {
    let args = libtest_mimic::Arguments::from_args();
    let tests = generate_tests("tests/tasks/*.json");
    // ensure all the tests have unique names
    let mut names = HashSet::new();
    for test in &tests {
        let name = test.name().to_string();
        if !names.insert(name.clone()) {
            panic!("Duplicate test name: {}", name);
        }
    }
    libtest_mimic::run(&args, tests).exit();
}
