//! Test harness generation.
//!
//! Groups a unit's `Test*` and `Benchmark*` functions by the package that
//! declares them and renders the `_testmain.go` driver that runs them.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::core::unit::Unit;

/// Import alias used for functions declared in package `main`.
pub const MAIN_ALIAS: &str = "__main__";

/// Name of the generated driver inside the unit's `_test` directory.
pub const TESTMAIN_FILE: &str = "_testmain.go";

/// Test and benchmark functions of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestPackage {
    /// Identifier the driver imports the package under
    pub alias: String,
    pub name: String,
    /// Import path of the package
    pub import: String,
    pub tests: Vec<String>,
    pub benchmarks: Vec<String>,
}

/// Everything the driver needs to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    pub packages: Vec<TestPackage>,
}

impl TestSuite {
    /// Collect the suite for `unit`. The unit's own package is imported by
    /// its target; other packages by their name.
    pub fn for_unit(unit: &Unit) -> Self {
        Self::from_functions(&unit.package, &unit.target, &unit.test_funcs)
    }

    pub fn from_functions(
        own_package: &str,
        own_target: &str,
        functions: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let mut packages = Vec::new();
        for (name, funcs) in functions {
            let tests: Vec<String> = funcs.iter().filter(|f| f.starts_with("Test")).cloned().collect();
            let benchmarks: Vec<String> = funcs
                .iter()
                .filter(|f| f.starts_with("Benchmark"))
                .cloned()
                .collect();
            if tests.is_empty() && benchmarks.is_empty() {
                continue;
            }
            let alias = if name == "main" {
                MAIN_ALIAS.to_string()
            } else {
                name.clone()
            };
            let import = if name == own_package {
                own_target.to_string()
            } else {
                name.clone()
            };
            packages.push(TestPackage {
                alias,
                name: name.clone(),
                import,
                tests,
                benchmarks,
            });
        }
        TestSuite { packages }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn test_count(&self) -> usize {
        self.packages.iter().map(|p| p.tests.len()).sum()
    }

    /// Render the `_testmain.go` source.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("package main\n\n");
        out.push_str("import \"testing\"\n");
        out.push_str("import __regexp__ \"regexp\"\n\n");
        for pkg in &self.packages {
            let _ = writeln!(out, "import {} \"{}\"", pkg.alias, pkg.import);
        }

        out.push_str("\nvar tests = []testing.InternalTest{\n");
        for pkg in &self.packages {
            for test in &pkg.tests {
                let _ = writeln!(out, "\t{{\"{}.{}\", {}.{}}},", pkg.name, test, pkg.alias, test);
            }
        }
        out.push_str("}\n\nvar benchmarks = []testing.InternalBenchmark{\n");
        for pkg in &self.packages {
            for bench in &pkg.benchmarks {
                let _ = writeln!(out, "\t{{\"{}.{}\", {}.{}}},", pkg.name, bench, pkg.alias, bench);
            }
        }
        out.push_str("}\n\nfunc main() {\n");
        out.push_str("\ttesting.Main(__regexp__.MatchString, tests)\n");
        out.push_str("\ttesting.RunBenchmarks(__regexp__.MatchString, benchmarks)\n");
        out.push_str("}\n");
        out
    }
}
