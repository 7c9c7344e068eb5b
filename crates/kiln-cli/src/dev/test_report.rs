//! Summaries of test-run output posted back by the test entrypoint.
//!
//! Understands the libtest format (`test foo ... ok`, `test result: ...`)
//! and XCTest's `Executed N tests, with M failures` line. Output in any
//! other format yields an empty report without failures.

use regex::Regex;
use std::sync::LazyLock;

static LIBTEST_CASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^test (\S+) \.\.\. (ok|FAILED|ignored)").expect("valid regex")
});
static LIBTEST_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^test result: (?:ok|FAILED)\. (\d+) passed; (\d+) failed").expect("valid regex")
});
static XCTEST_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Executed (\d+) tests?, with (\d+) failures?").expect("valid regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    pub passed: usize,
    pub failed: usize,
    /// Names of failed test cases, when the format lists them.
    pub failures: Vec<String>,
    /// Whether a summary line was recognized at all.
    pub recognized: bool,
}

impl TestReport {
    pub fn parse(output: &str) -> Self {
        let mut report = TestReport::default();
        let mut case_passed = 0;
        let mut case_failed = 0;
        let mut summary = None;

        for line in output.lines().map(str::trim) {
            if let Some(caps) = LIBTEST_CASE.captures(line) {
                report.recognized = true;
                match &caps[2] {
                    "ok" => case_passed += 1,
                    "FAILED" => {
                        case_failed += 1;
                        report.failures.push(caps[1].to_string());
                    }
                    _ => {}
                }
            } else if let Some(caps) = LIBTEST_RESULT.captures(line) {
                summary = Some((parse_count(&caps[1]), parse_count(&caps[2])));
            } else if let Some(caps) = XCTEST_SUMMARY.captures(line) {
                let total = parse_count(&caps[1]);
                let failed = parse_count(&caps[2]);
                summary = Some((total.saturating_sub(failed), failed));
            }
        }

        match summary {
            Some((passed, failed)) => {
                report.recognized = true;
                report.passed = passed;
                report.failed = failed;
            }
            None => {
                report.passed = case_passed;
                report.failed = case_failed;
            }
        }
        report
    }

    pub fn had_failures(&self) -> bool {
        self.failed > 0
    }
}

fn parse_count(digits: &str) -> usize {
    digits.parse().unwrap_or(usize::MAX)
}
