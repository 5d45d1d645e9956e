//! Dead Code Enforcement
//!
//! Production code in the theatre crates must not carry #[allow(dead_code)].
//! Test code is exempt.

use std::fs;
use std::path::{Path, PathBuf};

/// A dead code allowance found in production code
#[derive(Debug)]
struct DeadCodeViolation {
    file_path: String,
    line_number: usize,
    context: String,
}

/// Scanner for dead code allowances in the workspace crates
struct DeadCodeChecker {
    violations: Vec<DeadCodeViolation>,
    files_checked: usize,
}

impl DeadCodeChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    /// Collects Rust files of every `theatre-*` crate next to this one
    fn find_rust_files(&self) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut files = Vec::new();
        for entry in fs::read_dir("..")? {
            let path = entry?.path();
            let is_crate = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("theatre-"));
            if is_crate && path.is_dir() {
                Self::find_rust_files_recursive(&path, &mut files, 0)?;
            }
        }
        Ok(files)
    }

    fn find_rust_files_recursive(
        dir: &Path,
        files: &mut Vec<PathBuf>,
        depth: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if depth > 10 {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if let Some(name) = path.file_name()
                && (name.to_string_lossy().starts_with('.') || name == "target")
            {
                continue;
            }

            if path.is_dir() {
                Self::find_rust_files_recursive(&path, files, depth + 1)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Returns whether a path holds test code
    fn is_test_file(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/").to_lowercase();

        path_str.contains("/tests/")
            || path_str.contains("/benches/")
            || path_str.ends_with("/tests.rs")
            || path_str.contains("theatre-tests/")
    }

    fn scan(&mut self, file_path: &str, content: &str) {
        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.contains("#[allow(") && trimmed.contains("dead_code") {
                self.violations.push(DeadCodeViolation {
                    file_path: file_path.to_string(),
                    line_number: index + 1,
                    context: trimmed.to_string(),
                });
            }
        }
    }

    fn check_file(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if self.is_test_file(path) {
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        self.files_checked += 1;
        self.scan(&path.to_string_lossy(), &content);
        Ok(())
    }

    fn check_workspace(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for file in self.find_rust_files()? {
            self.check_file(&file)?;
        }
        Ok(())
    }

    /// Prints violations and returns whether the check passed
    fn report_violations(&self) -> bool {
        if self.violations.is_empty() {
            println!(
                "Dead code enforcement: {} files checked, no violations found",
                self.files_checked
            );
            return true;
        }

        println!("Dead code enforcement violations found:");
        println!();
        for violation in &self.violations {
            println!("{}:{}", violation.file_path, violation.line_number);
            println!("  {}", violation.context);
            println!();
        }
        println!(
            "Found {} violation(s) in {} file(s) checked",
            self.violations.len(),
            self.files_checked
        );
        println!("Remove unused code or use it; test files are exempt from this check.");

        false
    }
}
