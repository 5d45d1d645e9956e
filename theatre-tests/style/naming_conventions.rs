//! Naming Convention Checker
//!
//! Enforces the naming and documentation conventions of the theatre crates:
//! banned function prefixes, verbose type suffixes, generic module names and
//! the `# Errors` section format.

use std::fs;
use std::path::{Path, PathBuf};

/// A naming violation found in the code
#[derive(Debug)]
struct NamingViolation {
    file_path: String,
    line_number: usize,
    violation_type: &'static str,
    message: String,
}

impl NamingViolation {
    fn new(
        file_path: &Path,
        line_number: usize,
        violation_type: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.display().to_string(),
            line_number,
            violation_type,
            message: message.into(),
        }
    }
}

struct NamingChecker {
    violations: Vec<NamingViolation>,
    files_checked: usize,
}

impl NamingChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    /// Collects source files of the library and binary crates
    fn find_rust_files(&self) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut files = Vec::new();
        for crate_name in ["theatre-core", "theatre-sim", "theatre-cli"] {
            let src = Path::new("..").join(crate_name).join("src");
            if src.is_dir() {
                Self::find_rust_files_recursive(&src, &mut files, 0)?;
            }
        }
        Ok(files)
    }

    fn find_rust_files_recursive(
        dir: &Path,
        files: &mut Vec<PathBuf>,
        depth: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if depth > 8 {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                Self::find_rust_files_recursive(&path, files, depth + 1)?;
            } else if let Some(extension) = path.extension()
                && extension == "rs"
            {
                files.push(path);
            }
        }

        Ok(())
    }

    /// Check for banned function prefixes
    fn check_function_prefixes(&mut self, file_path: &Path, content: &str) {
        let banned_patterns = [
            ("get_", "Use the noun directly: patient.id() not patient.get_id()"),
            (
                "set_",
                "Use descriptive verbs: record.enter() not record.set_phase()",
            ),
            (
                "handle_",
                "Be specific: status_changed() not handle_status()",
            ),
        ];

        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.starts_with("//") || trimmed.starts_with("/*") {
                continue;
            }

            if trimmed.starts_with("pub fn ")
                || trimmed.starts_with("pub(crate) fn ")
                || trimmed.starts_with("fn ")
            {
                for &(prefix, correction) in &banned_patterns {
                    if trimmed.contains(&format!("fn {prefix}")) {
                        self.violations.push(NamingViolation::new(
                            file_path,
                            line_num + 1,
                            "BANNED_FUNCTION_PREFIX",
                            format!("Function uses banned prefix '{prefix}'. {correction}"),
                        ));
                    }
                }
            }
        }
    }

    /// Check structs and enums for suffixes naming a role instead of a thing
    fn check_type_naming(&mut self, file_path: &Path, content: &str) {
        let verbose_suffixes = [
            ("Manager", "For structs, name what it IS, not its role"),
            ("Handler", "Be more specific about what you're handling"),
            ("Processor", "Be more specific about what you're processing"),
            (
                "Controller",
                "Be more specific about what you're controlling",
            ),
        ];

        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            let words: Vec<&str> = trimmed.split_whitespace().collect();
            let name_index = match words.as_slice() {
                ["pub", "struct" | "enum", ..] | ["pub(crate)", "struct" | "enum", ..] => 2,
                ["struct" | "enum", ..] => 1,
                _ => continue,
            };
            let Some(name_part) = words.get(name_index) else {
                continue;
            };
            let type_name = name_part
                .split(['<', '{', '(', ';'])
                .next()
                .unwrap_or("")
                .trim();

            for &(suffix, message) in &verbose_suffixes {
                if type_name.ends_with(suffix) {
                    self.violations.push(NamingViolation::new(
                        file_path,
                        line_num + 1,
                        "VERBOSE_TYPE_SUFFIX",
                        format!("Type '{type_name}' uses verbose '{suffix}' suffix. {message}"),
                    ));
                }
            }
        }
    }

    /// Check for banned module names
    fn check_module_names(&mut self, file_path: &Path) {
        let Some(file_name) = file_path.file_stem() else {
            return;
        };
        let name = file_name.to_string_lossy();
        let banned_patterns = [
            ("utils", "Use specific names like 'phases' or 'window'"),
            ("common", "Use specific names like 'condition' or 'clock'"),
            ("helpers", "Use specific names like 'generator' or 'report'"),
            ("misc", "Use specific names describing the module's purpose"),
        ];

        for &(pattern, message) in &banned_patterns {
            if name == pattern {
                self.violations.push(NamingViolation::new(
                    file_path,
                    1,
                    "BANNED_MODULE_NAME",
                    format!("Module name '{pattern}' is too generic. {message}"),
                ));
            }
        }
    }

    /// Check `# Errors` sections of function docs
    ///
    /// The header must be followed by a blank doc line, and each entry must
    /// read `` - `ErrorType` - condition ``. Indented lines continue the
    /// previous entry.
    fn check_documentation_format(&mut self, file_path: &Path, content: &str) {
        let lines: Vec<&str> = content.lines().collect();

        for (index, line) in lines.iter().enumerate() {
            if line.trim() != "/// # Errors" {
                continue;
            }
            let header_line = index + 1;

            if lines.get(index + 1).map(|l| l.trim()) != Some("///") {
                self.violations.push(NamingViolation::new(
                    file_path,
                    header_line,
                    "INVALID_DOC_FORMAT",
                    "# Errors section must be followed by blank line: `///`",
                ));
                continue;
            }

            let mut found_content = false;
            for (offset, doc) in lines.iter().enumerate().skip(index + 2) {
                let Some(text) = doc.trim().strip_prefix("///") else {
                    break;
                };
                let entry = text.trim();
                if entry.starts_with("# ") {
                    break;
                }
                if entry.is_empty() || text.starts_with("   ") {
                    continue;
                }

                found_content = true;
                let well_formed = entry
                    .strip_prefix("- ")
                    .is_some_and(|bullet| bullet.starts_with('`') && bullet.contains("` - "));
                if !well_formed {
                    self.violations.push(NamingViolation::new(
                        file_path,
                        offset + 1,
                        "INVALID_DOC_FORMAT",
                        "Use format `- ErrorType - condition` with backticks around error type",
                    ));
                }
            }

            if !found_content {
                self.violations.push(NamingViolation::new(
                    file_path,
                    header_line,
                    "INVALID_DOC_FORMAT",
                    "# Errors section cannot be empty - list specific error types",
                ));
            }
        }
    }

    fn check_file(&mut self, file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = fs::read_to_string(file_path)?;

        self.check_function_prefixes(file_path, &content);
        self.check_type_naming(file_path, &content);
        self.check_module_names(file_path);
        self.check_documentation_format(file_path, &content);

        self.files_checked += 1;
        Ok(())
    }

    fn check_workspace(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for file in self.find_rust_files()? {
            if let Err(e) = self.check_file(&file) {
                eprintln!("Warning: Failed to check {}: {}", file.display(), e);
            }
        }
        Ok(())
    }

    fn report_violations(&self) -> bool {
        if self.violations.is_empty() {
            println!("Naming conventions check passed");
            println!("  Files checked: {}", self.files_checked);
            return true;
        }

        println!("Naming convention violations found:");
        println!();
        for violation in &self.violations {
            println!(
                "{}:{}:{} - {}",
                violation.file_path,
                violation.line_number,
                violation.violation_type,
                violation.message
            );
        }
        println!();
        println!("  Files checked: {}", self.files_checked);
        println!("  Violations: {}", self.violations.len());

        false
    }
}
