use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding crate sources. Everything else in the tree is ignored.
const SOURCE_ROOTS: [&str; 2] = ["src", "tests"];

// Each rule pairs a line pattern with the message shown when it matches.
const RULES: [(&str, &str); 4] = [
    (
        r"#\[allow\(dead_code\)\]",
        "#[allow(dead_code)] is forbidden. Remove the unused item or use it.",
    ),
    (
        r"#\[ignore",
        "#[ignore] is forbidden. Fix the test or delete it.",
    ),
    (
        r"^\s*let\s+_\s*=",
        "`let _ =` discards a value silently. Handle the value or the error.",
    ),
    (
        r"\bdebug_assert(_eq|_ne)?!",
        "debug_assert! vanishes in release builds. Use a real check.",
    ),
];

// Collects every matching line of a single file.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(file_path: &Path) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn error_message(&self, message: &str) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        Some(format!(
            "{message}\n   {}:\n      {}",
            self.file_path.display(),
            self.violations.join("\n      ")
        ))
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn rust_sources() -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in SOURCE_ROOTS {
        if !Path::new(root).is_dir() {
            continue;
        }
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files
}

fn scan(files: &[PathBuf]) -> Vec<String> {
    let mut all_violations = Vec::new();
    let mut searcher = Searcher::new();
    for (pattern, message) in RULES {
        let matcher = match RegexMatcher::new_line_matcher(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                all_violations.push(format!("Error creating regex matcher for {pattern}: {e}"));
                continue;
            }
        };
        for path in files {
            let mut collector = ViolationCollector::new(path);
            if searcher
                .search_path(&matcher, path, &mut collector)
                .is_err()
            {
                continue;
            }
            if let Some(error_message) = collector.error_message(message) {
                all_violations.push(error_message);
            }
        }
    }
    all_violations
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    if std::env::var("SPGBOX_SKIP_LINT_CHECKS").is_ok() || std::env::var("DOCS_RS").is_ok() {
        return;
    }

    let files = rust_sources();
    let all_violations = scan(&files);
    if !all_violations.is_empty() {
        eprintln!("\n{}\n", all_violations.join("\n\n"));
        std::process::exit(1);
    }
}
