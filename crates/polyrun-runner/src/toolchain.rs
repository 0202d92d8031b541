//! Language resolution and toolchain command plans.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported language families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Python,
    Java,
    JavaScript,
    Php,
    R,
}

/// Exact label aliases, checked before any substring rule.
const ALIASES: &[(&str, Language)] = &[
    ("c", Language::C),
    ("h", Language::C),
    ("cpp", Language::Cpp),
    ("c++", Language::Cpp),
    ("cc", Language::Cpp),
    ("cxx", Language::Cpp),
    ("py", Language::Python),
    ("python", Language::Python),
    ("python3", Language::Python),
    ("java", Language::Java),
    ("js", Language::JavaScript),
    ("javascript", Language::JavaScript),
    ("node", Language::JavaScript),
    ("nodejs", Language::JavaScript),
    ("php", Language::Php),
    ("r", Language::R),
    ("rscript", Language::R),
];

/// Substring rules, in priority order. "javascript" must precede "java".
const SUBSTRING_RULES: &[(&str, Language)] = &[
    ("c++", Language::Cpp),
    ("cpp", Language::Cpp),
    ("python", Language::Python),
    ("javascript", Language::JavaScript),
    ("node", Language::JavaScript),
    ("java", Language::Java),
    ("php", Language::Php),
];

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 7] = [
        Language::C,
        Language::Cpp,
        Language::Python,
        Language::Java,
        Language::JavaScript,
        Language::Php,
        Language::R,
    ];

    /// Resolve a free-form, case-insensitive language label.
    ///
    /// Returns `None` when no toolchain matches.
    pub fn resolve(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }

        if let Some((_, lang)) = ALIASES.iter().find(|(alias, _)| *alias == label) {
            return Some(*lang);
        }

        // One-letter labels only ever match exactly.
        if label.chars().count() < 2 {
            return None;
        }

        SUBSTRING_RULES
            .iter()
            .find(|(needle, _)| label.contains(needle))
            .map(|(_, lang)| *lang)
    }

    /// Guess a language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" => Some(Language::Cpp),
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "php" => Some(Language::Php),
            "r" => Some(Language::R),
            _ => None,
        }
    }

    /// Get the display name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::JavaScript => "JavaScript",
            Language::Php => "PHP",
            Language::R => "R",
        }
    }

    /// Source filename written into the workspace.
    pub fn source_filename(&self) -> &'static str {
        match self {
            Language::C => "main.c",
            Language::Cpp => "main.cpp",
            Language::Python => "script.py",
            Language::Java => "Main.java",
            Language::JavaScript => "script.js",
            Language::Php => "script.php",
            Language::R => "script.R",
        }
    }

    /// Whether this language compiles to a native executable.
    pub fn is_native(&self) -> bool {
        matches!(self, Language::C | Language::Cpp)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Toolchain binary names, overridable from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainBinaries {
    pub c_compiler: String,
    pub cpp_compiler: String,
    pub python: String,
    pub javac: String,
    pub java: String,
    pub node: String,
    pub php: String,
    pub rscript: String,
}

impl Default for ToolchainBinaries {
    fn default() -> Self {
        Self {
            c_compiler: "gcc".to_string(),
            cpp_compiler: "g++".to_string(),
            python: "python3".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
            node: "node".to_string(),
            php: "php".to_string(),
            rscript: "Rscript".to_string(),
        }
    }
}

impl ToolchainBinaries {
    /// The binary a run of `language` depends on first.
    ///
    /// For compiled languages this is the compiler.
    pub fn primary(&self, language: Language) -> &str {
        match language {
            Language::C => &self.c_compiler,
            Language::Cpp => &self.cpp_compiler,
            Language::Python => &self.python,
            Language::Java => &self.javac,
            Language::JavaScript => &self.node,
            Language::Php => &self.php,
            Language::R => &self.rscript,
        }
    }
}

/// Commands and environment for one run, bound to a workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// The resolved language.
    pub language: Language,
    /// Source filename, relative to the workspace.
    pub source_file: String,
    /// Compile command, absent for interpreted languages.
    pub compile: Option<Vec<String>>,
    /// Run command.
    pub run: Vec<String>,
    /// Extra environment for the run command.
    pub env: Vec<(String, String)>,
}

impl ExecutionPlan {
    /// Build the plan for `language` inside `workspace_dir`.
    ///
    /// Native artifacts are referenced by absolute path so the run command
    /// never depends on `PATH` or the platform's current-directory lookup.
    pub fn new(language: Language, binaries: &ToolchainBinaries, workspace_dir: &Path) -> Self {
        let source = language.source_filename().to_string();
        let artifact = workspace_dir
            .join(format!("main{}", std::env::consts::EXE_SUFFIX))
            .to_string_lossy()
            .to_string();

        let (compile, run, env) = match language {
            Language::C => (
                Some(vec![
                    binaries.c_compiler.clone(),
                    source.clone(),
                    "-o".to_string(),
                    artifact.clone(),
                    "-lm".to_string(),
                ]),
                vec![artifact],
                Vec::new(),
            ),
            Language::Cpp => (
                Some(vec![
                    binaries.cpp_compiler.clone(),
                    source.clone(),
                    "-o".to_string(),
                    artifact.clone(),
                ]),
                vec![artifact],
                Vec::new(),
            ),
            Language::Python => (
                None,
                vec![binaries.python.clone(), "-u".to_string(), source.clone()],
                vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())],
            ),
            Language::Java => (
                Some(vec![binaries.javac.clone(), source.clone()]),
                vec![
                    binaries.java.clone(),
                    "-cp".to_string(),
                    workspace_dir.to_string_lossy().to_string(),
                    "Main".to_string(),
                ],
                Vec::new(),
            ),
            Language::JavaScript => (
                None,
                vec![binaries.node.clone(), source.clone()],
                Vec::new(),
            ),
            Language::Php => (
                None,
                vec![
                    binaries.php.clone(),
                    "-d".to_string(),
                    "output_buffering=0".to_string(),
                    "-d".to_string(),
                    "implicit_flush=1".to_string(),
                    source.clone(),
                ],
                Vec::new(),
            ),
            Language::R => (
                None,
                vec![binaries.rscript.clone(), source.clone()],
                Vec::new(),
            ),
        };

        Self {
            language,
            source_file: source,
            compile,
            run,
            env,
        }
    }

    /// Whether a compile step is required.
    pub fn needs_compile(&self) -> bool {
        self.compile.as_ref().is_some_and(|cmd| !cmd.is_empty())
    }

    /// Insert an extra source file right after the primary source argument.
    ///
    /// Returns false when there is no compile command to splice into.
    pub fn splice_compile_source(&mut self, extra: &str) -> bool {
        let Some(cmd) = self.compile.as_mut() else {
            return false;
        };
        match cmd.iter().position(|arg| *arg == self.source_file) {
            Some(idx) => {
                cmd.insert(idx + 1, extra.to_string());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_resolve_cpp_variants() {
        for label in ["c++", "cpp", "C++", "CPP", "c++17", "GNU C++"] {
            assert_eq!(Language::resolve(label), Some(Language::Cpp), "{label}");
        }
    }

    #[test]
    fn test_resolve_exact_c() {
        assert_eq!(Language::resolve("c"), Some(Language::C));
        assert_eq!(Language::resolve(" C "), Some(Language::C));
    }

    #[test]
    fn test_resolve_javascript_not_java() {
        assert_eq!(Language::resolve("javascript"), Some(Language::JavaScript));
        assert_eq!(Language::resolve("JavaScript (Node)"), Some(Language::JavaScript));
        assert_eq!(Language::resolve("java"), Some(Language::Java));
        assert_eq!(Language::resolve("Java 17"), Some(Language::Java));
    }

    #[test]
    fn test_resolve_other_families() {
        assert_eq!(Language::resolve("Python 3"), Some(Language::Python));
        assert_eq!(Language::resolve("py"), Some(Language::Python));
        assert_eq!(Language::resolve("php8"), Some(Language::Php));
        assert_eq!(Language::resolve("R"), Some(Language::R));
        assert_eq!(Language::resolve("Rscript"), Some(Language::R));
    }

    #[test]
    fn test_resolve_unsupported() {
        for label in ["", "rust", "go", "brainfuck", "x", "ruby"] {
            assert_eq!(Language::resolve(label), None, "{label}");
        }
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("CPP"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("rs"), None);
    }

    #[test]
    fn test_native_plan_uses_absolute_artifact() {
        let dir = PathBuf::from("/tmp/polyrun/s_1234");
        let plan = ExecutionPlan::new(Language::C, &ToolchainBinaries::default(), &dir);

        assert!(plan.needs_compile());
        assert_eq!(plan.source_file, "main.c");
        let run = Path::new(&plan.run[0]);
        assert!(run.is_absolute());
        assert!(run.starts_with(&dir));
        assert_eq!(plan.compile.as_ref().unwrap()[0], "gcc");
    }

    #[test]
    fn test_interpreted_plan_has_no_compile() {
        let dir = PathBuf::from("/tmp/ws");
        let plan = ExecutionPlan::new(Language::Python, &ToolchainBinaries::default(), &dir);

        assert!(!plan.needs_compile());
        assert_eq!(plan.run, vec!["python3", "-u", "script.py"]);
        assert!(plan.env.contains(&("PYTHONUNBUFFERED".to_string(), "1".to_string())));
    }

    #[test]
    fn test_java_plan() {
        let dir = PathBuf::from("/tmp/ws");
        let plan = ExecutionPlan::new(Language::Java, &ToolchainBinaries::default(), &dir);
        assert_eq!(plan.compile, Some(vec!["javac".to_string(), "Main.java".to_string()]));
        assert_eq!(plan.run.last().map(String::as_str), Some("Main"));
    }

    #[test]
    fn test_binary_overrides() {
        let binaries = ToolchainBinaries {
            python: "/opt/python/bin/python3.12".to_string(),
            ..Default::default()
        };
        let plan = ExecutionPlan::new(Language::Python, &binaries, Path::new("/tmp/ws"));
        assert_eq!(plan.run[0], "/opt/python/bin/python3.12");
        assert_eq!(binaries.primary(Language::Python), "/opt/python/bin/python3.12");
    }

    #[test]
    fn test_splice_compile_source() {
        let mut plan =
            ExecutionPlan::new(Language::Cpp, &ToolchainBinaries::default(), Path::new("/w"));
        assert!(plan.splice_compile_source("unbuffer.c"));
        let cmd = plan.compile.unwrap();
        assert_eq!(cmd[1], "main.cpp");
        assert_eq!(cmd[2], "unbuffer.c");

        let mut interpreted =
            ExecutionPlan::new(Language::Python, &ToolchainBinaries::default(), Path::new("/w"));
        assert!(!interpreted.splice_compile_source("unbuffer.c"));
    }
}
