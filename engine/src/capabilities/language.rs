//! Closed set of target languages
//!
//! Model answers and requirement text are both free-form; everything that
//! leaves this module is one of the [`Language`] variants, each with a
//! single canonical file extension.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Target language for generated code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Javascript,
    Java,
    Cpp,
    Go,
    Typescript,
    Ruby,
    Php,
    Csharp,
    C,
    Dart,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::Python,
        Language::Javascript,
        Language::Java,
        Language::Cpp,
        Language::Go,
        Language::Typescript,
        Language::Ruby,
        Language::Php,
        Language::Csharp,
        Language::C,
        Language::Dart,
    ];

    /// Canonical identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Typescript => "typescript",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Csharp => "csharp",
            Language::C => "c",
            Language::Dart => "dart",
        }
    }

    /// Canonical file extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Javascript => "js",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Typescript => "ts",
            Language::Ruby => "rb",
            Language::Php => "php",
            Language::Csharp => "cs",
            Language::C => "c",
            Language::Dart => "dart",
        }
    }

    /// Exact lookup of a canonical identifier
    pub fn from_identifier(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == id)
    }

    /// Map a free-form token onto the closed set
    ///
    /// Exact identifiers win, then well-known aliases, then substring
    /// heuristics (`js`, `ts`, `c#`, `c++`). Anything else is the default.
    pub fn normalize(token: &str) -> Self {
        let token = token.trim().to_lowercase();

        if let Some(lang) = Self::from_identifier(&token) {
            return lang;
        }

        match token.as_str() {
            "py" | "python3" => return Language::Python,
            "node" | "nodejs" | "node.js" | "ecmascript" => return Language::Javascript,
            "golang" => return Language::Go,
            "rb" => return Language::Ruby,
            "cs" | "dotnet" | ".net" => return Language::Csharp,
            "c++" | "cxx" => return Language::Cpp,
            "flutter" => return Language::Dart,
            _ => {}
        }

        if token.contains("js") {
            Language::Javascript
        } else if token.contains("ts") {
            Language::Typescript
        } else if token.contains("c#") {
            Language::Csharp
        } else if token.contains("c++") {
            Language::Cpp
        } else {
            Language::default()
        }
    }

    /// Language the requirement names explicitly, if any
    ///
    /// The earliest mention wins. Bare "go" and "c" are too common as
    /// English words and only count with a qualifier ("in Go", "a C program").
    pub fn mentioned_in(text: &str) -> Option<Self> {
        let text = text
            .to_lowercase()
            .replace("c++", " cpp ")
            .replace("c#", " csharp ");

        mention_patterns()
            .iter()
            .filter_map(|(re, lang)| re.find(&text).map(|m| (m.start(), *lang)))
            .min_by_key(|(start, _)| *start)
            .map(|(_, lang)| lang)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static MENTION_PATTERNS: OnceLock<Vec<(Regex, Language)>> = OnceLock::new();

fn mention_patterns() -> &'static Vec<(Regex, Language)> {
    MENTION_PATTERNS.get_or_init(|| {
        let qualified = "function|program|code|script|module|service|library|file|snippet|class|struct|app|application|cli|language|implementation|version";
        vec![
            (
                Regex::new(r"\bpython\d?\b").expect("Invalid python pattern"),
                Language::Python,
            ),
            (
                Regex::new(r"\b(?:javascript|node\.?js)\b").expect("Invalid javascript pattern"),
                Language::Javascript,
            ),
            (
                Regex::new(r"\btypescript\b").expect("Invalid typescript pattern"),
                Language::Typescript,
            ),
            (
                Regex::new(r"\bjava\b").expect("Invalid java pattern"),
                Language::Java,
            ),
            (
                Regex::new(r"\bcpp\b").expect("Invalid cpp pattern"),
                Language::Cpp,
            ),
            (
                Regex::new(r"\bcsharp\b").expect("Invalid csharp pattern"),
                Language::Csharp,
            ),
            (
                Regex::new(r"\bruby\b").expect("Invalid ruby pattern"),
                Language::Ruby,
            ),
            (
                Regex::new(r"\bphp\b").expect("Invalid php pattern"),
                Language::Php,
            ),
            (
                Regex::new(r"\b(?:dart|flutter)\b").expect("Invalid dart pattern"),
                Language::Dart,
            ),
            (
                Regex::new(r"\bgolang\b").expect("Invalid golang pattern"),
                Language::Go,
            ),
            (
                Regex::new(&format!(r"\b(?:in|using|with) go\b|\bgo (?:{})\b", qualified))
                    .expect("Invalid go pattern"),
                Language::Go,
            ),
            (
                Regex::new(&format!(r"\b(?:in|using|with) c\b|\bc (?:{})\b", qualified))
                    .expect("Invalid c pattern"),
                Language::C,
            ),
        ]
    })
}

/// Replace the last extension of `name` with the language's canonical one
///
/// `main` and `main.js` both become `main.py` for Python. Directory parts
/// are kept; only the final component is touched.
pub fn with_canonical_extension(name: &str, language: Language) -> String {
    let name = name.trim();
    let (dir, file) = match name.rfind('/') {
        Some(idx) => name.split_at(idx + 1),
        None => ("", name),
    };

    // A leading dot marks a hidden file, not an extension
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };
    let stem = if stem.is_empty() { "main" } else { stem };

    format!("{}{}.{}", dir, stem, language.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_exact_and_aliases() {
        assert_eq!(Language::normalize("Python"), Language::Python);
        assert_eq!(Language::normalize(" golang "), Language::Go);
        assert_eq!(Language::normalize("py"), Language::Python);
        assert_eq!(Language::normalize("node"), Language::Javascript);
        assert_eq!(Language::normalize("C++"), Language::Cpp);
        assert_eq!(Language::normalize("C#"), Language::Csharp);
    }

    #[test]
    fn test_normalize_substring_heuristics() {
        assert_eq!(Language::normalize("react.js"), Language::Javascript);
        assert_eq!(Language::normalize("angular-ts"), Language::Typescript);
        assert_eq!(Language::normalize("visual c#"), Language::Csharp);
    }

    #[test]
    fn test_normalize_unknown_defaults_to_python() {
        assert_eq!(Language::normalize("cobol"), Language::Python);
        assert_eq!(Language::normalize(""), Language::Python);
    }

    #[test]
    fn test_explicit_mentions() {
        assert_eq!(
            Language::mentioned_in("a Go function that reverses a string"),
            Some(Language::Go)
        );
        assert_eq!(
            Language::mentioned_in("Write it in C++ please"),
            Some(Language::Cpp)
        );
        assert_eq!(
            Language::mentioned_in("A C program that prints primes"),
            Some(Language::C)
        );
        assert_eq!(
            Language::mentioned_in("port the Java service to TypeScript"),
            Some(Language::Java)
        );
        assert_eq!(
            Language::mentioned_in("a JavaScript helper"),
            Some(Language::Javascript)
        );
    }

    #[test]
    fn test_common_words_are_not_mentions() {
        assert_eq!(
            Language::mentioned_in("Add input validation to the login form"),
            None
        );
        assert_eq!(
            Language::mentioned_in("Let users go back to the previous page"),
            None
        );
        assert_eq!(Language::mentioned_in("Add a plan c option"), None);
    }

    #[test]
    fn test_canonical_extension() {
        assert_eq!(with_canonical_extension("main", Language::Python), "main.py");
        assert_eq!(
            with_canonical_extension("login.js", Language::Typescript),
            "login.ts"
        );
        assert_eq!(
            with_canonical_extension("src/app.test.py", Language::Go),
            "src/app.test.go"
        );
        assert_eq!(with_canonical_extension("Main.java", Language::Java), "Main.java");
        assert_eq!(with_canonical_extension(".env", Language::Ruby), ".env.rb");
        assert_eq!(with_canonical_extension("", Language::Dart), "main.dart");
    }

    #[test]
    fn test_serde_identifiers() {
        let json = serde_json::to_string(&Language::Csharp).unwrap();
        assert_eq!(json, "\"csharp\"");
        for lang in Language::ALL {
            assert_eq!(Language::from_identifier(lang.as_str()), Some(lang));
        }
    }
}
