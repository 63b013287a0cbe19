//! Syntax-highlighting language inferred from a file name.

use super::path;

/// Language identifier used when no extension matches.
pub const DEFAULT_LANGUAGE: &str = "text";

/// Map a file name to a highlighter language by extension alone.
pub fn language_for(name: &str) -> &'static str {
    match path::extension(name) {
        Some(ext) => language_for_extension(&ext.to_ascii_lowercase()).unwrap_or(DEFAULT_LANGUAGE),
        None => DEFAULT_LANGUAGE,
    }
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let language = match ext {
        "js" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "rs" => "rust",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" | "zsh" | "fish" => "bash",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "xml" => "xml",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" | "conf" | "cfg" => "ini",
        "md" | "markdown" => "markdown",
        "tex" => "latex",
        "r" => "r",
        "m" => "matlab",
        "pl" => "perl",
        "lua" => "lua",
        "vim" => "vim",
        "dockerfile" | "docker" => "dockerfile",
        "makefile" | "mk" => "makefile",
        "cmake" => "cmake",
        "gradle" => "gradle",
        "groovy" => "groovy",
        "clj" => "clojure",
        "elm" => "elm",
        "ex" | "exs" => "elixir",
        "erl" | "hrl" => "erlang",
        "fs" | "fsx" => "fsharp",
        "ml" | "mli" => "ocaml",
        "hs" | "lhs" => "haskell",
        "dart" => "dart",
        "v" => "verilog",
        "sv" => "systemverilog",
        "vhd" | "vhdl" => "vhdl",
        _ => return None,
    };
    Some(language)
}

/// Whether an extension (lowercase, no dot) names source code or markup.
pub fn is_code_extension(ext: &str) -> bool {
    language_for_extension(ext).is_some()
}
