// build.rs

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

fn main() {
    // --- 1. Determine the language ---
    // Cargo features (`lang_*`) win over the `CFG_ARGPARSER_LANG` environment variable.
    let mut active_langs: Vec<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(str::to_lowercase)
        })
        .collect();
    active_langs.sort();

    let lang = match active_langs.first() {
        Some(first) => {
            if active_langs.len() > 1 {
                println!(
                    "cargo:warning=Multiple language features enabled ({:?}). Using '{}'.",
                    active_langs, first
                );
            }
            first.clone()
        }
        None => env::var("CFG_ARGPARSER_LANG").unwrap_or_else(|_| FALLBACK_LANG.to_string()),
    };

    println!("cargo:rustc-env=CFG_ARGPARSER_LANG_EFFECTIVE={}", lang);
    println!("cargo:rerun-if-env-changed=CFG_ARGPARSER_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    // --- 2. Load the English catalogue, then overlay the selected language ---
    let mut messages = read_catalogue(&format!("locales/{}.toml", FALLBACK_LANG))
        .expect("Failed to read fallback message catalogue: locales/en.toml");

    if lang != FALLBACK_LANG {
        let path = format!("locales/{}.toml", lang);
        match read_catalogue(&path) {
            Some(specific) => messages.extend(specific),
            None => println!(
                "cargo:warning=Message catalogue '{}' not found. Falling back to '{}'.",
                path, FALLBACK_LANG
            ),
        }
    }

    // --- 3. Generate the `t!` macro ---
    // A BTreeMap keeps the generated file stable between builds.
    let mut macro_code = String::from(
        "/// Looks up a localized message by key at compile time.\n#[macro_export]\nmacro_rules! t {\n",
    );
    for (key, value) in &messages {
        let escaped_value = value.replace('\\', "\\\\").replace('"', "\\\"");
        macro_code.push_str(&format!("    (\"{}\") => {{ \"{}\" }};\n", key, escaped_value));
    }
    macro_code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing message key: \", $key)) }};\n",
    );
    macro_code.push('}');

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is always set by cargo");
    fs::write(Path::new(&out_dir).join("messages.rs"), macro_code)
        .expect("Failed to write generated messages.rs");
}

fn read_catalogue(path: &str) -> Option<BTreeMap<String, String>> {
    let content = fs::read_to_string(path).ok()?;
    let parsed = toml::from_str(&content).unwrap_or_else(|e| panic!("Failed to parse {}: {}", path, e));
    Some(parsed)
}
