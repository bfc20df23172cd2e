//! Registry of scripts the target has parsed.

use crate::protocol::ScriptParsedParams;
use std::collections::HashMap;

/// Core-module names a stock target reports without a path. Scripts whose
/// url resolves to one of these are "native" and hidden from listings by
/// default.
const NATIVE_MODULES: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

const BOOTSTRAP_SCRIPT: &str = "bootstrap_node.js";

#[derive(Debug, Clone)]
pub struct Script {
    pub script_id: String,
    pub url: String,
    pub is_native: bool,
}

#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Script>,
}

impl ScriptRegistry {
    /// Insert or replace on `Debugger.scriptParsed`. The native flag is
    /// derived once and never mutated afterwards.
    pub fn insert(&mut self, params: ScriptParsedParams) {
        let script = Script {
            is_native: is_native_url(&params.url),
            script_id: params.script_id,
            url: params.url,
        };
        self.scripts.insert(script.script_id.clone(), script);
    }

    pub fn get(&self, script_id: &str) -> Option<&Script> {
        self.scripts.get(script_id)
    }

    pub fn url_of(&self, script_id: &str) -> Option<&str> {
        self.scripts.get(script_id).map(|s| s.url.as_str())
    }

    /// All scripts whose url contains `name`, any kind.
    pub fn find_by_substring(&self, name: &str) -> Vec<&Script> {
        self.scripts
            .values()
            .filter(|s| s.url.contains(name))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Script> {
        self.scripts.values()
    }

    /// Dropped wholesale on child restart.
    pub fn clear(&mut self) {
        self.scripts.clear();
    }
}

fn is_native_url(url: &str) -> bool {
    if url == BOOTSTRAP_SCRIPT || url.starts_with("node:") || url.starts_with("internal/") {
        return true;
    }
    let name = url.strip_suffix(".js").unwrap_or(url);
    NATIVE_MODULES.contains(&name)
}

/// Script urls are absolute paths; show them relative to the working
/// directory when they live under it.
pub fn relative_url(url: &str) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        let mut prefix = cwd.to_string_lossy().to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        if let Some(rel) = url.strip_prefix(&prefix) {
            return rel.to_string();
        }
    }
    url.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn parsed(id: &str, url: &str) -> ScriptParsedParams {
        ScriptParsedParams {
            script_id: id.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_native_detection() {
        let mut reg = ScriptRegistry::default();
        reg.insert(parsed("1", "timers.js"));
        reg.insert(parsed("2", "internal/bootstrap/loaders.js"));
        reg.insert(parsed("3", "bootstrap_node.js"));
        reg.insert(parsed("4", "/home/user/app/break.js"));

        assert!(reg.get("1").unwrap().is_native);
        assert!(reg.get("2").unwrap().is_native);
        assert!(reg.get("3").unwrap().is_native);
        assert!(!reg.get("4").unwrap().is_native);
    }

    #[test]
    fn test_substring_matching() {
        let mut reg = ScriptRegistry::default();
        reg.insert(parsed("1", "/app/src/index.js"));
        reg.insert(parsed("2", "/app/src/other.js"));
        reg.insert(parsed("3", "/app/test/index.js"));

        assert_eq!(reg.find_by_substring("other.js").len(), 1);
        assert_eq!(reg.find_by_substring("index.js").len(), 2);
        assert!(reg.find_by_substring("missing.js").is_empty());
    }

    #[test]
    fn test_replace_keeps_single_entry_per_id() {
        let mut reg = ScriptRegistry::default();
        reg.insert(parsed("1", "/app/a.js"));
        reg.insert(parsed("1", "/app/b.js"));

        assert_eq!(reg.iter().count(), 1);
        assert_eq!(reg.url_of("1"), Some("/app/b.js"));
    }
}
