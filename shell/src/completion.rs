//! Tab completion of command names.
//!
//! Candidates come from the builtin table and from the executables found in each directory
//! of the search path. They are collected into a [`BTreeSet`] so that duplicates collapse
//! and the listing shown to the user is always sorted.

use crate::builtin::NAMES;
use crate::env::Environment;
use crate::external::is_executable;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;

/// What a tab press should do to the word being completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing starts with the prefix.
    NoMatch,
    /// Replace the word with this text: either the single candidate, or the longest
    /// prefix shared by all candidates when it extends what was typed.
    Replace(String),
    /// Several candidates and no longer common prefix; sorted.
    Ambiguous(Vec<String>),
}

/// Completes command names against builtins and the search path.
#[derive(Debug, Clone)]
pub struct Completer {
    builtins: &'static [&'static str],
    search_path: Option<OsString>,
}

impl Completer {
    pub fn new(builtins: &'static [&'static str], search_path: Option<OsString>) -> Self {
        Self {
            builtins,
            search_path,
        }
    }

    /// A completer over the shell's builtins and the environment's `PATH`.
    pub fn from_env(env: &Environment) -> Self {
        Self::new(NAMES, env.get_var("PATH").map(OsString::from))
    }

    /// All names starting with `prefix`. Directories that cannot be listed are skipped.
    pub fn candidates(&self, prefix: &str) -> BTreeSet<String> {
        let mut found: BTreeSet<String> = self
            .builtins
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| name.to_string())
            .collect();

        let Some(search_path) = &self.search_path else {
            return found;
        };
        for dir in std::env::split_paths(search_path) {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::trace!("skipping {} during completion: {}", dir.display(), e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if name.starts_with(prefix) && is_executable(&entry.path()) {
                    found.insert(name);
                }
            }
        }
        found
    }

    /// Decides what a tab press on `prefix` produces.
    ///
    /// A lone builtin gets a trailing space so the user can go on typing arguments.
    pub fn complete(&self, prefix: &str) -> Completion {
        let candidates: Vec<String> = self.candidates(prefix).into_iter().collect();
        match candidates.as_slice() {
            [] => Completion::NoMatch,
            [only] if self.builtins.contains(&only.as_str()) => {
                Completion::Replace(format!("{} ", only))
            }
            [only] => Completion::Replace(only.clone()),
            _ => {
                let common = longest_common_prefix(&candidates);
                if common.len() > prefix.len() {
                    Completion::Replace(common)
                } else {
                    Completion::Ambiguous(candidates)
                }
            }
        }
    }
}

/// The longest string that every word starts with.
///
/// Starts from the first word and drops its last character until it prefixes all others.
pub fn longest_common_prefix<S: AsRef<str>>(words: &[S]) -> String {
    let Some((first, rest)) = words.split_first() else {
        return String::new();
    };
    let mut common = first.as_ref().to_string();
    while !rest.iter().all(|w| w.as_ref().starts_with(common.as_str())) {
        common.pop();
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[cfg(unix)]
    fn touch(dir: &Path, name: &str, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn builtins_only() -> Completer {
        Completer::new(NAMES, None)
    }

    #[test]
    fn test_lcp() {
        assert_eq!(longest_common_prefix(&["echo", "exit"]), "e");
        assert_eq!(longest_common_prefix(&["pwd"]), "pwd");
        assert_eq!(longest_common_prefix(&["abc", "xyz"]), "");
        assert_eq!(
            longest_common_prefix(&["xyz_foo", "xyz_foo_bar", "xyz_foo_bar_baz"]),
            "xyz_foo"
        );
        assert_eq!(longest_common_prefix::<&str>(&[]), "");
    }

    #[test]
    fn test_unique_builtin_gets_trailing_space() {
        assert_eq!(
            builtins_only().complete("ech"),
            Completion::Replace("echo ".to_string())
        );
        assert_eq!(
            builtins_only().complete("exit"),
            Completion::Replace("exit ".to_string())
        );
    }

    #[test]
    fn test_ambiguous_builtins() {
        assert_eq!(
            builtins_only().complete("e"),
            Completion::Ambiguous(vec!["echo".to_string(), "exit".to_string()])
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(builtins_only().complete("zzz"), Completion::NoMatch);
    }

    #[test]
    #[cfg(unix)]
    fn test_path_executables_are_candidates() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "custom_exe_1", 0o755);
        touch(dir.path(), "custom_exe_2", 0o755);
        touch(dir.path(), "custom_data", 0o644);
        let completer = Completer::new(NAMES, Some(dir.path().as_os_str().to_owned()));

        let found: Vec<String> = completer.candidates("custom").into_iter().collect();
        assert_eq!(found, vec!["custom_exe_1", "custom_exe_2"]);

        assert_eq!(
            completer.complete("custom_e"),
            Completion::Replace("custom_exe_".to_string())
        );
        assert_eq!(
            completer.complete("custom_exe_"),
            Completion::Ambiguous(vec!["custom_exe_1".to_string(), "custom_exe_2".to_string()])
        );
        assert_eq!(completer.complete("custom_d"), Completion::NoMatch);
    }

    #[test]
    #[cfg(unix)]
    fn test_unique_executable_has_no_trailing_space() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "xyz_tool", 0o755);
        let completer = Completer::new(NAMES, Some(dir.path().as_os_str().to_owned()));

        assert_eq!(
            completer.complete("xyz"),
            Completion::Replace("xyz_tool".to_string())
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_duplicates_collapse_and_missing_dirs_are_skipped() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "dup_cmd", 0o755);
        touch(second.path(), "dup_cmd", 0o755);
        let missing = first.path().join("does_not_exist");
        let search =
            std::env::join_paths([missing.as_path(), first.path(), second.path()]).unwrap();
        let completer = Completer::new(NAMES, Some(search));

        assert_eq!(completer.candidates("dup").len(), 1);
        assert_eq!(
            completer.complete("dup"),
            Completion::Replace("dup_cmd".to_string())
        );
    }

    #[test]
    fn test_builtin_and_executable_with_same_name_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echo");
        fs::File::create(&path).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let completer = Completer::new(NAMES, Some(dir.path().as_os_str().to_owned()));

        assert_eq!(
            completer.complete("ech"),
            Completion::Replace("echo ".to_string())
        );
    }
}
