//! Rewrites tox configuration so tests run against system packages.
//!
//! Every test environment loses its `deps` and `usedevelop` settings and is
//! forced to use site packages without installing the project. When the file
//! declares no test environment, a bare `[testenv]` section is appended.

use std::collections::BTreeSet;

/// Name of the rewritten configuration written next to the synced `tox.ini`.
pub const UNTOX_FILE_NAME: &str = ".rtox-untox.ini";

const DROPPED_KEYS: &[&str] = &["deps", "usedevelop"];

const FORCED_SETTINGS: &[(&str, &str)] = &[("sitepackages", "True"), ("skip_install", "True")];

#[derive(Default)]
struct TestenvSection {
    forced: BTreeSet<&'static str>,
}

impl TestenvSection {
    /// Appends forced settings the section did not already override, keeping
    /// them ahead of the blank lines that separate sections.
    fn finish(self, lines: &mut Vec<String>) {
        let mut trailing_blanks = 0_usize;
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
            trailing_blanks += 1;
        }
        for (key, value) in FORCED_SETTINGS {
            if !self.forced.contains(key) {
                lines.push(format!("{key} = {value}"));
            }
        }
        lines.extend(std::iter::repeat_n(String::new(), trailing_blanks));
    }
}

/// Returns `tox_ini` with package installation removed from every test
/// environment.
#[must_use]
pub fn untox(tox_ini: &str) -> String {
    let mut lines = Vec::new();
    let mut current: Option<TestenvSection> = None;
    let mut saw_testenv = false;
    let mut skipping_value = false;

    for line in tox_ini.lines() {
        if let Some(name) = section_name(line) {
            if let Some(section) = current.take() {
                section.finish(&mut lines);
            }
            skipping_value = false;
            if is_testenv(name) {
                saw_testenv = true;
                current = Some(TestenvSection::default());
            }
            lines.push(line.to_owned());
            continue;
        }

        if skipping_value && is_continuation(line) {
            continue;
        }
        skipping_value = false;

        if let Some(section) = current.as_mut()
            && let Some(key) = option_key(line)
        {
            if DROPPED_KEYS.contains(&key.as_str()) {
                skipping_value = true;
                continue;
            }
            if let Some(&(forced_key, value)) = FORCED_SETTINGS
                .iter()
                .find(|(candidate, _)| *candidate == key.as_str())
            {
                section.forced.insert(forced_key);
                lines.push(format!("{forced_key} = {value}"));
                skipping_value = true;
                continue;
            }
        }

        lines.push(line.to_owned());
    }

    if let Some(section) = current.take() {
        section.finish(&mut lines);
    }

    if !saw_testenv {
        if lines.last().is_some_and(|line| !line.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(String::from("[testenv]"));
        TestenvSection::default().finish(&mut lines);
    }

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    rewritten
}

fn section_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn is_testenv(section: &str) -> bool {
    section == "testenv" || section.starts_with("testenv:")
}

fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t']) && !line.trim().is_empty()
}

fn option_key(line: &str) -> Option<String> {
    if line.starts_with([' ', '\t', '#', ';']) {
        return None;
    }
    let (key, _) = line.split_once(['=', ':'])?;
    Some(key.trim().to_ascii_lowercase())
}
