//! `doc/tags` generation for plugin help files

use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// A help tag definition: `*tag*`.
const TAG_PATTERN: &str = r"\*([^\s*|]+)\*";

fn tag_regex() -> io::Result<Regex> {
    Regex::new(TAG_PATTERN).map_err(io::Error::other)
}

/// Tag definitions in one help file, in order of appearance.
///
/// A definition must be delimited by whitespace or the line boundary on
/// both sides, so `a*b*c` is not a tag.
pub fn find_tags(re: &Regex, text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for line in text.lines() {
        for caps in re.captures_iter(line) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let before = line[..whole.start()].chars().next_back();
            let after = line[whole.end()..].chars().next();
            let bounded = |c: Option<char>| c.is_none_or(char::is_whitespace);
            if bounded(before) && bounded(after) {
                tags.push(caps[1].to_string());
            }
        }
    }
    tags
}

fn escape(tag: &str) -> String {
    tag.replace('\\', "\\\\").replace('/', "\\/")
}

/// Regenerate `<plugin>/doc/tags`.
///
/// Returns the number of tags written, or `None` when the plugin has no
/// `doc` directory. An existing tags file is replaced.
pub fn generate(plugin: &Path) -> io::Result<Option<usize>> {
    let doc = plugin.join("doc");
    if !doc.is_dir() {
        return Ok(None);
    }

    let re = tag_regex()?;
    let mut entries = BTreeSet::new();
    for entry in fs::read_dir(&doc)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || path.extension().is_none_or(|ext| ext != "txt") {
            continue;
        }
        let file = entry.file_name().to_string_lossy().into_owned();
        let text = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
        for tag in find_tags(&re, &text) {
            entries.insert((tag, file.clone()));
        }
    }

    let mut out = String::new();
    for (tag, file) in &entries {
        out.push_str(&format!("{tag}\t{file}\t/*{}*\n", escape(tag)));
    }
    fs::write(doc.join("tags"), out)?;
    log::debug!("Wrote {} help tags for {}", entries.len(), plugin.display());
    Ok(Some(entries.len()))
}
