// src/brief/mod.rs
//! Brief parser: turns free-text model output into structured sections.
//!
//! Total function: any input, including empty text or prose with no
//! recognizable headings, yields a valid (possibly mostly-empty) record.
//! Pass 1 segments lines into section buffers on heading matches; pass 2
//! runs a per-section micro-parse. Label matching is a case-insensitive
//! substring search for `label:`, not position-anchored.

pub mod types;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

pub use types::{BriefSections, DeepDive, PromptIdea, SignalGroup, SignalItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Topline,
    Summary,
    Signals,
    DeepDives,
    PromptPack,
    ToolsAndLaunches,
    QuickLinks,
    Watchlist,
}

static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[).]\s*").unwrap());
static NUMBERED_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\)\s*").unwrap());

fn heading_for(line: &str) -> Option<Section> {
    // Tolerate markdown heading/emphasis marks: "## Headline:" == "Headline:".
    let stripped = line.trim_start_matches(['#', '*', '>']).trim_start();
    let lower = stripped.to_ascii_lowercase();
    let has = |prefix: &str| lower.starts_with(prefix);

    if has("headline") || has("topline") {
        return Some(Section::Topline);
    }
    if has("summary") || has("other headlines summary") || has("signal summary") {
        return Some(Section::Summary);
    }
    if has("other stories") || has("signals") {
        return Some(Section::Signals);
    }
    if has("deep dives") {
        return Some(Section::DeepDives);
    }
    if has("prompt studio") {
        return Some(Section::PromptPack);
    }
    if has("tools & launches") || has("tools and launches") {
        return Some(Section::ToolsAndLaunches);
    }
    if has("quick links") || has("also worth reading") || has("worth reading") {
        return Some(Section::QuickLinks);
    }
    if has("tomorrow's radar") || has("tomorrows radar") || has("watchlist") {
        return Some(Section::Watchlist);
    }
    None
}

fn has_label(line: &str, label: &str) -> bool {
    line.to_ascii_lowercase().contains(&format!("{label}:"))
}

/// Everything after the first `label:` occurrence, trimmed; the whole line
/// when the label is absent. ASCII lowercasing keeps byte offsets valid.
fn value_after(line: &str, label: &str) -> String {
    let needle = format!("{label}:");
    match line.to_ascii_lowercase().find(&needle) {
        Some(idx) => line[idx + needle.len()..]
            .trim_start_matches([':', ' ', '-'])
            .trim()
            .to_string(),
        None => line.trim().to_string(),
    }
}

fn strip_bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ") {
        return Some(rest.trim_start());
    }
    line.strip_prefix('•').map(str::trim_start)
}

/// Split a `Source: X | URL: Y` line on the `url:` marker when both labels
/// share the line. A source name containing the literal "url:" mis-splits;
/// the looser grammar is not worth guessing at.
fn parse_source_and_url(line: &str) -> (String, String) {
    let lower = line.to_ascii_lowercase();
    let Some(source_idx) = lower.find("source:") else {
        return (value_after(line, "source"), String::new());
    };
    let after_source = source_idx + "source:".len();
    match lower.find("url:") {
        Some(url_idx) if url_idx >= after_source => {
            let source = line[after_source..url_idx]
                .trim()
                .trim_matches('|')
                .trim()
                .to_string();
            let url = line[url_idx + "url:".len()..].trim().to_string();
            (source, url)
        }
        _ => (value_after(line, "source"), String::new()),
    }
}

fn append_story(story: &mut String, text: &str) {
    if story.is_empty() {
        story.push_str(text);
    } else {
        story.push(' ');
        story.push_str(text);
    }
}

fn flush_signal_item(
    items: &mut Vec<SignalItem>,
    story: &mut String,
    source: &mut String,
    url: &mut String,
) {
    if !story.trim().is_empty() {
        items.push(SignalItem {
            story: story.trim().to_string(),
            source: std::mem::take(source),
            url: std::mem::take(url),
        });
    }
    story.clear();
    source.clear();
    url.clear();
}

fn parse_signals(lines: &[String]) -> Vec<SignalGroup> {
    let mut groups = Vec::new();
    let mut theme = String::new();
    let mut items: Vec<SignalItem> = Vec::new();
    let mut story = String::new();
    let mut source = String::new();
    let mut url = String::new();

    macro_rules! flush_group {
        () => {
            // An accumulated item without a theme stays pending and attaches
            // to the next themed group.
            if !theme.trim().is_empty() {
                flush_signal_item(&mut items, &mut story, &mut source, &mut url);
                groups.push(SignalGroup {
                    theme: theme.trim().to_string(),
                    items: std::mem::take(&mut items),
                });
                theme.clear();
            }
        };
    }

    for line in lines {
        let trimmed = line.trim();
        if has_label(trimmed, "theme") {
            flush_group!();
            theme = value_after(trimmed, "theme");
            continue;
        }
        if let Some(cleaned) = strip_bullet(trimmed) {
            flush_signal_item(&mut items, &mut story, &mut source, &mut url);
            story = if has_label(cleaned, "story") {
                value_after(cleaned, "story")
            } else {
                cleaned.to_string()
            };
            continue;
        }
        if has_label(trimmed, "story") {
            story = value_after(trimmed, "story");
            continue;
        }
        if has_label(trimmed, "source") {
            let (s, u) = parse_source_and_url(trimmed);
            source = s;
            if !u.is_empty() {
                url = u;
            }
            continue;
        }
        if has_label(trimmed, "url") {
            url = value_after(trimmed, "url");
            continue;
        }
        if !trimmed.is_empty() {
            append_story(&mut story, trimmed);
        }
    }

    flush_group!();
    groups
}

fn parse_items(lines: &[String]) -> Vec<DeepDive> {
    let mut out = Vec::new();
    let mut story = String::new();
    let mut source = String::new();
    let mut url = String::new();

    macro_rules! flush_item {
        () => {
            if !story.trim().is_empty() {
                out.push(DeepDive {
                    story: story.trim().to_string(),
                    source: std::mem::take(&mut source),
                    url: std::mem::take(&mut url),
                });
            }
            story.clear();
            source.clear();
            url.clear();
        };
    }

    for line in lines {
        let trimmed = line.trim();
        if let Some(cleaned) = strip_bullet(trimmed) {
            flush_item!();
            story = if has_label(cleaned, "story") {
                value_after(cleaned, "story")
            } else {
                cleaned.to_string()
            };
            continue;
        }
        if has_label(trimmed, "story") {
            story = value_after(trimmed, "story");
        } else if has_label(trimmed, "source") {
            let (s, u) = parse_source_and_url(trimmed);
            source = s;
            if !u.is_empty() {
                url = u;
            }
        } else if has_label(trimmed, "url") {
            url = value_after(trimmed, "url");
        } else if !trimmed.is_empty() {
            append_story(&mut story, trimmed);
        }
    }

    flush_item!();
    out
}

fn parse_prompt_pack(lines: &[String]) -> Vec<PromptIdea> {
    let mut out = Vec::new();
    let mut current = PromptIdea::default();

    macro_rules! flush_prompt {
        () => {
            if current.has_content() {
                out.push(std::mem::take(&mut current));
            } else {
                current = PromptIdea::default();
            }
        };
    }

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if NUMBERED.is_match(line) {
            flush_prompt!();
            let remainder = NUMBERED.replace(line, "").to_string();
            if has_label(&remainder, "task") {
                current.task = value_after(&remainder, "task");
            } else if !remainder.is_empty() {
                append_story(&mut current.prompt, &remainder);
            }
            continue;
        }
        if has_label(line, "task") {
            flush_prompt!();
            current.task = value_after(line, "task");
            continue;
        }
        if has_label(line, "prompt") {
            current.prompt = value_after(line, "prompt");
            continue;
        }
        if has_label(line, "best for") {
            current.best_for = value_after(line, "best for");
            continue;
        }
        if has_label(line, "input format") {
            current.input_format = value_after(line, "input format");
            continue;
        }
        if has_label(line, "output format") {
            current.output_format = value_after(line, "output format");
            continue;
        }
        append_story(&mut current.prompt, line);
    }

    flush_prompt!();
    out
}

fn clean_bullets(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("- ") {
                return Some(rest.to_string());
            }
            if let Some(rest) = trimmed.strip_prefix('•') {
                return Some(rest.trim().to_string());
            }
            if NUMBERED_PAREN.is_match(trimmed) {
                return Some(NUMBERED_PAREN.replace(trimmed, "").to_string());
            }
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

fn commit(
    sections: &mut HashMap<Section, Vec<String>>,
    current: Option<Section>,
    buffer: &mut Vec<String>,
) {
    match current {
        Some(section) if !buffer.is_empty() => {
            sections.insert(section, std::mem::take(buffer));
        }
        _ => buffer.clear(),
    }
}

/// Parse model output into brief sections. When no headline section is found
/// at all, the entire input becomes the headline so a malformed response is
/// never silently dropped.
pub fn parse_brief(text: &str) -> BriefSections {
    let mut sections: HashMap<Section, Vec<String>> = HashMap::new();
    let mut current: Option<Section> = None;
    let mut buffer: Vec<String> = Vec::new();

    for raw in text.lines() {
        let trimmed = raw.trim();
        if let Some(section) = heading_for(trimmed) {
            commit(&mut sections, current, &mut buffer);
            current = Some(section);
            continue;
        }
        if !trimmed.is_empty() {
            buffer.push(trimmed.to_string());
        }
    }
    commit(&mut sections, current, &mut buffer);

    fn lines(sections: &HashMap<Section, Vec<String>>, key: Section) -> &[String] {
        sections.get(&key).map(Vec::as_slice).unwrap_or_default()
    }
    fn joined(sections: &HashMap<Section, Vec<String>>, key: Section) -> String {
        lines(sections, key).join(" ").trim().to_string()
    }

    let headline = joined(&sections, Section::Topline);
    BriefSections {
        headline: if headline.is_empty() {
            text.trim().to_string()
        } else {
            headline
        },
        summary: joined(&sections, Section::Summary),
        other_stories: parse_signals(lines(&sections, Section::Signals)),
        deep_dives: parse_items(lines(&sections, Section::DeepDives)),
        prompt_studio: parse_prompt_pack(lines(&sections, Section::PromptPack)),
        tools_and_launches: parse_items(lines(&sections, Section::ToolsAndLaunches)),
        quick_links: parse_items(lines(&sections, Section::QuickLinks)),
        watchlist: clean_bullets(lines(&sections, Section::Watchlist)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_after_is_case_insensitive_and_position_free() {
        assert_eq!(value_after("  THEME: Agents", "theme"), "Agents");
        assert_eq!(value_after("note Story: the text", "story"), "the text");
        assert_eq!(value_after("no label here", "story"), "no label here");
    }

    #[test]
    fn combined_source_and_url_line_splits_on_the_marker() {
        let (source, url) = parse_source_and_url("Source: The Verge | URL: https://verge.com/x");
        assert_eq!(source, "The Verge");
        assert_eq!(url, "https://verge.com/x");
    }

    #[test]
    fn source_line_without_url_keeps_the_remainder() {
        let (source, url) = parse_source_and_url("Source: The Verge");
        assert_eq!(source, "The Verge");
        assert_eq!(url, "");
    }

    #[test]
    fn markdown_marks_do_not_hide_headings() {
        assert_eq!(heading_for("## Headline:"), Some(Section::Topline));
        assert_eq!(heading_for("**Summary:**"), Some(Section::Summary));
        assert_eq!(heading_for("- Story: x"), None);
    }

    #[test]
    fn watchlist_bullets_are_stripped_but_text_kept_verbatim() {
        let lines = vec![
            "- First item".to_string(),
            "• Second item".to_string(),
            "3) Third item".to_string(),
            "Bare line".to_string(),
        ];
        assert_eq!(
            clean_bullets(&lines),
            vec!["First item", "Second item", "Third item", "Bare line"]
        );
    }

    #[test]
    fn prompt_item_with_only_a_task_is_still_emitted() {
        let lines = vec!["1) Task: Lone task".to_string()];
        let ideas = parse_prompt_pack(&lines);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].task, "Lone task");
        assert!(ideas[0].prompt.is_empty());
    }

    #[test]
    fn unlabeled_prompt_lines_overflow_into_prompt_text() {
        let lines = vec![
            "Task: Summarize".to_string(),
            "Prompt: Condense the text".to_string(),
            "keeping key numbers intact".to_string(),
        ];
        let ideas = parse_prompt_pack(&lines);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].prompt, "Condense the text keeping key numbers intact");
    }

    #[test]
    fn themeless_items_attach_to_the_next_theme() {
        let lines = vec![
            "- Orphan story that came before any theme".to_string(),
            "Theme: Catch-all".to_string(),
            "- Story: A themed story".to_string(),
        ];
        let groups = parse_signals(&lines);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].theme, "Catch-all");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(
            groups[0].items[0].story,
            "Orphan story that came before any theme"
        );
    }
}
