//! Plain-text rendering of help documents.
//!
//! Full help lays options out in three aligned columns (tags, value type,
//! description). The column widths are computed once over every option
//! visible at the requested level, including the synthesized help and
//! version groups, so rows in different groups line up.

use super::{Entry, Group, HelpCommand};

/// Line width settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpStyle {
    pub max_width: usize,
    /// Lower bound of the description column when the columns do not fit.
    pub min_last_column: usize,
}

impl Default for HelpStyle {
    fn default() -> Self {
        Self {
            max_width: 80,
            min_last_column: 40,
        }
    }
}

impl HelpStyle {
    pub fn with_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }
}

/// Shared column widths and separator of one rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnLayout {
    widths: [usize; 3],
    separator: usize,
}

impl ColumnLayout {
    fn compute(rows: &[[String; 3]], style: &HelpStyle) -> Self {
        let mut widths = [0usize; 3];
        for row in rows {
            for (width, column) in widths.iter_mut().zip(row) {
                *width = (*width).max(text_width(column));
            }
        }

        let gaps = widths.len() - 1;
        let total: usize = widths.iter().sum::<usize>() + gaps;
        if total > style.max_width {
            let others: usize = widths[..gaps].iter().sum::<usize>() + gaps;
            widths[gaps] = style.max_width.saturating_sub(others).max(style.min_last_column);
        }
        let separator = (style.max_width.saturating_sub(widths.iter().sum()) / gaps).max(1);

        Self { widths, separator }
    }

    fn render_row(&self, row: &[String; 3], out: &mut Vec<String>) {
        let wrapped: Vec<Vec<String>> = row
            .iter()
            .zip(self.widths)
            .map(|(column, width)| wrap(column, width, width))
            .collect();
        let height = wrapped.iter().map(Vec::len).max().unwrap_or(0);
        let separator = " ".repeat(self.separator);

        for line in 0..height {
            let cells: Vec<String> = wrapped
                .iter()
                .zip(self.widths)
                .map(|(lines, width)| {
                    let cell = lines.get(line).map(String::as_str).unwrap_or_default();
                    format!("{cell:<width$}")
                })
                .collect();
            out.push(cells.join(&separator).trim_end().to_string());
        }
    }
}

fn text_width(text: &str) -> usize {
    text.chars().count()
}

/// Greedy word wrap. Words are never broken; a word longer than the width
/// gets a line of its own.
fn wrap(text: &str, first_width: usize, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let limit = if lines.is_empty() { first_width } else { width };
        if !current.is_empty() && text_width(&current) + 1 + text_width(word) > limit {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

const TAB_WIDTH: usize = 8;

impl HelpCommand {
    /// Full help at `level` with the default style.
    pub fn render_help(&self, level: u32) -> String {
        self.render_help_with(level, &HelpStyle::default())
    }

    pub fn render_help_with(&self, level: u32, style: &HelpStyle) -> String {
        let mut groups = vec![self.options.clone(), self.help_group()];
        if self.has_version {
            groups.push(self.version_group());
        }

        let rows: Vec<[String; 3]> = groups
            .iter()
            .flat_map(Group::options)
            .filter_map(|option| option.columns(level))
            .collect();
        let layout = ColumnLayout::compute(&rows, style);

        let mut out = Vec::new();
        out.push(if self.title.is_empty() {
            self.name.clone()
        } else {
            self.title.clone()
        });
        if !self.description.is_empty() {
            let first = style.max_width.saturating_sub(TAB_WIDTH);
            let lines = wrap(&self.description, first, style.max_width);
            for (i, line) in lines.into_iter().enumerate() {
                out.push(if i == 0 { format!("\t{line}") } else { line });
            }
        }

        for group in &groups {
            render_group(group, level, &layout, style, &mut out);
        }

        if !self.subcommands.is_empty() {
            out.push(String::new());
            out.push("Subcommands:".to_string());
            let width = self
                .subcommands
                .iter()
                .map(|(name, _)| text_width(name))
                .max()
                .unwrap_or(4);
            for (name, title) in &self.subcommands {
                out.push(format!("  {name:<width$}  {title}").trim_end().to_string());
            }
        }

        let mut text = out.join("\n");
        text.push('\n');
        text
    }

    /// Compact usage at `level` with the default style.
    pub fn render_usage(&self, level: u32) -> String {
        self.render_usage_with(level, &HelpStyle::default())
    }

    pub fn render_usage_with(&self, level: u32, style: &HelpStyle) -> String {
        let mut fragments = Vec::new();
        if !self.subcommands.is_empty() {
            let names: Vec<&str> = self.subcommands.iter().map(|(name, _)| name.as_str()).collect();
            fragments.push(format!("{{{}}} ...", names.join(",")));
        }
        fragments.extend(
            self.options
                .options()
                .into_iter()
                .filter(|option| option.is_visible(level))
                .map(|option| option.synopsis()),
        );
        if self.has_version {
            fragments.push("[-V]".to_string());
        }
        fragments.push("[-h [level]]".to_string());

        let head = format!("usage: {}", self.name);
        let indent = " ".repeat(text_width(&head) + 1);
        let mut lines = vec![head];
        let mut fresh = true;
        for fragment in fragments {
            let Some(current) = lines.last_mut() else {
                break;
            };
            if fresh || text_width(current) + 1 + text_width(&fragment) <= style.max_width {
                current.push(' ');
                current.push_str(&fragment);
            } else {
                lines.push(format!("{indent}{fragment}"));
            }
            fresh = false;
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

fn render_group(
    group: &Group,
    level: u32,
    layout: &ColumnLayout,
    style: &HelpStyle,
    out: &mut Vec<String>,
) {
    if group.is_visible(level) {
        out.push(String::new());
        if !group.description.is_empty() {
            let mut header = wrap(&group.description, style.max_width, style.max_width);
            if let Some(last) = header.last_mut() {
                last.push(':');
            }
            out.extend(header);
        }
    }

    for entry in &group.entries {
        match entry {
            Entry::Group(child) => render_group(child, level, layout, style, out),
            Entry::Option(option) => {
                if let Some(columns) = option.columns(level) {
                    layout.render_row(&columns, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Schema;
    use crate::help::{HelpOption, OptionType};

    fn command(raw: serde_json::Value) -> HelpCommand {
        HelpCommand::from_schema("prog", &Schema::compile(&raw).unwrap())
    }

    #[test]
    fn test_wrap_never_breaks_words() {
        assert_eq!(wrap("aa bb cc", 5, 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("extraordinarily long", 5, 5), vec!["extraordinarily", "long"]);
        assert!(wrap("   ", 5, 5).is_empty());
    }

    #[test]
    fn test_layout_spreads_short_columns() {
        let rows = vec![["--a".to_string(), "int".to_string(), "x".to_string()]];
        let layout = ColumnLayout::compute(&rows, &HelpStyle::default());
        assert_eq!(layout.widths, [3, 3, 1]);
        assert_eq!(layout.separator, (80 - 7) / 2);
    }

    #[test]
    fn test_layout_floors_last_column() {
        let rows = vec![[
            "-t, --a-rather-long-tag-name".to_string(),
            "[str] ... (< 10)".to_string(),
            "word ".repeat(30),
        ]];
        let layout = ColumnLayout::compute(&rows, &HelpStyle::default().with_max_width(60));
        assert_eq!(layout.widths[2], 40);
        assert_eq!(layout.separator, 1);

        let mut out = Vec::new();
        layout.render_row(&rows[0], &mut out);
        assert!(out.len() > 1);
        // continuation lines keep the description column aligned
        let offset = out[0].find("word").unwrap();
        assert_eq!(out[1].find("word"), Some(offset));
    }

    #[test]
    fn test_level_zero_hides_advanced_options() {
        let help = command(json!({
            "title": "demo",
            "properties": {
                "name": {"type": "string", "description": "Your name"},
                "secret": {"type": "integer", "x-help": 1, "description": "Hidden knob"}
            }
        }));

        let text = help.render_help(0);
        assert!(text.starts_with("demo\n"));
        assert!(text.contains("--name"));
        assert!(!text.contains("--secret"));
        assert!(text.contains("Display help:"));
        assert!(text.contains("-h, --help"));
        assert!(text.contains("Value 1 shows more advanced options."));

        assert!(help.render_help(1).contains("--secret"));
    }

    #[test]
    fn test_rows_align_across_groups() {
        let help = command(json!({
            "properties": {
                "n": {"type": "integer", "description": "count"},
                "grp": {"type": "object", "description": "Grouped", "properties": {
                    "long-name": {"type": "string", "description": "label"}
                }}
            }
        }));
        let text = help.render_help(0);
        let count = text.lines().find(|l| l.starts_with("--n")).unwrap();
        let label = text.lines().find(|l| l.starts_with("--grp-long-name")).unwrap();
        assert_eq!(count.find("count"), label.find("label"));
        assert!(text.contains("\nGrouped:\n"));
    }

    #[test]
    fn test_version_and_subcommands_sections() {
        let help = HelpCommand::new("tool")
            .with_version(true)
            .with_subcommands(vec![("build".to_string(), "Build it".to_string())]);
        let text = help.render_help(0);
        assert!(text.contains("Display version:"));
        assert!(text.contains("-V, --version"));
        assert!(text.ends_with("Subcommands:\n  build  Build it\n"));
    }

    #[test]
    fn test_usage_line() {
        let help = command(json!({
            "required": ["size"],
            "properties": {
                "size": {"type": "integer"},
                "verbose": {"type": "boolean", "default": false},
                "hidden": {"type": "string", "x-help": 2}
            }
        }));
        assert_eq!(
            help.render_usage(0),
            "usage: prog --size <int> [--verbose] [-h [level]]\n"
        );
        assert!(help.render_usage(2).contains("[--hidden <str>]"));
    }

    #[test]
    fn test_usage_wraps_under_first_option() {
        let mut help = HelpCommand::new("prog");
        for i in 0..8 {
            help = help.add_option(HelpOption::new(
                vec![format!("--option-number-{i}")],
                OptionType::scalar("str"),
            ));
        }
        let usage = help.render_usage_with(0, &HelpStyle::default().with_max_width(50));
        let lines: Vec<_> = usage.lines().collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 50));
        assert!(lines[1].starts_with(&" ".repeat("usage: prog ".len())));
    }
}
