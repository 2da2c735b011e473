//! Markdown-aware chunker.
//!
//! Splits a document into [`Section`]s at `##`/`###` headers, extracts
//! calendar dates from header text, and breaks oversized sections into
//! word-bounded chunks. Parsing never fails — malformed markdown yields a
//! best-effort section list.

use regex::Regex;
use std::sync::OnceLock;

/// Sections longer than this many words are split on paragraph boundaries.
pub const MAX_SECTION_WORDS: usize = 600;

/// A contiguous region of the document under one header.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub header_level: i64,
    /// Enclosing level-2 title; present exactly for level-3 sections
    /// (empty when a `###` appears before any `##`).
    pub parent_title: Option<String>,
    pub content: String,
    /// 1-based emission order within the document.
    pub sequence: i64,
    /// `YYYY-MM-DD` extracted from the header, if any.
    pub valid_at: Option<String>,
}

/// One retrieval unit cut from a section.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkData {
    pub text: String,
    pub section_title: String,
    pub header_level: i64,
    pub parent_title: Option<String>,
    pub section_sequence: i64,
    /// 1-based position within the section.
    pub chunk_sequence: i64,
    pub chunk_total: i64,
    pub valid_at: Option<String>,
}

fn header_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+([0-9]{1,2}),\s*([0-9]{4})\b",
        )
        .expect("valid header date regex")
    })
}

fn month_number(name: &str) -> u32 {
    match name {
        "January" => 1,
        "February" => 2,
        "March" => 3,
        "April" => 4,
        "May" => 5,
        "June" => 6,
        "July" => 7,
        "August" => 8,
        "September" => 9,
        "October" => 10,
        "November" => 11,
        "December" => 12,
        _ => 0,
    }
}

/// Extract the first `<Month> <day>, <year>` occurrence from a header and
/// normalize it to `YYYY-MM-DD`. Non-dates and impossible calendar dates
/// yield `None`.
pub fn extract_date_from_header(header: &str) -> Option<String> {
    let caps = header_date_regex().captures(header)?;
    let month = month_number(&caps[1]);
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Line-driven parser state: preamble, inside a level-2 section, or inside
/// a level-3 child. Each header transition flushes the state it closes.
#[derive(Default)]
struct Parser {
    sections: Vec<Section>,
    seq: i64,
    seen_header: bool,

    preamble_lines: Vec<String>,

    h2_title: String,
    h2_content: Vec<String>,
    h2_has_h3: bool,
    h2_valid_at: Option<String>,

    h3_title: String,
    h3_content: Vec<String>,
    h3_valid_at: Option<String>,
    in_h3: bool,
}

impl Parser {
    fn push_section(
        &mut self,
        title: &str,
        header_level: i64,
        parent_title: Option<String>,
        content: String,
        valid_at: Option<String>,
    ) {
        self.seq += 1;
        self.sections.push(Section {
            title: title.to_string(),
            header_level,
            parent_title,
            content,
            sequence: self.seq,
            valid_at,
        });
    }

    fn flush_preamble(&mut self) {
        if self.preamble_lines.is_empty() {
            return;
        }
        let content = self.preamble_lines.join("\n").trim().to_string();
        self.preamble_lines.clear();
        if !content.is_empty() {
            self.push_section("Preamble", 2, None, content, None);
        }
    }

    fn flush_h3(&mut self) {
        if self.h3_title.is_empty() {
            return;
        }
        let content = self.h3_content.join("\n").trim().to_string();
        let title = std::mem::take(&mut self.h3_title);
        let parent = Some(self.h2_title.clone());
        let valid_at = self.h3_valid_at.take();
        self.push_section(&title, 3, parent, content, valid_at);
        self.h3_content.clear();
        self.in_h3 = false;
    }

    fn flush_h2(&mut self) {
        if self.h2_title.is_empty() {
            return;
        }
        // A level-2 with level-3 children is only a container; its preamble
        // (if any) was already emitted when the first child appeared.
        if !self.h2_has_h3 {
            let content = self.h2_content.join("\n").trim().to_string();
            let title = self.h2_title.clone();
            let valid_at = self.h2_valid_at.clone();
            self.push_section(&title, 2, None, content, valid_at);
        }
        self.h2_title.clear();
        self.h2_content.clear();
        self.h2_has_h3 = false;
        self.h2_valid_at = None;
    }

    fn feed(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("### ") {
            if !self.seen_header {
                self.seen_header = true;
                self.flush_preamble();
            }
            self.flush_h3();
            if !self.h2_title.is_empty() && !self.h2_has_h3 {
                let preamble = self.h2_content.join("\n").trim().to_string();
                if !preamble.is_empty() {
                    let title = self.h2_title.clone();
                    let valid_at = self.h2_valid_at.clone();
                    self.push_section(&title, 2, None, preamble, valid_at);
                }
                self.h2_content.clear();
            }
            self.h2_has_h3 = true;
            self.in_h3 = true;
            self.h3_title = rest.trim().to_string();
            self.h3_valid_at =
                extract_date_from_header(&self.h3_title).or_else(|| self.h2_valid_at.clone());
            self.h3_content.clear();
            return;
        }

        if let Some(rest) = line.strip_prefix("## ") {
            if !self.seen_header {
                self.seen_header = true;
                self.flush_preamble();
            }
            self.flush_h3();
            self.flush_h2();
            self.h2_title = rest.trim().to_string();
            self.h2_valid_at = extract_date_from_header(&self.h2_title);
            self.in_h3 = false;
            return;
        }

        if self.in_h3 {
            self.h3_content.push(line.to_string());
        } else if !self.h2_title.is_empty() {
            self.h2_content.push(line.to_string());
        } else {
            self.preamble_lines.push(line.to_string());
        }
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush_h3();
        self.flush_h2();
        if !self.seen_header {
            self.flush_preamble();
        }
        self.sections
    }
}

/// Parse markdown into an ordered list of sections.
pub fn parse_markdown(content: &str) -> Vec<Section> {
    let mut parser = Parser::default();
    for line in content.split('\n') {
        parser.feed(line);
    }
    parser.finish()
}

/// Split a section into chunks of at most `max_words` words.
///
/// Sections within the budget become a single chunk. Oversized sections are
/// split on blank-line paragraph boundaries, greedily packing paragraphs; a
/// single paragraph over the budget stands as its own chunk.
pub fn chunk_section(section: &Section, max_words: usize) -> Vec<ChunkData> {
    let make_chunk = |text: String, chunk_sequence: i64, chunk_total: i64| ChunkData {
        text,
        section_title: section.title.clone(),
        header_level: section.header_level,
        parent_title: section.parent_title.clone(),
        section_sequence: section.sequence,
        chunk_sequence,
        chunk_total,
        valid_at: section.valid_at.clone(),
    };

    let word_count = section.content.split_whitespace().count();
    if word_count <= max_words {
        return vec![make_chunk(section.content.trim().to_string(), 1, 1)];
    }

    let mut chunk_texts: Vec<String> = Vec::new();
    let mut current_parts: Vec<&str> = Vec::new();
    let mut current_words = 0usize;

    for paragraph in section.content.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_words = trimmed.split_whitespace().count();
        if current_words == 0 && para_words > max_words {
            chunk_texts.push(trimmed.to_string());
            continue;
        }
        if current_words + para_words > max_words && !current_parts.is_empty() {
            chunk_texts.push(current_parts.join("\n\n"));
            current_parts.clear();
            current_words = 0;
        }
        current_parts.push(trimmed);
        current_words += para_words;
    }
    if !current_parts.is_empty() {
        chunk_texts.push(current_parts.join("\n\n"));
    }

    let total = chunk_texts.len() as i64;
    chunk_texts
        .into_iter()
        .enumerate()
        .map(|(idx, text)| make_chunk(text, idx as i64 + 1, total))
        .collect()
}
