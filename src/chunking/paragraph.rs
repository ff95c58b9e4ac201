//! Paragraph-aware page splitter.
//!
//! 1. Split at blank lines (paragraph boundaries)
//! 2. Merge small paragraphs up to the character budget
//! 3. Split an oversize paragraph at single newlines
//! 4. Split an oversize line at a character boundary

/// Split `content` into pieces of at most `budget` non-whitespace characters.
pub fn split_paragraphs(content: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let lines: Vec<&str> = content.lines().collect();
    let paragraphs = split_at_blank_lines(&lines);

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_chars = 0usize;

    for paragraph in paragraphs {
        let chars: usize = paragraph.iter().map(|l| visible_chars(l)).sum();

        if chars > budget {
            flush(&mut current, &mut chunks);
            current_chars = 0;
            split_large_paragraph(&paragraph, budget, &mut chunks);
        } else if !current.is_empty() && current_chars + chars > budget {
            flush(&mut current, &mut chunks);
            current.extend(paragraph);
            current_chars = chars;
        } else {
            if !current.is_empty() {
                current.push("");
            }
            current.extend(paragraph);
            current_chars += chars;
        }
    }
    flush(&mut current, &mut chunks);

    chunks
}

fn visible_chars(line: &str) -> usize {
    line.chars().filter(|c| !c.is_whitespace()).count()
}

fn flush(lines: &mut Vec<&str>, chunks: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n");
    lines.clear();
    if !text.trim().is_empty() {
        chunks.push(text);
    }
}

fn split_at_blank_lines<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(*line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

fn split_large_paragraph(lines: &[&str], budget: usize, chunks: &mut Vec<String>) {
    let mut current: Vec<&str> = Vec::new();
    let mut chars = 0usize;

    for line in lines {
        let line_chars = visible_chars(line);
        if line_chars > budget {
            flush(&mut current, chunks);
            chars = 0;
            split_long_line(line, budget, chunks);
            continue;
        }
        if chars + line_chars > budget && !current.is_empty() {
            flush(&mut current, chunks);
            chars = 0;
        }
        current.push(line);
        chars += line_chars;
    }
    flush(&mut current, chunks);
}

fn split_long_line(line: &str, budget: usize, chunks: &mut Vec<String>) {
    let mut piece = String::new();
    let mut chars = 0usize;

    for c in line.chars() {
        if !c.is_whitespace() {
            if chars == budget {
                chunks.push(piece.trim().to_string());
                piece.clear();
                chars = 0;
            }
            chars += 1;
        }
        piece.push(c);
    }
    if !piece.trim().is_empty() {
        chunks.push(piece.trim().to_string());
    }
}
