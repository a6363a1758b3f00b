use crate::error::IngestError;
use crate::models::SegmenterOptions;
use regex::Regex;

/// Sentence boundary: terminal punctuation, whitespace, then an uppercase
/// letter (Latin or Spanish) or inverted punctuation opening the next
/// sentence.
const SENTENCE_BOUNDARY: &str = r"[.!?]\s+[A-ZÁÉÍÓÚÜÑ¿¡]";

/// Tokens that end with a period without ending a sentence.
const ABBREVIATIONS: [&str; 24] = [
    "sr.", "sra.", "srta.", "dr.", "dra.", "prof.", "ing.", "lic.", "mr.", "mrs.", "ms.", "st.",
    "etc.", "p.", "pág.", "pag.", "ej.", "p.ej.", "núm.", "num.", "no.", "art.", "cap.", "fig.",
];

/// Splits raw document text into bounded, overlapping chunks that respect
/// paragraph and sentence boundaries. Chunks come back in original text
/// order; empty input yields an empty list.
pub fn segment(text: &str, options: &SegmenterOptions) -> Result<Vec<String>, IngestError> {
    if options.chunk_size == 0 {
        return Err(IngestError::InvalidSegmenterOptions(
            "chunk_size must be positive".to_string(),
        ));
    }
    if options.overlap >= options.chunk_size {
        return Err(IngestError::InvalidSegmenterOptions(format!(
            "overlap {} must be smaller than chunk_size {}",
            options.overlap, options.chunk_size
        )));
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    if normalized.trim().is_empty() {
        return Ok(Vec::new());
    }

    let paragraph_break = Regex::new(r"\n\s*\n")?;
    let sentence_boundary = Regex::new(SENTENCE_BOUNDARY)?;

    let mut writer = ChunkWriter::new(options.chunk_size, options.overlap);
    for paragraph in paragraph_break.split(&normalized) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.chars().count() > options.chunk_size {
            let pieces = split_oversized(paragraph, options.chunk_size, &sentence_boundary);
            for (index, piece) in pieces.iter().enumerate() {
                let separator = if index == 0 { "\n\n" } else { " " };
                writer.push(piece, separator);
            }
        } else {
            writer.push(paragraph, "\n\n");
        }
    }

    Ok(writer.finish())
}

struct ChunkWriter {
    chunk_size: usize,
    overlap: usize,
    chunks: Vec<String>,
    current: String,
}

impl ChunkWriter {
    fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            chunks: Vec::new(),
            current: String::new(),
        }
    }

    fn push(&mut self, unit: &str, separator: &str) {
        if self.current.is_empty() {
            self.current.push_str(unit);
            return;
        }

        let unit_chars = unit.chars().count();
        let projected =
            self.current.chars().count() + separator.chars().count() + unit_chars;

        if projected <= self.chunk_size {
            self.current.push_str(separator);
            self.current.push_str(unit);
            return;
        }

        self.flush_current();

        // `current` now holds only the seeded overlap tail. The overlap
        // yields to the size bound: drop leading words until the unit fits.
        while !self.current.is_empty()
            && self.current.chars().count() + 1 + unit_chars > self.chunk_size
        {
            match self.current.find(' ') {
                Some(position) => {
                    let rest = self.current[position + 1..].trim_start().to_string();
                    self.current = rest;
                }
                None => self.current.clear(),
            }
        }

        if !self.current.is_empty() {
            self.current.push(' ');
        }
        self.current.push_str(unit);
    }

    fn flush_current(&mut self) {
        let completed = std::mem::take(&mut self.current);
        let trimmed = completed.trim();
        if trimmed.is_empty() {
            return;
        }
        self.chunks.push(trimmed.to_string());
        self.current = overlap_tail(trimmed, self.overlap);
    }

    fn finish(mut self) -> Vec<String> {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
        self.chunks
    }
}

/// Breaks a paragraph that exceeds the chunk budget into sentences, falling
/// back to fixed-width slices for any sentence (or punctuation-free run)
/// still larger than the budget.
fn split_oversized(paragraph: &str, chunk_size: usize, boundary: &Regex) -> Vec<String> {
    let mut pieces = Vec::new();
    for sentence in split_sentences(paragraph, boundary) {
        if sentence.chars().count() > chunk_size {
            pieces.extend(fixed_width_slices(&sentence, chunk_size));
        } else {
            pieces.push(sentence);
        }
    }
    pieces
}

fn split_sentences(text: &str, boundary: &Regex) -> Vec<String> {
    let mut cut_points = Vec::new();
    for found in boundary.find_iter(text) {
        // The matched punctuation is a single ASCII byte.
        let after_punct = found.start() + 1;
        let last_word = text[..after_punct]
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("");
        if !is_abbreviation(last_word) {
            cut_points.push(after_punct);
        }
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    for cut in cut_points {
        let piece = text[start..cut].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
        start = cut;
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn is_abbreviation(word: &str) -> bool {
    let lowered = word.to_lowercase();
    if ABBREVIATIONS.contains(&lowered.as_str()) {
        return true;
    }
    // Single-letter initials such as "J." in personal names.
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(first), Some('.'), None) if first.is_alphabetic()
    )
}

/// Fixed-width slicing for text with no usable sentence boundaries. Prefers
/// to break at the last interior space when that space falls past the window
/// midpoint, else breaks at the exact width.
fn fixed_width_slices(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut slices = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + width).min(chars.len());
        let mut cut = end;
        if end < chars.len() {
            if let Some(position) = chars[start..end].iter().rposition(|c| *c == ' ') {
                if position > width / 2 {
                    cut = start + position;
                }
            }
        }

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            slices.push(piece);
        }

        start = cut;
        while start < chars.len() && chars[start] == ' ' {
            start += 1;
        }
    }

    slices
}

/// The last `overlap` characters of a flushed chunk, trimmed forward to the
/// first natural boundary (newline, then sentence-ending period, then space)
/// so overlap never starts mid-word.
fn overlap_tail(chunk: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }

    let chars: Vec<char> = chunk.chars().collect();
    let start = chars.len().saturating_sub(overlap);
    let tail: String = chars[start..].iter().collect();

    if let Some(position) = tail.find('\n') {
        return tail[position + 1..].trim_start().to_string();
    }
    if let Some(position) = tail.find(". ") {
        return tail[position + 2..].trim_start().to_string();
    }
    if let Some(position) = tail.find(' ') {
        return tail[position + 1..].trim_start().to_string();
    }
    tail
}
