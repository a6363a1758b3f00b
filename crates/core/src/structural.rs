//! Heuristics that keep covers, tables of contents and index pages out of
//! the embedding pipeline. Such chunks overlap lexically with many queries
//! while carrying no semantic content, which degrades retrieval precision.

/// Phrases that typically head a table of contents.
const TOC_KEYWORDS: [&str; 8] = [
    "índice",
    "indice",
    "tabla de contenido",
    "tabla de contenidos",
    "table of contents",
    "contents",
    "sumario",
    "índice de contenidos",
];

/// Phrases that typically appear on cover pages.
const COVER_KEYWORDS: [&str; 14] = [
    "autor",
    "author",
    "fecha",
    "date",
    "versión",
    "version",
    "confidencial",
    "confidential",
    "elaborado por",
    "prepared by",
    "aprobado por",
    "approved by",
    "departamento",
    "department",
];

const MEANINGFUL_SENTENCE_WORDS: usize = 6;

/// Decides whether a chunk is layout artifact rather than prose. A chunk
/// containing at least one sentence of six or more words is never structural;
/// meaningful prose always wins.
pub fn is_structural(chunk: &str) -> bool {
    if has_meaningful_sentence(chunk) {
        return false;
    }

    looks_like_toc(chunk) || looks_like_cover(chunk) || is_digit_heavy(chunk) || has_low_vocabulary(chunk)
}

fn has_meaningful_sentence(text: &str) -> bool {
    text.split(['.', '!', '?', '\n'])
        .any(|sentence| sentence.split_whitespace().count() >= MEANINGFUL_SENTENCE_WORDS)
}

fn looks_like_toc(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return false;
    }

    let dot_leader_lines = lines.iter().filter(|line| is_dot_leader_line(line)).count();
    if dot_leader_lines >= 3 {
        return true;
    }

    let has_keyword = TOC_KEYWORDS.iter().any(|keyword| lowered.contains(keyword));
    if !has_keyword {
        return false;
    }

    let numbered_lines = lines
        .iter()
        .filter(|line| is_numbered_line(line) || is_dot_leader_line(line))
        .count();
    if numbered_lines as f64 / lines.len() as f64 >= 0.2 {
        return true;
    }

    let short_lines = lines
        .iter()
        .filter(|line| line.split_whitespace().count() <= 8)
        .count();
    lines.len() >= 4 && short_lines as f64 / lines.len() as f64 >= 0.6
}

/// Lines like "1. Introduction .......... 3".
fn is_dot_leader_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    if !trimmed.contains("...") {
        return false;
    }
    trimmed
        .rsplit(|c: char| c == '.' || c == ' ')
        .next()
        .is_some_and(|tail| !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()))
}

fn is_numbered_line(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => {}
        _ => return false,
    }
    // "3.", "3)", "3.1" and similar prefixes.
    line.split_whitespace()
        .next()
        .is_some_and(|first| {
            first
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == ')')
        })
}

fn looks_like_cover(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let has_keyword = COVER_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword));
    if !has_keyword {
        return false;
    }

    let words = text.split_whitespace().count();
    let lines = text.lines().filter(|line| !line.trim().is_empty()).count();
    words <= 150 && lines <= 15
}

fn is_digit_heavy(text: &str) -> bool {
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    let alphanumeric = text.chars().filter(|c| c.is_alphanumeric()).count();
    if alphanumeric == 0 {
        return false;
    }

    let words = text.split_whitespace().count();
    digits as f64 / alphanumeric as f64 >= 0.6 && words <= 40
}

fn has_low_vocabulary(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphabetic())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect();

    if words.len() > 10 {
        return false;
    }

    let distinct: std::collections::HashSet<&String> = words.iter().collect();
    distinct.len() <= 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_table_of_contents_is_structural() {
        let toc = (1..=10)
            .map(|n| format!("{n}. Introduction .......... {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(is_structural(&toc));
    }

    #[test]
    fn toc_with_keyword_and_numbered_lines_is_structural() {
        let toc = "Tabla de contenido\n1. Alcance 3\n2. Definiciones 5\n3. Proceso 9";
        assert!(is_structural(toc));
    }

    #[test]
    fn synthetic_cover_page_is_structural() {
        let cover = "Manual de Recursos Humanos\nConfidencial\nVersión 2.1\nFecha: 2024-03-01\nAutor: Dirección";
        assert!(is_structural(cover));
    }

    #[test]
    fn prose_paragraph_is_not_structural() {
        let prose = "La política de vacaciones establece que cada empleado dispone de \
                     veintidós días hábiles al año. Las solicitudes se presentan con al \
                     menos dos semanas de antelación a través del portal interno.";
        assert!(!is_structural(prose));
    }

    #[test]
    fn meaningful_sentence_wins_over_cover_signals() {
        let text = "Confidencial\nEste documento describe el proceso completo de incorporación de empleados.";
        assert!(!is_structural(text));
    }

    #[test]
    fn digit_heavy_short_text_is_structural() {
        let table = "2021 450 2022 470\n2023 512 2024 540";
        assert!(is_structural(table));
    }

    #[test]
    fn low_vocabulary_fragment_is_structural() {
        assert!(is_structural("anexo anexo anexo"));
    }

    #[test]
    fn short_prose_without_signals_is_kept() {
        let text = "Beneficios del plan dental corporativo";
        assert!(!is_structural(text));
    }
}
