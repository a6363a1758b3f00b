use crate::models::{Candidate, ChunkGroup, Citation, RetrievalOptions};
use std::collections::HashMap;
use uuid::Uuid;

/// The bounded evidence selected for one answer: a labeled context block for
/// the synthesis prompt and one citation per contributing document.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub context_block: String,
    pub citations: Vec<Citation>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Aggregates candidates into a bounded, diverse context. Only documents
/// whose best chunk reaches `high_similarity` may share the context; when
/// fewer than two reach it, the single best document wins even if its score
/// sits in the medium band. This avoids presenting two mediocre matches as
/// equally authoritative.
pub fn select(
    candidates: Vec<Candidate>,
    document_names: &HashMap<Uuid, String>,
    options: &RetrievalOptions,
) -> Selection {
    let mut by_document: HashMap<Uuid, ChunkGroup> = HashMap::new();
    for candidate in candidates {
        if candidate.similarity < options.min_similarity {
            continue;
        }
        let group = by_document
            .entry(candidate.document_id)
            .or_insert_with(|| ChunkGroup {
                document_id: candidate.document_id,
                max_similarity: 0.0,
                candidates: Vec::new(),
            });
        if candidate.similarity > group.max_similarity {
            group.max_similarity = candidate.similarity;
        }
        group.candidates.push(candidate);
    }

    let mut groups: Vec<ChunkGroup> = by_document.into_values().collect();
    groups.sort_by(|left, right| right.max_similarity.total_cmp(&left.max_similarity));

    let strong = groups
        .iter()
        .filter(|group| group.max_similarity >= options.high_similarity)
        .count();
    let selected = if strong >= 2 {
        options.max_documents.min(strong)
    } else {
        groups.len().min(1)
    };
    groups.truncate(selected);

    let mut fragments = Vec::new();
    let mut citations = Vec::new();
    for (position, group) in groups.iter().enumerate() {
        let Some(representative) = group
            .candidates
            .iter()
            .max_by(|left, right| left.similarity.total_cmp(&right.similarity))
        else {
            continue;
        };

        fragments.push(format!(
            "[Source {}]\n{}",
            position + 1,
            representative.content
        ));

        let document_name = document_names
            .get(&group.document_id)
            .cloned()
            .unwrap_or_else(|| "unknown document".to_string());
        citations.push(Citation {
            document_name,
            excerpt: excerpt(&representative.content, options.excerpt_chars),
        });
    }

    Selection {
        context_block: fragments.join("\n\n"),
        citations,
    }
}

/// Character-safe prefix of a chunk, used in citations.
fn excerpt(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}
