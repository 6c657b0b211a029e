//! Numbered evidence block handed to a downstream response generator.

use medrag_core::{HitSource, RetrievalHit};

/// Safety line that opens every response built on this evidence.
pub const DISCLAIMER: &str = "⚠️ *This information is for educational purposes only and is not a substitute for professional medical advice.*";

/// Render hits as `[n] ...` citations separated by blank lines.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use medrag_core::{Category, CorpusEntry, RetrievalHit};
/// use medrag_retrieval::context::format_context;
///
/// let entry = Arc::new(CorpusEntry {
///     id: 12,
///     content: "Give 15 g of fast-acting glucose.".into(),
///     category: Category::Diabetes,
/// });
/// let text = format_context(&[RetrievalHit::local(entry, 0.8)]);
/// assert_eq!(text, "[1] Local Knowledge (ID 12): Give 15 g of fast-acting glucose.");
/// ```
pub fn format_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let n = i + 1;
            match &hit.source {
                HitSource::LocalSemantic { sentence } => {
                    format!("[{n}] Local Knowledge (ID {}): {}", sentence.id, sentence.content)
                }
                HitSource::WebSearch { item } => {
                    format!("[{n}] Web Source: {}: {}", item.title, item.snippet)
                }
                HitSource::KeywordSearch { sentence } => {
                    format!("[{n}] Keyword Match (ID {}): {}", sentence.id, sentence.content)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// What to show when no stream produced evidence.
pub fn fallback_response() -> String {
    format!(
        "{DISCLAIMER}\n\nNo supporting evidence could be retrieved for this question. \
         If this is an emergency, call your local emergency number now."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use medrag_core::{Category, CorpusEntry, WebItem, WebItemKind};

    #[test]
    fn numbers_every_stream_kind() {
        let entry = Arc::new(CorpusEntry {
            id: 4,
            content: "Stop nephrotoxic drugs.".into(),
            category: Category::Renal,
        });
        let hits = vec![
            RetrievalHit::web(
                WebItem {
                    title: "AKI".into(),
                    snippet: "Seek care".into(),
                    link: "https://example.org".into(),
                    kind: WebItemKind::Organic,
                },
                1.0,
            ),
            RetrievalHit::keyword(entry, 0.5),
        ];
        assert_eq!(
            format_context(&hits),
            "[1] Web Source: AKI: Seek care\n\n[2] Keyword Match (ID 4): Stop nephrotoxic drugs."
        );
    }

    #[test]
    fn empty_context_is_empty_string() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn fallback_starts_with_disclaimer() {
        let response = fallback_response();
        assert!(response.starts_with(DISCLAIMER));
        assert!(response.contains("emergency number"));
    }
}
