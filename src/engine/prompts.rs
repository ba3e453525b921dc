//! Prompt assembly and context truncation.

/// System prompt used for document summarization.
pub(crate) const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides clear, \
     concise summaries of documents. Always be accurate and helpful.";

/// System prompt used for question answering.
pub(crate) const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions \
     about documents. Always be accurate and helpful based on the document content. If the \
     information is not in the provided context, say so.";

/// Build the user prompt for a summarization request.
pub(crate) fn build_summary_prompt(text: &str) -> String {
    format!("Please provide a comprehensive summary of the following document:\n\n{text}")
}

/// Build the user prompt for a question-answering request.
pub(crate) fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on the following document context, answer this question: '{question}'\n\n\
         Document Context:\n{context}"
    )
}

/// Truncate `text` to at most `max_chars` characters.
///
/// The cut lands on a character boundary and then backs up to the previous
/// whitespace so words are never split. An ellipsis marks the truncation.
/// Text within budget is returned unchanged.
pub(crate) fn truncate_to_budget(text: &str, max_chars: usize) -> String {
    let mut cut = text.len();
    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count == max_chars {
            cut = offset;
            break;
        }
    }
    if cut == text.len() {
        return text.to_string();
    }

    // Back up to the previous whitespace when one exists, so the cut is
    // never mid-word.
    if let Some(space) = text[..cut].rfind(char::is_whitespace) {
        if space > 0 {
            cut = space;
        }
    }

    format!("{}...", text[..cut].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate_to_budget("Hello world.", 100), "Hello world.");
    }

    #[test]
    fn truncation_never_splits_words() {
        let text = "alpha beta gamma delta";
        let truncated = truncate_to_budget(text, 13);
        assert_eq!(truncated, "alpha beta...");
    }

    #[test]
    fn truncation_is_char_boundary_safe_for_multibyte_input() {
        let text = "日本語のテキスト ".repeat(10_000);
        let truncated = truncate_to_budget(&text, 4000);
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 4003);
        // Re-slicing the result must not panic on a broken boundary.
        let _ = &truncated[..truncated.len()];
    }

    #[test]
    fn oversized_ascii_input_is_truncated_not_rejected() {
        let text = "word ".repeat(10_000);
        assert_eq!(text.len(), 50_000);
        let truncated = truncate_to_budget(&text, 4000);
        assert!(truncated.chars().count() <= 4003);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn answer_prompt_embeds_question_and_context() {
        let prompt = build_answer_prompt("What is this?", "Some context.");
        assert!(prompt.contains("'What is this?'"));
        assert!(prompt.contains("Some context."));
    }
}
