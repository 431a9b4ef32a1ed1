//! Prompt templates for question rewriting and grounded answering.

use super::types::{HistoryMessage, MessageRole};
use crate::vector_index::RetrievedDocument;

const CONTEXTUALIZE_TEMPLATE: &str = "Given the chat history and the user's last question, which \
may refer to the context in the chat history, ask a question of its own, which can be understood \
without the chat history. DO NOT answer the question, only rephrase it if necessary, and otherwise \
return it as is.

Chat: {chat_history}

Input: {input}";

const ANSWER_TEMPLATE: &str = "You are an assistant who answers questions.
Answer in english concisely using only the information contained in the context provided and the \
history of the conversation.
If the context does not contain enough information to construct a short answer, do not invent \
anything and reply that it is not possible to provide an answer.

Context: {context}

Input: {input}";

/// Prompt asking the model to rewrite `question` so it stands alone without `history`.
pub fn contextualize_prompt(history: &[HistoryMessage], question: &str) -> String {
    let history = format_history(history);
    fill_template(
        CONTEXTUALIZE_TEMPLATE,
        &[("chat_history", history.as_str()), ("input", question)],
    )
}

/// Prompt asking the model to answer `question` from `context` only.
pub fn answer_prompt(context: &str, question: &str) -> String {
    fill_template(
        ANSWER_TEMPLATE,
        &[("context", context), ("input", question)],
    )
}

/// Substitute `{name}` slots in a single left-to-right pass.
///
/// Substituted values are never rescanned, so braces inside documents or questions survive.
fn fill_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let slot = slots.iter().find(|(name, _)| {
            tail.strip_prefix(name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match slot {
            Some((name, value)) => {
                rendered.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                rendered.push('{');
                rest = tail;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Concatenate documents as `"{title}\n{text}\n\n"` blocks, in rank order.
pub fn build_context(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .map(|document| format!("{}\n{}\n\n", document.title(), document.text))
        .collect()
}

fn format_history(history: &[HistoryMessage]) -> String {
    history
        .iter()
        .map(|message| {
            let speaker = match message.role {
                MessageRole::Human => "Human",
                MessageRole::Ai => "AI",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn document(title: &str, text: &str) -> RetrievedDocument {
        let mut metadata = Map::new();
        metadata.insert("title".into(), Value::from(title));
        RetrievedDocument {
            text: text.into(),
            metadata,
            score: 1.0,
        }
    }

    #[test]
    fn context_blocks_follow_rank_order() {
        let context = build_context(&[document("a", "first"), document("b", "second")]);
        assert_eq!(context, "a\nfirst\n\nb\nsecond\n\n");
    }

    #[test]
    fn contextualize_prompt_includes_history_and_question() {
        let prompt = contextualize_prompt(
            &[
                HistoryMessage::human("What is a heat pump?"),
                HistoryMessage::ai("A device that moves heat."),
            ],
            "how efficient is it",
        );
        let expected_chat = "Chat: Human: What is a heat pump?\nAI: A device that moves heat.";
        assert!(prompt.contains(expected_chat));
        assert!(prompt.ends_with("Input: how efficient is it"));
        assert!(!prompt.contains("{input}"));
    }

    #[test]
    fn placeholders_inside_documents_are_left_alone() {
        let text = "Write {input} where the question goes.";
        let context = build_context(&[document("templates", text)]);
        let prompt = answer_prompt(&context, "QUESTION");
        assert!(prompt.contains(&format!("Context: templates\n{text}")));
        assert!(prompt.ends_with("Input: QUESTION"));
    }

    #[test]
    fn placeholders_inside_history_and_question_are_left_alone() {
        let prompt = contextualize_prompt(
            &[HistoryMessage::human("what does {context} mean")],
            "and {input}?",
        );
        assert!(prompt.contains("Chat: Human: what does {context} mean"));
        assert!(prompt.ends_with("Input: and {input}?"));
    }

    #[test]
    fn answer_prompt_fills_both_slots() {
        let prompt = answer_prompt("ctx", "question?");
        assert!(prompt.contains("Context: ctx"));
        assert!(prompt.contains("Input: question?"));
        assert!(!prompt.contains("{context}"));
    }
}
