// src/editor/prompts.rs
// Instruction builders for the editor operation families.

use super::types::LockedSegment;

/// Shared "must preserve" clause listing every locked segment verbatim.
fn preserve_clause(locks: &[LockedSegment]) -> String {
    if locks.is_empty() {
        return String::new();
    }
    let mut clause =
        String::from("\nThe following segments are locked. You MUST preserve each one verbatim, character for character:\n");
    for lock in locks {
        clause.push_str(&format!("- \"{}\"\n", lock.text));
    }
    clause
}

pub fn critique(document: &str, context: &str) -> String {
    format!(
        "Review the prompt below and list concrete improvement suggestions.\n\
         Respond with a JSON array only. Each element must be an object with \
         the fields: originalText (an exact, character-for-character quote \
         from the prompt), suggestedText (the replacement), reason (one \
         sentence), category (one word, e.g. clarity, specificity, tone, \
         structure).\n\
         Quote originalText exactly as it appears; do not paraphrase it.\n\n\
         Intended use of the prompt:\n{context}\n\n\
         Prompt:\n{document}"
    )
}

pub fn mentor(document: &str, context: &str, ignored: &[String]) -> String {
    let mut prompt = format!(
        "You are a prompt-engineering mentor. Give exactly one short, \
         actionable tip (two sentences at most) for improving the prompt \
         below. Return plain text only, no list markers, no preamble.\n\n\
         Intended use of the prompt:\n{context}\n\n\
         Prompt:\n{document}"
    );
    if !ignored.is_empty() {
        prompt.push_str("\n\nThe user already dismissed the following advice. Do not repeat it or rephrase it:\n");
        for tip in ignored {
            prompt.push_str(&format!("- {tip}\n"));
        }
    }
    prompt
}

pub fn apply_tip(document: &str, tip: &str, locks: &[LockedSegment]) -> String {
    format!(
        "Apply the following advice to the prompt below with the minimum \
         possible edit. Change nothing that the advice does not require.\n\
         Advice: {tip}\n{locks}\n\
         Return only the full revised prompt, with no commentary.\n\n\
         Prompt:\n{document}",
        locks = preserve_clause(locks)
    )
}

pub fn rewrite_full(document: &str, context: &str, locks: &[LockedSegment]) -> String {
    format!(
        "Rewrite the prompt below so that it serves the stated intent as \
         well as possible. Be guided strictly by the intent; do not invent \
         requirements that it does not mention.\n{locks}\n\
         Return only the rewritten prompt, with no commentary.\n\n\
         Intent:\n{context}\n\n\
         Prompt:\n{document}",
        locks = preserve_clause(locks)
    )
}

pub fn rewrite_partial(selection: &str, document: &str, locks: &[LockedSegment]) -> String {
    format!(
        "Rewrite ONLY the selected passage from the prompt below. Return \
         only the replacement for the selected passage - no surrounding \
         text, no quotes, no explanation, no conversational filler.\n{locks}\n\
         Full prompt (for context, do not return it):\n{document}\n\n\
         Selected passage to rewrite:\n{selection}",
        locks = preserve_clause(locks)
    )
}

pub fn classify(segment: &str) -> String {
    format!(
        "Classify the following prompt fragment into exactly one category: \
         Persona, Task, Context, or Format. Answer with the single category \
         word only.\n\nFragment:\n{segment}"
    )
}

pub fn reverse_engineer(example: &str) -> String {
    format!(
        "Below is an example of an AI-generated output. Write the prompt \
         that would most plausibly have produced it, covering persona, \
         task, context and format. Return only the prompt text.\n\n\
         Example output:\n{example}"
    )
}
