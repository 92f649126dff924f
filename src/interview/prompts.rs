//! Fixed interview instructions and the structured reply contract.

use serde_json::{json, Value};

use crate::config::Language;

/// System instruction for the guided interview. Encodes the four-pillar
/// objective, the one-question-at-a-time discipline, and the strict output
/// contract. The language directive makes the instruction session-specific.
pub fn system_instruction(language: Language) -> String {
    format!(
        "You are an expert prompt engineer conducting a short requirements \
         interview. Your goal is to gather enough material to write an \
         excellent prompt covering four pillars: Persona (who the AI should \
         be), Task (what it must do), Context (background and constraints), \
         and Format (how the output should look).\n\
         Ask exactly one focused question per turn and always offer three \
         short answer options the user can pick from. When all four pillars \
         are covered, set isFinalDraft to true and put the complete prompt \
         into generatedPrompt.\n\
         Always respond in {language}, and always reply with a single JSON \
         object with the fields: question (string), options (array of \
         exactly 3 strings), isFinalDraft (boolean), generatedPrompt \
         (string, required only when isFinalDraft is true). No prose outside \
         the JSON object.",
        language = language.name()
    )
}

/// Closing instruction requesting consolidation of all four pillars.
pub fn closing_instruction(language: Language) -> &'static str {
    match language {
        Language::English => {
            "We are done with questions. Consolidate everything we discussed \
             - persona, task, context and format - into one complete \
             instruction block, set isFinalDraft to true, and return it in \
             generatedPrompt."
        }
        Language::Spanish => {
            "Hemos terminado con las preguntas. Consolida todo lo que \
             hablamos - persona, tarea, contexto y formato - en un unico \
             bloque de instrucciones, marca isFinalDraft como true y \
             devuelvelo en generatedPrompt."
        }
        Language::German => {
            "Wir sind mit den Fragen fertig. Fasse alles Besprochene - \
             Persona, Aufgabe, Kontext und Format - in einem vollstaendigen \
             Anweisungsblock zusammen, setze isFinalDraft auf true und gib \
             ihn in generatedPrompt zurueck."
        }
        Language::French => {
            "Nous en avons fini avec les questions. Rassemble tout ce dont \
             nous avons parle - persona, tache, contexte et format - en un \
             seul bloc d'instructions, mets isFinalDraft a true et \
             renvoie-le dans generatedPrompt."
        }
    }
}

/// Shown as the next question when a model reply cannot be parsed; the
/// conversation continues instead of aborting.
pub fn parse_failure_question(language: Language) -> &'static str {
    match language {
        Language::English => {
            "I could not read that last answer properly. Could you say it again in different words?"
        }
        Language::Spanish => {
            "No pude interpretar bien la ultima respuesta. Puedes repetirla con otras palabras?"
        }
        Language::German => {
            "Ich konnte die letzte Antwort nicht richtig lesen. Kannst du sie anders formulieren?"
        }
        Language::French => {
            "Je n'ai pas pu lire correctement la derniere reponse. Peux-tu la reformuler autrement?"
        }
    }
}

/// Constrained response schema for structured-output backends.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The next interview question"
            },
            "options": {
                "type": "array",
                "items": {"type": "string"},
                "minItems": 3,
                "maxItems": 3,
                "description": "Three short answer options"
            },
            "isFinalDraft": {
                "type": "boolean",
                "description": "True once the prompt draft is complete"
            },
            "generatedPrompt": {
                "type": "string",
                "description": "The complete prompt; required when isFinalDraft is true"
            }
        },
        "required": ["question", "options", "isFinalDraft"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_names_language_and_pillars() {
        let instruction = system_instruction(Language::German);
        assert!(instruction.contains("German"));
        for pillar in ["Persona", "Task", "Context", "Format"] {
            assert!(instruction.contains(pillar), "missing pillar {pillar}");
        }
    }

    #[test]
    fn test_schema_requires_contract_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["question", "options", "isFinalDraft"]);
        assert_eq!(schema["properties"]["options"]["maxItems"], 3);
    }
}
