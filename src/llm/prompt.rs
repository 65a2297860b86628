//! Instructions and response schemas sent to the model.

use serde_json::{Value, json};

use super::backend::{CompletionRequest, GenerationConfig, Message};
use super::FeedbackContract;
use crate::quiz::{FeedbackRequest, OPTION_COUNT, QuizRequest};

const QUIZ_TEMPERATURE: f32 = 0.7;
const FEEDBACK_TEMPERATURE: f32 = 0.6;

pub fn quiz_system_instruction(count: usize) -> String {
    format!(
        "You are an AI that generates high-quality multiple-choice quiz questions.\n\
         Output must conform to the provided JSON schema (application/json).\n\
         Rules:\n\
         - Output a JSON array only.\n\
         - Output exactly {count} questions.\n\
         - Each question has exactly {OPTION_COUNT} options, and the options are distinct.\n\
         - The answer must be copied verbatim from one of that question's options.\n\
         - Options must be diverse and not repetitive.\n\
         - Do NOT include any text outside the JSON array."
    )
}

pub fn quiz_user_instruction(request: &QuizRequest) -> String {
    format!(
        "Generate {count} MCQ questions about {topic} at {difficulty} difficulty level.\n\
         Return only a JSON array of objects in this exact shape:\n\n\
         [{{\n  \"question\": \"\",\n  \"options\": [\"\", \"\", \"\", \"\"],\n  \"answer\": \"\",\n  \"explanation\": \"\"\n}}]",
        count = request.count(),
        topic = request.topic(),
        difficulty = request.difficulty(),
    )
}

pub fn quiz_schema(count: usize) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": OPTION_COUNT,
                    "maxItems": OPTION_COUNT
                },
                "answer": { "type": "string" },
                "explanation": { "type": "string" }
            },
            "required": ["question", "options", "answer"]
        },
        "minItems": count,
        "maxItems": count
    })
}

pub fn feedback_system_instruction(contract: FeedbackContract) -> &'static str {
    match contract {
        FeedbackContract::Basic => {
            "You are an AI that provides concise, encouraging feedback for quiz results. \
             Output only JSON with a single string field 'feedback'. No extra text."
        }
        FeedbackContract::WithLearnMore => {
            "You are an encouraging quiz tutor who provides constructive feedback. \
             Always respond with valid JSON that includes both feedback and learning suggestions. \
             No extra text."
        }
    }
}

pub fn feedback_user_instruction(summary: &FeedbackRequest, contract: FeedbackContract) -> String {
    let topic = crate::quiz::catalog::display_name(&summary.category);
    let details = format!(
        "Details:\n- Category: {topic}\n- Difficulty: {difficulty}\n- Total Questions: {total}\n\
         - Correct Answers: {correct}\n- Score: {score}%",
        difficulty = summary.difficulty,
        total = summary.total_questions,
        correct = summary.correct_answers,
        score = summary.score_percent,
    );
    match contract {
        FeedbackContract::Basic => format!(
            "Create a short feedback paragraph (max 120 words) for this result and return only \
             JSON with a single field:\n\n{{\n  \"feedback\": \"...\"\n}}\n\n{details}"
        ),
        FeedbackContract::WithLearnMore => format!(
            "Generate encouraging and constructive feedback (2-3 sentences) for this quiz result. \
             Include specific advice for improvement if the score is below 80%.\n\
             Also provide a short learning plan with 2-3 action steps, in this JSON format:\n\n\
             {{\n  \"feedback\": \"...\",\n  \"learnMore\": {{\n    \"title\": \"...\",\n    \
             \"summary\": \"...\",\n    \"actionSteps\": [\"...\", \"...\"]\n  }}\n}}\n\n{details}"
        ),
    }
}

pub fn feedback_schema(contract: FeedbackContract) -> Value {
    match contract {
        FeedbackContract::Basic => json!({
            "type": "object",
            "properties": { "feedback": { "type": "string" } },
            "required": ["feedback"]
        }),
        FeedbackContract::WithLearnMore => json!({
            "type": "object",
            "properties": {
                "feedback": { "type": "string" },
                "learnMore": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "summary": { "type": "string" },
                        "actionSteps": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 2,
                            "maxItems": 3
                        }
                    },
                    "required": ["title", "summary", "actionSteps"]
                }
            },
            "required": ["feedback", "learnMore"]
        }),
    }
}

/// Assembles a request, folding the schema into the system instruction when
/// the backend cannot enforce it.
fn assemble(
    system: String,
    user: String,
    temperature: f32,
    schema: Value,
    structured: bool,
) -> CompletionRequest {
    if structured {
        return CompletionRequest {
            messages: vec![Message::system(system), Message::user(user)],
            config: GenerationConfig::json(temperature, schema),
        };
    }
    // JSON mode on schema-less endpoints only ever yields an object, which
    // would wrap a top-level array.
    let response_mime_type =
        (schema["type"] == "object").then(|| "application/json".to_owned());
    let system = format!("{system}\nThe JSON must match this schema exactly:\n{schema}");
    CompletionRequest {
        messages: vec![Message::system(system), Message::user(user)],
        config: GenerationConfig {
            temperature,
            response_mime_type,
            response_schema: None,
        },
    }
}

pub fn quiz_request(request: &QuizRequest, structured: bool) -> CompletionRequest {
    assemble(
        quiz_system_instruction(request.count()),
        quiz_user_instruction(request),
        QUIZ_TEMPERATURE,
        quiz_schema(request.count()),
        structured,
    )
}

pub fn feedback_request(
    summary: &FeedbackRequest,
    contract: FeedbackContract,
    structured: bool,
) -> CompletionRequest {
    assemble(
        feedback_system_instruction(contract).to_owned(),
        feedback_user_instruction(summary, contract),
        FEEDBACK_TEMPERATURE,
        feedback_schema(contract),
        structured,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::Role;
    use crate::quiz::Difficulty;

    fn quiz() -> QuizRequest {
        QuizRequest::new("space-astronomy", Difficulty::Hard, 7).unwrap()
    }

    #[test]
    fn system_instruction_enumerates_rules() {
        let text = quiz_system_instruction(7);
        assert!(text.contains("JSON array only"));
        assert!(text.contains("exactly 7 questions"));
        assert!(text.contains("exactly 4 options"));
        assert!(text.contains("verbatim from one of that question's options"));
        assert!(text.contains("outside the JSON"));
    }

    #[test]
    fn user_instruction_uses_display_name() {
        let text = quiz_user_instruction(&quiz());
        assert!(text.starts_with("Generate 7 MCQ questions about Space & Astronomy at hard"));
    }

    #[test]
    fn structured_request_carries_schema() {
        let req = quiz_request(&quiz(), true);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
        let schema = req.config.response_schema.unwrap();
        assert_eq!(schema["minItems"], 7);
        assert_eq!(schema["maxItems"], 7);
        assert_eq!(schema["items"]["properties"]["options"]["minItems"], 4);
        assert_eq!(req.config.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn unstructured_request_embeds_schema_in_instruction() {
        let req = quiz_request(&quiz(), false);
        assert!(req.config.response_schema.is_none());
        assert!(req.messages[0].text.contains("\"minItems\":7"));
        assert!(req.config.response_mime_type.is_none());
    }

    #[test]
    fn unstructured_feedback_keeps_json_mode() {
        let summary = FeedbackRequest {
            score_percent: 40,
            category: "science".into(),
            difficulty: Difficulty::Easy,
            total_questions: 5,
            correct_answers: 2,
        };
        let req = feedback_request(&summary, FeedbackContract::WithLearnMore, false);
        assert!(req.config.response_schema.is_none());
        assert_eq!(req.config.response_mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn learn_more_contract_requires_learn_more() {
        let schema = feedback_schema(FeedbackContract::WithLearnMore);
        assert_eq!(schema["required"], json!(["feedback", "learnMore"]));
        let basic = feedback_schema(FeedbackContract::Basic);
        assert_eq!(basic["required"], json!(["feedback"]));
    }

    #[test]
    fn feedback_instruction_includes_details() {
        let summary = FeedbackRequest {
            score_percent: 60,
            category: "history".into(),
            difficulty: Difficulty::Medium,
            total_questions: 5,
            correct_answers: 3,
        };
        let text = feedback_user_instruction(&summary, FeedbackContract::WithLearnMore);
        assert!(text.contains("- Category: History"));
        assert!(text.contains("- Correct Answers: 3"));
        assert!(text.contains("- Score: 60%"));
        assert!(text.contains("actionSteps"));
    }
}
