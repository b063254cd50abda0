use serde::Deserialize;

#[derive(Deserialize)]
pub struct QuestionPayload {
    pub text: String,
}
